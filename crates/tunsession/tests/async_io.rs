//! Async receive/send tests against the mock provisioner.

#[macro_use]
#[path = "common/mod.rs"]
mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{MockProvisioner, test_config};
use tunsession::{ErrorKind, TunSession};

fn running_session() -> (Arc<TunSession>, Arc<MockProvisioner>) {
    let mock = MockProvisioner::new();
    let session = TunSession::with_provisioner(mock.clone());
    session.init(&test_config()).unwrap();
    session.start().unwrap();
    (Arc::new(session), mock)
}

#[tokio::test]
async fn test_recv_wakes_on_data() {
    let (session, mock) = running_session();
    let peer = mock.peer();

    let reader = {
        let session = Arc::clone(&session);
        tokio::spawn(async move {
            let mut buf = [0u8; 256];
            let n = session.recv(&mut buf).await?;
            Ok::<_, tunsession::Error>(buf[..n].to_vec())
        })
    };

    tokio::time::sleep(Duration::from_millis(50)).await;
    peer.send(&[0x60, 0, 0, 0]).unwrap();

    let packet = tokio::time::timeout(Duration::from_secs(5), reader)
        .await
        .expect("recv did not wake")
        .unwrap()
        .unwrap();
    assert_eq!(packet, vec![0x60, 0, 0, 0]);
}

#[tokio::test]
async fn test_recv_returns_queued_packet() {
    let (session, mock) = running_session();
    mock.peer().send(&[1, 2, 3]).unwrap();

    let mut buf = [0u8; 16];
    let n = session.recv(&mut buf).await.unwrap();
    assert_eq!(&buf[..n], &[1, 2, 3]);
}

#[tokio::test]
async fn test_recv_wakes_on_stop() {
    let (session, _mock) = running_session();

    let reader = {
        let session = Arc::clone(&session);
        tokio::spawn(async move {
            let mut buf = [0u8; 256];
            session.recv(&mut buf).await
        })
    };

    tokio::time::sleep(Duration::from_millis(50)).await;
    session.stop().unwrap();

    let err = tokio::time::timeout(Duration::from_secs(5), reader)
        .await
        .expect("recv did not wake on stop")
        .unwrap()
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotRunning);
}

#[tokio::test]
async fn test_recv_wakes_on_cleanup() {
    let (session, _mock) = running_session();

    let reader = {
        let session = Arc::clone(&session);
        tokio::spawn(async move {
            let mut buf = [0u8; 256];
            session.recv(&mut buf).await
        })
    };

    tokio::time::sleep(Duration::from_millis(50)).await;
    session.cleanup().unwrap();

    let err = tokio::time::timeout(Duration::from_secs(5), reader)
        .await
        .expect("recv did not wake on cleanup")
        .unwrap()
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotRunning);
}

#[tokio::test]
async fn test_send() {
    let (session, mock) = running_session();
    let peer = mock.peer();

    assert_eq!(session.send(&[9, 9, 9]).await.unwrap(), 3);
    let mut buf = [0u8; 16];
    let n = peer.recv(&mut buf).unwrap();
    assert_eq!(&buf[..n], &[9, 9, 9]);
}

#[tokio::test]
async fn test_recv_not_running() {
    let session = TunSession::with_provisioner(MockProvisioner::new());
    let mut buf = [0u8; 16];
    let err = session.recv(&mut buf).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotRunning);
}

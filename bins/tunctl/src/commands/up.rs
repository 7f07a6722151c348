//! tunctl up command implementation.

use std::path::PathBuf;

use clap::Args;
use tracing::{debug, info};
use tunsession::TunSession;

use super::load_config;

#[derive(Args)]
pub struct UpCmd {
    /// Path to the INI config file.
    config: PathBuf,

    /// Receive buffer size.
    #[arg(long, default_value_t = 65535)]
    buffer: usize,
}

impl UpCmd {
    pub async fn run(self) -> anyhow::Result<()> {
        let config = load_config(&self.config)?;
        let session = TunSession::new();

        session.init(&config)?;
        session.start()?;
        for warning in session.warnings() {
            eprintln!("warning: {}", warning);
        }
        println!(
            "{} is up (mtu {}), press Ctrl-C to stop",
            config.name(),
            session.mtu().unwrap_or_default()
        );

        let mut buf = vec![0u8; self.buffer.max(1)];
        let mut packets = 0u64;
        let mut bytes = 0u64;

        let ctrl_c = tokio::signal::ctrl_c();
        tokio::pin!(ctrl_c);

        let result = loop {
            tokio::select! {
                res = session.recv(&mut buf) => match res {
                    Ok(n) => {
                        packets += 1;
                        bytes += n as u64;
                        debug!(len = n, "packet received");
                    }
                    Err(e) => break Err(e),
                },
                _ = &mut ctrl_c => {
                    info!("interrupted");
                    break Ok(());
                }
            }
        };

        session.cleanup()?;
        println!("{} packets, {} bytes", packets, bytes);
        Ok(result?)
    }
}

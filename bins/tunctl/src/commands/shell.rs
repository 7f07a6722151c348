//! tunctl shell command implementation.
//!
//! Reads one command per line from stdin and applies it to a session.

use std::io::Write;
use std::path::PathBuf;

use clap::Args;
use tokio::io::{AsyncBufReadExt, BufReader};
use tunsession::{TunConfig, TunSession};

use super::load_config;

const HELP: &str = "\
commands:
  1 init     store the configuration
  2 start    create and bring up the device
  3 restart  stop then start
  4 stop     bring down and close the device
  5 cleanup  tear everything down
  6 exit     clean up and quit
    state    print the current state
    help     print this help";

#[derive(Args)]
pub struct ShellCmd {
    /// Path to the INI config file.
    config: PathBuf,
}

/// One shell command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Action {
    Init,
    Start,
    Stop,
    Restart,
    Cleanup,
    State,
    Help,
    Exit,
}

impl Action {
    fn parse(word: &str) -> Option<Self> {
        Some(match word {
            "init" | "1" => Self::Init,
            "start" | "2" => Self::Start,
            "restart" | "3" => Self::Restart,
            "stop" | "4" => Self::Stop,
            "cleanup" | "5" => Self::Cleanup,
            "state" | "s" => Self::State,
            "help" | "h" | "?" => Self::Help,
            "exit" | "quit" | "q" | "6" => Self::Exit,
            _ => return None,
        })
    }
}

impl ShellCmd {
    pub async fn run(self) -> anyhow::Result<()> {
        let config = load_config(&self.config)?;
        let session = TunSession::new();

        println!("{}", HELP);
        let mut lines = BufReader::new(tokio::io::stdin()).lines();

        loop {
            print!("tunctl> ");
            std::io::stdout().flush()?;

            let Some(line) = lines.next_line().await? else {
                break;
            };
            let word = line.trim();
            if word.is_empty() {
                continue;
            }

            let Some(action) = Action::parse(word) else {
                println!("unknown command: {} (try help)", word);
                continue;
            };
            if action == Action::Exit {
                break;
            }
            apply(&session, &config, action);
        }

        session.cleanup()?;
        println!("bye");
        Ok(())
    }
}

fn apply(session: &TunSession, config: &TunConfig, action: Action) {
    let result = match action {
        Action::Init => session.init(config),
        Action::Start => session.start(),
        Action::Stop => session.stop(),
        Action::Restart => session.restart(),
        Action::Cleanup => session.cleanup(),
        Action::State => {
            println!("state: {}", session.state());
            return;
        }
        Action::Help => {
            println!("{}", HELP);
            return;
        }
        Action::Exit => return,
    };

    match result {
        Ok(()) => {
            println!("ok: {}", session.state());
            for warning in session.warnings() {
                println!("warning: {}", warning);
            }
        }
        Err(e) => println!("error ({}): {}", e.kind(), e),
    }
}

//! tunctl check command implementation.

use std::io::{self, Write};
use std::path::PathBuf;

use clap::Args;

use super::load_config;

#[derive(Args)]
pub struct CheckCmd {
    /// Path to the INI config file.
    config: PathBuf,

    /// Output JSON.
    #[arg(short = 'j', long)]
    json: bool,
}

impl CheckCmd {
    pub fn run(self) -> anyhow::Result<()> {
        let config = load_config(&self.config)?;
        let mut stdout = io::stdout().lock();

        if self.json {
            serde_json::to_writer_pretty(&mut stdout, &config)?;
            writeln!(stdout)?;
            return Ok(());
        }

        writeln!(stdout, "name:    {}", config.name())?;
        writeln!(stdout, "ipv4:    {}", config.ipv4_cidr())?;
        writeln!(stdout, "ipv6:    {}", config.ipv6_cidr().unwrap_or("none"))?;
        writeln!(stdout, "mtu:     {}", config.mtu_value())?;
        writeln!(stdout, "persist: {}", config.is_persistent())?;
        Ok(())
    }
}

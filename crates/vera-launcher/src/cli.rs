use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "vera-launcher")]
#[command(about = "VERA session launcher: keeps the session's windows alive and signed in")]
pub struct Cli {
    /// Directory holding settings.json and the launcher lock (default: ~/.config/vera)
    #[arg(long, global = true)]
    pub config_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Become the session launcher and run its windows until Ctrl-C
    Run {
        /// Display name of the signed-in user
        #[arg(long, env = "VERA_USER")]
        user: Option<String>,

        /// Session credential pushed to every window
        #[arg(long, env = "VERA_TOKEN")]
        token: Option<String>,

        /// Stop on its own after this many seconds
        #[arg(long)]
        duration_secs: Option<u64>,
    },

    /// Report whether a launcher currently holds the lock
    Status,

    /// Remove a launcher lock left behind by a crashed launcher
    ClearLock,
}

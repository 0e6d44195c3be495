use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "hearline",
    about = "Real-time multi-speaker transcription for deaf and hard-of-hearing users",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run the HTTP/WebSocket transcription server
    Serve {
        #[arg(long, default_value = "127.0.0.1", env = "HEARLINE_HOST")]
        host: String,

        #[arg(long, default_value_t = 8383, env = "HEARLINE_PORT")]
        port: u16,
    },

    /// Live console transcription from a local microphone
    Live {
        /// Input device name (defaults to the system default input)
        #[arg(long)]
        device: Option<String>,

        /// Save audio and a transcript event log to this directory
        #[arg(long, value_name = "DIR")]
        record: Option<PathBuf>,
    },

    /// List capture devices
    Devices,
}

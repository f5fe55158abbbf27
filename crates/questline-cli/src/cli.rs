use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "questline",
    version,
    about = "Drive app and instance jobs on a device and follow their quests"
)]
pub struct Cli {
    /// Use a scripted in-memory backend instead of QUESTLINE_API_URL.
    #[arg(long, default_value_t = false)]
    pub demo: bool,

    /// Verbose logging (ignored when RUST_LOG is set).
    #[arg(long, default_value_t = false)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Install an app, then create and start an instance of it.
    Install {
        app: String,
        version: String,
        #[arg(long)]
        name: Option<String>,
    },
    /// Sideload an app from a JSON manifest, then create and start an instance.
    Sideload {
        manifest: PathBuf,
        #[arg(long)]
        name: Option<String>,
    },
    /// Move an app and its instances to another version.
    Update {
        app: String,
        from: String,
        to: String,
        /// Instance to migrate; repeat for several.
        #[arg(long = "instance")]
        instances: Vec<String>,
    },
    Start {
        instance: String,
    },
    Stop {
        instance: String,
    },
    /// List quests on the device.
    Quests {
        /// Keep polling and print changes for this many seconds.
        #[arg(long)]
        watch: Option<u64>,
        /// Delete finished quests on the device afterwards.
        #[arg(long, default_value_t = false)]
        clear: bool,
    },
}

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// TOML configuration file; `KVMODEL_*` variables override it
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Table name prefix, overriding the configuration
    #[arg(long, global = true)]
    pub prefix: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print the effective configuration as TOML
    Config,

    /// Print the demo entity schemas
    Schema,

    /// Walk one entity through create, partial saves, set updates and delete
    Lifecycle {
        /// Organisation part of the composite key
        #[arg(long, default_value = "acme")]
        org: String,

        /// User part of the composite key
        #[arg(long, default_value_t = 1)]
        user: i64,
    },

    /// Seed records and read them back with a batched get
    BatchGet {
        /// Records written before the read
        #[arg(short, long, default_value_t = 500)]
        records: usize,

        /// Keys requested; keys past `records` have no record
        #[arg(short, long, default_value_t = 600)]
        keys: usize,

        /// Keys the store services per batch call (unset = all)
        #[arg(short, long)]
        throttle: Option<usize>,
    },
}

use crate::adapters::webservice::CodecVersion;
use clap::{Parser, Subcommand};

#[derive(Debug, Clone, Parser)]
#[command(name = "parcel-label")]
#[command(about = "Carrier service catalog and shipping label generation")]
pub struct CliConfig {
    /// Path to TOML configuration file
    #[arg(short, long, default_value = "label-config.toml")]
    pub config: String,

    #[arg(short, long, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, help = "Emit logs as JSON")]
    pub json_logs: bool,

    /// Webservice codec (v1 or v2), overriding the configuration file
    #[arg(long)]
    pub codec: Option<CodecVersion>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Fetch the remote catalog and cache the new snapshot
    RefreshCatalog,

    /// List the options compatible with a service
    Options {
        #[arg(long)]
        service: String,
    },

    /// Check a service/options combination against the catalog
    Validate {
        #[arg(long)]
        service: String,

        #[arg(long = "option")]
        options: Vec<String>,
    },

    /// Validate and save a carrier method
    ConfigureMethod {
        #[arg(long)]
        id: String,

        #[arg(long)]
        group: String,

        #[arg(long)]
        service: String,

        #[arg(long = "option")]
        options: Vec<String>,

        #[arg(long, default_value = "")]
        instructions: String,
    },

    /// List the carrier methods usable for a shipment
    AvailableMethods {
        #[arg(long)]
        shipment: String,

        /// Method to pick when available
        #[arg(long)]
        preferred: Option<String>,
    },

    /// Generate a label and attach it to the shipment
    GenerateLabel {
        #[arg(long)]
        shipment: String,

        #[arg(long)]
        method: String,

        /// Extra attempts after a retryable network failure
        #[arg(long, default_value = "0")]
        retries: u32,

        #[arg(long, default_value = "1000")]
        retry_delay_ms: u64,
    },
}

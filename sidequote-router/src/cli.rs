use clap::Parser;

/// Sidecar quote router.
///
/// Serves optimal swap quotes and token prices over the pool snapshots an
/// ingest collaborator pushes in.
#[derive(Parser, Debug, Clone, PartialEq, Eq)]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// The server IP
    #[clap(long, default_value = "0.0.0.0")]
    pub server_ip: String,

    /// The server port
    #[clap(long, default_value = "9092")]
    pub server_port: u16,

    /// Path to the service configuration file (JSON). Defaults apply when
    /// omitted.
    #[clap(long, env = "SIDEQUOTE_CONFIG")]
    pub config: Option<String>,

    /// Queue depth for block notifications between ingest and the price
    /// refresher
    #[clap(long, default_value = "64")]
    pub block_update_queue: usize,
}

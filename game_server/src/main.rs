use clap::Parser;
use game_server::frameworks::{config, server};
use game_server::ServerSettings;

/// Authoritative arena server.
#[derive(Debug, Parser)]
struct Args {
    /// Port to listen on.
    #[arg(long, default_value_t = config::http_port())]
    port: u16,

    /// Password clients must present on connect (empty allows anyone).
    #[arg(long, default_value_t = String::new())]
    password: String,

    /// Number of bot players to field.
    #[arg(long, default_value_t = 0)]
    bots: usize,
}

#[tokio::main]
async fn main() -> std::io::Result<()> {
    let args = Args::parse();

    let settings = ServerSettings {
        password: args.password,
        bots: args.bots,
        ..ServerSettings::default()
    };
    server::run_with_config(args.port, settings).await
}

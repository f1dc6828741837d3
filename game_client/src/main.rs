use clap::Parser;
use game_client::net;
use std::io::Write;
use std::process::ExitCode;

/// Headless arena client: connects, mirrors the world and logs deltas.
/// Interactive frontends build on the library instead.
#[derive(Debug, Parser)]
struct Args {
    /// Server base URL.
    #[arg(long, default_value = "http://127.0.0.1:8888")]
    address: String,

    /// Player name; prompted for when omitted.
    #[arg(long)]
    name: Option<String>,

    /// Server password; prompted for when omitted.
    #[arg(long)]
    password: Option<String>,
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}

fn prompt(label: &str) -> String {
    print!("{label}: ");
    let _ = std::io::stdout().flush();
    let mut line = String::new();
    let _ = std::io::stdin().read_line(&mut line);
    line.trim().to_string()
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();
    let args = Args::parse();

    let name = args.name.unwrap_or_else(|| prompt("player name"));
    if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric()) {
        eprintln!("player name must be alphanumeric");
        return ExitCode::FAILURE;
    }
    let password = args.password.unwrap_or_else(|| prompt("password"));

    let (_client, driver) = match net::connect(&args.address, &name, &password).await {
        Ok(connected) => connected,
        Err(e) => {
            tracing::error!(error = ?e, "connect failed");
            return ExitCode::FAILURE;
        }
    };

    match driver.run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = ?e, "stream ended");
            ExitCode::FAILURE
        }
    }
}

use clap::{Parser, Subcommand};
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use broker_proxy::broker::Responder;
use broker_proxy::lifecycle::{signals, Shutdown};
use broker_proxy::observability::logging;

#[derive(Parser)]
#[command(name = "broker-cli")]
#[command(about = "Companion tool for the broker proxy", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Answer request artifacts in a broker directory until interrupted
    Respond {
        #[arg(short, long)]
        dir: PathBuf,

        #[arg(short, long, default_value_t = 200)]
        status: u16,

        /// Response body; defaults to echoing the request line
        #[arg(short, long)]
        body: Option<String>,

        #[arg(short, long, default_value_t = 100)]
        interval_ms: u64,
    },
    /// Send a request through the proxy
    Request {
        #[arg(short, long, default_value = "http://localhost:8080")]
        url: String,

        #[arg(short, long, default_value = "GET")]
        method: String,

        /// Path forwarded to the backend, e.g. /orders?id=7
        path: String,
    },
    /// Check proxy status
    Status {
        #[arg(short, long, default_value = "http://localhost:8080")]
        url: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Respond {
            dir,
            status,
            body,
            interval_ms,
        } => {
            logging::init_logging("info");
            tokio::fs::create_dir_all(&dir).await?;

            let shutdown = Arc::new(Shutdown::new());
            signals::spawn_signal_listener(shutdown.clone());

            let responder = Responder::new(dir, status, body);
            tracing::info!(directory = %responder.directory().display(), status, "Responder started");
            responder
                .run(Duration::from_millis(interval_ms.max(1)), shutdown.subscribe())
                .await;
        }
        Commands::Request { url, method, path } => {
            let method = reqwest::Method::from_bytes(method.to_uppercase().as_bytes())?;
            let path = path.trim_start_matches('/');
            let res = reqwest::Client::new()
                .request(method, format!("{}/api/proxy/{}", url.trim_end_matches('/'), path))
                .send()
                .await?;

            println!("{}", res.status());
            println!("{}", res.text().await?);
        }
        Commands::Status { url } => {
            let res = reqwest::get(format!("{}/status", url.trim_end_matches('/'))).await?;
            print_response(res).await?;
        }
    }

    Ok(())
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: proxy returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        return Ok(());
    }

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}

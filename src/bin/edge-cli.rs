use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue};
use serde_json::Value;

#[derive(Parser)]
#[command(name = "edge-cli")]
#[command(about = "Ops CLI for the edge gate", long_about = None)]
struct Cli {
    /// Base URL of a running edge gate.
    #[arg(short, long, default_value = "http://localhost:8080")]
    url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check gate liveness
    Status,
    /// Run a feature access check for a tenant
    Access {
        /// Tenant identifier
        #[arg(short, long)]
        tenant: String,

        /// Feature name, e.g. wallet.withdraw
        #[arg(short, long)]
        feature: String,

        /// Raw step-up cookie value to present, if any
        #[arg(short, long)]
        stepup: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();

    match cli.command {
        Commands::Status => {
            let res = client
                .get(format!("{}/edge/healthz", cli.url))
                .send()
                .await?;
            print_response(res).await?;
        }
        Commands::Access {
            tenant,
            feature,
            stepup,
        } => {
            let mut headers = HeaderMap::new();
            headers.insert("X-Tenant-Id", HeaderValue::from_str(&tenant)?);
            if let Some(token) = stepup {
                headers.insert(
                    reqwest::header::COOKIE,
                    HeaderValue::from_str(&format!("vayva_stepup={token}"))?,
                );
            }

            let res = client
                .get(format!("{}/internal/access/{}", cli.url, feature))
                .headers(headers)
                .send()
                .await?;
            print_response(res).await?;
        }
    }

    Ok(())
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: gate returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        return Ok(());
    }

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}

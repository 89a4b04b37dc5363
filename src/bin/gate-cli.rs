use std::time::Duration;
use clap::{Parser, Subcommand};
use serde_json::Value;

#[derive(Parser)]
#[command(name = "gate-cli")]
#[command(about = "Management CLI for abuse-gate", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8080")]
    url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show service status and admission policy
    Status {
        /// Also send a test alert and report whether it arrived
        #[arg(long)]
        probe: bool,
    },
    /// Fire requests at a guarded endpoint and print each decision
    Hammer {
        #[arg(short, long, default_value_t = 20)]
        count: u32,

        #[arg(short, long, default_value_t = 500)]
        interval_ms: u64,

        #[arg(short, long, default_value = "/api/ai/chat")]
        path: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();

    match cli.command {
        Commands::Status { probe } => {
            let res = client
                .get(format!("{}/api/status", cli.url))
                .query(&[("probe", probe)])
                .send()
                .await?;
            print_response(res).await?;
        }
        Commands::Hammer { count, interval_ms, path } => {
            for i in 1..=count {
                let res = client.get(format!("{}{}", cli.url, path)).send().await?;
                let status = res.status();
                let body: Value = res.json().await.unwrap_or(Value::Null);
                let note = body
                    .get("reason")
                    .or_else(|| body.get("error"))
                    .and_then(Value::as_str)
                    .unwrap_or("");
                println!("{:>3}  {}  {}", i, status.as_u16(), note);
                tokio::time::sleep(Duration::from_millis(interval_ms)).await;
            }
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

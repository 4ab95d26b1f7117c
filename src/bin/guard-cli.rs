use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde_json::{json, Value};

#[derive(Parser)]
#[command(name = "guard-cli")]
#[command(about = "Management CLI for the M-Pesa payment gateway guard", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8080")]
    url: String,

    #[arg(short, long, env = "MPESA_GUARD_ADMIN_KEY", default_value = "")]
    key: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Gateway health (breaker state, usage metrics)
    Health,
    /// Admin status snapshot
    Status,
    /// Force the circuit breaker closed
    ResetBreaker,
    /// Send an STK push through the guard
    Pay {
        #[arg(long)]
        phone: String,
        #[arg(long)]
        amount: f64,
        #[arg(long)]
        reference: String,
        #[arg(long)]
        description: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();

    let mut headers = HeaderMap::new();
    if !cli.key.is_empty() {
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", cli.key))?,
        );
    }

    let res = match cli.command {
        Commands::Health => client.get(format!("{}/health", cli.url)).send().await?,
        Commands::Status => {
            client
                .get(format!("{}/admin/status", cli.url))
                .headers(headers)
                .send()
                .await?
        }
        Commands::ResetBreaker => {
            client
                .post(format!("{}/admin/circuit-breaker/reset", cli.url))
                .headers(headers)
                .send()
                .await?
        }
        Commands::Pay {
            phone,
            amount,
            reference,
            description,
        } => {
            client
                .post(format!("{}/api/v1/payments/stk-push", cli.url))
                .json(&json!({
                    "payer_phone": phone,
                    "amount": amount,
                    "account_reference": reference,
                    "transaction_desc": description,
                }))
                .send()
                .await?
        }
    };

    print_response(res).await
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    let text = res.text().await?;

    match serde_json::from_str::<Value>(&text) {
        Ok(json) => {
            let pretty = serde_json::to_string_pretty(&json)?;
            if status.is_success() {
                println!("{}", pretty);
            } else {
                eprintln!("Error: guard returned status {}", status);
                eprintln!("{}", pretty);
            }
        }
        Err(_) => {
            eprintln!("Error: guard returned status {}", status);
            if !text.is_empty() {
                eprintln!("Response: {}", text);
            }
        }
    }
    Ok(())
}

use clap::Parser;
use serde_json::Value;

use rpc_daemon::rpc::{RpcRequest, RpcResponse};

#[derive(Parser)]
#[command(name = "rpc-call")]
#[command(about = "Call a method on a running daemon through its HTTP compatibility transport", long_about = None)]
struct Cli {
    /// Base URL of the HTTP compatibility listener (daemon port + 1)
    #[arg(short, long, default_value = "http://localhost:50052")]
    url: String,

    /// Method name, e.g. `ping` or `config.profile`
    method: String,

    /// JSON params object or array
    #[arg(short, long)]
    params: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let params = match cli.params.as_deref() {
        Some(raw) => serde_json::from_str(raw)?,
        None => Value::Null,
    };
    let request = RpcRequest::new(cli.method, params, 1);

    let res = reqwest::Client::new()
        .post(format!("{}/rpc", cli.url.trim_end_matches('/')))
        .json(&request)
        .send()
        .await?;

    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: daemon returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        std::process::exit(1);
    }

    let response: RpcResponse = res.json().await?;
    match (response.result, response.error) {
        (_, Some(error)) => {
            eprintln!("Error {}: {}", error.code, error.message);
            std::process::exit(1);
        }
        (result, None) => println!("{}", serde_json::to_string_pretty(&result.unwrap_or(Value::Null))?),
    }

    Ok(())
}

use clap::{Parser, Subcommand};
use serde_json::Value;

use bread_proxy::proxy::codec::{self, UrlCodec};

#[derive(Parser)]
#[command(name = "proxy-cli")]
#[command(about = "Helper CLI for the Bread proxy", long_about = None)]
struct Cli {
    /// Base URL clients use to reach the proxy.
    #[arg(short, long, default_value = "http://localhost:3000")]
    base: String,

    /// Mount path the proxy is served under.
    #[arg(short, long, default_value = "/go")]
    mount: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the proxied link for an absolute URL
    Encode { url: String },
    /// Decode an encoded path segment back into its target URL
    Decode { segment: String },
    /// Fetch and print the proxy's /api/status report
    Status,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let base = cli.base.trim_end_matches('/');

    match cli.command {
        Commands::Encode { url } => {
            let codec = UrlCodec::new(cli.mount.trim_end_matches('/'));
            println!("{}", codec.proxied_url(base, &url));
        }
        Commands::Decode { segment } => {
            let segment = segment.rsplit('/').next().unwrap_or_default();
            match codec::decode(segment) {
                Some(url) => println!("{url}"),
                None => {
                    eprintln!("Error: invalid percent-encoding in {segment:?}");
                    std::process::exit(1);
                }
            }
        }
        Commands::Status => {
            let client = reqwest::Client::new();
            let res = client.get(format!("{base}/api/status")).send().await?;
            print_response(res).await?;
        }
    }

    Ok(())
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: status endpoint returned {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        return Ok(());
    }

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}

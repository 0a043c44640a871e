use std::time::Duration;

use clap::Parser;
use tokio::io::AsyncReadExt;
use tokio::net::TcpStream;

#[derive(Parser)]
#[command(name = "herald-check")]
#[command(about = "Query a herald agent the way the load balancer does", long_about = None)]
struct Cli {
    /// Agent address (host:port)
    #[arg(short, long, default_value = "127.0.0.1:5555")]
    address: String,

    /// Seconds to wait for connect and response
    #[arg(short, long, default_value_t = 5)]
    timeout: u64,

    /// Print the token exactly as received
    #[arg(long)]
    raw: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let timeout = Duration::from_secs(cli.timeout);

    let mut stream = tokio::time::timeout(timeout, TcpStream::connect(&cli.address))
        .await
        .map_err(|_| format!("timed out connecting to {}", cli.address))??;

    let mut response = String::new();
    tokio::time::timeout(timeout, stream.read_to_string(&mut response))
        .await
        .map_err(|_| format!("timed out reading from {}", cli.address))??;

    if cli.raw {
        print!("{}", response);
        return Ok(());
    }

    let token = response.trim_end_matches(['\r', '\n']);
    if token.is_empty() {
        println!("<noop>");
    } else {
        println!("{}", token);
    }
    Ok(())
}

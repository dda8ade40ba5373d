use anyhow::Result;
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::debug;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "ledger-cli")]
#[command(about = "CLI client for a ledger node")]
struct Cli {
    /// Node base URL
    #[arg(long, global = true, default_value = "http://127.0.0.1:3000")]
    node: String,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show the chain, or one page of it (newest first)
    Blocks {
        #[arg(long)]
        page: Option<usize>,
    },
    /// Mine a block carrying free-form data
    Mine {
        #[arg(long)]
        data: String,
    },
    /// Mine the pending transactions plus a reward
    MineTransactions,
    /// Pay from the node's wallet
    Transact {
        #[arg(long)]
        recipient: String,
        #[arg(long)]
        amount: u64,
    },
    /// Balance of the node's wallet, or of another address
    Wallet {
        #[arg(long)]
        address: Option<String>,
    },
    /// Pending transactions
    Pool,
    /// Every address seen on the chain
    Addresses,
}

#[derive(Serialize)]
struct MineBody {
    data: String,
}

#[derive(Serialize)]
struct TransactBody {
    recipient: String,
    amount: u64,
}

enum Request {
    Get(String),
    Post(String, serde_json::Value),
}

impl Command {
    fn request(self) -> Result<Request> {
        Ok(match self {
            Command::Blocks { page: None } => Request::Get("/api/blocks".into()),
            Command::Blocks { page: Some(page) } => Request::Get(format!("/api/blocks/{page}")),
            Command::Mine { data } => {
                Request::Post("/api/mine".into(), serde_json::to_value(MineBody { data })?)
            }
            Command::MineTransactions => Request::Get("/api/mine-transactions".into()),
            Command::Transact { recipient, amount } => Request::Post(
                "/api/transact".into(),
                serde_json::to_value(TransactBody { recipient, amount })?,
            ),
            Command::Wallet { address: None } => Request::Get("/api/wallet-info".into()),
            Command::Wallet {
                address: Some(address),
            } => Request::Get(format!("/api/wallet-info/{address}")),
            Command::Pool => Request::Get("/api/transaction-pool-map".into()),
            Command::Addresses => Request::Get("/api/known-addresses".into()),
        })
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .pretty()
        .init();

    let cli = Cli::parse();
    let node = cli.node.trim_end_matches('/').to_owned();
    let client = reqwest::Client::new();

    let res = match cli.cmd.request()? {
        Request::Get(path) => {
            debug!("GET {node}{path}");
            client.get(format!("{node}{path}")).send().await?
        }
        Request::Post(path, body) => {
            debug!("POST {node}{path}");
            client.post(format!("{node}{path}")).json(&body).send().await?
        }
    };

    let status = res.status();
    let body = res.text().await?;
    println!("status: {}", status);
    match serde_json::from_str::<serde_json::Value>(&body) {
        Ok(json) => println!("{}", serde_json::to_string_pretty(&json)?),
        Err(_) => println!("{body}"),
    }
    Ok(())
}

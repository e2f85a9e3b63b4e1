//! Splitpay CLI: command-line interface for a running Splitpay node.
//!
//! Subcommands: init, status, request, show, cancel, payout, profile, simulate.

mod client;
mod commands;

use clap::{Parser, Subcommand};

/// Splitpay: QR payment requests with split payouts.
#[derive(Parser, Debug)]
#[command(name = "splitpay", version, about, long_about = None)]
struct Cli {
    /// API endpoint of the node.
    #[arg(short, long, global = true, default_value = "http://127.0.0.1:8080")]
    endpoint: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Write a starter node configuration with a fresh webhook secret.
    Init(commands::init::InitArgs),
    /// Query the health of a running node.
    Status,
    /// Issue a payment link for a recipient.
    Request(commands::request::RequestArgs),
    /// Show a payment request.
    Show(commands::request::ShowArgs),
    /// Cancel a pending payment request.
    Cancel(commands::request::CancelArgs),
    /// Trigger or retry the payout of a paid request.
    Payout(commands::payout::PayoutArgs),
    /// Show or set a recipient's payout destination.
    Profile(commands::profile::ProfileArgs),
    /// Send a signed gateway event to the node (internal gateway only).
    Simulate(commands::simulate::SimulateArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let client = client::ApiClient::new(&cli.endpoint);

    match &cli.command {
        Commands::Init(args) => commands::init::run(args),
        Commands::Status => commands::status::run(&client).await,
        Commands::Request(args) => commands::request::create(&client, args).await,
        Commands::Show(args) => commands::request::show(&client, args).await,
        Commands::Cancel(args) => commands::request::cancel(&client, args).await,
        Commands::Payout(args) => commands::payout::run(&client, args).await,
        Commands::Profile(args) => commands::profile::run(&client, args).await,
        Commands::Simulate(args) => commands::simulate::run(&client, args).await,
    }
}

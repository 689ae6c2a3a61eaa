use std::{path::PathBuf, sync::Arc};

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use client_core::{
    ClientConfig, ClientError, ContractModules, JobDraft, MarketplaceClient, MutationReceipt,
    Snapshot, ViewIntent, ViewState, WatchIdentity,
};
use ledger_client::{HttpLedger, HttpWalletBridge};
use shared::{
    amount::Amount,
    domain::{AccountAddress, JobId, PaymentId},
};
use tracing::debug;
use tracing_subscriber::EnvFilter;

mod config;
mod render;

use config::{load_settings, Settings};

#[derive(Parser, Debug)]
#[command(name = "marketplace", about = "Freelance marketplace ledger client")]
struct Cli {
    /// Config file; `marketplace.toml` in the working directory if present.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Account that signs transactions and scopes the "my ..." views.
    #[arg(long)]
    account: Option<String>,
    /// Print views as JSON instead of tables.
    #[arg(long)]
    json: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List jobs, optionally filtered by client or freelancer, or show one job.
    Jobs {
        #[arg(long, conflicts_with_all = ["freelancer", "id"])]
        client: Option<String>,
        #[arg(long, conflicts_with = "id")]
        freelancer: Option<String>,
        #[arg(long)]
        id: Option<u64>,
    },
    PostJob {
        #[arg(long)]
        description: String,
        /// Payment in whole coins, e.g. `2.5`.
        #[arg(long)]
        amount: String,
        /// RFC 3339 timestamp, e.g. `2030-03-05T14:30:00Z`.
        #[arg(long)]
        deadline: String,
        #[arg(long)]
        job_id: Option<u64>,
    },
    AcceptJob {
        job_id: u64,
    },
    CompleteJob {
        job_id: u64,
    },
    PayFreelancer {
        job_id: u64,
    },
    RegisterFreelancer,
    /// List payments, optionally filtered by payer or payee, or show one payment.
    Payments {
        #[arg(long, conflicts_with_all = ["payee", "id"])]
        payer: Option<String>,
        #[arg(long, conflicts_with = "id")]
        payee: Option<String>,
        #[arg(long)]
        id: Option<u64>,
    },
    Pay {
        #[arg(long)]
        to: String,
        #[arg(long)]
        amount: String,
        #[arg(long, default_value = "")]
        message: String,
    },
    Refund {
        payment_id: u64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let settings = load_settings(cli.config.as_deref())?;
    let account = cli
        .account
        .as_deref()
        .or(settings.account.as_deref())
        .map(parse_address)
        .transpose()?;
    let client = build_client(&settings, account)?;

    run(&client, cli.command, cli.json).await
}

fn build_client(settings: &Settings, account: Option<AccountAddress>) -> Result<Arc<MarketplaceClient>> {
    let modules = ContractModules {
        address: settings
            .module_address
            .parse()
            .with_context(|| format!("invalid module address '{}'", settings.module_address))?,
        jobs_module: settings.jobs_module.clone(),
        payments_module: settings.payments_module.clone(),
    };
    let ledger = HttpLedger::new(settings.node_url())
        .with_context(|| format!("invalid node url '{}'", settings.node_url()))?
        .with_poll_interval(settings.poll_interval);
    let wallet = HttpWalletBridge::new(&settings.wallet_url)
        .with_context(|| format!("invalid wallet url '{}'", settings.wallet_url))?;
    debug!(node = %ledger.node_url(), network = ?settings.network, "ledger client configured");

    let mut config = ClientConfig::new(modules);
    config.finality_timeout = settings.finality_timeout;
    config.view_timeout = settings.view_timeout;

    Ok(MarketplaceClient::new(
        config,
        Arc::new(ledger),
        Arc::new(wallet),
        Arc::new(WatchIdentity::new(account)),
    ))
}

async fn run(client: &MarketplaceClient, command: Command, json: bool) -> Result<()> {
    match command {
        Command::Jobs {
            client: by_client,
            freelancer,
            id,
        } => {
            let state = match (by_client, freelancer, id) {
                (_, _, Some(id)) => client.fetch_job(JobId(id)).await,
                (Some(address), _, _) => {
                    load(client, ViewIntent::JobsByClient(parse_address(&address)?)).await
                }
                (_, Some(address), _) => {
                    load(client, ViewIntent::JobsByFreelancer(parse_address(&address)?)).await
                }
                _ => load(client, ViewIntent::AllJobs).await,
            };
            print_view(&state, json)
        }
        Command::Payments { payer, payee, id } => {
            let state = match (payer, payee, id) {
                (_, _, Some(id)) => client.fetch_payment(PaymentId(id)).await,
                (Some(address), _, _) => {
                    load(client, ViewIntent::PaymentsByPayer(parse_address(&address)?)).await
                }
                (_, Some(address), _) => {
                    load(client, ViewIntent::PaymentsByPayee(parse_address(&address)?)).await
                }
                _ => load(client, ViewIntent::AllPayments).await,
            };
            print_view(&state, json)
        }
        Command::PostJob {
            description,
            amount,
            deadline,
            job_id,
        } => {
            let draft = JobDraft {
                job_id: job_id.map(JobId),
                description,
                payment_amount: parse_amount(&amount)?,
                deadline: DateTime::parse_from_rfc3339(&deadline)
                    .with_context(|| format!("invalid deadline '{deadline}'"))?
                    .with_timezone(&Utc),
            };
            let (job_id, receipt) = client.post_job(draft).await.map_err(notice)?;
            println!("Posted job {job_id}.");
            print_receipt(&receipt);
            Ok(())
        }
        Command::AcceptJob { job_id } => report(client.accept_job(JobId(job_id)).await),
        Command::CompleteJob { job_id } => report(client.complete_job(JobId(job_id)).await),
        Command::PayFreelancer { job_id } => report(client.pay_freelancer(JobId(job_id)).await),
        Command::RegisterFreelancer => report(client.register_freelancer().await),
        Command::Pay {
            to,
            amount,
            message,
        } => {
            let payee = parse_address(&to)?;
            let amount = parse_amount(&amount)?;
            report(client.make_payment(payee, amount, message).await)
        }
        Command::Refund { payment_id } => report(client.refund_payment(PaymentId(payment_id)).await),
    }
}

async fn load(client: &MarketplaceClient, intent: ViewIntent) -> ViewState {
    client.refresh([intent.clone()]).await;
    client.view(&intent).await
}

fn print_view(state: &ViewState, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(state)?);
        return Ok(());
    }
    match state.snapshot() {
        Some(Snapshot::Jobs(jobs)) => print!("{}", render::jobs_table(jobs)),
        Some(Snapshot::Job(Some(job))) => print!("{}", render::job_detail(job)),
        Some(Snapshot::Payments(payments)) => print!("{}", render::payments_table(payments)),
        Some(Snapshot::Payment(Some(payment))) => print!("{}", render::payment_detail(payment)),
        Some(Snapshot::Job(None) | Snapshot::Payment(None)) => println!("Not found."),
        None => println!("Not loaded."),
    }
    if let Some(line) = render::degraded_notice(state) {
        println!("{line}");
    }
    Ok(())
}

fn print_receipt(receipt: &MutationReceipt) {
    println!(
        "Transaction {} committed at version {}.",
        receipt.hash, receipt.version
    );
}

fn report(result: Result<MutationReceipt, ClientError>) -> Result<()> {
    let receipt = result.map_err(notice)?;
    print_receipt(&receipt);
    Ok(())
}

fn notice(err: ClientError) -> anyhow::Error {
    anyhow!(err.notice())
}

fn parse_address(raw: &str) -> Result<AccountAddress> {
    raw.parse()
        .with_context(|| format!("invalid account address '{raw}'"))
}

fn parse_amount(raw: &str) -> Result<Amount> {
    raw.parse().with_context(|| format!("invalid amount '{raw}'"))
}

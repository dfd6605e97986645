//! solsweep - Account Sweep CLI
//!
//! Moves every holding of the configured keypair's account to
//! `SOLSWEEP_DESTINATION`.
//!
//! Run modes:
//!   solsweep plan           - Discover holdings and print the plan
//!   solsweep run            - Execute, asking before each signature and after failures
//!   solsweep run --yes      - Execute without prompts

use async_trait::async_trait;
use solsweep::common::config::SweepConfig;
use solsweep::solana::{
    load_keypair_from_file, ApprovingSigner, Approver, AutoApprove, KeypairSigner, SolClient,
    TransactionSummary,
};
use solsweep::sweep::{
    AlwaysContinue, ContinuationPolicy, FailureContext, LogNotifier, NotificationSink,
    StaticPriceEstimator, SweepOrchestrator, SweepSigner, WebhookNotifier,
};
use solsweep::types::{lamports_to_display, RecordUpdate, RunOutcome, SweepPlan, TxStatus};
use std::env;
use std::io::{BufRead, Write};
use std::sync::Arc;
use std::time::Duration;

#[tokio::main]
async fn main() {
    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        print_usage();
        return;
    }

    let code = match args[1].as_str() {
        "plan" => run_plan().await,
        "run" => run_sweep(&args[2..]).await,
        "help" | "--help" | "-h" => {
            print_usage();
            0
        }
        _ => {
            print_usage();
            2
        }
    };

    std::process::exit(code);
}

fn print_usage() {
    println!("solsweep - Move every holding of an account you control to another account");
    println!();
    println!("Usage:");
    println!("  solsweep plan           Discover holdings and print the sweep plan");
    println!("  solsweep run [--yes]    Execute the sweep (--yes skips all prompts)");
    println!();
    println!("Environment Variables:");
    println!("  SOLSWEEP_DESTINATION    Receiving account (required)");
    println!("  SOLSWEEP_KEYPAIR        Owner keypair file (default: ~/.config/solana/id.json)");
    println!("  SOLSWEEP_NETWORK        mainnet, testnet or devnet (default: devnet)");
    println!("  SOLSWEEP_RPC_URL        RPC endpoint (default: per network)");
    println!("  SOLSWEEP_NOTIFY_URL     Webhook base URL for lifecycle events");
    println!();
    println!("See SweepConfig for the full list.");
}

/// Load config, logging, keypair and ledger shared by both modes
fn setup() -> Result<(SweepConfig, SolClient, KeypairSigner), String> {
    let config = SweepConfig::from_env().map_err(|e| format!("Configuration error: {}", e))?;
    solsweep::init_from_config(&config).map_err(|e| e.to_string())?;

    let keypair = load_keypair_from_file(&config.keypair_path).map_err(|e| e.to_string())?;
    let client = SolClient::from_config(&config);
    let signer = KeypairSigner::new(keypair, client.rpc());

    Ok((config, client, signer))
}

fn orchestrator(
    config: &SweepConfig,
    client: SolClient,
    signer: Arc<dyn SweepSigner>,
) -> SweepOrchestrator {
    let estimator = StaticPriceEstimator::new(config.sol_price_usd, config.token_unit_price_usd);

    let notifier: Arc<dyn NotificationSink> = match &config.notify_url {
        Some(url) => match WebhookNotifier::new(url, Duration::from_secs(10)) {
            Ok(webhook) => Arc::new(webhook),
            Err(e) => {
                eprintln!("Warning: webhook disabled: {}", e);
                Arc::new(LogNotifier)
            }
        },
        None => Arc::new(LogNotifier),
    };

    SweepOrchestrator::new(Arc::new(client), signer, config.sweep.clone())
        .with_estimator(Arc::new(estimator))
        .with_notifier(notifier)
}

async fn run_plan() -> i32 {
    let (config, client, signer) = match setup() {
        Ok(parts) => parts,
        Err(e) => {
            eprintln!("{}", e);
            return 1;
        }
    };

    config.print_summary();
    let orchestrator = orchestrator(&config, client, Arc::new(signer));

    match orchestrator.prepare().await {
        Ok(prepared) => {
            if prepared.discovery_degraded {
                println!("Warning: balance discovery failed; showing an empty plan");
            }
            print_plan(&orchestrator, &prepared.plan);
            0
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            1
        }
    }
}

async fn run_sweep(args: &[String]) -> i32 {
    let assume_yes = args.iter().any(|a| a == "--yes" || a == "-y");

    let (config, client, keypair_signer) = match setup() {
        Ok(parts) => parts,
        Err(e) => {
            eprintln!("{}", e);
            return 1;
        }
    };

    config.print_summary();

    let approver: Arc<dyn Approver> = if assume_yes {
        Arc::new(AutoApprove)
    } else {
        Arc::new(PromptApprover)
    };
    let continuation: Arc<dyn ContinuationPolicy> = if assume_yes {
        Arc::new(AlwaysContinue)
    } else {
        Arc::new(PromptContinuation)
    };

    let signer = ApprovingSigner::new(keypair_signer, approver);
    let orchestrator =
        orchestrator(&config, client, Arc::new(signer)).with_continuation(continuation);

    let (updates_tx, mut updates_rx) = tokio::sync::mpsc::unbounded_channel::<RecordUpdate>();
    let printer = tokio::spawn(async move {
        while let Some(update) = updates_rx.recv().await {
            let record = update.record;
            match record.status {
                TxStatus::Success | TxStatus::Error => println!(
                    "  [{}] {} {} {}{}",
                    record.status,
                    record.amount,
                    record.symbol,
                    record.signature.as_deref().unwrap_or(""),
                    record
                        .error
                        .as_deref()
                        .map(|e| format!(" ({})", e))
                        .unwrap_or_default()
                ),
                _ => println!("  [{}] {} {}", record.status, record.amount, record.symbol),
            }
        }
    });

    let result = orchestrator.run_with_updates(updates_tx).await;
    // The sender is dropped with the run, which ends the printer
    let _ = printer.await;

    match result {
        Ok(report) => {
            println!();
            println!("{}", report);
            match report.outcome {
                RunOutcome::Completed | RunOutcome::NothingToSweep => 0,
                _ => 1,
            }
        }
        Err(e) => {
            eprintln!("Error [{}]: {}", e.error_code(), e);
            1
        }
    }
}

fn print_plan(orchestrator: &SweepOrchestrator, plan: &SweepPlan) {
    println!();
    println!("=== Sweep Plan ===");
    println!("From: {}", orchestrator.owner());
    println!("To:   {}", orchestrator.settings().destination);
    println!();

    if plan.is_empty() {
        println!("Nothing to sweep.");
        return;
    }

    for batch in &plan.batches {
        println!("Transaction {} ({} transfers):", batch.number, batch.len());
        for holding in &batch.holdings {
            println!("  {}", holding);
        }
    }

    if let Some((_, native)) = &plan.native {
        println!("Transaction {} (native, last):", plan.step_count());
        println!(
            "  {} (reserve {} kept)",
            native,
            lamports_to_display(orchestrator.settings().native_reserve_lamports)
        );
    }

    println!();
    println!("{} transaction(s) to sign.", plan.step_count());
}

// ============================================================================
// Interactive prompts
// ============================================================================

async fn ask(question: String) -> bool {
    tokio::task::spawn_blocking(move || {
        print!("{} [y/N] ", question);
        let _ = std::io::stdout().flush();

        let mut line = String::new();
        match std::io::stdin().lock().read_line(&mut line) {
            Ok(_) => matches!(line.trim().to_lowercase().as_str(), "y" | "yes"),
            Err(_) => false,
        }
    })
    .await
    .unwrap_or(false)
}

struct PromptApprover;

#[async_trait]
impl Approver for PromptApprover {
    async fn approve(&self, summary: &TransactionSummary) -> bool {
        ask(format!(
            "Sign transaction from {} with {} instruction(s)?",
            summary.fee_payer, summary.instructions
        ))
        .await
    }
}

struct PromptContinuation;

#[async_trait]
impl ContinuationPolicy for PromptContinuation {
    async fn should_continue(&self, context: &FailureContext) -> bool {
        ask(format!("{}. Continue with the remaining steps?", context)).await
    }
}

//! AgentProof demo CLI
//!
//! Searches a live agent registry, or runs the reference verification
//! scenarios against the simulated ledger and negotiator.
//!
//! Usage:
//!   cargo run -p demo -- search assistant --limit 3
//!   cargo run -p demo -- --config agentproof.toml search weather
//!   cargo run -p demo -- run-all
//!   cargo run -p demo -- end-to-end
//!   cargo run -p demo -- unknown-agent
//!   cargo run -p demo -- supersede
//!   cargo run -p demo -- timeout

use std::{path::PathBuf, sync::Arc};

use clap::{Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use agentproof_config::AgentProofConfig;
use agentproof_contracts::{error::AgentProofResult, outcome::SessionOutcome};
use agentproof_core::{SessionManager, StagePipeline};
use agentproof_registry::HttpRegistryClient;
use agentproof_sim::{
    scenarios::{end_to_end, summarize, supersession, timeout, unknown_agent},
    AnchoredLedger, LoopbackNegotiator,
};

// ── CLI definition ────────────────────────────────────────────────────────────

/// AgentProof: verify agent identities before talking to them.
#[derive(Parser)]
#[command(
    name = "demo",
    about = "AgentProof agent identity verification demo",
    long_about = "Searches the configured agent registry, or runs the reference scenarios\n\
                  showing staged verification, supersession and stage timeouts."
)]
struct Cli {
    /// TOML configuration file. Defaults apply when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Search the live registry configured in --config.
    Search {
        query: String,
        /// Maximum number of hits; defaults to search.default_limit.
        #[arg(long)]
        limit: Option<u32>,
    },
    /// Run all four reference scenarios in sequence.
    RunAll,
    /// Scenario 1: search, select and verify an agent end to end.
    EndToEnd,
    /// Scenario 2: verify an agent the registry does not know.
    UnknownAgent,
    /// Scenario 3: select a second agent while the first is verifying.
    Supersede,
    /// Scenario 4: a stage that exceeds its time bound.
    Timeout,
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() {
    // Set RUST_LOG=debug for stage-level progress.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_target(false)
        .compact()
        .init();

    let cli = Cli::parse();

    let result = match load_config(cli.config.as_ref()) {
        Ok(config) => run(cli.command, &config).await,
        Err(e) => Err(e),
    };

    if let Err(e) = result {
        eprintln!("Demo error: {} [{}]", e, e.reason_code());
        std::process::exit(1);
    }
}

fn load_config(path: Option<&PathBuf>) -> AgentProofResult<AgentProofConfig> {
    match path {
        Some(path) => {
            debug!(path = %path.display(), "loading configuration");
            AgentProofConfig::from_file(path)
        }
        None => Ok(AgentProofConfig::default()),
    }
}

async fn run(command: Command, config: &AgentProofConfig) -> AgentProofResult<()> {
    match command {
        Command::Search { query, limit } => {
            search(config, &query, limit.unwrap_or(config.search.default_limit)).await?;
        }
        Command::RunAll => run_all(config).await?,
        Command::EndToEnd => {
            print_banner();
            report(&end_to_end::run_scenario(config.stage_timeouts()).await?);
        }
        Command::UnknownAgent => {
            print_banner();
            report(&unknown_agent::run_scenario(config.stage_timeouts()).await?);
        }
        Command::Supersede => {
            print_banner();
            let (first, second) = supersession::run_scenario(config.stage_timeouts()).await?;
            report(&first);
            report(&second);
        }
        Command::Timeout => {
            print_banner();
            report(&timeout::run_scenario().await?);
        }
    }
    Ok(())
}

// ── Commands ──────────────────────────────────────────────────────────────────

/// Search through a `SessionManager`, the same path a selection UI would
/// use before starting a verification.
async fn search(config: &AgentProofConfig, query: &str, limit: u32) -> AgentProofResult<()> {
    let registry = HttpRegistryClient::new(&config.registry.base_url, config.request_timeout())?;
    println!("Searching {} for \"{}\" (limit {})", registry.base_url(), query.trim(), limit);

    let pipeline = StagePipeline::new(
        Arc::new(registry),
        Arc::new(AnchoredLedger::new()),
        Arc::new(LoopbackNegotiator::new()),
    )
    .with_timeouts(config.stage_timeouts());
    let manager = SessionManager::new(pipeline);

    let hits = manager.search(query, limit).await?;
    if hits.is_empty() {
        println!("No agents found.");
    }
    for hit in &hits {
        println!(
            "  {:<40} {:<32} trust {}",
            hit.uaid,
            hit.name,
            hit.trust_score.map(|t| t.to_string()).unwrap_or_else(|| "n/a".to_string())
        );
    }
    Ok(())
}

async fn run_all(config: &AgentProofConfig) -> AgentProofResult<()> {
    print_banner();
    end_to_end::run_scenario(config.stage_timeouts()).await?;
    unknown_agent::run_scenario(config.stage_timeouts()).await?;
    supersession::run_scenario(config.stage_timeouts()).await?;
    timeout::run_scenario().await?;
    println!("All scenarios completed.");
    Ok(())
}

fn report(outcome: &SessionOutcome) {
    println!("Result: {}", summarize(outcome));
}

// ── Banner ────────────────────────────────────────────────────────────────────

fn print_banner() {
    println!();
    println!("AgentProof: Agent Identity Verification");
    println!("=======================================");
    println!();
    println!("Verification stages per session:");
    println!("  [1] Resolve Profile          registry resolves the UAID");
    println!("  [2] Verify On-Chain Identity ledger checks the identity anchor");
    println!("  [3] Establish Channel        session key negotiated with the agent");
    println!();
    println!("Selecting a new agent cancels the session in flight.");
    println!();
}

//! `socrates` command-line interface.
//!
//! Drives the response orchestrator from a terminal: one-off questions,
//! an interactive coaching session, and status/health inspection.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing_subscriber::EnvFilter;

use socrates_core::{ChatTurn, OrchestrationResult, RequestContext, StepMetadata};
use socrates_runtime::{ProviderFactoryRegistry, ResponseOrchestrator, RuntimeConfig};

#[derive(Parser)]
#[command(name = "socrates")]
#[command(
    about = "Socratic goal-setting coach with resilient provider fallback",
    long_about = None
)]
#[command(version)]
struct Cli {
    /// YAML configuration file (defaults: gemini, openai, static)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Print machine-readable JSON
    #[arg(long, global = true)]
    json: bool,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ask a single question
    Ask {
        prompt: String,

        /// Wizard step (1-9)
        #[arg(short, long, default_value_t = 1)]
        step: u8,

        /// Topic the student is working on
        #[arg(short, long)]
        topic: Option<String>,

        /// JSON file with prior turns: [{"role": "user", "content": "..."}]
        #[arg(long)]
        history: Option<PathBuf>,
    },

    /// Interactive coaching session
    Chat {
        /// Wizard step (1-9)
        #[arg(short, long, default_value_t = 1)]
        step: u8,

        #[arg(short, long)]
        topic: Option<String>,
    },

    /// Show circuit-level provider status
    Status,

    /// Probe every provider and report health
    Health,

    /// Print the configuration in effect as YAML
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Config => {
            print!("{}", config.to_yaml()?);
            if !cli.json {
                let registry = ProviderFactoryRegistry::with_defaults();
                println!();
                println!("# Provider types:");
                for info in registry.catalog() {
                    let reach = if info.networked { "network" } else { "offline" };
                    println!("#   {:<8} {:<8} {}", info.provider_type, reach, info.description);
                }
            }
        }
        Commands::Status => {
            let orchestrator = ResponseOrchestrator::from_config(config)?;
            let status = orchestrator.status();
            if cli.json {
                print_json(&status)?;
            } else {
                println!("Providers:      {}", orchestrator.provider_names().join(" -> "));
                let primary = if status.primary_available {
                    "available"
                } else {
                    "circuit open"
                };
                println!("Primary:        {primary}");
                println!(
                    "Fallbacks:      {}/{}",
                    status.fallbacks_available,
                    status.total_providers.saturating_sub(1)
                );
            }
        }
        Commands::Health => {
            let orchestrator = ResponseOrchestrator::from_config(config)?;
            let report = orchestrator.health_check().await;
            if cli.json {
                print_json(&report)?;
            } else {
                println!("Checked at {}", report.checked_at.to_rfc3339());
                for p in &report.providers {
                    println!(
                        "  {:<8} {:<12} circuit {:<6} failures {} cost {}",
                        p.name,
                        if p.available { "available" } else { "unavailable" },
                        if p.circuit_open { "open" } else { "closed" },
                        p.failures,
                        p.cost
                    );
                }
                println!("{}/{} healthy", report.healthy_count(), report.providers.len());
            }
        }
        Commands::Ask {
            prompt,
            step,
            topic,
            history,
        } => {
            let orchestrator = ResponseOrchestrator::from_config(config)?;
            let mut context = RequestContext::new(step_metadata(step, topic));
            if let Some(path) = history {
                let json = std::fs::read_to_string(&path)
                    .with_context(|| format!("Failed to read history from {}", path.display()))?;
                context = context.with_history(RequestContext::history_from_json(&json)?);
            }

            let result = orchestrator.generate_response(&prompt, &context).await;
            if cli.json {
                print_json(&result)?;
            } else {
                print_reply(&result);
            }
        }
        Commands::Chat { step, topic } => {
            let orchestrator = ResponseOrchestrator::from_config(config)?;
            chat(&orchestrator, step_metadata(step, topic), cli.json).await?;
        }
    }

    Ok(())
}

fn init_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if verbose { "debug" } else { "info" }));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn load_config(path: Option<&Path>) -> Result<RuntimeConfig> {
    match path {
        Some(path) => {
            tracing::debug!(path = %path.display(), "Loading configuration");
            RuntimeConfig::from_yaml_file(path)
                .with_context(|| format!("Failed to load config from {}", path.display()))
        }
        None => Ok(RuntimeConfig::default()),
    }
}

fn step_metadata(step: u8, topic: Option<String>) -> StepMetadata {
    let metadata = StepMetadata::step(step);
    match topic {
        Some(topic) => metadata.with_topic(topic),
        None => metadata,
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_reply(result: &OrchestrationResult) {
    println!("{}", result.text);
    if !result.success {
        eprintln!(
            "[degraded] no provider answered: {}",
            result.error.as_deref().unwrap_or("unknown error")
        );
    } else if result.used_fallback {
        eprintln!("[degraded] answered by {}", result.provider_name);
    }
}

async fn chat(orchestrator: &ResponseOrchestrator, step: StepMetadata, json: bool) -> Result<()> {
    let mut context = RequestContext::new(step);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    eprintln!("Step {}. Type your answer, or an empty line to quit.", context.step.number);

    loop {
        stdout.write_all(b"> ").await?;
        stdout.flush().await?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let prompt = line.trim();
        if prompt.is_empty() {
            break;
        }

        let result = orchestrator.generate_response(prompt, &context).await;
        if json {
            print_json(&result)?;
        } else {
            print_reply(&result);
        }

        context.history.push(ChatTurn::user(prompt));
        if result.success {
            context.history.push(ChatTurn::assistant(result.text));
        }
    }

    Ok(())
}

use std::io::Write;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crux_agents::agents::AgentFactory;
use crux_agents::config::{check_endpoint, load_personas, AgentsConfig};
use crux_agents::event_log::{read_events, EventLogWriter};
use crux_agents::prompts::PROMPT_VERSION;
use crux_agents::report;
use crux_coordination::persona::select_personas;
use crux_coordination::{
    DebateError, DebateMode, DebateOrchestrator, DebateState, EventSink, CHANNEL_CAPACITY,
};

/// Command-line arguments
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Emit logs as JSON instead of human-readable text
    #[arg(long, global = true, default_value_t = false)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run a debate, printing events as JSON lines on stdout
    Run {
        /// Question or proposition to debate
        #[arg(long)]
        topic: String,

        /// YAML persona roster
        #[arg(long)]
        personas: PathBuf,

        /// Only seat these persona ids (default: the whole roster)
        #[arg(long = "persona")]
        seat: Vec<String>,

        /// TOML config with [endpoint] and [debate] sections
        #[arg(long)]
        config: Option<PathBuf>,

        /// rounds, free-form or sequential (overrides the config file)
        #[arg(long)]
        mode: Option<DebateMode>,

        /// Enable argument-graph rounds
        #[arg(long, default_value_t = false)]
        graph: bool,

        /// Also write the event stream to this JSONL file
        #[arg(long)]
        events: Option<PathBuf>,
    },

    /// Fold a JSONL event log and print the reconstructed state
    Replay {
        path: PathBuf,

        /// Print the full state as JSON instead of a summary
        #[arg(long, default_value_t = false)]
        json: bool,
    },

    /// Probe the configured inference endpoint
    Check {
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

fn init_logging(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info".into());
    // stdout carries the event stream, so logs go to stderr.
    if json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.json_logs);

    match cli.command {
        Command::Run {
            topic,
            personas,
            seat,
            config,
            mode,
            graph,
            events,
        } => {
            let mut config = AgentsConfig::load(config.as_deref())?;
            if let Some(mode) = mode {
                config.debate.mode = mode;
            }
            config.debate.graph.enabled |= graph;
            config.events_path = events;

            let roster = load_personas(&personas)?;
            let roster = if seat.is_empty() {
                roster
            } else {
                select_personas(&roster, &seat)?
            };
            run(config, roster, &topic).await
        }
        Command::Replay { path, json } => replay(&path, json),
        Command::Check { config } => {
            let config = AgentsConfig::load(config.as_deref())?;
            if check_endpoint(&config.endpoint.url).await {
                info!(
                    url = %config.endpoint.url,
                    model = %config.endpoint.model,
                    "Endpoint reachable"
                );
                Ok(())
            } else {
                bail!("Endpoint {} is not reachable", config.endpoint.url)
            }
        }
    }
}

async fn run(
    config: AgentsConfig,
    personas: Vec<crux_coordination::PersonaProfile>,
    topic: &str,
) -> Result<()> {
    info!(
        url = %config.endpoint.url,
        model = %config.endpoint.model,
        mode = %config.debate.mode,
        graph = config.debate.graph.enabled,
        personas = personas.len(),
        prompt_version = PROMPT_VERSION,
        "Debate starting"
    );

    let factory = AgentFactory::new(&config)?;
    let collaborators = factory.collaborators(&personas);
    let orchestrator = DebateOrchestrator::new(config.debate.clone(), personas, collaborators)
        .context("Failed to set up debate")?;

    let mut log = config
        .events_path
        .as_deref()
        .map(EventLogWriter::create)
        .transpose()?;

    // Ctrl-C stops the consumer; dropping the receiver cancels the debate
    // at its next event.
    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, cancelling debate");
            on_signal.cancel();
        }
    });

    let (sink, mut receiver) = EventSink::channel(CHANNEL_CAPACITY);
    let consume = async {
        let mut stdout = std::io::stdout();
        loop {
            let envelope = tokio::select! {
                _ = cancel.cancelled() => break,
                next = receiver.recv() => match next {
                    Some(envelope) => envelope,
                    None => break,
                },
            };
            if let Some(log) = log.as_mut() {
                log.append(&envelope)?;
            }
            serde_json::to_writer(&mut stdout, &envelope)?;
            writeln!(stdout)?;
        }
        drop(receiver);
        anyhow::Ok(())
    };

    let (outcome, consumed) = tokio::join!(orchestrator.run(topic, sink), consume);
    consumed.context("Failed to record event stream")?;
    if let Some(log) = &log {
        info!(events = log.written(), "Event log written");
    }

    match outcome {
        Ok(state) => {
            eprint!("{}", report::summarize(&state));
            Ok(())
        }
        Err(DebateError::Cancelled) => {
            warn!("Debate cancelled before completion");
            Ok(())
        }
        Err(e) => Err(e).context("Debate failed"),
    }
}

fn replay(path: &std::path::Path, json: bool) -> Result<()> {
    let events = read_events(path)?;
    let state = DebateState::replay(&events)
        .with_context(|| format!("Failed to replay {}", path.display()))?;
    info!(events = events.len(), finished = state.is_finished(), "Replay complete");
    if json {
        println!("{}", serde_json::to_string_pretty(&state)?);
    } else {
        print!("{}", report::summarize(&state));
    }
    Ok(())
}

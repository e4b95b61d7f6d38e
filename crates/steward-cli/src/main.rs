mod config;

use clap::{Parser, Subcommand};
use config::{SinkKind, StewardConfig};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use steward_events::{EventPublisher, EventSink, HttpEventSink, JsonlEventSink, NullEventSink};
use steward_gateway::{AppState, GatewayServer, RateLimiter};
use steward_orchestrator::{
    AgentRegistry, ExecutionGraph, ExecutionLedger, FeedbackIngestor, FileFeedbackStore,
    HttpReasoner, RoutingPolicy, Supervisor,
};
use steward_trust::{FileTrustStore, TrustEngine};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Event delivery timeout for the HTTP sink.
const HTTP_SINK_TIMEOUT: Duration = Duration::from_secs(5);
/// How often expired rate-limit windows are pruned.
const RATE_LIMIT_CLEANUP_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Parser)]
#[command(name = "steward", about = "Steward: trust-scored agent routing")]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "steward.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP gateway
    Serve {
        /// Host to bind to (overrides config)
        #[arg(long)]
        host: Option<String>,
        /// Port to listen on (overrides config)
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Inspect registered agents
    Agents {
        #[command(subcommand)]
        action: AgentsAction,
    },
}

#[derive(Subcommand)]
enum AgentsAction {
    /// List agents with their current trust scores
    List,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    let cli = Cli::parse();
    let config = StewardConfig::load(&cli.config).await?;

    match cli.command {
        Commands::Serve { host, port } => serve(config, host, port).await,
        Commands::Agents { action } => match action {
            AgentsAction::List => list_agents(config).await,
        },
    }
}

fn build_registry() -> anyhow::Result<AgentRegistry> {
    let mut registry = AgentRegistry::new();
    steward_builtins::register_builtins(&mut registry)?;
    Ok(registry)
}

async fn build_trust(config: &StewardConfig) -> anyhow::Result<Arc<TrustEngine>> {
    let store = FileTrustStore::new(config.trust_dir()).await?;
    Ok(Arc::new(TrustEngine::new(Arc::new(store))))
}

fn build_sink(config: &StewardConfig) -> anyhow::Result<Arc<dyn EventSink>> {
    let sink: Arc<dyn EventSink> = match config.events.sink {
        SinkKind::Jsonl => Arc::new(JsonlEventSink::new(config.events_path())),
        SinkKind::Http => {
            let url = config
                .events
                .url
                .clone()
                .ok_or_else(|| anyhow::anyhow!("events.url is required for the http sink"))?;
            Arc::new(HttpEventSink::new(url, HTTP_SINK_TIMEOUT)?)
        }
        SinkKind::None => Arc::new(NullEventSink),
    };
    Ok(sink)
}

fn build_supervisor(config: &StewardConfig) -> anyhow::Result<Supervisor> {
    let routing = &config.routing;
    let mut policy = RoutingPolicy::default()
        .with_default_agent(routing.fallback_agent())
        .with_min_confidence(routing.min_confidence)
        .with_seed(routing.seed);
    if let Some(reasoner) = &routing.reasoner {
        let timeout = Duration::from_millis(reasoner.timeout_ms);
        info!(base_url = %reasoner.base_url, model = %reasoner.model, "Routing reasoner enabled");
        policy = policy.with_reasoner(Arc::new(HttpReasoner::new(reasoner.clone())?), timeout);
    }
    Ok(Supervisor::new(policy))
}

async fn serve(config: StewardConfig, host: Option<String>, port: Option<u16>) -> anyhow::Result<()> {
    let host = host.unwrap_or_else(|| config.server.host.clone());
    let port = port.unwrap_or(config.server.port);
    info!("Starting Steward gateway on {}:{}", host, port);

    let registry = Arc::new(build_registry()?);
    info!(count = registry.len(), "Built-in agents registered");

    let trust = build_trust(&config).await?;
    let publisher = Arc::new(EventPublisher::new(
        build_sink(&config)?,
        config.events.publisher.clone(),
    ));
    let ledger = Arc::new(ExecutionLedger::new(config.execution.ledger_capacity));

    let mut graph = ExecutionGraph::new(
        registry,
        build_supervisor(&config)?,
        trust.clone(),
        publisher.clone(),
    )
    .with_ledger(ledger.clone())
    .with_agent_timeout(Duration::from_millis(config.execution.agent_timeout_ms));
    if let Some(gate) = config.governance.clone() {
        info!(
            denied_agents = gate.denied_agents.len(),
            denied_users = gate.denied_users.len(),
            blocked_terms = gate.blocked_terms.len(),
            "Governance policy gate enabled"
        );
        graph = graph.with_policy_gate(Arc::new(gate));
    }
    graph.register_trust().await?;

    let feedback_store = FileFeedbackStore::open(config.feedback_path()).await?;
    let feedback = FeedbackIngestor::new(
        Arc::new(feedback_store),
        ledger,
        trust,
        publisher.clone(),
    );

    let rate_limiter = Arc::new(RateLimiter::new(config.security.rate_limits));
    let cleanup_limiter = rate_limiter.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(RATE_LIMIT_CLEANUP_INTERVAL);
        loop {
            interval.tick().await;
            cleanup_limiter.cleanup();
        }
    });

    let app = GatewayServer::build_with_middleware(
        AppState::new(Arc::new(graph), Arc::new(feedback)),
        Some(rate_limiter),
    );

    let addr = format!("{host}:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Steward gateway listening on {}", addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;

    info!("Shutting down, draining event queue");
    publisher.shutdown().await;
    let stats = publisher.stats();
    info!(
        published = stats.published,
        dropped = stats.dropped,
        failed = stats.failed,
        "Event publisher stopped"
    );
    Ok(())
}

async fn list_agents(config: StewardConfig) -> anyhow::Result<()> {
    let registry = build_registry()?;
    let trust = build_trust(&config).await?;

    println!("Registered agents:");
    for descriptor in registry.list() {
        let score = trust.register(&descriptor.id).await?;
        println!(
            "  {} ({}): {}",
            descriptor.id, descriptor.name, descriptor.description
        );
        println!(
            "    trust: {:.3}{}",
            score.value,
            if score.graduated { " (graduated)" } else { "" }
        );
        if !descriptor.keywords.is_empty() {
            println!("    keywords: {}", descriptor.keywords.join(", "));
        }
        if descriptor.requires_files {
            println!("    requires an uploaded data file");
        }
    }
    println!("\nTotal: {} agent(s)", registry.len());
    Ok(())
}

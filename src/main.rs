// Research Desk - terminal front end

use std::io::{self, IsTerminal, Write};
use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tokio::sync::broadcast;
use tracing::warn;

use research_desk::services::render::{content_lines, LineKind};
use research_desk::storage::ConfigService;
use research_desk::{
    AppState, ResearchController, ResearchSession, SessionEvent, SessionStatus, SettingsUpdate,
};
use research_desk_core::proxy::ProxyConfig;

#[derive(Debug, Parser)]
#[command(
    name = "research-desk",
    version,
    about = "Generate search-grounded research reports from a topic and a chosen framework"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file (defaults to ~/.research-desk/config.json)
    #[arg(long, global = true, env = "RESEARCH_DESK_CONFIG")]
    config: Option<PathBuf>,

    /// Proxy for model calls, e.g. socks5://127.0.0.1:1080
    #[arg(long, global = true)]
    proxy: Option<String>,

    /// Debug logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run the whole pipeline and stream the report to stdout
    Run {
        #[arg(long)]
        topic: String,
        #[arg(long)]
        objective: String,
        #[arg(long, default_value = "")]
        scope: String,
        /// Framework to use, counting from 1
        #[arg(long, default_value_t = 1)]
        framework: usize,
    },
    /// List stored sessions, newest first
    List,
    /// Print a stored session
    Show { id: String },
    /// Rename a stored session
    Rename { id: String, topic: String },
    /// Delete a stored session
    Delete { id: String },
    /// Show or change settings
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Debug, Subcommand)]
enum ConfigAction {
    /// Print the active settings
    Show,
    /// Change one or more settings
    Set {
        #[arg(long)]
        model: Option<String>,
        /// Report sampling temperature, 0.0 to 2.0
        #[arg(long)]
        temperature: Option<f32>,
        /// Ground reports with web search
        #[arg(long)]
        search: Option<bool>,
        /// Request timeout in seconds
        #[arg(long)]
        timeout: Option<u64>,
        /// Directory for the session snapshot
        #[arg(long)]
        data_dir: Option<PathBuf>,
        #[arg(long)]
        debug: Option<bool>,
    },
    /// Restore the default settings
    Reset,
}

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("research-desk error: {error:#}");
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => ConfigService::open(path.clone()),
        None => ConfigService::new(),
    }
    .context("failed to load configuration")?;
    let mut state = AppState::with_config_service(config);
    init_tracing(cli.verbose || state.config().debug_mode)?;

    if let Some(proxy) = &cli.proxy {
        let proxy = ProxyConfig::parse(proxy).context("invalid --proxy")?;
        state.set_proxy_override(Some(proxy));
    }

    match cli.command {
        Commands::Run {
            topic,
            objective,
            scope,
            framework,
        } => run_pipeline(&state, &topic, &objective, &scope, framework).await,
        Commands::List => {
            let store = state.open_store()?;
            for session in store.by_recency() {
                println!(
                    "{}  {:<22} {}  {}",
                    session.id,
                    session.status.label(),
                    format_created_at(session.created_at),
                    session.display_name()
                );
            }
            Ok(())
        }
        Commands::Show { id } => {
            let store = state.open_store()?;
            let session = store
                .get(&id)
                .with_context(|| format!("no session with id {id}"))?;
            print_session(session);
            Ok(())
        }
        Commands::Rename { id, topic } => {
            let mut store = state.open_store()?;
            store.rename(&id, &topic)?;
            Ok(())
        }
        Commands::Delete { id } => {
            let mut store = state.open_store()?;
            store
                .remove(&id)
                .with_context(|| format!("no session with id {id}"))?;
            Ok(())
        }
        Commands::Config { action } => run_config(&mut state, action),
    }
}

fn run_config(state: &mut AppState, action: ConfigAction) -> anyhow::Result<()> {
    match action {
        ConfigAction::Show => {}
        ConfigAction::Set {
            model,
            temperature,
            search,
            timeout,
            data_dir,
            debug,
        } => {
            state.update_config(SettingsUpdate {
                model,
                report_temperature: temperature,
                enable_search_grounding: search,
                request_timeout_secs: timeout,
                data_dir: data_dir.map(Some),
                debug_mode: debug,
                ..Default::default()
            })?;
        }
        ConfigAction::Reset => state.reset_config()?,
    }

    println!("# {}", state.config_path().display());
    println!("{}", serde_json::to_string_pretty(state.config())?);
    Ok(())
}

fn init_tracing(debug: bool) -> anyhow::Result<()> {
    let level = if debug { "debug" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_env("RESEARCH_DESK_LOG")
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init()
        .map_err(|error| anyhow::anyhow!("failed to initialize tracing subscriber: {error}"))?;

    Ok(())
}

async fn run_pipeline(
    state: &AppState,
    topic: &str,
    objective: &str,
    scope: &str,
    framework: usize,
) -> anyhow::Result<()> {
    let mut controller = state.open_controller()?;
    let mut events = controller.subscribe();

    controller.submit_topic(topic)?;
    controller.submit_goal(objective, scope)?;
    eprintln!("Suggesting frameworks...");
    drive(&mut controller, &mut events).await?;

    let session = current(&controller)?;
    if session.status != SessionStatus::AwaitingFrameworkSelection {
        anyhow::bail!(
            "{}",
            session.error.as_deref().unwrap_or("framework suggestion did not finish")
        );
    }
    for (i, candidate) in session.frameworks.iter().enumerate() {
        eprintln!("  {}. {}\n     {}", i + 1, candidate.prompt_label(), candidate.advantage);
    }

    let index = framework
        .checked_sub(1)
        .context("--framework counts from 1")?;
    controller.select_framework(index)?;
    eprintln!("Generating report (Ctrl-C stops and keeps what has arrived)...\n");
    drive(&mut controller, &mut events).await?;
    println!();

    let session = current(&controller)?;
    match session.status {
        SessionStatus::Success => {
            print_sources(session);
            eprintln!("\nSaved as session {}", session.id);
            Ok(())
        }
        _ => anyhow::bail!(
            "{}",
            session.error.as_deref().unwrap_or("report generation did not finish")
        ),
    }
}

enum Step {
    Progress(bool),
    Interrupted,
}

/// Apply operation events until settled, echoing report chunks to stdout.
async fn drive(
    controller: &mut ResearchController,
    events: &mut broadcast::Receiver<SessionEvent>,
) -> anyhow::Result<()> {
    let mut ctrl_c = std::pin::pin!(tokio::signal::ctrl_c());
    loop {
        let step = tokio::select! {
            _ = &mut ctrl_c => Step::Interrupted,
            more = controller.pump() => Step::Progress(more),
        };
        echo_chunks(events)?;

        match step {
            Step::Progress(true) => continue,
            Step::Progress(false) => return Ok(()),
            Step::Interrupted => {
                let status = current(controller)?.status;
                if matches!(
                    status,
                    SessionStatus::Generating | SessionStatus::LoadingMetadata
                ) {
                    controller.stop()?;
                    eprintln!("\nStopped. Keeping the partial report.");
                    return Ok(());
                }
                controller.go_back()?;
                anyhow::bail!("interrupted");
            }
        }
    }
}

fn echo_chunks(events: &mut broadcast::Receiver<SessionEvent>) -> io::Result<()> {
    let mut stdout = io::stdout().lock();
    loop {
        match events.try_recv() {
            Ok(SessionEvent::Chunk { text, .. }) => stdout.write_all(text.as_bytes())?,
            Ok(_) => {}
            Err(broadcast::error::TryRecvError::Lagged(skipped)) => {
                warn!(skipped, "Dropped report chunks");
            }
            Err(_) => break,
        }
    }
    stdout.flush()
}

fn current(controller: &ResearchController) -> anyhow::Result<&ResearchSession> {
    controller
        .current_session()
        .context("focused session is missing")
}

fn format_created_at(millis: i64) -> String {
    chrono::DateTime::from_timestamp_millis(millis)
        .map(|at| {
            at.with_timezone(&chrono::Local)
                .format("%Y-%m-%d %H:%M")
                .to_string()
        })
        .unwrap_or_else(|| "-".to_string())
}

fn print_session(session: &ResearchSession) {
    println!("# {}", session.display_name());
    println!("Status:    {}", session.status.label());
    println!("Created:   {}", format_created_at(session.created_at));
    if !session.objective.is_empty() {
        println!("Objective: {}", session.objective);
    }
    if !session.scope.is_empty() {
        println!("Scope:     {}", session.scope);
    }
    if let Some(framework) = &session.selected_framework {
        println!("Framework: {}", framework.prompt_label());
    }
    if let Some(error) = &session.error {
        println!("Error:     {}", error);
    }

    let Some(report) = &session.results else {
        return;
    };
    let highlight = io::stdout().is_terminal();

    if !report.overall_summary.is_empty() {
        println!("\n## Overall Summary");
        print_content(&report.overall_summary, highlight);
    }
    for section in &report.analysis {
        println!("\n### {}", section.title);
        print_content(&section.content, highlight);
        if let Some(sources) = &section.sources {
            println!("Sources: {}", sources);
        }
    }
    print_sources(session);
}

fn print_content(content: &str, highlight: bool) {
    for line in content_lines(content) {
        let text = line.render_with(|marker| {
            if highlight {
                format!("\x1b[2m{}\x1b[0m", marker)
            } else {
                marker.to_string()
            }
        });
        match line.kind {
            LineKind::Bullet => println!("  • {}", text),
            LineKind::Paragraph => println!("{}", text),
            LineKind::Break => println!(),
        }
    }
}

fn print_sources(session: &ResearchSession) {
    let Some(report) = &session.results else {
        return;
    };
    if report.sources.is_empty() {
        return;
    }
    println!("\n## Sources");
    for (i, source) in report.sources.iter().enumerate() {
        match &source.publication_date {
            Some(date) => println!("{}. {} ({})\n   {}", i + 1, source.report_name, date, source.web.uri),
            None => println!("{}. {}\n   {}", i + 1, source.report_name, source.web.uri),
        }
    }
}

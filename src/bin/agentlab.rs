//! agentlab - operator CLI for the perception-agent service
//!
//! Usage:
//!   agentlab health
//!   agentlab run --source webcam --vision --profile fast --duration 30
//!   agentlab run --source rtsp --locator rtsp://camera/stream --audio --export events.json
//!   agentlab analyze ./clip.mp4 --target frame
//!   agentlab replay events.json
//!
//! Environment variables: see `agentlab::config`.

use agentlab::orchestrator::{projection, snapshot, MetricSnapshot};
use agentlab::service::{Event, Pipelines, Profile, SourceKind, UploadFile, UploadTarget};
use agentlab::{AgentLabClient, ClientConfig};
use clap::{Parser, Subcommand};
use dotenv::dotenv;
use log::{error, info, warn};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "agentlab", about = "agentlab: drive perception-agent sessions and stream their events")]
struct Cli {
    /// Service base address (overrides AGENTLAB_API_BASE)
    #[arg(long, global = true)]
    api_base: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check service and dependency health
    Health,
    /// Connect a source, run a session, and stream its events
    Run {
        #[arg(short, long, default_value = "webcam")]
        source: SourceKind,
        /// RTSP URL or USB device id
        #[arg(short, long)]
        locator: Option<String>,
        #[arg(long)]
        vision: bool,
        #[arg(long)]
        audio: bool,
        #[arg(long)]
        llm: bool,
        #[arg(short, long, default_value = "fast")]
        profile: Profile,
        /// Seconds to run; 0 runs until Ctrl-C
        #[arg(short, long, default_value = "0")]
        duration: u64,
        /// Save the event log here when the session ends
        #[arg(short, long)]
        export: Option<PathBuf>,
    },
    /// Submit a file for one-shot analysis
    Analyze {
        path: PathBuf,
        /// frame, video, image or audio
        #[arg(short, long, default_value = "frame")]
        target: UploadTarget,
    },
    /// Summarize a saved event log
    Replay { path: PathBuf },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();
    let cli = Cli::parse();

    let mut config = ClientConfig::from_env()?;
    if let Some(api_base) = cli.api_base {
        config = config.with_api_base(api_base)?;
    }

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(&config.rust_log))
        .target(env_logger::Target::Stderr)
        .init();

    info!("🚀 Starting agentlab");
    info!("   ├─ API: {}", config.api_base);
    info!("   ├─ Poll interval: {}ms", config.poll.interval.as_millis());
    info!("   └─ Page limit: {}", config.poll.page_limit);

    match cli.command {
        Commands::Health => run_health(config).await,
        Commands::Run {
            source,
            locator,
            vision,
            audio,
            llm,
            profile,
            duration,
            export,
        } => {
            // Vision is the default when no pipeline flag is given
            let pipelines = if vision || audio || llm {
                Pipelines { vision, audio, llm }
            } else {
                Pipelines::vision_only()
            };
            run_session(config, source, locator, pipelines, profile, duration, export).await
        }
        Commands::Analyze { path, target } => run_analyze(config, path, target).await,
        Commands::Replay { path } => run_replay(path),
    }
}

async fn run_health(config: ClientConfig) -> Result<(), Box<dyn std::error::Error>> {
    let client = AgentLabClient::from_config(config)?;
    let report = client.check_health().await?;

    println!("API status: {}", report.status.as_deref().unwrap_or("unknown"));
    for (name, status) in &report.services {
        println!("  {:<12} {}", name, status);
    }
    Ok(())
}

async fn run_session(
    config: ClientConfig,
    kind: SourceKind,
    locator: Option<String>,
    pipelines: Pipelines,
    profile: Profile,
    duration: u64,
    export: Option<PathBuf>,
) -> Result<(), Box<dyn std::error::Error>> {
    let status_interval = config.poll.interval;
    let mut client = AgentLabClient::from_config(config)?;

    match client.check_health().await {
        Ok(report) if !report.is_ok() => warn!("⚠️  Service reports degraded health: {:?}", report.degraded()),
        Ok(_) => {}
        Err(e) => warn!("⚠️  {}", e),
    }

    let source = client.connect_source(kind, locator.as_deref()).await?;
    info!("📷 Source {} ({})", source.source_id, source.label);

    let session = client.start_session(pipelines, profile).await?;
    info!("▶️  Session {} ({})", session.session_id, session.state);

    client.start_polling();

    let deadline = (duration > 0).then(|| tokio::time::Instant::now() + Duration::from_secs(duration));
    let mut ticker = tokio::time::interval(status_interval);
    let mut printed = 0usize;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let events = client.events().await;
                for event in events.iter().skip(printed) {
                    print_event(event);
                }
                printed = events.len();

                if client.reconcile().await {
                    error!("❌ Session ended by the service");
                    break;
                }

                let status = client.sync_status().await;
                if let Some(err) = status.last_error {
                    warn!("⚠️  Last fetch failed ({} in a row): {}", status.consecutive_failures, err);
                }
                if let Some(snapshot) = client.metric_snapshot().await {
                    info!("📊 {}", snapshot);
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("🛑 Interrupted");
                break;
            }
            _ = sleep_until(deadline) => {
                info!("⏱️  Run duration reached");
                break;
            }
        }
    }

    client.stop_polling();

    // Export before stopping so the saved cursor is the live one
    if let Some(path) = export {
        client.export_events(&path).await?;
        info!("💾 Saved event log to {}", path.display());
    }
    client.stop_session().await;

    let events = client.events().await;
    info!("📈 {} events collected: {:?}", events.len(), projection::counts_by_type(&events));
    Ok(())
}

async fn sleep_until(deadline: Option<tokio::time::Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}

async fn run_analyze(
    config: ClientConfig,
    path: PathBuf,
    target: UploadTarget,
) -> Result<(), Box<dyn std::error::Error>> {
    let client = AgentLabClient::from_config(config)?;
    let file = UploadFile::from_path(&path).await?;
    let result = client.analyze_upload(Some(&file), target).await?;

    println!("{}", serde_json::to_string_pretty(&result.body)?);
    Ok(())
}

fn run_replay(path: PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    let Some(saved) = snapshot::load_snapshot(&path)? else {
        return Err(format!("snapshot not found: {}", path.display()).into());
    };

    println!("Session {} ({} events, cursor {})", saved.session_id, saved.events.len(), saved.cursor);
    for event in &saved.events {
        print_event(event);
    }
    for (event_type, count) in projection::counts_by_type(&saved.events) {
        println!("  {:<12} {}", event_type, count);
    }
    if let Some(metrics) = MetricSnapshot::latest(&saved.events) {
        println!("Latest metrics: {}", metrics);
    }
    let transcript = projection::transcript_text(&saved.events);
    if !transcript.is_empty() {
        println!("Transcript:\n{}", transcript);
    }
    Ok(())
}

fn print_event(event: &Event) {
    let at = event
        .observed_at()
        .map(|t| t.format("%H:%M:%S").to_string())
        .unwrap_or_else(|| "--:--:--".to_string());
    println!("[{}] {:<10} {} {}", at, event.event_type.to_uppercase(), event.id, event.payload);
}

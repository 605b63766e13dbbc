//! Mintflow - client-side settlement and job coordination.
//!
//! Main entry point for the mintflow CLI.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

use mintflow_backend::HttpBackend;
use mintflow_core::{
    BackendFetcher, MemoryStateStore, PollingMonitor, StateStore, StatusFetcher, Task,
    TaskSubmitter,
};
use mintflow_protocols::{JobBackend, Session, TaskKind, TaskPayload};
use mintflow_settlement::{ClaimCoordinator, ClaimError, FlowGate, PurchaseFlow};

mod config;
mod wallet;

use config::AppConfig;
use wallet::CommandWallet;

/// Mintflow CLI.
#[derive(Parser)]
#[command(name = "mintflow")]
#[command(about = "Token claims, credit purchases, and long-running media tasks")]
#[command(version)]
struct Cli {
    /// Configuration file path (default: ~/.mintflow/config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Claim pending tokens to the configured wallet
    Claim,

    /// Buy credits
    Buy {
        /// Number of credits to buy
        credits: u64,
    },

    /// Submit a long-running task
    Submit {
        #[command(subcommand)]
        payload: SubmitPayload,

        /// Poll the task to completion after submitting
        #[arg(long, global = true)]
        watch: bool,
    },

    /// Show a task's current backend status
    Status {
        /// Task ID
        task_id: Uuid,
    },

    /// Poll a task until it resolves
    Watch {
        /// Task ID
        task_id: Uuid,

        /// Task kind (upload, generation)
        #[arg(long, default_value = "generation")]
        kind: TaskKind,
    },
}

#[derive(Subcommand)]
enum SubmitPayload {
    /// Register a media upload
    Upload {
        /// File name
        file_name: String,

        /// File size in bytes
        size_bytes: u64,

        /// MIME type
        #[arg(long, default_value = "application/octet-stream")]
        content_type: String,
    },

    /// Request an AI generation
    Generation {
        /// Prompt text
        prompt: String,

        /// Generation style
        #[arg(long)]
        style: Option<String>,
    },
}

fn mintflow_dir() -> PathBuf {
    dirs::home_dir()
        .map(|home| home.join(".mintflow"))
        .unwrap_or_else(|| PathBuf::from(".mintflow"))
}

/// Initialize tracing with console and file output.
///
/// Log files are written to ~/.mintflow/debug/ with daily rotation.
fn init_tracing() -> Result<()> {
    let log_dir = mintflow_dir().join("debug");
    std::fs::create_dir_all(&log_dir)?;

    let file_appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix("mintflow")
        .filename_suffix("log")
        .max_log_files(30)
        .build(&log_dir)?;

    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    // Keep the worker guard alive for the program duration.
    static GUARD: std::sync::OnceLock<tracing_appender::non_blocking::WorkerGuard> =
        std::sync::OnceLock::new();
    let _ = GUARD.set(guard);

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn,mintflow=info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_target(true).with_ansi(true))
        .with(fmt::layer().with_writer(non_blocking).with_ansi(false))
        .init();

    Ok(())
}

struct App {
    backend: Arc<HttpBackend>,
    wallet: Arc<CommandWallet>,
    store: Arc<MemoryStateStore>,
    session: Session,
    gate: FlowGate,
    config: AppConfig,
}

impl App {
    fn new(config: AppConfig) -> Self {
        let session = Session::new(config.auth_token.clone(), config.wallet_address.clone());
        Self {
            backend: Arc::new(HttpBackend::new(config.backend_url.clone(), session.clone())),
            wallet: Arc::new(CommandWallet::new(&config.wallet)),
            store: Arc::new(MemoryStateStore::new()),
            session,
            gate: FlowGate::new(),
            config,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing()?;

    let cli = Cli::parse();
    let config = AppConfig::load(cli.config.as_deref())?;
    let app = App::new(config);

    match cli.command {
        Commands::Claim => cmd_claim(app).await,
        Commands::Buy { credits } => cmd_buy(app, credits).await,
        Commands::Submit { payload, watch } => cmd_submit(app, payload, watch).await,
        Commands::Status { task_id } => cmd_status(app, task_id).await,
        Commands::Watch { task_id, kind } => cmd_watch(app, task_id, kind).await,
    }
}

/// Run a claim to completion, cancelling on Ctrl-C.
async fn cmd_claim(app: App) -> Result<()> {
    let coordinator = Arc::new(ClaimCoordinator::new(
        Arc::clone(&app.backend),
        Arc::clone(&app.wallet),
        app.store.clone(),
        app.session.clone(),
        app.config.settlement.clone(),
        app.gate.clone(),
    ));

    let interrupt = tokio::spawn({
        let coordinator = Arc::clone(&coordinator);
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Interrupt received; cancelling claim");
                coordinator.cancel();
            }
        }
    });

    let result = coordinator.run().await;
    interrupt.abort();

    match result {
        Ok(settlement) => {
            if settlement.confirmed {
                println!(
                    "Claimed {} tokens (transaction {})",
                    settlement.amount, settlement.tx_id
                );
            } else {
                println!(
                    "Claim submitted as transaction {} but not yet confirmed; \
                     the backend will credit it once the transaction lands",
                    settlement.tx_id
                );
            }
            Ok(())
        }
        Err(ClaimError::NothingToClaim) => {
            println!("Nothing to claim.");
            Ok(())
        }
        Err(ClaimError::Cancelled) => {
            println!("Claim cancelled.");
            Ok(())
        }
        Err(err) => Err(err.into()),
    }
}

/// Buy credits, cancelling on Ctrl-C before the payment goes out.
async fn cmd_buy(app: App, credits: u64) -> Result<()> {
    let flow = Arc::new(PurchaseFlow::new(
        Arc::clone(&app.backend),
        Arc::clone(&app.wallet),
        app.store.clone(),
        app.session.clone(),
        app.config.settlement.clone(),
        app.gate.clone(),
    ));

    let interrupt = tokio::spawn({
        let flow = Arc::clone(&flow);
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Interrupt received; cancelling purchase");
                flow.cancel();
            }
        }
    });

    let result = flow.run(credits).await;
    interrupt.abort();

    let outcome = result?;
    match (outcome.confirmed, outcome.credits) {
        (true, Some(balance)) => {
            println!("Purchase confirmed; balance is now {} credits", balance)
        }
        (true, None) => println!("Purchase confirmed (transaction {})", outcome.tx_id),
        (false, _) => println!(
            "Payment sent as transaction {} but not yet confirmed; \
             credits will appear once the transaction lands",
            outcome.tx_id
        ),
    }
    Ok(())
}

async fn cmd_submit(app: App, payload: SubmitPayload, watch: bool) -> Result<()> {
    let payload = match payload {
        SubmitPayload::Upload {
            file_name,
            size_bytes,
            content_type,
        } => TaskPayload::Upload {
            file_name,
            size_bytes,
            content_type,
        },
        SubmitPayload::Generation { prompt, style } => TaskPayload::Generation { prompt, style },
    };
    let kind = payload.kind();

    let submitter = TaskSubmitter::new(
        Arc::clone(&app.backend),
        app.store.clone(),
        app.session.clone(),
        app.config.limits.clone(),
    );
    let handle = submitter.submit(payload).await?;
    println!("Submitted {} task {}", kind, handle.id);

    if watch {
        watch_task(&app, handle.id).await?;
    }
    Ok(())
}

async fn cmd_status(app: App, task_id: Uuid) -> Result<()> {
    let report = app.backend.task_status(task_id).await?;
    println!("Task {}", task_id);
    println!("  status:   {:?}", report.status);
    println!("  progress: {}%", report.progress);
    if let Some(result) = &report.result {
        println!("  result:   {}", result);
    }
    if let Some(error) = &report.error {
        println!("  error:    {}", error);
    }
    Ok(())
}

async fn cmd_watch(app: App, task_id: Uuid, kind: TaskKind) -> Result<()> {
    // Seed a local record so the monitor has somewhere to write.
    app.store.insert(Task::with_id(task_id, kind)).await?;
    watch_task(&app, task_id).await
}

/// Poll `task_id` until it resolves, printing status changes.
async fn watch_task(app: &App, task_id: Uuid) -> Result<()> {
    let fetcher: Arc<dyn StatusFetcher> =
        Arc::new(BackendFetcher::new(Arc::clone(&app.backend)));
    let monitor = PollingMonitor::new(app.config.polling.clone());
    let mut handle = monitor.start(task_id, fetcher, app.store.clone());

    let token = handle.token();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupt received; stopping watch");
            token.cancel();
        }
    });

    while let Some(status) = handle.recv().await {
        println!("  {:?}", status);
    }
    let resolution = handle.wait().await;
    interrupt.abort();

    let task = app.store.get(task_id).await?.ok_or_else(|| {
        anyhow::anyhow!("task {} missing from the local store", task_id)
    })?;

    use mintflow_core::PollResolution;
    match resolution {
        PollResolution::Succeeded => {
            println!("Task {} succeeded", task_id);
            if let Some(result) = &task.result {
                println!("  result: {}", result);
            }
            Ok(())
        }
        PollResolution::Failed => {
            let reason = task.error.unwrap_or_else(|| "unknown".to_string());
            anyhow::bail!("task {} failed: {}", task_id, reason)
        }
        PollResolution::TimedOut => {
            println!(
                "Stopped watching task {} after {} polls; it may still complete server-side",
                task_id, app.config.polling.max_attempts
            );
            Ok(())
        }
        PollResolution::Cancelled => {
            println!("Stopped watching task {}", task_id);
            Ok(())
        }
    }
}

//! Intake Notifier Service
//!
//! Polls the enrollment and association Firestore projects for new records and
//! emails the people each record concerns.
//!
//! ## Architecture
//!
//! ```text
//! JobScheduler (one repeated job per monitor, single-flight)
//!   ↓
//! Scanner (enrollment project)      Scanner (association project)
//!   ↓ FirestoreStore                  ↓ FirestoreStore + FirebaseAuthDirectory
//! Notifier → SmtpProvider (lettre)
//! ```
//!
//! ## Commands
//!
//! - `serve` (default): scheduler plus the health endpoint, until SIGINT/SIGTERM
//! - `scan --monitor <name>`: one scan, report printed as JSON

pub mod config;
pub mod health;
pub mod scheduler;

use clap::{Parser, Subcommand};
use config::{NotifierConfig, ProjectConfig};
use core_config::FromEnv;
use core_config::server::ServerConfig;
use domain_intake::{
    FirebaseAuthDirectory, FirestoreStore, GoogleTokenSource, MessageComposer, Monitor,
    MonitorKind, RecipientResolver, Scanner,
};
use email::{FileTemplateStore, Notifier, SmtpProvider, TemplateRenderer};
use eyre::{Result, WrapErr, eyre};
use health::{HealthState, health_router};
use scheduler::{MonitorJob, start_scheduler};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "intake_notifier")]
#[command(about = "Email guardians and admins about new intake records")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the scheduler and health endpoint
    Serve,

    /// Scan one monitor once and print the report
    Scan {
        /// enrollment, contact_messages or admin_notifications
        #[arg(short, long)]
        monitor: MonitorKind,
    },
}

/// Scanner per project, wired to the shared notifier
struct Scanners {
    enrollment: Scanner,
    association: Option<Scanner>,
    notifier: Notifier,
}

impl Scanners {
    fn for_monitor(&self, monitor: &Monitor) -> Option<&Scanner> {
        match monitor.kind {
            MonitorKind::Enrollment => Some(&self.enrollment),
            MonitorKind::ContactMessages | MonitorKind::AdminNotifications => {
                self.association.as_ref()
            }
        }
    }
}

fn token_source(project: &ProjectConfig, client: &reqwest::Client) -> Result<GoogleTokenSource> {
    let key = project
        .key
        .load()
        .wrap_err_with(|| format!("Failed to load service account key for {}", project.project_id))?;
    Ok(GoogleTokenSource::new(key, client.clone()))
}

fn build_scanners(config: &NotifierConfig) -> Result<Scanners> {
    let client = reqwest::Client::new();

    let provider = SmtpProvider::new(config.smtp.clone()).wrap_err("Failed to create SMTP provider")?;
    let notifier = Notifier::new(Arc::new(provider), config.send_policy.clone());
    let composer = MessageComposer::new(TemplateRenderer::new(Arc::new(FileTemplateStore::new(
        config.templates_dir.clone(),
    ))));

    let enrollment_store = FirestoreStore::new(
        config.enrollment.project_id.clone(),
        token_source(&config.enrollment, &client)?,
        client.clone(),
    );
    let enrollment = Scanner::new(Arc::new(enrollment_store), notifier.clone(), composer.clone())
        .with_record_concurrency(config.record_concurrency);

    let association = match &config.association {
        Some(project) => {
            let tokens = token_source(project, &client)?;
            let store = Arc::new(FirestoreStore::new(
                project.project_id.clone(),
                tokens.clone(),
                client.clone(),
            ));
            let directory = Arc::new(FirebaseAuthDirectory::new(
                project.project_id.clone(),
                tokens,
                client.clone(),
            ));
            Some(
                Scanner::new(store.clone(), notifier.clone(), composer)
                    .with_resolver(RecipientResolver::new(store, directory))
                    .with_record_concurrency(config.record_concurrency),
            )
        }
        None => None,
    };

    info!(
        transport = notifier.provider_name(),
        smtp_host = %config.smtp.host,
        templates_dir = %config.templates_dir.display(),
        association = config.association.is_some(),
        "Notification pipeline configured"
    );

    Ok(Scanners {
        enrollment,
        association,
        notifier,
    })
}

/// Start the health HTTP server
async fn start_health_server(state: HealthState, server: ServerConfig) -> Result<()> {
    let app = health_router(state);

    let addr = server.address();
    let listener = TcpListener::bind(&addr)
        .await
        .wrap_err_with(|| format!("Failed to bind health server to {}", addr))?;

    info!(address = %addr, "Health server listening");

    axum::serve(listener, app)
        .await
        .wrap_err("Health server failed")?;

    Ok(())
}

async fn serve(config: NotifierConfig, scanners: Scanners) -> Result<()> {
    let jobs: Vec<MonitorJob> = config
        .monitors()
        .into_iter()
        .filter_map(|monitor| {
            scanners
                .for_monitor(&monitor)
                .map(|scanner| MonitorJob::new(scanner.clone(), monitor))
        })
        .collect();

    let state = HealthState::new(
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION"),
        jobs.iter().map(|job| job.monitor().name()).collect(),
        scanners.notifier.clone(),
    );

    let mut sched = start_scheduler(jobs).await?;

    let server = config.server.clone();
    tokio::spawn(async move {
        if let Err(e) = start_health_server(state, server).await {
            error!(error = %e, "Health server failed");
        }
    });

    shutdown_signal().await?;

    sched
        .shutdown()
        .await
        .wrap_err("Failed to shut down scheduler")?;
    Ok(())
}

async fn scan_once(config: &NotifierConfig, scanners: &Scanners, kind: MonitorKind) -> Result<()> {
    let monitor = config
        .monitors()
        .into_iter()
        .find(|m| m.kind == kind)
        .ok_or_else(|| eyre!("Monitor {} is not enabled; set ASSOCIATION_PROJECT_ID", kind))?;
    let scanner = scanners
        .for_monitor(&monitor)
        .ok_or_else(|| eyre!("No scanner configured for {}", kind))?;

    let report = scanner.scan(&monitor).await;
    println!("{}", serde_json::to_string_pretty(&report)?);

    if report.query_failed {
        return Err(eyre!("Query for {} failed", kind));
    }
    Ok(())
}

/// Run the notifier
///
/// 1. Sets up structured logging (JSON in production, pretty in development)
/// 2. Loads configuration and service-account keys
/// 3. Runs the selected command
///
/// # Errors
///
/// Returns an error if configuration is incomplete, a key cannot be loaded,
/// or the scheduler / health server cannot start.
pub async fn run() -> Result<()> {
    let cli = Cli::parse();

    let config = NotifierConfig::from_env().wrap_err("Failed to load configuration")?;
    core_config::tracing::init_tracing(&config.environment);

    info!(
        name = env!("CARGO_PKG_NAME"),
        version = env!("CARGO_PKG_VERSION"),
        environment = ?config.environment,
        "Starting intake notifier"
    );

    let scanners = build_scanners(&config)?;

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => serve(config, scanners).await?,
        Commands::Scan { monitor } => scan_once(&config, &scanners, monitor).await?,
    }

    info!("Intake notifier stopped");
    Ok(())
}

/// Wait for a shutdown signal (SIGINT or SIGTERM)
async fn shutdown_signal() -> Result<()> {
    let ctrl_c = async { signal::ctrl_c().await.wrap_err("Failed to install Ctrl+C handler") };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .wrap_err("Failed to install SIGTERM handler")?
            .recv()
            .await;
        Ok::<(), eyre::Report>(())
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<Result<()>>();

    tokio::select! {
        result = ctrl_c => {
            result?;
            info!("Received Ctrl+C, initiating shutdown...");
        },
        result = terminate => {
            result?;
            info!("Received SIGTERM, initiating shutdown...");
        },
    }

    Ok(())
}

//! event-intake - Entry point for the email intake service

use std::sync::Arc;

use anyhow::Context;
use event_intake::providers::ai::{EventExtractor, LlmProvider, OpenAiCompatibleProvider};
use event_intake::providers::email::{MailProvider, ResendProvider};
use event_intake::server::{self, AppState, WebhookVerifier};
use event_intake::services::{
    ConfirmationRenderer, IntakeWorkflow, LoggingCompletionHook, MailSender, RegistrationService,
};
use event_intake::storage::Database;
use event_intake::{Settings, WorkflowManager};

#[tokio::main]
async fn main() {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    tracing::info!("Starting event-intake");

    if let Err(e) = run().await {
        tracing::error!("Service error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let settings = Settings::load().context("failed to load settings")?;
    settings.validate().context("invalid settings")?;

    let tz = settings.time_zone()?;
    let site_url = settings.site_url()?;

    let db = Database::open(&settings.storage.database_path)
        .await
        .with_context(|| {
            format!(
                "failed to open database at {}",
                settings.storage.database_path.display()
            )
        })?;

    let mail: Arc<dyn MailProvider> = Arc::new(ResendProvider::with_base_url(
        &settings.mail.api_base_url,
        &settings.mail.api_key,
        &settings.mail.from_address,
    ));
    let llm: Arc<dyn LlmProvider> = Arc::new(OpenAiCompatibleProvider::custom(
        &settings.ai.base_url,
        Some(settings.ai.api_key.clone()),
        &settings.ai.model,
    ));
    tracing::info!(provider = llm.name(), model = llm.model(), "using text-generation provider");

    let extractor = EventExtractor::new(llm, tz).with_temperature(settings.ai.temperature);
    let sender = MailSender::new(db.clone(), mail.clone(), ConfirmationRenderer::new(site_url), tz);
    let workflow = IntakeWorkflow::new(db.clone(), mail, extractor, sender)
        .with_policies(settings.intake.policies);

    let manager = WorkflowManager::new(db.clone(), workflow, Arc::new(LoggingCompletionHook));
    let resumed = manager
        .resume_incomplete()
        .await
        .context("failed to resume unfinished runs")?;
    if !resumed.is_empty() {
        tracing::info!(count = resumed.len(), "resumed unfinished runs");
    }

    let verifier = WebhookVerifier::new(&settings.webhook.secret, settings.webhook.tolerance_secs)
        .context("invalid webhook secret")?;
    let state = AppState {
        intake: Arc::new(manager.clone()),
        registrations: RegistrationService::new(db, tz),
        verifier: Arc::new(verifier),
    };

    let listener = tokio::net::TcpListener::bind(&settings.server.bind_address)
        .await
        .with_context(|| format!("failed to bind {}", settings.server.bind_address))?;

    server::serve(listener, state, shutdown_signal()).await?;

    // Unfinished runs stay `running` in the journal and resume on next start.
    let active = manager.active_runs().await;
    tracing::info!(active_runs = active, "Shut down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown requested");
}

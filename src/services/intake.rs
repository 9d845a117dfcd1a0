//! The email intake workflow.
//!
//! Every email received by the intake mailbox is driven through
//! fetch → register → extract → merge → classify → send. A reply is attempted
//! whatever the extraction outcome; only a failure to fetch the email, to
//! create the registration or to send aborts the run.

use std::sync::Arc;

use anyhow::{anyhow, bail, Context};
use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::classification::{classify, extraction_failed_reason, Outcome, NO_TEXT_REASON};
use super::mail_sender::{Delivery, MailSender};
use crate::config::IntakePolicies;
use crate::domain::{
    EmailId, EventRegistration, ExtractedEvent, InboundEmail, InboundEmailId, RegistrationId,
};
use crate::providers::ai::EventExtractor;
use crate::providers::email::MailProvider;
use crate::storage::queries::{emails, registrations};
use crate::storage::Database;
use crate::workflow::{RetryPolicy, StepError, Workflow, WorkflowContext};

/// Input of one intake run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntakeInput {
    /// Provider identifier of the received email.
    pub email_id: EmailId,
}

impl IntakeInput {
    pub fn new(email_id: impl Into<EmailId>) -> Self {
        Self {
            email_id: email_id.into(),
        }
    }
}

/// Orchestrates the intake of a single received email.
pub struct IntakeWorkflow {
    db: Database,
    mail: Arc<dyn MailProvider>,
    extractor: EventExtractor,
    sender: MailSender,
    policies: IntakePolicies,
}

impl IntakeWorkflow {
    /// Workflow name stored with every run.
    pub const NAME: &'static str = "email-intake";

    pub fn new(
        db: Database,
        mail: Arc<dyn MailProvider>,
        extractor: EventExtractor,
        sender: MailSender,
    ) -> Self {
        Self {
            db,
            mail,
            extractor,
            sender,
            policies: IntakePolicies::default(),
        }
    }

    /// Overrides the per-step retry policies.
    pub fn with_policies(mut self, policies: IntakePolicies) -> Self {
        self.policies = policies;
        self
    }

    async fn fetch_and_save(&self, email_id: &EmailId) -> anyhow::Result<InboundEmailId> {
        let received = self.mail.fetch_received(email_id).await?;

        let email = InboundEmail {
            id: InboundEmailId::generate(),
            email_id: received.email_id,
            from: received.from,
            to: received.to,
            subject: received.subject,
            text: received.text,
            html: received.html,
            message_id: received.message_id,
            received_at: Utc::now(),
            processed: false,
            registration_id: None,
        };
        emails::insert(&self.db, &email)
            .await
            .context("failed to store inbound email")?;

        Ok(email.id)
    }

    async fn create_registration(&self, email_id: &InboundEmailId) -> anyhow::Result<RegistrationId> {
        let registration = registrations::create_for_email(&self.db, email_id).await?;
        Ok(registration.id)
    }

    async fn load_text(&self, email_id: &InboundEmailId) -> anyhow::Result<Option<String>> {
        let email = emails::get_by_id(&self.db, email_id)
            .await?
            .ok_or_else(|| anyhow!("inbound email {email_id} not found"))?;
        Ok(email.text_content().map(str::to_string))
    }

    async fn merge(&self, registration_id: &RegistrationId, event: &ExtractedEvent) -> anyhow::Result<()> {
        let mut registration = self.registration(registration_id).await?;
        registration.merge_extraction(event);
        if !registrations::update_fields(&self.db, &registration).await? {
            bail!("registration {registration_id} was promoted before the merge");
        }
        Ok(())
    }

    async fn classify(
        &self,
        registration_id: &RegistrationId,
        extraction: &Result<(), String>,
    ) -> anyhow::Result<Outcome> {
        let registration = self.registration(registration_id).await?;
        Ok(classify(extraction.clone(), &registration))
    }

    async fn registration(
        &self,
        registration_id: &RegistrationId,
    ) -> anyhow::Result<EventRegistration> {
        registrations::get_by_id(&self.db, registration_id)
            .await?
            .ok_or_else(|| anyhow!("registration {registration_id} not found"))
    }

    /// Runs extraction under its retry policy, turning exhaustion into a
    /// business-level failure instead of aborting the run.
    async fn extract(
        &self,
        ctx: &WorkflowContext,
        text: &str,
    ) -> Result<Result<ExtractedEvent, String>, StepError> {
        let result = ctx
            .run("extract", self.policies.extract, || self.extractor.extract(text))
            .await;

        match result {
            Ok(event) => Ok(Ok(event)),
            Err(StepError::Failed { attempts, error, .. }) => {
                warn!(run_id = %ctx.run_id(), attempts, error = %error, "extraction failed, continuing without it");
                Ok(Err(extraction_failed_reason(attempts)))
            }
            Err(other) => Err(other),
        }
    }

    async fn send(
        &self,
        ctx: &WorkflowContext,
        step: &str,
        registration_id: &RegistrationId,
        outcome: &Outcome,
    ) -> Result<Delivery, StepError> {
        ctx.run(step, self.policies.send, || {
            self.sender.send_confirmation(registration_id, outcome)
        })
        .await
    }
}

#[async_trait]
impl Workflow for IntakeWorkflow {
    type Input = IntakeInput;

    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn correlation_id(&self, input: &IntakeInput) -> String {
        input.email_id.to_string()
    }

    async fn execute(&self, ctx: &WorkflowContext, input: &IntakeInput) -> Result<(), StepError> {
        let email_id = ctx
            .run("fetch-and-save", self.policies.fetch, || {
                self.fetch_and_save(&input.email_id)
            })
            .await?;

        let registration_id = ctx
            .run(
                "create-registration",
                self.policies.create_registration,
                || self.create_registration(&email_id),
            )
            .await?;

        let text = ctx
            .run("load-email", RetryPolicy::none(), || self.load_text(&email_id))
            .await?;

        let Some(text) = text else {
            info!(run_id = %ctx.run_id(), email_id = %input.email_id, "email has no text, sending failure notice");
            let outcome = Outcome::Failed {
                reason: NO_TEXT_REASON.to_string(),
            };
            self.send(ctx, "send-failure-email", &registration_id, &outcome)
                .await?;
            return Ok(());
        };

        let extraction = match self.extract(ctx, &text).await? {
            Ok(event) => {
                ctx.run("merge-extraction", RetryPolicy::none(), || {
                    self.merge(&registration_id, &event)
                })
                .await?;
                Ok(())
            }
            Err(reason) => Err(reason),
        };

        let outcome = ctx
            .run("classify", RetryPolicy::none(), || {
                self.classify(&registration_id, &extraction)
            })
            .await?;
        info!(run_id = %ctx.run_id(), outcome = outcome.kind(), "registration classified");

        self.send(ctx, "send-confirmation", &registration_id, &outcome)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::ai::{
        CompletionResponse, FinishReason, MockLlmProvider, TokenUsage,
    };
    use crate::providers::email::{MockMailProvider, ProviderError, ReceivedEmail, SendReceipt};
    use crate::services::{ConfirmationRenderer, LoggingCompletionHook};
    use crate::storage::queries::workflow as journal;
    use crate::workflow::{WorkflowManager, WorkflowOutcome};
    use chrono_tz::Europe::Berlin;
    use url::Url;

    fn received(text: Option<&str>) -> ReceivedEmail {
        ReceivedEmail {
            email_id: EmailId::from("re-1"),
            from: "Lehrer <lehrer@schule.de>".to_string(),
            to: vec!["termine@schule.de".to_string()],
            subject: "Termin".to_string(),
            text: text.map(str::to_string),
            html: None,
            message_id: None,
        }
    }

    fn manager(
        db: &Database,
        mail: MockMailProvider,
        llm: MockLlmProvider,
    ) -> WorkflowManager<IntakeWorkflow> {
        let mail: Arc<dyn MailProvider> = Arc::new(mail);
        let extractor = EventExtractor::new(Arc::new(llm), Berlin);
        let sender = MailSender::new(
            db.clone(),
            mail.clone(),
            ConfirmationRenderer::new(Url::parse("https://termine.schule.de").unwrap()),
            Berlin,
        );
        let workflow = IntakeWorkflow::new(db.clone(), mail, extractor, sender)
            .with_policies(IntakePolicies::default().without_backoff());
        WorkflowManager::new(db.clone(), workflow, Arc::new(LoggingCompletionHook))
    }

    #[tokio::test]
    async fn complete_extraction_sends_success() {
        let db = Database::open_in_memory().await.unwrap();
        let mut mail = MockMailProvider::new();
        mail.expect_fetch_received()
            .times(1)
            .returning(|_| Ok(received(Some("Sportfest am Freitag"))));
        mail.expect_send()
            .times(1)
            .withf(|email| email.subject == "Veranstaltung bestätigt")
            .returning(|_| Ok(SendReceipt { id: "m1".to_string() }));

        let mut llm = MockLlmProvider::new();
        llm.expect_complete().times(1).returning(|_| {
            Ok(CompletionResponse {
                text: r#"{"title":"Sportfest","start":"2025-06-20T09:00:00+02:00","end":"2025-06-20T14:00:00+02:00","description":"Alle Klassen","location":"Sportplatz"}"#.to_string(),
                tokens_used: TokenUsage::default(),
                finish_reason: FinishReason::Stop,
            })
        });

        let completed = manager(&db, mail, llm)
            .run(IntakeInput::new("re-1"))
            .await
            .unwrap();
        assert_eq!(completed.outcome, WorkflowOutcome::Success);
        assert_eq!(completed.correlation_id, "re-1");

        let steps: Vec<String> = journal::list_steps(&db, &completed.run_id)
            .await
            .unwrap()
            .into_iter()
            .map(|step| step.step_name)
            .collect();
        assert_eq!(
            steps,
            vec![
                "fetch-and-save",
                "create-registration",
                "load-email",
                "extract",
                "merge-extraction",
                "classify",
                "send-confirmation",
            ]
        );
    }

    #[tokio::test]
    async fn send_exhaustion_fails_the_run() {
        let db = Database::open_in_memory().await.unwrap();
        let mut mail = MockMailProvider::new();
        mail.expect_fetch_received()
            .returning(|_| Ok(received(None)));
        mail.expect_send().times(3).returning(|_| {
            Err(ProviderError::Connection("reset".to_string()))
        });
        let mut llm = MockLlmProvider::new();
        llm.expect_complete().never();

        let completed = manager(&db, mail, llm)
            .run(IntakeInput::new("re-1"))
            .await
            .unwrap();

        match completed.outcome {
            WorkflowOutcome::Failed { error } => assert!(error.contains("send-failure-email")),
            other => panic!("unexpected outcome: {other:?}"),
        }
    }
}

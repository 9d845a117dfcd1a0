//! HTTP surface of the service.
//!
//! - `POST /webhooks/email`: signed inbound-email notifications
//! - `GET|PATCH /api/email-event/:access_id`: registration access link API
//! - `GET /healthz`: liveness

mod error;
mod registrations;
mod signature;
mod webhook;

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;
use tracing::info;

use crate::domain::EmailId;
use crate::services::{IntakeInput, IntakeWorkflow, RegistrationService};
use crate::storage::DatabaseError;
use crate::workflow::{RunId, WorkflowManager};

pub use error::ApiError;
pub use signature::{SignatureError, WebhookVerifier};
pub use webhook::EMAIL_RECEIVED;

/// Starts intake runs on behalf of the webhook.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait IntakeStarter: Send + Sync {
    /// Records a new run for `email_id` and executes it in the background.
    async fn start_intake(&self, email_id: EmailId) -> Result<RunId, DatabaseError>;
}

#[async_trait]
impl IntakeStarter for WorkflowManager<IntakeWorkflow> {
    async fn start_intake(&self, email_id: EmailId) -> Result<RunId, DatabaseError> {
        self.start(IntakeInput { email_id }).await
    }
}

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub intake: Arc<dyn IntakeStarter>,
    pub registrations: RegistrationService,
    pub verifier: Arc<WebhookVerifier>,
}

/// Builds the application router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(health))
        .route("/webhooks/email", post(webhook::receive))
        .route(
            "/api/email-event/:access_id",
            get(registrations::get).patch(registrations::update),
        )
        .with_state(state)
}

/// Serves the router on `listener` until `shutdown` resolves.
pub async fn serve<F>(listener: TcpListener, state: AppState, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    if let Ok(addr) = listener.local_addr() {
        info!(%addr, "listening");
    }
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await
}

async fn health() -> (StatusCode, &'static str) {
    (StatusCode::OK, "ok")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{EventId, EventRegistration};
    use crate::storage::queries::emails::tests::make_test_email;
    use crate::storage::queries::{emails, registrations as registration_queries};
    use crate::storage::Database;
    use axum::body::Body;
    use axum::http::{Request, Response};
    use chrono::Utc;
    use chrono_tz::Europe::Berlin;
    use pretty_assertions::assert_eq;
    use tower::ServiceExt;

    const SECRET: &str = "whsec_aW50YWtlLXRlc3Qtc2VjcmV0";

    struct Harness {
        app: Router,
        registration: EventRegistration,
        service: RegistrationService,
        verifier: Arc<WebhookVerifier>,
    }

    async fn harness(intake: MockIntakeStarter) -> Harness {
        let db = Database::open_in_memory().await.unwrap();
        let email = make_test_email("local-1");
        emails::insert(&db, &email).await.unwrap();
        let registration = registration_queries::create_for_email(&db, &email.id)
            .await
            .unwrap();

        let service = RegistrationService::new(db, Berlin);
        let verifier = Arc::new(WebhookVerifier::new(SECRET, 300).unwrap());
        let app = router(AppState {
            intake: Arc::new(intake),
            registrations: service.clone(),
            verifier: verifier.clone(),
        });

        Harness {
            app,
            registration,
            service,
            verifier,
        }
    }

    fn signed_request(verifier: &WebhookVerifier, body: &str) -> Request<Body> {
        let timestamp = Utc::now().timestamp().to_string();
        let signature = verifier.sign("msg_1", &timestamp, body.as_bytes());
        Request::builder()
            .method("POST")
            .uri("/webhooks/email")
            .header("svix-id", "msg_1")
            .header("svix-timestamp", timestamp)
            .header("svix-signature", signature)
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_json(response: Response<Body>) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn health_check() {
        let h = harness(MockIntakeStarter::new()).await;
        let response = h
            .app
            .oneshot(Request::get("/healthz").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn received_email_starts_intake() {
        let mut intake = MockIntakeStarter::new();
        intake
            .expect_start_intake()
            .times(1)
            .withf(|email_id| email_id.as_str() == "re-42")
            .returning(|_| Ok(RunId::from("run-1")));
        let h = harness(intake).await;

        let body = r#"{"type":"email.received","created_at":"2025-01-14T16:00:00Z","data":{"email_id":"re-42","from":"lehrer@schule.de"}}"#;
        let response = h
            .app
            .oneshot(signed_request(&h.verifier, body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn other_events_are_ignored() {
        let mut intake = MockIntakeStarter::new();
        intake.expect_start_intake().never();
        let h = harness(intake).await;

        let body = r#"{"type":"email.delivered","data":{"email_id":"re-42"}}"#;
        let response = h
            .app
            .oneshot(signed_request(&h.verifier, body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn bad_signature_is_unauthorized() {
        let mut intake = MockIntakeStarter::new();
        intake.expect_start_intake().never();
        let h = harness(intake).await;

        let request = Request::builder()
            .method("POST")
            .uri("/webhooks/email")
            .header("svix-id", "msg_1")
            .header("svix-timestamp", Utc::now().timestamp().to_string())
            .header("svix-signature", "v1,AAAA")
            .body(Body::from(r#"{"type":"email.received","data":{"email_id":"x"}}"#))
            .unwrap();
        let response = h.app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn malformed_body_is_bad_request() {
        let mut intake = MockIntakeStarter::new();
        intake.expect_start_intake().never();
        let h = harness(intake).await;

        let response = h
            .app
            .oneshot(signed_request(&h.verifier, r#"{"type":"email.received","data":{}}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn get_registration_by_access_id() {
        let h = harness(MockIntakeStarter::new()).await;
        let uri = format!("/api/email-event/{}", h.registration.access_id);

        let response = h
            .app
            .oneshot(Request::get(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let json = body_json(response).await;
        assert_eq!(json["accessId"], h.registration.access_id.as_str());
        assert_eq!(json["responseSent"], false);
    }

    #[tokio::test]
    async fn unknown_access_id_is_not_found() {
        let h = harness(MockIntakeStarter::new()).await;
        let response = h
            .app
            .oneshot(
                Request::get("/api/email-event/does-not-exist")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    fn patch_request(access_id: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method("PATCH")
            .uri(format!("/api/email-event/{access_id}"))
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn patch_updates_fields() {
        let h = harness(MockIntakeStarter::new()).await;
        let response = h
            .app
            .oneshot(patch_request(
                h.registration.access_id.as_str(),
                r#"{"description":"Mit Anmeldung"}"#,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let json = body_json(response).await;
        assert_eq!(json["description"], "Mit Anmeldung");
    }

    #[tokio::test]
    async fn patch_with_unknown_field_is_unprocessable() {
        let h = harness(MockIntakeStarter::new()).await;
        let response = h
            .app
            .oneshot(patch_request(
                h.registration.access_id.as_str(),
                r#"{"responseSent":true}"#,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn patch_after_promotion_conflicts() {
        let h = harness(MockIntakeStarter::new()).await;
        h.service
            .promote(&h.registration.id, &EventId::from("event-1"))
            .await
            .unwrap();

        let response = h
            .app
            .oneshot(patch_request(
                h.registration.access_id.as_str(),
                r#"{"title":"Neu"}"#,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }
}

use axum::{
    Form, Json,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use tracing::{info, warn};
use uuid::Uuid;

use recap_types::api::{
    ChallengeResponse, EventEnvelope, HealthResponse, SlashCommandForm, SlashResponse,
};
use recap_types::models::{CommandInvocation, Mode};

use crate::command;
use crate::error::CommandError;
use crate::state::AppState;

// ── Slash commands ──

/// Deferred strategy: acknowledge now, do the work in the background.
pub async fn slash_command(
    State(state): State<AppState>,
    Form(form): Form<SlashCommandForm>,
) -> Json<SlashResponse> {
    let inv = match accept(form) {
        Ok(inv) => inv,
        Err(reply) => return Json(reply),
    };

    let ack = placeholder(&inv);
    state.executor.spawn(inv);
    Json(ack)
}

/// Degraded inline strategy: run the pipeline against the remaining budget and
/// answer with its result, or with a "try again" placeholder once the budget is spent.
pub async fn slash_command_inline(
    State(state): State<AppState>,
    Form(form): Form<SlashCommandForm>,
) -> Json<SlashResponse> {
    let inv = match accept(form) {
        Ok(inv) => inv,
        Err(reply) => return Json(reply),
    };

    let budget = state
        .inline_budget
        .saturating_sub(inv.received_at.elapsed());

    match tokio::time::timeout(budget, state.executor.run(&inv)).await {
        Ok(result) => Json(result.into()),
        Err(_) => {
            warn!(
                "[{}] Inline budget of {:?} spent, answering with placeholder",
                inv.request_id, state.inline_budget
            );
            Json(SlashResponse::ephemeral(
                "Still working on that one and running out of time to answer. \
                 Please try the command again in a few moments.",
            ))
        }
    }
}

/// Parse the form; unknown commands and missing targets are answered here
/// without touching the platform.
fn accept(form: SlashCommandForm) -> Result<CommandInvocation, SlashResponse> {
    let request_id = Uuid::new_v4().simple().to_string()[..8].to_string();
    info!(
        "[{}] {} '{}' from {}",
        request_id, form.command, form.text, form.user_id
    );

    let command_name = form.command.clone();
    let Some(inv) = command::parse_invocation(form, request_id) else {
        warn!("Unknown command received: {}", command_name);
        return Err(CommandError::UnknownCommand(command_name).to_result().into());
    };

    if inv.target.is_none() {
        info!("[{}] No channel given", inv.request_id);
        return Err(CommandError::Usage { mode: inv.mode }.to_result().into());
    }

    Ok(inv)
}

fn placeholder(inv: &CommandInvocation) -> SlashResponse {
    let channel = inv.target.as_deref().unwrap_or_default();
    let text = match inv.mode {
        Mode::Summary => format!(
            "Generating summary for #{channel}...\n\n\
             This usually takes 5-15 seconds. The summary will appear here shortly."
        ),
        Mode::Unread => format!(
            "Checking unread messages for #{channel}...\n\n\
             Your personal catch-up will appear here shortly."
        ),
    };
    SlashResponse::ephemeral(text)
}

// ── Events API ──

pub async fn events(body: String) -> Response {
    let envelope: EventEnvelope = match serde_json::from_str(&body) {
        Ok(envelope) => envelope,
        Err(e) => {
            warn!("Malformed event payload: {}", e);
            return StatusCode::BAD_REQUEST.into_response();
        }
    };

    match envelope {
        EventEnvelope::UrlVerification { challenge } => {
            info!("Answering url_verification challenge");
            Json(ChallengeResponse { challenge }).into_response()
        }
        EventEnvelope::EventCallback { event } => {
            let kind = event.get("type").and_then(|t| t.as_str()).unwrap_or("unknown");
            info!("Received event: {}", kind);
            Json(json!({ "status": "ok" })).into_response()
        }
        EventEnvelope::Other => Json(json!({ "status": "ok" })).into_response(),
    }
}

// ── Liveness ──

pub async fn index() -> &'static str {
    "Recap bot is running"
}

pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        timestamp: chrono::Utc::now(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        configured: state.configured,
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use axum::Router;
    use axum::body::Body;
    use axum::http::{Request, header};
    use recap_db::Database;
    use recap_types::api::ConfiguredCredentials;
    use serde_json::Value;
    use tower::ServiceExt;

    use super::*;
    use crate::executor::{Collaborators, Executor};
    use crate::fakes::{EchoSummarizer, FakePlatform, RecordingSink};
    use crate::pipeline::FetchSettings;
    use crate::router;

    struct TestApp {
        app: Router,
        state: AppState,
        platform: Arc<FakePlatform>,
        sink: Arc<RecordingSink>,
    }

    fn test_app(platform: FakePlatform, inline_budget: Duration) -> TestApp {
        let platform = Arc::new(platform);
        let sink = Arc::new(RecordingSink::default());
        let executor = Executor::new(
            Collaborators {
                platform: platform.clone(),
                summarizer: Arc::new(EchoSummarizer::default()),
                sink: sink.clone(),
                db: Arc::new(Database::open_in_memory().unwrap()),
            },
            FetchSettings {
                page_size: 50,
                page_delay: Duration::ZERO,
                author_lookup_delay: Duration::ZERO,
            },
            4,
        );
        let state = AppState {
            executor,
            inline_budget,
            configured: ConfiguredCredentials {
                slack_bot_token: true,
                gemini_api_key: false,
            },
        };
        TestApp {
            app: router(state.clone()),
            state,
            platform,
            sink,
        }
    }

    fn command_body(command: &str, text: &str) -> String {
        format!(
            "command={}&text={}&user_id=U1&user_name=ada&channel_id=C9&team_id=T1\
             &response_url=https%3A%2F%2Fhooks.example%2F1",
            command.replace('/', "%2F"),
            text.replace('#', "%23").replace(' ', "+")
        )
    }

    async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    async fn post_form(app: &Router, uri: &str, body: String) -> (StatusCode, Value) {
        let request = Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(body))
            .unwrap();
        send(app, request).await
    }

    async fn post_json(app: &Router, uri: &str, body: &str) -> (StatusCode, Value) {
        let request = Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        send(app, request).await
    }

    #[tokio::test]
    async fn blank_target_gets_usage_reply_and_no_work() {
        let t = test_app(
            FakePlatform::new().with_channel("C1", "general"),
            Duration::from_secs(2),
        );

        let (status, body) =
            post_form(&t.app, "/slack/commands", command_body("/summary", "  ")).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["response_type"], "ephemeral");
        assert!(body["text"].as_str().unwrap().contains("Usage: `/summary"));
        assert!(t.state.executor.shutdown(Duration::from_secs(1)).await);
        assert_eq!(t.platform.total_calls(), 0);
        assert!(t.sink.deliveries().is_empty());
    }

    #[tokio::test]
    async fn unknown_command_lists_available_commands() {
        let t = test_app(FakePlatform::new(), Duration::from_secs(2));

        let (_, body) =
            post_form(&t.app, "/slack/commands", command_body("/weather", "today")).await;

        assert_eq!(body["response_type"], "ephemeral");
        let text = body["text"].as_str().unwrap();
        assert!(text.contains("Unknown command: /weather"));
        assert!(text.contains("/unread #channel-name"));
    }

    #[tokio::test]
    async fn deferred_command_acks_then_delivers_once() {
        let t = test_app(
            FakePlatform::new().with_channel("C1", "general"),
            Duration::from_secs(2),
        );

        let (status, body) =
            post_form(&t.app, "/slack/commands", command_body("/summary", "#general")).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["response_type"], "ephemeral");
        assert!(body["text"].as_str().unwrap().contains("#general"));
        assert!(body.get("replace_original").is_none());

        assert!(t.state.executor.shutdown(Duration::from_secs(5)).await);
        let deliveries = t.sink.deliveries();
        assert_eq!(deliveries.len(), 1);
        assert_eq!(deliveries[0].0, "https://hooks.example/1");
        assert_eq!(deliveries[0].1.text, "no activity in #general");
    }

    #[tokio::test]
    async fn unread_keyword_selects_unread_mode() {
        let t = test_app(
            FakePlatform::new().with_channel("C1", "general"),
            Duration::from_secs(2),
        );

        let (_, body) = post_form(
            &t.app,
            "/slack/commands",
            command_body("/summary", "unread #general"),
        )
        .await;
        assert!(body["text"].as_str().unwrap().contains("Checking unread messages"));

        assert!(t.state.executor.shutdown(Duration::from_secs(5)).await);
        assert_eq!(
            t.sink.deliveries()[0].1.text,
            "@ada is all caught up in #general"
        );
    }

    #[tokio::test]
    async fn inline_command_answers_with_the_result() {
        let t = test_app(
            FakePlatform::new().with_channel("C1", "general"),
            Duration::from_secs(2),
        );

        let (_, body) = post_form(
            &t.app,
            "/slack/commands/inline",
            command_body("/summary", "general"),
        )
        .await;

        assert_eq!(body["response_type"], "in_channel");
        assert_eq!(body["text"], "no activity in #general");
        assert!(t.sink.deliveries().is_empty());
    }

    #[tokio::test]
    async fn inline_command_gives_up_at_the_budget() {
        let t = test_app(
            FakePlatform::new()
                .with_channel("C1", "general")
                .with_lookup_delay(Duration::from_millis(500)),
            Duration::from_millis(50),
        );

        let (_, body) = post_form(
            &t.app,
            "/slack/commands/inline",
            command_body("/summary", "general"),
        )
        .await;

        assert_eq!(body["response_type"], "ephemeral");
        assert!(body["text"].as_str().unwrap().contains("try the command again"));
        assert!(t.sink.deliveries().is_empty());
    }

    #[tokio::test]
    async fn events_endpoint_echoes_challenge() {
        let t = test_app(FakePlatform::new(), Duration::from_secs(2));

        let (status, body) = post_json(
            &t.app,
            "/slack/events",
            r#"{"type":"url_verification","challenge":"c-123","token":"x"}"#,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["challenge"], "c-123");

        let (_, body) = post_json(
            &t.app,
            "/slack/events",
            r#"{"type":"event_callback","event":{"type":"app_mention"}}"#,
        )
        .await;
        assert_eq!(body["status"], "ok");

        let (status, _) = post_json(&t.app, "/slack/events", "{not json").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn health_reports_configuration_presence() {
        let t = test_app(FakePlatform::new(), Duration::from_secs(2));

        let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
        let (status, body) = send(&t.app, request).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["configured"]["slack_bot_token"], true);
        assert_eq!(body["configured"]["gemini_api_key"], false);
    }
}

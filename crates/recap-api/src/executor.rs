//! Background executor: runs one invocation's pipeline to a terminal payload
//! and delivers it exactly once.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{OwnedMutexGuard, Semaphore};
use tokio_util::task::TaskTracker;
use tracing::{Instrument, error, info, info_span, warn};

use recap_db::Database;
use recap_types::api::SlashResponse;
use recap_types::models::{ChannelMessage, CommandInvocation, DeliveryResult, Mode};
use recap_types::ports::{ChatPlatform, ResponseSink, Summarizer};
use recap_types::ts::MessageTs;

use crate::error::{CommandError, Stage};
use crate::pipeline::{self, FetchSettings, Window};

/// Collaborators the executor drives.
pub struct Collaborators {
    pub platform: Arc<dyn ChatPlatform>,
    pub summarizer: Arc<dyn Summarizer>,
    pub sink: Arc<dyn ResponseSink>,
    pub db: Arc<Database>,
}

#[derive(Clone)]
pub struct Executor {
    inner: Arc<ExecutorInner>,
}

struct ExecutorInner {
    platform: Arc<dyn ChatPlatform>,
    summarizer: Arc<dyn Summarizer>,
    sink: Arc<dyn ResponseSink>,
    db: Arc<Database>,
    settings: FetchSettings,
    permits: Arc<Semaphore>,
    tracker: TaskTracker,
    cursor_locks: CursorLocks,
}

impl Executor {
    pub fn new(deps: Collaborators, settings: FetchSettings, max_concurrent_jobs: usize) -> Self {
        Self {
            inner: Arc::new(ExecutorInner {
                platform: deps.platform,
                summarizer: deps.summarizer,
                sink: deps.sink,
                db: deps.db,
                settings,
                permits: Arc::new(Semaphore::new(max_concurrent_jobs.max(1))),
                tracker: TaskTracker::new(),
                cursor_locks: CursorLocks::default(),
            }),
        }
    }

    /// Run `invocation` in the background and post its result to the
    /// invocation's callback address. Waits for a worker slot, never cancelled.
    pub fn spawn(&self, invocation: CommandInvocation) {
        let span = job_span(&invocation);
        let this = self.clone();

        self.inner.tracker.spawn(
            async move {
                let Ok(_permit) = this.inner.permits.clone().acquire_owned().await else {
                    error!("Worker pool closed, dropping job");
                    return;
                };
                this.execute(&invocation).await;
            }
            .instrument(span),
        );
    }

    /// Run the pipeline, then deliver. One delivery attempt, failures logged only.
    pub async fn execute(&self, invocation: &CommandInvocation) {
        let result = self.run(invocation).await;

        info!(stage = %Stage::Deliver, visibility = ?result.visibility, "Delivering result");
        let body = SlashResponse::followup(&result);
        match self.inner.sink.deliver(&invocation.response_url, &body).await {
            Ok(()) => info!(
                stage = %Stage::Done,
                "Job finished in {:.0?}",
                invocation.received_at.elapsed()
            ),
            Err(e) => error!("Delivery failed, result is lost: {}", e),
        }
    }

    /// The pipeline up to (not including) delivery. Always yields a payload.
    pub async fn run(&self, invocation: &CommandInvocation) -> DeliveryResult {
        match self.pipeline(invocation).await {
            Ok(result) => result,
            Err(e) => {
                warn!(stage = %e.stage(), "Command failed: {}", e);
                e.to_result()
            }
        }
    }

    async fn pipeline(&self, inv: &CommandInvocation) -> Result<DeliveryResult, CommandError> {
        let inner = &self.inner;

        info!(stage = %Stage::ParseTarget, "Starting {} pipeline", inv.mode.as_str());
        let target = inv
            .target
            .as_deref()
            .ok_or(CommandError::Usage { mode: inv.mode })?;

        info!(stage = %Stage::ResolveChannel, "Looking up #{}", target);
        let channel = inner
            .platform
            .find_channel(target)
            .await
            .map_err(|e| CommandError::transient(Stage::ResolveChannel, target, e))?
            .ok_or_else(|| CommandError::Lookup {
                channel: target.to_string(),
            })?;

        info!(stage = %Stage::VerifyMembership, "Checking membership in {}", channel.id);
        let is_member = inner
            .platform
            .bot_is_member(&channel.id)
            .await
            .map_err(|e| CommandError::transient(Stage::VerifyMembership, &channel.name, e))?;
        if !is_member {
            return Err(CommandError::Permission {
                channel: channel.name,
            });
        }

        match inv.mode {
            Mode::Summary => {
                let messages = self
                    .collect_messages(&channel.id, &channel.name, &Window::Summary)
                    .await?
                    .0;

                info!(stage = %Stage::Summarize, "Summarizing {} messages", messages.len());
                let text = inner
                    .summarizer
                    .summarize(&messages, &channel.name, None)
                    .await;
                Ok(DeliveryResult::in_channel(text))
            }
            Mode::Unread => {
                // Held from cursor read to cursor write
                let _guard = inner.cursor_locks.lock(&inv.user_id, &channel.id).await;

                let cursor = self
                    .read_cursor(&inv.user_id, &channel.id)
                    .await
                    .map_err(|e| CommandError::transient(Stage::FetchMessages, &channel.name, e))?;

                let window = Window::Unread {
                    cursor,
                    invoker: inv.user_id.clone(),
                };
                let (messages, newest) = self
                    .collect_messages(&channel.id, &channel.name, &window)
                    .await?;

                let reader: &str = if inv.user_name.is_empty() {
                    &inv.user_id
                } else {
                    &inv.user_name
                };
                info!(stage = %Stage::Summarize, "Summarizing {} unread messages", messages.len());
                let text = inner
                    .summarizer
                    .summarize(&messages, &channel.name, Some(reader))
                    .await;

                // Advanced before delivery: a failed callback still marks these read
                if let Some(newest) = newest {
                    self.advance_cursor(&inv.user_id, &channel.id, newest).await;
                }

                Ok(DeliveryResult::ephemeral(text))
            }
        }
    }

    async fn collect_messages(
        &self,
        channel_id: &str,
        channel_name: &str,
        window: &Window,
    ) -> Result<(Vec<ChannelMessage>, Option<MessageTs>), CommandError> {
        let inner = &self.inner;

        info!(stage = %Stage::FetchMessages, "Fetching history for {}", channel_id);
        let fetched = pipeline::fetch_messages(
            inner.platform.as_ref(),
            channel_id,
            window,
            Utc::now(),
            &inner.settings,
        )
        .await
        .map_err(|e| CommandError::transient(Stage::FetchMessages, channel_name, e))?;

        info!(stage = %Stage::EnrichAuthors, "Resolving authors of {} messages", fetched.messages.len());
        let messages = pipeline::enrich_authors(
            inner.platform.as_ref(),
            channel_id,
            fetched.messages,
            &inner.settings,
        )
        .await;

        Ok((messages, fetched.newest))
    }

    async fn read_cursor(&self, user_id: &str, channel_id: &str) -> Result<MessageTs, String> {
        let db = self.inner.db.clone();
        let (uid, cid) = (user_id.to_string(), channel_id.to_string());

        tokio::task::spawn_blocking(move || db.last_read_or_default(&uid, &cid, Utc::now()))
            .await
            .map_err(|e| {
                error!("spawn_blocking join error: {}", e);
                e.to_string()
            })?
            .map_err(|e| e.to_string())
    }

    async fn advance_cursor(&self, user_id: &str, channel_id: &str, ts: MessageTs) {
        let db = self.inner.db.clone();
        let (uid, cid) = (user_id.to_string(), channel_id.to_string());

        match tokio::task::spawn_blocking(move || db.advance_cursor(&uid, &cid, ts)).await {
            Ok(Ok(true)) => info!("Cursor advanced to {}", ts),
            Ok(Ok(false)) => info!("Cursor already at or past {}", ts),
            Ok(Err(e)) => error!("Failed to advance cursor: {}", e),
            Err(e) => error!("spawn_blocking join error: {}", e),
        }
    }

    /// Jobs accepted and not yet finished.
    pub fn in_flight(&self) -> usize {
        self.inner.tracker.len()
    }

    /// Stop accepting new jobs and wait up to `drain` for in-flight ones.
    /// Returns whether everything finished in time.
    pub async fn shutdown(&self, drain: Duration) -> bool {
        self.inner.tracker.close();
        let pending = self.in_flight();
        if pending > 0 {
            info!("Waiting for {} in-flight jobs", pending);
        }
        match tokio::time::timeout(drain, self.inner.tracker.wait()).await {
            Ok(()) => true,
            Err(_) => {
                warn!("Drain timed out with {} jobs still running", self.in_flight());
                false
            }
        }
    }
}

fn job_span(inv: &CommandInvocation) -> tracing::Span {
    info_span!(
        "job",
        id = %inv.request_id,
        command = %inv.command,
        mode = inv.mode.as_str(),
        channel = inv.target.as_deref().unwrap_or("-"),
    )
}

/// One async mutex per (user, channel), created on demand.
#[derive(Default)]
struct CursorLocks {
    locks: Mutex<HashMap<(String, String), Arc<tokio::sync::Mutex<()>>>>,
}

impl CursorLocks {
    async fn lock(&self, user_id: &str, channel_id: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
            // Drop entries nobody holds or waits on
            locks.retain(|_, l| Arc::strong_count(l) > 1);
            locks
                .entry((user_id.to_string(), channel_id.to_string()))
                .or_default()
                .clone()
        };
        lock.lock_owned().await
    }
}

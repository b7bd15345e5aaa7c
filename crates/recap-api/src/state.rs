use std::time::Duration;

use recap_types::api::ConfiguredCredentials;

use crate::executor::Executor;

#[derive(Clone)]
pub struct AppState {
    pub executor: Executor,
    /// How long the inline endpoint may work before answering with a placeholder.
    pub inline_budget: Duration,
    pub configured: ConfiguredCredentials,
}

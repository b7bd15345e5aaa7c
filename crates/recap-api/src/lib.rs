//! Slash-command front end: parsing, the immediate responder, and the
//! background executor that does the actual work.

pub mod command;
pub mod error;
pub mod executor;
pub mod handlers;
pub mod pipeline;
pub mod state;

#[cfg(test)]
mod fakes;

use axum::{
    Router,
    routing::{get, post},
};

pub use executor::{Collaborators, Executor};
pub use pipeline::FetchSettings;
pub use state::AppState;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::index))
        .route("/health", get(handlers::health))
        .route("/slack/commands", post(handlers::slash_command))
        .route("/slack/commands/inline", post(handlers::slash_command_inline))
        .route("/slack/events", post(handlers::events))
        .with_state(state)
}

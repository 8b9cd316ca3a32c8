use crate::state::AppState;
use axum::Router;

mod dto;
pub(crate) mod extractors;
pub mod handlers;
pub mod password;
pub mod service;
pub mod token;

pub use extractors::AuthSession;

pub fn router() -> Router<AppState> {
    handlers::router()
}

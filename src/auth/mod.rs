use crate::state::AppState;
use axum::Router;

pub mod context;
mod dto;
pub mod handlers;
pub mod password;
pub mod repo;
pub mod resolver;
pub mod session;
pub mod token;

pub fn router() -> Router<AppState> {
    handlers::auth_routes()
}

//! Web API 层：REST 端点与 WebSocket 扇出/恢复网关。

pub mod error;
pub mod routes;
pub mod state;
pub mod ws;

pub use error::ApiError;
pub use routes::router;
pub use state::AppState;

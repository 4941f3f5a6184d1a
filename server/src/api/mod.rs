pub mod leaderboard;
pub mod request_meta;
pub mod server;
pub mod submit;

pub use server::{AppState, build_router, run_api_server, serve};

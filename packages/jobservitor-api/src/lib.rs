pub mod app;
pub mod config;
pub mod error;
pub mod routes;
pub mod state;

pub use app::build_app;
pub use config::Config;
pub use error::ApiError;
pub use state::AppState;

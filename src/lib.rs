pub mod app;
pub mod audit;
pub mod config;
pub mod db;
pub mod errors;
pub mod extract;
pub mod handlers;
pub mod models;
pub mod response;
pub mod roles;
pub mod services;
pub mod state;
pub mod stats;
pub mod ui;

pub use app::router;
pub use config::Config;
pub use state::AppState;

pub mod app;
pub mod config;
pub mod errors;
pub mod export;
pub mod filter;
pub mod handlers;
pub mod models;
pub mod notes;
pub mod readings;
pub mod session;
pub mod state;
pub mod stats;
pub mod storage;
pub mod store;
pub mod sync;
pub mod ui;

pub use app::router;
pub use config::Config;
pub use state::AppState;
pub use storage::{load_data, resolve_data_path};
pub use store::{RecordStore, RenderSink, SyncState};

// Public modules
pub mod chat;
pub mod client;
pub mod config;
pub mod error;
pub mod request;
pub mod session;
pub mod storage;
pub mod types;
pub mod validation;

mod observability;

// Re-exports
pub use client::SessionClient;
pub use config::ClientConfig;
pub use error::{Error, Result};
pub use observability::register_biometrics;
pub use request::{RequestOptions, RequestOutcome, ResponseBody};
pub use session::{Session, SessionState};
pub use storage::{FileTokenStore, MemoryTokenStore, TokenStore};
pub use types::*;

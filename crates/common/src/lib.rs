//! pagediff common library
//!
//! Configuration, data model and output layout shared by the comparison
//! engine and the CLI.

pub mod config;
pub mod error;
pub mod layout;
pub mod types;

// Re-export commonly used types
pub use config::RunConfig;
pub use error::{Error, Result};
pub use layout::OutputLayout;
pub use types::*;

/// pagediff version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

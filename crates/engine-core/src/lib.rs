pub mod breaker;
pub mod context;
pub mod cutover;
pub mod error;
pub mod progress;
pub mod schema;
pub mod state;
pub mod transfer;

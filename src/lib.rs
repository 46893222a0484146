// ABOUTME: Library root for the differential synchronization core and its Postgres collaborators
// ABOUTME: The CLI binary is a thin shell over `strategy::DifferentialSyncStrategy::synchronize`

pub mod batch;
pub mod catalog;
pub mod config;
pub mod constraint;
pub mod context;
pub mod cursor;
pub mod error;
pub mod merge;
pub mod postgres;
pub mod preflight;
pub mod projection;
pub mod sequence;
pub mod statement;
pub mod strategy;
pub mod table_sync;
pub mod utils;
pub mod value;

pub use context::{SyncContext, SyncReport};
pub use error::SyncError;
pub use strategy::DifferentialSyncStrategy;

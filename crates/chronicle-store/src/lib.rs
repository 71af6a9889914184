pub mod database;
pub mod debounce;
pub mod error;
pub mod schema;
pub mod summaries;

pub use database::Database;
pub use debounce::DebouncedWriter;
pub use error::StoreError;
pub use summaries::{SummaryRecord, SummaryRepo};

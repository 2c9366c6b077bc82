//! Alert ingestion: webhook payloads, sliding-window deduplication, and
//! task materialization.

mod aggregator;
mod creator;
mod handler;
mod types;

pub use aggregator::Aggregator;
pub use creator::TaskCreator;
pub use handler::alert_webhook;
pub use types::{AlertGroup, AlertItem, AlertmanagerPayload, GroupKey};

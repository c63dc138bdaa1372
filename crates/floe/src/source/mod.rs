//! Change-stream query sources.

mod captured;
mod traits;

pub use captured::CapturedSource;
pub use traits::{ChangeStreamSource, DEFAULT_HEARTBEAT_INTERVAL, PartitionQuery, RowStream};

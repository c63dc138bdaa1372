//! Sinks that receive every record of a watch run.

mod channel;
mod ndjson;
mod traits;

pub use channel::{ChannelSink, Delivery};
pub use ndjson::NdjsonSink;
pub use traits::RecordSink;

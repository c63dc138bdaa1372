//! Metrics and observability infrastructure.
//!
//! - `events`: Internal event types and the `InternalEvent` trait
//! - `server`: Prometheus recorder and HTTP endpoint

pub mod events;
pub mod server;

pub use server::{DEFAULT_METRICS_ADDR, MetricsController, init_global, init_test};

/// Emit an internal event.
///
/// ```ignore
/// use floe_core::emit;
/// use floe_core::metrics::events::PartitionStarted;
///
/// emit!(PartitionStarted { target: "orders".to_string() });
/// ```
#[macro_export]
macro_rules! emit {
    ($event:expr) => {
        $crate::metrics::events::InternalEvent::emit($event)
    };
}

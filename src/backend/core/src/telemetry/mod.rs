//! Telemetry: structured logging and authorization metrics.

pub mod logging;
pub mod metrics;

pub use logging::{init_logging, LogFormat, LoggingConfig};
pub use metrics::describe_metrics;

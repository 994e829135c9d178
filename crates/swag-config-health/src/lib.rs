//! Unauthenticated HTTP health probing and bounded log tailing for
//! proxied services.

pub mod client;
pub mod error;
pub mod logs;

pub use client::{HealthMonitor, HealthRequest, HealthResult};
pub use error::HealthError;
pub use logs::{tail_lines, LogCatalog, LogKind};

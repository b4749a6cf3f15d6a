// Admission constants (no magic values)
use std::time::Duration;

/// Interval between reconciliation ticks when nothing kicks the loop (10s)
pub const RECONCILE_INTERVAL: Duration = Duration::from_secs(10);

pub mod messages;
pub mod status;

use std::sync::Arc;
use tokio::sync::{watch, RwLock};

use crate::monitor::TransactionMonitor;

pub use messages::message_routes;
pub use status::{healthz, metrics_endpoint, readyz};

/// Shared state for the HTTP surface. The monitor is written only by the
/// event-pump task; handlers take read access, except the one maintenance
/// mutation (clear), which takes the same lock.
#[derive(Clone)]
pub struct MonitorState {
    pub monitor: Arc<RwLock<TransactionMonitor>>,
    pub connected: watch::Receiver<bool>,
    pub metrics_handle: metrics_exporter_prometheus::PrometheusHandle,
}

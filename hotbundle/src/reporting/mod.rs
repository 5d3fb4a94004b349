//! Stats and channel reporting.
//!
//! The lifecycle manager reports events through the [`StatsReporter`] trait.
//! [`ReportingClient`] is the HTTP implementation; [`NoopReporter`] discards
//! everything and is the default when no endpoints are configured.
//!
//! Every call is fire-and-forget: implementations must not block the caller
//! and must not surface errors.

mod client;
mod payload;

pub use client::{ReportingClient, ReportingConfig, DEFAULT_REPORTING_TIMEOUT_SECS};
pub use payload::{ChannelPayload, DeviceInfo, StatsPayload};

use serde_json::{Map, Value};
use tracing::debug;

/// Callback receiving a successful JSON object response.
pub type ResponseCallback = Box<dyn FnOnce(Map<String, Value>) + Send + 'static>;

/// Sink for lifecycle events and channel queries.
pub trait StatsReporter: Send + Sync {
    /// Report a lifecycle event (`set`, `set_fail`, `reset`, `delete`).
    ///
    /// `version_name` names the bundle the event concerns and is only
    /// logged. The payload carries `current_version`, the version of the
    /// bundle that is running when the event is reported.
    fn send_stats(&self, action: &str, version_name: &str, current_version: &str);

    /// Ask `url` whether a newer bundle is available.
    fn check_for_update(&self, url: &str, version_name: &str, on_response: ResponseCallback) {
        let _ = (version_name, on_response);
        debug!(url, "Update check not supported by this reporter");
    }

    /// Assign this device to `channel`.
    fn set_channel(&self, channel: &str, version_name: &str, on_response: ResponseCallback) {
        let _ = (version_name, on_response);
        debug!(channel, "Channel assignment not supported by this reporter");
    }

    /// Query the channel this device is assigned to.
    fn get_channel(&self, version_name: &str, on_response: ResponseCallback) {
        let _ = (version_name, on_response);
        debug!("Channel query not supported by this reporter");
    }
}

/// Reporter that drops every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopReporter;

impl StatsReporter for NoopReporter {
    fn send_stats(&self, action: &str, version_name: &str, current_version: &str) {
        debug!(action, version = version_name, current = current_version, "Stats discarded");
    }
}

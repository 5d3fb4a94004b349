//! HTTP reporting client with a background worker.
//!
//! Requests are queued and sent one at a time by a dedicated worker thread,
//! so callers (typically holding the manager's lock or running on a UI
//! thread) never wait on the network.
//!
//! ```text
//! send_stats / set_channel / ...
//!          │
//!          ▼
//!   ┌─────────────┐   unbounded    ┌──────────────────┐
//!   │   enqueue   │ ─────────────► │  worker thread   │ ──► POST / PUT
//!   └─────────────┘    channel     │ (blocking HTTP)  │ ──► on_response(map)
//!                                  └──────────────────┘
//! ```
//!
//! Failures are logged and never reach the caller. Callbacks run on the
//! worker thread, only for successful responses whose body is a JSON object.

use std::thread::{self, JoinHandle};
use std::time::Duration;

use parking_lot::Mutex;
use reqwest::blocking::Client;
use reqwest::Method;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use super::payload::{ChannelPayload, DeviceInfo, StatsPayload};
use super::{ResponseCallback, StatsReporter};

/// Default timeout for reporting requests in seconds.
pub const DEFAULT_REPORTING_TIMEOUT_SECS: u64 = 20;

/// Endpoints and identity used by [`ReportingClient`].
#[derive(Debug, Clone)]
pub struct ReportingConfig {
    /// Stats endpoint. Empty disables stats.
    pub stats_url: String,
    /// Channel endpoint. Empty disables channel calls.
    pub channel_url: String,
    /// Device identity sent with every request.
    pub device: DeviceInfo,
    /// Per-request timeout.
    pub timeout: Duration,
}

impl Default for ReportingConfig {
    fn default() -> Self {
        Self {
            stats_url: String::new(),
            channel_url: String::new(),
            device: DeviceInfo::default(),
            timeout: Duration::from_secs(DEFAULT_REPORTING_TIMEOUT_SECS),
        }
    }
}

/// A queued HTTP call.
struct Job {
    label: &'static str,
    method: Method,
    url: String,
    body: Value,
    on_response: Option<ResponseCallback>,
}

impl Job {
    fn run(self, client: &Client) {
        let response = match client
            .request(self.method.clone(), &self.url)
            .json(&self.body)
            .send()
        {
            Ok(response) => response,
            Err(e) => {
                warn!(request = self.label, url = %self.url, error = %e, "Reporting request failed");
                return;
            }
        };

        let status = response.status();
        if !status.is_success() {
            warn!(request = self.label, url = %self.url, %status, "Reporting request rejected");
            return;
        }

        let Some(on_response) = self.on_response else {
            debug!(request = self.label, "Reporting request sent");
            return;
        };

        match response.json::<Value>() {
            Ok(Value::Object(map)) => on_response(map),
            Ok(other) => {
                warn!(request = self.label, body = %other, "Expected a JSON object response")
            }
            Err(e) => {
                warn!(request = self.label, error = %e, "Failed to decode reporting response")
            }
        }
    }
}

/// Fire-and-forget client for the update, stats and channel endpoints.
///
/// Dropping the client (or calling [`shutdown`](Self::shutdown)) waits for
/// queued requests to finish.
pub struct ReportingClient {
    config: ReportingConfig,
    sender: Mutex<Option<mpsc::UnboundedSender<Job>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl ReportingClient {
    /// Start the client and its worker thread.
    pub fn new(config: ReportingConfig) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        let timeout = config.timeout;

        let worker = thread::Builder::new()
            .name("hotbundle-reporting".to_string())
            .spawn(move || run_worker(receiver, timeout))
            .map_err(|e| error!(error = %e, "Failed to start reporting worker"))
            .ok();

        Self {
            config,
            sender: Mutex::new(worker.as_ref().map(|_| sender)),
            worker: Mutex::new(worker),
        }
    }

    /// Client configuration.
    pub fn config(&self) -> &ReportingConfig {
        &self.config
    }

    /// Stop accepting requests and wait for the queue to drain.
    pub fn shutdown(&self) {
        // Closing the channel ends the worker loop once the queue is empty.
        self.sender.lock().take();
        if let Some(handle) = self.worker.lock().take() {
            if handle.join().is_err() {
                error!("Reporting worker panicked");
            }
        }
    }

    fn enqueue<T: Serialize>(
        &self,
        label: &'static str,
        method: Method,
        url: &str,
        payload: &T,
        on_response: Option<ResponseCallback>,
    ) {
        let body = match serde_json::to_value(payload) {
            Ok(body) => body,
            Err(e) => {
                error!(request = label, error = %e, "Failed to encode reporting payload");
                return;
            }
        };

        let job = Job {
            label,
            method,
            url: url.to_string(),
            body,
            on_response,
        };

        match self.sender.lock().as_ref() {
            Some(sender) => {
                if sender.send(job).is_err() {
                    warn!(request = label, "Reporting worker stopped, request dropped");
                }
            }
            None => debug!(request = label, "Reporting client shut down, request dropped"),
        }
    }
}

impl StatsReporter for ReportingClient {
    fn send_stats(&self, action: &str, version_name: &str, current_version: &str) {
        if self.config.stats_url.is_empty() {
            return;
        }
        info!(action, version = version_name, current = current_version, "Sending stats");
        let payload = StatsPayload {
            device: self.config.device.for_version(current_version),
            action: action.to_string(),
        };
        self.enqueue("stats", Method::POST, &self.config.stats_url, &payload, None);
    }

    fn check_for_update(&self, url: &str, version_name: &str, on_response: ResponseCallback) {
        if url.is_empty() {
            debug!("No update URL, skipping update check");
            return;
        }
        let payload = self.config.device.for_version(version_name);
        debug!(url, "Checking for update");
        self.enqueue("update", Method::POST, url, &payload, Some(on_response));
    }

    fn set_channel(&self, channel: &str, version_name: &str, on_response: ResponseCallback) {
        if self.config.channel_url.is_empty() {
            return;
        }
        let payload = ChannelPayload {
            device: self.config.device.for_version(version_name),
            channel: channel.to_string(),
        };
        self.enqueue(
            "set_channel",
            Method::POST,
            &self.config.channel_url,
            &payload,
            Some(on_response),
        );
    }

    fn get_channel(&self, version_name: &str, on_response: ResponseCallback) {
        if self.config.channel_url.is_empty() {
            return;
        }
        let payload = self.config.device.for_version(version_name);
        self.enqueue(
            "get_channel",
            Method::PUT,
            &self.config.channel_url,
            &payload,
            Some(on_response),
        );
    }
}

impl Drop for ReportingClient {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run_worker(mut receiver: mpsc::UnboundedReceiver<Job>, timeout: Duration) {
    // The blocking client owns its own runtime; build it on this thread.
    let client = match Client::builder().timeout(timeout).build() {
        Ok(client) => client,
        Err(e) => {
            error!(error = %e, "Failed to create reporting HTTP client");
            while receiver.blocking_recv().is_some() {}
            return;
        }
    };

    debug!("Reporting worker started");
    while let Some(job) = receiver.blocking_recv() {
        job.run(&client);
    }
    debug!("Reporting worker stopped");
}

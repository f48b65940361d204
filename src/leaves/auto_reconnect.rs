//! Automatic reconnection.
//!
//! After an unexpected close, [`AutoReconnectLeaf`] counts down the
//! server's `retryWaitTime` one second at a time and then reconnects.
//!
//! ```text
//! closed(1006), retryWaitTime = 3
//!   +1s ─► countdown 2
//!   +2s ─► countdown 1
//!   +3s ─► countdown 0 ─► reconnect
//! ```
//!
//! A countdown is abandoned when the client connects, reconnects or
//! disconnects in the meantime, and replaced when another close arrives.

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::client::{ClientHandle, DEFAULT_RETRY_WAIT_TIME};
use crate::identifiers::Epoch;
use crate::leaf::{Hook, HookSet, Leaf};
use crate::protocol::ServerHandshakeData;
use crate::transport::NO_RECONNECT_CODE;

use super::status::{StatusEvent, StatusSender, emit};

// ============================================================================
// Constants
// ============================================================================

/// Length of one countdown tick.
const TICK: Duration = Duration::from_secs(1);

// ============================================================================
// AutoReconnectLeaf
// ============================================================================

/// Reconnects after unexpected disconnects.
#[derive(Debug)]
pub struct AutoReconnectLeaf {
    /// Close codes that never trigger a reconnect.
    ignored_codes: Vec<u16>,
    /// Seconds to count down, as declared by the server.
    retry_wait_time: u64,
    /// Receives a [`StatusEvent::ReconnectCountdown`] per tick.
    status: Option<StatusSender>,
    /// Client this leaf is registered on.
    client: Option<ClientHandle>,
    /// Running countdown.
    countdown: Option<JoinHandle<()>>,
}

impl Default for AutoReconnectLeaf {
    fn default() -> Self {
        Self::new()
    }
}

impl AutoReconnectLeaf {
    /// Creates a leaf that ignores [`NO_RECONNECT_CODE`].
    #[must_use]
    pub fn new() -> Self {
        Self {
            ignored_codes: vec![NO_RECONNECT_CODE],
            retry_wait_time: DEFAULT_RETRY_WAIT_TIME,
            status: None,
            client: None,
            countdown: None,
        }
    }

    /// Replaces the close codes that never trigger a reconnect.
    #[must_use]
    pub fn with_ignored_codes(mut self, codes: impl IntoIterator<Item = u16>) -> Self {
        self.ignored_codes = codes.into_iter().collect();
        self
    }

    /// Reports countdown ticks to `sender`.
    #[must_use]
    pub fn with_status(mut self, sender: StatusSender) -> Self {
        self.status = Some(sender);
        self
    }

    /// Returns the close codes that never trigger a reconnect.
    #[must_use]
    pub fn ignored_codes(&self) -> &[u16] {
        &self.ignored_codes
    }

    /// Returns the seconds the next countdown will take.
    #[must_use]
    pub fn retry_wait_time(&self) -> u64 {
        self.retry_wait_time
    }

    /// Returns `true` while a countdown is running.
    #[must_use]
    pub fn is_counting_down(&self) -> bool {
        self.countdown
            .as_ref()
            .is_some_and(|task| !task.is_finished())
    }

    fn cancel(&mut self) {
        if let Some(task) = self.countdown.take()
            && !task.is_finished()
        {
            debug!("Reconnect countdown abandoned");
            task.abort();
        }
    }

    fn start_countdown(&mut self) {
        self.cancel();

        let Some(client) = self.client.clone() else {
            return;
        };
        let ticket = client.ticket();

        if self.retry_wait_time == 0 {
            reconnect(&client, ticket);
            return;
        }

        let Ok(runtime) = Handle::try_current() else {
            warn!("No tokio runtime for reconnect countdown, reconnecting now");
            reconnect(&client, ticket);
            return;
        };

        debug!(seconds = self.retry_wait_time, %ticket, "Reconnect countdown started");

        self.countdown = Some(runtime.spawn(count_down(
            client,
            ticket,
            self.retry_wait_time,
            self.status.clone(),
        )));
    }
}

impl Leaf for AutoReconnectLeaf {
    fn hooks(&self) -> HookSet {
        [
            Hook::PreConnect,
            Hook::PreDisconnect,
            Hook::PostDisconnect,
            Hook::ProcessServerHandshake,
        ]
        .into_iter()
        .collect()
    }

    fn register(&mut self, client: ClientHandle) {
        self.client = Some(client);
    }

    fn deregister(&mut self) {
        self.cancel();
        self.client = None;
    }

    fn pre_connect(&mut self, _is_reconnecting: bool) {
        self.cancel();
    }

    fn pre_disconnect(&mut self, _code: u16) {
        self.cancel();
    }

    fn post_disconnect(&mut self, code: u16) {
        if self.ignored_codes.contains(&code) {
            debug!(code, "Close code ignored, not reconnecting");
            return;
        }

        self.start_countdown();
    }

    fn process_server_handshake(&mut self, data: &ServerHandshakeData) {
        if let Some(retry_wait_time) = data.retry_wait_time {
            self.retry_wait_time = retry_wait_time;
        }
    }
}

impl Drop for AutoReconnectLeaf {
    fn drop(&mut self) {
        self.cancel();
    }
}

// ============================================================================
// Countdown
// ============================================================================

async fn count_down(client: ClientHandle, ticket: Epoch, seconds: u64, status: Option<StatusSender>) {
    for seconds_remaining in (0..seconds).rev() {
        tokio::time::sleep(TICK).await;

        if let Some(status) = &status {
            emit(status, StatusEvent::ReconnectCountdown { seconds_remaining });
        }
    }

    reconnect(&client, ticket);
}

fn reconnect(client: &ClientHandle, ticket: Epoch) {
    if let Err(e) = client.reconnect_if_current(ticket) {
        debug!(error = %e, "Reconnect not queued");
    }
}

// ============================================================================
// Tests
// ============================================================================

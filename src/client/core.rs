//! Session client.
//!
//! [`Client`] owns the transport and the bush, and runs the connection
//! state machine. It is a plain `&mut self` state machine: transport events
//! and [`ClientHandle`] commands are queued on channels the client owns and
//! run to completion one at a time by [`Client::step`], [`Client::drain`]
//! or [`Client::run`].
//!
//! # Handshake
//!
//! ```text
//! Client                                   Server
//!   │ ── socket opened ───────────────────► │
//!   │ ── handshake {userId, timezone} ────► │
//!   │ ◄── handshake {userId, retryWaitTime} │
//!   │        (Ready: traffic allowed)       │
//!   │ ── submit-query / submit-event ─────► │
//!   │ ◄── render-letter ─────────────────── │
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, info, trace, warn};
use url::Url;

use crate::error::{Error, Result};
use crate::identifiers::{Epoch, Generation, LeafId};
use crate::leaf::{Bush, Leaf};
use crate::protocol::{
    ClientHandshakeData, EventMessage, Inbound, MessageData, QueryMessage, RawEnvelope,
    RenderLetterData, RequestKind, ServerHandshakeData,
};
use crate::transport::{
    Connector, EventSink, NO_RECONNECT_CODE, ReadyState, TaggedEvent, Transport, TransportEvent,
};

use super::builder::ClientBuilder;
use super::handle::{ClientCommand, ClientHandle, Reply};
use super::options::SessionOptions;
use super::state::ConnectionState;

// ============================================================================
// Client
// ============================================================================

/// A BotSocket session.
///
/// Create one with [`Client::builder()`].
///
/// # Example
///
/// ```no_run
/// use botsocket_client::Client;
///
/// # async fn example() -> botsocket_client::Result<()> {
/// let mut client = Client::builder()
///     .url("wss://bots.example.com/socket")
///     .build()?;
///
/// client.connect()?;
/// client.run().await?;
/// # Ok(())
/// # }
/// ```
pub struct Client {
    /// Server endpoint.
    url: Url,
    /// Session identity; empty until known.
    user_id: String,
    /// Timezone stamped on outgoing messages.
    timezone: Option<String>,
    /// Capabilities advertised in the handshake.
    supports: Vec<String>,
    /// Seconds to wait before reconnecting, as declared by the server.
    retry_wait_time: u64,

    /// Session state.
    state: ConnectionState,
    /// Code of the most recent close.
    last_close_code: Option<u16>,

    /// Creates a transport per connect.
    connector: Box<dyn Connector>,
    /// Current transport, if any.
    transport: Option<Box<dyn Transport>>,
    /// Generation of the current transport.
    generation: Generation,
    /// Moves on with every connect, reconnect and disconnect.
    epoch: Arc<AtomicU64>,

    /// Registered leaves.
    bush: Bush,

    /// Transport events, tagged by generation.
    event_tx: mpsc::UnboundedSender<TaggedEvent>,
    event_rx: mpsc::UnboundedReceiver<TaggedEvent>,
    /// Commands from handles.
    command_tx: mpsc::UnboundedSender<ClientCommand>,
    command_rx: mpsc::UnboundedReceiver<ClientCommand>,
}

// ============================================================================
// Constructors
// ============================================================================

impl Client {
    /// Creates a configuration builder for the client.
    #[inline]
    #[must_use]
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    /// Creates a client. The URL and options are assumed valid.
    pub(crate) fn new(url: Url, options: SessionOptions, connector: Box<dyn Connector>) -> Self {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (command_tx, command_rx) = mpsc::unbounded_channel();

        Self {
            url,
            user_id: options.user_id,
            timezone: options.timezone,
            supports: options.supports,
            retry_wait_time: options.retry_wait_time,
            state: ConnectionState::Idle,
            last_close_code: None,
            connector,
            transport: None,
            generation: Generation::default(),
            epoch: Arc::new(AtomicU64::new(0)),
            bush: Bush::new(),
            event_tx,
            event_rx,
            command_tx,
            command_rx,
        }
    }
}

// ============================================================================
// Accessors
// ============================================================================

impl Client {
    /// Returns the server endpoint.
    #[inline]
    #[must_use]
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Returns the session state.
    #[inline]
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Returns `true` if the current transport has an open socket.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.transport
            .as_ref()
            .is_some_and(|transport| transport.is_connected())
    }

    /// Returns the ready state of the current transport.
    #[must_use]
    pub fn ready_state(&self) -> ReadyState {
        self.transport
            .as_ref()
            .map_or(ReadyState::Closed, |transport| transport.ready_state())
    }

    /// Returns the session identity. Empty until known.
    #[inline]
    #[must_use]
    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// Sets the session identity.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if `user_id` is empty.
    pub fn set_user_id(&mut self, user_id: impl Into<String>) -> Result<()> {
        let user_id = user_id.into();
        if user_id.is_empty() {
            return Err(Error::invalid_argument("user id must not be empty"));
        }

        self.user_id = user_id;
        Ok(())
    }

    /// Returns the timezone stamped on outgoing messages.
    #[inline]
    #[must_use]
    pub fn timezone(&self) -> Option<&str> {
        self.timezone.as_deref()
    }

    /// Sets the timezone stamped on outgoing messages.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if `timezone` is empty.
    pub fn set_timezone(&mut self, timezone: impl Into<String>) -> Result<()> {
        let timezone = timezone.into();
        if timezone.is_empty() {
            return Err(Error::invalid_argument("timezone must not be empty"));
        }

        self.timezone = Some(timezone);
        Ok(())
    }

    /// Returns the capabilities advertised in the handshake.
    #[inline]
    #[must_use]
    pub fn supports(&self) -> &[String] {
        &self.supports
    }

    /// Returns the seconds to wait before reconnecting.
    #[inline]
    #[must_use]
    pub fn retry_wait_time(&self) -> u64 {
        self.retry_wait_time
    }

    /// Returns the code of the most recent close.
    #[inline]
    #[must_use]
    pub fn last_close_code(&self) -> Option<u16> {
        self.last_close_code
    }

    /// Returns the generation of the current transport.
    #[inline]
    #[must_use]
    pub fn generation(&self) -> Generation {
        self.generation
    }

    /// Returns the current epoch.
    #[inline]
    #[must_use]
    pub fn epoch(&self) -> Epoch {
        Epoch::new(self.epoch.load(Ordering::Acquire))
    }

    /// Returns a handle for driving this client from elsewhere.
    #[must_use]
    pub fn handle(&self) -> ClientHandle {
        ClientHandle::new(&self.command_tx, &self.epoch)
    }

    /// Returns the registered leaves.
    #[inline]
    #[must_use]
    pub fn bush(&self) -> &Bush {
        &self.bush
    }
}

// ============================================================================
// Leaves
// ============================================================================

impl Client {
    /// Registers a leaf at the end of the bush.
    pub fn register_leaf(&mut self, leaf: impl Leaf) -> LeafId {
        self.register_boxed_leaf(Box::new(leaf))
    }

    /// Registers an already boxed leaf at the end of the bush.
    pub fn register_boxed_leaf(&mut self, leaf: Box<dyn Leaf>) -> LeafId {
        let handle = self.handle();
        self.bush.register(leaf, handle)
    }

    /// Removes a leaf and hands it back.
    ///
    /// Returns `None` if `id` is not registered; nothing changes.
    pub fn deregister_leaf(&mut self, id: LeafId) -> Option<Box<dyn Leaf>> {
        self.bush.deregister(id)
    }
}

// ============================================================================
// Connection
// ============================================================================

impl Client {
    /// Opens a new socket.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidState`] unless idle or disconnected
    /// - Whatever the connector returns
    pub fn connect(&mut self) -> Result<()> {
        if !self.state.can_connect() {
            return Err(Error::invalid_state("connect", self.state));
        }

        self.open_transport(false)
    }

    /// Opens a new socket after a disconnect.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidState`] unless idle or disconnected
    /// - Whatever the connector returns
    pub fn reconnect(&mut self) -> Result<()> {
        if !self.state.can_connect() {
            return Err(Error::invalid_state("reconnect", self.state));
        }

        self.set_state(ConnectionState::Reconnecting);
        self.open_transport(true)
    }

    /// Closes the socket on purpose; it is never auto-reconnected.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidState`] if the client never connected.
    pub fn disconnect(&mut self) -> Result<()> {
        self.close(NO_RECONNECT_CODE)
    }

    /// Closes the socket with the given close code.
    ///
    /// Leaves see [`Leaf::pre_disconnect`] first. Without a socket (for
    /// example while a reconnect countdown runs) only the leaves are told.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidState`] if the client never connected.
    pub fn close(&mut self, code: u16) -> Result<()> {
        match self.state {
            ConnectionState::Idle => return Err(Error::invalid_state("disconnect", self.state)),
            ConnectionState::Closing => return Ok(()),
            _ => {}
        }

        self.bump_epoch();
        self.bush.pre_disconnect(code);

        if let Some(transport) = self.transport.as_mut()
            && self.state.has_socket()
        {
            debug!(code, generation = %self.generation, "Closing transport");
            transport.close(code);
            self.set_state(ConnectionState::Closing);
        }

        Ok(())
    }

    fn open_transport(&mut self, is_reconnecting: bool) -> Result<()> {
        self.bump_epoch();
        self.bush.pre_connect(is_reconnecting);

        self.generation = self.generation.next();
        self.transport = None;

        let sink = EventSink::new(self.generation, self.event_tx.clone());

        match self.connector.connect(&self.url, sink) {
            Ok(transport) => {
                info!(url = %self.url, generation = %self.generation, is_reconnecting, "Connecting");
                self.transport = Some(transport);
                self.set_state(ConnectionState::Connecting);
                Ok(())
            }
            Err(e) => {
                warn!(url = %self.url, error = %e, "Failed to create transport");
                self.set_state(ConnectionState::Disconnected);
                Err(e)
            }
        }
    }

    fn bump_epoch(&self) {
        let epoch = self.epoch.fetch_add(1, Ordering::AcqRel) + 1;
        trace!(epoch, "Epoch advanced");
    }

    fn set_state(&mut self, state: ConnectionState) {
        if self.state != state {
            debug!(from = %self.state, to = %state, "Connection state changed");
            self.state = state;
        }
    }
}

// ============================================================================
// Outbound
// ============================================================================

impl Client {
    /// Sends a query.
    ///
    /// The message's `senderId` defaults to the session identity; `data`
    /// fields are merged over it and leaves may change it again.
    ///
    /// # Errors
    ///
    /// - [`Error::SocketNotReady`] without an open socket
    /// - [`Error::HandshakePending`] before the server handshake
    /// - [`Error::MissingSenderId`] if the result has no `senderId`
    pub fn send_query(
        &mut self,
        query: impl Into<String>,
        text: Option<String>,
        data: Option<Value>,
    ) -> Result<()> {
        self.require_ready()?;

        let mut seed = QueryMessage::new(query, text, self.message_data(data));
        seed.timezone = self.timezone.clone();

        let message = self.bush.supplement_query(seed);
        if !message.data.has_sender() {
            return Err(Error::missing_sender_id(RequestKind::SubmitQuery));
        }

        self.send(RequestKind::SubmitQuery, serde_json::to_value(&message)?)
    }

    /// Sends an event.
    ///
    /// # Errors
    ///
    /// - [`Error::SocketNotReady`] without an open socket
    /// - [`Error::HandshakePending`] before the server handshake
    /// - [`Error::MissingSenderId`] if the result has no `senderId`
    pub fn send_event(
        &mut self,
        event: impl Into<String>,
        payload: Option<Value>,
        data: Option<Value>,
    ) -> Result<()> {
        self.require_ready()?;

        let mut seed = EventMessage::new(event, payload, self.message_data(data));
        seed.timezone = self.timezone.clone();

        let message = self.bush.supplement_event(seed);
        if !message.data.has_sender() {
            return Err(Error::missing_sender_id(RequestKind::SubmitEvent));
        }

        self.send(RequestKind::SubmitEvent, serde_json::to_value(&message)?)
    }

    fn send_client_handshake(&mut self) -> Result<()> {
        let seed = ClientHandshakeData {
            user_id: Some(self.user_id.clone()).filter(|id| !id.is_empty()),
            timezone: self.timezone.clone(),
            supports: self.supports.clone(),
            ..ClientHandshakeData::default()
        };

        let handshake = self.bush.supplement_client_handshake(seed);
        self.send(RequestKind::Handshake, serde_json::to_value(&handshake)?)
    }

    fn message_data(&self, data: Option<Value>) -> MessageData {
        let mut seed = MessageData::new(self.user_id.clone());
        if let Some(data) = data {
            seed.merge(MessageData::from_value(data));
        }
        seed
    }

    fn require_ready(&self) -> Result<()> {
        match self.state {
            ConnectionState::Ready => Ok(()),
            ConnectionState::AwaitingHandshake => Err(Error::handshake_pending(self.state)),
            _ => Err(Error::socket_not_ready(self.ready_state())),
        }
    }

    fn send(&mut self, request: RequestKind, data: Value) -> Result<()> {
        let transport = self
            .transport
            .as_mut()
            .ok_or_else(|| Error::socket_not_ready(ReadyState::Closed))?;

        transport.send(request, data)?;
        trace!(%request, generation = %self.generation, "Envelope sent");
        Ok(())
    }
}

// ============================================================================
// Event Loop
// ============================================================================

impl Client {
    /// Waits for the next transport event or command and handles it.
    ///
    /// Commands are handled before transport events.
    ///
    /// # Errors
    ///
    /// - [`Error::UnsupportedRequestType`] for an unknown inbound request
    /// - [`Error::Protocol`] for inbound data of the wrong shape
    /// - Send errors while answering the socket opening
    pub async fn step(&mut self) -> Result<()> {
        tokio::select! {
            biased;

            Some(command) = self.command_rx.recv() => {
                self.handle_command(command);
                Ok(())
            }

            Some(event) = self.event_rx.recv() => self.handle_event(event),

            else => Err(Error::ConnectionClosed),
        }
    }

    /// Handles everything already queued, without waiting.
    ///
    /// Returns the number of items handled. Stops at the first error;
    /// whatever is still queued stays queued.
    ///
    /// # Errors
    ///
    /// See [`Client::step`].
    pub fn drain(&mut self) -> Result<usize> {
        let mut handled = 0;

        loop {
            if let Ok(command) = self.command_rx.try_recv() {
                self.handle_command(command);
            } else if let Ok(event) = self.event_rx.try_recv() {
                self.handle_event(event)?;
            } else {
                return Ok(handled);
            }

            handled += 1;
        }
    }

    /// Steps until the socket closed with [`NO_RECONNECT_CODE`].
    ///
    /// # Errors
    ///
    /// Returns the first error of [`Client::step`].
    pub async fn run(&mut self) -> Result<()> {
        loop {
            self.step().await?;

            if self.state == ConnectionState::Disconnected
                && self.last_close_code == Some(NO_RECONNECT_CODE)
            {
                info!("Client disconnected");
                return Ok(());
            }
        }
    }

    fn handle_command(&mut self, command: ClientCommand) {
        let name = command.name();
        trace!(command = name, "Handling command");

        match command {
            ClientCommand::Connect => self.log_failure(name, None, |client| client.connect()),

            ClientCommand::Reconnect { ticket } => {
                if let Some(ticket) = ticket
                    && ticket != self.epoch()
                {
                    debug!(%ticket, epoch = %self.epoch(), "Dropping stale reconnect");
                    return;
                }
                self.log_failure(name, None, |client| client.reconnect());
            }

            ClientCommand::Disconnect { code } => {
                self.log_failure(name, None, |client| client.close(code));
            }

            ClientCommand::SendQuery {
                query,
                text,
                data,
                reply,
            } => self.log_failure(name, reply, |client| client.send_query(query, text, data)),

            ClientCommand::SendEvent {
                event,
                payload,
                data,
                reply,
            } => self.log_failure(name, reply, |client| client.send_event(event, payload, data)),
        }
    }

    /// Runs a command, reporting the outcome to `reply` or to the log.
    fn log_failure(
        &mut self,
        command: &'static str,
        reply: Option<Reply>,
        run: impl FnOnce(&mut Self) -> Result<()>,
    ) {
        let result = run(self);

        match reply {
            Some(reply) => {
                if reply.send(result).is_err() {
                    trace!(command, "Command caller went away");
                }
            }
            None => {
                if let Err(e) = result {
                    warn!(command, error = %e, state = %self.state, "Client command failed");
                }
            }
        }
    }

    fn handle_event(&mut self, tagged: TaggedEvent) -> Result<()> {
        if tagged.generation != self.generation {
            debug!(
                generation = %tagged.generation,
                current = %self.generation,
                "Ignoring event from superseded transport"
            );
            return Ok(());
        }

        match tagged.event {
            TransportEvent::Opened => self.on_opened(),
            TransportEvent::Closed { code } => {
                self.on_closed(code);
                Ok(())
            }
            TransportEvent::Errored { message } => {
                warn!(generation = %self.generation, error = %message, "Transport errored");
                self.bush.errored();
                Ok(())
            }
            TransportEvent::Messaged(envelope) => self.on_message(envelope),
        }
    }
}

// ============================================================================
// Inbound
// ============================================================================

impl Client {
    fn on_opened(&mut self) -> Result<()> {
        if self.state != ConnectionState::Connecting {
            debug!(state = %self.state, "Ignoring open outside of connecting");
            return Ok(());
        }

        self.set_state(ConnectionState::AwaitingHandshake);

        let sent = self.send_client_handshake();
        self.bush.post_connect();
        sent
    }

    fn on_closed(&mut self, code: u16) {
        if !self.state.has_socket() {
            debug!(code, state = %self.state, "Ignoring close without a socket");
            return;
        }

        info!(code, generation = %self.generation, "Transport closed");

        self.transport = None;
        self.last_close_code = Some(code);
        self.set_state(ConnectionState::Disconnected);
        self.bush.post_disconnect(code);
    }

    fn on_message(&mut self, envelope: RawEnvelope) -> Result<()> {
        trace!(request = %envelope.request, "Envelope received");

        match envelope.classify()? {
            Inbound::ServerHandshake(data) => {
                self.on_server_handshake(&data);
                Ok(())
            }
            Inbound::RenderLetter(data) => {
                self.on_render_letter(&data);
                Ok(())
            }
        }
    }

    fn on_server_handshake(&mut self, data: &ServerHandshakeData) {
        if !matches!(
            self.state,
            ConnectionState::AwaitingHandshake | ConnectionState::Ready
        ) {
            warn!(state = %self.state, "Ignoring server handshake before client handshake");
            return;
        }

        if let Some(user_id) = data.declared_user_id() {
            self.user_id = user_id.to_string();
        }
        if let Some(retry_wait_time) = data.retry_wait_time {
            self.retry_wait_time = retry_wait_time;
        }

        info!(
            user_id = %self.user_id,
            retry_wait_time = self.retry_wait_time,
            connection_id = data.connection_id.as_deref().unwrap_or_default(),
            "Handshake completed"
        );

        self.set_state(ConnectionState::Ready);
        self.bush.process_server_handshake(data);
        self.bush.post_handshake();
    }

    fn on_render_letter(&mut self, data: &RenderLetterData) {
        debug!(messages = data.letter.len(), "Letter received");
        self.bush.process_render_letter_request(data);
    }
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("url", &self.url.as_str())
            .field("user_id", &self.user_id)
            .field("state", &self.state)
            .field("generation", &self.generation)
            .field("leaves", &self.bush.len())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use parking_lot::Mutex;
    use serde_json::json;

    use crate::leaf::{Hook, HookSet};
    use crate::transport::{ABNORMAL_CLOSE_CODE, MemoryServer};

    type Log = Arc<Mutex<Vec<String>>>;

    /// Records every lifecycle hook it sees.
    struct Recorder {
        log: Log,
    }

    impl Leaf for Recorder {
        fn hooks(&self) -> HookSet {
            [
                Hook::PreConnect,
                Hook::PostConnect,
                Hook::PreDisconnect,
                Hook::PostDisconnect,
                Hook::Errored,
                Hook::PostHandshake,
                Hook::ProcessServerHandshake,
                Hook::ProcessRenderLetterRequest,
            ]
            .into_iter()
            .collect()
        }

        fn pre_connect(&mut self, is_reconnecting: bool) {
            self.log.lock().push(format!("pre_connect:{is_reconnecting}"));
        }

        fn post_connect(&mut self) {
            self.log.lock().push("post_connect".into());
        }

        fn pre_disconnect(&mut self, code: u16) {
            self.log.lock().push(format!("pre_disconnect:{code}"));
        }

        fn post_disconnect(&mut self, code: u16) {
            self.log.lock().push(format!("post_disconnect:{code}"));
        }

        fn errored(&mut self) {
            self.log.lock().push("errored".into());
        }

        fn post_handshake(&mut self) {
            self.log.lock().push("post_handshake".into());
        }

        fn process_server_handshake(&mut self, data: &ServerHandshakeData) {
            let user_id = data.declared_user_id().unwrap_or_default();
            self.log.lock().push(format!("server_handshake:{user_id}"));
        }

        fn process_render_letter_request(&mut self, data: &RenderLetterData) {
            let texts: Vec<_> = data.letter.iter().filter_map(|m| m.text()).collect();
            self.log.lock().push(format!("letter:{}", texts.join("|")));
        }
    }

    /// Overwrites `senderId` on queries.
    struct SenderOverride(&'static str);

    impl Leaf for SenderOverride {
        fn hooks(&self) -> HookSet {
            HookSet::from(Hook::SupplementQuery)
        }

        fn supplement_query(&mut self, _: &QueryMessage, mut query: QueryMessage) -> QueryMessage {
            query.data.sender_id = self.0.to_string();
            query
        }
    }

    fn client(server: &MemoryServer) -> Client {
        Client::builder()
            .url("ws://bots.local")
            .timezone("Pacific/Auckland")
            .supports(["render-letter"])
            .connector(server.connector())
            .build()
            .expect("build")
    }

    fn ready_client(server: &MemoryServer) -> Client {
        let mut client = client(server);
        client.connect().expect("connect");
        server.open();
        server.handshake(json!({ "userId": "u1", "retryWaitTime": 2 }));
        client.drain().expect("drain");
        assert_eq!(client.state(), ConnectionState::Ready);
        server.take_sent();
        client
    }

    #[test]
    fn test_connect_sends_handshake_once_open() {
        let server = MemoryServer::new();
        let mut client = client(&server);
        client.set_user_id("local").expect("user id");

        client.connect().expect("connect");
        assert_eq!(client.state(), ConnectionState::Connecting);
        assert!(!client.is_connected());
        assert!(server.sent().is_empty());

        server.open();
        client.drain().expect("drain");

        assert_eq!(client.state(), ConnectionState::AwaitingHandshake);
        assert!(client.is_connected());
        assert_eq!(
            server.sent_of(RequestKind::Handshake),
            vec![json!({
                "userId": "local",
                "timezone": "Pacific/Auckland",
                "supports": ["render-letter"]
            })]
        );
    }

    #[test]
    fn test_server_handshake_wins() {
        let server = MemoryServer::new();
        let mut client = client(&server);
        client.set_user_id("local").expect("user id");

        client.connect().expect("connect");
        server.open();
        server.handshake(json!({ "userId": "u1", "retryWaitTime": 2 }));
        client.drain().expect("drain");

        assert_eq!(client.state(), ConnectionState::Ready);
        assert_eq!(client.user_id(), "u1");
        assert_eq!(client.retry_wait_time(), 2);
    }

    #[test]
    fn test_fractional_retry_wait_time_completes_handshake() {
        let server = MemoryServer::new();
        let mut client = client(&server);

        client.connect().expect("connect");
        server.open();
        server.handshake(json!({ "userId": "u1", "retryWaitTime": 1.5 }));
        client.drain().expect("drain");

        assert_eq!(client.state(), ConnectionState::Ready);
        assert_eq!(client.user_id(), "u1");
        assert_eq!(client.retry_wait_time(), 2);
        client.send_query("hi", None, None).expect("query");
    }

    #[test]
    fn test_negative_retry_wait_time_keeps_last_value() {
        let server = MemoryServer::new();
        let mut client = client(&server);
        let before = client.retry_wait_time();

        client.connect().expect("connect");
        server.open();
        server.handshake(json!({ "userId": "u1", "retryWaitTime": -1 }));
        client.drain().expect("drain");

        assert_eq!(client.state(), ConnectionState::Ready);
        assert_eq!(client.retry_wait_time(), before);
    }

    #[test]
    fn test_hook_order_through_a_session() {
        let log = Log::default();
        let server = MemoryServer::new();
        let mut client = client(&server);
        client.register_leaf(Recorder {
            log: Arc::clone(&log),
        });

        client.connect().expect("connect");
        server.open();
        server.handshake(json!({ "userId": "u1" }));
        server.render_letter(json!([{ "type": "text", "text": "hi" }]));
        client.drain().expect("drain");

        client.disconnect().expect("disconnect");
        client.drain().expect("drain");

        assert_eq!(
            *log.lock(),
            vec![
                "pre_connect:false",
                "post_connect",
                "server_handshake:u1",
                "post_handshake",
                "letter:hi",
                "pre_disconnect:3001",
                "post_disconnect:3001",
            ]
        );
        assert_eq!(client.state(), ConnectionState::Disconnected);
        assert_eq!(client.last_close_code(), Some(NO_RECONNECT_CODE));
    }

    #[test]
    fn test_sends_before_ready_fail() {
        let server = MemoryServer::new();
        let mut client = client(&server);

        let err = client.send_query("hi", None, None).unwrap_err();
        assert!(matches!(
            err,
            Error::SocketNotReady {
                state: ReadyState::Closed
            }
        ));

        client.connect().expect("connect");
        server.open();
        client.drain().expect("drain");

        let err = client.send_event("opened", None, None).unwrap_err();
        assert!(matches!(err, Error::HandshakePending { .. }));
        assert!(err.is_recoverable());

        assert!(server.sent_of(RequestKind::SubmitQuery).is_empty());
        assert!(server.sent_of(RequestKind::SubmitEvent).is_empty());
    }

    #[test]
    fn test_send_query_defaults_sender_to_session() {
        let server = MemoryServer::new();
        let mut client = ready_client(&server);

        client
            .send_query("hello", None, Some(json!({ "context": "billing" })))
            .expect("send");

        let sent = server.sent_of(RequestKind::SubmitQuery);
        assert_eq!(
            sent,
            vec![json!({
                "$StaMP": true,
                "type": "query",
                "from": "user",
                "query": "hello",
                "text": "hello",
                "data": { "senderId": "u1", "context": "billing" },
                "timezone": "Pacific/Auckland"
            })]
        );
    }

    #[test]
    fn test_send_event_carries_payload() {
        let server = MemoryServer::new();
        let mut client = ready_client(&server);

        client
            .send_event("opened", Some(json!({ "page": "home" })), None)
            .expect("send");

        let sent = server.sent_of(RequestKind::SubmitEvent);
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0]["event"], json!("opened"));
        assert_eq!(sent[0]["payload"], json!({ "page": "home" }));
        assert_eq!(sent[0]["data"]["senderId"], json!("u1"));
    }

    #[test]
    fn test_leaf_sender_overrides_seed() {
        let server = MemoryServer::new();
        let mut client = ready_client(&server);
        client.register_leaf(SenderOverride("from-leaf"));

        client
            .send_query("hi", None, Some(json!({ "senderId": "from-caller" })))
            .expect("send");

        let sent = server.sent_of(RequestKind::SubmitQuery);
        assert_eq!(sent[0]["data"]["senderId"], json!("from-leaf"));
    }

    #[test]
    fn test_empty_sender_after_reduction_is_rejected() {
        let server = MemoryServer::new();
        let mut client = ready_client(&server);
        client.register_leaf(SenderOverride(""));

        let err = client.send_query("hi", None, None).unwrap_err();
        assert!(matches!(
            err,
            Error::MissingSenderId {
                request: RequestKind::SubmitQuery
            }
        ));
        assert!(server.sent().is_empty());
    }

    #[test]
    fn test_connect_twice_is_rejected() {
        let server = MemoryServer::new();
        let mut client = ready_client(&server);

        let err = client.connect().unwrap_err();
        assert_eq!(err.to_string(), "Cannot connect while ready");
        assert_eq!(server.connect_count(), 1);
    }

    #[test]
    fn test_unknown_request_is_raised() {
        let server = MemoryServer::new();
        let mut client = ready_client(&server);

        server.push("render-cards", json!({}));
        server.render_letter(json!([{ "type": "text", "text": "after" }]));

        let err = client.drain().unwrap_err();
        assert!(matches!(err, Error::UnsupportedRequestType { .. }));
        assert!(client.is_connected());

        assert_eq!(client.drain().expect("drain"), 1);
    }

    #[test]
    fn test_malformed_frame_is_dropped() {
        let server = MemoryServer::new();
        let mut client = ready_client(&server);

        server.push_frame("}{");
        assert_eq!(client.drain().expect("drain"), 0);
        assert_eq!(client.state(), ConnectionState::Ready);
    }

    #[test]
    fn test_errored_does_not_change_state() {
        let log = Log::default();
        let server = MemoryServer::new();
        let mut client = ready_client(&server);
        client.register_leaf(Recorder {
            log: Arc::clone(&log),
        });

        server.error("boom");
        client.drain().expect("drain");

        assert_eq!(*log.lock(), vec!["errored"]);
        assert_eq!(client.state(), ConnectionState::Ready);
    }

    #[test]
    fn test_abnormal_close_leaves_client_disconnected() {
        let server = MemoryServer::new();
        let mut client = ready_client(&server);

        server.fail();
        client.drain().expect("drain");

        assert_eq!(client.state(), ConnectionState::Disconnected);
        assert_eq!(client.last_close_code(), Some(ABNORMAL_CLOSE_CODE));
        assert!(!client.is_connected());
        assert_eq!(client.user_id(), "u1");
    }

    #[test]
    fn test_reconnect_creates_fresh_transport() {
        let log = Log::default();
        let server = MemoryServer::new();
        let mut client = ready_client(&server);
        client.register_leaf(Recorder {
            log: Arc::clone(&log),
        });

        server.close(ABNORMAL_CLOSE_CODE);
        client.drain().expect("drain");

        let before = client.generation();
        client.reconnect().expect("reconnect");

        assert_eq!(server.connect_count(), 2);
        assert!(client.generation() > before);
        assert_eq!(client.state(), ConnectionState::Connecting);
        assert_eq!(
            *log.lock(),
            vec!["post_disconnect:1006", "pre_connect:true"]
        );

        server.open();
        client.drain().expect("drain");
        let handshakes = server.sent_of(RequestKind::Handshake);
        assert_eq!(handshakes.last().map(|h| &h["userId"]), Some(&json!("u1")));
    }

    #[test]
    fn test_events_from_superseded_transport_are_ignored() {
        let server = MemoryServer::new();
        let mut client = ready_client(&server);
        let stale = client.generation();

        server.close(ABNORMAL_CLOSE_CODE);
        client.drain().expect("drain");
        client.reconnect().expect("reconnect");

        client
            .event_tx
            .send(TaggedEvent {
                generation: stale,
                event: TransportEvent::Opened,
            })
            .expect("send");
        client.drain().expect("drain");

        assert_eq!(client.state(), ConnectionState::Connecting);
    }

    #[test]
    fn test_stale_reconnect_ticket_is_dropped() {
        let server = MemoryServer::new();
        let mut client = ready_client(&server);
        let handle = client.handle();

        server.close(ABNORMAL_CLOSE_CODE);
        client.drain().expect("drain");

        let ticket = handle.ticket();
        client.connect().expect("manual connect");
        handle.reconnect_if_current(ticket).expect("queue");
        client.drain().expect("drain");

        assert_eq!(server.connect_count(), 2);
        assert_eq!(client.state(), ConnectionState::Connecting);
    }

    #[test]
    fn test_current_reconnect_ticket_runs() {
        let server = MemoryServer::new();
        let mut client = ready_client(&server);
        let handle = client.handle();

        server.close(ABNORMAL_CLOSE_CODE);
        client.drain().expect("drain");

        handle.reconnect_if_current(handle.ticket()).expect("queue");
        client.drain().expect("drain");

        assert_eq!(server.connect_count(), 2);
    }

    #[test]
    fn test_deregister_leaf_twice() {
        let server = MemoryServer::new();
        let mut client = client(&server);
        let id = client.register_leaf(SenderOverride("x"));

        assert!(client.deregister_leaf(id).is_some());
        assert!(client.deregister_leaf(id).is_none());
        assert!(client.bush().active_branch(Hook::SupplementQuery).is_empty());
    }

    #[test]
    fn test_disconnect_before_connect_is_rejected() {
        let server = MemoryServer::new();
        let mut client = client(&server);
        assert!(matches!(
            client.disconnect(),
            Err(Error::InvalidState { .. })
        ));
    }

    #[test]
    fn test_set_user_id_rejects_empty() {
        let server = MemoryServer::new();
        let mut client = client(&server);
        assert!(client.set_user_id("").is_err());
        assert!(client.set_timezone("").is_err());
        assert_eq!(client.timezone(), Some("Pacific/Auckland"));
    }

    #[tokio::test]
    async fn test_handle_query_reports_outcome() {
        let server = MemoryServer::new();
        let mut client = ready_client(&server);
        let handle = client.handle();

        let (result, stepped) = tokio::join!(handle.query("hi", None, None), client.step());
        stepped.expect("step");
        result.expect("query");
        assert_eq!(server.sent_of(RequestKind::SubmitQuery).len(), 1);

        client.disconnect().expect("disconnect");
        client.drain().expect("drain");

        let (result, stepped) = tokio::join!(handle.event("late", None, None), client.step());
        stepped.expect("step");
        assert!(matches!(result, Err(Error::SocketNotReady { .. })));
    }

    #[tokio::test]
    async fn test_run_returns_after_intentional_disconnect() {
        let server = MemoryServer::auto_open();
        let mut client = client(&server);
        let handle = client.handle();

        handle.connect().expect("connect");
        handle.disconnect().expect("disconnect");

        client.run().await.expect("run");
        assert_eq!(client.state(), ConnectionState::Disconnected);
    }

    #[test]
    fn test_dropped_client_detaches_handles() {
        let server = MemoryServer::new();
        let client = client(&server);
        let handle = client.handle();
        assert!(handle.is_attached());

        drop(client);
        assert!(matches!(handle.connect(), Err(Error::ClientDropped)));
    }
}

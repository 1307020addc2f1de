use std::os::fd::AsRawFd;
use std::sync::Arc;
use std::time::Duration;

use msgplex_frame::{FrameConfig, FrameError, FrameReader, FrameWriter};
use msgplex_transport::{IpcListener, IpcStream, SocketAddress, TransportError, DEFAULT_BACKLOG};
use tracing::{debug, info, trace, warn};

use crate::error::{PeerError, Result};
use crate::handler::{Handler, SharedHandler};
use crate::readiness::PollSet;

/// Default upper bound on messages delivered by one `check_messages` call.
pub const DEFAULT_MAX_MESSAGES_PER_CHECK: usize = 1024;

/// Server behavior configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Frame settings applied to every accepted connection.
    pub frame: FrameConfig,
    /// Listen backlog for every listener. Default: 4096.
    pub backlog: i32,
    /// Messages delivered per `check_messages` call before it returns. Default: 1024.
    pub max_messages_per_check: usize,
    /// Log request and response contents at debug level.
    pub log_payloads: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            frame: FrameConfig::default(),
            backlog: DEFAULT_BACKLOG,
            max_messages_per_check: DEFAULT_MAX_MESSAGES_PER_CHECK,
            log_payloads: false,
        }
    }
}

/// One `(address, handler)` pair served by a [`Server`].
#[derive(Clone)]
pub struct Binding {
    pub address: SocketAddress,
    pub handler: SharedHandler,
}

impl Binding {
    pub fn new(address: SocketAddress, handler: impl Handler + 'static) -> Self {
        Self {
            address,
            handler: Arc::new(handler),
        }
    }
}

impl std::fmt::Debug for Binding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Binding")
            .field("address", &self.address.to_string())
            .finish_non_exhaustive()
    }
}

struct ListenerRecord {
    listener: IpcListener,
    handler: SharedHandler,
}

struct ConnectionRecord {
    id: u64,
    reader: FrameReader<IpcStream>,
    writer: FrameWriter<IpcStream>,
    handler: SharedHandler,
}

/// Why a connection left the active set.
enum Teardown {
    PeerClosed,
    Failed(PeerError),
}

/// Single-threaded server multiplexing many listeners and connections.
///
/// Each listener carries its own handler; every connection accepted on it
/// inherits that handler. Connections stay open across request/response
/// cycles until the peer closes or an error occurs.
pub struct Server {
    bindings: Vec<Binding>,
    config: ServerConfig,
    listeners: Vec<ListenerRecord>,
    connections: Vec<ConnectionRecord>,
    poll: PollSet,
    next_connection_id: u64,
}

impl Server {
    /// Create an unbound server. Nothing is opened until [`listen`](Self::listen).
    pub fn new(bindings: Vec<Binding>) -> Self {
        Self::with_config(bindings, ServerConfig::default())
    }

    pub fn with_config(bindings: Vec<Binding>, config: ServerConfig) -> Self {
        Self {
            bindings,
            config,
            listeners: Vec::new(),
            connections: Vec::new(),
            poll: PollSet::default(),
            next_connection_id: 1,
        }
    }

    /// Bind every configured address.
    ///
    /// All addresses are attempted even after a failure. On error the
    /// listeners that did come up stay live; see
    /// [`listener_addresses`](Self::listener_addresses).
    pub fn listen(&mut self) -> Result<()> {
        self.close_all();

        let mut failures = Vec::new();
        for binding in &self.bindings {
            match bind_listener(&binding.address, self.config.backlog) {
                Ok(listener) => {
                    info!(
                        address = %local_or_configured(&listener),
                        transport = listener.transport_name(),
                        "listening"
                    );
                    self.listeners.push(ListenerRecord {
                        listener,
                        handler: Arc::clone(&binding.handler),
                    });
                }
                Err(err) => {
                    warn!(address = %binding.address, error = %err, "listener setup failed");
                    failures.push(err);
                }
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(PeerError::ListenFailed {
                total: self.bindings.len(),
                failures,
            })
        }
    }

    /// Run polling cycles and return the number of messages delivered to handlers.
    ///
    /// The first wait blocks for up to `timeout` (`None` blocks until
    /// something is ready); later cycles poll without blocking. Returns when
    /// a cycle finds nothing ready or the per-call message bound is reached.
    pub fn check_messages(&mut self, timeout: Option<Duration>) -> Result<usize> {
        if self.listeners.is_empty() {
            return Err(PeerError::NotListening);
        }

        let limit = self.config.max_messages_per_check.max(1);
        let mut delivered = 0usize;
        let mut wait = timeout;

        while delivered < limit {
            self.poll.clear();
            for record in &self.listeners {
                self.poll.push(record.listener.as_raw_fd());
            }
            for record in &self.connections {
                self.poll.push(record.reader.get_ref().as_raw_fd());
            }

            // Frames already reassembled in a connection's buffer won't show
            // up as socket readiness.
            let buffered = self.buffered_connections();
            let pending = buffered.iter().any(|&b| b);
            if pending {
                wait = Some(Duration::ZERO);
            }

            let ready = match self.poll.wait(wait) {
                Ok(ready) => ready,
                Err(err) => return wait_failed(err, delivered),
            };
            if ready == 0 && !pending {
                break;
            }

            let (messages, progressed) = self.run_cycle(limit - delivered, &buffered);
            delivered += messages;
            if !progressed {
                break;
            }
            wait = Some(Duration::ZERO);
        }

        Ok(delivered)
    }

    /// Handle everything the last wait reported ready, listeners first and
    /// then connections in acceptance order.
    fn run_cycle(&mut self, budget: usize, buffered: &[bool]) -> (usize, bool) {
        let listener_count = self.listeners.len();
        let ready: Vec<usize> = (0..self.poll.len())
            .filter(|&index| {
                self.poll.is_ready(index)
                    || (index >= listener_count && buffered[index - listener_count])
            })
            .collect();
        let mut delivered = 0usize;
        let mut progressed = false;
        let mut closed = Vec::new();

        for index in ready {
            if index < listener_count {
                progressed |= self.accept_from(index);
                continue;
            }

            if delivered >= budget {
                break;
            }
            let record = &mut self.connections[index - listener_count];
            let (messages, teardown) = serve_connection(record, budget - delivered, &self.config);
            delivered += messages;
            progressed |= messages > 0;

            if let Some(teardown) = teardown {
                match teardown {
                    Teardown::PeerClosed => debug!(connection = record.id, "peer closed"),
                    Teardown::Failed(err) => {
                        warn!(connection = record.id, error = %err, "closing connection")
                    }
                }
                closed.push(record.id);
                progressed = true;
            }
        }

        if !closed.is_empty() {
            self.connections.retain(|record| !closed.contains(&record.id));
        }
        (delivered, progressed)
    }

    fn buffered_connections(&mut self) -> Vec<bool> {
        self.connections
            .iter_mut()
            .map(|record| record.reader.has_buffered_message().unwrap_or(true))
            .collect()
    }

    /// Accept one pending connection on listener `index`. Returns true if a
    /// connection was added.
    fn accept_from(&mut self, index: usize) -> bool {
        let record = &self.listeners[index];
        let stream = match record.listener.accept() {
            Ok(stream) => stream,
            Err(TransportError::Accept(err)) if err.kind() == std::io::ErrorKind::WouldBlock => {
                return false;
            }
            Err(err) => {
                warn!(address = %record.listener.address(), error = %err, "accept failed");
                return false;
            }
        };

        let id = self.next_connection_id;
        match open_connection(id, stream, Arc::clone(&record.handler), &self.config.frame) {
            Ok(connection) => {
                self.next_connection_id += 1;
                debug!(
                    connection = id,
                    address = %record.listener.address(),
                    "connection accepted"
                );
                self.connections.push(connection);
                true
            }
            Err(err) => {
                warn!(address = %record.listener.address(), error = %err, "connection setup failed");
                false
            }
        }
    }

    /// Close every listener and connection. The server can `listen` again afterwards.
    pub fn close_all(&mut self) {
        if self.listeners.is_empty() && self.connections.is_empty() {
            return;
        }
        debug!(
            listeners = self.listeners.len(),
            connections = self.connections.len(),
            "closing all sockets"
        );
        self.connections.clear();
        self.listeners.clear();
        self.poll.clear();
    }

    /// Addresses of the live listeners, in configuration order.
    ///
    /// TCP listeners bound to port zero report the port actually assigned.
    pub fn listener_addresses(&self) -> Vec<SocketAddress> {
        self.listeners
            .iter()
            .map(|record| local_or_configured(&record.listener))
            .collect()
    }

    /// Number of live listeners.
    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    /// Number of open connections.
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    pub fn bindings(&self) -> &[Binding] {
        &self.bindings
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }
}

impl Drop for Server {
    fn drop(&mut self) {
        self.close_all();
    }
}

impl std::fmt::Debug for Server {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Server")
            .field("bindings", &self.bindings)
            .field("listeners", &self.listeners.len())
            .field("connections", &self.connections.len())
            .finish()
    }
}

/// A failed wait ends the call. Messages already answered are still reported.
fn wait_failed(err: std::io::Error, delivered: usize) -> Result<usize> {
    if delivered == 0 {
        return Err(PeerError::Wait(err));
    }
    warn!(error = %err, delivered, "readiness wait failed");
    Ok(delivered)
}

fn bind_listener(address: &SocketAddress, backlog: i32) -> std::result::Result<IpcListener, TransportError> {
    let listener = address.bind(backlog)?;
    listener.set_nonblocking(true)?;
    Ok(listener)
}

fn local_or_configured(listener: &IpcListener) -> SocketAddress {
    listener
        .local_address()
        .unwrap_or_else(|_| listener.address().clone())
}

fn open_connection(
    id: u64,
    stream: IpcStream,
    handler: SharedHandler,
    frame: &FrameConfig,
) -> Result<ConnectionRecord> {
    let read_half = stream.try_clone()?;
    let reader = FrameReader::with_config_ipc(read_half, frame.clone())?;
    let writer = FrameWriter::with_config_ipc(stream, frame.clone())?;
    Ok(ConnectionRecord {
        id,
        reader,
        writer,
        handler,
    })
}

/// Read one message from a ready connection, answer it, then answer any
/// further messages that are already complete in its buffer.
fn serve_connection(
    record: &mut ConnectionRecord,
    budget: usize,
    config: &ServerConfig,
) -> (usize, Option<Teardown>) {
    let mut delivered = 0usize;

    loop {
        let request = match record.reader.read_message() {
            Ok(request) => request,
            Err(FrameError::PeerClosed) => return (delivered, Some(Teardown::PeerClosed)),
            Err(err) => return (delivered, Some(Teardown::Failed(err.into()))),
        };
        delivered += 1;

        if config.log_payloads {
            debug!(
                connection = record.id,
                bytes = request.len(),
                payload = %String::from_utf8_lossy(&request),
                "request"
            );
        } else {
            trace!(connection = record.id, bytes = request.len(), "request");
        }

        let response = record.handler.handle(&request);

        match record.writer.send(&response) {
            Ok(written) if config.log_payloads => debug!(
                connection = record.id,
                bytes = written,
                payload = %String::from_utf8_lossy(&response),
                "response"
            ),
            Ok(written) => trace!(connection = record.id, bytes = written, "response"),
            // A partly written frame leaves the peer's stream out of sync.
            Err(err) => return (delivered, Some(Teardown::Failed(err.into()))),
        }

        if delivered >= budget {
            return (delivered, None);
        }
        match record.reader.has_buffered_message() {
            Ok(true) => continue,
            Ok(false) => return (delivered, None),
            Err(err) => return (delivered, Some(Teardown::Failed(err.into()))),
        }
    }
}

use bytes::Bytes;
use msgplex_frame::{FrameConfig, FrameReader, FrameWriter};
use msgplex_transport::{IpcStream, SocketAddress};
use tracing::{debug, trace};

use crate::error::{PeerError, Result};

/// Client behavior configuration.
#[derive(Debug, Clone, Default)]
pub struct ClientConfig {
    /// Frame settings for the connection.
    pub frame: FrameConfig,
    /// Log request and response contents at debug level.
    pub log_payloads: bool,
}

struct Connection {
    reader: FrameReader<IpcStream>,
    writer: FrameWriter<IpcStream>,
}

/// Blocking client with one outstanding request at a time.
pub struct Client {
    address: SocketAddress,
    config: ClientConfig,
    connection: Option<Connection>,
}

impl Client {
    /// Connect with default configuration.
    pub fn connect(address: &SocketAddress) -> Result<Self> {
        Self::connect_with_config(address, ClientConfig::default())
    }

    /// Connect with explicit configuration.
    pub fn connect_with_config(address: &SocketAddress, config: ClientConfig) -> Result<Self> {
        let stream = address.connect()?;
        let read_half = stream.try_clone()?;
        let reader = FrameReader::with_config_ipc(read_half, config.frame.clone())?;
        let writer = FrameWriter::with_config_ipc(stream, config.frame.clone())?;
        debug!(%address, "connected");

        Ok(Self {
            address: address.clone(),
            config,
            connection: Some(Connection { reader, writer }),
        })
    }

    /// Send one message. Returns the wire bytes written, header included.
    pub fn send(&mut self, payload: &[u8]) -> Result<usize> {
        let log_payloads = self.config.log_payloads;
        let connection = self.connection_mut()?;
        let written = connection.writer.send(payload)?;
        if log_payloads {
            debug!(
                bytes = written,
                payload = %String::from_utf8_lossy(payload),
                "sent"
            );
        } else {
            trace!(bytes = written, "sent");
        }
        Ok(written)
    }

    /// Block until one complete message arrives.
    ///
    /// A peer that closes without sending anything yields
    /// [`FrameError::PeerClosed`](msgplex_frame::FrameError::PeerClosed)
    /// wrapped in [`PeerError::Frame`]; see [`PeerError::is_peer_closed`].
    pub fn receive(&mut self) -> Result<Bytes> {
        let log_payloads = self.config.log_payloads;
        let connection = self.connection_mut()?;
        let message = connection.reader.read_message()?;
        if log_payloads {
            debug!(
                bytes = message.len(),
                payload = %String::from_utf8_lossy(&message),
                "received"
            );
        } else {
            trace!(bytes = message.len(), "received");
        }
        Ok(message)
    }

    /// Send `payload` and wait for the response.
    pub fn request(&mut self, payload: &[u8]) -> Result<Bytes> {
        self.send(payload)?;
        self.receive()
    }

    /// Half-close: the server sees end of stream, responses can still be read.
    pub fn shutdown_write(&self) -> Result<()> {
        let connection = self.connection.as_ref().ok_or(PeerError::NotConnected)?;
        connection.writer.get_ref().shutdown_write()?;
        Ok(())
    }

    /// Close the connection. Calling it again does nothing.
    pub fn disconnect(&mut self) {
        if self.connection.take().is_some() {
            debug!(address = %self.address, "disconnected");
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_some()
    }

    /// The address this client connected to.
    pub fn address(&self) -> &SocketAddress {
        &self.address
    }

    fn connection_mut(&mut self) -> Result<&mut Connection> {
        self.connection.as_mut().ok_or(PeerError::NotConnected)
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("address", &self.address.to_string())
            .field("connected", &self.is_connected())
            .finish()
    }
}

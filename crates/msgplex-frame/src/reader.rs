use std::io::{ErrorKind, Read};

use bytes::Bytes;
use msgplex_transport::IpcStream;
use tracing::trace;

use crate::codec::FrameConfig;
use crate::error::{FrameError, Result};
use crate::reassembly::{Reassembly, ReassemblyState};

/// Reads complete messages from any `Read` stream.
///
/// Handles partial reads internally; callers always get complete messages.
pub struct FrameReader<T> {
    inner: T,
    reassembly: Reassembly,
    chunk: Vec<u8>,
    config: FrameConfig,
}

impl<T: Read> FrameReader<T> {
    /// Create a new frame reader with default configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    /// Create a new frame reader with explicit configuration.
    pub fn with_config(inner: T, config: FrameConfig) -> Self {
        Self {
            inner,
            reassembly: Reassembly::with_max_payload(config.max_payload_size),
            chunk: vec![0u8; config.recv_chunk_size.max(1)],
            config,
        }
    }

    /// Read the next complete message (blocking).
    ///
    /// Returns `Err(FrameError::PeerClosed)` when the stream ends between
    /// messages, and `ShortHeader` / `Incomplete` when it ends inside one.
    pub fn read_message(&mut self) -> Result<Bytes> {
        loop {
            if let Some(message) = self.reassembly.next_message()? {
                return Ok(message);
            }

            let read = match self.inner.read(&mut self.chunk) {
                Ok(n) => n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::Receive(err)),
            };

            if read == 0 {
                return Err(self.reassembly.end_of_stream());
            }

            self.reassembly.extend(&self.chunk[..read]);
            if let ReassemblyState::Accumulating { declared_length } = self.reassembly.state() {
                trace!(
                    buffered = self.reassembly.buffered_len(),
                    declared_length,
                    "payload bytes received"
                );
            }
        }
    }

    /// True if a complete message is already buffered and
    /// [`read_message`](Self::read_message) will return without touching the stream.
    pub fn has_buffered_message(&mut self) -> Result<bool> {
        self.reassembly.has_complete_message()
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume the reader and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }

    /// Current frame reader configuration.
    pub fn config(&self) -> &FrameConfig {
        &self.config
    }
}

impl FrameReader<IpcStream> {
    /// Create a frame reader for `IpcStream` and apply read timeout from config.
    pub fn with_config_ipc(inner: IpcStream, config: FrameConfig) -> Result<Self> {
        inner
            .set_read_timeout(config.read_timeout)
            .map_err(transport_to_frame_error)?;
        Ok(Self::with_config(inner, config))
    }
}

fn transport_to_frame_error(err: msgplex_transport::TransportError) -> FrameError {
    match err {
        msgplex_transport::TransportError::Io(io) => FrameError::Receive(io),
        other => FrameError::Receive(std::io::Error::other(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use bytes::{BufMut, BytesMut};

    use super::*;
    use crate::codec::{encode, encode_frame};

    #[test]
    fn read_single_message() {
        let mut reader = FrameReader::new(Cursor::new(encode(b"hello").to_vec()));
        assert_eq!(reader.read_message().unwrap().as_ref(), b"hello");
    }

    #[test]
    fn read_multiple_messages() {
        let mut wire = BytesMut::new();
        encode_frame(b"one", &mut wire);
        encode_frame(b"two", &mut wire);
        encode_frame(b"three", &mut wire);

        let mut reader = FrameReader::new(Cursor::new(wire.to_vec()));

        assert_eq!(reader.read_message().unwrap().as_ref(), b"one");
        assert!(reader.has_buffered_message().unwrap());
        assert_eq!(reader.read_message().unwrap().as_ref(), b"two");
        assert_eq!(reader.read_message().unwrap().as_ref(), b"three");
        assert!(!reader.has_buffered_message().unwrap());
        assert!(reader.read_message().unwrap_err().is_peer_closed());
    }

    #[test]
    fn read_message_larger_than_chunk() {
        let payload = vec![0xAB; 200 * 1024];
        let cfg = FrameConfig {
            recv_chunk_size: 4096,
            ..FrameConfig::default()
        };
        let mut reader = FrameReader::with_config(Cursor::new(encode(&payload).to_vec()), cfg);
        assert_eq!(reader.read_message().unwrap().as_ref(), payload.as_slice());
    }

    #[test]
    fn partial_read_handling() {
        let byte_reader = ByteByByteReader {
            bytes: encode(b"slow").to_vec(),
            pos: 0,
        };
        let mut reader = FrameReader::new(byte_reader);
        assert_eq!(reader.read_message().unwrap().as_ref(), b"slow");
    }

    #[test]
    fn connection_closed_cleanly() {
        let mut reader = FrameReader::new(Cursor::new(Vec::<u8>::new()));
        let err = reader.read_message().unwrap_err();
        assert!(matches!(err, FrameError::PeerClosed));
    }

    #[test]
    fn empty_message_is_not_peer_closed() {
        let mut reader = FrameReader::new(Cursor::new(encode(b"").to_vec()));
        assert!(reader.read_message().unwrap().is_empty());
        assert!(matches!(
            reader.read_message().unwrap_err(),
            FrameError::PeerClosed
        ));
    }

    #[test]
    fn connection_closed_mid_header() {
        let mut reader = FrameReader::new(Cursor::new(vec![0u8; 5]));
        let err = reader.read_message().unwrap_err();
        assert!(matches!(err, FrameError::ShortHeader { received: 5 }));
    }

    #[test]
    fn connection_closed_mid_payload() {
        let mut partial = BytesMut::new();
        partial.put_u64(16);
        partial.put_slice(b"only-part");

        let mut reader = FrameReader::new(Cursor::new(partial.to_vec()));
        let err = reader.read_message().unwrap_err();
        assert!(matches!(
            err,
            FrameError::Incomplete {
                received: 9,
                expected: 16
            }
        ));
    }

    #[test]
    fn oversized_message_in_stream() {
        let mut wire = BytesMut::new();
        wire.put_u64(1024);

        let cfg = FrameConfig {
            max_payload_size: Some(16),
            ..FrameConfig::default()
        };
        let mut reader = FrameReader::with_config(Cursor::new(wire.to_vec()), cfg);
        let err = reader.read_message().unwrap_err();
        assert!(matches!(err, FrameError::PayloadTooLarge { .. }));
    }

    #[derive(Debug)]
    struct ByteByByteReader {
        bytes: Vec<u8>,
        pos: usize,
    }

    impl Read for ByteByByteReader {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if self.pos >= self.bytes.len() || buf.is_empty() {
                return Ok(0);
            }
            buf[0] = self.bytes[self.pos];
            self.pos += 1;
            Ok(1)
        }
    }

    #[test]
    fn roundtrip_over_pipe() {
        let (left, right) = std::os::unix::net::UnixStream::pair().unwrap();
        let mut writer = crate::writer::FrameWriter::new(left);
        let mut reader = FrameReader::new(right);

        writer.send(b"ping").unwrap();
        assert_eq!(reader.read_message().unwrap().as_ref(), b"ping");
    }

    #[test]
    fn concurrent_reader_writer_threads() {
        let (left, right) = std::os::unix::net::UnixStream::pair().unwrap();
        let mut writer = crate::writer::FrameWriter::new(left);
        let mut reader = FrameReader::new(right);

        let reader_thread = std::thread::spawn(move || {
            for expected in 0..64u32 {
                let message = reader.read_message().unwrap();
                assert_eq!(message.as_ref(), format!("msg-{expected}").as_bytes());
            }
        });

        for i in 0..64u32 {
            writer.send(format!("msg-{i}").as_bytes()).unwrap();
        }

        reader_thread.join().unwrap();
    }

    #[test]
    fn read_would_block_propagates_receive_error() {
        let reader = WouldBlockThenData {
            state: 0,
            bytes: encode(b"ok").to_vec(),
            pos: 0,
        };
        let mut framed = FrameReader::new(reader);
        let err = framed.read_message().unwrap_err();
        assert!(matches!(err, FrameError::Receive(e) if e.kind() == ErrorKind::WouldBlock));
    }

    struct WouldBlockThenData {
        state: u8,
        bytes: Vec<u8>,
        pos: usize,
    }

    impl Read for WouldBlockThenData {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if self.state == 0 {
                self.state = 1;
                return Err(std::io::Error::from(ErrorKind::WouldBlock));
            }
            if self.pos >= self.bytes.len() {
                return Ok(0);
            }
            let remaining = self.bytes.len() - self.pos;
            let n = remaining.min(buf.len());
            buf[..n].copy_from_slice(&self.bytes[self.pos..self.pos + n]);
            self.pos += n;
            Ok(n)
        }
    }

    #[test]
    fn interrupted_read_retries() {
        let reader = InterruptedThenData {
            state: 0,
            bytes: encode(b"ok").to_vec(),
            pos: 0,
        };
        let mut framed = FrameReader::new(reader);
        assert_eq!(framed.read_message().unwrap().as_ref(), b"ok");
    }

    struct InterruptedThenData {
        state: u8,
        bytes: Vec<u8>,
        pos: usize,
    }

    impl Read for InterruptedThenData {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if self.state == 0 {
                self.state = 1;
                return Err(std::io::Error::from(ErrorKind::Interrupted));
            }
            if self.pos >= self.bytes.len() {
                return Ok(0);
            }
            let remaining = self.bytes.len() - self.pos;
            let n = remaining.min(buf.len());
            buf[..n].copy_from_slice(&self.bytes[self.pos..self.pos + n]);
            self.pos += n;
            Ok(n)
        }
    }

    #[test]
    fn applies_read_timeout_for_ipc_stream() {
        let dir = std::env::temp_dir().join(format!(
            "msgplex-frame-timeout-reader-{}",
            std::process::id()
        ));
        let sock_path = dir.join("test.sock");
        let listener = msgplex_transport::UnixDomainSocket::bind(&sock_path).unwrap();

        let path_clone = sock_path.clone();
        let connector = std::thread::spawn(move || {
            msgplex_transport::UnixDomainSocket::connect(path_clone).unwrap()
        });
        let stream = listener.accept().unwrap();
        let _client = connector.join().unwrap();

        let cfg = FrameConfig {
            read_timeout: Some(std::time::Duration::from_millis(10)),
            ..FrameConfig::default()
        };

        let mut reader = FrameReader::with_config_ipc(stream, cfg).unwrap();
        let err = reader.read_message().unwrap_err();
        assert!(matches!(
            err,
            FrameError::Receive(e)
                if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut)
        ));
        drop(listener);
        let _ = std::fs::remove_dir_all(&dir);
    }
}

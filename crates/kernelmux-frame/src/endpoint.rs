use std::io::{ErrorKind, Read, Write};

use bytes::{Buf, Bytes, BytesMut};
use kernelmux_transport::{Connection, Listener};
use mio::event::Source;
use mio::{Interest, Registry, Token};
use tracing::trace;

use crate::codec::{decode_frame, encode_frame, FrameConfig};
use crate::error::{FrameError, Result};

const INITIAL_BUFFER_CAPACITY: usize = 8 * 1024;
const READ_CHUNK_SIZE: usize = 8 * 1024;

/// Result of a non-blocking frame receive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecvOutcome {
    /// A whole frame arrived.
    Frame { data: Bytes, more: bool },
    /// Nothing more can be read right now.
    WouldBlock,
}

/// Result of a non-blocking frame send or flush.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    /// The frame was accepted (or the output fully drained).
    Sent,
    /// The endpoint cannot take more data right now; nothing was consumed.
    WouldBlock,
}

/// A bound endpoint that moves whole frames without ever blocking.
///
/// Would-block is an outcome, not an error: implementations return `Err`
/// only for failures that should end the endpoint.
pub trait FrameEndpoint {
    /// Receive the next frame if one is available.
    fn recv_frame(&mut self) -> Result<RecvOutcome>;

    /// Offer one frame for transmission. `more` is set on every frame of a
    /// message except the last.
    fn send_frame(&mut self, frame: &Bytes, more: bool) -> Result<SendOutcome>;

    /// Push any internally buffered output to the peer.
    fn flush(&mut self) -> Result<SendOutcome> {
        Ok(SendOutcome::Sent)
    }
}

/// A [`FrameEndpoint`] over a non-blocking byte stream.
///
/// Inbound bytes are buffered until a whole frame can be decoded. Outbound
/// frames are encoded into a write buffer that is drained opportunistically;
/// once the buffer holds `send_high_water_mark` bytes or more, further
/// frames are refused with [`SendOutcome::WouldBlock`] until the peer
/// catches up.
pub struct StreamEndpoint<S> {
    inner: S,
    read_buf: BytesMut,
    write_buf: BytesMut,
    config: FrameConfig,
}

/// Framed endpoint over an accepted transport connection.
pub type ConnectionEndpoint = StreamEndpoint<Connection>;

impl<S: Read + Write> StreamEndpoint<S> {
    /// Create a new endpoint with default configuration.
    pub fn new(inner: S) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    /// Create a new endpoint with explicit configuration.
    pub fn with_config(inner: S, config: FrameConfig) -> Self {
        Self {
            inner,
            read_buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            write_buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            config,
        }
    }

    /// Outbound bytes accepted but not yet written to the stream.
    pub fn pending_output(&self) -> usize {
        self.write_buf.len()
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &S {
        &self.inner
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut S {
        &mut self.inner
    }

    /// Consume the endpoint and return the inner stream.
    ///
    /// Buffered but unsent output is dropped.
    pub fn into_inner(self) -> S {
        self.inner
    }

    /// Current endpoint configuration.
    pub fn config(&self) -> &FrameConfig {
        &self.config
    }

    fn drain_write_buf(&mut self) -> Result<SendOutcome> {
        while !self.write_buf.is_empty() {
            match self.inner.write(&self.write_buf) {
                Ok(0) => return Err(FrameError::ConnectionClosed),
                Ok(n) => self.write_buf.advance(n),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if err.kind() == ErrorKind::WouldBlock => {
                    return Ok(SendOutcome::WouldBlock)
                }
                Err(err) => return Err(FrameError::Io(err)),
            }
        }
        loop {
            match self.inner.flush() {
                Ok(()) => return Ok(SendOutcome::Sent),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if err.kind() == ErrorKind::WouldBlock => {
                    return Ok(SendOutcome::WouldBlock)
                }
                Err(err) => return Err(FrameError::Io(err)),
            }
        }
    }
}

impl StreamEndpoint<Connection> {
    /// Accept the next peer on `listener` and frame it with `config`.
    pub fn accept(listener: &Listener, config: FrameConfig) -> Result<Self> {
        let conn = listener.accept()?;
        Ok(Self::with_config(conn, config))
    }
}

impl<S: Read + Write> FrameEndpoint for StreamEndpoint<S> {
    fn recv_frame(&mut self) -> Result<RecvOutcome> {
        loop {
            if let Some(frame) = decode_frame(&mut self.read_buf, self.config.max_payload_size)? {
                trace!(size = frame.payload.len(), more = frame.more, "frame received");
                return Ok(RecvOutcome::Frame {
                    data: frame.payload,
                    more: frame.more,
                });
            }

            let mut chunk = [0u8; READ_CHUNK_SIZE];
            let read = match self.inner.read(&mut chunk) {
                Ok(n) => n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if err.kind() == ErrorKind::WouldBlock => {
                    return Ok(RecvOutcome::WouldBlock)
                }
                Err(err) => return Err(FrameError::Io(err)),
            };

            if read == 0 {
                return Err(FrameError::ConnectionClosed);
            }

            self.read_buf.extend_from_slice(&chunk[..read]);
        }
    }

    fn send_frame(&mut self, frame: &Bytes, more: bool) -> Result<SendOutcome> {
        if frame.len() > self.config.max_payload_size {
            return Err(FrameError::PayloadTooLarge {
                size: frame.len(),
                max: self.config.max_payload_size,
            });
        }

        if self.write_buf.len() >= self.config.send_high_water_mark {
            self.drain_write_buf()?;
            if self.write_buf.len() >= self.config.send_high_water_mark {
                return Ok(SendOutcome::WouldBlock);
            }
        }

        encode_frame(frame.as_ref(), more, &mut self.write_buf)?;
        trace!(size = frame.len(), more, "frame accepted");

        // The frame is ours now; a short write only leaves bytes buffered.
        self.drain_write_buf()?;
        Ok(SendOutcome::Sent)
    }

    fn flush(&mut self) -> Result<SendOutcome> {
        self.drain_write_buf()
    }
}

impl<S: Source> Source for StreamEndpoint<S> {
    fn register(
        &mut self,
        registry: &Registry,
        token: Token,
        interests: Interest,
    ) -> std::io::Result<()> {
        self.inner.register(registry, token, interests)
    }

    fn reregister(
        &mut self,
        registry: &Registry,
        token: Token,
        interests: Interest,
    ) -> std::io::Result<()> {
        self.inner.reregister(registry, token, interests)
    }

    fn deregister(&mut self, registry: &Registry) -> std::io::Result<()> {
        self.inner.deregister(registry)
    }
}

impl<S> std::fmt::Debug for StreamEndpoint<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamEndpoint")
            .field("buffered_in", &self.read_buf.len())
            .field("buffered_out", &self.write_buf.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::io::Cursor;

    use super::*;
    use crate::codec::{WireFrame, DEFAULT_MAX_PAYLOAD, HEADER_SIZE};

    fn wire(frames: &[(&[u8], bool)]) -> Vec<u8> {
        let mut buf = BytesMut::new();
        for (payload, more) in frames {
            encode_frame(payload, *more, &mut buf).unwrap();
        }
        buf.to_vec()
    }

    fn decode_all(bytes: &[u8]) -> Vec<WireFrame> {
        let mut buf = BytesMut::from(bytes);
        let mut out = Vec::new();
        while let Some(frame) = decode_frame(&mut buf, DEFAULT_MAX_PAYLOAD).unwrap() {
            out.push(frame);
        }
        assert!(buf.is_empty(), "trailing bytes after last frame");
        out
    }

    /// Stream whose reads replay scripted chunks and whose writes accept at
    /// most `write_budget` bytes before reporting would-block.
    #[derive(Default)]
    struct ScriptedStream {
        reads: VecDeque<std::io::Result<Vec<u8>>>,
        written: Vec<u8>,
        write_budget: usize,
    }

    impl Read for ScriptedStream {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            match self.reads.pop_front() {
                None => Err(ErrorKind::WouldBlock.into()),
                Some(Err(err)) => Err(err),
                Some(Ok(mut chunk)) => {
                    let n = chunk.len().min(buf.len());
                    buf[..n].copy_from_slice(&chunk[..n]);
                    if n < chunk.len() {
                        self.reads.push_front(Ok(chunk.split_off(n)));
                    }
                    Ok(n)
                }
            }
        }
    }

    impl Write for ScriptedStream {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            if self.write_budget == 0 {
                return Err(ErrorKind::WouldBlock.into());
            }
            let n = buf.len().min(self.write_budget);
            self.written.extend_from_slice(&buf[..n]);
            self.write_budget -= n;
            Ok(n)
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn recv_returns_frames_then_would_block() {
        let stream = ScriptedStream {
            reads: VecDeque::from([Ok(wire(&[(b"a", true), (b"b", false)]))]),
            ..ScriptedStream::default()
        };
        let mut endpoint = StreamEndpoint::new(stream);

        assert_eq!(
            endpoint.recv_frame().unwrap(),
            RecvOutcome::Frame {
                data: Bytes::from_static(b"a"),
                more: true
            }
        );
        assert_eq!(
            endpoint.recv_frame().unwrap(),
            RecvOutcome::Frame {
                data: Bytes::from_static(b"b"),
                more: false
            }
        );
        assert_eq!(endpoint.recv_frame().unwrap(), RecvOutcome::WouldBlock);
    }

    #[test]
    fn recv_keeps_partial_frame_across_would_block() {
        let bytes = wire(&[(b"split-payload", false)]);
        let (first, second) = bytes.split_at(HEADER_SIZE + 3);
        let stream = ScriptedStream {
            reads: VecDeque::from([
                Ok(first.to_vec()),
                Err(ErrorKind::WouldBlock.into()),
                Ok(second.to_vec()),
            ]),
            ..ScriptedStream::default()
        };
        let mut endpoint = StreamEndpoint::new(stream);

        assert_eq!(endpoint.recv_frame().unwrap(), RecvOutcome::WouldBlock);
        assert_eq!(
            endpoint.recv_frame().unwrap(),
            RecvOutcome::Frame {
                data: Bytes::from_static(b"split-payload"),
                more: false
            }
        );
    }

    #[test]
    fn recv_retries_interrupted_reads() {
        let stream = ScriptedStream {
            reads: VecDeque::from([
                Err(ErrorKind::Interrupted.into()),
                Ok(wire(&[(b"ok", false)])),
            ]),
            ..ScriptedStream::default()
        };
        let mut endpoint = StreamEndpoint::new(stream);
        assert!(matches!(
            endpoint.recv_frame().unwrap(),
            RecvOutcome::Frame { more: false, .. }
        ));
    }

    #[test]
    fn recv_eof_is_connection_closed() {
        let mut endpoint = StreamEndpoint::new(Cursor::new(Vec::<u8>::new()));
        let err = endpoint.recv_frame().unwrap_err();
        assert!(matches!(err, FrameError::ConnectionClosed));
    }

    #[test]
    fn recv_surfaces_other_io_errors() {
        let stream = ScriptedStream {
            reads: VecDeque::from([Err(ErrorKind::ConnectionReset.into())]),
            ..ScriptedStream::default()
        };
        let mut endpoint = StreamEndpoint::new(stream);
        let err = endpoint.recv_frame().unwrap_err();
        assert!(matches!(err, FrameError::Io(e) if e.kind() == ErrorKind::ConnectionReset));
    }

    #[test]
    fn recv_rejects_bad_magic() {
        let mut bad = vec![0u8; HEADER_SIZE];
        bad[..2].copy_from_slice(b"XX");
        let stream = ScriptedStream {
            reads: VecDeque::from([Ok(bad)]),
            ..ScriptedStream::default()
        };
        let mut endpoint = StreamEndpoint::new(stream);
        assert!(matches!(
            endpoint.recv_frame().unwrap_err(),
            FrameError::InvalidMagic
        ));
    }

    #[test]
    fn send_encodes_more_flags() {
        let stream = ScriptedStream {
            write_budget: usize::MAX,
            ..ScriptedStream::default()
        };
        let mut endpoint = StreamEndpoint::new(stream);

        let head = Bytes::from_static(b"head");
        let tail = Bytes::from_static(b"tail");
        assert_eq!(endpoint.send_frame(&head, true).unwrap(), SendOutcome::Sent);
        assert_eq!(endpoint.send_frame(&tail, false).unwrap(), SendOutcome::Sent);
        assert_eq!(endpoint.pending_output(), 0);

        let frames = decode_all(&endpoint.get_ref().written);
        assert_eq!(frames.len(), 2);
        assert!(frames[0].more);
        assert!(!frames[1].more);
    }

    #[test]
    fn send_buffers_short_writes_and_flush_reports_progress() {
        let stream = ScriptedStream {
            write_budget: 5,
            ..ScriptedStream::default()
        };
        let mut endpoint = StreamEndpoint::new(stream);

        let frame = Bytes::from_static(b"0123456789");
        assert_eq!(endpoint.send_frame(&frame, false).unwrap(), SendOutcome::Sent);
        assert_eq!(endpoint.pending_output(), HEADER_SIZE + 10 - 5);
        assert_eq!(endpoint.flush().unwrap(), SendOutcome::WouldBlock);

        endpoint.get_mut().write_budget = usize::MAX;
        assert_eq!(endpoint.flush().unwrap(), SendOutcome::Sent);
        assert_eq!(endpoint.pending_output(), 0);

        let frames = decode_all(&endpoint.get_ref().written);
        assert_eq!(frames[0].payload.as_ref(), b"0123456789");
    }

    #[test]
    fn send_refuses_frames_above_high_water_mark() {
        let stream = ScriptedStream::default();
        let cfg = FrameConfig {
            send_high_water_mark: 16,
            ..FrameConfig::default()
        };
        let mut endpoint = StreamEndpoint::with_config(stream, cfg);

        let frame = Bytes::from_static(b"twelve bytes");
        assert_eq!(endpoint.send_frame(&frame, true).unwrap(), SendOutcome::Sent);
        assert_eq!(endpoint.pending_output(), HEADER_SIZE + 12);

        // Over the mark and the stream is still full: nothing is consumed.
        assert_eq!(
            endpoint.send_frame(&frame, false).unwrap(),
            SendOutcome::WouldBlock
        );
        assert_eq!(endpoint.pending_output(), HEADER_SIZE + 12);

        endpoint.get_mut().write_budget = usize::MAX;
        assert_eq!(endpoint.send_frame(&frame, false).unwrap(), SendOutcome::Sent);
        let frames = decode_all(&endpoint.get_ref().written);
        assert_eq!(frames.len(), 2);
        assert!(frames[0].more);
        assert!(!frames[1].more);
    }

    #[test]
    fn send_rejects_oversized_payload() {
        let cfg = FrameConfig {
            max_payload_size: 4,
            ..FrameConfig::default()
        };
        let mut endpoint = StreamEndpoint::with_config(ScriptedStream::default(), cfg);
        let err = endpoint
            .send_frame(&Bytes::from_static(b"oversized"), false)
            .unwrap_err();
        assert!(matches!(err, FrameError::PayloadTooLarge { .. }));
    }

    #[test]
    fn zero_length_write_is_connection_closed() {
        struct ZeroWriter;

        impl Read for ZeroWriter {
            fn read(&mut self, _buf: &mut [u8]) -> std::io::Result<usize> {
                Err(ErrorKind::WouldBlock.into())
            }
        }

        impl Write for ZeroWriter {
            fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
                Ok(0)
            }

            fn flush(&mut self) -> std::io::Result<()> {
                Ok(())
            }
        }

        let mut endpoint = StreamEndpoint::new(ZeroWriter);
        let err = endpoint
            .send_frame(&Bytes::from_static(b"x"), false)
            .unwrap_err();
        assert!(matches!(err, FrameError::ConnectionClosed));
    }

    #[test]
    #[cfg(unix)]
    fn frames_cross_a_socket_pair() {
        let (left, right) = std::os::unix::net::UnixStream::pair().unwrap();
        left.set_nonblocking(true).unwrap();
        right.set_nonblocking(true).unwrap();
        let mut tx = StreamEndpoint::new(left);
        let mut rx = StreamEndpoint::new(right);

        assert_eq!(
            tx.send_frame(&Bytes::from_static(b"ping"), false).unwrap(),
            SendOutcome::Sent
        );

        let deadline = std::time::Instant::now() + std::time::Duration::from_secs(5);
        loop {
            match rx.recv_frame().unwrap() {
                RecvOutcome::Frame { data, more } => {
                    assert_eq!(data.as_ref(), b"ping");
                    assert!(!more);
                    break;
                }
                RecvOutcome::WouldBlock => {
                    assert!(std::time::Instant::now() < deadline, "frame never arrived");
                    std::thread::sleep(std::time::Duration::from_millis(1));
                }
            }
        }
    }
}

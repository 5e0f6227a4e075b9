use std::io;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr, UdpSocket};
use std::time::Instant;

use tracing::warn;

use crate::sink::{StatsdSink, DEFAULT_CACHE_SIZE};
use crate::TagGroup;

mod formatter;
pub use formatter::{EventFormatter, MetricFormatter};

/// Client for the DogStatsD flavor of the statsd protocol.
///
/// Metric names are prefixed with the client namespace; events are not.
/// Datagrams batch in the sink buffer until it would overflow, `flush()`
/// is called, or the socket is closed. IO never fails the caller: errors
/// are logged at most once per 64s window and the datagram dropped.
pub struct DogstatsdClient {
    namespace: String,
    sink: StatsdSink,
    tags: TagGroup,

    create_instant: Instant,
    last_error_report: u64,
}

impl DogstatsdClient {
    fn new(namespace: String, sink: StatsdSink) -> Self {
        DogstatsdClient {
            namespace,
            sink,
            tags: Default::default(),
            create_instant: Instant::now(),
            last_error_report: 0,
        }
    }

    /// Create a client shipping datagrams to a UDP statsd endpoint.
    ///
    /// Binds an ephemeral local port in the address family of the target.
    pub fn udp(addr: SocketAddr, namespace: impl Into<String>) -> io::Result<Self> {
        let bind_ip = match addr {
            SocketAddr::V4(_) => IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            SocketAddr::V6(_) => IpAddr::V6(Ipv6Addr::UNSPECIFIED),
        };
        let socket = UdpSocket::bind(SocketAddr::new(bind_ip, 0))?;
        Ok(Self::new(
            namespace.into(),
            StatsdSink::udp_with_capacity(addr, socket, DEFAULT_CACHE_SIZE),
        ))
    }

    #[cfg(test)]
    fn buf(
        buf: std::sync::Arc<std::sync::Mutex<Vec<u8>>>,
        cache_size: usize,
        namespace: impl Into<String>,
    ) -> Self {
        Self::new(
            namespace.into(),
            StatsdSink::buf_with_capacity(buf, cache_size),
        )
    }

    /// Add a client-level tag, applied to every datagram
    pub fn with_tag<T: AsRef<str>>(mut self, key: &str, value: T) -> Self {
        self.tags.add_tag(key, value);
        self
    }

    /// Flush buffered datagrams to the wire
    pub fn flush(&mut self) {
        if let Err(e) = self.sink.flush() {
            self.handle_emit_error(e);
        }
    }

    /// Flush buffered datagrams and release the socket.
    ///
    /// Datagrams emitted afterwards are dropped with a warning.
    pub fn close_socket(&mut self) {
        if let Err(e) = self.sink.close() {
            self.handle_emit_error(e);
        }
    }

    pub(crate) fn emit(&mut self, msg: &[u8]) {
        if let Err(e) = self.sink.emit(msg) {
            self.handle_emit_error(e);
        }
    }

    fn handle_emit_error(&mut self, e: io::Error) {
        let time_slice = self.create_instant.elapsed().as_secs().rotate_right(6); // every 64s
        if self.last_error_report != time_slice {
            warn!("sending metrics error: {e:?}");
            self.last_error_report = time_slice;
        }
    }
}

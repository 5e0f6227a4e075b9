use std::io;
use std::net::{SocketAddr, UdpSocket};
#[cfg(test)]
use std::sync::{Arc, Mutex};

#[cfg(test)]
mod buf;
#[cfg(test)]
use buf::BufMetricsSink;

mod udp;
use udp::UdpMetricsSink;

/// Default datagram buffer size, sized for a single ethernet MTU payload
pub(crate) const DEFAULT_CACHE_SIZE: usize = 1432;

enum MetricsSinkIo {
    #[cfg(test)]
    Buf(BufMetricsSink),
    Udp(UdpMetricsSink),
    Closed,
}

impl MetricsSinkIo {
    fn send_msg(&self, buf: &[u8]) -> io::Result<usize> {
        match self {
            #[cfg(test)]
            MetricsSinkIo::Buf(b) => b.send_msg(buf),
            MetricsSinkIo::Udp(s) => s.send_msg(buf),
            MetricsSinkIo::Closed => Err(closed_error()),
        }
    }
}

fn closed_error() -> io::Error {
    io::Error::new(io::ErrorKind::NotConnected, "statsd sink is closed")
}

pub(crate) struct StatsdSink {
    cache_size: usize,
    buf: Vec<u8>,
    io: MetricsSinkIo,
}

impl StatsdSink {
    #[cfg(test)]
    pub(crate) fn buf_with_capacity(buf: Arc<Mutex<Vec<u8>>>, cache_size: usize) -> Self {
        StatsdSink {
            cache_size,
            buf: Vec::with_capacity(cache_size),
            io: MetricsSinkIo::Buf(BufMetricsSink::new(buf)),
        }
    }

    pub(crate) fn udp_with_capacity(
        addr: SocketAddr,
        socket: UdpSocket,
        cache_size: usize,
    ) -> Self {
        StatsdSink {
            cache_size,
            buf: Vec::with_capacity(cache_size),
            io: MetricsSinkIo::Udp(UdpMetricsSink::new(addr, socket)),
        }
    }

    /// Queue one datagram, flushing first if appending it would overflow
    /// the buffer. Datagrams in the buffer are separated by newlines.
    pub(crate) fn emit(&mut self, msg: &[u8]) -> io::Result<()> {
        if matches!(self.io, MetricsSinkIo::Closed) {
            return Err(closed_error());
        }
        if self.buf.is_empty() {
            self.buf.extend_from_slice(msg);
        } else if self.buf.len() + 1 + msg.len() > self.cache_size {
            self.flush_buf()?;
            self.buf.extend_from_slice(msg);
        } else {
            self.buf.push(b'\n');
            self.buf.extend_from_slice(msg);
        }
        Ok(())
    }

    pub(crate) fn flush(&mut self) -> io::Result<()> {
        if self.buf.is_empty() {
            return Ok(());
        }
        self.flush_buf()
    }

    /// Flush anything buffered, then stop accepting datagrams
    pub(crate) fn close(&mut self) -> io::Result<()> {
        let result = self.flush();
        self.io = MetricsSinkIo::Closed;
        result
    }

    fn flush_buf(&mut self) -> io::Result<()> {
        self.io.send_msg(&self.buf)?;
        self.buf.clear();
        Ok(())
    }
}

//! statsd over UDP.
//!
//! Lines from the core encoder are packed newline-separated into datagrams
//! no larger than `max_packet_bytes`. A single line over the budget is sent
//! on its own.

use std::net::{SocketAddr, UdpSocket};

use bytes::{BufMut, Bytes, BytesMut};
use meterline_core::error::{MeterError, Result};
use meterline_core::wire::statsd::{self, StatsdFormat};

use super::MetricSink;
use crate::config::StatsdSinkConfig;
use crate::cycle::ReportBatch;

pub struct StatsdSink {
    socket: UdpSocket,
    target: SocketAddr,
    format: StatsdFormat,
    max_packet_bytes: usize,
}

impl StatsdSink {
    /// Resolves and connects immediately; a bad host or port fails here.
    pub fn new(cfg: &StatsdSinkConfig) -> Result<Self> {
        let target = cfg.resolve()?;
        let bind: SocketAddr = if target.is_ipv4() {
            SocketAddr::from(([0, 0, 0, 0], 0))
        } else {
            SocketAddr::from(([0u16; 8], 0))
        };
        let socket = UdpSocket::bind(bind)?;
        socket
            .connect(target)
            .map_err(|e| MeterError::Config(format!("statsd connect {target} failed: {e}")))?;

        Ok(Self {
            socket,
            target,
            format: StatsdFormat {
                prefix: cfg.prefix.clone().filter(|p| !p.is_empty()),
                max_name_bytes: cfg.max_name_bytes,
                include_tags: cfg.include_tags,
            },
            max_packet_bytes: cfg.max_packet_bytes,
        })
    }

    pub fn target(&self) -> SocketAddr {
        self.target
    }
}

impl MetricSink for StatsdSink {
    fn name(&self) -> &str {
        "statsd"
    }

    fn report(&self, batch: &ReportBatch) -> Result<()> {
        let lines = statsd::encode_lines(&batch.stats, &self.format);
        let datagrams = pack_datagrams(&lines, self.max_packet_bytes);

        let mut first_err = None;
        let mut failed = 0usize;
        for d in &datagrams {
            if let Err(e) = self.socket.send(d) {
                failed += 1;
                if first_err.is_none() {
                    first_err = Some(e);
                }
            }
        }
        match first_err {
            None => Ok(()),
            Some(e) => {
                tracing::debug!(target_addr = %self.target, failed, total = datagrams.len(), "statsd send errors");
                Err(e.into())
            }
        }
    }
}

/// Pack lines into newline-separated payloads of at most `max_bytes`.
pub fn pack_datagrams(lines: &[String], max_bytes: usize) -> Vec<Bytes> {
    let mut out = Vec::new();
    let mut buf = BytesMut::with_capacity(max_bytes);

    for line in lines {
        let needed = if buf.is_empty() { line.len() } else { line.len() + 1 };
        if !buf.is_empty() && buf.len() + needed > max_bytes {
            out.push(buf.split().freeze());
        }
        if line.len() > max_bytes {
            tracing::warn!(bytes = line.len(), max_bytes, "statsd line exceeds packet budget");
        }
        if !buf.is_empty() {
            buf.put_u8(b'\n');
        }
        buf.put_slice(line.as_bytes());
    }
    if !buf.is_empty() {
        out.push(buf.freeze());
    }
    out
}

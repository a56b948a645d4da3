use std::io::ErrorKind;
use std::net::{IpAddr, SocketAddr};

use rand::Rng;
use tokio::net::TcpListener;
use tracing::{debug, info};

use crate::error::{Result, TransportError};

/// Ports a session may listen on: `start..start + len`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortRange {
    pub start: u16,
    pub len: u16,
}

impl Default for PortRange {
    fn default() -> Self {
        Self {
            start: 36678,
            len: 16384,
        }
    }
}

impl PortRange {
    /// Pick a port uniformly from the range.
    pub fn pick<R: Rng + ?Sized>(&self, rng: &mut R) -> u16 {
        self.start.saturating_add(rng.gen_range(0..self.len.max(1)))
    }
}

/// Bind a TCP listener on a random port of `range`, retrying on ports that
/// are already in use.
///
/// Any error other than "address in use" fails immediately.
pub async fn bind_with_retry(host: IpAddr, range: PortRange, attempts: u32) -> Result<TcpListener> {
    for attempt in 1..=attempts {
        let port = range.pick(&mut rand::thread_rng());
        let addr = SocketAddr::new(host, port);
        match TcpListener::bind(addr).await {
            Ok(listener) => {
                info!(%addr, attempt, "listening");
                return Ok(listener);
            }
            Err(err) if err.kind() == ErrorKind::AddrInUse => {
                debug!(%addr, attempt, "port in use, retrying");
            }
            Err(source) => return Err(TransportError::Bind { addr, source }),
        }
    }
    Err(TransportError::PortsExhausted { attempts })
}

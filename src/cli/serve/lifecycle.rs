//! Server lifecycle management.

use crate::log;
use anyhow::{Result, anyhow};
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;
use tiny_http::Server;
use tokio::runtime::Runtime;

/// Maximum number of port binding attempts.
const MAX_PORT_RETRIES: u16 = 10;

/// How long shutdown waits for the watcher and a running rebuild.
pub const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(2);

/// Bind to the specified interface and port, with automatic port retry.
///
/// Port 0 lets the OS pick a free port; the returned address carries the
/// port actually bound.
pub fn bind_with_retry(interface: IpAddr, base_port: u16) -> Result<(Server, SocketAddr)> {
    let attempts = if base_port == 0 { 1 } else { MAX_PORT_RETRIES };
    let mut last_error = None;

    for offset in 0..attempts {
        let port = base_port.saturating_add(offset);
        let addr = SocketAddr::new(interface, port);

        match Server::http(addr) {
            Ok(server) => {
                if offset > 0 {
                    log!("serve"; "port {} in use, using {} instead", base_port, port);
                }
                let bound = server.server_addr().to_ip().unwrap_or(addr);
                return Ok((server, bound));
            }
            Err(err) => last_error = Some(err),
        }
    }

    Err(anyhow!(
        "failed to bind after {} attempts (ports {}-{}): {}",
        attempts,
        base_port,
        base_port.saturating_add(attempts - 1),
        last_error.map(|err| err.to_string()).unwrap_or_default()
    ))
}

/// Runtime for the watcher, the coordinator and the outcome applier.
pub fn build_runtime() -> Result<Runtime> {
    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .thread_name("kiln-live")
        .enable_all()
        .build()
        .map_err(|err| anyhow!("failed to create tokio runtime: {err}"))
}

/// Stop the runtime, giving running tasks at most [`SHUTDOWN_TIMEOUT`].
///
/// A rebuild stuck in a render keeps its blocking thread; it is abandoned.
pub fn stop_runtime(runtime: Runtime) {
    runtime.shutdown_timeout(SHUTDOWN_TIMEOUT);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    #[test]
    fn test_bind_retries_next_port() {
        let localhost = IpAddr::V4(Ipv4Addr::LOCALHOST);
        let (_first, addr) = bind_with_retry(localhost, 0).unwrap();
        assert_ne!(addr.port(), 0);

        // The taken port forces a retry onto a later one.
        let (_second, next) = bind_with_retry(localhost, addr.port()).unwrap();
        assert!(next.port() > addr.port());
    }
}

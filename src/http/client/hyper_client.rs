//! Hyper HTTP client used for loopback liveness probes.
//!
//! Probes only ever target the service's own bind port over plain HTTP, so
//! the connector carries no TLS. The pool is kept small: one probe is in
//! flight at a time, the idle connection merely avoids a reconnect per tick.

use http_body_util::Empty;
use hyper::body::Bytes;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use std::time::Duration;

pub const MAX_IDLE_CONN_DURATION: Duration = Duration::from_secs(30);
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(3);
pub const TCP_KEEPALIVE: Duration = Duration::from_secs(30);

pub type HyperClient = Client<HttpConnector, Empty<Bytes>>;

/// Creates the probe client with nodelay and a bounded connect timeout.
///
/// The connect timeout is a floor guard only; the per-probe deadline is
/// enforced by the caller around the whole request.
pub fn create_client() -> HyperClient {
    let mut http_connector = HttpConnector::new();
    http_connector.set_nodelay(true);
    http_connector.set_keepalive(Some(TCP_KEEPALIVE));
    http_connector.set_connect_timeout(Some(CONNECT_TIMEOUT));

    Client::builder(TokioExecutor::new())
        .pool_idle_timeout(MAX_IDLE_CONN_DURATION)
        .pool_max_idle_per_host(1)
        .build(http_connector)
}

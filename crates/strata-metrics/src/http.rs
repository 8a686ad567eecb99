//! HTTP metrics backend for the storage cluster API.
//!
//! Queries `GET http://{addr}/v1/tiers/{tier}/nodes` and expects a JSON
//! body shaped like [`TierReadings`]. Connection handling follows the
//! plain http1 handshake pattern: one connection per query, driven by a
//! background task.

use http_body_util::BodyExt;
use tracing::debug;

use crate::source::{MetricsBackend, TierReadings};

type BoxFuture<'a, T> =
    std::pin::Pin<Box<dyn std::future::Future<Output = T> + Send + 'a>>;

/// Backend that queries the cluster's HTTP metrics API.
pub struct HttpBackend {
    /// Authority of the cluster API, e.g. "10.0.0.5:9600".
    address: String,
}

impl HttpBackend {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
        }
    }
}

impl MetricsBackend for HttpBackend {
    fn query_tier<'a>(&'a self, tier: &'a str) -> BoxFuture<'a, anyhow::Result<TierReadings>> {
        Box::pin(fetch_tier(&self.address, tier))
    }
}

async fn fetch_tier(address: &str, tier: &str) -> anyhow::Result<TierReadings> {
    let uri = format!("http://{address}/v1/tiers/{tier}/nodes");

    let stream = tokio::net::TcpStream::connect(address).await?;
    let io = hyper_util::rt::TokioIo::new(stream);
    let (mut sender, conn) = hyper::client::conn::http1::handshake(io).await?;

    // Drive the connection in the background.
    tokio::spawn(async move {
        let _ = conn.await;
    });

    let req = http::Request::builder()
        .method("GET")
        .uri(&uri)
        .header("host", address)
        .header("accept", "application/json")
        .header("user-agent", "strata-metrics/0.1")
        .body(http_body_util::Empty::<bytes::Bytes>::new())?;

    let resp = sender.send_request(req).await?;
    if !resp.status().is_success() {
        anyhow::bail!("cluster API returned {} for {uri}", resp.status());
    }

    let body = resp.into_body().collect().await?.to_bytes();
    let readings: TierReadings = serde_json::from_slice(&body)?;
    debug!(
        tier,
        nodes = readings.nodes.len(),
        unreachable = readings.unreachable.len(),
        "tier readings fetched"
    );
    Ok(readings)
}

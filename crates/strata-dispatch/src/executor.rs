//! Executor capability — the typed interface to the external job runner.
//!
//! The control loop never shells out or speaks a transport directly; it
//! hands an [`ExecutorRequest`] to an injected [`Executor`] and gets a
//! correlation id back. [`HttpExecutor`] is the standard transport;
//! [`NoopExecutor`] backs dry runs and tests.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

use http_body_util::BodyExt;
use serde::{Deserialize, Serialize};
use tracing::debug;

use strata_core::{NodeName, OperationKind, TierName};

type BoxFuture<'a, T> =
    std::pin::Pin<Box<dyn std::future::Future<Output = T> + Send + 'a>>;

/// A provision/decommission request as handed to the job runner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutorRequest {
    pub kind: OperationKind,
    pub tier: TierName,
    /// Node names in submission order.
    pub target_nodes: Vec<NodeName>,
    /// Free-form string parameters; provision requests carry
    /// `zone.<node>` entries naming each node's target zone.
    #[serde(default)]
    pub parameters: BTreeMap<String, String>,
}

/// Executor-side view of a running operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutorStatus {
    Running,
    Succeeded,
    Failed,
}

/// Capability for submitting operations to the external job runner and
/// checking on them later.
pub trait Executor: Send + Sync {
    /// Submit a request. Returns the runner's correlation id.
    fn submit<'a>(&'a self, req: &'a ExecutorRequest) -> BoxFuture<'a, anyhow::Result<String>>;

    /// Check the status of a previously submitted operation.
    fn check<'a>(&'a self, correlation_id: &'a str) -> BoxFuture<'a, anyhow::Result<ExecutorStatus>>;
}

// ── HTTP executor ─────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct SubmitResponse {
    id: String,
}

#[derive(Debug, Deserialize)]
struct StatusResponse {
    status: ExecutorStatus,
}

/// Executor client for an HTTP job runner.
///
/// `POST /v1/operations` submits a request and returns `{"id": ..}`;
/// `GET /v1/operations/{id}` reports `{"status": ..}`.
pub struct HttpExecutor {
    address: String,
}

impl HttpExecutor {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
        }
    }

    async fn request(
        &self,
        method: &str,
        path: &str,
        body: Option<Vec<u8>>,
    ) -> anyhow::Result<bytes::Bytes> {
        let uri = format!("http://{}{path}", self.address);

        let stream = tokio::net::TcpStream::connect(&self.address).await?;
        let io = hyper_util::rt::TokioIo::new(stream);
        let (mut sender, conn) = hyper::client::conn::http1::handshake(io).await?;
        tokio::spawn(async move {
            let _ = conn.await;
        });

        let req = http::Request::builder()
            .method(method)
            .uri(&uri)
            .header("host", self.address.as_str())
            .header("content-type", "application/json")
            .header("user-agent", "strata-dispatch/0.1")
            .body(http_body_util::Full::new(bytes::Bytes::from(
                body.unwrap_or_default(),
            )))?;

        let resp = sender.send_request(req).await?;
        if !resp.status().is_success() {
            anyhow::bail!("job runner returned {} for {uri}", resp.status());
        }
        Ok(resp.into_body().collect().await?.to_bytes())
    }
}

impl Executor for HttpExecutor {
    fn submit<'a>(&'a self, req: &'a ExecutorRequest) -> BoxFuture<'a, anyhow::Result<String>> {
        Box::pin(async move {
            let body = serde_json::to_vec(req)?;
            let resp = self.request("POST", "/v1/operations", Some(body)).await?;
            let parsed: SubmitResponse = serde_json::from_slice(&resp)?;
            debug!(tier = %req.tier, kind = %req.kind, id = %parsed.id, "operation submitted");
            Ok(parsed.id)
        })
    }

    fn check<'a>(&'a self, correlation_id: &'a str) -> BoxFuture<'a, anyhow::Result<ExecutorStatus>> {
        Box::pin(async move {
            let path = format!("/v1/operations/{correlation_id}");
            let resp = self.request("GET", &path, None).await?;
            let parsed: StatusResponse = serde_json::from_slice(&resp)?;
            Ok(parsed.status)
        })
    }
}

// ── Noop executor ─────────────────────────────────────────────────

/// Executor that accepts everything and reports instant success.
/// Backs local runs without a job runner; real dry runs never even
/// reach the executor.
#[derive(Default)]
pub struct NoopExecutor {
    counter: AtomicU64,
}

impl NoopExecutor {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Executor for NoopExecutor {
    fn submit<'a>(&'a self, req: &'a ExecutorRequest) -> BoxFuture<'a, anyhow::Result<String>> {
        let id = format!("noop-{}", self.counter.fetch_add(1, Ordering::Relaxed) + 1);
        debug!(tier = %req.tier, kind = %req.kind, id = %id, "noop submit");
        Box::pin(async move { Ok(id) })
    }

    fn check<'a>(&'a self, _correlation_id: &'a str) -> BoxFuture<'a, anyhow::Result<ExecutorStatus>> {
        Box::pin(async { Ok(ExecutorStatus::Succeeded) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_serializes_with_parameters() {
        let mut parameters = BTreeMap::new();
        parameters.insert("zone.hot-11".to_string(), "z2".to_string());

        let req = ExecutorRequest {
            kind: OperationKind::Provision,
            tier: "hot".to_string(),
            target_nodes: vec!["hot-11".to_string()],
            parameters,
        };

        let json = serde_json::to_string(&req).unwrap();
        assert!(json.contains("\"kind\":\"provision\""));
        assert!(json.contains("\"zone.hot-11\":\"z2\""));

        let back: ExecutorRequest = serde_json::from_str(&json).unwrap();
        assert_eq!(back, req);
    }

    #[test]
    fn status_response_parses() {
        let resp: StatusResponse = serde_json::from_str(r#"{"status": "succeeded"}"#).unwrap();
        assert_eq!(resp.status, ExecutorStatus::Succeeded);
    }

    #[tokio::test]
    async fn noop_executor_hands_out_sequential_ids() {
        let exec = NoopExecutor::new();
        let req = ExecutorRequest {
            kind: OperationKind::Decommission,
            tier: "hot".to_string(),
            target_nodes: vec![],
            parameters: BTreeMap::new(),
        };

        assert_eq!(exec.submit(&req).await.unwrap(), "noop-1");
        assert_eq!(exec.submit(&req).await.unwrap(), "noop-2");
        assert_eq!(exec.check("noop-1").await.unwrap(), ExecutorStatus::Succeeded);
    }
}

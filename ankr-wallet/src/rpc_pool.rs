//! Endpoint selection and JSON-RPC client
//!
//! The chain is served by a small set of replicated RPC endpoints sharing a
//! port. Each invocation shuffles the set, probes the candidates in that
//! order, and uses the first live one:
//! - Probe: `GET <endpoint>:<port>/net_info`, only HTTP 200 counts
//! - If nothing answers, the first shuffled candidate is returned marked
//!   degraded, and the caller's request is what surfaces the failure

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{json, Value};
use std::{
    fmt,
    sync::atomic::{AtomicU64, Ordering},
    time::Duration,
};
use tracing::{debug, warn};

use crate::error::{WalletError, WalletResult};
use crate::transaction::{Receipt, SignedEnvelope};

/// JSON-RPC request ID counter
static REQUEST_ID: AtomicU64 = AtomicU64::new(1);

/// ABCI query path for account balances
pub const BALANCE_QUERY_PATH: &str = "/store/balance";

/// One RPC endpoint: base URL plus port
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Endpoint {
    base_url: String,
    port: u16,
}

impl Endpoint {
    pub fn new(base_url: impl Into<String>, port: u16) -> Self {
        let base_url = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            port,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// `<base>:<port>`
    pub fn url(&self) -> String {
        format!("{}:{}", self.base_url, self.port)
    }

    pub fn net_info_url(&self) -> String {
        format!("{}/net_info", self.url())
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.url())
    }
}

/// Outcome of endpoint selection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    pub endpoint: Endpoint,
    /// No candidate passed the probe; `endpoint` is a blind pick
    pub degraded: bool,
}

/// Uniformly random permutation of `items` (Fisher-Yates). The input is
/// left untouched.
pub fn shuffled<T: Clone, R: Rng + ?Sized>(items: &[T], rng: &mut R) -> Vec<T> {
    let mut out = items.to_vec();
    for i in (1..out.len()).rev() {
        let j = rng.gen_range(0..=i);
        out.swap(i, j);
    }
    out
}

/// Checks whether an endpoint is serving
#[async_trait]
pub trait LivenessProbe: Send + Sync {
    /// `Ok` if live, [`WalletError::EndpointUnavailable`] otherwise
    async fn probe(&self, endpoint: &Endpoint) -> WalletResult<()>;
}

/// Probe that GETs `/net_info`
#[derive(Debug, Clone)]
pub struct HttpProbe {
    client: reqwest::Client,
}

impl HttpProbe {
    pub fn new(timeout: Duration) -> WalletResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| WalletError::Config(format!("cannot build HTTP client: {}", e)))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl LivenessProbe for HttpProbe {
    async fn probe(&self, endpoint: &Endpoint) -> WalletResult<()> {
        let unavailable = |reason: String| WalletError::EndpointUnavailable {
            endpoint: endpoint.to_string(),
            reason,
        };

        let response = self
            .client
            .get(endpoint.net_info_url())
            .send()
            .await
            .map_err(|e| unavailable(e.to_string()))?;

        if response.status() == reqwest::StatusCode::OK {
            Ok(())
        } else {
            Err(unavailable(format!("HTTP {}", response.status())))
        }
    }
}

/// Picks a live endpoint from a candidate set
pub struct EndpointSelector<P> {
    port: u16,
    probe: P,
}

impl<P: LivenessProbe> EndpointSelector<P> {
    pub fn new(port: u16, probe: P) -> Self {
        Self { port, probe }
    }

    /// Shuffle `candidates`, probe them in that order, return the first live
    /// one. Fails only when `candidates` is empty.
    pub async fn select(&self, candidates: &[String]) -> WalletResult<Selection> {
        let order = {
            let mut rng = StdRng::from_entropy();
            shuffled(candidates, &mut rng)
        };
        let Some(first) = order.first() else {
            return Err(WalletError::Config("no RPC endpoints configured".to_string()));
        };

        for candidate in &order {
            let endpoint = Endpoint::new(candidate.as_str(), self.port);
            match self.probe.probe(&endpoint).await {
                Ok(()) => {
                    debug!("Selected endpoint {}", endpoint);
                    return Ok(Selection {
                        endpoint,
                        degraded: false,
                    });
                }
                Err(e) => debug!("Probe failed: {}", e),
            }
        }

        let endpoint = Endpoint::new(first.as_str(), self.port);
        warn!(
            "No endpoint answered the liveness probe, falling back to {}",
            endpoint
        );
        Ok(Selection {
            endpoint,
            degraded: true,
        })
    }
}

// ============================================================================
// JSON-RPC
// ============================================================================

#[derive(Debug, Serialize)]
struct JsonRpcRequest {
    jsonrpc: &'static str,
    method: String,
    params: Value,
    id: u64,
}

#[derive(Debug, Deserialize)]
struct JsonRpcResponse<T> {
    result: Option<T>,
    error: Option<JsonRpcError>,
}

#[derive(Debug, Deserialize)]
pub struct JsonRpcError {
    pub code: i64,
    pub message: String,
    #[serde(default)]
    pub data: Option<Value>,
}

impl fmt::Display for JsonRpcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RPC error {}: {}", self.code, self.message)?;
        match &self.data {
            Some(Value::String(data)) if !data.is_empty() => write!(f, " ({})", data),
            Some(Value::Null) | None => Ok(()),
            Some(data) => write!(f, " ({})", data),
        }
    }
}

/// ABCI result code and log, as found in `check_tx` and `deliver_tx`
#[derive(Debug, Default, Deserialize)]
struct TxResult {
    #[serde(default)]
    code: u32,
    #[serde(default)]
    log: String,
}

/// Heights arrive as strings from Tendermint and as numbers from some proxies
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Height {
    Number(u64),
    Text(String),
}

impl Height {
    fn value(&self) -> Option<u64> {
        match self {
            Height::Number(n) => Some(*n),
            Height::Text(s) => s.parse().ok(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct BroadcastCommitResult {
    #[serde(default)]
    check_tx: TxResult,
    #[serde(default, alias = "tx_result")]
    deliver_tx: TxResult,
    hash: Option<String>,
    height: Option<Height>,
}

impl BroadcastCommitResult {
    /// A committed transaction has both phases accepted, a hash and a
    /// positive block height
    fn into_receipt(self) -> WalletResult<Receipt> {
        if self.check_tx.code != 0 {
            return Err(WalletError::Submission(format!(
                "check_tx rejected with code {}: {}",
                self.check_tx.code, self.check_tx.log
            )));
        }
        if self.deliver_tx.code != 0 {
            return Err(WalletError::Submission(format!(
                "deliver_tx failed with code {}: {}",
                self.deliver_tx.code, self.deliver_tx.log
            )));
        }

        let tx_hash = self
            .hash
            .filter(|h| !h.is_empty())
            .ok_or_else(|| WalletError::Submission("response has no transaction hash".to_string()))?;
        let height = self
            .height
            .as_ref()
            .and_then(Height::value)
            .filter(|h| *h > 0)
            .ok_or_else(|| WalletError::Submission("response has no positive block height".to_string()))?;

        Ok(Receipt { tx_hash, height })
    }
}

#[derive(Debug, Deserialize)]
struct AbciQueryResult {
    response: AbciQueryResponse,
}

#[derive(Debug, Deserialize)]
struct AbciQueryResponse {
    #[serde(default)]
    code: u32,
    #[serde(default)]
    log: String,
    value: Option<String>,
}

#[derive(Debug, Serialize)]
struct BalanceQueryReq<'a> {
    address: &'a str,
    symbol: &'a str,
}

#[derive(Debug, Deserialize)]
struct BalanceQueryResp {
    amount: String,
}

/// JSON-RPC 2.0 client bound to one endpoint
#[derive(Debug)]
pub struct RpcClient {
    endpoint: Endpoint,
    client: reqwest::Client,
}

impl RpcClient {
    pub fn new(endpoint: Endpoint, timeout: Duration) -> WalletResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| WalletError::Config(format!("cannot build HTTP client: {}", e)))?;
        Ok(Self { endpoint, client })
    }

    async fn call<T: DeserializeOwned>(&self, method: &str, params: Value) -> WalletResult<T> {
        let id = REQUEST_ID.fetch_add(1, Ordering::SeqCst);
        let request = JsonRpcRequest {
            jsonrpc: "2.0",
            method: method.to_string(),
            params,
            id,
        };

        let response = self
            .client
            .post(self.endpoint.url())
            .json(&request)
            .send()
            .await
            .map_err(|e| WalletError::Submission(format!("{}: {}", self.endpoint, e)))?;

        if !response.status().is_success() {
            return Err(WalletError::Submission(format!(
                "{}: HTTP error {}",
                self.endpoint,
                response.status()
            )));
        }

        let json_response: JsonRpcResponse<T> = response
            .json()
            .await
            .map_err(|e| WalletError::Submission(format!("malformed RPC response: {}", e)))?;

        if let Some(error) = json_response.error {
            return Err(WalletError::Submission(error.to_string()));
        }

        json_response
            .result
            .ok_or_else(|| WalletError::Submission("missing result in RPC response".to_string()))
    }

    /// Broadcast and wait for the block commit
    pub async fn broadcast_tx_commit(&self, envelope: &SignedEnvelope) -> WalletResult<Receipt> {
        let tx = STANDARD.encode(envelope.encode()?);
        let result: BroadcastCommitResult =
            self.call("broadcast_tx_commit", json!({ "tx": tx })).await?;

        result.into_receipt()
    }

    /// Query the balance of `address` in `symbol`, in the smallest unit
    pub async fn query_balance(&self, address: &str, symbol: &str) -> WalletResult<String> {
        let request = serde_json::to_vec(&BalanceQueryReq { address, symbol })
            .map_err(|e| WalletError::Format(e.to_string()))?;
        let result: AbciQueryResult = self
            .call(
                "abci_query",
                json!({
                    "path": BALANCE_QUERY_PATH,
                    "data": hex::encode(request),
                }),
            )
            .await?;

        let response = result.response;
        if response.code != 0 {
            return Err(WalletError::Submission(format!(
                "balance query failed with code {}: {}",
                response.code, response.log
            )));
        }
        let value = response
            .value
            .ok_or_else(|| WalletError::Submission("balance query returned no value".to_string()))?;
        let bytes = STANDARD
            .decode(value)
            .map_err(|e| WalletError::Format(format!("balance value: {}", e)))?;
        let balance: BalanceQueryResp = serde_json::from_slice(&bytes)
            .map_err(|e| WalletError::Format(format!("balance value: {}", e)))?;
        Ok(balance.amount)
    }
}

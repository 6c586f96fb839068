//! JSON-RPC client for the contract runtime.
//!
//! This module provides the two calls everything else is built on: read-only
//! `call_function` queries against a contract view method, and
//! `broadcast_tx_commit` for transactions that were signed elsewhere.

use crate::config::DaoConfig;
use crate::error::{DaoClientError, Result};
use crate::retry::RetryStrategy;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info};

/// JSON-RPC request ID type
type RequestId = u64;

/// JSON-RPC client
#[derive(Clone)]
pub struct RpcClient {
    /// HTTP client
    client: Client,
    /// Endpoint URL
    base_url: String,
    /// Retry strategy
    retry_strategy: RetryStrategy,
    /// Request ID counter
    request_id: Arc<AtomicU64>,
}

/// JSON-RPC request
#[derive(Debug, Serialize)]
struct JsonRpcRequest {
    jsonrpc: String,
    id: RequestId,
    method: String,
    params: Value,
}

/// JSON-RPC response
#[derive(Debug, Deserialize)]
struct JsonRpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<JsonRpcError>,
}

/// JSON-RPC error
#[derive(Debug, Deserialize)]
struct JsonRpcError {
    code: i64,
    message: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    cause: Option<Value>,
    #[serde(default)]
    data: Option<Value>,
}

impl JsonRpcError {
    fn describe(&self) -> String {
        let cause = self
            .cause
            .as_ref()
            .and_then(|c| c["name"].as_str())
            .or(self.name.as_deref());
        let data = self.data.as_ref().map(|d| d.to_string());

        match (cause, data) {
            (Some(cause), Some(data)) => {
                format!("{}: {} {} (code: {})", self.message, cause, data, self.code)
            }
            (Some(cause), None) => format!("{}: {} (code: {})", self.message, cause, self.code),
            (None, Some(data)) => format!("{} {} (code: {})", self.message, data, self.code),
            (None, None) => format!("{} (code: {})", self.message, self.code),
        }
    }
}

/// Outcome of a committed transaction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionOutcome {
    /// Transaction hash
    pub transaction_hash: String,
    /// Decoded JSON return value of the function call (null when empty)
    pub return_value: Value,
}

impl RpcClient {
    /// Create a new JSON-RPC client
    pub fn new(config: &DaoConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(DaoClientError::Network)?;

        Ok(Self {
            client,
            base_url: config.rpc_url.clone(),
            retry_strategy: RetryStrategy::from_config(config),
            request_id: Arc::new(AtomicU64::new(1)),
        })
    }

    /// Get next request ID
    fn next_request_id(&self) -> RequestId {
        self.request_id.fetch_add(1, Ordering::SeqCst)
    }

    /// Make a JSON-RPC call
    async fn call_rpc(&self, method: &str, params: Value) -> Result<Value> {
        let request = JsonRpcRequest {
            jsonrpc: "2.0".to_string(),
            id: self.next_request_id(),
            method: method.to_string(),
            params,
        };

        debug!("RPC request: {} (id: {})", method, request.id);

        self.retry_strategy
            .retry(|| async {
                let response = self
                    .client
                    .post(&self.base_url)
                    .json(&request)
                    .send()
                    .await
                    .map_err(DaoClientError::Network)?;

                let status = response.status();
                if status == StatusCode::TOO_MANY_REQUESTS {
                    let retry_after = response
                        .headers()
                        .get("Retry-After")
                        .and_then(|v| v.to_str().ok())
                        .and_then(|v| v.parse().ok())
                        .unwrap_or(1);
                    return Err(DaoClientError::RateLimitExceeded(retry_after));
                }
                if !status.is_success() {
                    let error_text = response
                        .text()
                        .await
                        .unwrap_or_else(|_| "Unknown error".to_string());
                    return Err(DaoClientError::Rpc(format!(
                        "HTTP {}: {}",
                        status, error_text
                    )));
                }

                let rpc_response: JsonRpcResponse = response
                    .json()
                    .await
                    .map_err(|e| DaoClientError::InvalidResponse(e.to_string()))?;

                if let Some(error) = rpc_response.error {
                    let described = error.describe();
                    error!("RPC error in {}: {}", method, described);
                    return Err(DaoClientError::Rpc(described));
                }

                rpc_response.result.ok_or_else(|| {
                    DaoClientError::InvalidResponse("Missing result in response".to_string())
                })
            })
            .await
    }

    /// Call a view method on a contract and decode its JSON return value
    pub async fn view_function<T: DeserializeOwned>(
        &self,
        account_id: &str,
        method_name: &str,
        args: &Value,
    ) -> Result<T> {
        debug!("View call {}.{}({})", account_id, method_name, args);

        let params = json!({
            "request_type": "call_function",
            "finality": "optimistic",
            "account_id": account_id,
            "method_name": method_name,
            "args_base64": STANDARD.encode(serde_json::to_vec(args)?),
        });

        let result = self.call_rpc("query", params).await?;

        // Contract panics come back inside a successful query result
        if let Some(message) = result["error"].as_str() {
            return Err(DaoClientError::ContractExecution {
                method: method_name.to_string(),
                message: message.to_string(),
            });
        }

        let bytes: Vec<u8> = serde_json::from_value(result["result"].clone()).map_err(|_| {
            DaoClientError::InvalidResponse(format!(
                "Missing result bytes in {} response",
                method_name
            ))
        })?;

        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Broadcast a base64-encoded signed transaction and wait for its final outcome
    pub async fn broadcast_tx_commit(
        &self,
        method_name: &str,
        signed_transaction: &str,
    ) -> Result<TransactionOutcome> {
        info!("Broadcasting {} transaction", method_name);

        let result = self
            .call_rpc("broadcast_tx_commit", json!([signed_transaction]))
            .await?;

        let transaction_hash = result["transaction"]["hash"]
            .as_str()
            .ok_or_else(|| {
                DaoClientError::InvalidResponse("Missing transaction hash".to_string())
            })?
            .to_string();

        let status = &result["status"];
        if let Some(failure) = status.get("Failure") {
            error!("Transaction {} failed: {}", transaction_hash, failure);
            return Err(DaoClientError::ContractExecution {
                method: method_name.to_string(),
                message: failure.to_string(),
            });
        }

        let encoded = status["SuccessValue"].as_str().ok_or_else(|| {
            DaoClientError::InvalidResponse(format!("Unexpected transaction status: {}", status))
        })?;
        let decoded = STANDARD.decode(encoded)?;
        let return_value = if decoded.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&decoded)?
        };

        info!("Transaction committed: {}", transaction_hash);

        Ok(TransactionOutcome {
            transaction_hash,
            return_value,
        })
    }

    /// Health check - verify connection to the endpoint
    pub async fn health_check(&self) -> Result<bool> {
        debug!("Performing RPC health check");

        match self.call_rpc("status", json!([])).await {
            Ok(status) => {
                info!(
                    "RPC health check passed (chain: {})",
                    status["chain_id"].as_str().unwrap_or("unknown")
                );
                Ok(true)
            }
            Err(e) => {
                error!("RPC health check failed: {:?}", e);
                Err(e)
            }
        }
    }
}

//! JSON-RPC client for the wallet owner API.
//!
//! The wallet/node is a separate process; everything it does is opaque to
//! this client. Each call is a fresh POST with a generated correlation id
//! and no retry policy — the caller decides whether to re-issue.

use serde_json::{json, Value};
use thiserror::Error;
use uuid::Uuid;

pub const DEFAULT_API_URL: &str = "http://127.0.0.1:3421/v2";

#[derive(Debug, Error)]
pub enum RpcError {
    #[error("wallet process is not reachable at {0}")]
    Unreachable(String),

    #[error("RPC transport error: {0}")]
    Transport(String),

    #[error("{0}")]
    Server(String),

    #[error("malformed RPC response: {0}")]
    Malformed(String),
}

pub struct WalletRpc {
    client: reqwest::Client,
    url: String,
}

impl WalletRpc {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into(),
        }
    }

    /// One JSON-RPC 2.0 round-trip: `call(method, params) -> result`.
    pub async fn call(&self, method: &str, params: Value) -> Result<Value, RpcError> {
        let request = json!({
            "jsonrpc": "2.0",
            "method": method,
            "id": Uuid::new_v4().to_string(),
            "params": params,
        });
        tracing::debug!(method, "wallet rpc call");
        let response = self
            .client
            .post(&self.url)
            .json(&request)
            .send()
            .await
            .map_err(|err| {
                if err.is_connect() {
                    RpcError::Unreachable(self.url.clone())
                } else {
                    RpcError::Transport(err.to_string())
                }
            })?;
        let body: Value = response
            .json()
            .await
            .map_err(|err| RpcError::Malformed(err.to_string()))?;
        if let Some(error) = body.get("error") {
            let message = error
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("unknown RPC error");
            return Err(RpcError::Server(message.to_string()));
        }
        body.get("result")
            .cloned()
            .ok_or_else(|| RpcError::Malformed("response carries neither result nor error".into()))
    }

    fn expect_str(value: &Value, field: &str) -> Result<String, RpcError> {
        value
            .get(field)
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| RpcError::Malformed(format!("missing field {field:?}")))
    }

    /// Open a wallet; returns the session token for subsequent calls.
    pub async fn login(&self, wallet: &str, password: &str) -> Result<String, RpcError> {
        let result = self
            .call("login", json!({"username": wallet, "password": password}))
            .await?;
        Self::expect_str(&result, "session_token")
    }

    pub async fn logout(&self, session_token: &str) -> Result<(), RpcError> {
        self.call("logout", json!({"session_token": session_token}))
            .await?;
        Ok(())
    }

    /// The wallet's slatepack address — part of the identity key material.
    pub async fn slatepack_address(&self, session_token: &str) -> Result<String, RpcError> {
        let result = self
            .call("get_slatepack_address", json!({"session_token": session_token}))
            .await?;
        Self::expect_str(&result, "slatepack")
    }

    /// Look up one transaction and return its armored slatepack.
    pub async fn armored_slatepack(
        &self,
        session_token: &str,
        tx_id: u64,
    ) -> Result<String, RpcError> {
        let result = self
            .call("list_txs", json!({"session_token": session_token}))
            .await?;
        let txs = result
            .get("txs")
            .and_then(Value::as_array)
            .ok_or_else(|| RpcError::Malformed("missing field \"txs\"".into()))?;
        let tx = txs
            .iter()
            .find(|tx| tx.get("id").and_then(Value::as_u64) == Some(tx_id))
            .ok_or_else(|| RpcError::Server(format!("no transaction with id {tx_id}")))?;
        Self::expect_str(tx, "armored_slatepack")
    }

    /// Hand a received slatepack to the wallet for the initial signature;
    /// returns the signed slatepack to send back.
    pub async fn receive_slatepack(
        &self,
        session_token: &str,
        slatepack: &str,
    ) -> Result<String, RpcError> {
        let result = self
            .call(
                "receive",
                json!({"session_token": session_token, "slatepack": slatepack.trim()}),
            )
            .await?;
        Self::expect_str(&result, "slatepack")
    }

    /// Finalize a fully-signed slatepack.
    pub async fn finalize_slatepack(
        &self,
        session_token: &str,
        slatepack: &str,
    ) -> Result<Value, RpcError> {
        self.call(
            "finalize",
            json!({"session_token": session_token, "slatepack": slatepack.trim()}),
        )
        .await
    }
}

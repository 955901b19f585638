//! JSON-RPC 2.0 envelope types shared by the MCP and A2A dialects.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Well-known JSON-RPC error codes.
pub mod rpc_code {
    /// Invalid JSON was received by the server.
    pub const PARSE_ERROR: i64 = -32700;
    /// The JSON sent is not a valid request object.
    pub const INVALID_REQUEST: i64 = -32600;
    /// The method does not exist or is not available.
    pub const METHOD_NOT_FOUND: i64 = -32601;
    /// Invalid method parameters.
    pub const INVALID_PARAMS: i64 = -32602;
    /// Internal JSON-RPC error.
    pub const INTERNAL_ERROR: i64 = -32603;
}

/// A JSON-RPC 2.0 request or notification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    /// Protocol version, always `"2.0"`.
    pub jsonrpc: String,

    /// Request id. `None` makes this a notification: no response is expected.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,

    /// Method name, e.g. `tools/call` or `message/send`.
    pub method: String,

    /// Method parameters.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl JsonRpcRequest {
    /// Build a request expecting a response.
    #[must_use]
    pub fn new(id: impl Into<Value>, method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            jsonrpc: "2.0".to_owned(),
            id: Some(id.into()),
            method: method.into(),
            params,
        }
    }

    /// Build a fire-and-forget notification.
    #[must_use]
    pub fn notification(method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            jsonrpc: "2.0".to_owned(),
            id: None,
            method: method.into(),
            params,
        }
    }

    /// Whether this request expects a response.
    #[must_use]
    pub fn expects_response(&self) -> bool {
        self.id.is_some()
    }
}

/// A JSON-RPC 2.0 error object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcError {
    /// Numeric error code.
    pub code: i64,

    /// Human-readable message.
    pub message: String,

    /// Optional structured detail.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// A JSON-RPC 2.0 response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    /// Protocol version, always `"2.0"`.
    pub jsonrpc: String,

    /// Id of the request this answers.
    #[serde(default)]
    pub id: Option<Value>,

    /// Success payload. Mutually exclusive with `error`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,

    /// Failure payload. Mutually exclusive with `result`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

impl JsonRpcResponse {
    /// Collapse the result/error pair into an [`UpstreamOutcome`].
    ///
    /// A response carrying neither field is treated as a success with a
    /// null result; upstreams answering notifications this way exist.
    #[must_use]
    pub fn into_outcome(self) -> UpstreamOutcome {
        match (self.result, self.error) {
            (_, Some(err)) => UpstreamOutcome::Error {
                code: err.code,
                message: err.message,
            },
            (Some(result), None) => UpstreamOutcome::Result(result),
            (None, None) => UpstreamOutcome::Result(Value::Null),
        }
    }
}

/// What an upstream call produced: the upstream's result, or the
/// upstream's own JSON-RPC error carried through verbatim.
///
/// Transport failures (process death, connection refused, malformed
/// frames) are *not* outcomes; adapters surface those as their error type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpstreamOutcome {
    /// The upstream answered with a result.
    Result(Value),
    /// The upstream answered with a JSON-RPC error object.
    Error {
        /// Upstream error code, e.g. `-32601`.
        code: i64,
        /// Upstream error message, passed through to the client.
        message: String,
    },
}

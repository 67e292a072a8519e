//! JSON-RPC 2.0 envelope and the MCP handshake types
//!
//! Only the slice of MCP this server speaks is modelled: the `initialize`
//! handshake, `tools/list` and `tools/call`. Tool payloads themselves live in
//! [`crate::tools`].

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Protocol revisions the server can answer with, newest first.
pub const PROTOCOL_VERSIONS: &[&str] = &["2025-03-26", "2024-11-05"];

/// JSON-RPC error codes used by the server
pub mod codes {
    pub const PARSE_ERROR: i32 = -32700;
    pub const METHOD_NOT_FOUND: i32 = -32601;
    pub const INVALID_PARAMS: i32 = -32602;
    pub const INTERNAL_ERROR: i32 = -32603;
}

/// One inbound message. Requests carry an `id`; notifications do not.
#[derive(Debug, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    pub id: Option<Value>,
    pub method: String,
    #[serde(default)]
    pub params: Value,
}

impl JsonRpcRequest {
    pub fn is_notification(&self) -> bool {
        self.id.is_none()
    }
}

/// Exactly one of `result` and `error` is present.
#[derive(Debug, Serialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

#[derive(Debug, Serialize)]
pub struct JsonRpcError {
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl JsonRpcResponse {
    pub fn success(id: Option<Value>, result: Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: Some(result),
            error: None,
        }
    }

    pub fn error(id: Option<Value>, code: i32, message: String) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: None,
            error: Some(JsonRpcError {
                code,
                message,
                data: None,
            }),
        }
    }

    /// The line could not be read as a request, so there is no id to echo.
    pub fn parse_error(reason: impl std::fmt::Display) -> Self {
        Self::error(None, codes::PARSE_ERROR, format!("Parse error: {reason}"))
    }

    pub fn method_not_found(id: Option<Value>, method: &str) -> Self {
        Self::error(
            id,
            codes::METHOD_NOT_FOUND,
            format!("Method not found: {method}"),
        )
    }

    pub fn invalid_params(id: Option<Value>, reason: impl std::fmt::Display) -> Self {
        Self::error(id, codes::INVALID_PARAMS, format!("Invalid params: {reason}"))
    }

    pub fn internal_error(reason: impl std::fmt::Display) -> Self {
        Self::error(
            None,
            codes::INTERNAL_ERROR,
            format!("Internal error: {reason}"),
        )
    }
}

/// `initialize` params. Every field is optional so a sparse handshake still
/// gets an answer.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeParams {
    #[serde(default)]
    pub protocol_version: Option<String>,
    #[serde(default)]
    pub client_info: Option<ClientInfo>,
}

impl InitializeParams {
    /// The client's requested revision when the server speaks it, otherwise
    /// the newest one the server knows.
    pub fn negotiated_version(&self) -> &'static str {
        self.protocol_version
            .as_deref()
            .and_then(|requested| PROTOCOL_VERSIONS.iter().find(|v| **v == requested))
            .copied()
            .unwrap_or(PROTOCOL_VERSIONS[0])
    }
}

#[derive(Debug, Deserialize)]
pub struct ClientInfo {
    pub name: String,
    #[serde(default)]
    pub version: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeResult {
    pub protocol_version: String,
    pub capabilities: ServerCapabilities,
    pub server_info: ServerInfo,
}

/// Only tools are offered; no resources or prompts.
#[derive(Debug, Serialize)]
pub struct ServerCapabilities {
    pub tools: Option<ToolsCapability>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolsCapability {
    pub list_changed: Option<bool>,
}

#[derive(Debug, Serialize)]
pub struct ServerInfo {
    pub name: String,
    pub version: String,
}

/// `tools/call` params. Missing `arguments` decode as `null`.
#[derive(Debug, Deserialize)]
pub struct ToolCallParams {
    pub name: String,
    #[serde(default)]
    pub arguments: Value,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    fn request(value: Value) -> JsonRpcRequest {
        serde_json::from_value(value).unwrap()
    }

    #[rstest]
    #[case(json!({"jsonrpc": "2.0", "id": 7, "method": "tools/list"}), false)]
    #[case(json!({"jsonrpc": "2.0", "id": "q-1", "method": "tools/call", "params": {}}), false)]
    #[case(json!({"jsonrpc": "2.0", "method": "notifications/initialized"}), true)]
    #[case(json!({"jsonrpc": "2.0", "id": null, "method": "notifications/cancelled"}), true)]
    fn notifications_have_no_id(#[case] message: Value, #[case] notification: bool) {
        assert_eq!(request(message).is_notification(), notification);
    }

    #[test]
    fn missing_params_are_null() {
        let req = request(json!({"jsonrpc": "2.0", "id": 1, "method": "tools/list"}));
        assert!(req.params.is_null());
    }

    #[test]
    fn success_omits_error() {
        let value = serde_json::to_value(JsonRpcResponse::success(Some(json!(3)), json!({"tools": []})))
            .unwrap();
        assert_eq!(value, json!({"jsonrpc": "2.0", "id": 3, "result": {"tools": []}}));
    }

    #[rstest]
    #[case(JsonRpcResponse::parse_error("eof"), -32700, "Parse error: eof")]
    #[case(JsonRpcResponse::method_not_found(Some(json!(1)), "prompts/list"), -32601, "Method not found: prompts/list")]
    #[case(JsonRpcResponse::invalid_params(Some(json!(1)), "missing field `name`"), -32602, "Invalid params: missing field `name`")]
    #[case(JsonRpcResponse::internal_error("boom"), -32603, "Internal error: boom")]
    fn error_responses(#[case] response: JsonRpcResponse, #[case] code: i32, #[case] message: &str) {
        let value = serde_json::to_value(&response).unwrap();
        assert_eq!(value["error"]["code"], code);
        assert_eq!(value["error"]["message"], message);
        assert!(value.get("result").is_none());
        assert!(value["error"].get("data").is_none());
    }

    #[rstest]
    #[case(json!({"protocolVersion": "2024-11-05"}), "2024-11-05")]
    #[case(json!({"protocolVersion": "2025-03-26"}), "2025-03-26")]
    #[case(json!({"protocolVersion": "1999-01-01"}), "2025-03-26")]
    #[case(json!({}), "2025-03-26")]
    fn version_negotiation(#[case] params: Value, #[case] expected: &str) {
        let params: InitializeParams = serde_json::from_value(params).unwrap();
        assert_eq!(params.negotiated_version(), expected);
    }

    #[test]
    fn initialize_params_read_client_info() {
        let params: InitializeParams = serde_json::from_value(json!({
            "protocolVersion": "2024-11-05",
            "capabilities": {"roots": {}},
            "clientInfo": {"name": "ide", "version": "2.3.0"}
        }))
        .unwrap();
        let client = params.client_info.unwrap();
        assert_eq!(client.name, "ide");
        assert_eq!(client.version, "2.3.0");
    }

    #[test]
    fn capabilities_offer_tools_only() {
        let result = InitializeResult {
            protocol_version: "2024-11-05".to_string(),
            capabilities: ServerCapabilities {
                tools: Some(ToolsCapability {
                    list_changed: Some(false),
                }),
            },
            server_info: ServerInfo {
                name: "gerrit".to_string(),
                version: "0.1.0".to_string(),
            },
        };
        assert_eq!(
            serde_json::to_value(&result).unwrap(),
            json!({
                "protocolVersion": "2024-11-05",
                "capabilities": {"tools": {"listChanged": false}},
                "serverInfo": {"name": "gerrit", "version": "0.1.0"}
            })
        );
    }

    #[test]
    fn tool_call_arguments_default_to_null() {
        let params: ToolCallParams = serde_json::from_value(json!({"name": "query_changes"})).unwrap();
        assert_eq!(params.name, "query_changes");
        assert!(params.arguments.is_null());
    }
}

//! Frontend protocol message types
//!
//! The frontend speaks a DAP-style JSON protocol: requests carry a
//! command, a sequence number and opaque arguments; the bridge answers
//! with exactly one response per request and emits unsolicited events.
//!
//! ```text
//! Content-Length: 94\r\n
//! \r\n
//! {"seq":1,"type":"request","command":"attach","arguments":{"workingDirectory":"/proj", ...}}
//! ```

use crate::template;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Base protocol message - all frontend messages extend this
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ProtocolMessage {
    /// Request from the frontend to the bridge
    Request(Request),
    /// Response from the bridge to the frontend
    Response(Response),
    /// Unsolicited notification from the bridge
    Event(Event),
}

/// Request message sent by the frontend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    /// Sequence number for response correlation
    pub seq: i64,
    /// Command to execute
    pub command: String,
    /// Command-specific arguments, opaque until dispatch
    #[serde(skip_serializing_if = "Option::is_none")]
    pub arguments: Option<serde_json::Value>,
}

/// A decoded request paired with the original wire text.
///
/// Pass-through commands forward `raw` untouched; the decoded form is
/// only consulted for dispatch. Immutable once received.
#[derive(Debug, Clone, PartialEq)]
pub struct RawRequest {
    pub request: Request,
    pub raw: String,
}

impl RawRequest {
    pub fn new(request: Request, raw: impl Into<String>) -> Self {
        Self {
            request,
            raw: raw.into(),
        }
    }
}

/// Response message sent by the bridge
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    /// Sequence number
    pub seq: i64,
    /// Sequence number of the corresponding request
    pub request_seq: i64,
    /// Command this response is for
    pub command: String,
    /// Success indicator
    pub success: bool,
    /// Rendered error message if not successful
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Response body
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<serde_json::Value>,
}

impl Response {
    pub fn success(seq: i64, request_seq: i64, command: impl Into<String>) -> Self {
        Self {
            seq,
            request_seq,
            command: command.into(),
            success: true,
            message: None,
            body: None,
        }
    }

    pub fn error(seq: i64, request_seq: i64, command: impl Into<String>, msg: &ErrorMessage) -> Self {
        Self {
            seq,
            request_seq,
            command: command.into(),
            success: false,
            message: Some(msg.rendered()),
            body: Some(serde_json::json!({ "error": msg })),
        }
    }

    pub fn with_body(mut self, body: serde_json::Value) -> Self {
        self.body = Some(body);
        self
    }
}

/// Event notification sent by the bridge
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Sequence number
    pub seq: i64,
    /// Event type
    pub event: String,
    /// Event-specific data
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<serde_json::Value>,
}

impl Event {
    pub fn new(seq: i64, event: impl Into<String>) -> Self {
        Self {
            seq,
            event: event.into(),
            body: None,
        }
    }

    pub fn with_body(mut self, body: serde_json::Value) -> Self {
        self.body = Some(body);
        self
    }
}

/// Structured error carried in the body of error responses.
///
/// `format` keeps the raw template and `variables` the raw bindings so
/// telemetry can aggregate on the code while the frontend shows the
/// rendered string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorMessage {
    /// Error code (1014, 1020, 1104, 3003-3012)
    pub id: i64,
    /// Format template with `{name}` placeholders
    pub format: String,
    /// Variable bindings for the template
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub variables: BTreeMap<String, String>,
    /// Whether the frontend should surface the message to the user
    pub show_user: bool,
    /// Whether the message is only of interest to telemetry
    pub send_telemetry: bool,
}

impl ErrorMessage {
    pub fn new(id: i64, format: impl Into<String>) -> Self {
        Self {
            id,
            format: format.into(),
            variables: BTreeMap::new(),
            show_user: true,
            send_telemetry: false,
        }
    }

    pub fn variable(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.variables.insert(name.into(), value.into());
        self
    }

    pub fn telemetry(mut self) -> Self {
        self.send_telemetry = true;
        self
    }

    /// Render the template against the bound variables
    pub fn rendered(&self) -> String {
        template::render(&self.format, &self.variables)
    }
}

/// Capabilities sent in reply to `initialize`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Capabilities {
    /// Bridge supports the configurationDone request (forwarded)
    pub supports_configuration_done_request: bool,
    /// Function breakpoints are not implemented by the player
    pub supports_function_breakpoints: bool,
    /// Conditional breakpoints are not implemented by the player
    pub supports_conditional_breakpoints: bool,
    /// Hover evaluation is not implemented
    pub supports_evaluate_for_hovers: bool,
    /// No exception filters are offered
    pub exception_breakpoint_filters: Vec<serde_json::Value>,
}

impl Default for Capabilities {
    fn default() -> Self {
        Self {
            supports_configuration_done_request: true,
            supports_function_breakpoints: false,
            supports_conditional_breakpoints: false,
            supports_evaluate_for_hovers: false,
            exception_breakpoint_filters: Vec::new(),
        }
    }
}

/// Arguments for the `attach` request.
///
/// Also embedded in [`LaunchArguments`]: `launch` falls through into
/// the attach flow after starting the player, so the listener fields
/// are part of both schemas.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachArguments {
    /// Project working directory, sent to the player as sourceBasePath.
    /// Defaults to empty so an absent field gets the same validation
    /// error as an empty one.
    #[serde(default)]
    pub working_directory: String,
    /// Bind the listener on all interfaces instead of loopback only
    #[serde(default)]
    pub listen_publicly: bool,
    /// Port the player will connect to. Required to open the listener,
    /// but optional in the schema so field validation runs before the
    /// requiredness check.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub listen_port: Option<u16>,
}

/// Arguments for the `launch` request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LaunchArguments {
    /// Player executable to spawn; required unless `gprojPath` is given
    #[serde(default)]
    pub executable: String,
    /// Command-line arguments, one string split on whitespace
    #[serde(default)]
    pub arguments: String,
    /// Gideros project file; together with `giderosPath` selects the
    /// toolkit bridging mode instead of a direct spawn
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gproj_path: Option<String>,
    /// Gideros toolkit executable for the bridging mode
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gideros_path: Option<String>,
    /// Listener fields shared with `attach`
    #[serde(flatten)]
    pub attach: AttachArguments,
}

impl LaunchArguments {
    /// True when the request selects the toolkit bridging mode
    pub fn uses_toolkit(&self) -> bool {
        self.gproj_path.is_some() && self.gideros_path.is_some()
    }
}

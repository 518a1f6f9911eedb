//! Tool dispatch
//!
//! Named tools with a declared input schema and the scopes they need. The
//! dispatcher validates arguments, obtains a credential from the session
//! provider, and only then hands control to the tool's handler. Handler
//! bodies (the Gmail / Calendar / Drive calls) are supplied by the embedder.

pub mod catalogue;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::auth::{Credential, ScopeSet, SessionProvider};
use crate::common::{AuthError, ErrorCode};

pub use catalogue::builtin_tools;

/// Behavior hints for an AI client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ToolAnnotations {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub read_only_hint: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destructive_hint: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub idempotent_hint: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub open_world_hint: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
    pub required_scopes: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub annotations: Option<ToolAnnotations>,
}

impl ToolDescriptor {
    pub fn scopes(&self) -> ScopeSet {
        ScopeSet::new(&self.required_scopes)
    }
}

/// A credential checked by the session provider for one tool call.
pub struct AuthorizedSession {
    credential: Credential,
}

impl AuthorizedSession {
    pub fn new(credential: Credential) -> Self {
        Self { credential }
    }

    pub fn access_token(&self) -> &str {
        &self.credential.access_token
    }

    pub fn credential(&self) -> &Credential {
        &self.credential
    }

    /// Attach the bearer token to an outgoing Google API request.
    pub fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        request.header(
            reqwest::header::AUTHORIZATION,
            self.credential.authorization_header(),
        )
    }
}

/// Executes one tool against a Google API.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    fn name(&self) -> &str;

    async fn call(&self, session: &AuthorizedSession, arguments: Value) -> Result<Value, ToolError>;
}

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("unknown tool: {0}")]
    UnknownTool(String),

    #[error("tool {0} has no handler registered")]
    NotImplemented(String),

    #[error("invalid params: {0}")]
    InvalidParams(String),

    #[error("duplicate handler for tool {0}")]
    DuplicateHandler(String),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error("{0}")]
    Handler(String),
}

impl ToolError {
    pub fn code(&self) -> ErrorCode {
        match self {
            ToolError::UnknownTool(_) => ErrorCode::MethodNotFound,
            ToolError::NotImplemented(_) => ErrorCode::MethodNotFound,
            ToolError::InvalidParams(_) => ErrorCode::InvalidParams,
            ToolError::DuplicateHandler(_) => ErrorCode::GenericError,
            ToolError::Auth(e) => e.code(),
            ToolError::Handler(_) => ErrorCode::GenericError,
        }
    }

    /// JSON-RPC style error object.
    pub fn to_json(&self) -> Value {
        json!({
            "code": self.code().code(),
            "message": self.to_string(),
        })
    }
}

// ── Dispatcher ──────────────────────────────────────────────────────────────

pub struct ToolDispatcher {
    session: Arc<SessionProvider>,
    tools: HashMap<String, ToolDescriptor>,
    handlers: HashMap<String, Arc<dyn ToolHandler>>,
}

impl ToolDispatcher {
    /// Dispatcher over the built-in catalogue.
    pub fn new(session: Arc<SessionProvider>) -> Self {
        Self::with_catalogue(session, builtin_tools())
    }

    pub fn with_catalogue(session: Arc<SessionProvider>, tools: Vec<ToolDescriptor>) -> Self {
        Self {
            session,
            tools: tools.into_iter().map(|t| (t.name.clone(), t)).collect(),
            handlers: HashMap::new(),
        }
    }

    /// Attach the implementation of a declared tool.
    pub fn register(&mut self, handler: Arc<dyn ToolHandler>) -> Result<(), ToolError> {
        let name = handler.name().to_string();
        if !self.tools.contains_key(&name) {
            return Err(ToolError::UnknownTool(name));
        }
        if self.handlers.contains_key(&name) {
            return Err(ToolError::DuplicateHandler(name));
        }
        debug!("Registered handler for {}", name);
        self.handlers.insert(name, handler);
        Ok(())
    }

    /// Declared tools, sorted by name.
    pub fn list(&self) -> Vec<ToolDescriptor> {
        let mut tools: Vec<_> = self.tools.values().cloned().collect();
        tools.sort_by(|a, b| a.name.cmp(&b.name));
        tools
    }

    pub fn descriptor(&self, name: &str) -> Option<&ToolDescriptor> {
        self.tools.get(name)
    }

    /// Run a tool: validate arguments, obtain a credential, call the handler.
    ///
    /// The handler is not invoked when no valid credential can be produced.
    pub async fn call(&self, name: &str, arguments: Value) -> Result<Value, ToolError> {
        let Some(descriptor) = self.tools.get(name) else {
            return Err(ToolError::UnknownTool(name.to_string()));
        };

        let arguments = validate_arguments(&descriptor.input_schema, arguments)?;

        let Some(handler) = self.handlers.get(name) else {
            return Err(ToolError::NotImplemented(name.to_string()));
        };

        let credential = self
            .session
            .get_valid_credential(&descriptor.scopes())
            .await
            .map_err(|e| {
                warn!("Tool {} aborted: {}", name, e);
                ToolError::Auth(e)
            })?;

        info!("Calling tool {}", name);
        let session = AuthorizedSession::new(credential);
        handler.call(&session, Value::Object(arguments)).await
    }
}

/// Check arguments against the top level of a tool's JSON schema:
/// an object carrying every required field, with declared primitive types.
fn validate_arguments(schema: &Value, arguments: Value) -> Result<Map<String, Value>, ToolError> {
    let arguments = match arguments {
        Value::Null => Map::new(),
        Value::Object(map) => map,
        other => {
            return Err(ToolError::InvalidParams(format!(
                "arguments must be an object, got {}",
                json_type(&other)
            )))
        }
    };

    if let Some(required) = schema.get("required").and_then(Value::as_array) {
        for field in required.iter().filter_map(Value::as_str) {
            if !arguments.contains_key(field) {
                return Err(ToolError::InvalidParams(format!(
                    "missing required field: {}",
                    field
                )));
            }
        }
    }

    if let Some(properties) = schema.get("properties").and_then(Value::as_object) {
        for (field, value) in &arguments {
            let Some(expected) = properties
                .get(field)
                .and_then(|p| p.get("type"))
                .and_then(Value::as_str)
            else {
                continue;
            };
            if !type_matches(expected, value) {
                return Err(ToolError::InvalidParams(format!(
                    "field {} must be {}, got {}",
                    field,
                    expected,
                    json_type(value)
                )));
            }
        }
    }

    Ok(arguments)
}

fn type_matches(expected: &str, value: &Value) -> bool {
    match expected {
        "string" => value.is_string(),
        "integer" => value.is_i64() || value.is_u64(),
        "number" => value.is_number(),
        "boolean" => value.is_boolean(),
        "array" => value.is_array(),
        "object" => value.is_object(),
        _ => true,
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

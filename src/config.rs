//! Configuration management
//!
//! An adapter is configured from a JSON-shaped value, supplied either
//! directly or by a factory that is called once at construction time.
//! The value goes through three steps:
//! 1. Resolution ([`ConfigSource::resolve`])
//! 2. Defaulting of absent keys ([`apply_defaults`])
//! 3. Validation into a typed [`RedditOAuthConfig`]
//!
//! [`load_config_source`] builds the value from a config file and
//! environment variables (`REDDIT_OAUTH__*`).

use std::fmt;
use std::sync::Arc;

use serde_json::{Map, Value};

use crate::client::Params;
use crate::error::AdapterError;

pub const DEFAULT_AUTHORIZE_HOST: &str = "https://www.reddit.com";
pub const DEFAULT_AUTHORIZE_PATH: &str = "/api/v1/authorize";
pub const DEFAULT_TOKEN_HOST: &str = "https://www.reddit.com";
pub const DEFAULT_TOKEN_PATH: &str = "/api/v1/access_token";
pub const DEFAULT_SCOPE: &str = "identity";

/// Required string fields, checked in this order.
const REQUIRED_FIELDS: [&str; 4] = ["client_id", "client_secret", "callback_url", "state"];

/// Where the adapter configuration comes from
#[derive(Clone)]
pub enum ConfigSource {
    /// A configuration value known up front
    Static(Value),
    /// A producer called once when the adapter is created
    Factory(Arc<dyn Fn() -> Value + Send + Sync>),
}

impl ConfigSource {
    pub fn factory<F>(f: F) -> Self
    where
        F: Fn() -> Value + Send + Sync + 'static,
    {
        ConfigSource::Factory(Arc::new(f))
    }

    /// Resolve to a concrete configuration value
    pub fn resolve(self) -> Value {
        match self {
            ConfigSource::Static(value) => value,
            ConfigSource::Factory(produce) => produce(),
        }
    }
}

impl From<Value> for ConfigSource {
    fn from(value: Value) -> Self {
        ConfigSource::Static(value)
    }
}

impl fmt::Debug for ConfigSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigSource::Static(_) => f.write_str("ConfigSource::Static(..)"),
            ConfigSource::Factory(_) => f.write_str("ConfigSource::Factory(..)"),
        }
    }
}

/// Requested permission set
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scope {
    Single(String),
    List(Vec<String>),
}

impl Scope {
    /// Render as a single query value. Reddit accepts space-separated scopes.
    pub fn to_param(&self) -> String {
        match self {
            Scope::Single(scope) => scope.clone(),
            Scope::List(scopes) => scopes.join(" "),
        }
    }
}

impl Default for Scope {
    fn default() -> Self {
        Scope::List(vec![DEFAULT_SCOPE.to_string()])
    }
}

/// Reddit authorize/token endpoints
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub authorize_host: String,
    pub authorize_path: String,
    pub token_host: String,
    pub token_path: String,
}

impl Endpoints {
    pub fn authorize_url(&self) -> String {
        format!("{}{}", self.authorize_host, self.authorize_path)
    }

    pub fn token_url(&self) -> String {
        format!("{}{}", self.token_host, self.token_path)
    }
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            authorize_host: DEFAULT_AUTHORIZE_HOST.to_string(),
            authorize_path: DEFAULT_AUTHORIZE_PATH.to_string(),
            token_host: DEFAULT_TOKEN_HOST.to_string(),
            token_path: DEFAULT_TOKEN_PATH.to_string(),
        }
    }
}

/// Validated adapter configuration
#[derive(Clone)]
pub struct RedditOAuthConfig {
    pub client_id: String,
    pub client_secret: String,
    /// Redirect URI registered with the Reddit app
    pub callback_url: String,
    /// Static state value shared by every authorization attempt
    pub state: String,
    /// `None` when the caller explicitly set `scope` to null
    pub scope: Option<Scope>,
    /// Attach token exchange failures to the request instead of aborting
    pub return_error: bool,
    pub endpoints: Endpoints,
    pub authorize_options: Params,
    pub token_options: Params,
    /// User-Agent sent on token requests; Reddit throttles generic agents
    pub user_agent: Option<String>,
}

impl fmt::Debug for RedditOAuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedditOAuthConfig")
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .field("callback_url", &self.callback_url)
            .field("state", &self.state)
            .field("scope", &self.scope)
            .field("return_error", &self.return_error)
            .field("endpoints", &self.endpoints)
            .field("authorize_options", &self.authorize_options)
            .field("token_options", &self.token_options)
            .field("user_agent", &self.user_agent)
            .finish()
    }
}

/// Fill in `scope` and `return_error` when the keys are absent.
///
/// Keys that are present keep their value, including `false`, `""` and null.
pub fn apply_defaults(config: &mut Map<String, Value>) {
    config
        .entry("scope")
        .or_insert_with(|| Value::Array(vec![Value::String(DEFAULT_SCOPE.to_string())]));
    config
        .entry("return_error")
        .or_insert(Value::Bool(false));
}

impl RedditOAuthConfig {
    /// Resolve, default and validate a configuration source
    pub fn from_source(source: impl Into<ConfigSource>) -> Result<Self, AdapterError> {
        Self::from_value(source.into().resolve())
    }

    /// Default and validate a configuration value
    ///
    /// # Errors
    /// The first problem found, required fields first in declared order,
    /// then `scope`, then the optional fields.
    pub fn from_value(value: Value) -> Result<Self, AdapterError> {
        let mut map = match value {
            Value::Object(map) => map,
            other => {
                return Err(AdapterError::TypeConfig {
                    field: "config".to_string(),
                    expected: "object",
                    actual: type_name(&other),
                });
            }
        };
        apply_defaults(&mut map);

        for field in REQUIRED_FIELDS {
            match map.get(field) {
                None => return Err(AdapterError::MissingConfig { field }),
                Some(value) if is_falsy(value) => {
                    return Err(AdapterError::MissingConfig { field });
                }
                Some(Value::String(_)) => {}
                Some(other) => {
                    return Err(AdapterError::TypeConfig {
                        field: field.to_string(),
                        expected: "string",
                        actual: type_name(other),
                    });
                }
            }
        }

        let scope = parse_scope(map.get("scope"))?;
        let return_error = match map.get("return_error") {
            None | Some(Value::Null) => false,
            Some(Value::Bool(flag)) => *flag,
            Some(other) => {
                return Err(AdapterError::TypeConfig {
                    field: "return_error".to_string(),
                    expected: "boolean",
                    actual: type_name(other),
                });
            }
        };

        let endpoints = Endpoints {
            authorize_host: optional_string(&map, "authorize_host")?
                .unwrap_or_else(|| DEFAULT_AUTHORIZE_HOST.to_string()),
            authorize_path: optional_string(&map, "authorize_path")?
                .unwrap_or_else(|| DEFAULT_AUTHORIZE_PATH.to_string()),
            token_host: optional_string(&map, "token_host")?
                .unwrap_or_else(|| DEFAULT_TOKEN_HOST.to_string()),
            token_path: optional_string(&map, "token_path")?
                .unwrap_or_else(|| DEFAULT_TOKEN_PATH.to_string()),
        };
        let authorize_options = optional_object(&map, "authorize_options")?;
        let token_options = optional_object(&map, "token_options")?;
        let user_agent = optional_string(&map, "user_agent")?;

        Ok(Self {
            client_id: required_string(&map, "client_id"),
            client_secret: required_string(&map, "client_secret"),
            callback_url: required_string(&map, "callback_url"),
            state: required_string(&map, "state"),
            scope,
            return_error,
            endpoints,
            authorize_options,
            token_options,
            user_agent,
        })
    }
}

/// Falsy in the sense of a loosely typed config file: null, false, 0 or "".
fn is_falsy(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(flag) => !flag,
        Value::Number(n) => n.as_f64().is_none_or(|n| n == 0.0 || n.is_nan()),
        Value::String(s) => s.is_empty(),
        Value::Array(_) | Value::Object(_) => false,
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn required_string(map: &Map<String, Value>, field: &str) -> String {
    map.get(field)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

fn parse_scope(value: Option<&Value>) -> Result<Option<Scope>, AdapterError> {
    let value = match value {
        None => return Ok(Some(Scope::default())),
        Some(value) => value,
    };
    match value {
        Value::Null => Ok(None),
        Value::String(scope) => Ok(Some(Scope::Single(scope.clone()))),
        Value::Array(items) => {
            let mut scopes = Vec::with_capacity(items.len());
            for (index, item) in items.iter().enumerate() {
                match item {
                    Value::String(scope) => scopes.push(scope.clone()),
                    other => {
                        return Err(AdapterError::TypeConfig {
                            field: format!("scope[{index}]"),
                            expected: "string",
                            actual: type_name(other),
                        });
                    }
                }
            }
            Ok(Some(Scope::List(scopes)))
        }
        // `false` and `0` are sent verbatim.
        other if is_falsy(other) => Ok(Some(Scope::Single(other.to_string()))),
        other => Err(AdapterError::TypeConfig {
            field: "scope".to_string(),
            expected: "array or string",
            actual: type_name(other),
        }),
    }
}

/// An optional string field; null and "" fall back to the default.
fn optional_string(map: &Map<String, Value>, field: &str) -> Result<Option<String>, AdapterError> {
    match map.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) if s.is_empty() => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(other) => Err(AdapterError::TypeConfig {
            field: field.to_string(),
            expected: "string",
            actual: type_name(other),
        }),
    }
}

fn optional_object(map: &Map<String, Value>, field: &str) -> Result<Params, AdapterError> {
    match map.get(field) {
        None | Some(Value::Null) => Ok(Params::new()),
        Some(Value::Object(options)) => Ok(options.clone()),
        Some(other) => Err(AdapterError::TypeConfig {
            field: field.to_string(),
            expected: "object",
            actual: type_name(other),
        }),
    }
}

/// Load the configuration value from file and environment
///
/// # Loading Order
/// 1. config/reddit_oauth.{toml,json,yaml} (if exists)
/// 2. Environment variables (REDDIT_OAUTH__*)
///
/// Validation is left to [`RedditOAuthConfig::from_value`].
///
/// # Errors
/// Returns error if a source cannot be read or parsed
pub fn load_config_source() -> Result<ConfigSource, AdapterError> {
    use config::{Config, Environment, File};

    let settings = Config::builder()
        .add_source(File::with_name("config/reddit_oauth").required(false))
        .add_source(Environment::with_prefix("REDDIT_OAUTH").separator("__"))
        .build()?;

    let mut value: Value = settings.clone().try_deserialize()?;

    // Environment values arrive as strings.
    if let Some(map) = value.as_object_mut() {
        if matches!(map.get("return_error"), Some(Value::String(_))) {
            let flag = settings.get_bool("return_error")?;
            map.insert("return_error".to_string(), Value::Bool(flag));
        }
        // The logging table configures the binary, not the adapter.
        map.remove("logging");
    }

    Ok(ConfigSource::Static(value))
}

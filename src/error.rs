//! Classified errors.
//!
//! Every failure that leaves the crate is an [`AppError`]: a stable
//! machine-readable [`ErrorCode`], an HTTP-style status code, optional
//! structured context and an optional wrapped cause.

use std::any::Any;
use std::collections::BTreeMap;
use std::error::Error as StdError;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

/// Boxed error used for causes and driver failures.
pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// Structured context attached to an error.
pub type Context = BTreeMap<String, Value>;

/// Result type for client operations.
pub type Result<T> = std::result::Result<T, AppError>;

/// Stable error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // General errors
    InternalError,
    ValidationError,
    NotFound,
    Unauthorized,
    Forbidden,

    // Database errors
    DatabaseConnectionError,
    DatabaseQueryError,
    DatabaseTransactionError,

    // API errors
    ApiRateLimit,
    ApiTimeout,
    ApiBadRequest,
}

impl ErrorCode {
    /// The wire name of this code, e.g. `DATABASE_QUERY_ERROR`.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::InternalError => "INTERNAL_ERROR",
            ErrorCode::ValidationError => "VALIDATION_ERROR",
            ErrorCode::NotFound => "NOT_FOUND",
            ErrorCode::Unauthorized => "UNAUTHORIZED",
            ErrorCode::Forbidden => "FORBIDDEN",
            ErrorCode::DatabaseConnectionError => "DATABASE_CONNECTION_ERROR",
            ErrorCode::DatabaseQueryError => "DATABASE_QUERY_ERROR",
            ErrorCode::DatabaseTransactionError => "DATABASE_TRANSACTION_ERROR",
            ErrorCode::ApiRateLimit => "API_RATE_LIMIT",
            ErrorCode::ApiTimeout => "API_TIMEOUT",
            ErrorCode::ApiBadRequest => "API_BAD_REQUEST",
        }
    }

    /// Default HTTP-style status for this code.
    pub fn default_status(&self) -> u16 {
        match self {
            ErrorCode::ValidationError | ErrorCode::ApiBadRequest => 400,
            ErrorCode::Unauthorized => 401,
            ErrorCode::Forbidden => 403,
            ErrorCode::NotFound => 404,
            ErrorCode::ApiTimeout => 408,
            ErrorCode::ApiRateLimit => 429,
            ErrorCode::DatabaseConnectionError => 503,
            ErrorCode::InternalError
            | ErrorCode::DatabaseQueryError
            | ErrorCode::DatabaseTransactionError => 500,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// AppError
// ============================================================================

/// A classified error.
#[derive(Debug)]
pub struct AppError {
    code: ErrorCode,
    message: String,
    status_code: u16,
    context: Option<Context>,
    cause: Option<BoxError>,
    timestamp: DateTime<Utc>,
}

impl AppError {
    /// Create an error with the code's default status.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            status_code: code.default_status(),
            context: None,
            cause: None,
            timestamp: Utc::now(),
        }
    }

    /// Override the status code.
    pub fn with_status(mut self, status_code: u16) -> Self {
        self.status_code = status_code;
        self
    }

    /// Attach a context entry.
    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.context
            .get_or_insert_with(Context::new)
            .insert(key.into(), value.into());
        self
    }

    /// Attach the underlying cause.
    pub fn with_cause(mut self, cause: impl Into<BoxError>) -> Self {
        self.cause = Some(cause.into());
        self
    }

    pub fn code(&self) -> ErrorCode {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn status_code(&self) -> u16 {
        self.status_code
    }

    pub fn context(&self) -> Option<&Context> {
        self.context.as_ref()
    }

    /// Look up a single context entry.
    pub fn context_value(&self, key: &str) -> Option<&Value> {
        self.context.as_ref().and_then(|ctx| ctx.get(key))
    }

    pub fn cause(&self) -> Option<&(dyn StdError + Send + Sync + 'static)> {
        self.cause.as_deref()
    }

    /// When the error was created.
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// JSON representation suitable for API responses and logs.
    pub fn to_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    // ------------------------------------------------------------------------
    // Factories
    // ------------------------------------------------------------------------

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ValidationError, message)
    }

    /// `"<resource> not found"`, with `": <id>"` appended when an id is given.
    pub fn not_found(resource: &str, id: Option<&str>) -> Self {
        let message = match id {
            Some(id) => format!("{} not found: {}", resource, id),
            None => format!("{} not found", resource),
        };
        let err = Self::new(ErrorCode::NotFound, message).with_context("resource", resource);
        match id {
            Some(id) => err.with_context("id", id),
            None => err,
        }
    }

    pub fn unauthorized() -> Self {
        Self::new(ErrorCode::Unauthorized, "Unauthorized")
    }

    pub fn forbidden() -> Self {
        Self::new(ErrorCode::Forbidden, "Forbidden")
    }

    pub fn database_connection(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::DatabaseConnectionError, message)
    }

    /// Query failure; the SQL text is kept under the `query` context key.
    pub fn database_query(message: impl Into<String>, query: &str) -> Self {
        Self::new(ErrorCode::DatabaseQueryError, message).with_context("query", query)
    }

    pub fn database_transaction(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::DatabaseTransactionError, message)
    }

    pub fn rate_limit() -> Self {
        Self::new(ErrorCode::ApiRateLimit, "Rate limit exceeded")
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ApiTimeout, message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ApiBadRequest, message)
    }

    /// Normalize a panic payload (or any other non-error value).
    pub fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        let detail = payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned());

        let err = Self::internal("An unknown error occurred");
        match detail {
            Some(detail) => err.with_context("panic", detail),
            None => err,
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl StdError for AppError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.cause
            .as_deref()
            .map(|cause| cause as &(dyn StdError + 'static))
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AppErrorJson<'a> {
    name: &'static str,
    code: ErrorCode,
    message: &'a str,
    status_code: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    context: Option<&'a Context>,
    #[serde(skip_serializing_if = "Option::is_none")]
    cause: Option<String>,
    timestamp: DateTime<Utc>,
}

impl Serialize for AppError {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        AppErrorJson {
            name: "AppError",
            code: self.code,
            message: &self.message,
            status_code: self.status_code,
            context: self.context.as_ref(),
            cause: self.cause.as_ref().map(|c| c.to_string()),
            timestamp: self.timestamp,
        }
        .serialize(serializer)
    }
}

// ============================================================================
// Classification helpers
// ============================================================================

/// Check whether an error value is an [`AppError`].
pub fn is_app_error(error: &(dyn StdError + 'static)) -> bool {
    error.is::<AppError>()
}

/// Coerce any error into an [`AppError`].
///
/// `AppError`s pass through untouched; everything else becomes an
/// `INTERNAL_ERROR` that keeps the original as its cause.
pub fn handle_error<E>(error: E) -> AppError
where
    E: Into<BoxError>,
{
    match error.into().downcast::<AppError>() {
        Ok(app) => *app,
        Err(other) => AppError::internal(other.to_string()).with_cause(other),
    }
}

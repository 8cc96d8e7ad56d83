use serde_json::Value;
use thiserror::Error;

/// Errors raised while talking to the document service.
///
/// The type is `Clone` because one in-flight read can be awaited by several
/// callers and each of them receives the same outcome.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ApiError {
    #[error("request failed with status {status}{}", detail_suffix(.body))]
    Status { status: u16, body: Option<Value> },

    #[error("session expired or missing")]
    Unauthorized,

    #[error("network error: {0}")]
    Network(String),

    #[error("failed to decode response: {0}")]
    Decode(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

fn detail_suffix(body: &Option<Value>) -> String {
    match body.as_ref().and_then(message_of) {
        Some(message) => format!(": {}", message),
        None => String::new(),
    }
}

fn message_of(body: &Value) -> Option<String> {
    body.get("message")
        .or_else(|| body.get("error"))
        .and_then(Value::as_str)
        .map(str::to_string)
}

impl ApiError {
    /// Builds the error for a non-2xx response. 401 is the session error.
    pub fn from_status(status: u16, body: Option<Value>) -> Self {
        if status == 401 {
            ApiError::Unauthorized
        } else {
            ApiError::Status { status, body }
        }
    }

    pub fn with_message(status: u16, message: &str) -> Self {
        Self::from_status(status, Some(serde_json::json!({ "message": message })))
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Status { status, .. } => Some(*status),
            ApiError::Unauthorized => Some(401),
            _ => None,
        }
    }

    pub fn is_session_error(&self) -> bool {
        matches!(self, ApiError::Unauthorized)
    }

    /// Human readable message, preferring the server supplied one.
    pub fn user_message(&self) -> String {
        match self {
            ApiError::Status { body: Some(body), .. } => {
                message_of(body).unwrap_or_else(|| self.to_string())
            }
            _ => self.to_string(),
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ApiError::Decode(err.to_string())
        } else if let Some(status) = err.status() {
            ApiError::from_status(status.as_u16(), None)
        } else if err.is_builder() {
            ApiError::InvalidRequest(err.to_string())
        } else {
            ApiError::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        ApiError::Decode(err.to_string())
    }
}

/// Where a failed request is being shown to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSurface {
    /// Resolving a protected view as a whole.
    ProtectedView,
    /// A list or detail panel inside an already resolved view.
    Inline,
}

/// What the front end should do with a propagated error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorDisposition {
    RedirectToLogin,
    Retry,
    Fatal,
}

impl ErrorDisposition {
    pub fn of(err: &ApiError, surface: ErrorSurface) -> Self {
        if err.is_session_error() {
            return ErrorDisposition::RedirectToLogin;
        }
        match surface {
            ErrorSurface::Inline => ErrorDisposition::Retry,
            ErrorSurface::ProtectedView => ErrorDisposition::Fatal,
        }
    }
}

/// An event arrived in a state that does not accept it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("cannot {event} while {state}")]
pub struct TransitionError {
    pub state: &'static str,
    pub event: &'static str,
}

impl TransitionError {
    pub fn new(state: &'static str, event: &'static str) -> Self {
        Self { state, event }
    }
}

/// An upload that was refused locally or by the service.
#[derive(Debug, Clone, Error)]
pub enum UploadError {
    #[error("{}", .0.join("; "))]
    Rejected(Vec<String>),

    #[error(transparent)]
    Api(#[from] ApiError),
}

impl UploadError {
    pub fn messages(&self) -> Vec<String> {
        match self {
            UploadError::Rejected(errors) => errors.clone(),
            UploadError::Api(err) => vec![err.user_message()],
        }
    }
}

use thiserror::Error;

/// Classification of identity-provider failures, keyed on the provider's error code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentityErrorKind {
    UsernameExists,
    CodeMismatch,
    ExpiredCode,
    NotAuthorized,
    UserNotFound,
    UserNotConfirmed,
    InvalidPassword,
    InvalidParameter,
    LimitExceeded,
    TooManyRequests,
    Other,
}

impl IdentityErrorKind {
    pub fn from_code(code: Option<&str>) -> Self {
        match code {
            Some("UsernameExistsException") => Self::UsernameExists,
            Some("CodeMismatchException") => Self::CodeMismatch,
            Some("ExpiredCodeException") => Self::ExpiredCode,
            Some("NotAuthorizedException") => Self::NotAuthorized,
            Some("UserNotFoundException") => Self::UserNotFound,
            Some("UserNotConfirmedException") => Self::UserNotConfirmed,
            Some("InvalidPasswordException") => Self::InvalidPassword,
            Some("InvalidParameterException") => Self::InvalidParameter,
            Some("LimitExceededException") => Self::LimitExceeded,
            Some("TooManyRequestsException") | Some("TooManyFailedAttemptsException") => {
                Self::TooManyRequests
            }
            _ => Self::Other,
        }
    }
}

#[derive(Error, Debug)]
pub enum Be3Error {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("Validation error: {}", .0.join(", "))]
    ValidationError(Vec<String>),

    #[error("Identity provider error ({code}): {message}")]
    IdentityProvider {
        kind: IdentityErrorKind,
        code: String,
        message: String,
    },

    #[error("DynamoDB error: {0}")]
    DynamoDBError(String),

    #[error("Reseller API error: {0}")]
    ResellerApiError(String),

    #[error("Storage error ({code}): {message}")]
    StorageError { code: String, message: String },

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

impl Be3Error {
    /// Envelope status code this error is reported with.
    pub fn status_code(&self) -> u16 {
        match self {
            Be3Error::NotFound(_) => 404,
            Be3Error::Conflict(_) => 409,
            Be3Error::BadRequest(_) | Be3Error::ValidationError(_) => 400,
            Be3Error::Unauthorized(_) => 401,
            Be3Error::Forbidden(_) => 403,
            Be3Error::IdentityProvider { kind, .. } => match kind {
                IdentityErrorKind::UsernameExists => 409,
                IdentityErrorKind::UserNotFound => 404,
                IdentityErrorKind::NotAuthorized => 401,
                _ => 400,
            },
            Be3Error::StorageError { code, .. } => match code.as_str() {
                "BucketAlreadyExists" | "BucketAlreadyOwnedByYou" => 409,
                "NoSuchBucket" | "NoSuchKey" => 404,
                _ => 400,
            },
            Be3Error::DynamoDBError(_)
            | Be3Error::ResellerApiError(_)
            | Be3Error::SerializationError(_)
            | Be3Error::ConfigurationError(_)
            | Be3Error::InternalError(_) => 500,
        }
    }

    /// Only server-side failures carry the detail in the response data.
    pub fn is_server_error(&self) -> bool {
        self.status_code() >= 500
    }

    pub fn identity_kind(&self) -> Option<IdentityErrorKind> {
        match self {
            Be3Error::IdentityProvider { kind, .. } => Some(*kind),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for Be3Error {
    fn from(err: serde_json::Error) -> Self {
        Be3Error::SerializationError(err.to_string())
    }
}

impl From<serde_dynamo::Error> for Be3Error {
    fn from(err: serde_dynamo::Error) -> Self {
        Be3Error::SerializationError(err.to_string())
    }
}

impl From<reqwest::Error> for Be3Error {
    fn from(err: reqwest::Error) -> Self {
        Be3Error::ResellerApiError(err.to_string())
    }
}

pub type Be3Result<T> = Result<T, Be3Error>;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use be3_shared::Be3Error;
use serde::Serialize;
use serde_json::Value;
use tracing::error;

/// Uniform `{statusCode, data, msg}` body returned by every route
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ApiResponse {
    #[serde(rename = "statusCode")]
    pub status_code: u16,
    pub data: Value,
    pub msg: String,
}

pub type HandlerResult = Result<ApiResponse, ApiResponse>;

/// Empty payloads of any JSON type are reported as `[]`
fn normalize(data: Value) -> Value {
    let empty = match &data {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
    };
    if empty {
        Value::Array(Vec::new())
    } else {
        data
    }
}

impl ApiResponse {
    pub fn new(status_code: u16, data: impl Serialize, msg: impl Into<String>) -> Self {
        let msg = msg.into();
        Self {
            status_code,
            data: normalize(serde_json::to_value(data).unwrap_or_default()),
            msg: if msg.is_empty() { "Success".to_string() } else { msg },
        }
    }

    pub fn success(data: impl Serialize, msg: impl Into<String>) -> Self {
        Self::new(200, data, msg)
    }

    pub fn created(data: impl Serialize, msg: impl Into<String>) -> Self {
        Self::new(201, data, msg)
    }

    pub fn bad_request(data: impl Serialize, msg: impl Into<String>) -> Self {
        Self::new(400, data, msg)
    }

    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::new(401, Value::Null, msg)
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::new(403, Value::Null, msg)
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::new(404, Value::Null, msg)
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::new(409, Value::Null, msg)
    }

    pub fn server_error(detail: impl Into<String>) -> Self {
        Self::new(500, Value::String(detail.into()), "Something went wrong")
    }
}

impl IntoResponse for ApiResponse {
    fn into_response(self) -> Response {
        // 201 bodies go out with a plain 200
        let status = match self.status_code {
            201 => StatusCode::OK,
            code => StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
        };
        (status, Json(self)).into_response()
    }
}

impl From<Be3Error> for ApiResponse {
    fn from(err: Be3Error) -> Self {
        let status = err.status_code();
        match err {
            Be3Error::ValidationError(errors) => ApiResponse::bad_request(errors, "Validation error"),
            Be3Error::IdentityProvider { message, .. } => ApiResponse::new(status, Value::Null, message),
            err if err.is_server_error() => {
                error!("Request failed: {}", err);
                ApiResponse::server_error(err.to_string())
            }
            err => ApiResponse::new(status, Value::Null, err.to_string()),
        }
    }
}

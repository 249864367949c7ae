use axum::extract::{FromRequest, FromRequestParts, Query, Request};
use axum::http::request::Parts;
use axum::Json;
use be3_shared::Be3Error;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::response::ApiResponse;

/// Field checks run after deserialization; an empty list means valid
pub trait Validate {
    fn validate(&self) -> Vec<String>;
}

fn check(errors: Vec<String>) -> Result<(), ApiResponse> {
    if errors.is_empty() {
        Ok(())
    } else {
        Err(Be3Error::ValidationError(errors).into())
    }
}

/// JSON body that deserialized and passed validation
pub struct ValidJson<T>(pub T);

impl<S, T> FromRequest<S> for ValidJson<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Validate + Send,
{
    type Rejection = ApiResponse;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection| ApiResponse::bad_request(Value::Null, rejection.body_text()))?;
        check(value.validate())?;
        Ok(Self(value))
    }
}

/// Query string that deserialized and passed validation
pub struct ValidQuery<T>(pub T);

impl<S, T> FromRequestParts<S> for ValidQuery<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Validate + Send,
{
    type Rejection = ApiResponse;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(value) = Query::<T>::from_request_parts(parts, state)
            .await
            .map_err(|rejection| ApiResponse::bad_request(Value::Null, rejection.body_text()))?;
        check(value.validate())?;
        Ok(Self(value))
    }
}

use crate::api::v1::handler::ApiResponse;
use crate::application_port::*;
use serde::Serialize;
use std::convert::Infallible;
use thiserror::Error;
use crate::logger::*;
use warp::http::StatusCode;
use warp::reply::Response;
use warp::{Rejection, Reply, reject};

pub async fn recover_error(err: Rejection) -> Result<impl warp::Reply, Infallible> {
    let api_error = if let Some(err) = err.find::<ApiError>() {
        err.clone()
    } else if let Some(e) = err.find::<warp::filters::body::BodyDeserializeError>() {
        ApiError::new(ApiErrorCode::InvalidInput, e.to_string())
    } else if err.find::<reject::PayloadTooLarge>().is_some() {
        ApiError::new(ApiErrorCode::InvalidInput, "payload too large")
    } else if err.is_not_found() {
        ApiError::from(ApiErrorCode::NotFound)
    } else if err.find::<reject::MethodNotAllowed>().is_some() {
        ApiError::from(ApiErrorCode::MethodNotAllowed)
    } else {
        error!(rejection = ?err, "unhandled rejection");
        ApiError::from(ApiErrorCode::InternalError)
    };
    Ok(api_error.into_response())
}

#[derive(Debug, Clone, Serialize)]
pub struct ApiError {
    pub code: ApiErrorCode,
    pub message: String,
}

impl ApiError {
    pub fn new(code: ApiErrorCode, message: impl Into<String>) -> Self {
        ApiError {
            code,
            message: message.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        self.code.status()
    }
}

impl From<ApiErrorCode> for ApiError {
    fn from(code: ApiErrorCode) -> Self {
        ApiError::new(code, code.to_string())
    }
}

impl reject::Reject for ApiError {}

impl Reply for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let json = warp::reply::json(&ApiResponse::<()>::err(self));
        warp::reply::with_status(json, status).into_response()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error, Serialize)]
pub enum ApiErrorCode {
    #[error("Invalid input")]
    InvalidInput,
    #[error("User already exists")]
    ExistingUser,
    #[error("Wrong credentials")]
    WrongCredentials,
    #[error("invalid token")]
    InvalidToken,
    #[error("Concurrent update, retry the request")]
    Conflict,
    #[error("Not found")]
    NotFound,
    #[error("Method not allowed")]
    MethodNotAllowed,
    #[error("Internal error")]
    InternalError,
}

impl ApiErrorCode {
    pub fn status(self) -> StatusCode {
        match self {
            ApiErrorCode::InvalidInput
            | ApiErrorCode::ExistingUser
            | ApiErrorCode::WrongCredentials => StatusCode::BAD_REQUEST,
            ApiErrorCode::InvalidToken => StatusCode::UNAUTHORIZED,
            ApiErrorCode::Conflict => StatusCode::CONFLICT,
            ApiErrorCode::NotFound => StatusCode::NOT_FOUND,
            ApiErrorCode::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            ApiErrorCode::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn internal<E: std::fmt::Display>(error: E) -> ApiErrorCode {
        warn!("Internal error: {}", error);
        ApiErrorCode::InternalError
    }
}

impl From<AuthError> for ApiError {
    fn from(error: AuthError) -> Self {
        match error {
            AuthError::Validation(message) => ApiError::new(ApiErrorCode::InvalidInput, message),
            AuthError::ExistingUser => ApiErrorCode::ExistingUser.into(),
            AuthError::WrongCredentials => ApiErrorCode::WrongCredentials.into(),
            AuthError::MalformedToken
            | AuthError::Unauthorized
            | AuthError::InvalidToken
            | AuthError::RefreshTokenMismatch
            | AuthError::UserNotFound => ApiErrorCode::InvalidToken.into(),
            AuthError::Conflict => ApiErrorCode::Conflict.into(),
            e @ (AuthError::SigningKeyNotFound(_)
            | AuthError::SecretNotFound(_)
            | AuthError::Store(_)
            | AuthError::InternalError(_)) => ApiErrorCode::internal(e).into(),
        }
    }
}

impl From<TokenError> for ApiError {
    fn from(error: TokenError) -> Self {
        AuthError::from(error).into()
    }
}

use super::cookie::*;
use super::error::*;
use crate::application_port::*;
use crate::domain_model::*;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use warp::http::StatusCode;
use warp::{Reply, reject};

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<ApiError>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        ApiResponse {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn err(error: ApiError) -> Self {
        ApiResponse {
            success: false,
            data: None,
            error: Some(error),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CredentialsRequest {
    #[serde(alias = "username")]
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<UserId>,
    pub access_token: String,
    pub access_token_expires_at: DateTime<Utc>,
}

fn token_reply(
    user_id: Option<UserId>,
    tokens: AuthTokens,
    cookies: CookiePolicy,
) -> warp::reply::Response {
    let set_cookies = [
        cookies.token_cookie(ACCESS_TOKEN_COOKIE, &tokens.access_token),
        cookies.token_cookie(REFRESH_TOKEN_COOKIE, &tokens.refresh_token),
    ];
    let body = TokenResponse {
        user_id,
        access_token: tokens.access_token.value,
        access_token_expires_at: tokens.access_token.expires_at,
    };
    with_cookies(warp::reply::json(&ApiResponse::ok(body)), &set_cookies)
}

pub async fn signup(
    body: CredentialsRequest,
    auth_service: Arc<dyn AuthService>,
) -> Result<impl warp::Reply, warp::Rejection> {
    let signup_input = SignupInput {
        username: body.email,
        password: body.password,
    };
    auth_service
        .signup(signup_input)
        .await
        .map_err(ApiError::from)
        .map_err(reject::custom)?;

    Ok(warp::reply::with_status(warp::reply(), StatusCode::CREATED))
}

pub async fn login(
    body: CredentialsRequest,
    auth_service: Arc<dyn AuthService>,
    cookies: CookiePolicy,
) -> Result<impl warp::Reply, warp::Rejection> {
    let login_input = LoginInput {
        username: body.email,
        password: body.password,
    };
    let login_result = auth_service
        .login(login_input)
        .await
        .map_err(ApiError::from)
        .map_err(reject::custom)?;

    Ok(token_reply(
        Some(login_result.user_id),
        login_result.tokens,
        cookies,
    ))
}

pub async fn refresh_token(
    refresh_token: Option<String>,
    auth_service: Arc<dyn AuthService>,
    cookies: CookiePolicy,
) -> Result<impl warp::Reply, warp::Rejection> {
    let refresh_token = refresh_token
        .filter(|t| !t.is_empty())
        .ok_or_else(|| reject::custom(ApiError::from(ApiErrorCode::InvalidToken)))?;

    let tokens = auth_service
        .refresh_token(&refresh_token)
        .await
        .map_err(ApiError::from)
        .map_err(reject::custom)?;

    Ok(token_reply(None, tokens, cookies))
}

/// Both cookies are expired on every outcome, including failures.
pub async fn logout(
    refresh_token: Option<String>,
    access_token: Option<String>,
    auth_service: Arc<dyn AuthService>,
    cookies: CookiePolicy,
) -> Result<impl warp::Reply, warp::Rejection> {
    let logout_input = LogoutInput {
        refresh_token: refresh_token.filter(|t| !t.is_empty()),
        access_token: access_token.filter(|t| !t.is_empty()),
    };
    let response = match auth_service.logout(logout_input).await {
        Ok(()) => warp::reply::json(&ApiResponse::ok(())).into_response(),
        Err(e) => ApiError::from(e).into_response(),
    };

    let expired = [
        cookies.expired_cookie(ACCESS_TOKEN_COOKIE),
        cookies.expired_cookie(REFRESH_TOKEN_COOKIE),
    ];
    Ok(with_cookies(response, &expired))
}

pub async fn jwks(
    jwks_publisher: Arc<dyn JwksPublisher>,
) -> Result<impl warp::Reply, warp::Rejection> {
    let jwks = jwks_publisher
        .current_jwks()
        .await
        .map_err(ApiError::from)
        .map_err(reject::custom)?;
    Ok(warp::reply::json(&jwks))
}

pub async fn authorize(
    body: AuthorizerRequest,
    authorizer: Arc<dyn Authorizer>,
) -> Result<impl warp::Reply, warp::Rejection> {
    match authorizer.authorize(body).await {
        Ok(policy) => Ok(warp::reply::json(&policy)),
        Err(AuthorizerError::Unauthorized) => Err(reject::custom(ApiError::new(
            ApiErrorCode::InvalidToken,
            "Unauthorized",
        ))),
    }
}

use super::cookie::*;
use super::handler;
use crate::server::*;
use std::convert::Infallible;
use std::sync::Arc;
use warp::Filter;

const MAX_BODY_BYTES: u64 = 16 * 1024;

pub fn routes(
    server: Arc<Server>,
) -> impl Filter<Extract = (impl warp::Reply,), Error = warp::Rejection> + Clone {
    let cookies = CookiePolicy {
        secure: server.secure_cookies,
    };

    let signup = warp::path("auth")
        .and(warp::path("signup"))
        .and(warp::path::end())
        .and(warp::post())
        .and(json_body())
        .and(with(server.auth_service.clone()))
        .and_then(handler::signup);

    let login = warp::path("auth")
        .and(warp::path("login"))
        .and(warp::path::end())
        .and(warp::post())
        .and(json_body())
        .and(with(server.auth_service.clone()))
        .and(with_value(cookies))
        .and_then(handler::login);

    let token = warp::path("auth")
        .and(warp::path("token"))
        .and(warp::path::end())
        .and(warp::post())
        .and(warp::cookie::optional::<String>(REFRESH_TOKEN_COOKIE))
        .and(with(server.auth_service.clone()))
        .and(with_value(cookies))
        .and_then(handler::refresh_token);

    let logout = warp::path("auth")
        .and(warp::path("logout"))
        .and(warp::path::end())
        .and(warp::post())
        .and(warp::cookie::optional::<String>(REFRESH_TOKEN_COOKIE))
        .and(warp::cookie::optional::<String>(ACCESS_TOKEN_COOKIE))
        .and(with(server.auth_service.clone()))
        .and(with_value(cookies))
        .and_then(handler::logout);

    let jwks = warp::path("auth")
        .and(warp::path("jwks"))
        .and(warp::path::end())
        .and(warp::get())
        .and(with(server.jwks_publisher.clone()))
        .and_then(handler::jwks);

    let authorize = warp::path("auth")
        .and(warp::path("authorize"))
        .and(warp::path::end())
        .and(warp::post())
        .and(json_body())
        .and(with(server.authorizer.clone()))
        .and_then(handler::authorize);

    signup
        .or(login)
        .or(token)
        .or(logout)
        .or(jwks)
        .or(authorize)
}

fn json_body<T>() -> impl Filter<Extract = (T,), Error = warp::Rejection> + Clone
where
    T: serde::de::DeserializeOwned + Send + 'static,
{
    warp::body::content_length_limit(MAX_BODY_BYTES).and(warp::body::json())
}

fn with<ServiceType>(
    service: Arc<ServiceType>,
) -> impl Filter<Extract = (Arc<ServiceType>,), Error = Infallible> + Clone
where
    ServiceType: Send + Sync + ?Sized,
{
    warp::any().map(move || service.clone())
}

fn with_value<T>(value: T) -> impl Filter<Extract = (T,), Error = Infallible> + Clone
where
    T: Clone + Send + Sync + 'static,
{
    warp::any().map(move || value.clone())
}

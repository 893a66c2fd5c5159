use crate::domain_model::AuthToken;
use chrono::{DateTime, Utc};
use warp::Reply;
use warp::http::HeaderValue;
use warp::http::header::SET_COOKIE;
use warp::reply::Response;

pub const ACCESS_TOKEN_COOKIE: &str = "AccessToken";
pub const REFRESH_TOKEN_COOKIE: &str = "RefreshToken";

const HTTP_DATE: &str = "%a, %d %b %Y %H:%M:%S GMT";

/// Attributes shared by every token cookie we set.
#[derive(Debug, Clone, Copy)]
pub struct CookiePolicy {
    pub secure: bool,
}

impl CookiePolicy {
    fn attributes(&self) -> &'static str {
        if self.secure {
            "Path=/; HttpOnly; SameSite=Strict; Secure"
        } else {
            "Path=/; HttpOnly; SameSite=Strict"
        }
    }

    pub fn token_cookie(&self, name: &str, token: &AuthToken) -> String {
        let max_age = (token.expires_at - Utc::now()).num_seconds().max(0);
        format!(
            "{name}={}; Max-Age={max_age}; Expires={}; {}",
            token.value,
            token.expires_at.format(HTTP_DATE),
            self.attributes()
        )
    }

    /// An already-expired cookie, which makes the browser drop `name`.
    pub fn expired_cookie(&self, name: &str) -> String {
        format!(
            "{name}=; Max-Age=0; Expires={}; {}",
            DateTime::<Utc>::UNIX_EPOCH.format(HTTP_DATE),
            self.attributes()
        )
    }
}

pub fn with_cookies(reply: impl Reply, cookies: &[String]) -> Response {
    let mut response = reply.into_response();
    for cookie in cookies {
        if let Ok(value) = HeaderValue::from_str(cookie) {
            response.headers_mut().append(SET_COOKIE, value);
        }
    }
    response
}

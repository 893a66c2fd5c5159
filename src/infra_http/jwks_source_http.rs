use crate::domain_model::Jwks;
use crate::domain_port::*;
use crate::logger::*;
use crate::retry::{RetryError, RetryPolicy};
use std::time::Duration;

/// Fetches the key set from a JWKS endpoint, usually our own `/auth/jwks`.
pub struct HttpJwksSource {
    client: reqwest::Client,
    url: String,
    retry: RetryPolicy,
}

impl HttpJwksSource {
    pub fn new(url: impl Into<String>, timeout: Duration, retry: RetryPolicy) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::none())
            .build()?;
        Ok(HttpJwksSource {
            client,
            url: url.into(),
            retry,
        })
    }

    async fn fetch_once(&self) -> Result<Jwks, JwksError> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| JwksError::Fetch(e.to_string()))?;

        let status = response.status();
        if status.is_server_error() {
            return Err(JwksError::Fetch(format!("{} returned {status}", self.url)));
        }
        if !status.is_success() {
            return Err(JwksError::Decode(format!("{} returned {status}", self.url)));
        }

        response
            .json::<Jwks>()
            .await
            .map_err(|e| JwksError::Decode(e.to_string()))
    }
}

#[async_trait::async_trait]
impl JwksSource for HttpJwksSource {
    async fn fetch_jwks(&self) -> Result<Jwks, JwksError> {
        debug!(url = %self.url, "fetching jwks");
        self.retry
            .run("jwks_fetch", JwksError::is_transient, || self.fetch_once())
            .await
            .map_err(|e| match e {
                RetryError::Failed(e) => e,
                timeout @ RetryError::TimedOut { .. } => JwksError::Fetch(timeout.to_string()),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};
    use warp::Filter;
    use warp::http::StatusCode;

    const BODY: &str = r#"{"keys":[{"kty":"RSA","kid":"k1","use":"sig","n":"AQAB","e":"AQAB"}]}"#;

    /// Serves `status` for the first `failures` hits, then the key set.
    fn serve(failures: u32, status: StatusCode) -> (String, Arc<AtomicU32>) {
        let hits = Arc::new(AtomicU32::new(0));
        let counter = hits.clone();
        let route = warp::path!("auth" / "jwks").map(move || {
            let n = counter.fetch_add(1, Ordering::SeqCst);
            if n < failures {
                warp::reply::with_status(String::new(), status)
            } else {
                warp::reply::with_status(BODY.to_string(), StatusCode::OK)
            }
        });
        let (addr, server) = warp::serve(route).bind_ephemeral(([127, 0, 0, 1], 0));
        tokio::spawn(server);
        (format!("http://{addr}/auth/jwks"), hits)
    }

    fn fast_retry() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
            call_timeout: Duration::from_secs(2),
        }
    }

    #[tokio::test]
    async fn fetches_and_decodes_the_key_set() {
        let (url, hits) = serve(0, StatusCode::OK);
        let source = HttpJwksSource::new(url, Duration::from_secs(2), fast_retry()).unwrap();
        let jwks = source.fetch_jwks().await.unwrap();
        assert!(jwks.find("k1").is_some());
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn server_errors_are_retried() {
        let (url, hits) = serve(2, StatusCode::SERVICE_UNAVAILABLE);
        let source = HttpJwksSource::new(url, Duration::from_secs(2), fast_retry()).unwrap();
        assert!(source.fetch_jwks().await.is_ok());
        assert_eq!(hits.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn client_errors_fail_without_retry() {
        let (url, hits) = serve(5, StatusCode::NOT_FOUND);
        let source = HttpJwksSource::new(url, Duration::from_secs(2), fast_retry()).unwrap();
        let err = source.fetch_jwks().await.unwrap_err();
        assert!(matches!(err, JwksError::Decode(_)));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }
}

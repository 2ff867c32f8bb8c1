//! HTTP gateway to the remote catalog API.
//!
//! Wraps every outbound request: attaches the bearer token from the session
//! store, maps transport and status failures into a small error taxonomy,
//! and treats any 401 as a session-invalidating event. No retries happen
//! here or anywhere else; a failed request is a terminal outcome for that
//! attempt.

use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::ApiConfig;
use crate::session::SessionStore;

/// Failure categories for outbound requests.
///
/// Cloneable so a single failed fetch can be reported to every caller
/// coalesced onto it; the transport error is shared behind an `Arc`.
#[derive(Debug, Clone, thiserror::Error)]
pub enum GatewayError {
    /// The API answered 401; the session has already been cleared.
    #[error("Session expired. Please log in again.")]
    Auth,

    /// Any other non-2xx status.
    #[error("The server responded with an error ({status})")]
    Server { status: StatusCode },

    /// DNS, timeout, connection refused, or a body that failed to decode.
    #[error("Could not reach the server")]
    Network(#[source] Arc<reqwest::Error>),
}

impl GatewayError {
    pub fn is_auth(&self) -> bool {
        matches!(self, GatewayError::Auth)
    }

    fn network(e: reqwest::Error) -> Self {
        GatewayError::Network(Arc::new(e))
    }
}

/// Client for the catalog REST API.
pub struct ApiGateway {
    base_url: String,
    http: reqwest::Client,
    session: Arc<SessionStore>,
}

impl ApiGateway {
    pub fn new(config: &ApiConfig, session: Arc<SessionStore>) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(Duration::from_secs(config.request_timeout))
            .build()?;

        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            http,
            session,
        })
    }

    /// GET a JSON resource.
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, GatewayError> {
        self.request(Method::GET, path, &[], None::<&()>).await
    }

    /// GET a JSON resource with URL query parameters.
    pub async fn get_with_query<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, GatewayError> {
        self.request(Method::GET, path, query, None::<&()>).await
    }

    /// POST a JSON body and decode the JSON response.
    pub async fn post<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, GatewayError> {
        self.request(Method::POST, path, &[], Some(body)).await
    }

    /// PUT a JSON body and decode the JSON response.
    pub async fn put<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, GatewayError> {
        self.request(Method::PUT, path, &[], Some(body)).await
    }

    /// DELETE a resource. Tolerates an empty (204) response body.
    pub async fn delete(&self, path: &str) -> Result<(), GatewayError> {
        let response = self.dispatch(Method::DELETE, path, &[], None::<&()>).await?;
        self.check_status(&response)?;
        Ok(())
    }

    async fn request<B: Serialize, T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<&B>,
    ) -> Result<T, GatewayError> {
        let response = self.dispatch(method, path, query, body).await?;
        self.check_status(&response)?;
        response.json().await.map_err(GatewayError::network)
    }

    async fn dispatch<B: Serialize>(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<&B>,
    ) -> Result<reqwest::Response, GatewayError> {
        let url = format!("{}{}", self.base_url, path);
        debug!(%method, %url, "Dispatching API request");

        let mut builder = self.http.request(method, &url);

        if !query.is_empty() {
            builder = builder.query(query);
        }

        // The token is read lazily per request so a logout takes effect
        // on the next call without any coordination.
        if let Some(token) = self.session.token() {
            builder = builder.header("Authorization", format!("Bearer {}", token));
        }

        if let Some(body) = body {
            builder = builder.json(body);
        }

        builder.send().await.map_err(GatewayError::network)
    }

    fn check_status(&self, response: &reqwest::Response) -> Result<(), GatewayError> {
        let status = response.status();

        if status == StatusCode::UNAUTHORIZED {
            warn!("Received 401 from API, clearing session");
            self.session.logout();
            return Err(GatewayError::Auth);
        }

        if !status.is_success() {
            return Err(GatewayError::Server { status });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ApiConfig;

    #[test]
    fn test_invalid_user_agent_is_reported() {
        let config = ApiConfig {
            user_agent: "curatr\nbroken".to_string(),
            ..ApiConfig::default()
        };
        let session = Arc::new(SessionStore::in_memory());
        assert!(ApiGateway::new(&config, session).is_err());
    }

    #[test]
    fn test_trailing_slash_is_stripped_from_base_url() {
        let config = ApiConfig {
            base_url: "http://localhost:9000/".to_string(),
            ..ApiConfig::default()
        };
        let session = Arc::new(SessionStore::in_memory());
        let gateway = ApiGateway::new(&config, session).unwrap();
        assert_eq!(gateway.base_url, "http://localhost:9000");
    }
}

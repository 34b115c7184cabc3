//! HTTP client for the client-credentials token exchange

use loadkit_common::{LoadkitError, Result};
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

/// Token endpoint response; only the token itself is used
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

/// Performs `grant_type=client_credentials` exchanges
#[derive(Debug, Clone)]
pub struct TokenClient {
    client: Client,
}

impl TokenClient {
    /// Create a new token client
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| LoadkitError::config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { client })
    }

    /// Exchange client credentials for an access token.
    ///
    /// Every failure, transport or protocol, is reported as an auth error for
    /// `client_id`.
    pub async fn exchange(
        &self,
        client_id: &str,
        client_secret: &str,
        token_endpoint: &str,
    ) -> Result<String> {
        let form = [
            ("grant_type", "client_credentials"),
            ("client_id", client_id),
            ("client_secret", client_secret),
        ];

        let response = self
            .client
            .post(token_endpoint)
            .form(&form)
            .send()
            .await
            .map_err(|e| LoadkitError::auth(client_id, format!("token request failed: {}", e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| LoadkitError::auth(client_id, format!("failed to read token response: {}", e)))?;

        if !status.is_success() {
            return Err(LoadkitError::auth(
                client_id,
                format!("token endpoint returned {}", status),
            ));
        }

        let parsed: TokenResponse = serde_json::from_str(&body).map_err(|e| {
            LoadkitError::auth(client_id, format!("unparsable token response: {}", e))
        })?;

        if parsed.access_token.is_empty() {
            return Err(LoadkitError::auth(client_id, "token response has an empty access_token"));
        }

        debug!(client_id = %client_id, "Token exchange succeeded");
        Ok(parsed.access_token)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use wiremock::{
        matchers::{body_string_contains, header, method, path},
        Mock, MockServer, ResponseTemplate,
    };

    fn client() -> TokenClient {
        TokenClient::new(Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn test_exchange_sends_form_encoded_grant() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/oauth/token"))
            .and(header("content-type", "application/x-www-form-urlencoded"))
            .and(body_string_contains("grant_type=client_credentials"))
            .and(body_string_contains("client_id=svc-a"))
            .and(body_string_contains("client_secret=s3cret"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"access_token": "tok-1", "expires_in": 300})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let token = client()
            .exchange("svc-a", "s3cret", &format!("{}/oauth/token", server.uri()))
            .await
            .unwrap();
        assert_eq!(token, "tok-1");
    }

    #[tokio::test]
    async fn test_non_success_status_is_auth_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_string("invalid_client"))
            .mount(&server)
            .await;

        let err = client()
            .exchange("svc-a", "wrong", &server.uri())
            .await
            .unwrap_err();
        assert!(matches!(err, LoadkitError::Auth { ref client, .. } if client == "svc-a"));
        assert!(err.to_string().contains("401"));
    }

    #[tokio::test]
    async fn test_body_without_access_token_is_auth_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"token": "x"})))
            .mount(&server)
            .await;

        let err = client().exchange("svc-a", "s", &server.uri()).await.unwrap_err();
        assert_eq!(err.kind(), "auth");
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_auth_error() {
        // Port 9 (discard) is closed on test hosts
        let err = client()
            .exchange("svc-a", "s", "http://127.0.0.1:9/token")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "auth");
    }
}

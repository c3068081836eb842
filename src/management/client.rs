use crate::config::ConnectionConfig;
use crate::error::{Error, Result};
use crate::management::operation::{Operation, OperationResult};
use async_trait::async_trait;
use digest_auth::{AuthContext, WwwAuthenticateHeader};
use reqwest::StatusCode;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, WWW_AUTHENTICATE};
use std::sync::Mutex;
use std::time::Duration;

/// Request path of the HTTP management interface.
const MANAGEMENT_PATH: &str = "/management";

/// Transport-level access to a management endpoint.
///
/// Implementations send one operation and return the server's answer. A
/// failed outcome is **not** an error at this level; only failures to reach
/// the endpoint or to decode its answer are.
#[async_trait]
pub trait ManagementClient: Send + Sync {
    /// Executes an operation and returns the raw result.
    async fn execute(&self, operation: &Operation) -> Result<OperationResult>;

    /// Releases any resources held by the client.
    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

enum Authorization {
    Digest(String),
    Basic,
}

/// Management client speaking JSON over the HTTP management interface.
///
/// Credentials are only sent when the server asks for them. A `Digest`
/// challenge is answered and remembered, so later requests authenticate up
/// front; `Basic` is used when that is all the server offers.
pub struct HttpManagementClient {
    url: String,
    http: reqwest::Client,
    credentials: Option<(String, String)>,
    challenge: Mutex<Option<WwwAuthenticateHeader>>,
}

impl HttpManagementClient {
    /// Creates a client for the configured endpoint.
    pub fn new(config: &ConnectionConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_seconds))
            .build()
            .map_err(|e| Error::Connection(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            url: config.management_url(),
            http,
            credentials: config
                .username
                .clone()
                .map(|username| (username, config.password.clone().unwrap_or_default())),
            challenge: Mutex::new(None),
        })
    }

    /// The endpoint URL
    pub fn url(&self) -> &str {
        &self.url
    }

    async fn send(
        &self,
        body: &[u8],
        authorization: Option<&Authorization>,
    ) -> Result<reqwest::Response> {
        let mut request = self
            .http
            .post(&self.url)
            .header(CONTENT_TYPE, "application/json")
            .body(body.to_vec());
        match (authorization, &self.credentials) {
            (Some(Authorization::Digest(header)), _) => {
                request = request.header(AUTHORIZATION, header.as_str());
            }
            (Some(Authorization::Basic), Some((username, password))) => {
                request = request.basic_auth(username, Some(password));
            }
            _ => {}
        }

        request
            .send()
            .await
            .map_err(|e| Error::Connection(format!("Failed to reach {}: {}", self.url, e)))
    }

    /// Answers the remembered digest challenge, if any.
    fn cached_authorization(&self, body: &[u8]) -> Result<Option<Authorization>> {
        let Some((username, password)) = &self.credentials else {
            return Ok(None);
        };
        let Ok(mut challenge) = self.challenge.lock() else {
            return Ok(None);
        };
        match challenge.as_mut() {
            Some(prompt) => self
                .respond(prompt, username, password, body)
                .map(|header| Some(Authorization::Digest(header))),
            None => Ok(None),
        }
    }

    /// Picks the answer to the challenges of a 401 response.
    fn answer_challenge(&self, headers: &HeaderMap, body: &[u8]) -> Result<Option<Authorization>> {
        let Some((username, password)) = &self.credentials else {
            return Ok(None);
        };
        let challenges: Vec<&str> = headers
            .get_all(WWW_AUTHENTICATE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .collect();

        if let Some(digest) = challenges.iter().find(|c| has_scheme(c, "digest")) {
            let mut prompt = digest_auth::parse(digest).map_err(|e| {
                Error::Connection(format!("Invalid digest challenge from {}: {}", self.url, e))
            })?;
            let header = self.respond(&mut prompt, username, password, body)?;
            if let Ok(mut challenge) = self.challenge.lock() {
                *challenge = Some(prompt);
            }
            return Ok(Some(Authorization::Digest(header)));
        }
        if challenges.iter().any(|c| has_scheme(c, "basic")) {
            return Ok(Some(Authorization::Basic));
        }
        Ok(None)
    }

    fn respond(
        &self,
        prompt: &mut WwwAuthenticateHeader,
        username: &str,
        password: &str,
        body: &[u8],
    ) -> Result<String> {
        let context = AuthContext::new_post(username, password, MANAGEMENT_PATH, Some(body));
        prompt
            .respond(&context)
            .map(|answer| answer.to_header_string())
            .map_err(|e| {
                Error::Connection(format!("Failed to answer digest challenge from {}: {}", self.url, e))
            })
    }
}

fn has_scheme(challenge: &str, scheme: &str) -> bool {
    challenge
        .trim_start()
        .get(..scheme.len())
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case(scheme))
}

#[async_trait]
impl ManagementClient for HttpManagementClient {
    async fn execute(&self, operation: &Operation) -> Result<OperationResult> {
        tracing::trace!(url = %self.url, operation = %operation, "Sending management operation");

        let body = serde_json::to_vec(&operation.to_json())
            .map_err(|e| Error::Connection(format!("Failed to encode operation: {}", e)))?;

        let authorization = self.cached_authorization(&body)?;
        let mut response = self.send(&body, authorization.as_ref()).await?;
        if response.status() == StatusCode::UNAUTHORIZED {
            if let Some(authorization) = self.answer_challenge(response.headers(), &body)? {
                tracing::debug!(url = %self.url, "Answering authentication challenge");
                response = self.send(&body, Some(&authorization)).await?;
            }
        }

        // Failed operations come back as 500 with a regular result body
        match response.status() {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                return Err(Error::Connection(format!(
                    "Management endpoint {} rejected the credentials ({})",
                    self.url,
                    response.status()
                )));
            }
            StatusCode::NOT_FOUND => {
                return Err(Error::Connection(format!(
                    "No management endpoint at {}",
                    self.url
                )));
            }
            _ => {}
        }

        response.json::<OperationResult>().await.map_err(|e| {
            Error::Connection(format!("Invalid management response from {}: {}", self.url, e))
        })
    }
}

//! Reqwest-backed GraphQL session adapter.
//!
//! This adapter owns transport details only: bearer authentication, request
//! serialisation, timeout and HTTP error mapping, and splitting GraphQL
//! responses into data or errors.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use serde_json::Value;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

use super::dto::{GraphqlOutcome, GraphqlRequestDto, GraphqlResponseDto};
use crate::domain::ports::{GraphqlOperation, GraphqlSession, GraphqlSessionError};
use crate::outbound::http_body::body_preview;
use crate::outbound::keycloak::AccessTokenProvider;

/// Upper bound on requests in flight through one session.
pub const MAX_IN_FLIGHT_REQUESTS: usize = 5;

/// GraphQL session that POSTs operations to one OS2mo endpoint.
pub struct HttpGraphqlSession {
    client: Client,
    endpoint: Url,
    tokens: Arc<dyn AccessTokenProvider>,
    permits: Semaphore,
}

impl HttpGraphqlSession {
    /// Build a session using a reqwest client with an explicit request timeout.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::sync::Arc;
    /// use std::time::Duration;
    ///
    /// use mockable::DefaultClock;
    /// use mo_init::outbound::graphql::HttpGraphqlSession;
    /// use mo_init::outbound::keycloak::{KeycloakCredentials, KeycloakTokenSource};
    /// use reqwest::Url;
    /// use zeroize::Zeroizing;
    ///
    /// let timeout = Duration::from_secs(30);
    /// let tokens = KeycloakTokenSource::new(
    ///     KeycloakCredentials {
    ///         auth_server: Url::parse("http://keycloak:8080/auth")?,
    ///         realm: "mo".to_owned(),
    ///         client_id: "dipex".to_owned(),
    ///         client_secret: Zeroizing::new("secret".to_owned()),
    ///     },
    ///     timeout,
    ///     Arc::new(DefaultClock),
    /// )?;
    /// let endpoint = Url::parse("http://mo:5000/graphql/v22")?;
    /// let session = HttpGraphqlSession::new(endpoint, timeout, Arc::new(tokens))?;
    /// assert_eq!(session.endpoint().path(), "/graphql/v22");
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    ///
    /// # Errors
    ///
    /// Returns an error when the reqwest client cannot be constructed.
    pub fn new(
        endpoint: Url,
        timeout: Duration,
        tokens: Arc<dyn AccessTokenProvider>,
    ) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint,
            tokens,
            permits: Semaphore::new(MAX_IN_FLIGHT_REQUESTS),
        })
    }

    /// The GraphQL endpoint every operation is posted to.
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    async fn post(
        &self,
        body: &GraphqlRequestDto<'_>,
    ) -> Result<(StatusCode, Vec<u8>), GraphqlSessionError> {
        let token = self
            .tokens
            .access_token()
            .await
            .map_err(|error| GraphqlSessionError::unauthorized(error.to_string()))?;
        let response = self
            .client
            .post(self.endpoint.clone())
            .bearer_auth(token)
            .header(reqwest::header::ACCEPT, "application/json")
            .json(body)
            .send()
            .await
            .map_err(map_transport_error)?;
        let status = response.status();
        let body = response.bytes().await.map_err(map_transport_error)?;
        Ok((status, body.to_vec()))
    }
}

#[async_trait]
impl GraphqlSession for HttpGraphqlSession {
    async fn execute(
        &self,
        operation: &GraphqlOperation,
        variables: Value,
    ) -> Result<Value, GraphqlSessionError> {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|error| GraphqlSessionError::transport(error.to_string()))?;
        let body = GraphqlRequestDto {
            query: operation.document,
            operation_name: operation.name,
            variables: &variables,
        };
        debug!(operation = operation.name, "executing graphql operation");

        let (mut status, mut response_body) = self.post(&body).await?;
        if status == StatusCode::UNAUTHORIZED {
            warn!(operation = operation.name, "access token rejected; refreshing");
            self.tokens.invalidate().await;
            (status, response_body) = self.post(&body).await?;
        }

        decode_response(status, &response_body)
    }
}

fn decode_response(status: StatusCode, body: &[u8]) -> Result<Value, GraphqlSessionError> {
    if matches!(status, StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN) {
        return Err(GraphqlSessionError::unauthorized(status_message(status, body)));
    }

    let decoded = serde_json::from_slice::<GraphqlResponseDto>(body);
    if !status.is_success() {
        // Servers may report GraphQL errors with a non-2xx status.
        if let Ok(GraphqlOutcome::Errors(messages)) = decoded.map(GraphqlResponseDto::into_outcome)
        {
            return Err(GraphqlSessionError::query(messages));
        }
        return Err(map_status_error(status, body));
    }

    let decoded = decoded.map_err(|error| {
        GraphqlSessionError::decode(format!("invalid GraphQL response payload: {error}"))
    })?;
    match decoded.into_outcome() {
        GraphqlOutcome::Data(data) => Ok(data),
        GraphqlOutcome::Errors(messages) => Err(GraphqlSessionError::query(messages)),
        GraphqlOutcome::Empty => Err(GraphqlSessionError::decode(
            "GraphQL response carried neither data nor errors",
        )),
    }
}

fn map_transport_error(error: reqwest::Error) -> GraphqlSessionError {
    if error.is_timeout() {
        GraphqlSessionError::timeout(error.to_string())
    } else {
        GraphqlSessionError::transport(error.to_string())
    }
}

fn map_status_error(status: StatusCode, body: &[u8]) -> GraphqlSessionError {
    let message = status_message(status, body);
    match status {
        StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => {
            GraphqlSessionError::timeout(message)
        }
        _ => GraphqlSessionError::transport(message),
    }
}

fn status_message(status: StatusCode, body: &[u8]) -> String {
    let preview = body_preview(body);
    if preview.is_empty() {
        format!("status {}", status.as_u16())
    } else {
        format!("status {}: {}", status.as_u16(), preview)
    }
}

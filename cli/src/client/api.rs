//! Bloret identity provider client implementation.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::auth::Identity;
use crate::chat::{ChatApi, ChatMessage, ChatReply, MODEL};
use crate::client::middleware::{AuthMiddleware, BearerToken};
use crate::config::ApiConfig;
use crate::error::{BloretError, Result};
use crate::two_factor::{ApprovalAction, PendingRequest, TwoFactorApi};

const VERIFY_PATH: &str = "/app/verify";
const PENDING_PATH: &str = "/app/2fa/pending";
const RESPOND_PATH: &str = "/app/2fa/respond";
const CHAT_PATH: &str = "/api/ai";

/// Main API client for communicating with the Bloret provider.
pub struct BloretApiClient {
    client: ClientWithMiddleware,
    config: ApiConfig,
}

#[derive(Serialize)]
struct PendingQuery<'a> {
    username: &'a str,
    app_id: &'a str,
    token: &'a str,
}

#[derive(Serialize)]
struct DecisionBody<'a> {
    username: &'a str,
    app_id: &'a str,
    token: &'a str,
    request_id: &'a str,
    action: ApprovalAction,
}

/// `success` / `error` envelope shared by provider responses.
#[derive(Debug, Default, Deserialize)]
struct ProviderStatus {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    error: Option<String>,
}

impl ProviderStatus {
    fn into_result(self, fallback: &str) -> Result<()> {
        if self.success {
            Ok(())
        } else {
            Err(BloretError::Provider(
                self.error.unwrap_or_else(|| fallback.to_string()),
            ))
        }
    }
}

#[derive(Serialize)]
struct ChatBody<'a> {
    pause: bool,
    model: &'a str,
    #[serde(rename = "OauthApp")]
    oauth_app: ChatApp<'a>,
    user: ChatUser<'a>,
    context: &'a [ChatMessage],
}

#[derive(Serialize)]
struct ChatApp<'a> {
    app_id: &'a str,
    app_secret: &'a str,
}

#[derive(Serialize)]
struct ChatUser<'a> {
    name: &'a str,
    token: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatAnswer {
    #[serde(default)]
    status: bool,
    #[serde(default)]
    pause: bool,
    content: Option<String>,
    message: Option<String>,
    error: Option<String>,
    #[serde(rename = "connectionId")]
    connection_id: Option<String>,
}

impl ChatAnswer {
    fn into_reply(self) -> Result<ChatReply> {
        if !self.status {
            return Err(BloretError::Provider(
                self.error
                    .or(self.message)
                    .unwrap_or_else(|| "chat relay refused the message".to_string()),
            ));
        }
        match self.content {
            Some(content) if !self.pause => Ok(ChatReply::Message(content)),
            _ if self.pause => Ok(ChatReply::Pending {
                message: self.message,
                connection_id: self.connection_id,
            }),
            _ => Err(BloretError::Decode("chat answer has no content".to_string())),
        }
    }
}

#[derive(Debug, Deserialize)]
struct PendingList {
    #[serde(flatten)]
    status: ProviderStatus,
    #[serde(default)]
    requests: Vec<PendingRequest>,
}

impl BloretApiClient {
    /// Create a new API client.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: &ApiConfig) -> Result<Self> {
        let inner_client = Client::builder()
            .user_agent(format!("bloret/{}", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        let client = ClientBuilder::new(inner_client).with(AuthMiddleware).build();

        Ok(Self {
            client,
            config: config.clone(),
        })
    }

    /// Exchange an OAuth authorization code for the signed-in identity.
    ///
    /// # Errors
    ///
    /// Returns [`BloretError::AuthenticationFailed`] if the provider refuses
    /// the code or answers without an identity.
    pub async fn exchange_code(&self, code: &str) -> Result<Identity> {
        let mut url = self.config.endpoint(VERIFY_PATH)?;
        url.query_pairs_mut()
            .append_pair("app_id", &self.config.app_id)
            .append_pair("app_secret", &self.config.app_secret)
            .append_pair("code", code);

        let response = self.client.get(url).send().await?;
        let status = response.status();
        let bytes = response.bytes().await?;
        if !status.is_success() {
            return Err(status_error(status, &bytes));
        }

        let value: serde_json::Value = serde_json::from_slice(&bytes)
            .map_err(|e| BloretError::AuthenticationFailed(format!("unreadable response: {e}")))?;

        if let Some(error) = value.get("error") {
            let message = error
                .as_str()
                .map_or_else(|| error.to_string(), ToString::to_string);
            return Err(BloretError::AuthenticationFailed(message));
        }

        serde_json::from_value(value)
            .map_err(|e| BloretError::AuthenticationFailed(format!("no identity in response: {e}")))
    }

    /// POST a JSON body with the identity's bearer token and decode the answer.
    async fn post_as<B, R>(&self, path: &str, identity: &Identity, body: &B) -> Result<R>
    where
        B: Serialize + Sync,
        R: DeserializeOwned,
    {
        let url = self.config.endpoint(path)?;

        let response = self
            .client
            .post(url)
            .with_extension(BearerToken(identity.token.clone()))
            .header(http::header::CONTENT_TYPE, "application/json")
            .body(serde_json::to_string(body)?)
            .send()
            .await?;

        let status = response.status();
        let bytes = response.bytes().await?;

        if !status.is_success() {
            // A structured failure is still an answer from the provider.
            if let Ok(ProviderStatus {
                error: Some(message),
                ..
            }) = serde_json::from_slice(&bytes)
            {
                return Err(BloretError::Provider(message));
            }
            return Err(status_error(status, &bytes));
        }

        serde_json::from_slice(&bytes).map_err(|e| BloretError::Decode(e.to_string()))
    }
}

fn status_error(status: StatusCode, body: &[u8]) -> BloretError {
    match status {
        StatusCode::UNAUTHORIZED => BloretError::Unauthorized,
        StatusCode::BAD_GATEWAY | StatusCode::SERVICE_UNAVAILABLE | StatusCode::GATEWAY_TIMEOUT => {
            BloretError::ApiUnavailable
        }
        _ => {
            let text = String::from_utf8_lossy(body).trim().to_string();
            let message = if text.is_empty() {
                status
                    .canonical_reason()
                    .unwrap_or("Unknown error")
                    .to_string()
            } else {
                text
            };
            BloretError::ApiError {
                status: status.as_u16(),
                message,
            }
        }
    }
}

#[async_trait]
impl TwoFactorApi for BloretApiClient {
    async fn pending_requests(&self, identity: &Identity) -> Result<Vec<PendingRequest>> {
        let query = PendingQuery {
            username: &identity.username,
            app_id: &self.config.app_id,
            token: &identity.token,
        };

        let list: PendingList = self.post_as(PENDING_PATH, identity, &query).await?;
        list.status.into_result("pending request query was refused")?;
        Ok(list.requests)
    }

    async fn submit_decision(
        &self,
        identity: &Identity,
        request_id: &str,
        action: ApprovalAction,
    ) -> Result<()> {
        let body = DecisionBody {
            username: &identity.username,
            app_id: &self.config.app_id,
            token: &identity.token,
            request_id,
            action,
        };

        let status: ProviderStatus = self.post_as(RESPOND_PATH, identity, &body).await?;
        status.into_result("decision was refused")
    }
}

#[async_trait]
impl ChatApi for BloretApiClient {
    async fn reply(&self, identity: &Identity, context: &[ChatMessage]) -> Result<ChatReply> {
        let body = ChatBody {
            pause: false,
            model: MODEL,
            oauth_app: ChatApp {
                app_id: &self.config.app_id,
                app_secret: &self.config.app_secret,
            },
            user: ChatUser {
                name: &identity.username,
                token: &identity.token,
            },
            context,
        };

        let answer: ChatAnswer = self.post_as(CHAT_PATH, identity, &body).await?;
        answer.into_reply()
    }
}

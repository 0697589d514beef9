//! Slack Web API client used by collection, lookup, and posting flows.

use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::retry::{
    is_retryable_slack_status, is_retryable_transport_error, parse_retry_after_ms, retry_delay,
    truncate_for_error,
};
use crate::types::{
    ChannelInfo, HistoryPage, PostedMessage, SlackApiError, SlackMessage, WorkspaceClient,
};

const LIST_PAGE_LIMIT: u64 = 200;
const HISTORY_PAGE_LIMIT: u64 = 200;

#[derive(Debug, Clone, Deserialize)]
struct RawChannel {
    id: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    is_member: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct ResponseMetadata {
    #[serde(default)]
    next_cursor: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct ListChannelsResponse {
    ok: bool,
    #[serde(default)]
    channels: Option<Vec<RawChannel>>,
    #[serde(default)]
    response_metadata: Option<ResponseMetadata>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct HistoryResponse {
    ok: bool,
    #[serde(default)]
    messages: Option<Vec<SlackMessage>>,
    #[serde(default)]
    response_metadata: Option<ResponseMetadata>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct RawUser {
    #[serde(default)]
    real_name: Option<String>,
    #[serde(default)]
    name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct UserInfoResponse {
    ok: bool,
    #[serde(default)]
    user: Option<RawUser>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct ChannelInfoResponse {
    ok: bool,
    #[serde(default)]
    channel: Option<RawChannel>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct PermalinkResponse {
    ok: bool,
    #[serde(default)]
    permalink: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct PostMessageResponse {
    ok: bool,
    #[serde(default)]
    channel: Option<String>,
    #[serde(default)]
    ts: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// Bearer-authed Slack Web API client with bounded retry on rate limits and
/// transient transport failures. The `api_base` is overridable so tests can
/// point it at a local mock server.
#[derive(Clone)]
pub struct SlackApiClient {
    http: reqwest::Client,
    api_base: String,
    bot_token: String,
    retry_max_attempts: usize,
    retry_base_delay_ms: u64,
}

impl SlackApiClient {
    pub fn new(
        api_base: String,
        bot_token: String,
        request_timeout_ms: u64,
        retry_max_attempts: usize,
        retry_base_delay_ms: u64,
    ) -> Result<Self, SlackApiError> {
        let bot_token = bot_token.trim().to_string();
        if bot_token.is_empty() {
            return Err(SlackApiError::MissingBotToken);
        }

        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            reqwest::header::USER_AGENT,
            reqwest::header::HeaderValue::from_static("pulse-ranking-bot"),
        );
        headers.insert(
            reqwest::header::ACCEPT,
            reqwest::header::HeaderValue::from_static("application/json"),
        );
        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_millis(request_timeout_ms.max(1)))
            .build()?;

        Ok(Self {
            http,
            api_base: api_base.trim_end_matches('/').to_string(),
            bot_token,
            retry_max_attempts: retry_max_attempts.max(1),
            retry_base_delay_ms: retry_base_delay_ms.max(1),
        })
    }

    fn endpoint(&self, method: &str) -> String {
        format!("{}/{method}", self.api_base)
    }

    async fn request_json<T, F>(
        &self,
        operation: &'static str,
        mut builder: F,
    ) -> Result<T, SlackApiError>
    where
        T: DeserializeOwned,
        F: FnMut() -> reqwest::RequestBuilder,
    {
        let mut attempt = 0_usize;
        loop {
            attempt = attempt.saturating_add(1);
            let response = builder()
                .header("x-pulse-retry-attempt", attempt.saturating_sub(1).to_string())
                .send()
                .await;
            match response {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        return response.json::<T>().await.map_err(|error| {
                            SlackApiError::InvalidResponse(format!(
                                "failed to decode slack {operation}: {error}"
                            ))
                        });
                    }

                    let retry_after = parse_retry_after_ms(response.headers());
                    let body = response.text().await.unwrap_or_default();
                    if attempt < self.retry_max_attempts
                        && is_retryable_slack_status(status.as_u16())
                    {
                        tokio::time::sleep(retry_delay(
                            self.retry_base_delay_ms,
                            attempt,
                            retry_after,
                        ))
                        .await;
                        continue;
                    }

                    return Err(SlackApiError::HttpStatus {
                        operation: operation.to_string(),
                        status: status.as_u16(),
                        body: truncate_for_error(&body, 800),
                    });
                }
                Err(error) => {
                    if attempt < self.retry_max_attempts && is_retryable_transport_error(&error) {
                        tokio::time::sleep(retry_delay(self.retry_base_delay_ms, attempt, None))
                            .await;
                        continue;
                    }
                    return Err(SlackApiError::Http(error));
                }
            }
        }
    }

    fn check_ok(
        operation: &'static str,
        ok: bool,
        error: Option<String>,
    ) -> Result<(), SlackApiError> {
        if ok {
            return Ok(());
        }
        Err(SlackApiError::Api {
            operation: operation.to_string(),
            error: error.unwrap_or_else(|| "unknown error".to_string()),
        })
    }
}

fn normalize_cursor(metadata: Option<ResponseMetadata>) -> Option<String> {
    metadata
        .and_then(|metadata| metadata.next_cursor)
        .filter(|cursor| !cursor.trim().is_empty())
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|value| !value.trim().is_empty())
}

#[async_trait]
impl WorkspaceClient for SlackApiClient {
    async fn list_channels(&self) -> Result<Vec<ChannelInfo>, SlackApiError> {
        let mut channels = Vec::new();
        let mut cursor: Option<String> = None;
        loop {
            let mut query: Vec<(&str, String)> = vec![
                ("types", "public_channel,private_channel".to_string()),
                ("exclude_archived", "true".to_string()),
                ("limit", LIST_PAGE_LIMIT.to_string()),
            ];
            if let Some(cursor) = cursor.as_deref() {
                query.push(("cursor", cursor.to_string()));
            }

            let response: ListChannelsResponse = self
                .request_json("conversations.list", || {
                    self.http
                        .get(self.endpoint("conversations.list"))
                        .bearer_auth(&self.bot_token)
                        .query(&query)
                })
                .await?;
            Self::check_ok("conversations.list", response.ok, response.error)?;

            for channel in response.channels.unwrap_or_default() {
                let Some(name) = non_empty(channel.name) else {
                    continue;
                };
                channels.push(ChannelInfo {
                    id: channel.id,
                    name,
                    is_member: channel.is_member.unwrap_or(false),
                });
            }

            cursor = normalize_cursor(response.response_metadata);
            if cursor.is_none() {
                return Ok(channels);
            }
        }
    }

    async fn fetch_history(
        &self,
        channel_id: &str,
        cursor: Option<&str>,
        oldest: Option<&str>,
    ) -> Result<HistoryPage, SlackApiError> {
        let mut query: Vec<(&str, String)> = vec![
            ("channel", channel_id.to_string()),
            ("limit", HISTORY_PAGE_LIMIT.to_string()),
        ];
        if let Some(oldest) = oldest {
            query.push(("oldest", oldest.to_string()));
        }
        if let Some(cursor) = cursor {
            query.push(("cursor", cursor.to_string()));
        }

        let response: HistoryResponse = self
            .request_json("conversations.history", || {
                self.http
                    .get(self.endpoint("conversations.history"))
                    .bearer_auth(&self.bot_token)
                    .query(&query)
            })
            .await?;
        Self::check_ok("conversations.history", response.ok, response.error)?;

        Ok(HistoryPage {
            messages: response.messages.unwrap_or_default(),
            next_cursor: normalize_cursor(response.response_metadata),
        })
    }

    async fn fetch_single_message(
        &self,
        channel_id: &str,
        ts: &str,
    ) -> Result<Option<SlackMessage>, SlackApiError> {
        let query: Vec<(&str, String)> = vec![
            ("channel", channel_id.to_string()),
            ("latest", ts.to_string()),
            ("oldest", ts.to_string()),
            ("inclusive", "true".to_string()),
            ("limit", "1".to_string()),
        ];

        let response: HistoryResponse = self
            .request_json("conversations.history", || {
                self.http
                    .get(self.endpoint("conversations.history"))
                    .bearer_auth(&self.bot_token)
                    .query(&query)
            })
            .await?;
        Self::check_ok("conversations.history", response.ok, response.error)?;

        Ok(response.messages.unwrap_or_default().into_iter().next())
    }

    async fn fetch_thread_replies(
        &self,
        channel_id: &str,
        ts: &str,
        limit: u64,
    ) -> Result<Vec<SlackMessage>, SlackApiError> {
        let query: Vec<(&str, String)> = vec![
            ("channel", channel_id.to_string()),
            ("ts", ts.to_string()),
            ("limit", limit.max(1).to_string()),
        ];

        let response: HistoryResponse = self
            .request_json("conversations.replies", || {
                self.http
                    .get(self.endpoint("conversations.replies"))
                    .bearer_auth(&self.bot_token)
                    .query(&query)
            })
            .await?;
        Self::check_ok("conversations.replies", response.ok, response.error)?;

        Ok(response.messages.unwrap_or_default())
    }

    async fn fetch_user_name(&self, user_id: &str) -> Result<String, SlackApiError> {
        let query: Vec<(&str, String)> = vec![("user", user_id.to_string())];

        let response: UserInfoResponse = self
            .request_json("users.info", || {
                self.http
                    .get(self.endpoint("users.info"))
                    .bearer_auth(&self.bot_token)
                    .query(&query)
            })
            .await?;
        Self::check_ok("users.info", response.ok, response.error)?;

        let user = response.user.ok_or_else(|| {
            SlackApiError::InvalidResponse("slack users.info missing user".to_string())
        })?;
        non_empty(user.real_name)
            .or_else(|| non_empty(user.name))
            .ok_or_else(|| {
                SlackApiError::InvalidResponse("slack users.info missing display name".to_string())
            })
    }

    async fn fetch_channel_name(&self, channel_id: &str) -> Result<String, SlackApiError> {
        let query: Vec<(&str, String)> = vec![("channel", channel_id.to_string())];

        let response: ChannelInfoResponse = self
            .request_json("conversations.info", || {
                self.http
                    .get(self.endpoint("conversations.info"))
                    .bearer_auth(&self.bot_token)
                    .query(&query)
            })
            .await?;
        Self::check_ok("conversations.info", response.ok, response.error)?;

        response
            .channel
            .and_then(|channel| non_empty(channel.name))
            .ok_or_else(|| {
                SlackApiError::InvalidResponse("slack conversations.info missing name".to_string())
            })
    }

    async fn fetch_permalink(&self, channel_id: &str, ts: &str) -> Result<String, SlackApiError> {
        let query: Vec<(&str, String)> = vec![
            ("channel", channel_id.to_string()),
            ("message_ts", ts.to_string()),
        ];

        let response: PermalinkResponse = self
            .request_json("chat.getPermalink", || {
                self.http
                    .get(self.endpoint("chat.getPermalink"))
                    .bearer_auth(&self.bot_token)
                    .query(&query)
            })
            .await?;
        Self::check_ok("chat.getPermalink", response.ok, response.error)?;

        non_empty(response.permalink).ok_or_else(|| {
            SlackApiError::InvalidResponse("slack chat.getPermalink missing permalink".to_string())
        })
    }

    async fn post_message(
        &self,
        channel_id: &str,
        text: &str,
        blocks: Option<Value>,
    ) -> Result<PostedMessage, SlackApiError> {
        let mut payload = json!({
            "channel": channel_id,
            "text": text,
            "unfurl_links": false,
            "unfurl_media": false,
        });
        if let Some(blocks) = blocks {
            payload["blocks"] = blocks;
        }

        let response: PostMessageResponse = self
            .request_json("chat.postMessage", || {
                self.http
                    .post(self.endpoint("chat.postMessage"))
                    .bearer_auth(&self.bot_token)
                    .json(&payload)
            })
            .await?;
        Self::check_ok("chat.postMessage", response.ok, response.error)?;

        Ok(PostedMessage {
            channel: response.channel.unwrap_or_else(|| channel_id.to_string()),
            ts: response.ts.ok_or_else(|| {
                SlackApiError::InvalidResponse("slack chat.postMessage missing ts".to_string())
            })?,
        })
    }
}

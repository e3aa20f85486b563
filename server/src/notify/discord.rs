//! Discord delivery
//!
//! Sends change embeds and fetch-failure notices to the configured channel
//! through the Discord REST API. The channel is resolved per notification
//! rather than held across cycles, so moving notifications to another
//! channel takes effect on the next send.

use async_trait::async_trait;
use reqwest::header;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::{
    settings::RuntimeSettings,
    testflight::{join_url, AppStatus},
    HttpClient,
};

use super::NotificationSink;

const DISCORD_API_URL: &str = "https://discord.com/api/v10";
const COLOR_FULL: u32 = 0xED4245;
const COLOR_OPEN: u32 = 0x57F287;

#[derive(Debug, thiserror::Error)]
pub enum DiscordError {
    #[error("no notification channel configured")]
    NoChannel,
    #[error("failed to send request: {0}")]
    RequestFailed(#[from] reqwest::Error),
    #[error("Discord API error: {0}")]
    ApiError(String),
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChannelInfo {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Serialize)]
struct MessagePayload<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<&'a str>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    embeds: Vec<Embed<'a>>,
}

#[derive(Debug, Serialize)]
struct Embed<'a> {
    title: &'a str,
    url: String,
    description: String,
    color: u32,
    thumbnail: Thumbnail<'a>,
}

#[derive(Debug, Serialize)]
struct Thumbnail<'a> {
    url: &'a str,
}

/// Thin bot-token client for the two endpoints this service needs.
#[derive(Clone)]
pub struct DiscordApi {
    http_client: HttpClient,
    bot_token: String,
}

impl DiscordApi {
    pub fn new(http_client: HttpClient, bot_token: String) -> Self {
        Self {
            http_client,
            bot_token,
        }
    }

    /// Resolve a channel by id. Used both to validate `set-channel` input
    /// and to look up the destination before each send.
    pub async fn get_channel(&self, channel_id: u64) -> Result<ChannelInfo, DiscordError> {
        let response = self
            .http_client
            .get(format!("{DISCORD_API_URL}/channels/{channel_id}"))
            .header(header::AUTHORIZATION, self.auth_header())
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::api_error(response).await);
        }
        Ok(response.json().await?)
    }

    async fn create_message(
        &self,
        channel_id: u64,
        payload: &MessagePayload<'_>,
    ) -> Result<(), DiscordError> {
        let response = self
            .http_client
            .post(format!("{DISCORD_API_URL}/channels/{channel_id}/messages"))
            .header(header::AUTHORIZATION, self.auth_header())
            .json(payload)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::api_error(response).await);
        }
        Ok(())
    }

    fn auth_header(&self) -> String {
        format!("Bot {}", self.bot_token)
    }

    async fn api_error(response: reqwest::Response) -> DiscordError {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        DiscordError::ApiError(format!("{}: {}", status, body))
    }
}

/// Per-notification message content configured by the operator.
#[derive(Debug, Clone, Default)]
pub struct ChangeMessages {
    pub filled: Option<String>,
    pub unfilled: Option<String>,
}

pub struct DiscordNotifier {
    api: DiscordApi,
    settings: RuntimeSettings,
    messages: ChangeMessages,
}

impl DiscordNotifier {
    pub fn new(api: DiscordApi, settings: RuntimeSettings, messages: ChangeMessages) -> Self {
        Self {
            api,
            settings,
            messages,
        }
    }

    async fn send_change(&self, status: &AppStatus) -> Result<(), DiscordError> {
        let channel_id = self
            .settings
            .notification_channel_id()
            .ok_or(DiscordError::NoChannel)?;
        let channel = self.api.get_channel(channel_id).await?;
        debug!("Resolved notification channel {}", channel.id);

        let description = format!(
            "TestFlight app is now **{}**",
            if status.is_full { "full" } else { "not full" }
        );
        let content = if status.is_full {
            self.messages.filled.as_deref()
        } else {
            self.messages.unfilled.as_deref()
        };
        let payload = MessagePayload {
            content,
            embeds: vec![Embed {
                title: &status.name,
                url: join_url(&status.app_id),
                description,
                color: if status.is_full { COLOR_FULL } else { COLOR_OPEN },
                thumbnail: Thumbnail {
                    url: &status.icon_url,
                },
            }],
        };

        self.api.create_message(channel_id, &payload).await
    }

    async fn send_error(&self, app_id: &str) -> Result<(), DiscordError> {
        let channel_id = self
            .settings
            .notification_channel_id()
            .ok_or(DiscordError::NoChannel)?;
        let content = format!("Failed to fetch app info for app `{app_id}`");
        let payload = MessagePayload {
            content: Some(&content),
            embeds: Vec::new(),
        };

        self.api.create_message(channel_id, &payload).await
    }
}

#[async_trait]
impl NotificationSink for DiscordNotifier {
    async fn notify_change(&self, status: &AppStatus) {
        if let Err(e) = self.send_change(status).await {
            error!(
                "Failed to deliver change notification for app {}: {}",
                status.app_id, e
            );
        }
    }

    async fn notify_error(&self, app_id: &str) {
        if let Err(e) = self.send_error(app_id).await {
            error!(
                "Failed to deliver fetch-error notification for app {}: {}",
                app_id, e
            );
        }
    }
}

use std::sync::OnceLock;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use reqwest::{Method, RequestBuilder};
use rota_core::{
    AdapterError, AdapterResult, ParticipantHandle, ParticipantId, RoleAdapter, RoleHandle, RoleId,
};
use serde::de::DeserializeOwned;
use tokio::sync::OnceCell;
use tracing::debug;

use crate::error::DiscordError;
use crate::types::{Member, Role, User, ADMINISTRATOR, MANAGE_ROLES};

pub const DEFAULT_API_BASE: &str = "https://discord.com/api/v10";

const AUDIT_REASON: &str = "duty role rotation";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

static SNOWFLAKE_RE: OnceLock<Regex> = OnceLock::new();

fn snowflake_re() -> &'static Regex {
    SNOWFLAKE_RE.get_or_init(|| Regex::new(r"^[0-9]{1,20}$").unwrap())
}

fn snowflake(id: &str) -> Result<&str, DiscordError> {
    if snowflake_re().is_match(id) {
        Ok(id)
    } else {
        Err(DiscordError::InvalidId(id.to_string()))
    }
}

#[derive(Debug, Clone)]
pub struct DiscordConfig {
    /// Bot token, sent as `Authorization: Bot <token>`.
    pub token: String,
    pub guild_id: String,
    pub api_base: String,
}

impl DiscordConfig {
    pub fn new(token: impl Into<String>, guild_id: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            guild_id: guild_id.into(),
            api_base: DEFAULT_API_BASE.to_string(),
        }
    }
}

/// [`RoleAdapter`] that manages one guild role through the Discord REST API.
pub struct DiscordRoleAdapter {
    http: reqwest::Client,
    config: DiscordConfig,
    bot_user_id: OnceCell<String>,
}

impl DiscordRoleAdapter {
    pub fn new(config: DiscordConfig) -> Result<Self, DiscordError> {
        snowflake(&config.guild_id)?;
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(concat!("rota/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            http,
            config,
            bot_user_id: OnceCell::new(),
        })
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.config.api_base.trim_end_matches('/'), path);
        self.http
            .request(method, url)
            .header("Authorization", format!("Bot {}", self.config.token))
    }

    async fn send(&self, builder: RequestBuilder) -> Result<reqwest::Response, DiscordError> {
        let response = builder.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        debug!(%status, body = %body, "discord request failed");
        Err(DiscordError::Status { status, body })
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, DiscordError> {
        let response = self.send(self.request(Method::GET, path)).await?;
        Ok(response.json().await?)
    }

    async fn roles(&self) -> Result<Vec<Role>, DiscordError> {
        self.get(&format!("/guilds/{}/roles", self.config.guild_id))
            .await
    }

    async fn member(&self, user_id: &str) -> Result<Member, DiscordError> {
        let user_id = snowflake(user_id)?;
        self.get(&format!(
            "/guilds/{}/members/{user_id}",
            self.config.guild_id
        ))
        .await
    }

    async fn bot_user_id(&self) -> Result<&str, DiscordError> {
        let id = self
            .bot_user_id
            .get_or_try_init(|| async {
                let me: User = self.get("/users/@me").await?;
                Ok::<_, DiscordError>(me.id)
            })
            .await?;
        Ok(id.as_str())
    }

    async fn set_role(
        &self,
        method: Method,
        role: &RoleHandle,
        participant: &ParticipantHandle,
    ) -> Result<(), DiscordError> {
        let user_id = snowflake(participant.id.as_str())?;
        let role_id = snowflake(role.id.as_str())?;
        let path = format!(
            "/guilds/{}/members/{user_id}/roles/{role_id}",
            self.config.guild_id
        );
        self.send(
            self.request(method, &path)
                .header("X-Audit-Log-Reason", AUDIT_REASON),
        )
        .await?;
        Ok(())
    }
}

#[async_trait]
impl RoleAdapter for DiscordRoleAdapter {
    async fn resolve_role(&self, role_id: &RoleId) -> AdapterResult<RoleHandle> {
        snowflake(role_id.as_str())?;
        let roles = self.roles().await?;
        roles
            .into_iter()
            .find(|r| r.id == role_id.as_str())
            .map(|r| RoleHandle {
                id: role_id.clone(),
                name: r.name,
            })
            .ok_or_else(|| AdapterError::NotFound(format!("role {role_id}")))
    }

    async fn resolve_participant(
        &self,
        participant_id: &ParticipantId,
    ) -> AdapterResult<ParticipantHandle> {
        let member = self.member(participant_id.as_str()).await?;
        let display_name = member
            .display_name()
            .unwrap_or_else(|| participant_id.to_string());
        Ok(ParticipantHandle {
            id: participant_id.clone(),
            display_name,
        })
    }

    /// The bot needs Manage Roles (or Administrator) and a highest role
    /// positioned strictly above the duty role.
    async fn caller_can_manage(&self, role: &RoleHandle) -> AdapterResult<bool> {
        let bot_id = self.bot_user_id().await?.to_string();
        let bot = self.member(&bot_id).await?;
        let roles = self.roles().await?;

        let target = roles
            .iter()
            .find(|r| r.id == role.id.as_str())
            .ok_or_else(|| AdapterError::NotFound(format!("role {}", role.id)))?;

        let mut permissions = 0u64;
        let mut top_position = 0i64;
        for r in &roles {
            // The @everyone role shares the guild's id and applies to everybody.
            let everyone = r.id == self.config.guild_id;
            if everyone || bot.roles.contains(&r.id) {
                permissions |= r.permission_bits();
                if !everyone {
                    top_position = top_position.max(r.position);
                }
            }
        }

        let may_manage = permissions & (MANAGE_ROLES | ADMINISTRATOR) != 0;
        Ok(may_manage && top_position > target.position)
    }

    async fn grant(&self, role: &RoleHandle, participant: &ParticipantHandle) -> AdapterResult<()> {
        self.set_role(Method::PUT, role, participant).await?;
        Ok(())
    }

    async fn revoke(
        &self,
        role: &RoleHandle,
        participant: &ParticipantHandle,
    ) -> AdapterResult<()> {
        self.set_role(Method::DELETE, role, participant).await?;
        Ok(())
    }

    async fn currently_holds(
        &self,
        participant: &ParticipantHandle,
        role: &RoleHandle,
    ) -> AdapterResult<bool> {
        let member = self.member(participant.id.as_str()).await?;
        Ok(member.roles.iter().any(|r| r == role.id.as_str()))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

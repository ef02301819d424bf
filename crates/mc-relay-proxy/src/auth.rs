//! Identities, account credentials, and the session service client.

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

use mc_relay_crypto::offline_uuid;

const HAS_JOINED_URL: &str = "https://sessionserver.mojang.com/session/minecraft/hasJoined";
const JOIN_URL: &str = "https://sessionserver.mojang.com/session/minecraft/join";
const AUTHENTICATE_URL: &str = "https://authserver.mojang.com/authenticate";

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("session service request failed: {0}")]
    Http(String),

    #[error("rejected by the session service: {0}")]
    Rejected(String),

    #[error("invalid profile: {0}")]
    InvalidProfile(String),
}

impl From<reqwest::Error> for AuthError {
    fn from(e: reqwest::Error) -> Self {
        AuthError::Http(e.to_string())
    }
}

/// Who a connection is. Bound once at login.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Identity {
    pub unique_id: Uuid,
    pub display_name: String,
    pub offline: bool,
}

impl Identity {
    pub fn offline(name: &str) -> Self {
        Self {
            unique_id: offline_uuid(name),
            display_name: name.to_string(),
            offline: true,
        }
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.display_name, self.unique_id)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProfileProperty {
    pub name: String,
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
}

/// A profile as returned by the session service.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GameProfile {
    /// UUID without dashes.
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub properties: Vec<ProfileProperty>,
}

impl GameProfile {
    pub fn uuid(&self) -> Result<Uuid, AuthError> {
        Uuid::parse_str(&self.id).map_err(|e| AuthError::InvalidProfile(e.to_string()))
    }

    pub fn into_identity(self) -> Result<Identity, AuthError> {
        Ok(Identity {
            unique_id: self.uuid()?,
            display_name: self.name,
            offline: false,
        })
    }
}

/// How a backend session logs in.
#[derive(Clone, PartialEq, Eq)]
pub enum Credentials {
    Offline { username: String },
    Online { email: String, password: String },
}

impl Credentials {
    /// `email:password` is an online account, anything else an offline name.
    pub fn parse(text: &str) -> Self {
        match text.split_once(':') {
            Some((email, password)) => Credentials::Online {
                email: email.to_string(),
                password: password.to_string(),
            },
            None => Credentials::Offline {
                username: text.to_string(),
            },
        }
    }

    /// Stable label used to address a backend session.
    pub fn account(&self) -> &str {
        match self {
            Credentials::Offline { username } => username,
            Credentials::Online { email, .. } => email,
        }
    }

    pub fn is_offline(&self) -> bool {
        matches!(self, Credentials::Offline { .. })
    }

    /// Resolve these credentials into a session. Offline credentials never
    /// touch the network.
    pub async fn login(&self, service: &dyn SessionService) -> Result<AuthSession, AuthError> {
        match self {
            Credentials::Offline { username } => Ok(AuthSession {
                identity: Identity::offline(username),
                access_token: None,
            }),
            Credentials::Online { email, password } => service.authenticate(email, password).await,
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credentials::Offline { username } => write!(f, "Offline({username})"),
            Credentials::Online { email, .. } => write!(f, "Online({email})"),
        }
    }
}

/// Result of logging an account in.
#[derive(Debug, Clone)]
pub struct AuthSession {
    pub identity: Identity,
    pub access_token: Option<String>,
}

/// Remote identity and session endpoints.
#[async_trait]
pub trait SessionService: Send + Sync {
    /// Check that `username` joined with `server_hash`. `None` means the
    /// client never authenticated.
    async fn has_joined(
        &self,
        username: &str,
        server_hash: &str,
    ) -> Result<Option<GameProfile>, AuthError>;

    /// Announce a join before answering a backend's encryption request.
    async fn join(
        &self,
        access_token: &str,
        profile: &Uuid,
        server_hash: &str,
    ) -> Result<(), AuthError>;

    /// Exchange account credentials for an access token and profile.
    async fn authenticate(&self, email: &str, password: &str) -> Result<AuthSession, AuthError>;
}

/// [`SessionService`] backed by the Mojang HTTP endpoints.
pub struct MojangSessionService {
    client: reqwest::Client,
}

impl MojangSessionService {
    pub fn new() -> Result<Self, AuthError> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()?;
        Ok(Self { client })
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct JoinRequest<'a> {
    access_token: &'a str,
    selected_profile: String,
    server_id: &'a str,
}

#[derive(Serialize)]
struct Agent {
    name: &'static str,
    version: u32,
}

#[derive(Serialize)]
struct AuthenticateRequest<'a> {
    agent: Agent,
    username: &'a str,
    password: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AuthenticateResponse {
    access_token: String,
    selected_profile: Option<GameProfile>,
}

#[async_trait]
impl SessionService for MojangSessionService {
    async fn has_joined(
        &self,
        username: &str,
        server_hash: &str,
    ) -> Result<Option<GameProfile>, AuthError> {
        let response = self
            .client
            .get(HAS_JOINED_URL)
            .query(&[("username", username), ("serverId", server_hash)])
            .send()
            .await?;
        debug!("hasJoined for {username}: {}", response.status());
        if response.status() == reqwest::StatusCode::NO_CONTENT {
            return Ok(None);
        }
        let response = response.error_for_status()?;
        Ok(Some(response.json::<GameProfile>().await?))
    }

    async fn join(
        &self,
        access_token: &str,
        profile: &Uuid,
        server_hash: &str,
    ) -> Result<(), AuthError> {
        let body = JoinRequest {
            access_token,
            selected_profile: profile.simple().to_string(),
            server_id: server_hash,
        };
        let response = self.client.post(JOIN_URL).json(&body).send().await?;
        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(AuthError::Rejected(format!("{status}: {text}")));
        }
        Ok(())
    }

    async fn authenticate(&self, email: &str, password: &str) -> Result<AuthSession, AuthError> {
        let body = AuthenticateRequest {
            agent: Agent {
                name: "Minecraft",
                version: 1,
            },
            username: email,
            password,
        };
        let response = self.client.post(AUTHENTICATE_URL).json(&body).send().await?;
        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(AuthError::Rejected(format!("{status}: {text}")));
        }
        let auth: AuthenticateResponse = response.json().await?;
        let profile = auth
            .selected_profile
            .ok_or_else(|| AuthError::InvalidProfile(format!("{email} owns no profile")))?;
        Ok(AuthSession {
            identity: profile.into_identity()?,
            access_token: Some(auth.access_token),
        })
    }
}

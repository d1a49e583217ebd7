//! Steam OpenID 2.0 login and profile lookup

use crate::{
    common::{traits::IdentityProvider, types::SteamProfile},
    config::SteamConfig,
    errors::{CaseboxResult, ConfigurationError, UpstreamError},
};
use async_trait::async_trait;
use regex::Regex;
use reqwest::{Client, StatusCode, Url};
use serde::Deserialize;
use std::{sync::Arc, time::Duration};
use tracing::{debug, warn};

const OPENID_NS: &str = "http://specs.openid.net/auth/2.0";
const IDENTIFIER_SELECT: &str = "http://specs.openid.net/auth/2.0/identifier_select";
const VALID_ASSERTION_MARKER: &str = "is_valid:true";

pub const CALLBACK_PATH: &str = "/api/auth/steam/callback";
const DEFAULT_CALLBACK_ORIGIN: &str = "http://localhost:8001";

pub const FALLBACK_AVATAR_URL: &str =
    "https://avatars.mds.yandex.net/i?id=f282cbc5d89f99ce4f9a56ee9e8805be_l-7679814-images-thumbs&n=13";

/// Deterministic profile used whenever Steam cannot provide one
pub fn fallback_profile(steam_id: &str) -> SteamProfile {
    let tail_start = steam_id
        .char_indices()
        .rev()
        .nth(3)
        .map(|(i, _)| i)
        .unwrap_or(0);

    SteamProfile {
        steam_id: steam_id.to_string(),
        persona_name: format!("Player_{}", &steam_id[tail_start..]),
        avatar_url: FALLBACK_AVATAR_URL.to_string(),
        profile_url: format!("https://steamcommunity.com/profiles/{}", steam_id),
    }
}

/// Resolve `(return_to, realm)` from the configured callback.
///
/// A bare origin gets the callback path appended. The realm is the origin.
fn callback_and_realm(configured: Option<&str>) -> CaseboxResult<(String, String)> {
    let configured = configured.unwrap_or(DEFAULT_CALLBACK_ORIGIN);
    let invalid = |reason: String| ConfigurationError::InvalidValue {
        field: "steam.callback_url".to_string(),
        value: configured.to_string(),
        reason,
    };

    let mut return_to = Url::parse(configured).map_err(|e| invalid(e.to_string()))?;
    let origin = return_to.origin();
    if !origin.is_tuple() {
        return Err(invalid("URL has no origin".to_string()).into());
    }
    if matches!(return_to.path(), "" | "/") {
        return_to.set_path(CALLBACK_PATH);
    }

    Ok((return_to.to_string(), origin.ascii_serialization()))
}

pub struct SteamAuth {
    provider: Arc<dyn IdentityProvider>,
    openid_endpoint: String,
    return_to: String,
    realm: String,
    claimed_id_pattern: Regex,
}

impl SteamAuth {
    pub fn new(config: &SteamConfig, provider: Arc<dyn IdentityProvider>) -> CaseboxResult<Self> {
        let (return_to, realm) = callback_and_realm(config.callback_url.as_deref())?;
        let claimed_id_pattern = Regex::new(r"(\d+)$").map_err(|e| ConfigurationError::InvalidValue {
            field: "claimed_id pattern".to_string(),
            value: r"(\d+)$".to_string(),
            reason: e.to_string(),
        })?;

        Ok(Self {
            provider,
            openid_endpoint: config.openid_endpoint.clone(),
            return_to,
            realm,
            claimed_id_pattern,
        })
    }

    /// `checkid_setup` redirect to the Steam login page
    pub fn login_url(&self) -> CaseboxResult<String> {
        let params = [
            ("openid.ns", OPENID_NS),
            ("openid.mode", "checkid_setup"),
            ("openid.return_to", self.return_to.as_str()),
            ("openid.realm", self.realm.as_str()),
            ("openid.identity", IDENTIFIER_SELECT),
            ("openid.claimed_id", IDENTIFIER_SELECT),
        ];

        let url = Url::parse_with_params(&self.openid_endpoint, &params).map_err(|e| {
            ConfigurationError::InvalidValue {
                field: "steam.openid_endpoint".to_string(),
                value: self.openid_endpoint.clone(),
                reason: e.to_string(),
            }
        })?;
        Ok(url.into())
    }

    /// Confirm a positive assertion with Steam and extract the Steam id.
    ///
    /// `Ok(None)` means the assertion was not accepted.
    pub async fn verify_callback(&self, params: &[(String, String)]) -> CaseboxResult<Option<String>> {
        let mode = params.iter().find(|(k, _)| k == "openid.mode").map(|(_, v)| v.as_str());
        if mode != Some("id_res") {
            debug!(?mode, "OpenID callback is not a positive assertion");
            return Ok(None);
        }

        let verify_params: Vec<(String, String)> = params
            .iter()
            .map(|(k, v)| {
                if k == "openid.mode" {
                    (k.clone(), "check_authentication".to_string())
                } else {
                    (k.clone(), v.clone())
                }
            })
            .collect();

        let body = self.provider.check_authentication(&verify_params).await?;
        if !body.contains(VALID_ASSERTION_MARKER) {
            warn!("Steam did not confirm the OpenID assertion");
            return Ok(None);
        }

        let claimed_id = params
            .iter()
            .find(|(k, _)| k == "openid.claimed_id")
            .map(|(_, v)| v.as_str())
            .unwrap_or_default();

        Ok(self.extract_steam_id(claimed_id))
    }

    fn extract_steam_id(&self, claimed_id: &str) -> Option<String> {
        self.claimed_id_pattern
            .captures(claimed_id)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().to_string())
    }

    /// Never fails: transport errors and empty results yield `fallback_profile`
    pub async fn fetch_profile(&self, steam_id: &str) -> SteamProfile {
        match self.provider.player_summaries(steam_id).await {
            Ok(players) => match players.into_iter().next() {
                Some(profile) => profile,
                None => {
                    warn!(steam_id, "Steam returned no player summary, using fallback profile");
                    fallback_profile(steam_id)
                }
            },
            Err(e) => {
                warn!(steam_id, error = %e, "Steam profile lookup failed, using fallback profile");
                fallback_profile(steam_id)
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct PlayerSummariesEnvelope {
    response: PlayerSummaries,
}

#[derive(Debug, Deserialize)]
struct PlayerSummaries {
    #[serde(default)]
    players: Vec<SteamProfile>,
}

/// Steam over HTTPS
pub struct SteamClient {
    http: Client,
    openid_endpoint: String,
    profile_endpoint: String,
    api_key: Option<String>,
}

impl SteamClient {
    pub fn new(config: &SteamConfig) -> CaseboxResult<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| UpstreamError::RequestFailed {
                service: "steam",
                message: e.to_string(),
            })?;

        Ok(Self {
            http,
            openid_endpoint: config.openid_endpoint.clone(),
            profile_endpoint: config.profile_endpoint.clone(),
            api_key: config.api_key.clone(),
        })
    }
}

fn request_failed(e: reqwest::Error) -> UpstreamError {
    UpstreamError::RequestFailed {
        service: "steam",
        message: e.to_string(),
    }
}

#[async_trait]
impl IdentityProvider for SteamClient {
    async fn check_authentication(&self, params: &[(String, String)]) -> CaseboxResult<String> {
        let response = self
            .http
            .post(&self.openid_endpoint)
            .form(params)
            .send()
            .await
            .map_err(request_failed)?;

        Ok(response.text().await.map_err(request_failed)?)
    }

    async fn player_summaries(&self, steam_id: &str) -> CaseboxResult<Vec<SteamProfile>> {
        let api_key = self.api_key.as_deref().ok_or_else(|| UpstreamError::Rejected {
            service: "steam",
            message: "Steam API key not configured".to_string(),
        })?;

        let response = self
            .http
            .get(&self.profile_endpoint)
            .query(&[("key", api_key), ("steamids", steam_id)])
            .send()
            .await
            .map_err(request_failed)?;

        if response.status() != StatusCode::OK {
            return Err(UpstreamError::BadStatus {
                service: "steam",
                status: response.status().as_u16(),
            }
            .into());
        }

        let envelope: PlayerSummariesEnvelope = response.json().await.map_err(|e| UpstreamError::InvalidResponse {
            service: "steam",
            message: e.to_string(),
        })?;
        Ok(envelope.response.players)
    }
}

//! Authenticated HTTP uplink from the fog node to the central service.
//!
//! The client holds at most one access token. Before a forward the caller
//! checks [`CloudClient::has_valid_token`]; a token absent or within the
//! refresh margin of expiry triggers a fresh login. Forward outcomes map
//! directly onto the node's buffer semantics: only `Delivered` permits
//! clearing the buffer, a 401 additionally drops the held token.

use std::time::Duration;

use anyhow::{anyhow, Result};
use chrono::Utc;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use reqwest::StatusCode;
use serde::Deserialize;
use tracing::{error, info, warn};

use crate::auth::Claims;
use crate::config::FogConfig;
use crate::models::AggregatedRecord;

// ---

#[derive(Debug, Deserialize)]
struct LoginResponse {
    token: String,
}

#[derive(Debug, Clone)]
struct SessionToken {
    // ---
    raw: String,
    expires_at: i64,
}

/// Result of one forward attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForwardOutcome {
    /// The cloud acknowledged the record; the source buffer may be cleared.
    Delivered,
    /// The cloud rejected the token; it has been discarded, the buffer is
    /// kept for the next cycle.
    AuthRejected,
    /// Network error, timeout or unexpected status; token and buffer kept.
    Failed,
}

pub struct CloudClient {
    // ---
    http: reqwest::Client,
    login_url: String,
    data_url: String,
    username: String,
    password: String,
    refresh_margin_secs: i64,
    token: Option<SessionToken>,
}

impl CloudClient {
    pub fn new(
        login_url: String,
        data_url: String,
        username: String,
        password: String,
        timeout: Duration,
        refresh_margin: Duration,
    ) -> Result<Self> {
        // ---
        let http = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            http,
            login_url,
            data_url,
            username,
            password,
            refresh_margin_secs: refresh_margin.as_secs() as i64,
            token: None,
        })
    }

    pub fn from_config(config: &FogConfig) -> Result<Self> {
        // ---
        Self::new(
            config.login_url(),
            config.data_url(),
            config.username.clone(),
            config.password.clone(),
            Duration::from_secs(config.forward_timeout_secs as u64),
            Duration::from_secs(config.token_refresh_margin_secs as u64),
        )
    }

    /// A token is usable only while it stays clear of the refresh margin.
    pub fn has_valid_token(&self) -> bool {
        // ---
        match &self.token {
            Some(token) => Utc::now().timestamp() < token.expires_at - self.refresh_margin_secs,
            None => false,
        }
    }

    /// Request a fresh token with the stored identity/secret.
    pub async fn login(&mut self) -> Result<()> {
        // ---
        info!("authenticating against {}", self.login_url);

        let response = self
            .http
            .post(&self.login_url)
            .basic_auth(&self.username, Some(&self.password))
            .send()
            .await?;

        if !response.status().is_success() {
            self.token = None;
            return Err(anyhow!("login rejected with status {}", response.status()));
        }

        let body: LoginResponse = response.json().await?;
        let expires_at = decode_expiry(&body.token)?;

        info!(expires_at, "access token acquired");
        self.token = Some(SessionToken {
            raw: body.token,
            expires_at,
        });
        Ok(())
    }

    /// Re-authenticate if the held token is absent or near expiry.
    pub async fn ensure_token(&mut self) -> Result<()> {
        // ---
        if !self.has_valid_token() {
            warn!("token absent or near expiry, re-authenticating");
            self.login().await?;
        }
        Ok(())
    }

    /// POST one aggregated record. Never returns an error; the outcome
    /// tells the caller what to do with its buffer.
    pub async fn forward(&mut self, record: &AggregatedRecord) -> ForwardOutcome {
        // ---
        let Some(token) = &self.token else {
            error!("no token held, cannot forward");
            return ForwardOutcome::Failed;
        };

        let result = self
            .http
            .post(&self.data_url)
            .bearer_auth(&token.raw)
            .json(record)
            .send()
            .await;

        match result {
            Ok(response) if response.status().is_success() => {
                info!("aggregated record delivered to cloud");
                ForwardOutcome::Delivered
            }
            Ok(response) if response.status() == StatusCode::UNAUTHORIZED => {
                error!("cloud rejected token, forcing re-authentication next cycle");
                self.token = None;
                ForwardOutcome::AuthRejected
            }
            Ok(response) => {
                error!("forward failed with status {}", response.status());
                ForwardOutcome::Failed
            }
            Err(e) => {
                error!("network error forwarding to cloud: {e}");
                ForwardOutcome::Failed
            }
        }
    }
}

/// Read the `exp` claim without verifying the signature. The node never
/// trusts the token's contents beyond scheduling its own renewal; the
/// server is the verifier.
fn decode_expiry(token: &str) -> Result<i64> {
    // ---
    let mut validation = Validation::new(Algorithm::HS256);
    validation.insecure_disable_signature_validation();
    validation.validate_exp = false;

    let data = decode::<Claims>(token, &DecodingKey::from_secret(&[]), &validation)?;
    Ok(data.claims.exp)
}

//! Runtime configuration derived from the process environment.
//!
//! Configuration is read at call time; there is no hot reload. A single
//! deployment-mode flag selects between a developer workstation (`Local`)
//! and the packaged cloud image (`Packaged`) with its fixed Chrome path and
//! hardened launch flags.

use std::path::PathBuf;

use crate::poll::PollPolicy;

/// Deployment mode, selected by the `PLATFORM` environment variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Deployment {
    /// Developer workstation: auto-detected Chrome, default flags.
    Local,
    /// Packaged cloud image: fixed Chrome path, hardened headless flags.
    #[default]
    Packaged,
}

impl Deployment {
    /// Parses the `PLATFORM` value. Only `LOCAL` (case-insensitive) selects
    /// local mode; everything else is the packaged deployment.
    pub fn from_platform(value: Option<&str>) -> Self {
        match value {
            Some(v) if v.eq_ignore_ascii_case("LOCAL") => Self::Local,
            _ => Self::Packaged,
        }
    }
}

/// Cloud credential pair checked by the serverless entry point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloudCredentials {
    pub access_key_id: String,
    pub secret_access_key: String,
}

/// Runtime configuration for a search service instance.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Deployment mode.
    pub deployment: Deployment,
    /// 2Captcha API key. When absent, challenges are skipped.
    pub captcha_api_key: Option<String>,
    /// Explicit Chrome binary override.
    pub chrome_binary: Option<PathBuf>,
    /// Directory holding the extraction payload files.
    pub scripts_dir: PathBuf,
    /// Result-slot polling budget.
    pub result_poll: PollPolicy,
    /// Challenge-solving polling budget.
    pub challenge_poll: PollPolicy,
    /// Cloud credential pair; presence-checked by `handle_event`.
    pub cloud_credentials: Option<CloudCredentials>,
    /// Default cloud region.
    pub default_region: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            deployment: Deployment::Packaged,
            captcha_api_key: None,
            chrome_binary: None,
            scripts_dir: PathBuf::from("."),
            result_poll: PollPolicy::result_slot(),
            challenge_poll: PollPolicy::challenge(),
            cloud_credentials: None,
            default_region: "us-east-1".to_string(),
        }
    }
}

impl AppConfig {
    /// Reads configuration from the process environment.
    pub fn from_env() -> Self {
        let env = |name: &str| std::env::var(name).ok().filter(|v| !v.is_empty());

        let cloud_credentials = match (
            env("MY_AWS_ACCESS_KEY_ID"),
            env("MY_AWS_SECRET_ACCESS_KEY"),
        ) {
            (Some(access_key_id), Some(secret_access_key)) => Some(CloudCredentials {
                access_key_id,
                secret_access_key,
            }),
            _ => None,
        };

        Self {
            deployment: Deployment::from_platform(env("PLATFORM").as_deref()),
            captcha_api_key: env("TWOCAPTCHA_API_KEY"),
            chrome_binary: env("CHROME_BINARY").map(PathBuf::from),
            scripts_dir: env("SCRIPTS_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(".")),
            default_region: env("AWS_DEFAULT_REGION").unwrap_or_else(|| "us-east-1".to_string()),
            cloud_credentials,
            ..Self::default()
        }
    }
}

// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! Environment variable names, defaults, and the loader that turns them
//! into a ready [`Gateway`].
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `NODE_HTTP_URL` | Chain node HTTP endpoint | Required |
//! | `CHAIN_ID` | Hex chain id (skips `get_info`) | Fetched from node |
//! | `CONTRACT_ACCOUNT` | Contract receiving the validation action | Required |
//! | `COSIGN_ACCOUNT` | Account the service key belongs to | Required |
//! | `COSIGN_PERMISSION` | Permission the service key satisfies | `active` |
//! | `COSIGN_PRIVATE_KEY` | Service key (WIF, `PVT_K1_` or PEM) | Required |
//! | `VERIFY_WS_URL` | Side-chain verifier websocket | Optional |
//! | `VERIFY_RETRY_AFTER_MS` | Reconnect delay | `2000` |
//! | `VERIFY_REQUEST_TIMEOUT_SECS` | Per-claim verification bound | `10` |
//! | `VERIFY_MESSAGE_KIND` | Response kind accepted from the verifier | `ct` |
//! | `TOS_CURRENT` | Terms version users must have accepted | Check disabled |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info` |

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use crate::blockchain::client::DEFAULT_RPC_TIMEOUT;
use crate::blockchain::{ChainId, CoSigner, CosignerIdentity, Name, NodeRpc};
use crate::channel::{ChannelConfig, VerificationChannel};
use crate::gateway::{Gateway, GatewaySettings};

/// Environment variable name for the chain node HTTP endpoint.
///
/// Must be an `http://` or `https://` URL. All chain RPC goes here.
pub const NODE_HTTP_URL_ENV: &str = "NODE_HTTP_URL";

/// Environment variable name for the chain id.
///
/// 64 hex characters. When unset, the id is read once from the node's
/// `get_info` and cached.
pub const CHAIN_ID_ENV: &str = "CHAIN_ID";

/// Environment variable name for the contract that receives the leading
/// validation action.
pub const CONTRACT_ACCOUNT_ENV: &str = "CONTRACT_ACCOUNT";

/// Environment variable name for the co-signing account.
pub const COSIGN_ACCOUNT_ENV: &str = "COSIGN_ACCOUNT";

/// Environment variable name for the co-signing permission.
///
/// # Default
/// `active`
pub const COSIGN_PERMISSION_ENV: &str = "COSIGN_PERMISSION";

/// Environment variable name for the service private key.
///
/// # Security
/// Never logged. `\n` escapes are expanded so PEM keys fit in one line.
pub const COSIGN_PRIVATE_KEY_ENV: &str = "COSIGN_PRIVATE_KEY";

/// Environment variable name for the side-chain verifier websocket.
///
/// When unset, side-chain claims are rejected with `ERR_WS_DOWN`.
pub const VERIFY_WS_URL_ENV: &str = "VERIFY_WS_URL";

/// Environment variable name for the verifier reconnect delay (milliseconds).
pub const VERIFY_RETRY_AFTER_MS_ENV: &str = "VERIFY_RETRY_AFTER_MS";

/// Environment variable name for the per-claim verification timeout (seconds).
pub const VERIFY_REQUEST_TIMEOUT_SECS_ENV: &str = "VERIFY_REQUEST_TIMEOUT_SECS";

/// Environment variable name for the accepted verifier message kind.
pub const VERIFY_MESSAGE_KIND_ENV: &str = "VERIFY_MESSAGE_KIND";

/// Environment variable name for the terms-of-service version.
///
/// When set, authentication also requires the user's row in the contract's
/// `users` table to carry this version.
pub const TOS_CURRENT_ENV: &str = "TOS_CURRENT";

/// Environment variable name for the log output format.
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";

/// Default co-signing permission.
pub const DEFAULT_COSIGN_PERMISSION: &str = "active";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required configuration: {0}")]
    Missing(&'static str),

    #[error("Invalid value for {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
}

impl ConfigError {
    fn invalid(name: &'static str, reason: impl fmt::Display) -> Self {
        ConfigError::Invalid {
            name,
            reason: reason.to_string(),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pretty" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            other => Err(ConfigError::invalid(
                LOG_FORMAT_ENV,
                format!("expected `json` or `pretty`, got `{other}`"),
            )),
        }
    }
}

/// Everything needed to build a [`Gateway`].
#[derive(Clone)]
pub struct GatewayConfig {
    pub node_url: String,
    pub chain_id: Option<ChainId>,
    pub identity: CosignerIdentity,
    private_key: String,
    pub channel: Option<ChannelConfig>,
    pub log_format: LogFormat,
    pub settings: GatewaySettings,
}

impl GatewayConfig {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_source(|name| std::env::var(name).ok())
    }

    /// Load configuration from an arbitrary variable source.
    pub fn from_source<F>(source: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Env(source);

        let node_url = env.required(NODE_HTTP_URL_ENV)?;
        let chain_id = env
            .optional(CHAIN_ID_ENV)
            .map(|raw| raw.parse::<ChainId>())
            .transpose()
            .map_err(|e| ConfigError::invalid(CHAIN_ID_ENV, e))?;

        let identity = CosignerIdentity {
            account: env.name(COSIGN_ACCOUNT_ENV, None)?,
            permission: env.name(COSIGN_PERMISSION_ENV, Some(DEFAULT_COSIGN_PERMISSION))?,
            contract: env.name(CONTRACT_ACCOUNT_ENV, None)?,
        };

        let private_key = env.required(COSIGN_PRIVATE_KEY_ENV)?.replace("\\n", "\n");

        let channel = match env.optional(VERIFY_WS_URL_ENV) {
            Some(url) => {
                let parsed = url::Url::parse(&url)
                    .map_err(|e| ConfigError::invalid(VERIFY_WS_URL_ENV, e))?;
                if parsed.scheme() != "ws" {
                    return Err(ConfigError::invalid(
                        VERIFY_WS_URL_ENV,
                        format!("unsupported scheme `{}`", parsed.scheme()),
                    ));
                }

                let mut config = ChannelConfig::new(url);
                if let Some(ms) = env.number(VERIFY_RETRY_AFTER_MS_ENV)? {
                    config.retry_after = Duration::from_millis(ms);
                }
                if let Some(secs) = env.number(VERIFY_REQUEST_TIMEOUT_SECS_ENV)? {
                    config.request_timeout = Duration::from_secs(secs);
                }
                if let Some(kind) = env.optional(VERIFY_MESSAGE_KIND_ENV) {
                    config.message_kind = kind;
                }
                Some(config)
            }
            None => None,
        };

        let tos_current = env
            .number(TOS_CURRENT_ENV)?
            .map(u32::try_from)
            .transpose()
            .map_err(|e| ConfigError::invalid(TOS_CURRENT_ENV, e))?;
        let settings = GatewaySettings {
            tos_current,
            ..GatewaySettings::default()
        };

        let log_format = env
            .optional(LOG_FORMAT_ENV)
            .map(|raw| raw.parse::<LogFormat>())
            .transpose()?
            .unwrap_or_default();

        Ok(Self {
            node_url,
            chain_id,
            identity,
            private_key,
            channel,
            log_format,
            settings,
        })
    }

    /// Build the gateway. No network I/O happens here; call
    /// [`VerificationChannel::connect`] on [`Gateway::channel`] from inside
    /// the runtime to start the verifier connection.
    pub fn build_gateway(&self) -> Result<Gateway, ConfigError> {
        let rpc = NodeRpc::with_timeout(&self.node_url, DEFAULT_RPC_TIMEOUT)
            .map_err(|e| ConfigError::invalid(NODE_HTTP_URL_ENV, e))?;

        // The key parse error is safe to surface; it never echoes key material.
        let cosigner = CoSigner::from_key_material(&self.private_key, self.identity)
            .map_err(|e| ConfigError::invalid(COSIGN_PRIVATE_KEY_ENV, e))?;

        tracing::info!(
            node = %self.node_url,
            account = %self.identity.account,
            permission = %self.identity.permission,
            contract = %self.identity.contract,
            public_key = %cosigner.public_key(),
            verifier = self.channel.as_ref().map(|c| c.url.as_str()).unwrap_or("disabled"),
            tos_current = ?self.settings.tos_current,
            "Gateway configured"
        );

        let mut gateway = Gateway::new(self.settings.clone(), Arc::new(rpc), cosigner);
        if let Some(channel) = &self.channel {
            gateway = gateway.with_channel(Arc::new(VerificationChannel::new(channel.clone())));
        }
        if let Some(chain_id) = self.chain_id {
            gateway = gateway.with_chain_id(chain_id);
        }
        Ok(gateway)
    }
}

impl fmt::Debug for GatewayConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GatewayConfig")
            .field("node_url", &self.node_url)
            .field("chain_id", &self.chain_id)
            .field("identity", &self.identity)
            .field("private_key", &"[REDACTED]")
            .field("channel", &self.channel)
            .field("log_format", &self.log_format)
            .field("settings", &self.settings)
            .finish()
    }
}

struct Env<F>(F);

impl<F> Env<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn optional(&self, name: &str) -> Option<String> {
        (self.0)(name)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn required(&self, name: &'static str) -> Result<String, ConfigError> {
        self.optional(name).ok_or(ConfigError::Missing(name))
    }

    fn name(&self, name: &'static str, default: Option<&str>) -> Result<Name, ConfigError> {
        let raw = match (self.optional(name), default) {
            (Some(raw), _) => raw,
            (None, Some(default)) => default.to_string(),
            (None, None) => return Err(ConfigError::Missing(name)),
        };
        let parsed: Name = raw.parse().map_err(|e| ConfigError::invalid(name, e))?;
        if !parsed.is_valid_account() {
            return Err(ConfigError::invalid(name, format!("`{raw}` is not an account name")));
        }
        Ok(parsed)
    }

    fn number(&self, name: &'static str) -> Result<Option<u64>, ConfigError> {
        self.optional(name)
            .map(|raw| raw.parse::<u64>().map_err(|e| ConfigError::invalid(name, e)))
            .transpose()
    }
}

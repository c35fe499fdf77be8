//! Server configuration - environment loading
//!
//! Configuration is loaded from environment variables:
//! - `JWT_SECRET`: HMAC key for bearer tokens (required, >= 32 bytes)
//! - `JWT_ISSUER`: token issuer (default: pitchhub)
//! - `TOKEN_TTL_SECS`: token lifetime (default: 86400)
//! - `UPLOADS_ROOT`: base directory for uploaded files (default: uploads)
//! - `MAX_IMAGE_BYTES` / `MAX_VIDEO_BYTES` / `MAX_FILE_BYTES`: upload limits
//! - `SWEEP_INTERVAL_SECS`: blacklist sweep period (default: 3600)
//! - `SWEEP_DAILY_AT`: daily blacklist sweep time, UTC `HH:MM` (default: 03:00)

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use chrono::NaiveTime;

const MIN_SECRET_LEN: usize = 32;
const MIB: u64 = 1024 * 1024;

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} is not set")]
    Missing(&'static str),

    #[error("invalid value for {var}: {reason}")]
    Invalid { var: &'static str, reason: String },
}

/// Bearer token settings
#[derive(Clone)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub ttl: Duration,
}

impl std::fmt::Debug for JwtConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtConfig")
            .field("secret", &"***")
            .field("issuer", &self.issuer)
            .field("ttl", &self.ttl)
            .finish()
    }
}

/// Per-category upload size limits in bytes
#[derive(Debug, Clone, Copy)]
pub struct UploadLimits {
    pub max_image_bytes: u64,
    pub max_video_bytes: u64,
    pub max_file_bytes: u64,
}

impl UploadLimits {
    /// Largest request body any upload route must accept.
    pub fn max_body_bytes(&self) -> usize {
        let largest = self
            .max_image_bytes
            .max(self.max_video_bytes)
            .max(self.max_file_bytes);
        // multipart framing overhead
        (largest + 64 * 1024) as usize
    }
}

impl Default for UploadLimits {
    fn default() -> Self {
        Self {
            max_image_bytes: 10 * MIB,
            max_video_bytes: 100 * MIB,
            max_file_bytes: 25 * MIB,
        }
    }
}

/// Blacklist sweep timing
#[derive(Debug, Clone, Copy)]
pub struct SweepConfig {
    /// Period of the recurring sweep
    pub interval: Duration,
    /// Time of day (UTC) of the daily sweep
    pub daily_at: NaiveTime,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(3600),
            daily_at: NaiveTime::from_hms_opt(3, 0, 0).unwrap_or(NaiveTime::MIN),
        }
    }
}

/// Application configuration shared by the HTTP layer
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub jwt: JwtConfig,
    pub uploads_root: PathBuf,
    pub upload_limits: UploadLimits,
    pub sweep: SweepConfig,
}

impl AppConfig {
    /// Create config from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Create config from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let secret = lookup("JWT_SECRET").ok_or(ConfigError::Missing("JWT_SECRET"))?;
        if secret.len() < MIN_SECRET_LEN {
            return Err(ConfigError::Invalid {
                var: "JWT_SECRET",
                reason: format!("must be at least {} bytes", MIN_SECRET_LEN),
            });
        }

        let defaults = UploadLimits::default();
        let sweep_defaults = SweepConfig::default();

        let daily_at = match lookup("SWEEP_DAILY_AT") {
            Some(raw) => NaiveTime::parse_from_str(raw.trim(), "%H:%M").map_err(|e| {
                ConfigError::Invalid {
                    var: "SWEEP_DAILY_AT",
                    reason: e.to_string(),
                }
            })?,
            None => sweep_defaults.daily_at,
        };

        let interval_secs: u64 = parse_or(&lookup, "SWEEP_INTERVAL_SECS", 3600)?;
        if interval_secs == 0 {
            return Err(ConfigError::Invalid {
                var: "SWEEP_INTERVAL_SECS",
                reason: "must be greater than zero".into(),
            });
        }

        Ok(Self {
            jwt: JwtConfig {
                secret,
                issuer: lookup("JWT_ISSUER").unwrap_or_else(|| "pitchhub".to_string()),
                ttl: Duration::from_secs(parse_or(&lookup, "TOKEN_TTL_SECS", 86_400)?),
            },
            uploads_root: lookup("UPLOADS_ROOT")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("uploads")),
            upload_limits: UploadLimits {
                max_image_bytes: parse_or(&lookup, "MAX_IMAGE_BYTES", defaults.max_image_bytes)?,
                max_video_bytes: parse_or(&lookup, "MAX_VIDEO_BYTES", defaults.max_video_bytes)?,
                max_file_bytes: parse_or(&lookup, "MAX_FILE_BYTES", defaults.max_file_bytes)?,
            },
            sweep: SweepConfig {
                interval: Duration::from_secs(interval_secs),
                daily_at,
            },
        })
    }

    /// Create config with an explicit secret and uploads root (for testing)
    pub fn with_root(secret: &str, uploads_root: PathBuf) -> Self {
        Self {
            jwt: JwtConfig {
                secret: secret.to_owned(),
                issuer: "pitchhub".to_string(),
                ttl: Duration::from_secs(3600),
            },
            uploads_root,
            upload_limits: UploadLimits::default(),
            sweep: SweepConfig::default(),
        }
    }
}

fn parse_or<F, T>(lookup: &F, var: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(var) {
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            var,
            reason: e.to_string(),
        }),
        None => Ok(default),
    }
}

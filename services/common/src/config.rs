//! Gateway configuration, sourced from the process environment

use serde::{Deserialize, Serialize};

use crate::errors::ServiceError;

/// Which partners hold an API key allow-list entry.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PartnerApiKeys {
    pub partner_a: Option<String>,
    pub partner_b: Option<String>,
    pub master: Option<String>,
}

/// Validated gateway configuration.
///
/// Constructed either from the process environment (`from_env`) or
/// with test-friendly defaults (`Default`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// HTTP bind port. The core does not open a socket itself, but
    /// validates the value so a transport layer can trust it.
    pub port: u16,
    /// `true` in `GATEWAY_ENV=test`: selects in-memory repositories
    /// instead of file-backed ones.
    pub in_memory: bool,
    /// Whether feed endpoints require an `X-API-Key` header.
    pub enable_api_auth: bool,
    /// Allowed CORS origin for the (out-of-scope) HTTP transport.
    pub cors_origin: String,
    /// Per-partner API keys, consulted when `enable_api_auth` is set.
    pub api_keys: PartnerApiKeys,
    /// Directory holding `orders.json`, `sequences.json`, `errors.json`.
    pub data_dir: String,
    /// Reject a second order sharing `(partnerId, externalOrderId)`
    /// instead of silently overwriting the lookup index.
    pub reject_duplicate_external_id: bool,
    /// Days to retain error events before eligible for pruning.
    /// Accepted for forward-compatibility; the reference error
    /// repository does not yet enforce it.
    pub error_retention_days: u32,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            in_memory: true,
            enable_api_auth: false,
            cors_origin: "*".to_string(),
            api_keys: PartnerApiKeys::default(),
            data_dir: "./data".to_string(),
            reject_duplicate_external_id: false,
            error_retention_days: 30,
        }
    }
}

impl GatewayConfig {
    /// Load configuration from the process environment, falling back
    /// to the documented defaults for anything unset.
    pub fn from_env() -> Result<Self, ServiceError> {
        let defaults = Self::default();

        let port = match std::env::var("PORT") {
            Ok(raw) => raw
                .parse::<u16>()
                .map_err(|_| ServiceError::InvalidRequest(format!("PORT is not a valid port number: {raw}")))?,
            Err(_) => defaults.port,
        };

        let in_memory = std::env::var("GATEWAY_ENV")
            .map(|v| v.eq_ignore_ascii_case("test"))
            .unwrap_or(defaults.in_memory);

        let enable_api_auth = match std::env::var("ENABLE_API_AUTH") {
            Ok(raw) => parse_bool(&raw)
                .ok_or_else(|| ServiceError::InvalidRequest(format!("ENABLE_API_AUTH is not a boolean: {raw}")))?,
            Err(_) => defaults.enable_api_auth,
        };

        let cors_origin = std::env::var("CORS_ORIGIN").unwrap_or(defaults.cors_origin);

        let api_keys = PartnerApiKeys {
            partner_a: std::env::var("PARTNER_A_API_KEY").ok(),
            partner_b: std::env::var("PARTNER_B_API_KEY").ok(),
            master: std::env::var("MASTER_API_KEY").ok(),
        };

        let data_dir = std::env::var("DATA_DIR").unwrap_or(defaults.data_dir);

        let reject_duplicate_external_id = match std::env::var("REJECT_DUPLICATE_EXTERNAL_ID") {
            Ok(raw) => parse_bool(&raw).ok_or_else(|| {
                ServiceError::InvalidRequest(format!("REJECT_DUPLICATE_EXTERNAL_ID is not a boolean: {raw}"))
            })?,
            Err(_) => defaults.reject_duplicate_external_id,
        };

        let error_retention_days = match std::env::var("ERROR_RETENTION_DAYS") {
            Ok(raw) => raw
                .parse::<u32>()
                .map_err(|_| ServiceError::InvalidRequest(format!("ERROR_RETENTION_DAYS is not a number: {raw}")))?,
            Err(_) => defaults.error_retention_days,
        };

        if enable_api_auth && api_keys.master.is_none() && api_keys.partner_a.is_none() && api_keys.partner_b.is_none()
        {
            return Err(ServiceError::InvalidRequest(
                "ENABLE_API_AUTH is set but no API keys are configured".to_string(),
            ));
        }

        Ok(Self {
            port,
            in_memory,
            enable_api_auth,
            cors_origin,
            api_keys,
            data_dir,
            reject_duplicate_external_id,
            error_retention_days,
        })
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" => Some(true),
        "0" | "false" | "no" => Some(false),
        _ => None,
    }
}

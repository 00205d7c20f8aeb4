//! API-key authorization guard for the feed ingress endpoints.
//!
//! This is a pure decision function: no header parsing, no socket. A
//! transport layer calls `ApiKeyGuard::authorize` with whatever it
//! extracted from the request and maps the result to a status code.

use feed_common::{GatewayConfig, PartnerId};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("missing api key")]
    MissingApiKey,
    #[error("invalid api key")]
    InvalidApiKey,
}

pub struct ApiKeyGuard;

impl ApiKeyGuard {
    /// Authorizes a request against `config`'s per-partner allow-list.
    /// When auth is disabled, every request is authorized. A master
    /// key, if configured, bypasses the per-partner check.
    pub fn authorize(
        config: &GatewayConfig,
        partner: PartnerId,
        provided_key: Option<&str>,
    ) -> Result<(), AuthError> {
        if !config.enable_api_auth {
            return Ok(());
        }

        let Some(key) = provided_key else {
            return Err(AuthError::MissingApiKey);
        };

        if let Some(master) = &config.api_keys.master {
            if master == key {
                return Ok(());
            }
        }

        let expected = match partner {
            PartnerId::PartnerA => &config.api_keys.partner_a,
            PartnerId::PartnerB => &config.api_keys.partner_b,
        };

        match expected {
            Some(expected_key) if expected_key == key => Ok(()),
            _ => Err(AuthError::InvalidApiKey),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use feed_common::PartnerApiKeys;

    fn config_with_auth(keys: PartnerApiKeys) -> GatewayConfig {
        GatewayConfig {
            enable_api_auth: true,
            api_keys: keys,
            ..GatewayConfig::default()
        }
    }

    #[test]
    fn auth_disabled_allows_any_request() {
        let config = GatewayConfig::default();
        assert!(ApiKeyGuard::authorize(&config, PartnerId::PartnerA, None).is_ok());
    }

    #[test]
    fn missing_key_is_rejected_when_auth_enabled() {
        let config = config_with_auth(PartnerApiKeys {
            partner_a: Some("secret-a".to_string()),
            ..Default::default()
        });
        assert_eq!(
            ApiKeyGuard::authorize(&config, PartnerId::PartnerA, None).unwrap_err(),
            AuthError::MissingApiKey
        );
    }

    #[test]
    fn wrong_key_is_rejected() {
        let config = config_with_auth(PartnerApiKeys {
            partner_a: Some("secret-a".to_string()),
            ..Default::default()
        });
        assert_eq!(
            ApiKeyGuard::authorize(&config, PartnerId::PartnerA, Some("wrong")).unwrap_err(),
            AuthError::InvalidApiKey
        );
    }

    #[test]
    fn correct_partner_key_is_authorized() {
        let config = config_with_auth(PartnerApiKeys {
            partner_a: Some("secret-a".to_string()),
            ..Default::default()
        });
        assert!(ApiKeyGuard::authorize(&config, PartnerId::PartnerA, Some("secret-a")).is_ok());
    }

    #[test]
    fn master_key_bypasses_partner_check() {
        let config = config_with_auth(PartnerApiKeys {
            master: Some("master-key".to_string()),
            ..Default::default()
        });
        assert!(ApiKeyGuard::authorize(&config, PartnerId::PartnerB, Some("master-key")).is_ok());
    }
}

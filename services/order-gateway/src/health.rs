//! The `/health` response value (§6), producible without touching
//! either repository.

use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct GatewayHealth {
    pub status: &'static str,
    pub timestamp: DateTime<Utc>,
}

impl GatewayHealth {
    #[must_use]
    pub fn healthy() -> Self {
        Self {
            status: "healthy",
            timestamp: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn healthy_reports_a_recent_timestamp() {
        let health = GatewayHealth::healthy();
        assert_eq!(health.status, "healthy");
        assert!(Utc::now().signed_duration_since(health.timestamp).num_seconds() < 5);
    }
}

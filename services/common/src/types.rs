//! Shared domain primitives used by every feed-gateway crate

use serde::{Deserialize, Serialize};

/// The closed set of upstream order partners.
///
/// Closed by construction: nothing outside validation and
/// normalization should ever need to branch on a value outside this
/// set, so adding a partner means touching exactly those two places.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PartnerId {
    PartnerA,
    PartnerB,
}

impl PartnerId {
    /// All partners, in a stable order — used to zero-initialize
    /// per-partner aggregates so output shape never depends on which
    /// partners happen to have data.
    pub const ALL: [PartnerId; 2] = [PartnerId::PartnerA, PartnerId::PartnerB];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::PartnerA => "PARTNER_A",
            Self::PartnerB => "PARTNER_B",
        }
    }

    /// Parses both the canonical (`PARTNER_A`) and short (`A`) forms.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.to_ascii_uppercase().as_str() {
            "PARTNER_A" | "A" => Some(Self::PartnerA),
            "PARTNER_B" | "B" => Some(Self::PartnerB),
            _ => None,
        }
    }
}

impl std::fmt::Display for PartnerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Rounds to two decimal places, half-up, via scaled-integer
/// arithmetic (`round(x*100)/100`) so money amounts never drift
/// across repeated float operations.
#[must_use]
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_short_and_canonical_forms() {
        assert_eq!(PartnerId::parse("PARTNER_A"), Some(PartnerId::PartnerA));
        assert_eq!(PartnerId::parse("a"), Some(PartnerId::PartnerA));
        assert_eq!(PartnerId::parse("B"), Some(PartnerId::PartnerB));
        assert_eq!(PartnerId::parse("PARTNER_C"), None);
    }

    #[test]
    fn round2_matches_half_up_convention() {
        assert_eq!(round2(2.172_825), 2.17);
        assert_eq!(round2(100.0), 100.0);
        assert_eq!(round2(60.0 * 0.15), 9.0);
    }
}

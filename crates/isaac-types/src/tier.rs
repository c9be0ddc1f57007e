use serde::{Deserialize, Serialize};

/// Risk classification governing how a command is gated before it runs.
///
/// Manifests declare tiers numerically (`1`, `2`, `2.5`, `3`, `4`); the
/// ordering follows that number, so `Tier::Lockdown` is the strictest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub enum Tier {
    /// Tier 1: runs immediately, never prompts.
    Instant,
    /// Tier 2: a confident correction is applied silently with a notice.
    AutoCorrect,
    /// Tier 2.5: corrections are shown and the user confirms.
    CorrectConfirm,
    /// Tier 3: a validation pass runs before confirmation.
    Elevated,
    /// Tier 4: always confirmed, never corrected.
    Lockdown,
}

impl Tier {
    pub const ALL: [Tier; 5] = [
        Tier::Instant,
        Tier::AutoCorrect,
        Tier::CorrectConfirm,
        Tier::Elevated,
        Tier::Lockdown,
    ];

    /// The numeric label used in manifests and queue metadata.
    pub fn as_f64(self) -> f64 {
        match self {
            Tier::Instant => 1.0,
            Tier::AutoCorrect => 2.0,
            Tier::CorrectConfirm => 2.5,
            Tier::Elevated => 3.0,
            Tier::Lockdown => 4.0,
        }
    }

    /// Whether the tier ever asks the user before executing.
    pub fn requires_confirmation(self) -> bool {
        matches!(self, Tier::CorrectConfirm | Tier::Elevated | Tier::Lockdown)
    }
}

impl TryFrom<f64> for Tier {
    type Error = String;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        Tier::ALL
            .into_iter()
            .find(|tier| (tier.as_f64() - value).abs() < f64::EPSILON)
            .ok_or_else(|| format!("invalid tier {value}: expected one of 1, 2, 2.5, 3, 4"))
    }
}

impl From<Tier> for f64 {
    fn from(tier: Tier) -> f64 {
        tier.as_f64()
    }
}

impl std::str::FromStr for Tier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value: f64 = s
            .trim()
            .parse()
            .map_err(|_| format!("invalid tier '{s}': expected one of 1, 2, 2.5, 3, 4"))?;
        Tier::try_from(value)
    }
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Tier::Instant => write!(f, "1"),
            Tier::AutoCorrect => write!(f, "2"),
            Tier::CorrectConfirm => write!(f, "2.5"),
            Tier::Elevated => write!(f, "3"),
            Tier::Lockdown => write!(f, "4"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tier_parses_fractional_label() {
        assert_eq!("2.5".parse::<Tier>().unwrap(), Tier::CorrectConfirm);
        assert_eq!("4".parse::<Tier>().unwrap(), Tier::Lockdown);
        assert!("5".parse::<Tier>().is_err());
        assert!("two".parse::<Tier>().is_err());
    }

    #[test]
    fn tier_ordering_follows_risk() {
        assert!(Tier::Instant < Tier::AutoCorrect);
        assert!(Tier::AutoCorrect < Tier::CorrectConfirm);
        assert!(Tier::Elevated < Tier::Lockdown);
    }

    #[test]
    fn tier_deserializes_from_integer_and_float() {
        #[derive(Deserialize)]
        struct Wrapper {
            tier: Tier,
        }
        let w: Wrapper = toml::from_str("tier = 1").unwrap();
        assert_eq!(w.tier, Tier::Instant);
        let w: Wrapper = toml::from_str("tier = 2.5").unwrap();
        assert_eq!(w.tier, Tier::CorrectConfirm);
        assert!(toml::from_str::<Wrapper>("tier = 7").is_err());
    }

    #[test]
    fn tier_display_matches_manifest_label() {
        for tier in Tier::ALL {
            assert_eq!(tier.to_string().parse::<Tier>().unwrap(), tier);
        }
    }

    #[test]
    fn confirmation_tiers() {
        assert!(!Tier::Instant.requires_confirmation());
        assert!(!Tier::AutoCorrect.requires_confirmation());
        assert!(Tier::Lockdown.requires_confirmation());
    }
}

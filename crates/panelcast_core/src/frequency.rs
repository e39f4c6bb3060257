//! Time series frequency codes.

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};

/// Spacing between consecutive timestamps of a panel series.
///
/// Panel timestamps are `i64` values spaced uniformly at the
/// frequency's tick. Calendar-irregular frequencies (monthly and
/// coarser) use nominal tick lengths of 30/91/365 days; a panel must be
/// generated with the same convention for randomized validation windows
/// to line up with its rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Frequency {
    /// Secondly (S)
    Secondly,
    /// Minutely (T)
    Minutely,
    /// Hourly (H)
    Hourly,
    /// Daily (D)
    Daily,
    /// Weekly (W)
    Weekly,
    /// Monthly (M), nominal 30 days
    Monthly,
    /// Quarterly (Q), nominal 91 days
    Quarterly,
    /// Yearly (Y), nominal 365 days
    Yearly,
}

impl Frequency {
    /// Parse a frequency from its short code or name.
    pub fn from_code(s: &str) -> Result<Self> {
        match s.to_uppercase().as_str() {
            "S" | "SECONDLY" => Ok(Self::Secondly),
            "T" | "MIN" | "MINUTELY" => Ok(Self::Minutely),
            "H" | "HOURLY" => Ok(Self::Hourly),
            "D" | "DAILY" => Ok(Self::Daily),
            "W" | "WEEKLY" => Ok(Self::Weekly),
            "M" | "MONTHLY" => Ok(Self::Monthly),
            "Q" | "QUARTERLY" => Ok(Self::Quarterly),
            "Y" | "A" | "YEARLY" | "ANNUAL" => Ok(Self::Yearly),
            other => Err(CoreError::UnknownFrequency(other.to_string())),
        }
    }

    /// Tick length in seconds between consecutive timestamps.
    #[must_use]
    pub const fn tick_seconds(&self) -> i64 {
        match self {
            Self::Secondly => 1,
            Self::Minutely => 60,
            Self::Hourly => 3_600,
            Self::Daily => 86_400,
            Self::Weekly => 604_800,
            Self::Monthly => 30 * 86_400,
            Self::Quarterly => 91 * 86_400,
            Self::Yearly => 365 * 86_400,
        }
    }

    /// Default forecast horizon for this frequency.
    #[must_use]
    pub const fn default_horizon(&self) -> usize {
        match self {
            Self::Secondly | Self::Minutely => 60,
            Self::Hourly => 48,
            Self::Daily => 30,
            Self::Weekly => 8,
            Self::Monthly => 12,
            Self::Quarterly | Self::Yearly => 4,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frequency_parsing() {
        assert_eq!(Frequency::from_code("D").unwrap(), Frequency::Daily);
        assert_eq!(Frequency::from_code("hourly").unwrap(), Frequency::Hourly);
        assert!(Frequency::from_code("X").is_err());
    }

    #[test]
    fn test_tick_seconds() {
        assert_eq!(Frequency::Daily.tick_seconds(), 86_400);
        assert_eq!(Frequency::Minutely.tick_seconds(), 60);
    }

    #[test]
    fn test_default_horizons() {
        assert_eq!(Frequency::Daily.default_horizon(), 30);
        assert_eq!(Frequency::Yearly.default_horizon(), 4);
    }
}

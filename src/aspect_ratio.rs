//! Target aspect ratios for use-case configuration.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A width:height ratio such as 16:9.
///
/// The denominator is never zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AspectRatio {
    numerator: u32,
    denominator: u32,
}

impl AspectRatio {
    /// Widescreen 16:9.
    pub const RATIO_16_9: Self = Self {
        numerator: 16,
        denominator: 9,
    };
    /// Standard 4:3.
    pub const RATIO_4_3: Self = Self {
        numerator: 4,
        denominator: 3,
    };

    /// Create a ratio, or `None` if either side is zero.
    #[must_use]
    pub const fn new(numerator: u32, denominator: u32) -> Option<Self> {
        if numerator == 0 || denominator == 0 {
            return None;
        }
        Some(Self {
            numerator,
            denominator,
        })
    }

    /// Width part of the ratio.
    #[must_use]
    pub const fn numerator(self) -> u32 {
        self.numerator
    }

    /// Height part of the ratio.
    #[must_use]
    pub const fn denominator(self) -> u32 {
        self.denominator
    }

    /// Ratio as a floating point value.
    #[must_use]
    pub fn as_f64(self) -> f64 {
        f64::from(self.numerator) / f64::from(self.denominator)
    }
}

impl Default for AspectRatio {
    fn default() -> Self {
        Self::RATIO_4_3
    }
}

impl fmt::Display for AspectRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.numerator, self.denominator)
    }
}

/// Error parsing an aspect ratio from text.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid aspect ratio `{0}` (expected W:H with non-zero sides)")]
pub struct ParseAspectRatioError(String);

impl FromStr for AspectRatio {
    type Err = ParseAspectRatioError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ParseAspectRatioError(s.to_owned());
        let (num, den) = s.trim().split_once(':').ok_or_else(invalid)?;
        let num = num.trim().parse().map_err(|_| invalid())?;
        let den = den.trim().parse().map_err(|_| invalid())?;
        Self::new(num, den).ok_or_else(invalid)
    }
}

impl TryFrom<String> for AspectRatio {
    type Error = ParseAspectRatioError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<AspectRatio> for String {
    fn from(ratio: AspectRatio) -> Self {
        ratio.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_named_ratios() {
        assert_eq!(AspectRatio::RATIO_16_9.numerator(), 16);
        assert_eq!(AspectRatio::RATIO_16_9.denominator(), 9);
        assert_eq!(AspectRatio::RATIO_4_3.numerator(), 4);
        assert_eq!(AspectRatio::RATIO_4_3.denominator(), 3);
        assert_eq!(AspectRatio::default(), AspectRatio::RATIO_4_3);
    }

    #[test]
    fn test_zero_sides_rejected() {
        assert!(AspectRatio::new(16, 0).is_none());
        assert!(AspectRatio::new(0, 9).is_none());
        assert_eq!(AspectRatio::new(21, 9).map(AspectRatio::numerator), Some(21));
    }

    #[test]
    fn test_parse() {
        assert_eq!("16:9".parse(), Ok(AspectRatio::RATIO_16_9));
        assert_eq!(" 4 : 3 ".parse(), Ok(AspectRatio::RATIO_4_3));
        assert!("16/9".parse::<AspectRatio>().is_err());
        assert!("4:0".parse::<AspectRatio>().is_err());
        assert_eq!(AspectRatio::RATIO_16_9.to_string(), "16:9");
    }

    #[test]
    fn test_serde_as_string() {
        let json = serde_json::to_string(&AspectRatio::RATIO_16_9).expect("serialize");
        assert_eq!(json, "\"16:9\"");
        let back: AspectRatio = serde_json::from_str("\"4:3\"").expect("deserialize");
        assert_eq!(back, AspectRatio::RATIO_4_3);
        assert!(serde_json::from_str::<AspectRatio>("\"1:0\"").is_err());
    }
}

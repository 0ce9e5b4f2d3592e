//! The closed set of tracked platforms and follower-count formatting.

use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Platform {
    Facebook,
    Github,
    Instagram,
    Linkedin,
    Twitter,
    Youtube,
}

impl Platform {
    pub const ALL: [Platform; 6] = [
        Platform::Facebook,
        Platform::Github,
        Platform::Instagram,
        Platform::Linkedin,
        Platform::Twitter,
        Platform::Youtube,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Facebook => "facebook",
            Platform::Github => "github",
            Platform::Instagram => "instagram",
            Platform::Linkedin => "linkedin",
            Platform::Twitter => "twitter",
            Platform::Youtube => "youtube",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown platform: {0}")]
pub struct UnknownPlatform(pub String);

impl FromStr for Platform {
    type Err = UnknownPlatform;

    /// Case-insensitive, otherwise exact.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowered = s.to_ascii_lowercase();
        Platform::ALL
            .into_iter()
            .find(|p| p.as_str() == lowered)
            .ok_or(UnknownPlatform(s.to_string()))
    }
}

/// Per-platform display: one decimal place, rounded half-up.
/// `1234` → `"1.2K"`, `2_300_000` → `"2.3M"`, below 1000 the bare integer.
pub fn format_followers(count: u64) -> String {
    if count >= 1_000_000 {
        one_decimal(count, 1_000_000, 'M')
    } else if count >= 1_000 {
        one_decimal(count, 1_000, 'K')
    } else {
        count.to_string()
    }
}

fn one_decimal(count: u64, unit: u64, suffix: char) -> String {
    let step = unit / 10;
    let tenths = count.saturating_add(step / 2) / step;
    format!("{}.{}{}", tenths / 10, tenths % 10, suffix)
}

/// Grand-total display: floor division with a trailing `+`.
/// `1_999` → `"1K+"`, `2_500_000` → `"2M+"`, below 1000 the bare integer.
pub fn format_total(count: u64) -> String {
    if count >= 1_000_000 {
        format!("{}M+", count / 1_000_000)
    } else if count >= 1_000 {
        format!("{}K+", count / 1_000)
    } else {
        count.to_string()
    }
}

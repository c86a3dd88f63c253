//! Requested playback quality and the manifest tags that identify it.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::ResolveError;

/// Quality preference for a relay.
///
/// `Auto` walks the fallback cascade; `Source` always takes the first variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Quality {
    #[default]
    #[serde(rename = "auto")]
    Auto,
    #[serde(rename = "source")]
    Source,
    #[serde(rename = "720p60")]
    P720p60,
    #[serde(rename = "720p")]
    P720,
    #[serde(rename = "480p")]
    P480,
    #[serde(rename = "360p")]
    P360,
    #[serde(rename = "160p")]
    P160,
}

/// Qualities tried in order when the request is `Auto` or could not be met.
pub const AUTO_CASCADE: [Quality; 3] = [Quality::P720p60, Quality::P720, Quality::P480];

impl Quality {
    pub const ALL: [Quality; 7] = [
        Self::Auto,
        Self::Source,
        Self::P720p60,
        Self::P720,
        Self::P480,
        Self::P360,
        Self::P160,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::Source => "source",
            Self::P720p60 => "720p60",
            Self::P720 => "720p",
            Self::P480 => "480p",
            Self::P360 => "360p",
            Self::P160 => "160p",
        }
    }

    /// Metadata substrings that mark a variant of this quality, in search order.
    ///
    /// The named `VIDEO` tag is always searched before the resolution tag.
    /// 720p60 has no resolution equivalent since 1280x720 also matches 720p30.
    pub fn markers(&self) -> &'static [&'static str] {
        match self {
            Self::Auto | Self::Source => &[],
            Self::P720p60 => &[r#"VIDEO="720p60""#],
            Self::P720 => &[r#"VIDEO="720p""#, "RESOLUTION=1280x720"],
            Self::P480 => &[r#"VIDEO="480p""#, "RESOLUTION=854x480"],
            Self::P360 => &[r#"VIDEO="360p""#, "RESOLUTION=640x360"],
            Self::P160 => &[r#"VIDEO="160p""#, "RESOLUTION=284x160"],
        }
    }

    /// Interpret an optional request value; absent, blank or unrecognized means `Auto`.
    pub fn from_request(value: Option<&str>) -> Self {
        match value.map(str::trim) {
            None | Some("") => Self::Auto,
            Some(s) => s.parse().unwrap_or_else(|_| {
                warn!(quality = %s, "Unrecognized quality, falling back to auto");
                Self::Auto
            }),
        }
    }
}

impl FromStr for Quality {
    type Err = ResolveError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|q| q.as_str() == lower)
            .ok_or_else(|| ResolveError::UnknownQuality(s.to_string()))
    }
}

impl fmt::Display for Quality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

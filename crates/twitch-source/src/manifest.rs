//! Variant selection over a raw master playlist.
//!
//! Selection is line-oriented: a URL line's metadata is the line directly above
//! it, and tags are matched as substrings of that line.

use tracing::debug;

use crate::quality::{AUTO_CASCADE, Quality};

/// A master playlist split into lines.
#[derive(Debug, Clone)]
pub struct Manifest<'a> {
    lines: Vec<&'a str>,
}

fn is_url(line: &str) -> bool {
    line.starts_with("http")
}

impl<'a> Manifest<'a> {
    pub fn parse(text: &'a str) -> Self {
        Self {
            lines: text.lines().map(str::trim_end).collect(),
        }
    }

    /// First URL line; the source variant on Twitch manifests.
    pub fn first_url(&self) -> Option<&'a str> {
        self.lines.iter().copied().find(|l| is_url(l))
    }

    /// First URL line whose preceding metadata line contains `marker`.
    pub fn find_tagged(&self, marker: &str) -> Option<&'a str> {
        self.lines.iter().enumerate().find_map(|(i, line)| {
            if !is_url(line) {
                return None;
            }
            let meta = if i > 0 { self.lines[i - 1] } else { "" };
            meta.contains(marker).then_some(*line)
        })
    }

    /// Variant for one specific quality, without any fallback.
    pub fn find_quality(&self, quality: Quality) -> Option<&'a str> {
        quality
            .markers()
            .iter()
            .find_map(|marker| self.find_tagged(marker))
    }

    /// Pick a variant for `quality`, degrading through the auto cascade.
    ///
    /// Returns `None` only when the manifest has no URL line at all.
    pub fn select(&self, quality: Quality) -> Option<&'a str> {
        match quality {
            Quality::Source => {
                if let Some(url) = self.first_url() {
                    return Some(url);
                }
            }
            Quality::Auto => {}
            specific => {
                if let Some(url) = self.find_quality(specific) {
                    return Some(url);
                }
                debug!(quality = %specific, "Requested quality not in manifest, falling back");
            }
        }

        AUTO_CASCADE
            .iter()
            .find_map(|q| self.find_quality(*q))
            .or_else(|| self.first_url())
    }
}

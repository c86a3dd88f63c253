//! ffmpeg diagnostic output parsing.
//!
//! Progress lines look like:
//! `frame=  255 fps= 30 q=-1.0 size=    1234kB time=00:00:08.50 bitrate=1188.5kbits/s speed=   1x`
//!
//! Each field has its own extractor; [`parse_progress`] composes them. Values are
//! kept as the text ffmpeg printed, units included.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Substring that marks a progress line.
pub const PROGRESS_MARKER: &str = "frame=";

static FPS_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"fps=\s*(\d+(?:\.\d+)?)").expect("valid regex"));
static BITRATE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"bitrate=\s*([\w./]+)").expect("valid regex"));
static SPEED_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"speed=\s*([\w.]+)").expect("valid regex"));
static TIME_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"time=\s*([\d:.]+)").expect("valid regex"));

/// Latest progress snapshot of the relay process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayMetrics {
    pub fps: String,
    pub bitrate: String,
    pub speed: String,
    pub time: String,
}

fn capture<'a>(regex: &Regex, line: &'a str) -> Option<&'a str> {
    regex
        .captures(line)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
}

/// Frames per second, e.g. `30` or `29.97`.
pub fn parse_fps(line: &str) -> Option<&str> {
    capture(&FPS_REGEX, line)
}

/// Output bitrate with its unit, e.g. `1188.5kbits/s`.
pub fn parse_bitrate(line: &str) -> Option<&str> {
    capture(&BITRATE_REGEX, line)
}

/// Speed multiplier, e.g. `1x` or `1.01x`.
pub fn parse_speed(line: &str) -> Option<&str> {
    capture(&SPEED_REGEX, line)
}

/// Elapsed media time, e.g. `00:00:08.50`.
pub fn parse_time(line: &str) -> Option<&str> {
    capture(&TIME_REGEX, line)
}

pub fn is_progress_line(line: &str) -> bool {
    line.contains(PROGRESS_MARKER)
}

/// Parse a progress line into a metrics snapshot.
///
/// A line counts as progress only if it carries the frame marker and a
/// bitrate. Missing fps, speed or time fall back to `0`, `1x` and `00:00:00`.
pub fn parse_progress(line: &str) -> Option<RelayMetrics> {
    if !is_progress_line(line) {
        return None;
    }
    let bitrate = parse_bitrate(line)?;

    Some(RelayMetrics {
        fps: parse_fps(line).unwrap_or("0").to_string(),
        bitrate: bitrate.to_string(),
        speed: parse_speed(line).unwrap_or("1x").to_string(),
        time: parse_time(line).unwrap_or("00:00:00").to_string(),
    })
}

//! M3U playlist text format
//!
//! `parse` turns playlist text into an ordered [`Playlist`]; `serialize`
//! turns it back into text. Directive lines are kept verbatim so a
//! parse/serialize pass only normalises line endings and blank lines.

use lazy_static::lazy_static;
use regex::Regex;
use std::collections::HashMap;

use crate::error::{GatewayError, GatewayResult};
use crate::models::{Playlist, PlaylistEntry};

const HEADER: &str = "#EXTM3U";
const EXTINF: &str = "#EXTINF:";

lazy_static! {
    /// Regex to parse EXTINF attributes (tvg-id="...", group-title="...", etc)
    static ref ATTR_REGEX: Regex = Regex::new(r#"(\w+(?:-\w+)*)="([^"]*)""#).unwrap();

    /// Regex to extract duration from EXTINF line
    static ref DURATION_REGEX: Regex = Regex::new(r"^-?\d+").unwrap();
}

/// Parsed EXTINF line data
#[derive(Debug, Default)]
pub struct ExtinfData {
    pub duration: i32,
    pub attributes: HashMap<String, String>,
    pub title: String,
}

/// Parse an EXTINF line
/// Format: #EXTINF:duration tvg-id="..." tvg-name="..." tvg-logo="..." group-title="...",Title
pub fn parse_extinf(line: &str) -> Option<ExtinfData> {
    let content = line.strip_prefix(EXTINF)?;
    let first_comma = title_separator(content)?;

    let header = &content[..first_comma];
    let title = content[first_comma + 1..].trim().to_string();

    let duration = DURATION_REGEX
        .find(header)
        .and_then(|m| m.as_str().parse().ok())
        .unwrap_or(-1);

    let attributes = ATTR_REGEX
        .captures_iter(header)
        .map(|caps| (caps[1].to_string(), caps[2].to_string()))
        .collect();

    Some(ExtinfData {
        duration,
        attributes,
        title,
    })
}

/// First comma outside a quoted attribute value
fn title_separator(content: &str) -> Option<usize> {
    let mut in_quotes = false;
    for (i, c) in content.char_indices() {
        match c {
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => return Some(i),
            _ => {}
        }
    }
    None
}

/// Parse playlist text
///
/// The first non-blank line must be the `#EXTM3U` header. Every other
/// `#` line is attached to the next URI line; directives after the last
/// URI are dropped.
pub fn parse(text: &str) -> GatewayResult<Playlist> {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    let mut lines = text.lines().map(str::trim).filter(|line| !line.is_empty());

    let header = match lines.next() {
        Some(line) if line.starts_with(HEADER) => line.to_string(),
        _ => {
            return Err(GatewayError::Upstream(
                "Invalid playlist format (missing #EXTM3U header)".to_string(),
            ))
        }
    };

    let mut entries = Vec::new();
    let mut pending = Vec::new();
    for line in lines {
        if line.starts_with('#') {
            pending.push(line.to_string());
        } else {
            entries.push(PlaylistEntry::new(std::mem::take(&mut pending), line));
        }
    }

    if !pending.is_empty() {
        tracing::debug!(dropped = pending.len(), "trailing playlist directives without URI");
    }

    Ok(Playlist { header, entries })
}

/// Serialize a playlist back to text
pub fn serialize(playlist: &Playlist) -> String {
    let header = if playlist.header.is_empty() {
        HEADER
    } else {
        playlist.header.as_str()
    };

    let mut out = String::with_capacity(64 * (playlist.len() + 1));
    out.push_str(header);
    out.push('\n');
    for entry in &playlist.entries {
        for directive in &entry.directives {
            out.push_str(directive);
            out.push('\n');
        }
        out.push_str(&entry.uri);
        out.push('\n');
    }
    out
}

use crate::services::m3u::parse_extinf;

/// Single playlist entry (channel/movie/episode)
///
/// `directives` are the `#...` lines that precede the URI in the source
/// playlist (`#EXTINF`, `#EXTGRP`, `#EXTVLCOPT`, ...). They are carried
/// through untouched; only `uri` is ever rewritten.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaylistEntry {
    pub directives: Vec<String>,
    pub uri: String,
}

impl PlaylistEntry {
    pub fn new(directives: Vec<String>, uri: impl Into<String>) -> Self {
        Self {
            directives,
            uri: uri.into(),
        }
    }

    /// Human readable name for diagnostics: `tvg-name`, else the EXTINF title
    pub fn display_name(&self) -> Option<String> {
        let extinf = self.directives.iter().find_map(|line| parse_extinf(line))?;
        extinf
            .attributes
            .get("tvg-name")
            .filter(|name| !name.is_empty())
            .cloned()
            .or_else(|| Some(extinf.title).filter(|title| !title.is_empty()))
    }
}

/// Ordered playlist; order is preserved end-to-end
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Playlist {
    /// The `#EXTM3U` line, attributes included
    pub header: String,
    pub entries: Vec<PlaylistEntry>,
}

impl Playlist {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

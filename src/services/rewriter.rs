//! Catalog rewriter
//!
//! Produces a copy of an upstream playlist whose every URI points back at
//! the gateway. Deterministic: identical inputs give identical output,
//! which is what makes cached artifacts reusable. Any unparseable entry
//! URI fails the whole rewrite; no partial playlist is ever returned.

use crate::error::GatewayResult;
use crate::models::{Credentials, HostIdentity, Playlist, PlaylistEntry};
use crate::services::address::{self, ResourceIndex};

/// Rewrite with ids taken straight from each URI's final path segment
pub fn rewrite(playlist: &Playlist, creds: &Credentials, identity: &HostIdentity) -> GatewayResult<Playlist> {
    rewrite_entries(playlist, creds, identity, |position, entry| {
        let url = address::parse_entry_uri(entry, position)?;
        Ok(address::resource_id(&url))
    })
}

/// Rewrite a plain playlist using the ids of its resource index
pub fn rewrite_indexed(
    playlist: &Playlist,
    index: &ResourceIndex,
    creds: &Credentials,
    identity: &HostIdentity,
) -> GatewayResult<Playlist> {
    rewrite_entries(playlist, creds, identity, |position, entry| {
        match index.id_at(position) {
            Some(id) => Ok(id.to_string()),
            // Index built from another playlist; fall back to the plain id
            None => address::parse_entry_uri(entry, position).map(|url| address::resource_id(&url)),
        }
    })
}

fn rewrite_entries<F>(
    playlist: &Playlist,
    creds: &Credentials,
    identity: &HostIdentity,
    mut id_for: F,
) -> GatewayResult<Playlist>
where
    F: FnMut(usize, &PlaylistEntry) -> GatewayResult<String>,
{
    let entries = playlist
        .entries
        .iter()
        .enumerate()
        .map(|(position, entry)| -> GatewayResult<PlaylistEntry> {
            let id = id_for(position, entry)?;
            Ok(PlaylistEntry {
                directives: entry.directives.clone(),
                uri: address::encode_entry_uri(identity, creds, &id),
            })
        })
        .collect::<GatewayResult<Vec<_>>>()?;

    Ok(Playlist {
        header: playlist.header.clone(),
        entries,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GatewayError;
    use crate::services::m3u;
    use std::collections::HashSet;

    const UPSTREAM: &str = "#EXTM3U\n\
        #EXTINF:-1 tvg-id=\"a\" group-title=\"News\",Alpha\n\
        http://provider.tv/live/upuser/uppass/101.ts\n\
        #EXTINF:-1 group-title=\"Movies\",Beta\n\
        http://provider.tv/movie/upuser/uppass/202.mkv\n\
        #EXTINF:-1,Gamma\n\
        http://provider.tv/series/upuser/uppass/303.mp4\n";

    fn identity() -> HostIdentity {
        HostIdentity {
            hostname: "gw.example".to_string(),
            port: 8080,
            use_https: true,
        }
    }

    fn creds() -> Credentials {
        Credentials::new("alice", "s3cret")
    }

    #[test]
    fn test_rewrite_preserves_count_order_and_attributes() {
        let playlist = m3u::parse(UPSTREAM).unwrap();
        let rewritten = rewrite(&playlist, &creds(), &identity()).unwrap();

        assert_eq!(rewritten.len(), playlist.len());
        let uris: Vec<&str> = rewritten.entries.iter().map(|e| e.uri.as_str()).collect();
        assert_eq!(
            uris,
            vec![
                "https://gw.example:8080/alice/s3cret/101.ts",
                "https://gw.example:8080/alice/s3cret/202.mkv",
                "https://gw.example:8080/alice/s3cret/303.mp4",
            ]
        );
        for (before, after) in playlist.entries.iter().zip(&rewritten.entries) {
            assert_eq!(before.directives, after.directives);
        }
        assert_eq!(uris.iter().collect::<HashSet<_>>().len(), uris.len());
    }

    #[test]
    fn test_rewrite_hides_upstream() {
        let playlist = m3u::parse(UPSTREAM).unwrap();
        let text = m3u::serialize(&rewrite(&playlist, &creds(), &identity()).unwrap());

        assert!(!text.contains("provider.tv"));
        assert!(!text.contains("upuser"));
        assert!(!text.contains("uppass"));
    }

    #[test]
    fn test_rewrite_is_deterministic() {
        let playlist = m3u::parse(UPSTREAM).unwrap();
        let first = m3u::serialize(&rewrite(&playlist, &creds(), &identity()).unwrap());
        let second = m3u::serialize(&rewrite(&playlist, &creds(), &identity()).unwrap());
        assert_eq!(first.as_bytes(), second.as_bytes());
    }

    #[test]
    fn test_rewrite_fails_whole_playlist_on_bad_uri() {
        let mut playlist = m3u::parse(UPSTREAM).unwrap();
        playlist.entries[1].uri = "::not-a-uri::".to_string();

        let err = rewrite(&playlist, &creds(), &identity()).unwrap_err();
        assert!(matches!(err, GatewayError::Upstream(ref m) if m.contains("Beta")));
    }

    #[test]
    fn test_rewrite_indexed_uses_disambiguated_ids() {
        let playlist = m3u::parse(
            "#EXTM3U\n#EXTINF:-1,A\nhttp://a/x/index.m3u8\n#EXTINF:-1,B\nhttp://b/y/index.m3u8\n",
        )
        .unwrap();
        let index = ResourceIndex::build(&playlist).unwrap();

        let rewritten = rewrite_indexed(&playlist, &index, &creds(), &identity()).unwrap();
        assert_eq!(rewritten.entries[0].uri, "https://gw.example:8080/alice/s3cret/index.m3u8");
        assert_eq!(rewritten.entries[1].uri, "https://gw.example:8080/alice/s3cret/1-index.m3u8");
    }
}

use anyhow::Result;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use std::collections::HashMap;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::fs::{self, File};
use tokio::io::AsyncWriteExt;
use tokio::sync::{Mutex, RwLock};
use tokio::time::Instant;

use crate::error::GatewayResult;
use crate::metrics::{CACHE_HITS, CACHE_MISSES, PRODUCER_RUNS};

const ARTIFACT_EXT: &str = "artifact";
const TMP_EXT: &str = "artifact.tmp";

/// Index record for one cached artifact
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub path: PathBuf,
    pub created_at: Instant,
    pub size: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactSource {
    /// Served from a fresh cache entry
    Cache,
    /// Produced by this call
    Producer,
}

#[derive(Debug)]
pub struct Artifact {
    pub bytes: Vec<u8>,
    pub created_at: Instant,
    pub source: ArtifactSource,
}

/// Disk-backed cache of generated artifacts, keyed by request signature
///
/// The index lives in memory only (cold on restart). The read lock is
/// never held across a producer call; concurrent misses for one
/// signature are collapsed by a per-signature flight lock.
pub struct ArtifactCache {
    cache_dir: PathBuf,
    ttl: Duration,
    /// Optional cap on number of artifacts (oldest evicted)
    max_entries: Option<usize>,
    index: Arc<RwLock<HashMap<String, CacheEntry>>>,
    flights: Arc<Mutex<HashMap<String, Arc<Mutex<()>>>>>,
}

impl ArtifactCache {
    /// Create the cache directory and clear artifacts left by a previous run
    pub async fn new(cache_dir: impl Into<PathBuf>, ttl: Duration, max_entries: Option<usize>) -> Result<Self> {
        let cache_dir = cache_dir.into();
        fs::create_dir_all(&cache_dir).await?;

        let cache = Self {
            cache_dir,
            ttl,
            max_entries,
            index: Arc::new(RwLock::new(HashMap::new())),
            flights: Arc::new(Mutex::new(HashMap::new())),
        };
        cache.remove_stale_files().await?;

        Ok(cache)
    }

    /// Fresh artifact for `signature`, running `producer` on miss or staleness
    ///
    /// A producer error is returned as-is and nothing is cached.
    pub async fn get_or_refresh<F, Fut>(&self, signature: &str, producer: F) -> GatewayResult<Artifact>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = GatewayResult<Vec<u8>>>,
    {
        if let Some(artifact) = self.read_fresh(signature).await {
            CACHE_HITS.inc();
            return Ok(artifact);
        }

        let flight = self.flight(signature).await;
        let result = {
            let _guard = flight.lock().await;

            // Another task may have refreshed while we waited
            if let Some(artifact) = self.read_fresh(signature).await {
                CACHE_HITS.inc();
                Ok(artifact)
            } else {
                CACHE_MISSES.inc();
                self.refresh(signature, producer).await
            }
        };
        self.release_flight(signature, flight).await;

        result
    }

    /// Current index record, fresh or not
    pub async fn lookup(&self, signature: &str) -> Option<CacheEntry> {
        let index = self.index.read().await;
        index.get(signature).cloned()
    }

    /// Get number of cached artifacts
    pub async fn entry_count(&self) -> usize {
        let index = self.index.read().await;
        index.len()
    }

    /// Total size of indexed artifacts in bytes
    pub async fn total_size(&self) -> u64 {
        let index = self.index.read().await;
        index.values().map(|entry| entry.size).sum()
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    async fn read_fresh(&self, signature: &str) -> Option<Artifact> {
        let entry = {
            let index = self.index.read().await;
            index
                .get(signature)
                .filter(|entry| entry.created_at.elapsed() < self.ttl)
                .cloned()
        }?;

        match fs::read(&entry.path).await {
            Ok(bytes) => Some(Artifact {
                bytes,
                created_at: entry.created_at,
                source: ArtifactSource::Cache,
            }),
            Err(e) => {
                tracing::warn!(signature, "cached artifact unreadable, regenerating: {}", e);
                None
            }
        }
    }

    async fn refresh<F, Fut>(&self, signature: &str, producer: F) -> GatewayResult<Artifact>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = GatewayResult<Vec<u8>>>,
    {
        let started = Instant::now();
        PRODUCER_RUNS.inc();

        let bytes = producer().await?;
        let path = self.write_artifact(signature, &bytes).await?;
        let created_at = Instant::now();

        let mut index = self.index.write().await;
        index.insert(
            signature.to_string(),
            CacheEntry {
                path,
                created_at,
                size: bytes.len() as u64,
            },
        );
        drop(index);

        self.enforce_limit(signature).await;

        tracing::info!(
            signature,
            bytes = bytes.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "artifact refreshed"
        );

        Ok(Artifact {
            bytes,
            created_at,
            source: ArtifactSource::Producer,
        })
    }

    /// Write to a temp file, then rename so readers never see partial data
    async fn write_artifact(&self, signature: &str, bytes: &[u8]) -> GatewayResult<PathBuf> {
        let path = self.artifact_path(signature);
        let tmp_path = self.artifact_tmp_path(signature);

        let written = async {
            let mut file = File::create(&tmp_path).await?;
            file.write_all(bytes).await?;
            file.sync_all().await?;
            drop(file);
            fs::rename(&tmp_path, &path).await
        }
        .await;

        if let Err(e) = written {
            let _ = fs::remove_file(&tmp_path).await;
            tracing::warn!(signature, "artifact write failed: {}", e);
            return Err(e.into());
        }
        Ok(path)
    }

    /// Evict oldest artifacts when exceeding max_entries, never `keep`
    async fn enforce_limit(&self, keep: &str) {
        let Some(max_entries) = self.max_entries else {
            return;
        };

        let evicted: Vec<(String, CacheEntry)> = {
            let mut index = self.index.write().await;
            if index.len() <= max_entries {
                return;
            }

            let excess = index.len() - max_entries;
            let mut candidates: Vec<(String, Instant)> = index
                .iter()
                .filter(|(signature, _)| signature.as_str() != keep)
                .map(|(signature, entry)| (signature.clone(), entry.created_at))
                .collect();
            candidates.sort_by_key(|(_, created_at)| *created_at);

            candidates
                .into_iter()
                .take(excess)
                .filter_map(|(signature, _)| index.remove(&signature).map(|entry| (signature, entry)))
                .collect()
        };

        for (signature, entry) in evicted {
            let _ = fs::remove_file(&entry.path).await;
            tracing::info!(signature, max_entries, "artifact evicted");
        }
    }

    async fn flight(&self, signature: &str) -> Arc<Mutex<()>> {
        let mut flights = self.flights.lock().await;
        flights.entry(signature.to_string()).or_default().clone()
    }

    async fn release_flight(&self, signature: &str, flight: Arc<Mutex<()>>) {
        let mut flights = self.flights.lock().await;
        // Only the map and this caller still hold it: nobody is waiting
        if Arc::strong_count(&flight) <= 2 {
            flights.remove(signature);
        }
    }

    async fn remove_stale_files(&self) -> Result<()> {
        let mut entries = fs::read_dir(&self.cache_dir).await?;
        let mut removed = 0usize;

        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name().to_string_lossy().into_owned();
            if let Some(signature) = signature_from_file_name(&name) {
                if fs::remove_file(entry.path()).await.is_ok() {
                    tracing::debug!(signature, "removed artifact from previous run");
                    removed += 1;
                }
            }
        }

        if removed > 0 {
            tracing::info!("Removed {} stale artifacts from {}", removed, self.cache_dir.display());
        }
        Ok(())
    }

    // ============ Path Helpers ============

    fn artifact_path(&self, signature: &str) -> PathBuf {
        self.cache_dir.join(file_name(signature, ARTIFACT_EXT))
    }

    fn artifact_tmp_path(&self, signature: &str) -> PathBuf {
        self.cache_dir.join(file_name(signature, TMP_EXT))
    }
}

impl Clone for ArtifactCache {
    fn clone(&self) -> Self {
        Self {
            cache_dir: self.cache_dir.clone(),
            ttl: self.ttl,
            max_entries: self.max_entries,
            index: Arc::clone(&self.index),
            flights: Arc::clone(&self.flights),
        }
    }
}

/// Reversible, path-safe file name for a signature
fn file_name(signature: &str, extension: &str) -> String {
    format!("{}.{}", URL_SAFE_NO_PAD.encode(signature), extension)
}

/// Signature encoded in an artifact (or temp) file name
fn signature_from_file_name(name: &str) -> Option<String> {
    let stem = name
        .strip_suffix(&format!(".{}", TMP_EXT))
        .or_else(|| name.strip_suffix(&format!(".{}", ARTIFACT_EXT)))?;
    let bytes = URL_SAFE_NO_PAD.decode(stem).ok()?;
    String::from_utf8(bytes).ok()
}

//! Best-effort tag extraction for media references.
//!
//! Resolution never fails from the caller's point of view: unreadable files,
//! unsupported containers and network references all yield an empty
//! [`MediaMetadata`]. Failures are logged at debug level and absorbed here.

use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};

use lofty::prelude::*;
use lofty::probe::Probe;
use lru::LruCache;
use parking_lot::Mutex;
use thiserror::Error;

use crate::player::{is_network_reference, MediaMetadata};

/// Reasons a lookup produced no metadata. Never leaves this module.
#[derive(Debug, Error)]
enum MetadataError {
    #[error("network reference has no readable tags")]
    NetworkReference,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("tag read failed: {0}")]
    Read(#[from] lofty::error::LoftyError),
}

/// Source of descriptive tags for a media reference.
///
/// Implementations must be infallible and may block; the controller calls
/// them from the blocking thread pool.
pub trait MetadataSource: Send + Sync {
    /// Returns whatever is known about `reference`; all-`None` when nothing is.
    fn resolve(&self, reference: &str) -> MediaMetadata;
}

/// Tag reader backed by `lofty`, with an LRU cache keyed by reference.
pub struct MetadataResolver {
    cache: Mutex<LruCache<String, MediaMetadata>>,
}

impl MetadataResolver {
    /// Creates a resolver caching up to `cache_size` successful lookups.
    #[must_use]
    pub fn new(cache_size: NonZeroUsize) -> Self {
        Self {
            cache: Mutex::new(LruCache::new(cache_size)),
        }
    }

    fn extract(reference: &str) -> Result<MediaMetadata, MetadataError> {
        if is_network_reference(reference) {
            return Err(MetadataError::NetworkReference);
        }

        let path = local_path(reference);
        let tagged_file = Probe::open(&path)?.read()?;

        let duration = tagged_file.properties().duration().as_secs_f64();
        let mut metadata = MediaMetadata {
            duration_seconds: (duration > 0.0).then_some(duration),
            ..MediaMetadata::default()
        };

        if let Some(tag) = tagged_file.primary_tag().or_else(|| tagged_file.first_tag()) {
            metadata.title = tag.title().map(|s| s.to_string());
            metadata.artist = tag.artist().map(|s| s.to_string());
            metadata.album = tag.album().map(|s| s.to_string());
        }

        if metadata.title.is_none() {
            metadata.title = file_stem(&path);
        }

        Ok(metadata)
    }
}

impl MetadataSource for MetadataResolver {
    fn resolve(&self, reference: &str) -> MediaMetadata {
        if let Some(hit) = self.cache.lock().get(reference) {
            return hit.clone();
        }

        match Self::extract(reference) {
            Ok(metadata) => {
                log::debug!(
                    "[Metadata] {}: title={:?} artist={:?} duration={:?}",
                    reference,
                    metadata.title,
                    metadata.artist,
                    metadata.duration_seconds
                );
                self.cache
                    .lock()
                    .put(reference.to_string(), metadata.clone());
                metadata
            }
            Err(e) => {
                log::debug!("[Metadata] No metadata for {}: {}", reference, e);
                MediaMetadata::default()
            }
        }
    }
}

/// Strips a `file://` prefix; everything else is used as a path verbatim.
fn local_path(reference: &str) -> PathBuf {
    PathBuf::from(reference.strip_prefix("file://").unwrap_or(reference))
}

fn file_stem(path: &Path) -> Option<String> {
    path.file_stem().map(|s| s.to_string_lossy().into_owned())
}

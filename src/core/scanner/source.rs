//! Bulk photo sources.

use super::filter::ImageFilter;
use crate::core::metadata::{Coordinates, ExtractedMetadata, MetadataExtractor};
use crate::error::ScanError;
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// One item from a bulk source
#[derive(Debug, Clone)]
pub struct SourceItem {
    pub bytes: Vec<u8>,
    /// Capture time as the source knows it
    pub native_timestamp: Option<DateTime<Utc>>,
    /// Position as the source knows it
    pub native_coordinates: Option<Coordinates>,
    /// Embedded metadata the source already parsed, so it is not read twice
    pub embedded: Option<ExtractedMetadata>,
}

impl SourceItem {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self {
            bytes,
            native_timestamp: None,
            native_coordinates: None,
            embedded: None,
        }
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.native_timestamp = Some(timestamp);
        self
    }

    pub fn with_coordinates(mut self, coordinates: Coordinates) -> Self {
        self.native_coordinates = Some(coordinates);
        self
    }
}

/// Configuration for a directory source
#[derive(Debug, Clone, Default)]
pub struct SourceConfig {
    /// Whether to follow symbolic links
    pub follow_symlinks: bool,
    /// Whether to include hidden files and directories
    pub include_hidden: bool,
    /// Maximum directory depth (None = unlimited)
    pub max_depth: Option<usize>,
    /// Custom extensions to include (None = use defaults)
    pub extensions: Option<Vec<String>>,
}

/// Photos in a directory tree, read one at a time.
///
/// The file list is fixed when the source is opened, so the total is
/// known before the first photo is read.
#[derive(Debug)]
pub struct DirectorySource {
    paths: std::vec::IntoIter<PathBuf>,
    extractor: MetadataExtractor,
}

impl DirectorySource {
    /// List the images under `root`
    pub fn open(root: &Path, config: &SourceConfig) -> Result<Self, ScanError> {
        if !root.is_dir() {
            return Err(ScanError::DirectoryNotFound {
                path: root.to_path_buf(),
            });
        }

        let mut filter = ImageFilter::new().with_hidden(config.include_hidden);
        if let Some(ref extensions) = config.extensions {
            filter = filter.with_extensions(extensions);
        }

        let mut walker = WalkDir::new(root)
            .follow_links(config.follow_symlinks)
            .sort_by_file_name();
        if let Some(depth) = config.max_depth {
            walker = walker.max_depth(depth);
        }

        let mut paths = Vec::new();
        let entries = walker
            .into_iter()
            .filter_entry(|entry| entry.depth() == 0 || !filter.is_excluded_hidden(entry.path()));

        for entry_result in entries {
            match entry_result {
                Ok(entry) if entry.file_type().is_file() => {
                    if filter.should_include(entry.path()) {
                        paths.push(entry.into_path());
                    }
                }
                Ok(_) => {}
                Err(e) => warn!("Skipping unreadable entry: {}", e),
            }
        }

        debug!("Found {} images under {}", paths.len(), root.display());
        Ok(Self {
            paths: paths.into_iter(),
            extractor: MetadataExtractor::new(),
        })
    }

    fn read(&self, path: &Path) -> Result<SourceItem, ScanError> {
        let read_error = |source| ScanError::ReadItem {
            path: path.to_path_buf(),
            source,
        };

        let bytes = std::fs::read(path).map_err(read_error)?;
        let metadata = self.extractor.extract(&bytes);

        let native_timestamp = metadata.timestamp.or_else(|| {
            std::fs::metadata(path)
                .and_then(|m| m.modified())
                .ok()
                .map(DateTime::<Utc>::from)
        });

        Ok(SourceItem {
            bytes,
            native_timestamp,
            native_coordinates: metadata.coordinates,
            embedded: Some(metadata),
        })
    }
}

impl Iterator for DirectorySource {
    type Item = Result<SourceItem, ScanError>;

    fn next(&mut self) -> Option<Self::Item> {
        let path = self.paths.next()?;
        Some(self.read(&path))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.paths.size_hint()
    }
}

impl ExactSizeIterator for DirectorySource {}

//! Path resolution for category-scoped media files.
//!
//! Maps a `(category, filename)` pair onto a file inside the directory
//! configured for that category. Sizes are read from disk on every call,
//! never cached, so files that grow or shrink between requests are
//! observed as they are.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::config::MediaConfig;

/// Named logical bucket of media backed by one directory.
#[derive(Debug, Clone)]
pub struct MediaCategory {
    /// Category name as it appears in request paths
    pub name: String,
    /// Directory holding this category's files
    pub root: PathBuf,
    /// Content type sent with every file in the category
    pub content_type: String,
}

/// A resolved media file, valid for the duration of one request.
#[derive(Debug, Clone)]
pub struct MediaFile {
    pub category: String,
    pub filename: String,
    /// Absolute location on disk
    pub path: PathBuf,
    /// Size in bytes at resolution time
    pub size: u64,
    pub content_type: String,
}

/// Errors raised while resolving or listing media.
#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    #[error("Category not found: {category}")]
    CategoryNotFound { category: String },

    #[error("File not found: {category}/{filename}")]
    FileNotFound { category: String, filename: String },

    #[error("Directory not found for category {category}: {}", .path.display())]
    DirectoryNotFound { category: String, path: PathBuf },

    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },
}

/// Immutable registry of media categories.
///
/// Built once from [`MediaConfig`] and shared read-only between requests.
#[derive(Debug, Clone)]
pub struct MediaLibrary {
    categories: BTreeMap<String, MediaCategory>,
    enforce_containment: bool,
}

impl MediaLibrary {
    /// Creates a library from the configured categories.
    pub fn new(config: &MediaConfig) -> Self {
        let categories = config
            .categories
            .iter()
            .map(|c| {
                let category = MediaCategory {
                    name: c.name.clone(),
                    root: absolute_path(&c.root),
                    content_type: c.content_type.clone(),
                };
                (c.name.clone(), category)
            })
            .collect();

        Self {
            categories,
            enforce_containment: config.enforce_containment,
        }
    }

    /// Iterates over all categories in name order.
    pub fn categories(&self) -> impl Iterator<Item = &MediaCategory> {
        self.categories.values()
    }

    /// Looks up a category by name.
    ///
    /// # Errors
    ///
    /// - `ResolveError::CategoryNotFound` - Name is not configured
    pub fn category(&self, name: &str) -> Result<&MediaCategory, ResolveError> {
        self.categories.get(name).ok_or_else(|| {
            warn!(
                "Category '{}' not found, available: {:?}",
                name,
                self.categories.keys().collect::<Vec<_>>()
            );
            ResolveError::CategoryNotFound {
                category: name.to_string(),
            }
        })
    }

    /// Resolves a filename within a category to an existing regular file.
    ///
    /// When containment is enforced the file must canonicalize to a path
    /// inside the category directory; anything escaping it is reported
    /// as not found.
    ///
    /// # Errors
    ///
    /// - `ResolveError::CategoryNotFound` - Category is not configured
    /// - `ResolveError::FileNotFound` - Path is missing, not a regular file, or escapes the category
    pub async fn resolve(&self, category: &str, filename: &str) -> Result<MediaFile, ResolveError> {
        let media_category = self.category(category)?;
        let not_found = || ResolveError::FileNotFound {
            category: category.to_string(),
            filename: filename.to_string(),
        };

        let joined = media_category.root.join(filename);
        debug!("Resolving {}/{} to {}", category, filename, joined.display());

        let path = if self.enforce_containment {
            let root = tokio::fs::canonicalize(&media_category.root)
                .await
                .map_err(|e| {
                    warn!(
                        "Category directory {} unavailable: {}",
                        media_category.root.display(),
                        e
                    );
                    not_found()
                })?;
            let resolved = tokio::fs::canonicalize(&joined).await.map_err(|e| {
                debug!("File not found: {} ({})", joined.display(), e);
                not_found()
            })?;

            if !resolved.starts_with(&root) {
                warn!(
                    "Rejected {}/{}: {} escapes {}",
                    category,
                    filename,
                    resolved.display(),
                    root.display()
                );
                return Err(not_found());
            }
            resolved
        } else {
            joined
        };

        let metadata = tokio::fs::metadata(&path).await.map_err(|e| {
            debug!("File not found: {} ({})", path.display(), e);
            not_found()
        })?;
        if !metadata.is_file() {
            debug!("Not a regular file: {}", path.display());
            return Err(not_found());
        }

        Ok(MediaFile {
            category: category.to_string(),
            filename: filename.to_string(),
            path,
            size: metadata.len(),
            content_type: media_category.content_type.clone(),
        })
    }

    /// Lists the regular files directly inside a category directory, sorted by name.
    ///
    /// # Errors
    ///
    /// - `ResolveError::CategoryNotFound` - Category is not configured
    /// - `ResolveError::DirectoryNotFound` - Category directory does not exist
    /// - `ResolveError::Io` - Directory could not be read
    pub async fn list(&self, category: &str) -> Result<Vec<String>, ResolveError> {
        let media_category = self.category(category)?;
        let root = &media_category.root;

        if !tokio::fs::try_exists(root).await.unwrap_or(false) {
            warn!("Directory does not exist: {}", root.display());
            return Err(ResolveError::DirectoryNotFound {
                category: category.to_string(),
                path: root.clone(),
            });
        }

        let mut names = Vec::new();
        let mut entries = tokio::fs::read_dir(root).await?;
        while let Some(entry) = entries.next_entry().await? {
            let is_file = tokio::fs::metadata(entry.path())
                .await
                .map(|m| m.is_file())
                .unwrap_or(false);
            if is_file && let Some(name) = entry.file_name().to_str() {
                names.push(name.to_string());
            }
        }
        names.sort();

        debug!("Found {} files in {}", names.len(), root.display());
        Ok(names)
    }
}

fn absolute_path(path: &Path) -> PathBuf {
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;
    use crate::config::CategoryConfig;

    fn library_in(temp_dir: &TempDir) -> MediaLibrary {
        let root = temp_dir.path().join("housing");
        std::fs::create_dir_all(&root).unwrap();
        std::fs::write(root.join("clip.mp4"), vec![7u8; 1000]).unwrap();
        std::fs::create_dir_all(root.join("nested")).unwrap();

        MediaLibrary::new(&MediaConfig {
            assets_dir: temp_dir.path().to_path_buf(),
            categories: vec![CategoryConfig::new("housing", &root)],
            enforce_containment: true,
        })
    }

    #[tokio::test]
    async fn test_resolve_existing_file() {
        let temp_dir = TempDir::new().unwrap();
        let library = library_in(&temp_dir);

        let file = library.resolve("housing", "clip.mp4").await.unwrap();
        assert_eq!(file.size, 1000);
        assert!(file.path.is_absolute());
        assert_eq!(file.content_type, "video/mp4");
    }

    #[tokio::test]
    async fn test_unknown_category() {
        let temp_dir = TempDir::new().unwrap();
        let library = library_in(&temp_dir);

        let result = library.resolve("engine", "clip.mp4").await;
        assert!(matches!(result, Err(ResolveError::CategoryNotFound { .. })));
    }

    #[tokio::test]
    async fn test_missing_file_and_directory_are_not_found() {
        let temp_dir = TempDir::new().unwrap();
        let library = library_in(&temp_dir);

        let missing = library.resolve("housing", "missing.mp4").await;
        assert!(matches!(missing, Err(ResolveError::FileNotFound { .. })));

        let directory = library.resolve("housing", "nested").await;
        assert!(matches!(directory, Err(ResolveError::FileNotFound { .. })));
    }

    #[tokio::test]
    async fn test_size_is_read_fresh() {
        let temp_dir = TempDir::new().unwrap();
        let library = library_in(&temp_dir);

        let path = temp_dir.path().join("housing").join("clip.mp4");
        assert_eq!(library.resolve("housing", "clip.mp4").await.unwrap().size, 1000);

        std::fs::write(&path, vec![1u8; 2500]).unwrap();
        assert_eq!(library.resolve("housing", "clip.mp4").await.unwrap().size, 2500);
    }

    #[tokio::test]
    async fn test_traversal_outside_category_is_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let library = library_in(&temp_dir);
        std::fs::write(temp_dir.path().join("secret.txt"), b"secret").unwrap();

        let result = library.resolve("housing", "../secret.txt").await;
        assert!(matches!(result, Err(ResolveError::FileNotFound { .. })));
    }

    #[tokio::test]
    async fn test_traversal_allowed_when_containment_disabled() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().join("housing");
        std::fs::create_dir_all(&root).unwrap();
        std::fs::write(temp_dir.path().join("secret.txt"), b"secret").unwrap();

        let library = MediaLibrary::new(&MediaConfig {
            assets_dir: temp_dir.path().to_path_buf(),
            categories: vec![CategoryConfig::new("housing", &root)],
            enforce_containment: false,
        });

        let file = library.resolve("housing", "../secret.txt").await.unwrap();
        assert_eq!(file.size, 6);
    }

    #[tokio::test]
    async fn test_list_returns_sorted_regular_files() {
        let temp_dir = TempDir::new().unwrap();
        let library = library_in(&temp_dir);
        std::fs::write(temp_dir.path().join("housing").join("a.mp4"), b"a").unwrap();

        let names = library.list("housing").await.unwrap();
        assert_eq!(names, vec!["a.mp4".to_string(), "clip.mp4".to_string()]);
    }

    #[tokio::test]
    async fn test_list_missing_directory() {
        let temp_dir = TempDir::new().unwrap();
        let library = MediaLibrary::new(&MediaConfig::with_assets_dir(temp_dir.path()));

        let result = library.list("shaft").await;
        assert!(matches!(result, Err(ResolveError::DirectoryNotFound { .. })));

        let result = library.list("engine").await;
        assert!(matches!(result, Err(ResolveError::CategoryNotFound { .. })));
    }
}

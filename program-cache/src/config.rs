//! Rendering session configuration.

use std::path::PathBuf;

use crate::stream_buffer::DEFAULT_STREAM_BUFFER_SIZE;

/// Configuration for a [`RenderingSession`](crate::RenderingSession).
///
/// The program disk cache lives at
/// `<cache_dir>/ogl-<unique_id>-shaders.cache`, where the unique id names the
/// content the programs were generated for. A host that manages its own
/// layout can set the final path directly with
/// [`with_cache_path`](Self::with_cache_path).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Directory holding shader caches.
    pub cache_dir: Option<PathBuf>,
    /// Identifier of the content being rendered.
    pub unique_id: Option<String>,
    /// Explicit cache file path, overriding the derived one.
    pub cache_path: Option<PathBuf>,
    /// Size of the constant streaming buffer in bytes.
    pub stream_buffer_size: u64,
    /// Whether linked programs are persisted between sessions.
    pub disk_cache: bool,
}

impl SessionConfig {
    /// Create a configuration with the disk cache enabled but no location.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the shader cache directory.
    pub fn with_cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cache_dir = Some(dir.into());
        self
    }

    /// Set the content identifier used in the cache file name.
    pub fn with_unique_id(mut self, id: impl Into<String>) -> Self {
        self.unique_id = Some(id.into());
        self
    }

    /// Use an explicit cache file path.
    pub fn with_cache_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.cache_path = Some(path.into());
        self
    }

    /// Set the constant streaming buffer size.
    pub fn with_stream_buffer_size(mut self, size: u64) -> Self {
        self.stream_buffer_size = size;
        self
    }

    /// Enable or disable the program disk cache.
    pub fn with_disk_cache(mut self, enabled: bool) -> Self {
        self.disk_cache = enabled;
        self
    }

    /// Path of the program cache file, or `None` if the disk cache is
    /// disabled or no location is configured.
    pub fn cache_file_path(&self) -> Option<PathBuf> {
        if !self.disk_cache {
            return None;
        }
        if let Some(path) = &self.cache_path {
            return Some(path.clone());
        }
        let dir = self.cache_dir.as_ref()?;
        let id = self.unique_id.as_deref()?;
        Some(dir.join(format!("ogl-{id}-shaders.cache")))
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            cache_dir: None,
            unique_id: None,
            cache_path: None,
            stream_buffer_size: DEFAULT_STREAM_BUFFER_SIZE,
            disk_cache: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SessionConfig::default();
        assert_eq!(config.stream_buffer_size, 4 * 1024 * 1024);
        assert!(config.disk_cache);
        assert_eq!(config.cache_file_path(), None);
    }

    #[test]
    fn test_derived_cache_path() {
        let config = SessionConfig::new()
            .with_cache_dir("/tmp/shadercache")
            .with_unique_id("GZLE01");
        assert_eq!(
            config.cache_file_path(),
            Some(PathBuf::from("/tmp/shadercache/ogl-GZLE01-shaders.cache"))
        );
    }

    #[test]
    fn test_explicit_path_wins() {
        let config = SessionConfig::new()
            .with_cache_dir("/tmp/shadercache")
            .with_unique_id("GZLE01")
            .with_cache_path("/var/cache/programs.bin");
        assert_eq!(
            config.cache_file_path(),
            Some(PathBuf::from("/var/cache/programs.bin"))
        );
    }

    #[test]
    fn test_disabled_disk_cache_has_no_path() {
        let config = SessionConfig::new()
            .with_cache_path("/var/cache/programs.bin")
            .with_disk_cache(false);
        assert_eq!(config.cache_file_path(), None);
    }

    #[test]
    fn test_missing_unique_id() {
        let config = SessionConfig::new().with_cache_dir("/tmp/shadercache");
        assert_eq!(config.cache_file_path(), None);
    }
}

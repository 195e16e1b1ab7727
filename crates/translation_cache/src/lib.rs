//! Removal of compiled translation catalogues.
//!
//! The translator keeps one compiled catalogue per locale in a cache
//! directory, named `catalogue.<locale>.<suffix>`. Deleting those files
//! forces the next lookup to rebuild the catalogue from the store.

use std::{
    fmt, fs, io,
    path::PathBuf,
    sync::Arc,
};

use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("failed to {action} '{}': {source}", path.display())]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// A process-wide compiled-code cache that may need flushing once the
/// translation catalogues have changed.
pub trait CompiledCodeCache: Send + Sync + fmt::Debug {
    fn clear(&self) -> Result<(), CacheError>;

    fn name(&self) -> &'static str;
}

/// Used where the deployment has no compiled-code cache.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCompiledCodeCache;

impl CompiledCodeCache for NoCompiledCodeCache {
    fn clear(&self) -> Result<(), CacheError> {
        Ok(())
    }

    fn name(&self) -> &'static str {
        "none"
    }
}

/// Compiled code kept as files below a directory; clearing empties it.
#[derive(Debug, Clone)]
pub struct DirectoryCodeCache {
    dir: PathBuf,
}

impl DirectoryCodeCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl CompiledCodeCache for DirectoryCodeCache {
    fn clear(&self) -> Result<(), CacheError> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(()),
            Err(source) => {
                return Err(CacheError::Io {
                    action: "read directory",
                    path: self.dir.clone(),
                    source,
                })
            }
        };

        for entry in entries {
            let entry = entry.map_err(|source| CacheError::Io {
                action: "read directory",
                path: self.dir.clone(),
                source,
            })?;
            let path = entry.path();
            let removed = if path.is_dir() {
                fs::remove_dir_all(&path)
            } else {
                fs::remove_file(&path)
            };
            match removed {
                Ok(()) => {}
                Err(err) if err.kind() == io::ErrorKind::NotFound => {}
                Err(source) => {
                    return Err(CacheError::Io {
                        action: "remove",
                        path,
                        source,
                    })
                }
            }
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "directory"
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct InvalidationReport {
    pub files_removed: usize,
    pub compiled_code_cleared: bool,
}

#[derive(Debug, Clone)]
pub struct LocaleCache {
    cache_dir: PathBuf,
    compiled_code: Arc<dyn CompiledCodeCache>,
}

impl LocaleCache {
    pub fn new(cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
            compiled_code: Arc::new(NoCompiledCodeCache),
        }
    }

    pub fn with_compiled_code_cache(mut self, cache: Arc<dyn CompiledCodeCache>) -> Self {
        self.compiled_code = cache;
        self
    }

    /// Deletes the cached catalogues of `locales`. Missing files and a
    /// missing cache directory are not errors.
    pub fn remove_locales_cache_files(&self, locales: &[String]) -> Result<usize, CacheError> {
        let entries = match fs::read_dir(&self.cache_dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                debug!(cache_dir = %self.cache_dir.display(), "no translation cache directory");
                return Ok(0);
            }
            Err(source) => {
                return Err(CacheError::Io {
                    action: "read directory",
                    path: self.cache_dir.clone(),
                    source,
                })
            }
        };

        let prefixes: Vec<String> = locales
            .iter()
            .map(|locale| format!("catalogue.{locale}."))
            .collect();

        let mut removed = 0;
        for entry in entries {
            let entry = entry.map_err(|source| CacheError::Io {
                action: "read directory",
                path: self.cache_dir.clone(),
                source,
            })?;
            let file_name = entry.file_name();
            let Some(file_name) = file_name.to_str() else {
                continue;
            };
            if !prefixes.iter().any(|prefix| file_name.starts_with(prefix.as_str())) {
                continue;
            }

            let path = entry.path();
            match fs::remove_file(&path) {
                Ok(()) => {
                    debug!(path = %path.display(), "removed catalogue cache file");
                    removed += 1;
                }
                Err(err) if err.kind() == io::ErrorKind::NotFound => {}
                Err(source) => {
                    return Err(CacheError::Io {
                        action: "remove",
                        path,
                        source,
                    })
                }
            }
        }
        Ok(removed)
    }

    /// Removes the catalogues of `locales`, then flushes the compiled-code
    /// cache when asked to.
    pub fn invalidate_locales(
        &self,
        locales: &[String],
        clear_compiled_code: bool,
    ) -> Result<InvalidationReport, CacheError> {
        let files_removed = self.remove_locales_cache_files(locales)?;
        if clear_compiled_code {
            self.compiled_code.clear()?;
        }
        info!(
            ?locales,
            files_removed,
            compiled_code = clear_compiled_code.then(|| self.compiled_code.name()),
            "translation caches invalidated"
        );
        Ok(InvalidationReport {
            files_removed,
            compiled_code_cleared: clear_compiled_code,
        })
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;

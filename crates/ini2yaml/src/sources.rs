//! access to configuration sources
//!
//! The parser never touches the filesystem directly. Top-level files and `#include`d files are
//! requested by name from a [Loader]:
//! - [FsLoader] resolves names relative to a root directory
//! - [MemoryLoader] serves in-memory documents (see [sources!](crate::sources!))
use indexmap::IndexMap;
use std::path::{Path, PathBuf};

pub trait Loader {
    /// Return the full text of the named source
    fn load(&self, name: &str) -> Result<String, LoadError>;
}

#[derive(thiserror::Error, Debug)]
pub enum LoadError {
    #[error("No such file: {0}")]
    NotFound(PathBuf),
    #[error("IO error")]
    IoError(#[from] std::io::Error),
}

/// Loads sources from below a root directory
#[derive(derive_new::new, Debug, Clone)]
pub struct FsLoader {
    root: PathBuf,
}

impl FsLoader {
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn resolve(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }
}

impl Loader for FsLoader {
    fn load(&self, name: &str) -> Result<String, LoadError> {
        let file_path = self.resolve(name);
        if !file_path.is_file() {
            return Err(LoadError::NotFound(file_path));
        }

        tracing::info!(path=%file_path.display(), "reading");
        Ok(std::fs::read_to_string(&file_path)?)
    }
}

/// In-memory sources, keyed by name
#[derive(Default, Debug, Clone)]
pub struct MemoryLoader {
    files: IndexMap<String, String>,
}

impl MemoryLoader {
    pub fn insert(&mut self, name: impl Into<String>, text: impl Into<String>) {
        self.files.insert(name.into(), text.into());
    }

    pub fn source_count(&self) -> usize {
        self.files.len()
    }
}

impl Loader for MemoryLoader {
    fn load(&self, name: &str) -> Result<String, LoadError> {
        self.files
            .get(name)
            .cloned()
            .ok_or_else(|| LoadError::NotFound(PathBuf::from(name)))
    }
}

/// Path of the configuration file for a site and stage, relative to the root
///
/// ```
/// assert_eq!(ini2yaml::sources::site_file("BB", "firststage"), "BB/BB_firststage.ini");
/// ```
pub fn site_file(site: &str, stage: &str) -> String {
    format!("{site}/{site}_{stage}.ini")
}

/// Utility macro to create a [MemoryLoader]
///
/// ```
/// # use ini2yaml::sources;
/// let loader = sources! {
///   "BB/BB_firststage.ini" => "SiteID = 'BB'",
///   "sub.ini" => "[Trace]\nvariableName = 'TA'\n[End]"
/// };
/// assert_eq!(loader.source_count(), 2);
/// ```
#[macro_export]
macro_rules! sources {
    { $($name:expr => $text:expr),+ $(,)? } => {{
        let mut loader = $crate::sources::MemoryLoader::default();
        $(
            loader.insert($name, $text);
        )+

        loader
    }};
}

#[cfg(test)]
pub(crate) mod test {
    use super::*;

    #[test]
    fn memory_loader() {
        let loader = sources! {"a.ini" => "x = 1"};
        assert_eq!(loader.load("a.ini").unwrap(), "x = 1");
        assert!(matches!(loader.load("b.ini"), Err(LoadError::NotFound(_))));
    }

    #[test]
    fn fs_loader_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let loader = FsLoader::new(dir.path().to_owned());
        assert!(matches!(loader.load("nope.ini"), Err(LoadError::NotFound(_))));

        std::fs::write(dir.path().join("yes.ini"), "SiteID = 'BB'").unwrap();
        assert_eq!(loader.load("yes.ini").unwrap(), "SiteID = 'BB'");
    }
}

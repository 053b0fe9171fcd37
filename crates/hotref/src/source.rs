//! where documents come from
//!
//! The loader only talks to a [Source]. [FileSystem] is what the binary uses, [MemorySource] holds documents in
//! memory (see [crate::memory_source]).
use indexmap::IndexMap;
use std::io;
use std::path::{Component, Path, PathBuf};

pub trait Source {
    /// Stable identity of a document, used to detect include cycles and to share mapped templates
    fn canonicalize(&self, path: &Path) -> io::Result<PathBuf>;

    fn read(&self, path: &Path) -> io::Result<String>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct FileSystem;

impl Source for FileSystem {
    fn canonicalize(&self, path: &Path) -> io::Result<PathBuf> {
        path.canonicalize()
    }

    fn read(&self, path: &Path) -> io::Result<String> {
        std::fs::read_to_string(path)
    }
}

/// Documents keyed by (lexically normalized) path
#[derive(Debug, Default, Clone)]
pub struct MemorySource {
    documents: IndexMap<PathBuf, String>,
}

impl MemorySource {
    pub fn insert(&mut self, path: impl AsRef<Path>, contents: impl Into<String>) {
        self.documents
            .insert(normalize(path.as_ref()), contents.into());
    }
}

impl Source for MemorySource {
    fn canonicalize(&self, path: &Path) -> io::Result<PathBuf> {
        let path = normalize(path);
        if self.documents.contains_key(&path) {
            Ok(path)
        } else {
            Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("no document at {}", path.display()),
            ))
        }
    }

    fn read(&self, path: &Path) -> io::Result<String> {
        self.documents
            .get(&normalize(path))
            .cloned()
            .ok_or_else(|| io::Error::from(io::ErrorKind::NotFound))
    }
}

/// Remove `.` and resolve `..` without touching the file system
fn normalize(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !normalized.pop() {
                    normalized.push("..");
                }
            }
            other => normalized.push(other),
        }
    }
    normalized
}

/// Utility macro to create a [MemorySource]
///
/// ```
/// # use hotref::memory_source;
/// let source = memory_source! {
///   "root.yaml" => "resources: {}",
///   "env.yaml" => "parameters: {}"
/// };
/// ```
#[macro_export]
macro_rules! memory_source {
    { $($path:expr => $contents:expr),+ $(,)? } => {{
        let mut source = $crate::source::MemorySource::default();
        $(
            source.insert($path, $contents);
        )+

        source
    }};
}

//! Export of the generated code bundle.
//!
//! The Code and Fix stages answer with a JSON object mapping relative file
//! paths to file contents, sometimes wrapped in a markdown fence or surrounded
//! by prose. [`CodeBundle`] pulls that object out and writes it to disk.

use regex::Regex;
use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};
use std::sync::LazyLock;
use thiserror::Error;

/// File name used when the code artifact is not a JSON object.
pub const RAW_CODE_FILE: &str = "code.txt";

static FENCED_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)```[A-Za-z]*\s*\n(.*?)```").expect("fenced block regex is valid")
});

#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("No JSON object found in code artifact")]
    NoJsonObject,

    #[error("Code artifact is not a JSON object of path to contents: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("Refusing to write unsafe path '{0}'")]
    UnsafePath(String),

    #[error("Failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CodeBundle {
    files: BTreeMap<String, String>,
}

impl CodeBundle {
    /// Parse a code artifact. Looks inside the first fenced block if there is
    /// one, then takes the outermost JSON object.
    ///
    /// String values are file contents; any other JSON value is written as
    /// pretty-printed JSON.
    pub fn parse(code: &str) -> Result<Self, ArtifactError> {
        let candidates = FENCED_BLOCK
            .captures(code)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str())
            .into_iter()
            .chain(std::iter::once(code));

        let mut last_error = ArtifactError::NoJsonObject;
        for text in candidates {
            let Some(object) = extract_json_object(text) else {
                continue;
            };
            match serde_json::from_str::<serde_json::Map<String, serde_json::Value>>(&object) {
                Ok(map) => {
                    let files = map
                        .into_iter()
                        .map(|(path, value)| {
                            let contents = match value {
                                serde_json::Value::String(s) => s,
                                other => serde_json::to_string_pretty(&other)
                                    .unwrap_or_else(|_| other.to_string()),
                            };
                            (path, contents)
                        })
                        .collect();
                    return Ok(Self { files });
                }
                Err(e) => last_error = ArtifactError::InvalidJson(e),
            }
        }
        Err(last_error)
    }

    /// A bundle holding the whole artifact as one file.
    pub fn raw(code: &str) -> Self {
        let mut files = BTreeMap::new();
        files.insert(RAW_CODE_FILE.to_string(), code.to_string());
        Self { files }
    }

    pub fn files(&self) -> &BTreeMap<String, String> {
        &self.files
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Write every file under `dir`, creating parent directories.
    ///
    /// All paths are checked before anything is written.
    pub fn write_to(&self, dir: &Path) -> Result<Vec<PathBuf>, ArtifactError> {
        for path in self.files.keys() {
            if !is_safe_relative(path) {
                return Err(ArtifactError::UnsafePath(path.clone()));
            }
        }

        let mut written = Vec::with_capacity(self.files.len());
        for (path, contents) in &self.files {
            let target = dir.join(path);
            if let Some(parent) = target.parent() {
                std::fs::create_dir_all(parent).map_err(|source| ArtifactError::Io {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
            std::fs::write(&target, contents).map_err(|source| ArtifactError::Io {
                path: target.clone(),
                source,
            })?;
            tracing::debug!(path = %target.display(), bytes = contents.len(), "wrote file");
            written.push(target);
        }
        Ok(written)
    }
}

fn is_safe_relative(path: &str) -> bool {
    let p = Path::new(path);
    !path.trim().is_empty()
        && p.components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
}

/// Extract the outermost JSON object from text that may contain other content.
///
/// Braces inside JSON strings are ignored.
pub fn extract_json_object(text: &str) -> Option<String> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, ch) in text[start..].char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(text[start..start + i + 1].to_string());
                }
            }
            _ => {}
        }
    }
    None
}

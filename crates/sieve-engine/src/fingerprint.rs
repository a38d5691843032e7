//! Content-addressed fingerprints over a directory and a test command.
//!
//! A fingerprint changes whenever any matching source file or the command
//! changes, and is independent of filesystem iteration order and host OS.

use std::fmt;
use std::fs;
use std::path::{Component, Path};

use sha2::{Digest as _, Sha256};
use sieve_core::{Error, Result};
use walkdir::WalkDir;

/// SHA-256 digest identifying a tree state plus the command run against it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fingerprint([u8; 32]);

impl Fingerprint {
    /// Lowercase hex rendering.
    pub fn to_hex(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in self.0 {
            write!(formatter, "{byte:02x}")?;
        }
        Ok(())
    }
}

/// Hashes directories of source files together with a command string.
#[derive(Debug, Clone, Default)]
pub struct FingerprintHasher {
    extensions: Vec<String>,
}

impl FingerprintHasher {
    /// Hash only files whose extension is in `extensions` (leading dot optional).
    /// An empty list matches every file.
    pub fn new<I, S>(extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            extensions: extensions
                .into_iter()
                .map(|ext| ext.as_ref().trim_start_matches('.').to_owned())
                .collect(),
        }
    }

    /// Fingerprint `directory` and `command`.
    ///
    /// # Errors
    /// Returns an error if the directory cannot be walked or a file cannot be read.
    pub fn hash(&self, directory: &Path, command: &str) -> Result<Fingerprint> {
        let mut entries = Vec::new();
        for entry in WalkDir::new(directory).follow_links(false) {
            let entry = entry.map_err(|err| Error::Io(err.into()))?;
            if !entry.file_type().is_file() || !self.matches(entry.path()) {
                continue;
            }
            let relative = entry
                .path()
                .strip_prefix(directory)
                .map_err(|err| Error::Internal(format!("path outside walked directory: {err}")))?;
            let contents = fs::read(entry.path())?;
            entries.push((posix_key(relative), Sha256::digest(&contents)));
        }

        entries.sort_by(|left, right| left.0.cmp(&right.0));

        let mut running = Sha256::new();
        for (_, digest) in &entries {
            running.update(digest);
        }
        running.update(command.as_bytes());

        tracing::debug!(
            "Fingerprinted {} files under {}",
            entries.len(),
            directory.display()
        );
        Ok(Fingerprint(running.finalize().into()))
    }

    fn matches(&self, path: &Path) -> bool {
        if self.extensions.is_empty() {
            return true;
        }
        path.extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| self.extensions.iter().any(|wanted| wanted == ext))
    }
}

/// Sort key that is identical on every host.
fn posix_key(relative: &Path) -> String {
    relative
        .components()
        .filter_map(|component| match component {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

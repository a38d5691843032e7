use std::fs;
use std::io::{Error as IoError, ErrorKind, Result as IoResult};
use std::path::{Component, Path, PathBuf};

use sieve_core::{Error, Patch, Result};

/// A patch applied to a working tree, reverted when the scope ends.
///
/// The original file content (or its absence) is captured before writing.
/// Dropping the scope restores it no matter how the enclosing code exits; use
/// [`PatchScope::revert`] to observe restore errors instead of logging them.
#[derive(Debug)]
pub struct PatchScope {
    target: PathBuf,
    original: Option<Vec<u8>>,
    created_dirs: Vec<PathBuf>,
    reverted: bool,
}

impl PatchScope {
    /// Write `patch` into the working tree rooted at `root`.
    ///
    /// Absolute patch paths are accepted when they point inside `root` or
    /// inside `project_root`; they are mapped onto the same relative location
    /// in `root`.
    ///
    /// # Errors
    /// Returns `Error::Patch` if the target escapes the tree or cannot be written.
    pub fn apply(root: &Path, project_root: Option<&Path>, patch: &Patch) -> Result<Self> {
        let relative = resolve_relative(root, project_root, &patch.path)?;
        ensure_no_symlinks(root, &relative)?;
        let target = root.join(&relative);

        let original = match fs::read(&target) {
            Ok(bytes) => Some(bytes),
            Err(err) if err.kind() == ErrorKind::NotFound => None,
            Err(err) => return Err(patch_error(&target, &err)),
        };

        let created_dirs = match target.parent() {
            Some(parent) => create_missing_dirs(root, parent)
                .map_err(|err| patch_error(&target, &err))?,
            None => Vec::new(),
        };

        let scope = Self {
            target,
            original,
            created_dirs,
            reverted: false,
        };
        // On failure the scope drops here and undoes the partial write.
        fs::write(&scope.target, &patch.content)
            .map_err(|err| patch_error(&scope.target, &err))?;

        tracing::debug!("Applied patch to {}", scope.target.display());
        Ok(scope)
    }

    /// File the patch was written to.
    pub fn target(&self) -> &Path {
        &self.target
    }

    /// Restore the original file now.
    ///
    /// # Errors
    /// Returns `Error::Patch` if the original content cannot be restored.
    pub fn revert(mut self) -> Result<()> {
        self.reverted = true;
        self.restore()
    }

    fn restore(&self) -> Result<()> {
        let outcome = match &self.original {
            Some(bytes) => fs::write(&self.target, bytes),
            None => match fs::remove_file(&self.target) {
                Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
                other => other,
            },
        };
        outcome.map_err(|err| patch_error(&self.target, &err))?;
        self.remove_created_dirs();

        tracing::debug!("Reverted patch on {}", self.target.display());
        Ok(())
    }

    fn remove_created_dirs(&self) {
        remove_dirs(&self.created_dirs);
    }
}

impl Drop for PatchScope {
    fn drop(&mut self) {
        if self.reverted {
            return;
        }
        if let Err(error) = self.restore() {
            tracing::warn!("Working tree may be left patched: {error}");
        }
    }
}

fn patch_error(target: &Path, err: &IoError) -> Error {
    Error::Patch {
        path: target.to_path_buf(),
        reason: err.to_string(),
    }
}

/// Map a patch path onto a path relative to the working tree root.
fn resolve_relative(root: &Path, project_root: Option<&Path>, path: &Path) -> Result<PathBuf> {
    let relative = if path.is_absolute() {
        path.strip_prefix(root)
            .ok()
            .or_else(|| project_root.and_then(|project| path.strip_prefix(project).ok()))
            .map(Path::to_path_buf)
            .ok_or_else(|| Error::Patch {
                path: path.to_path_buf(),
                reason: "absolute path lies outside the working tree".to_owned(),
            })?
    } else {
        path.to_path_buf()
    };

    let escapes = relative
        .components()
        .any(|component| !matches!(component, Component::Normal(_) | Component::CurDir));
    if escapes || relative.as_os_str().is_empty() {
        return Err(Error::Patch {
            path: path.to_path_buf(),
            reason: "path must name a file inside the working tree".to_owned(),
        });
    }
    Ok(relative)
}

/// Create `dir` and any missing ancestors below `root`, outermost first.
fn create_missing_dirs(root: &Path, dir: &Path) -> IoResult<Vec<PathBuf>> {
    let mut missing = Vec::new();
    let mut current = Some(dir);
    while let Some(candidate) = current {
        if candidate == root || candidate.exists() {
            break;
        }
        missing.push(candidate.to_path_buf());
        current = candidate.parent();
    }
    missing.reverse();
    for (index, created) in missing.iter().enumerate() {
        if let Err(err) = fs::create_dir(created) {
            remove_dirs(&missing[..index]);
            return Err(err);
        }
    }
    Ok(missing)
}

/// Remove `dirs` innermost first; a directory that gained other files stays.
fn remove_dirs(dirs: &[PathBuf]) {
    for dir in dirs.iter().rev() {
        if fs::remove_dir(dir).is_err() {
            break;
        }
    }
}

/// Reject a target reached through a symlink, which could point outside `root`.
fn ensure_no_symlinks(root: &Path, relative: &Path) -> Result<()> {
    let mut current = root.to_path_buf();
    for component in relative.components() {
        current.push(component);
        match fs::symlink_metadata(&current) {
            Ok(metadata) if metadata.file_type().is_symlink() => {
                return Err(Error::Patch {
                    path: current,
                    reason: "path passes through a symlink".to_owned(),
                });
            }
            Ok(_) => {}
            // Nothing below a missing component can be a link yet.
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(()),
            Err(err) => return Err(patch_error(&current, &err)),
        }
    }
    Ok(())
}

//! File system utils.

use std::{
    fs::{self, File},
    io::{ErrorKind, Write},
    path::Path,
};

use anyhow::Context;

pub struct FsHandler;

impl FsHandler {
    /// Create a directory (and its parents) if it doesn't exist.
    pub fn ensure_directory(path: &Path) -> anyhow::Result<()> {
        fs::create_dir_all(path)
            .with_context(|| format!("Failed to create directory {}", path.display()))?;
        tracing::trace!(path = %path.display(), "Ensured directory exists");
        Ok(())
    }

    /// Read a file to a string, returning `None` if it does not exist.
    pub fn read_optional(path: &Path) -> anyhow::Result<Option<String>> {
        match fs::read_to_string(path) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).with_context(|| format!("Failed to read {}", path.display())),
        }
    }

    /// Replace the content of a file so that it is on disk when this returns.
    ///
    /// The content is written to a sibling temporary file which is synced and then
    /// renamed over the target, so readers see either the old or the new content.
    pub fn write_durable(path: &Path, content: &str) -> anyhow::Result<()> {
        let parent = path
            .parent()
            .context("File path must have a parent directory")?;
        Self::ensure_directory(parent)?;

        let file_name = path
            .file_name()
            .context("File path must have a file name")?
            .to_string_lossy();
        let tmp_path = parent.join(format!(".{file_name}.tmp"));

        {
            let mut file = File::create(&tmp_path)
                .with_context(|| format!("Failed to create {}", tmp_path.display()))?;
            file.write_all(content.as_bytes())
                .with_context(|| format!("Failed to write {}", tmp_path.display()))?;
            file.sync_all()
                .with_context(|| format!("Failed to sync {}", tmp_path.display()))?;
        }

        fs::rename(&tmp_path, path).with_context(|| {
            format!(
                "Failed to move {} to {}",
                tmp_path.display(),
                path.display()
            )
        })?;

        // Persist the rename itself.
        #[cfg(unix)]
        {
            File::open(parent)
                .and_then(|dir| dir.sync_all())
                .with_context(|| format!("Failed to sync directory {}", parent.display()))?;
        }

        Ok(())
    }
}

//! Post-download placement of archives.
//!
//! After an archive is written to the target directory a placer may hand it
//! on to the game: either by moving it into a watched import directory, or
//! by launching the game client with the archive path as its argument.

use std::io;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use thiserror::Error;
use tracing::{debug, info};

use crate::mirror::BoxFuture;

/// Errors from placing an archive. Never fatal to the download.
#[derive(Debug, Error)]
pub enum PlacementError {
    #[error("failed to {action} {path}: {source}")]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("executable not found: {0}")]
    ExecutableNotFound(PathBuf),

    #[error("failed to launch {program}: {source}")]
    Spawn {
        program: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Side effect applied to every freshly written archive.
pub trait ArchivePlacer: Send + Sync {
    /// Short description for logs.
    fn name(&self) -> &str;

    /// Places the archive at `archive`.
    fn place<'a>(&'a self, archive: &'a Path) -> BoxFuture<'a, Result<(), PlacementError>>;
}

/// Moves archives into a directory, e.g. the stable client's `Songs/` folder.
#[derive(Debug, Clone)]
pub struct MoveToDirectory {
    dir: PathBuf,
}

impl MoveToDirectory {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    async fn move_file(&self, archive: &Path) -> Result<(), PlacementError> {
        let file_name = archive.file_name().ok_or_else(|| PlacementError::Io {
            action: "move",
            path: archive.to_path_buf(),
            source: io::Error::new(io::ErrorKind::InvalidInput, "path has no file name"),
        })?;
        let dest = self.dir.join(file_name);

        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|source| PlacementError::Io {
                action: "create",
                path: self.dir.clone(),
                source,
            })?;

        match tokio::fs::rename(archive, &dest).await {
            Ok(()) => {}
            Err(e) if is_cross_device(&e) => {
                debug!(from = %archive.display(), to = %dest.display(), "Cross-device move, copying");
                tokio::fs::copy(archive, &dest)
                    .await
                    .map_err(|source| PlacementError::Io {
                        action: "copy",
                        path: dest.clone(),
                        source,
                    })?;
                tokio::fs::remove_file(archive)
                    .await
                    .map_err(|source| PlacementError::Io {
                        action: "remove",
                        path: archive.to_path_buf(),
                        source,
                    })?;
            }
            Err(source) => {
                return Err(PlacementError::Io {
                    action: "move",
                    path: archive.to_path_buf(),
                    source,
                })
            }
        }

        info!(path = %dest.display(), "Archive moved");
        Ok(())
    }
}

impl ArchivePlacer for MoveToDirectory {
    fn name(&self) -> &str {
        "move"
    }

    fn place<'a>(&'a self, archive: &'a Path) -> BoxFuture<'a, Result<(), PlacementError>> {
        Box::pin(self.move_file(archive))
    }
}

/// Launches an application with the archive path, e.g. the lazer client.
///
/// The child is not awaited; the application imports the archive on its own.
#[derive(Debug, Clone)]
pub struct OpenWithApplication {
    program: PathBuf,
    args: Vec<String>,
}

impl OpenWithApplication {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    /// Adds an argument passed before the archive path.
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    fn launch(&self, archive: &Path) -> Result<(), PlacementError> {
        // bare command names are resolved through PATH by the OS
        let is_path = self.program.components().count() > 1;
        if is_path && !self.program.exists() {
            return Err(PlacementError::ExecutableNotFound(self.program.clone()));
        }

        tokio::process::Command::new(&self.program)
            .args(&self.args)
            .arg(archive)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|source| PlacementError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        info!(program = %self.program.display(), archive = %archive.display(), "Archive handed to application");
        Ok(())
    }
}

impl ArchivePlacer for OpenWithApplication {
    fn name(&self) -> &str {
        "open"
    }

    fn place<'a>(&'a self, archive: &'a Path) -> BoxFuture<'a, Result<(), PlacementError>> {
        Box::pin(async move { self.launch(archive) })
    }
}

/// Whether a rename failed because source and destination are on different devices.
pub fn is_cross_device(err: &io::Error) -> bool {
    #[cfg(unix)]
    {
        err.raw_os_error() == Some(libc::EXDEV)
    }
    #[cfg(windows)]
    {
        // ERROR_NOT_SAME_DEVICE
        err.raw_os_error() == Some(17)
    }
    #[cfg(not(any(unix, windows)))]
    {
        let _ = err;
        false
    }
}

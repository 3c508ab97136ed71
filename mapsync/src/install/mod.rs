//! Game install locations.
//!
//! Resolves where the stable and lazer clients live on this machine, and
//! builds the [`ArchivePlacer`] that hands a downloaded archive to each:
//!
//! | client | root                                   | placement                          |
//! |--------|----------------------------------------|------------------------------------|
//! | stable | `%LOCALAPPDATA%\osu!` (else `~/.osu`)  | move into `<root>/Songs`           |
//! | lazer  | platform data dir + `/osu`             | launch the client with the archive |

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use crate::pool::{ArchivePlacer, MoveToDirectory, OpenWithApplication};

/// Which game client an install belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GameClient {
    Stable,
    Lazer,
}

impl GameClient {
    pub fn as_str(&self) -> &'static str {
        match self {
            GameClient::Stable => "stable",
            GameClient::Lazer => "lazer",
        }
    }
}

impl fmt::Display for GameClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GameClient {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "stable" => Ok(GameClient::Stable),
            "lazer" => Ok(GameClient::Lazer),
            other => Err(format!("unknown client '{}' (expected stable or lazer)", other)),
        }
    }
}

/// A located (not necessarily present) game install.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OsuInstall {
    client: GameClient,
    root: PathBuf,
    executable: PathBuf,
}

impl OsuInstall {
    /// Default location of `client` on this platform.
    ///
    /// Returns `None` when the platform's user directories are unknown.
    pub fn locate(client: GameClient) -> Option<Self> {
        match client {
            GameClient::Stable => Self::stable(),
            GameClient::Lazer => Self::lazer(),
        }
    }

    /// The stable client's default location.
    pub fn stable() -> Option<Self> {
        let root = if cfg!(windows) {
            dirs::data_local_dir()?.join("osu!")
        } else {
            // wine installs are expected to be linked here
            dirs::home_dir()?.join(".osu")
        };
        let executable = if cfg!(windows) {
            root.join("osu!.exe")
        } else {
            PathBuf::from("osu!")
        };
        Some(Self {
            client: GameClient::Stable,
            root,
            executable,
        })
    }

    /// The lazer client's default location.
    pub fn lazer() -> Option<Self> {
        let root = dirs::data_dir()?.join("osu");
        let executable = if cfg!(windows) {
            dirs::data_local_dir()?
                .join("osulazer")
                .join("current")
                .join("osu!.exe")
        } else if cfg!(target_os = "macos") {
            PathBuf::from("/Applications/osu!.app/Contents/MacOS/osu!")
        } else {
            PathBuf::from("osu!")
        };
        Some(Self {
            client: GameClient::Lazer,
            root,
            executable,
        })
    }

    /// An install rooted at an explicit directory.
    pub fn at(client: GameClient, root: impl Into<PathBuf>, executable: impl Into<PathBuf>) -> Self {
        Self {
            client,
            root: root.into(),
            executable: executable.into(),
        }
    }

    pub fn client(&self) -> GameClient {
        self.client
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn executable(&self) -> &Path {
        &self.executable
    }

    /// Stable's `Songs/` directory.
    pub fn songs_dir(&self) -> Option<PathBuf> {
        match self.client {
            GameClient::Stable => Some(self.root.join("Songs")),
            GameClient::Lazer => None,
        }
    }

    /// Stable's `osu!.db`.
    pub fn database_path(&self) -> Option<PathBuf> {
        match self.client {
            GameClient::Stable => Some(self.root.join("osu!.db")),
            GameClient::Lazer => None,
        }
    }

    /// Placer handing archives to this client.
    pub fn placer(&self) -> Arc<dyn ArchivePlacer> {
        match self.client {
            GameClient::Stable => Arc::new(MoveToDirectory::new(self.root.join("Songs"))),
            GameClient::Lazer => Arc::new(OpenWithApplication::new(&self.executable)),
        }
    }
}

//! Common types and utilities shared across CLI commands.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use clap::ValueEnum;
use mapsync::config::ConfigFile;
use mapsync::install::{GameClient, OsuInstall};

use crate::error::CliError;

/// Game client selection for CLI arguments.
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
pub enum ClientArg {
    /// osu!stable: archives are moved into the Songs folder
    Stable,
    /// osu!lazer: archives are opened with the game, which imports them
    Lazer,
}

impl From<ClientArg> for GameClient {
    fn from(client: ClientArg) -> Self {
        match client {
            ClientArg::Stable => GameClient::Stable,
            ClientArg::Lazer => GameClient::Lazer,
        }
    }
}

/// Resolve the auto-place client from CLI args and config.
pub fn resolve_auto_place(cli_client: Option<ClientArg>, config: &ConfigFile) -> Option<GameClient> {
    cli_client
        .map(GameClient::from)
        .or_else(|| config.download.auto_place.client())
}

/// Locate a client install, failing with a readable message.
pub fn locate_install(client: GameClient) -> Result<OsuInstall, CliError> {
    OsuInstall::locate(client).ok_or_else(|| {
        CliError::Config(format!(
            "Could not determine the {} install location on this platform",
            client
        ))
    })
}

/// The stable client's `osu!.db`, unless `explicit` names another file.
pub fn resolve_database_path(explicit: Option<&Path>) -> Result<PathBuf, CliError> {
    if let Some(path) = explicit {
        return Ok(path.to_path_buf());
    }
    locate_install(GameClient::Stable)?
        .database_path()
        .ok_or_else(|| CliError::Config("The stable client has no osu!.db location".to_string()))
}

/// Parse beatmap set IDs from free text.
///
/// IDs may be separated by whitespace, commas or semicolons. Lines starting
/// with `#` are comments. Any token that is not a positive integer is an
/// error.
pub fn parse_ids(text: &str) -> Result<Vec<u32>, CliError> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.starts_with('#'))
        .flat_map(|line| line.split(|c: char| c.is_whitespace() || c == ',' || c == ';'))
        .filter(|token| !token.is_empty())
        .map(|token| match token.parse::<u32>() {
            Ok(id) if id > 0 => Ok(id),
            _ => Err(CliError::InvalidId(token.to_string())),
        })
        .collect()
}

/// Merge command-line IDs with those read from `ids_file`.
///
/// Order is preserved and the first occurrence of each ID wins.
pub fn collect_ids(cli_ids: &[u32], ids_file: Option<&Path>) -> Result<Vec<u32>, CliError> {
    let mut ids = cli_ids.to_vec();
    if let Some(path) = ids_file {
        let text = std::fs::read_to_string(path).map_err(|source| CliError::ReadIds {
            path: path.to_path_buf(),
            source,
        })?;
        ids.extend(parse_ids(&text)?);
    }

    let mut seen = HashSet::with_capacity(ids.len());
    ids.retain(|id| seen.insert(*id));
    Ok(ids)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_parse_ids_mixed_separators() {
        let ids = parse_ids("1, 2;3\n# comment 99\n  4   5\n").unwrap();
        assert_eq!(ids, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_parse_ids_rejects_garbage() {
        assert!(matches!(parse_ids("12 abc"), Err(CliError::InvalidId(t)) if t == "abc"));
        assert!(matches!(parse_ids("0"), Err(CliError::InvalidId(_))));
    }

    #[test]
    fn test_collect_ids_dedups_in_order() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("ids.txt");
        std::fs::write(&file, "3\n1\n4\n").unwrap();

        let ids = collect_ids(&[1, 2], Some(&file)).unwrap();
        assert_eq!(ids, vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_collect_ids_missing_file() {
        let err = collect_ids(&[], Some(Path::new("/nonexistent/ids.txt"))).unwrap_err();
        assert!(matches!(err, CliError::ReadIds { .. }));
    }

    #[test]
    fn test_resolve_auto_place_prefers_cli() {
        let mut config = ConfigFile::default();
        assert_eq!(resolve_auto_place(None, &config), None);

        config.download.auto_place = mapsync::config::AutoPlace::Client(GameClient::Stable);
        assert_eq!(resolve_auto_place(None, &config), Some(GameClient::Stable));
        assert_eq!(
            resolve_auto_place(Some(ClientArg::Lazer), &config),
            Some(GameClient::Lazer)
        );
    }
}

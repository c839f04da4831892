//! Persist the highscore to disk (XDG config or ~/.config/candyboom): one integer in a text file.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;

const DIRNAME: &str = "candyboom";
const FILENAME: &str = "highscore";

#[derive(Debug, Error)]
pub enum HighscoreError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid highscore: {0:?}")]
    Parse(String),
    #[error("no config directory: neither XDG_CONFIG_HOME nor HOME is set")]
    NoConfigDir,
}

/// Default location: `$XDG_CONFIG_HOME/candyboom/highscore`, else `~/.config/candyboom/highscore`.
pub fn default_path() -> Result<PathBuf, HighscoreError> {
    let base = match std::env::var("XDG_CONFIG_HOME") {
        Ok(xdg) if !xdg.is_empty() => PathBuf::from(xdg),
        _ => std::env::var("HOME")
            .map(|h| PathBuf::from(h).join(".config"))
            .map_err(|_| HighscoreError::NoConfigDir)?,
    };
    Ok(base.join(DIRNAME).join(FILENAME))
}

/// Read the stored highscore.
pub fn read_highscore(path: &Path) -> Result<u32, HighscoreError> {
    let content = fs::read_to_string(path)?;
    let first = content.lines().next().unwrap_or("").trim();
    first
        .parse::<u32>()
        .map_err(|_| HighscoreError::Parse(first.to_string()))
}

/// Load the highscore; 0 on a missing or unreadable file.
pub fn load_highscore(path: &Path) -> u32 {
    match read_highscore(path) {
        Ok(n) => {
            log::info!("highscore loaded: {n}");
            n
        }
        Err(HighscoreError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
            log::info!("no saved highscore at {}", path.display());
            0
        }
        Err(e) => {
            log::warn!("could not load highscore from {}: {e}", path.display());
            0
        }
    }
}

/// Save the highscore. Creates the parent directory if needed.
pub fn save_highscore(path: &Path, highscore: u32) -> Result<(), HighscoreError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut f = fs::File::create(path)?;
    writeln!(f, "{}", highscore)?;
    log::debug!("highscore saved: {highscore}");
    Ok(())
}

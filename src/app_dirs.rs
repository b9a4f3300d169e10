use directories::ProjectDirs;
use std::path::PathBuf;

/// Centralized application directory resolution
pub struct AppDirs;

impl AppDirs {
    /// `$HOME/.local/state/ringside`, else the platform data dir
    pub fn state_dir() -> Option<PathBuf> {
        if let Ok(home) = std::env::var("HOME") {
            Some(
                PathBuf::from(home)
                    .join(".local")
                    .join("state")
                    .join("ringside"),
            )
        } else {
            ProjectDirs::from("", "", "ringside").map(|proj_dirs| proj_dirs.data_local_dir().into())
        }
    }

    pub fn db_path() -> Option<PathBuf> {
        Self::state_dir().map(|d| d.join("ringside.db"))
    }

    pub fn log_path() -> Option<PathBuf> {
        Self::state_dir().map(|d| d.join("ringside.log"))
    }
}

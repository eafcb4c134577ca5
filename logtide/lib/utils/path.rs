use std::path::{Path, PathBuf};

//--------------------------------------------------------------------------------------------------
// Constants
//--------------------------------------------------------------------------------------------------

/// The sub directory where logtide state, configs, etc are stored.
pub const LOGTIDE_HOME_DIR: &str = ".logtide";

/// The default configuration filename looked up in the working directory.
pub const LOGTIDE_CONFIG_FILENAME: &str = "logtide.yaml";

/// The filename of the cursor database inside the logtide home directory.
pub const CURSOR_DB_FILENAME: &str = "cursors.db";

/// The sub directory where rotated daemon log files are written.
pub const LOG_SUBDIR: &str = "logs";

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Expands a leading `~` or `~/` in a path to the user's home directory.
/// Paths without a tilde are returned unchanged.
pub fn expand_home(path: &Path) -> PathBuf {
    let Some(s) = path.to_str() else {
        return path.to_path_buf();
    };

    if s == "~" {
        return dirs::home_dir().unwrap_or_else(|| path.to_path_buf());
    }

    if let Some(rest) = s.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }

    path.to_path_buf()
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------

//! Data-directory resolution.
//!
//! The directory is resolved ONCE (env override, else a dotted directory
//! under the user's home) and passed around as an explicit `DataDir`
//! value — vault and identity operations never consult the environment
//! themselves.

use std::path::{Path, PathBuf};

use directories::BaseDirs;

use crate::error::VaultError;

pub const DATA_PATH_ENV: &str = "SLATECAST_DATA_PATH";
pub const DEFAULT_DIR_NAME: &str = ".slatecast";

const SALT_FILE_NAME: &str = ".salt";

/// Handle to the directory holding all wallet state files.
#[derive(Debug, Clone)]
pub struct DataDir(PathBuf);

impl DataDir {
    /// Resolve from `SLATECAST_DATA_PATH`, else `~/.slatecast`.
    /// Creates the directory if it does not exist yet.
    pub fn resolve() -> Result<Self, VaultError> {
        let path = match std::env::var_os(DATA_PATH_ENV) {
            Some(override_path) => PathBuf::from(override_path),
            None => {
                let base = BaseDirs::new().ok_or(VaultError::NoHomeDir)?;
                base.home_dir().join(DEFAULT_DIR_NAME)
            }
        };
        Self::at(path)
    }

    /// Use an explicit directory (tests, `--data-dir` overrides).
    pub fn at<P: AsRef<Path>>(path: P) -> Result<Self, VaultError> {
        let path = path.as_ref().to_path_buf();
        std::fs::create_dir_all(&path)?;
        Ok(Self(path))
    }

    pub fn path(&self) -> &Path {
        &self.0
    }

    pub fn salt_path(&self) -> PathBuf {
        self.0.join(SALT_FILE_NAME)
    }

    /// `<dataDir>/<wallet>.<suffix>` — one file per (wallet, purpose).
    pub fn wallet_file(&self, wallet: &str, suffix: &str) -> PathBuf {
        self.0.join(format!("{wallet}.{suffix}"))
    }
}

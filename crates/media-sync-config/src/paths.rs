use anyhow::Result;
use std::path::{Path, PathBuf};

/// Get the container base path from environment variable, defaulting to "/app"
pub fn container_base_path() -> PathBuf {
    std::env::var("WATCHSYNC_BASE_PATH")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/app"))
}

pub struct PathManager {
    config_dir: PathBuf,
    data_dir: PathBuf,
    log_dir: PathBuf,
}

impl PathManager {
    pub fn new() -> Result<Self> {
        let base_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?
            .join("watchsync");

        Ok(Self::with_base(base_dir))
    }

    /// Everything under one directory: config at the top, data and logs in subdirs
    pub fn with_base(base: PathBuf) -> Self {
        Self {
            config_dir: base.clone(),
            data_dir: base.join("data"),
            log_dir: base.join("logs"),
        }
    }

    pub fn from_docker_env() -> Self {
        Self::with_base(container_base_path())
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn log_dir(&self) -> &Path {
        &self.log_dir
    }

    pub fn config_file(&self) -> PathBuf {
        self.config_dir.join("config.toml")
    }

    /// Side table of completion dates overwritten by rewatches
    pub fn original_dates_file(&self) -> PathBuf {
        self.data_dir.join("original_completion_dates.json")
    }

    pub fn lists_dir(&self) -> PathBuf {
        self.data_dir.join("lists")
    }

    pub fn local_list_file(&self, service: &str) -> PathBuf {
        self.lists_dir().join(format!("{}.json", service))
    }

    pub fn log_file(&self) -> PathBuf {
        self.log_dir.join("watchsync.log")
    }

    pub fn ensure_directories(&self) -> Result<()> {
        std::fs::create_dir_all(&self.config_dir)?;
        std::fs::create_dir_all(&self.data_dir)?;
        std::fs::create_dir_all(&self.log_dir)?;
        std::fs::create_dir_all(self.lists_dir())?;
        Ok(())
    }
}

impl Default for PathManager {
    fn default() -> Self {
        // An explicit base path wins (containers, tests)
        if std::env::var_os("WATCHSYNC_BASE_PATH").is_some() {
            return Self::from_docker_env();
        }

        // Otherwise, use platform-specific paths (e.g., ~/.config/watchsync on Linux)
        Self::new().unwrap_or_else(|_| Self::from_docker_env())
    }
}

use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Settings an [`Image`](crate::Image) is opened with.
#[derive(Debug, Clone)]
pub struct Config {
    /// Directory under which per-image working copies are created.
    pub work_root: PathBuf,
    /// How long to wait for the archive lock. `None` waits forever.
    pub lock_timeout: Option<Duration>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            work_root: env::temp_dir(),
            lock_timeout: None,
        }
    }
}

impl Config {
    pub fn with_work_root<P: AsRef<Path>>(mut self, root: P) -> Self {
        self.work_root = root.as_ref().to_path_buf();
        self
    }

    pub fn with_lock_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.lock_timeout = timeout;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_uses_system_temp_dir() {
        let config = Config::default();
        assert_eq!(config.work_root, env::temp_dir());
        assert!(config.lock_timeout.is_none());
    }

    #[test]
    fn setters_override_defaults() {
        let config = Config::default()
            .with_work_root("/var/tmp")
            .with_lock_timeout(Some(Duration::from_secs(3)));
        assert_eq!(config.work_root, PathBuf::from("/var/tmp"));
        assert_eq!(config.lock_timeout, Some(Duration::from_secs(3)));
    }
}

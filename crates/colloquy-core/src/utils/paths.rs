use std::path::PathBuf;

/// Standardized application directories for Colloquy.
///
/// - User-level config: OS-specific config dir (`config.toml`)
/// - User-level data: OS-specific data dir (history, uploads, logs)
pub struct AppPaths;

impl AppPaths {
    fn project_dirs() -> Option<directories::ProjectDirs> {
        directories::ProjectDirs::from("", "", "colloquy")
    }

    /// Return the user-level config directory (platform-specific)
    pub fn user_config_dir() -> Option<PathBuf> {
        Self::project_dirs().map(|d| d.config_dir().to_path_buf())
    }

    /// Return the user-level data directory (platform-specific)
    pub fn user_data_dir() -> Option<PathBuf> {
        Self::project_dirs().map(|d| d.data_dir().to_path_buf())
    }

    pub fn config_file() -> Option<PathBuf> {
        Self::user_config_dir().map(|d| d.join("config.toml"))
    }

    /// Default history document, falling back to the working directory.
    pub fn default_history_file() -> PathBuf {
        Self::user_data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("chat_history.json")
    }

    /// Directory the upload sidecar serves `/uploads/` from.
    pub fn default_upload_dir() -> PathBuf {
        Self::user_data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("uploads")
    }

    pub fn log_dir() -> Option<PathBuf> {
        Self::user_data_dir().map(|d| d.join("logs"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_files_live_under_the_same_root() {
        let history = AppPaths::default_history_file();
        let uploads = AppPaths::default_upload_dir();
        assert_eq!(history.file_name().unwrap(), "chat_history.json");
        assert_eq!(uploads.file_name().unwrap(), "uploads");
        assert_eq!(history.parent(), uploads.parent());
    }

    #[test]
    fn config_file_is_toml_in_config_dir() {
        if let Some(path) = AppPaths::config_file() {
            assert_eq!(path.extension().unwrap(), "toml");
            assert_eq!(path.parent(), AppPaths::user_config_dir().as_deref());
        }
    }
}

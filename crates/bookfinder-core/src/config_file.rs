use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// On-disk TOML configuration structure.
/// All fields are optional so partial configs work (merge with defaults).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigFile {
    pub server: Option<ServerConfig>,
    pub search: Option<SearchConfig>,
    pub display: Option<DisplayConfig>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    pub base_url: Option<String>,
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Data sources to search when none are given on the command line.
    pub databases: Option<Vec<String>>,
    pub default_field: Option<String>,
    pub fuzzy: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DisplayConfig {
    pub color: Option<bool>,
}

/// Platform config directory path: `<config_dir>/bookfinder/config.toml`.
pub fn config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("bookfinder").join("config.toml"))
}

/// Load config by cascading CWD `.bookfinder.toml` over platform config.
/// CWD values override platform values.
pub fn load_config() -> ConfigFile {
    let platform = config_path().and_then(|p| load_from_path(&p));
    let cwd = load_from_path(Path::new(".bookfinder.toml"));

    match (platform, cwd) {
        (None, None) => ConfigFile::default(),
        (Some(p), None) => p,
        (None, Some(c)) => c,
        (Some(p), Some(c)) => merge(p, c),
    }
}

/// Load a config from a specific path. Returns `None` if the file doesn't
/// exist or can't be parsed.
pub fn load_from_path(path: &Path) -> Option<ConfigFile> {
    let content = std::fs::read_to_string(path).ok()?;
    match toml::from_str(&content) {
        Ok(config) => Some(config),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "ignoring unparsable config file");
            None
        }
    }
}

/// Merge two configs: `overlay` values take precedence over `base`.
pub fn merge(base: ConfigFile, overlay: ConfigFile) -> ConfigFile {
    let base_server = base.server.unwrap_or_default();
    let base_search = base.search.unwrap_or_default();
    let base_display = base.display.unwrap_or_default();
    let server = overlay.server.unwrap_or_default();
    let search = overlay.search.unwrap_or_default();
    let display = overlay.display.unwrap_or_default();

    ConfigFile {
        server: Some(ServerConfig {
            base_url: server.base_url.or(base_server.base_url),
            timeout_secs: server.timeout_secs.or(base_server.timeout_secs),
        }),
        search: Some(SearchConfig {
            databases: search.databases.or(base_search.databases),
            default_field: search.default_field.or(base_search.default_field),
            fuzzy: search.fuzzy.or(base_search.fuzzy),
        }),
        display: Some(DisplayConfig {
            color: display.color.or(base_display.color),
        }),
    }
}

impl ConfigFile {
    pub fn base_url(&self) -> Option<&str> {
        self.server.as_ref().and_then(|s| s.base_url.as_deref())
    }

    pub fn timeout_secs(&self) -> Option<u64> {
        self.server.as_ref().and_then(|s| s.timeout_secs)
    }

    pub fn databases(&self) -> Option<&[String]> {
        self.search.as_ref().and_then(|s| s.databases.as_deref())
    }

    pub fn default_field(&self) -> Option<&str> {
        self.search.as_ref().and_then(|s| s.default_field.as_deref())
    }

    pub fn fuzzy(&self) -> Option<bool> {
        self.search.as_ref().and_then(|s| s.fuzzy)
    }

    pub fn color(&self) -> Option<bool> {
        self.display.as_ref().and_then(|d| d.color)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn parses_partial_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[server]\nbase_url = \"http://nas:10223\"").unwrap();
        let config = load_from_path(file.path()).unwrap();
        assert_eq!(config.base_url(), Some("http://nas:10223"));
        assert_eq!(config.timeout_secs(), None);
        assert_eq!(config.databases(), None);
    }

    #[test]
    fn missing_or_broken_files_are_skipped() {
        assert!(load_from_path(Path::new("/definitely/not/here.toml")).is_none());
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[server\nbase_url = ").unwrap();
        assert!(load_from_path(file.path()).is_none());
    }

    #[test]
    fn overlay_wins_per_field() {
        let base: ConfigFile = toml::from_str(
            r#"
            [server]
            base_url = "http://base"
            timeout_secs = 5
            [search]
            databases = ["a.db", "b.db"]
            default_field = "title"
            "#,
        )
        .unwrap();
        let overlay: ConfigFile = toml::from_str(
            r#"
            [server]
            base_url = "http://overlay"
            [search]
            fuzzy = false
            [display]
            color = false
            "#,
        )
        .unwrap();

        let merged = merge(base, overlay);
        assert_eq!(merged.base_url(), Some("http://overlay"));
        assert_eq!(merged.timeout_secs(), Some(5));
        assert_eq!(
            merged.databases(),
            Some(&["a.db".to_string(), "b.db".to_string()][..])
        );
        assert_eq!(merged.default_field(), Some("title"));
        assert_eq!(merged.fuzzy(), Some(false));
        assert_eq!(merged.color(), Some(false));
    }
}

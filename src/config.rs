//! Optional config file loading. Search order: ./novelscrape.toml, then
//! $XDG_CONFIG_HOME/novelscrape/config.toml (or ~/.config/novelscrape/config.toml).

use crate::scraper::LanguageCode;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Config file contents. All fields optional; only present keys override defaults.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "snake_case", default)]
pub struct Config {
    /// HTTP User-Agent header.
    pub user_agent: Option<String>,
    /// Request timeout in seconds (default 30).
    pub timeout_secs: Option<u64>,
    /// Worker pool size for concurrent source operations (default 4).
    pub max_concurrent_requests: Option<usize>,
    /// Log filter used when RUST_LOG is not set, e.g. "info" or "novelscrape=debug".
    pub log_level: Option<String>,
    /// Default language filter for `search`, as codes ("en") or names ("english").
    pub languages: Option<Vec<String>>,
    /// File this config was read from.
    #[serde(skip)]
    pub path: Option<PathBuf>,
}

impl Config {
    /// Parsed `languages`. Unknown codes are an error naming the offending value.
    pub fn language_codes(&self) -> Result<Vec<LanguageCode>, String> {
        self.languages
            .iter()
            .flatten()
            .map(|s| s.parse::<LanguageCode>())
            .collect()
    }
}

/// Search order: (1) ./novelscrape.toml, (2) $XDG_CONFIG_HOME/novelscrape/config.toml.
/// Missing file returns Ok(None). Invalid TOML or I/O error reading a present file returns Err.
pub fn load_config() -> Result<Option<Config>, String> {
    let cwd = std::env::current_dir()
        .map_err(|e| format!("Cannot determine current directory: {}", e))?;
    let mut paths = vec![cwd.join("novelscrape.toml")];
    if let Some(d) = dirs::config_dir() {
        paths.push(d.join("novelscrape").join("config.toml"));
    }
    load_first(&paths)
}

/// First existing file in `paths`, parsed.
fn load_first(paths: &[PathBuf]) -> Result<Option<Config>, String> {
    match paths.iter().find(|p| p.exists()) {
        Some(path) => read_config(path).map(Some),
        None => Ok(None),
    }
}

fn read_config(path: &Path) -> Result<Config, String> {
    let s = std::fs::read_to_string(path)
        .map_err(|e| format!("Cannot read config {}: {}", path.display(), e))?;
    let mut config: Config =
        toml::from_str(&s).map_err(|e| format!("Invalid config {}: {}", path.display(), e))?;
    config.path = Some(path.to_path_buf());
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_empty_config() {
        let c: Config = toml::from_str("").unwrap();
        assert!(c.user_agent.is_none());
        assert!(c.timeout_secs.is_none());
        assert!(c.max_concurrent_requests.is_none());
        assert!(c.log_level.is_none());
        assert!(c.languages.is_none());
        assert!(c.language_codes().unwrap().is_empty());
    }

    #[test]
    fn parse_full_config() {
        let s = r#"
            user_agent = "Custom/1.0"
            timeout_secs = 60
            max_concurrent_requests = 8
            log_level = "novelscrape=debug"
            languages = ["en", "Indonesian"]
        "#;
        let c: Config = toml::from_str(s).unwrap();
        assert_eq!(c.user_agent.as_deref(), Some("Custom/1.0"));
        assert_eq!(c.timeout_secs, Some(60));
        assert_eq!(c.max_concurrent_requests, Some(8));
        assert_eq!(c.log_level.as_deref(), Some("novelscrape=debug"));
        assert_eq!(
            c.language_codes().unwrap(),
            vec![LanguageCode::English, LanguageCode::Indonesian]
        );
    }

    #[test]
    fn parse_partial_config() {
        let c: Config = toml::from_str("timeout_secs = 5").unwrap();
        assert_eq!(c.timeout_secs, Some(5));
        assert!(c.user_agent.is_none());
        assert!(c.max_concurrent_requests.is_none());
    }

    #[test]
    fn unknown_language_is_reported() {
        let c: Config = toml::from_str(r#"languages = ["en", "klingon"]"#).unwrap();
        let err = c.language_codes().unwrap_err();
        assert!(err.contains("klingon"));
    }

    #[test]
    fn first_existing_file_wins_and_records_its_path() {
        let dir = std::env::temp_dir().join(format!("novelscrape-config-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let missing = dir.join("missing.toml");
        let present = dir.join("config.toml");
        std::fs::write(&present, "timeout_secs = 7").unwrap();

        let c = load_first(&[missing.clone(), present.clone()]).unwrap().unwrap();
        assert_eq!(c.timeout_secs, Some(7));
        assert_eq!(c.path.as_deref(), Some(present.as_path()));
        assert!(load_first(&[missing]).unwrap().is_none());

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn invalid_toml_errors() {
        assert!(toml::from_str::<Config>("timeout_secs = [").is_err());
        assert!(toml::from_str::<Config>(r#"timeout_secs = "soon""#).is_err());
    }
}

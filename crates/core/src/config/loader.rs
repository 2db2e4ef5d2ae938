use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use std::path::Path;

use super::{types::Config, ConfigError};

/// Environment prefix for overrides, e.g. `SWEEPARR_GENERAL__TEST_RUN=true`.
pub const ENV_PREFIX: &str = "SWEEPARR_";

/// Load configuration from file with environment variable overrides
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::FileNotFound(path.display().to_string()));
    }

    let config: Config = Figment::new()
        .merge(Toml::file(path))
        .merge(Env::prefixed(ENV_PREFIX).split("__"))
        .extract()
        .map_err(|e| ConfigError::ParseError(e.to_string()))?;

    Ok(config)
}

/// Load configuration from TOML string (useful for testing)
pub fn load_config_from_str(toml_str: &str) -> Result<Config, ConfigError> {
    toml::from_str(toml_str).map_err(|e| ConfigError::ParseError(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_load_config_from_str_valid() {
        let toml = r#"
[general]
test_run = true
timer_secs = 600

[[instances.sonarr]]
name = "sonarr"
url = "http://localhost:8989"
api_key = "abc"
"#;
        let config = load_config_from_str(toml).unwrap();
        assert!(config.general.test_run);
        assert_eq!(config.general.timer_secs, 600);
        assert_eq!(config.instances.sonarr.len(), 1);
        assert!(config.instances.sonarr[0].enabled);
    }

    #[test]
    fn test_load_config_from_str_bad_type() {
        let toml = r#"
[general]
timer_secs = "five minutes"
"#;
        let result = load_config_from_str(toml);
        assert!(matches!(result, Err(ConfigError::ParseError(_))));
    }

    #[test]
    fn test_load_config_file_not_found() {
        let result = load_config(Path::new("/nonexistent/sweeparr.toml"));
        assert!(matches!(result, Err(ConfigError::FileNotFound(_))));
    }

    #[test]
    fn test_load_config_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(
            temp_file,
            r#"
[general]
log_level = "debug"
protected_tag = "keep"

[[download_clients.qbittorrent]]
name = "qbit"
url = "http://qbit:8080"
username = "admin"
password = "secret"
"#
        )
        .unwrap();

        let config = load_config(temp_file.path()).unwrap();
        assert_eq!(config.general.log_level, "debug");
        assert_eq!(config.general.protected_tag, "keep");
        assert_eq!(config.download_clients.qbittorrent[0].name, "qbit");
    }

    #[test]
    fn test_load_usenet_clients() {
        let toml = r#"
[[download_clients.sabnzbd]]
name = "sab"
url = "http://sab:8080"
api_key = "sabkey"

[[download_clients.nzbget]]
name = "nzbget"
url = "http://nzbget:6789"
username = "nzbget"
password = "tegbzn6789"
enabled = false
"#;
        let config = load_config_from_str(toml).unwrap();
        let sab = &config.download_clients.sabnzbd[0];
        assert_eq!(sab.api_key, "sabkey");
        assert!(sab.enabled);
        assert!(!config.download_clients.nzbget[0].enabled);

        let kinds: Vec<_> = config.download_clients.iter().map(|(kind, ..)| kind).collect();
        assert_eq!(kinds, vec!["sabnzbd", "nzbget"]);
    }
}

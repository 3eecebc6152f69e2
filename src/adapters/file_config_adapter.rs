//! INI file configuration adapter.

use crate::domain::error::RiskError;
use crate::ports::config_port::ConfigPort;
use configparser::ini::Ini;
use std::path::Path;

#[derive(Debug)]
pub struct FileConfigAdapter {
    config: Ini,
}

impl FileConfigAdapter {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, RiskError> {
        let path = path.as_ref();
        let mut config = Ini::new();
        config.load(path).map_err(|reason| RiskError::ConfigParse {
            file: path.display().to_string(),
            reason,
        })?;
        Ok(Self { config })
    }

    pub fn from_string(content: &str) -> Result<Self, RiskError> {
        let mut config = Ini::new();
        config
            .read(content.to_string())
            .map_err(|reason| RiskError::ConfigParse {
                file: "<inline>".to_string(),
                reason,
            })?;
        Ok(Self { config })
    }
}

impl ConfigPort for FileConfigAdapter {
    fn get_string(&self, section: &str, key: &str) -> Option<String> {
        self.config.get(section, key)
    }

    fn get_int(&self, section: &str, key: &str, default: i64) -> i64 {
        self.config
            .getint(section, key)
            .ok()
            .flatten()
            .unwrap_or(default)
    }

    fn get_double(&self, section: &str, key: &str, default: f64) -> f64 {
        self.config
            .getfloat(section, key)
            .ok()
            .flatten()
            .unwrap_or(default)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_temp_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{}", content).unwrap();
        file
    }

    #[test]
    fn from_string_parses_sections() {
        let content = r#"
[data]
source = sqlite
path = /tmp/prices.db

[analysis]
var_method = gaussian
window = 30
"#;
        let adapter = FileConfigAdapter::from_string(content).unwrap();
        assert_eq!(
            adapter.get_string("data", "path"),
            Some("/tmp/prices.db".to_string())
        );
        assert_eq!(
            adapter.get_string("analysis", "var_method"),
            Some("gaussian".to_string())
        );
        assert_eq!(adapter.get_int("analysis", "window", 20), 30);
    }

    #[test]
    fn get_string_returns_none_for_missing_key() {
        let adapter = FileConfigAdapter::from_string("[data]\npath = ./data\n").unwrap();
        assert_eq!(adapter.get_string("data", "missing"), None);
        assert_eq!(adapter.get_string("missing_section", "key"), None);
    }

    #[test]
    fn get_int_returns_default_for_missing_or_non_numeric() {
        let adapter = FileConfigAdapter::from_string("[data]\npool_size = many\n").unwrap();
        assert_eq!(adapter.get_int("data", "pool_size", 4), 4);
        assert_eq!(adapter.get_int("data", "missing", 42), 42);
    }

    #[test]
    fn get_double_returns_value() {
        let adapter =
            FileConfigAdapter::from_string("[analysis]\nrisk_free_rate = 0.025\n").unwrap();
        assert_eq!(adapter.get_double("analysis", "risk_free_rate", 0.0), 0.025);
    }

    #[test]
    fn get_double_returns_default_for_missing_or_non_numeric() {
        let adapter =
            FileConfigAdapter::from_string("[analysis]\nrisk_free_rate = low\n").unwrap();
        assert_eq!(adapter.get_double("analysis", "risk_free_rate", 0.01), 0.01);
        assert_eq!(adapter.get_double("analysis", "missing", 252.0), 252.0);
    }

    #[test]
    fn from_file_reads_config() {
        let file = create_temp_config("[data]\nsource = csv\npath = /srv/prices\n");
        let adapter = FileConfigAdapter::from_file(file.path()).unwrap();
        assert_eq!(
            adapter.get_string("data", "path"),
            Some("/srv/prices".to_string())
        );
    }

    #[test]
    fn from_file_returns_error_for_missing_file() {
        let err = FileConfigAdapter::from_file("/nonexistent/path/config.ini").unwrap_err();
        assert!(
            matches!(err, RiskError::ConfigParse { file, .. } if file.contains("config.ini"))
        );
    }
}

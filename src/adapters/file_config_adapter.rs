//! INI file configuration adapter.
//!
//! Section and key names are case-insensitive; values are returned trimmed.

use crate::domain::error::AnalyzerError;
use crate::ports::config_port::ConfigPort;
use configparser::ini::Ini;
use std::path::Path;

#[derive(Debug)]
pub struct FileConfigAdapter {
    ini: Ini,
}

impl FileConfigAdapter {
    /// Parse the INI file at `path`. Unreadable or malformed files are a
    /// `ConfigParse` error naming the file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, AnalyzerError> {
        let path = path.as_ref();
        let mut ini = Ini::new();
        ini.load(path).map_err(|reason| AnalyzerError::ConfigParse {
            file: path.display().to_string(),
            reason,
        })?;
        Ok(Self { ini })
    }

    pub fn from_string(content: &str) -> Result<Self, AnalyzerError> {
        let mut ini = Ini::new();
        ini.read(content.to_string())
            .map_err(|reason| AnalyzerError::ConfigParse {
                file: "<inline>".to_string(),
                reason,
            })?;
        Ok(Self { ini })
    }
}

impl ConfigPort for FileConfigAdapter {
    fn get_string(&self, section: &str, key: &str) -> Option<String> {
        self.ini.get(section, key).map(|v| v.trim().to_string())
    }

    fn get_int(&self, section: &str, key: &str) -> Option<i64> {
        self.get_string(section, key)?.parse().ok()
    }

    fn get_double(&self, section: &str, key: &str) -> Option<f64> {
        self.get_string(section, key)?.parse().ok()
    }

    fn keys(&self, section: &str) -> Vec<String> {
        let mut keys: Vec<String> = self
            .ini
            .get_map_ref()
            .get(&section.to_lowercase())
            .map(|entries| entries.keys().cloned().collect())
            .unwrap_or_default();
        keys.sort();
        keys
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn reads_sections_from_string() {
        let adapter = FileConfigAdapter::from_string(
            "[source]\npath = /data/trades 2024.csv\n\n[session]\npage_size = 25\n",
        )
        .unwrap();
        assert_eq!(
            adapter.get_string("source", "path").as_deref(),
            Some("/data/trades 2024.csv")
        );
        assert_eq!(adapter.get_int("session", "page_size"), Some(25));
        assert_eq!(adapter.get_string("source", "missing"), None);
        assert_eq!(adapter.get_string("missing_section", "key"), None);
    }

    #[test]
    fn names_are_case_insensitive() {
        let adapter = FileConfigAdapter::from_string("[Source]\nPath = T.csv\n").unwrap();
        assert_eq!(adapter.get_string("source", "path").as_deref(), Some("T.csv"));
        assert_eq!(adapter.get_string("SOURCE", "PATH").as_deref(), Some("T.csv"));
    }

    #[test]
    fn unparsable_numbers_are_none() {
        let adapter = FileConfigAdapter::from_string(
            "[session]\npage_size = abc\n[prices]\nbhp = n/a\ncba = 120.25\n",
        )
        .unwrap();
        assert_eq!(adapter.get_int("session", "page_size"), None);
        assert_eq!(adapter.get_int("session", "missing"), None);
        assert_eq!(adapter.get_double("prices", "bhp"), None);
        assert_eq!(adapter.get_double("prices", "cba"), Some(120.25));
    }

    #[test]
    fn keys_are_sorted() {
        let adapter =
            FileConfigAdapter::from_string("[prices]\nwbc = 30\nbhp = 45\ncba = 120\n").unwrap();
        assert_eq!(adapter.keys("prices"), vec!["bhp", "cba", "wbc"]);
        assert_eq!(adapter.keys("PRICES").len(), 3);
        assert!(adapter.keys("nowhere").is_empty());
    }

    #[test]
    fn from_file_reads_config() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "[source]\npath = trades.csv\n").unwrap();
        let adapter = FileConfigAdapter::from_file(file.path()).unwrap();
        assert_eq!(adapter.get_string("source", "path").as_deref(), Some("trades.csv"));
    }

    #[test]
    fn missing_file_is_config_parse_error() {
        let err = FileConfigAdapter::from_file("/nonexistent/path/analyzer.ini").unwrap_err();
        assert!(
            matches!(err, AnalyzerError::ConfigParse { ref file, .. } if file == "/nonexistent/path/analyzer.ini")
        );
    }
}

//! INI file configuration adapter.

use crate::domain::error::RankError;
use crate::ports::config_port::ConfigPort;
use configparser::ini::Ini;
use std::path::Path;

#[derive(Debug)]
pub struct FileConfigAdapter {
    config: Ini,
}

impl FileConfigAdapter {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, RankError> {
        let path = path.as_ref();
        let mut config = Ini::new();
        config.load(path).map_err(|reason| RankError::ConfigParse {
            file: path.display().to_string(),
            reason,
        })?;
        Ok(Self { config })
    }

    pub fn from_string(content: &str) -> Result<Self, RankError> {
        let mut config = Ini::new();
        config
            .read(content.to_string())
            .map_err(|reason| RankError::ConfigParse {
                file: "<string>".to_string(),
                reason,
            })?;
        Ok(Self { config })
    }

    /// Section names present in the file, lowercased by the parser.
    pub fn sections(&self) -> Vec<String> {
        self.config.sections()
    }
}

impl ConfigPort for FileConfigAdapter {
    fn get_string(&self, section: &str, key: &str) -> Option<String> {
        self.config
            .get(section, key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn get_int(&self, section: &str, key: &str) -> Result<Option<i64>, RankError> {
        if self.get_string(section, key).is_none() {
            return Ok(None);
        }
        self.config
            .getint(section, key)
            .map_err(|reason| RankError::config_invalid(section, key, reason))
    }

    fn get_double(&self, section: &str, key: &str) -> Result<Option<f64>, RankError> {
        if self.get_string(section, key).is_none() {
            return Ok(None);
        }
        self.config
            .getfloat(section, key)
            .map_err(|reason| RankError::config_invalid(section, key, reason))
    }
}

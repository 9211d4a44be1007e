use std::path::PathBuf;

pub const DEFAULT_ADDR: &str = "127.0.0.1:3000";
pub const DEFAULT_DATA_DIR: &str = "database";
pub const DEFAULT_ORIGIN: &str = "http://127.0.0.1:3000";
pub const DEFAULT_OWNER: &str = "local";

/// Runtime settings, read from `PANOTOUR_*` environment variables.
#[derive(Clone, Debug, PartialEq)]
pub struct Config {
    /// Address the web server binds to.
    pub addr: String,
    /// Root of the on-disk object and record stores.
    pub data_dir: PathBuf,
    /// Public origin used in stored image URLs and share links.
    pub origin: String,
    /// Owner segment under which published objects are stored.
    pub owner: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            addr: DEFAULT_ADDR.to_string(),
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            origin: DEFAULT_ORIGIN.to_string(),
            owner: DEFAULT_OWNER.to_string(),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from any key lookup; unset or blank keys keep defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let defaults = Config::default();
        Config {
            addr: get("PANOTOUR_ADDR").unwrap_or(defaults.addr),
            data_dir: get("PANOTOUR_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.data_dir),
            origin: get("PANOTOUR_ORIGIN")
                .map(|o| o.trim_end_matches('/').to_string())
                .unwrap_or(defaults.origin),
            owner: get("PANOTOUR_OWNER").unwrap_or(defaults.owner),
        }
    }

    pub fn storage_dir(&self) -> PathBuf {
        self.data_dir.join("storage")
    }

    pub fn records_dir(&self) -> PathBuf {
        self.data_dir.join("panoramas")
    }

    /// Base URL under which the web server exposes [`Config::storage_dir`].
    pub fn storage_url(&self) -> String {
        format!("{}/storage", self.origin)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn defaults_when_nothing_is_set() {
        let config = Config::from_lookup(|_| None);
        assert_eq!(config, Config::default());
        assert_eq!(config.storage_url(), "http://127.0.0.1:3000/storage");
        assert_eq!(config.records_dir(), PathBuf::from("database/panoramas"));
    }

    #[test]
    fn environment_overrides() {
        let env = HashMap::from([
            ("PANOTOUR_ADDR", "0.0.0.0:8080"),
            ("PANOTOUR_DATA_DIR", "/srv/tours"),
            ("PANOTOUR_ORIGIN", "https://tours.example/"),
            ("PANOTOUR_OWNER", " "),
        ]);
        let config = Config::from_lookup(|k| env.get(k).map(|v| v.to_string()));
        assert_eq!(config.addr, "0.0.0.0:8080");
        assert_eq!(config.storage_dir(), PathBuf::from("/srv/tours/storage"));
        assert_eq!(config.origin, "https://tours.example");
        assert_eq!(config.owner, DEFAULT_OWNER);
    }
}

//! Server parameters exposed through `CONFIG GET` and `CONFIG SET`.
//!
//! Parameters that mirror a command-line flag are fixed for the life of the
//! process. The rest are there so tools written for Redis get an answer
//! (redis-benchmark asks for `save` and `appendonly` on startup); setting
//! them only changes what `CONFIG GET` reports.

use crate::config::Config;
use crate::error::{KvError, KvResult};
use parking_lot::RwLock;
use regex::Regex;
use std::collections::BTreeMap;

#[derive(Debug, Clone)]
struct Param {
    value: String,
    mutable: bool,
}

/// The live parameter table, shared by every connection.
#[derive(Debug)]
pub struct ServerSettings {
    params: RwLock<BTreeMap<&'static str, Param>>,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

impl ServerSettings {
    pub fn from_config(config: &Config) -> Self {
        let fixed = |value: String| Param {
            value,
            mutable: false,
        };
        let tunable = |value: &str| Param {
            value: value.to_string(),
            mutable: true,
        };
        let expiry = config.expiry_config();

        let params = BTreeMap::from([
            ("bind", fixed(config.host.clone())),
            ("port", fixed(config.port.to_string())),
            ("maxkeys", fixed(config.store_config().max_keys.to_string())),
            (
                "active-expire-interval-ms",
                fixed(expiry.interval.as_millis().to_string()),
            ),
            (
                "active-expire-sample-size",
                fixed(expiry.sample_size.to_string()),
            ),
            ("loglevel", fixed(config.log_level.clone())),
            ("maxmemory", tunable("0")),
            ("timeout", tunable("0")),
            ("save", tunable("")),
            ("appendonly", tunable("no")),
        ]);

        Self {
            params: RwLock::new(params),
        }
    }

    /// Name/value pairs of every parameter matching the glob `pattern`,
    /// sorted by name. Matching ignores case.
    pub fn get(&self, pattern: &str) -> KvResult<Vec<(String, String)>> {
        let matcher = glob_to_regex(pattern)?;
        Ok(self
            .params
            .read()
            .iter()
            .filter(|(name, _)| matcher.is_match(name))
            .map(|(name, param)| (name.to_string(), param.value.clone()))
            .collect())
    }

    /// Changes a tunable parameter.
    ///
    /// # Errors
    ///
    /// [`KvError::UnknownConfigParameter`] for a name not in the table and
    /// [`KvError::ImmutableConfigParameter`] for one that mirrors a flag.
    pub fn set(&self, name: &str, value: &str) -> KvResult<()> {
        let name = name.to_ascii_lowercase();
        let mut params = self.params.write();

        let Some(param) = params.get_mut(name.as_str()) else {
            return Err(KvError::UnknownConfigParameter(name));
        };
        if !param.mutable {
            return Err(KvError::ImmutableConfigParameter(name));
        }
        param.value = value.to_string();
        Ok(())
    }
}

/// Turns a `CONFIG GET` glob (`*` and `?`) into an anchored,
/// case-insensitive regex.
fn glob_to_regex(pattern: &str) -> KvResult<Regex> {
    let mut re = String::from("(?i)^");
    for c in pattern.chars() {
        match c {
            '*' => re.push_str(".*"),
            '?' => re.push('.'),
            c => re.push_str(&regex::escape(c.encode_utf8(&mut [0; 4]))),
        }
    }
    re.push('$');
    Regex::new(&re).map_err(|_| KvError::Syntax)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(pairs: &[(String, String)]) -> Vec<&str> {
        pairs.iter().map(|(name, _)| name.as_str()).collect()
    }

    #[test]
    fn test_values_come_from_config() {
        let config = Config {
            port: 7001,
            max_keys: 42,
            ..Config::default()
        };
        let settings = ServerSettings::from_config(&config);

        assert_eq!(
            settings.get("port").unwrap(),
            vec![("port".to_string(), "7001".to_string())]
        );
        assert_eq!(
            settings.get("MAXKEYS").unwrap(),
            vec![("maxkeys".to_string(), "42".to_string())]
        );
        assert_eq!(
            settings.get("active-expire-interval-ms").unwrap()[0].1,
            "100"
        );
    }

    #[test]
    fn test_glob_patterns() {
        let settings = ServerSettings::default();

        let all = settings.get("*").unwrap();
        assert_eq!(all.len(), 10);
        assert!(names(&all).windows(2).all(|w| w[0] < w[1]));

        assert_eq!(
            names(&settings.get("active-expire-*").unwrap()),
            vec!["active-expire-interval-ms", "active-expire-sample-size"]
        );
        assert_eq!(names(&settings.get("p?rt").unwrap()), vec!["port"]);
        assert!(settings.get("nosuch").unwrap().is_empty());
        // Regex metacharacters are literal.
        assert!(settings.get("port.").unwrap().is_empty());
    }

    #[test]
    fn test_set_tunable() {
        let settings = ServerSettings::default();
        settings.set("MaxMemory", "1gb").unwrap();
        assert_eq!(
            settings.get("maxmemory").unwrap(),
            vec![("maxmemory".to_string(), "1gb".to_string())]
        );
    }

    #[test]
    fn test_set_rejects_unknown_and_fixed() {
        let settings = ServerSettings::default();
        assert_eq!(
            settings.set("nosuch", "1"),
            Err(KvError::UnknownConfigParameter("nosuch".into()))
        );
        assert_eq!(
            settings.set("PORT", "1"),
            Err(KvError::ImmutableConfigParameter("port".into()))
        );
        assert_eq!(settings.get("port").unwrap()[0].1, "6379");
    }
}

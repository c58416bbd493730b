use std::{collections::HashMap, fmt::Display, str::FromStr};

use thiserror::Error;

/// Environment lookup failure.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EnvError {
    #[error("Environment variable {0} must be defined")]
    Missing(String),
    #[error("Environment variable {key} has invalid value `{value}`: {reason}")]
    Invalid {
        key: String,
        value: String,
        reason: String,
    },
}

/// Snapshot of process environment, with typed and validated accessors.
///
/// Empty values are treated as unset. The literal `undefined` (what a shell
/// template or a JS `${...}` leaves behind for an unset variable) is rejected
/// instead of being passed on as an address.
#[derive(Debug, Clone, Default)]
pub struct EnvReader {
    vars: HashMap<String, String>,
}

impl EnvReader {
    /// Load `.env` (if present) and then snapshot the process environment.
    pub fn from_env() -> Self {
        if let Err(err) = dotenv::dotenv() {
            tracing::debug!("No .env file loaded: {}", err);
        }
        Self {
            vars: std::env::vars().collect(),
        }
    }

    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            vars: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    pub fn optional(&self, key: &str) -> Result<Option<String>, EnvError> {
        match self.vars.get(key).map(|v| v.trim()) {
            None | Some("") => Ok(None),
            Some("undefined") | Some("null") => Err(EnvError::Invalid {
                key: key.to_owned(),
                value: self.vars[key].clone(),
                reason: String::from("placeholder left by an unset variable"),
            }),
            Some(value) => Ok(Some(value.to_owned())),
        }
    }

    pub fn required(&self, key: &str) -> Result<String, EnvError> {
        self.optional(key)?
            .ok_or_else(|| EnvError::Missing(key.to_owned()))
    }

    pub fn optional_parsed<T>(&self, key: &str) -> Result<Option<T>, EnvError>
    where
        T: FromStr,
        T::Err: Display,
    {
        self.optional(key)?
            .map(|value| {
                value.parse::<T>().map_err(|err| EnvError::Invalid {
                    key: key.to_owned(),
                    value: value.clone(),
                    reason: err.to_string(),
                })
            })
            .transpose()
    }

    pub fn required_parsed<T>(&self, key: &str) -> Result<T, EnvError>
    where
        T: FromStr,
        T::Err: Display,
    {
        self.optional_parsed(key)?
            .ok_or_else(|| EnvError::Missing(key.to_owned()))
    }

    /// First of `keys` that is set, e.g. a chain specific key then a generic one.
    pub fn first_of(&self, keys: &[&str]) -> Result<Option<String>, EnvError> {
        for key in keys {
            if let Some(value) = self.optional(key)? {
                return Ok(Some(value));
            }
        }
        Ok(None)
    }

    pub fn flag(&self, key: &str) -> Result<bool, EnvError> {
        match self.optional(key)?.as_deref() {
            None => Ok(false),
            Some("1") | Some("true") | Some("yes") => Ok(true),
            Some("0") | Some("false") | Some("no") => Ok(false),
            Some(other) => Err(EnvError::Invalid {
                key: key.to_owned(),
                value: other.to_owned(),
                reason: String::from("expected true or false"),
            }),
        }
    }
}

#[cfg(test)]
mod test {
    use test_case::test_case;

    use super::{EnvError, EnvReader};

    fn reader() -> EnvReader {
        EnvReader::from_pairs([
            ("COLLATERAL_TOKEN_SYMBOL", "DAI"),
            ("VOLATILITY_CAP_RATIO", "200"),
            ("EMPTY", "  "),
            ("UNSET_TEMPLATE", "undefined"),
            ("BAD_NUMBER", "20O"),
        ])
    }

    #[test]
    fn test_required_present() {
        assert_eq!(
            reader().required("COLLATERAL_TOKEN_SYMBOL"),
            Ok(String::from("DAI"))
        );
    }

    #[test_case("MISSING"; "absent")]
    #[test_case("EMPTY"; "blank")]
    fn test_required_missing(key: &str) {
        assert_eq!(
            reader().required(key),
            Err(EnvError::Missing(key.to_owned()))
        );
    }

    #[test]
    fn test_undefined_placeholder_rejected() {
        let err = reader().optional("UNSET_TEMPLATE").unwrap_err();
        assert!(matches!(err, EnvError::Invalid { ref key, .. } if key == "UNSET_TEMPLATE"));
    }

    #[test]
    fn test_parsed_values() {
        let env = reader();
        assert_eq!(env.required_parsed::<u64>("VOLATILITY_CAP_RATIO"), Ok(200));
        assert_eq!(env.optional_parsed::<u64>("MISSING"), Ok(None));
        assert!(matches!(
            env.required_parsed::<u64>("BAD_NUMBER"),
            Err(EnvError::Invalid { .. })
        ));
    }

    #[test_case("true" => Ok(true))]
    #[test_case("0" => Ok(false))]
    #[test_case("maybe" => matches Err(_))]
    fn test_flag(value: &str) -> Result<bool, EnvError> {
        EnvReader::from_pairs([("VERIFY", value)]).flag("VERIFY")
    }

    #[test]
    fn test_first_of_prefers_earlier_key() {
        let env = EnvReader::from_pairs([("PRIVATE_KEY", "b"), ("DEPLOYER_PRIVATE_KEY", "a")]);
        assert_eq!(
            env.first_of(&["DEPLOYER_PRIVATE_KEY", "PRIVATE_KEY"]),
            Ok(Some(String::from("a")))
        );
    }
}

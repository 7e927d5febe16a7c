//! Inputs forwarded to the forecasting and training engines.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use validator::Validate;

const MAX_CITY_LEN: usize = 64;

/// Normalised city identifier (lowercase ASCII, digits, `-` and `_`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct City(String);

impl City {
    pub fn parse(raw: &str) -> Result<Self, String> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err("City identifier must not be empty".to_string());
        }
        if trimmed.len() > MAX_CITY_LEN {
            return Err(format!(
                "City identifier must be at most {} characters",
                MAX_CITY_LEN
            ));
        }
        if !trimmed
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(format!("Invalid city identifier '{}'", trimmed));
        }
        Ok(Self(trimmed.to_ascii_lowercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for City {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One training configuration. Keys the gateway does not know are kept in `extra` and
/// forwarded to the training engine untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct HyperParams {
    #[validate(range(min = 1, message = "n_epochs must be at least 1"))]
    pub n_epochs: u32,
    #[validate(range(min = 1, message = "batch_size must be at least 1"))]
    pub batch_size: u32,
    #[validate(range(min = 1e-9, max = 10.0, message = "learning_rate must be in (0, 10]"))]
    pub learning_rate: f64,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Named configurations of a sweep, ordered by name.
pub type HyperParamsById = BTreeMap<String, HyperParams>;

#[derive(Debug, Deserialize, Validate)]
pub struct TrainQuery {
    #[validate(length(min = 1, max = 128, message = "train_label must be 1-128 characters"))]
    pub train_label: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct RetrainQuery {
    #[validate(range(min = 1, message = "n_epochs must be at least 1"))]
    pub n_epochs: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn city_is_normalised() {
        assert_eq!(City::parse(" Margaux ").unwrap().as_str(), "margaux");
        assert_eq!(
            City::parse("cantenac-2").unwrap().to_string(),
            "cantenac-2"
        );
    }

    #[test]
    fn city_rejects_path_tricks() {
        assert!(City::parse("").is_err());
        assert!(City::parse("../etc").is_err());
        assert!(City::parse("bordeaux/merignac").is_err());
        assert!(City::parse(&"a".repeat(65)).is_err());
    }

    #[test]
    fn hyper_params_keep_engine_specific_keys() {
        let hp: HyperParams = serde_json::from_value(json!({
            "n_epochs": 20,
            "batch_size": 32,
            "learning_rate": 0.001,
            "dropout": 0.2
        }))
        .unwrap();

        assert_eq!(hp.extra.get("dropout"), Some(&json!(0.2)));
        assert!(hp.validate().is_ok());
        assert_eq!(serde_json::to_value(&hp).unwrap()["dropout"], json!(0.2));
    }

    #[test]
    fn hyper_params_reject_nonsense() {
        let hp = HyperParams {
            n_epochs: 0,
            batch_size: 32,
            learning_rate: -1.0,
            extra: Map::new(),
        };
        let errors = hp.validate().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("n_epochs"));
        assert!(fields.contains_key("learning_rate"));
    }
}

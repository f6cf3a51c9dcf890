use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::ReductionError;
use crate::value::PropertyValue;

/// Instrument default parameter list as stored on disk.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub instrument: String,
    #[serde(default)]
    pub short_name: Option<String>,
    #[serde(default)]
    pub facility: Option<String>,
    #[serde(default)]
    pub parameters: BTreeMap<String, serde_json::Value>,
    #[serde(default)]
    pub synonyms: BTreeMap<String, String>,
    #[serde(default)]
    pub allowed_values: BTreeMap<String, Vec<serde_json::Value>>,
    #[serde(default)]
    pub composites: BTreeMap<String, Vec<String>>,
    #[serde(default = "default_file_properties")]
    pub file_properties: Vec<String>,
    #[serde(default = "default_abs_norm_file_properties")]
    pub abs_norm_file_properties: Vec<String>,
    #[serde(default = "default_file_extensions")]
    pub file_extensions: BTreeMap<String, String>,
    #[serde(default = "default_data_extensions")]
    pub data_extensions: Vec<String>,
}

/// Defaults after conversion into property values. This is what a
/// `PropertyManager` is built from and what migration consumes.
#[derive(Debug, Clone, PartialEq)]
pub struct InstrumentDefaults {
    pub instrument: String,
    pub short_name: String,
    pub facility: Option<String>,
    pub parameters: BTreeMap<String, PropertyValue>,
    pub synonyms: BTreeMap<String, String>,
    pub allowed_values: BTreeMap<String, Vec<PropertyValue>>,
    pub composites: BTreeMap<String, Vec<String>>,
    pub file_properties: Vec<String>,
    pub abs_norm_file_properties: Vec<String>,
    pub file_extensions: BTreeMap<String, String>,
    pub data_extensions: Vec<String>,
}

impl InstrumentDefaults {
    /// Bare defaults for an instrument; callers add parameters with
    /// [`InstrumentDefaults::with_parameter`].
    pub fn new(instrument: &str, short_name: &str) -> Self {
        Self {
            instrument: instrument.to_string(),
            short_name: short_name.to_string(),
            facility: None,
            parameters: BTreeMap::new(),
            synonyms: BTreeMap::new(),
            allowed_values: BTreeMap::new(),
            composites: BTreeMap::new(),
            file_properties: default_file_properties(),
            abs_norm_file_properties: default_abs_norm_file_properties(),
            file_extensions: default_file_extensions(),
            data_extensions: default_data_extensions(),
        }
    }

    pub fn with_parameter(mut self, name: &str, value: impl Into<PropertyValue>) -> Self {
        self.parameters.insert(name.to_string(), value.into());
        self
    }

    pub fn with_synonym(mut self, alias: &str, canonical: &str) -> Self {
        self.synonyms
            .insert(alias.to_string(), canonical.to_string());
        self
    }

    pub fn with_allowed_values(mut self, name: &str, values: Vec<PropertyValue>) -> Self {
        self.allowed_values.insert(name.to_string(), values);
        self
    }

    pub fn with_composite(mut self, name: &str, fields: &[&str]) -> Self {
        self.composites.insert(
            name.to_string(),
            fields.iter().map(|field| field.to_string()).collect(),
        );
        self
    }

    pub fn with_file_properties(mut self, names: &[&str]) -> Self {
        self.file_properties = names.iter().map(|name| name.to_string()).collect();
        self
    }

    /// Resolves an alias to the canonical property name.
    pub fn canonical<'a>(&'a self, name: &'a str) -> &'a str {
        self.synonyms.get(name).map(String::as_str).unwrap_or(name)
    }
}

pub fn default_file_properties() -> Vec<String> {
    vec![
        "det_cal_file".to_string(),
        "map_file".to_string(),
        "hard_mask_file".to_string(),
    ]
}

pub fn default_abs_norm_file_properties() -> Vec<String> {
    vec!["monovan_mapfile".to_string()]
}

pub fn default_file_extensions() -> BTreeMap<String, String> {
    BTreeMap::from([
        ("map_file".to_string(), ".map".to_string()),
        ("monovan_mapfile".to_string(), ".map".to_string()),
        ("hard_mask_file".to_string(), ".msk".to_string()),
    ])
}

pub fn default_data_extensions() -> Vec<String> {
    vec![".nxs".to_string(), ".raw".to_string()]
}

pub struct ConfigLoader;

impl ConfigLoader {
    pub fn resolve(path: Option<&str>) -> Result<InstrumentDefaults, ReductionError> {
        let config_path = match path {
            Some(path) => PathBuf::from(path),
            None => PathBuf::from("instrument-defaults.json"),
        };

        if path.is_none() && !config_path.exists() {
            return Err(ReductionError::MissingConfig);
        }

        let content = fs::read_to_string(&config_path)
            .map_err(|_| ReductionError::ConfigRead(config_path.clone()))?;
        let config: Config = serde_json::from_str(&content)
            .map_err(|err| ReductionError::ConfigParse(err.to_string()))?;
        Self::resolve_config(config)
    }

    pub fn resolve_config(config: Config) -> Result<InstrumentDefaults, ReductionError> {
        if config.instrument.trim().is_empty() {
            return Err(ReductionError::ConfigParse(
                "instrument name must not be empty".to_string(),
            ));
        }
        for (alias, canonical) in &config.synonyms {
            if alias == canonical {
                return Err(ReductionError::ConfigParse(format!(
                    "synonym {alias} refers to itself"
                )));
            }
        }
        for (name, fields) in &config.composites {
            if fields.is_empty() {
                return Err(ReductionError::ConfigParse(format!(
                    "composite property {name} has no fields"
                )));
            }
        }

        let short_name = config
            .short_name
            .filter(|name| !name.trim().is_empty())
            .unwrap_or_else(|| config.instrument.chars().take(3).collect());

        let mut data_extensions = Vec::new();
        for ext in config.data_extensions {
            data_extensions.push(dotted(&ext));
        }

        Ok(InstrumentDefaults {
            instrument: config.instrument,
            short_name,
            facility: config.facility,
            parameters: config
                .parameters
                .into_iter()
                .map(|(name, value)| (name, PropertyValue::from(value)))
                .collect(),
            synonyms: config.synonyms,
            allowed_values: config
                .allowed_values
                .into_iter()
                .map(|(name, values)| {
                    (name, values.into_iter().map(PropertyValue::from).collect())
                })
                .collect(),
            composites: config.composites,
            file_properties: config.file_properties,
            abs_norm_file_properties: config.abs_norm_file_properties,
            file_extensions: config
                .file_extensions
                .into_iter()
                .map(|(name, ext)| (name, dotted(&ext)))
                .collect(),
            data_extensions,
        })
    }
}

pub(crate) fn dotted(ext: &str) -> String {
    if ext.starts_with('.') {
        ext.to_string()
    } else {
        format!(".{ext}")
    }
}

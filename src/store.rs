use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::ReductionError;

/// Suffix of the dataset holding monitor spectra when they are loaded
/// separately from the detector data.
pub const MONITORS_SUFFIX: &str = "_monitors";

/// Sample log marking a dataset as calibrated.
pub const CALIBRATED_LOG: &str = "calibrated";

/// Sample log recording which runs were summed into a dataset.
pub const SUM_OF_RUNS_LOG: &str = "SumOfRuns:";

pub fn monitors_name(name: &str) -> String {
    format!("{name}{MONITORS_SUFFIX}")
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Spectrum {
    pub number: u32,
    #[serde(default)]
    pub x: Vec<f64>,
    #[serde(default)]
    pub y: Vec<f64>,
    #[serde(default)]
    pub e: Vec<f64>,
}

/// In-memory measurement result. The store owns datasets by name; `name`
/// mirrors the key the dataset is registered under.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Dataset {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub run_number: Option<u32>,
    #[serde(default)]
    pub logs: BTreeMap<String, String>,
    #[serde(default)]
    pub instrument_parameters: BTreeMap<String, String>,
    #[serde(default)]
    pub spectra: Vec<Spectrum>,
    #[serde(default)]
    pub monitors: Vec<Spectrum>,
}

impl Dataset {
    pub fn new(run_number: Option<u32>) -> Self {
        Self {
            run_number,
            ..Self::default()
        }
    }

    pub fn with_spectrum(mut self, spectrum: Spectrum) -> Self {
        self.spectra.push(spectrum);
        self
    }

    pub fn with_monitor(mut self, spectrum: Spectrum) -> Self {
        self.monitors.push(spectrum);
        self
    }

    pub fn has_log(&self, name: &str) -> bool {
        self.logs.contains_key(name)
    }

    pub fn is_calibrated(&self) -> bool {
        self.has_log(CALIBRATED_LOG)
    }

    pub fn index_of_spectrum(&self, number: u32) -> Option<usize> {
        self.spectra
            .iter()
            .position(|spectrum| spectrum.number == number)
    }

    /// Run numbers recorded by summation, or the single run number.
    pub fn summed_runs(&self) -> Option<&str> {
        self.logs.get(SUM_OF_RUNS_LOG).map(String::as_str)
    }
}

/// Name-keyed registry of loaded datasets.
pub trait DatasetStore {
    fn exists(&self, name: &str) -> bool;
    fn get(&self, name: &str) -> Result<&Dataset, ReductionError>;
    fn get_mut(&mut self, name: &str) -> Result<&mut Dataset, ReductionError>;
    /// Registers `dataset` under `name`, replacing any dataset of that name.
    fn insert(&mut self, name: &str, dataset: Dataset);
    fn delete(&mut self, name: &str) -> Result<Dataset, ReductionError>;
    fn rename(&mut self, old: &str, new: &str) -> Result<(), ReductionError>;
    fn names(&self) -> Vec<String>;
}

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    datasets: BTreeMap<String, Dataset>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.datasets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.datasets.is_empty()
    }
}

impl DatasetStore for MemoryStore {
    fn exists(&self, name: &str) -> bool {
        self.datasets.contains_key(name)
    }

    fn get(&self, name: &str) -> Result<&Dataset, ReductionError> {
        self.datasets
            .get(name)
            .ok_or_else(|| ReductionError::DatasetNotFound(name.to_string()))
    }

    fn get_mut(&mut self, name: &str) -> Result<&mut Dataset, ReductionError> {
        self.datasets
            .get_mut(name)
            .ok_or_else(|| ReductionError::DatasetNotFound(name.to_string()))
    }

    fn insert(&mut self, name: &str, mut dataset: Dataset) {
        dataset.name = name.to_string();
        self.datasets.insert(name.to_string(), dataset);
    }

    fn delete(&mut self, name: &str) -> Result<Dataset, ReductionError> {
        self.datasets
            .remove(name)
            .ok_or_else(|| ReductionError::DatasetNotFound(name.to_string()))
    }

    fn rename(&mut self, old: &str, new: &str) -> Result<(), ReductionError> {
        let dataset = self.delete(old)?;
        self.insert(new, dataset);
        Ok(())
    }

    fn names(&self) -> Vec<String> {
        self.datasets.keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rename_keeps_name_in_sync() {
        let mut store = MemoryStore::new();
        store.insert("a", Dataset::new(Some(7)));
        store.rename("a", "b").unwrap();
        assert!(!store.exists("a"));
        assert_eq!(store.get("b").unwrap().name, "b");
        assert_eq!(store.get("b").unwrap().run_number, Some(7));
    }

    #[test]
    fn missing_dataset() {
        let store = MemoryStore::new();
        assert!(matches!(
            store.get("nope"),
            Err(ReductionError::DatasetNotFound(_))
        ));
    }
}

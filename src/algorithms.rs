use std::collections::BTreeMap;
use std::fs;

use camino::Utf8Path;
use serde::Serialize;

use crate::error::ReductionError;
use crate::store::{Dataset, DatasetStore, Spectrum, monitors_name};

/// How monitor spectra are delivered when a run file is loaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MonitorLoading {
    /// Monitors are appended to the data spectra.
    Include,
    /// Monitors go to a companion `<name>_monitors` dataset.
    Separate,
}

impl MonitorLoading {
    pub fn from_policy(load_monitors_with_workspace: bool) -> Self {
        if load_monitors_with_workspace {
            MonitorLoading::Include
        } else {
            MonitorLoading::Separate
        }
    }
}

/// Named operations over datasets in a store.
///
/// Only file-backed operations must be supplied by an implementation; the
/// remaining ones work on the in-memory `Dataset` representation and can be
/// overridden when datasets live elsewhere.
pub trait Algorithms {
    fn load(
        &self,
        store: &mut dyn DatasetStore,
        file: &Utf8Path,
        output: &str,
        monitors: MonitorLoading,
    ) -> Result<(), ReductionError>;

    /// Moves detectors of `workspace` to the positions listed in `file`.
    fn load_detector_info(
        &self,
        store: &mut dyn DatasetStore,
        workspace: &str,
        file: &Utf8Path,
    ) -> Result<(), ReductionError>;

    /// `output = lhs + rhs`, spectrum by spectrum. With `clear_rhs` the right
    /// operand is deleted afterwards.
    fn plus(
        &self,
        store: &mut dyn DatasetStore,
        lhs: &str,
        rhs: &str,
        output: &str,
        clear_rhs: bool,
    ) -> Result<(), ReductionError> {
        let right = store.get(rhs)?.clone();
        let mut result = store.get(lhs)?.clone();
        add_spectra(&mut result.spectra, &right.spectra, lhs, rhs)?;
        add_spectra(&mut result.monitors, &right.monitors, lhs, rhs)?;
        store.insert(output, result);
        if clear_rhs && rhs != output && rhs != lhs {
            store.delete(rhs)?;
        }
        Ok(())
    }

    fn copy_instrument_parameters(
        &self,
        store: &mut dyn DatasetStore,
        input: &str,
        output: &str,
    ) -> Result<(), ReductionError> {
        let parameters = store.get(input)?.instrument_parameters.clone();
        store
            .get_mut(output)?
            .instrument_parameters
            .extend(parameters);
        Ok(())
    }

    fn add_sample_log(
        &self,
        store: &mut dyn DatasetStore,
        workspace: &str,
        name: &str,
        text: &str,
    ) -> Result<(), ReductionError> {
        store
            .get_mut(workspace)?
            .logs
            .insert(name.to_string(), text.to_string());
        Ok(())
    }

    fn clone_workspace(
        &self,
        store: &mut dyn DatasetStore,
        input: &str,
        output: &str,
    ) -> Result<(), ReductionError> {
        let copy = store.get(input)?.clone();
        store.insert(output, copy);
        Ok(())
    }

    fn extract_single_spectrum(
        &self,
        store: &mut dyn DatasetStore,
        input: &str,
        output: &str,
        index: usize,
    ) -> Result<(), ReductionError> {
        let source = store.get(input)?;
        let spectrum = source.spectra.get(index).cloned().ok_or_else(|| {
            ReductionError::invalid_value("WorkspaceIndex", format!("{index} in {input}"))
        })?;
        let mut extracted = Dataset::new(source.run_number);
        extracted.logs = source.logs.clone();
        extracted.instrument_parameters = source.instrument_parameters.clone();
        extracted.spectra.push(spectrum);
        store.insert(output, extracted);
        Ok(())
    }

    /// Rebins every spectrum to `[start, width, end]` boundaries.
    fn rebin(
        &self,
        store: &mut dyn DatasetStore,
        input: &str,
        output: &str,
        params: [f64; 3],
    ) -> Result<(), ReductionError> {
        let [start, width, end] = params;
        if width <= 0.0 || end <= start {
            return Err(ReductionError::invalid_value(
                "Params",
                format!("[{start},{width},{end}]"),
            ));
        }
        let mut result = store.get(input)?.clone();
        for spectrum in &mut result.spectra {
            *spectrum = rebin_spectrum(spectrum, start, width, end);
        }
        store.insert(output, result);
        Ok(())
    }

    /// Appends the spectra of `second` to `first` and removes `second`.
    fn conjoin(
        &self,
        store: &mut dyn DatasetStore,
        first: &str,
        second: &str,
    ) -> Result<(), ReductionError> {
        let appended = store.delete(second)?;
        store.get_mut(first)?.spectra.extend(appended.spectra);
        Ok(())
    }
}

/// Registers a freshly read dataset under `output`, splitting its monitors
/// off according to `monitors`.
pub fn register_loaded(
    store: &mut dyn DatasetStore,
    mut dataset: Dataset,
    output: &str,
    monitors: MonitorLoading,
) {
    let monitor_spectra = std::mem::take(&mut dataset.monitors);
    match monitors {
        MonitorLoading::Include => {
            dataset.spectra.extend(monitor_spectra);
            store.insert(output, dataset);
        }
        MonitorLoading::Separate => {
            if !monitor_spectra.is_empty() {
                let mut monitor_ws = Dataset::new(dataset.run_number);
                monitor_ws.logs = dataset.logs.clone();
                monitor_ws.instrument_parameters = dataset.instrument_parameters.clone();
                monitor_ws.spectra = monitor_spectra;
                store.insert(&monitors_name(output), monitor_ws);
            }
            store.insert(output, dataset);
        }
    }
}

fn add_spectra(
    target: &mut [Spectrum],
    addend: &[Spectrum],
    lhs: &str,
    rhs: &str,
) -> Result<(), ReductionError> {
    if target.len() != addend.len() {
        return Err(ReductionError::TypeMismatch(format!(
            "can not add {rhs} to {lhs}: {} spectra against {}",
            addend.len(),
            target.len()
        )));
    }
    for (left, right) in target.iter_mut().zip(addend) {
        if left.y.len() != right.y.len() {
            return Err(ReductionError::TypeMismatch(format!(
                "can not add spectrum {} of {rhs} to {lhs}: bin counts differ",
                right.number
            )));
        }
        for (value, other) in left.y.iter_mut().zip(&right.y) {
            *value += other;
        }
        if left.e.len() == right.e.len() {
            for (error, other) in left.e.iter_mut().zip(&right.e) {
                *error = (*error * *error + other * other).sqrt();
            }
        }
    }
    Ok(())
}

fn rebin_spectrum(spectrum: &Spectrum, start: f64, width: f64, end: f64) -> Spectrum {
    let mut edges = Vec::new();
    let mut edge = start;
    while edge < end {
        edges.push(edge);
        edge += width;
    }
    edges.push(end);
    let bins = edges.len() - 1;
    let mut y = vec![0.0; bins];
    let mut variance = vec![0.0; bins];

    let histogram = spectrum.x.len() == spectrum.y.len() + 1;
    for (index, counts) in spectrum.y.iter().enumerate() {
        let centre = if histogram {
            (spectrum.x[index] + spectrum.x[index + 1]) / 2.0
        } else {
            match spectrum.x.get(index) {
                Some(x) => *x,
                None => continue,
            }
        };
        if centre < start || centre >= end {
            continue;
        }
        let bin = (((centre - start) / width) as usize).min(bins - 1);
        y[bin] += counts;
        if let Some(error) = spectrum.e.get(index) {
            variance[bin] += error * error;
        }
    }

    Spectrum {
        number: spectrum.number,
        x: edges,
        y,
        e: variance.into_iter().map(f64::sqrt).collect(),
    }
}

/// Reads datasets and detector tables serialised as JSON documents.
#[derive(Debug, Clone, Default)]
pub struct JsonAlgorithms;

impl Algorithms for JsonAlgorithms {
    fn load(
        &self,
        store: &mut dyn DatasetStore,
        file: &Utf8Path,
        output: &str,
        monitors: MonitorLoading,
    ) -> Result<(), ReductionError> {
        let content = fs::read_to_string(file.as_std_path())
            .map_err(|err| ReductionError::Filesystem(format!("read {file}: {err}")))?;
        let dataset: Dataset = serde_json::from_str(&content)
            .map_err(|err| ReductionError::Filesystem(format!("parse {file}: {err}")))?;
        register_loaded(store, dataset, output, monitors);
        Ok(())
    }

    fn load_detector_info(
        &self,
        store: &mut dyn DatasetStore,
        workspace: &str,
        file: &Utf8Path,
    ) -> Result<(), ReductionError> {
        let content = fs::read_to_string(file.as_std_path())
            .map_err(|err| ReductionError::Filesystem(format!("read {file}: {err}")))?;
        let parameters: BTreeMap<String, String> = serde_json::from_str(&content)
            .map_err(|err| ReductionError::Filesystem(format!("parse {file}: {err}")))?;
        store
            .get_mut(workspace)?
            .instrument_parameters
            .extend(parameters);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    struct NoFiles;

    impl Algorithms for NoFiles {
        fn load(
            &self,
            _store: &mut dyn DatasetStore,
            _file: &Utf8Path,
            _output: &str,
            _monitors: MonitorLoading,
        ) -> Result<(), ReductionError> {
            Err(ReductionError::FileNotFound("not used".to_string()))
        }

        fn load_detector_info(
            &self,
            _store: &mut dyn DatasetStore,
            _workspace: &str,
            _file: &Utf8Path,
        ) -> Result<(), ReductionError> {
            Err(ReductionError::FileNotFound("not used".to_string()))
        }
    }

    fn spectrum(number: u32, y: &[f64]) -> Spectrum {
        Spectrum {
            number,
            x: (0..=y.len()).map(|i| i as f64).collect(),
            y: y.to_vec(),
            e: y.iter().map(|v| v.sqrt()).collect(),
        }
    }

    #[test]
    fn plus_clears_right_operand() {
        let mut store = MemoryStore::new();
        store.insert("a", Dataset::new(Some(1)).with_spectrum(spectrum(1, &[1.0, 2.0])));
        store.insert("b", Dataset::new(Some(2)).with_spectrum(spectrum(1, &[3.0, 4.0])));
        NoFiles.plus(&mut store, "a", "b", "a", true).unwrap();
        assert!(!store.exists("b"));
        assert_eq!(store.get("a").unwrap().spectra[0].y, vec![4.0, 6.0]);
        assert_eq!(store.get("a").unwrap().run_number, Some(1));
    }

    #[test]
    fn plus_rejects_mismatched_shapes() {
        let mut store = MemoryStore::new();
        store.insert("a", Dataset::new(Some(1)).with_spectrum(spectrum(1, &[1.0])));
        store.insert("b", Dataset::new(Some(2)));
        assert!(matches!(
            NoFiles.plus(&mut store, "a", "b", "a", true),
            Err(ReductionError::TypeMismatch(_))
        ));
        assert!(store.exists("b"));
    }

    #[test]
    fn rebin_sums_counts_into_wider_bins() {
        let mut store = MemoryStore::new();
        store.insert(
            "a",
            Dataset::new(None).with_spectrum(spectrum(3, &[1.0, 1.0, 2.0, 2.0])),
        );
        NoFiles.rebin(&mut store, "a", "a", [0.0, 2.0, 4.0]).unwrap();
        let rebinned = &store.get("a").unwrap().spectra[0];
        assert_eq!(rebinned.x, vec![0.0, 2.0, 4.0]);
        assert_eq!(rebinned.y, vec![2.0, 4.0]);
    }

    #[test]
    fn separate_monitors_get_companion_dataset() {
        let mut store = MemoryStore::new();
        let dataset = Dataset::new(Some(5))
            .with_spectrum(spectrum(10, &[1.0]))
            .with_monitor(spectrum(1, &[9.0]));
        register_loaded(&mut store, dataset, "run", MonitorLoading::Separate);
        assert_eq!(store.get("run").unwrap().spectra.len(), 1);
        assert_eq!(store.get("run_monitors").unwrap().spectra[0].number, 1);
    }
}

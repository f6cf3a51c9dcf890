use std::cell::RefCell;
use std::collections::BTreeSet;
use std::rc::Rc;

use assert_matches::assert_matches;
use camino::{Utf8Path, Utf8PathBuf};

use direct_runs::algorithms::{Algorithms, MonitorLoading, register_loaded};
use direct_runs::config::InstrumentDefaults;
use direct_runs::error::ReductionError;
use direct_runs::finder::FileResolver;
use direct_runs::manager::PropertyManager;
use direct_runs::run::RunState;
use direct_runs::services::Services;
use direct_runs::store::{
    CALIBRATED_LOG, Dataset, DatasetStore, MemoryStore, SUM_OF_RUNS_LOG, Spectrum,
};
use direct_runs::value::PropertyValue;

/// Resolves names against a fixed set of file names.
struct MockFinder {
    files: BTreeSet<String>,
}

impl MockFinder {
    fn new(files: &[&str]) -> Self {
        Self {
            files: files.iter().map(|file| file.to_string()).collect(),
        }
    }

    fn lookup(&self, hint: &str) -> Option<Utf8PathBuf> {
        let name = Utf8Path::new(hint).file_name()?;
        self.files
            .iter()
            .find(|file| file.eq_ignore_ascii_case(name))
            .map(|file| Utf8PathBuf::from(file.as_str()))
    }
}

impl FileResolver for MockFinder {
    fn find_file(&self, hint: &str) -> Result<Utf8PathBuf, ReductionError> {
        self.lookup(hint)
            .ok_or_else(|| ReductionError::FileNotFound(hint.to_string()))
    }

    fn find_runs(&self, hint: &str) -> Result<Vec<Utf8PathBuf>, ReductionError> {
        if let Some(found) = self.lookup(hint) {
            return Ok(vec![found]);
        }
        let stem = Utf8Path::new(hint).file_stem().unwrap_or(hint).to_string();
        let found: Vec<_> = [".nxs", ".raw"]
            .iter()
            .filter_map(|ext| self.lookup(&format!("{stem}{ext}")))
            .collect();
        if found.is_empty() {
            return Err(ReductionError::FileNotFound(hint.to_string()));
        }
        Ok(found)
    }
}

/// Builds a dataset for `MAR<run>.<ext>` with one detector spectrum (10)
/// and one monitor (1) whose counts equal the run number.
#[derive(Default)]
struct MockLoader {
    loaded: Rc<RefCell<Vec<String>>>,
    embedded_calibration: Option<String>,
}

impl Algorithms for MockLoader {
    fn load(
        &self,
        store: &mut dyn DatasetStore,
        file: &Utf8Path,
        output: &str,
        monitors: MonitorLoading,
    ) -> Result<(), ReductionError> {
        let run: u32 = file
            .file_stem()
            .unwrap_or_default()
            .chars()
            .filter(char::is_ascii_digit)
            .collect::<String>()
            .parse()
            .map_err(|_| ReductionError::FileNotFound(file.to_string()))?;
        let counts = f64::from(run);
        let mut dataset = Dataset::new(Some(run))
            .with_spectrum(Spectrum {
                number: 10,
                x: vec![0.0, 1.0, 2.0],
                y: vec![counts, counts],
                e: vec![1.0, 1.0],
            })
            .with_monitor(Spectrum {
                number: 1,
                x: vec![0.0, 1.0, 2.0],
                y: vec![1.0, 1.0],
                e: vec![1.0, 1.0],
            });
        if let Some(cal) = &self.embedded_calibration {
            dataset
                .instrument_parameters
                .insert("det_cal_file".to_string(), cal.clone());
        }
        register_loaded(store, dataset, output, monitors);
        self.loaded.borrow_mut().push(file.to_string());
        Ok(())
    }

    fn load_detector_info(
        &self,
        store: &mut dyn DatasetStore,
        workspace: &str,
        file: &Utf8Path,
    ) -> Result<(), ReductionError> {
        store
            .get_mut(workspace)?
            .instrument_parameters
            .insert("detector_table".to_string(), file.to_string());
        Ok(())
    }
}

fn manager_with(files: &[&str], loader: MockLoader) -> PropertyManager {
    let defaults = InstrumentDefaults::new("MARI", "MAR").with_parameter("incident_energy", 12.0);
    let services = Services::new(MemoryStore::new(), MockFinder::new(files), loader);
    PropertyManager::new(defaults, services)
}

fn manager(files: &[&str]) -> PropertyManager {
    manager_with(files, MockLoader::default())
}

fn names(manager: &PropertyManager) -> Vec<String> {
    manager.store().names()
}

#[test]
fn assigned_run_number_reads_back_and_names_dataset() {
    let mut manager = manager(&["MAR11001.raw"]);
    manager.set("sample_run", 11001).unwrap();
    assert_eq!(manager.get("sample_run").unwrap(), PropertyValue::Int(11001));
    assert_eq!(manager.run_state("sample_run").unwrap(), RunState::Identified);

    let ws = manager.get_workspace("sample_run").unwrap();
    assert_eq!(ws.as_deref(), Some("SR_MAR011001"));
    assert_eq!(manager.run_state("sample_run").unwrap(), RunState::Resolved);
    assert_eq!(
        manager.get("sample_run").unwrap(),
        PropertyValue::dataset("SR_MAR011001")
    );
    assert_eq!(manager.run_number("sample_run").unwrap(), Some(11001));
    assert_eq!(names(&manager), vec!["SR_MAR011001", "SR_MAR011001_monitors"]);
}

#[test]
fn unset_run_resolves_to_nothing() {
    let mut manager = manager(&[]);
    assert_eq!(manager.run_state("sample_run").unwrap(), RunState::Unset);
    assert_eq!(manager.get_workspace("sample_run").unwrap(), None);
    assert!(names(&manager).is_empty());
}

#[test]
fn resolving_twice_loads_once() {
    let loader = MockLoader::default();
    let loaded = Rc::clone(&loader.loaded);
    let mut manager = manager_with(&["MAR11001.raw"], loader);
    manager.set("sample_run", "MAR11001.raw").unwrap();
    manager.get_workspace("sample_run").unwrap();
    manager.get_workspace("sample_run").unwrap();
    assert_eq!(loaded.borrow().len(), 1);
}

#[test]
fn missing_run_file_is_reported() {
    let mut manager = manager(&[]);
    manager.set("sample_run", 11001).unwrap();
    assert_matches!(
        manager.get_workspace("sample_run"),
        Err(ReductionError::FileNotFound(_))
    );
}

#[test]
fn alternative_extension_is_remembered() {
    let mut manager = manager(&["MAR11001.nxs"]);
    manager.set("sample_run", 11001).unwrap();
    assert_eq!(manager.file_ext("sample_run").unwrap(), ".raw");
    manager.get_workspace("sample_run").unwrap();
    assert_eq!(manager.file_ext("sample_run").unwrap(), ".nxs");

    manager.set_file_ext("sample_run", "raw").unwrap();
    assert_eq!(manager.file_ext("sample_run").unwrap(), ".raw");
}

#[test]
fn summation_leaves_one_tagged_dataset() {
    let mut manager = manager(&["MAR101.raw", "MAR102.raw", "MAR103.raw"]);
    manager.set("sum_runs", true).unwrap();
    manager.set("sample_run", vec![101, 102, 103]).unwrap();
    assert_eq!(manager.run("sample_run").unwrap().runs_to_add().map(<[_]>::len), Some(3));

    let ws = manager.get_workspace("sample_run").unwrap().unwrap();
    assert_eq!(ws, "SR_MAR000101SumOf3");
    assert_eq!(names(&manager), vec!["SR_MAR000101SumOf3", "SR_MAR000101SumOf3_monitors"]);

    let dataset = manager.store().get(&ws).unwrap();
    assert_eq!(
        dataset.logs.get(SUM_OF_RUNS_LOG).map(String::as_str),
        Some("101,102,103")
    );
    assert_eq!(dataset.spectra[0].y, vec![306.0, 306.0]);
    let monitors = manager.store().get("SR_MAR000101SumOf3_monitors").unwrap();
    assert_eq!(monitors.spectra[0].y, vec![3.0, 3.0]);
}

#[test]
fn summation_limited_to_first_runs() {
    let mut manager = manager(&["MAR101.raw", "MAR102.raw", "MAR103.raw"]);
    manager.set("sum_runs", 2).unwrap();
    manager.set("sample_run", "101-103").unwrap();
    let ws = manager.get_workspace("sample_run").unwrap().unwrap();
    assert_eq!(ws, "SR_MAR000101SumOf2");
    let dataset = manager.store().get(&ws).unwrap();
    assert_eq!(dataset.summed_runs(), Some("101,102"));
}

#[test]
fn summing_more_runs_than_given_fails() {
    let mut manager = manager(&[]);
    manager.set("sum_runs", 5).unwrap();
    assert_matches!(
        manager.set("sample_run", vec![101, 102]),
        Err(ReductionError::InvalidValue { name, .. }) if name == "sum_runs"
    );
}

#[test]
fn rejected_run_list_keeps_previous_run() {
    let mut manager = manager(&[]);
    manager.set("sample_run", 11001).unwrap();
    manager.reset_changed_properties(BTreeSet::new()).unwrap();
    manager.set("sum_runs", 5).unwrap();

    assert!(manager.set("sample_run", vec![101, 102]).is_err());
    assert!(manager.set("sample_run", "MAR101.nxs,MAR102.nxs").is_err());
    assert_eq!(manager.get("sample_run").unwrap(), PropertyValue::Int(11001));
    assert_eq!(manager.file_ext("sample_run").unwrap(), ".raw");
    assert!(manager.run("sample_run").unwrap().runs_to_add().is_none());
    assert!(!manager.changed_properties().contains("sample_run"));
}

#[test]
fn summation_stops_at_missing_run_leaving_partial_sum() {
    let mut manager = manager(&["MAR101.raw", "MAR103.raw"]);
    manager.set("sum_runs", true).unwrap();
    manager.set("sample_run", vec![101, 102, 103]).unwrap();

    assert_matches!(
        manager.get_workspace("sample_run"),
        Err(ReductionError::FileNotFound(_))
    );
    assert_eq!(
        names(&manager),
        vec!["SR_MAR000101SumOf3", "SR_MAR000101SumOf3_monitors"]
    );
    let partial = manager.store().get("SR_MAR000101SumOf3").unwrap();
    assert_eq!(partial.spectra[0].y, vec![101.0, 101.0]);
    assert_eq!(partial.summed_runs(), None);
}

#[test]
fn list_without_summation_takes_first_run() {
    let mut manager = manager(&[]);
    manager.set("sample_run", vec![101, 102, 103]).unwrap();
    assert_eq!(manager.get("sample_run").unwrap(), PropertyValue::Int(101));
    assert!(manager.run("sample_run").unwrap().runs_to_add().is_none());
}

#[test]
fn reset_to_none_purges_bound_dataset() {
    let mut manager = manager(&["MAR11001.raw"]);
    manager.set("sample_run", 11001).unwrap();
    manager.get_workspace("sample_run").unwrap();
    manager.set("sample_run", "None").unwrap();
    assert!(names(&manager).is_empty());
    assert_eq!(manager.get("sample_run").unwrap(), PropertyValue::None);
    assert_eq!(manager.run_state("sample_run").unwrap(), RunState::Unset);
}

#[test]
fn new_run_number_replaces_old_dataset() {
    let mut manager = manager(&["MAR11001.raw", "MAR11002.raw"]);
    manager.set("sample_run", 11001).unwrap();
    manager.get_workspace("sample_run").unwrap();
    manager.set("sample_run", 11002).unwrap();
    assert!(names(&manager).is_empty());
    manager.get_workspace("sample_run").unwrap();
    assert_eq!(names(&manager), vec!["SR_MAR011002", "SR_MAR011002_monitors"]);
}

#[test]
fn dependent_run_mirrors_host_until_set() {
    let mut manager = manager(&["MAR11001.raw", "MAR11002.raw"]);
    manager.set("sample_run", 11001).unwrap();
    assert_eq!(manager.get("mask_run").unwrap(), PropertyValue::Int(11001));
    assert_eq!(
        manager.get_workspace("mask_run").unwrap().as_deref(),
        Some("SR_MAR011001")
    );

    manager.set("mask_run", 11002).unwrap();
    assert_eq!(manager.get("mask_run").unwrap(), PropertyValue::Int(11002));
    assert_eq!(
        manager.get_workspace("mask_run").unwrap().as_deref(),
        Some("MSK_MAR011002")
    );

    manager.set("mask_run", PropertyValue::None).unwrap();
    assert_eq!(
        manager.get("mask_run").unwrap(),
        PropertyValue::dataset("SR_MAR011001")
    );
    assert!(manager.store().exists("MSK_MAR011002"));
}

#[test]
fn existing_dataset_is_adopted() {
    let mut manager = manager(&[]);
    let mut summed = Dataset::new(Some(11001));
    summed
        .logs
        .insert(SUM_OF_RUNS_LOG.to_string(), "11001,11002".to_string());
    manager.store_mut().insert("SR_MAR011001SumOf2", summed);

    manager.set("sample_run", "SR_MAR011001SumOf2").unwrap();
    assert_eq!(manager.run_number("sample_run").unwrap(), Some(11001));
    assert_eq!(
        manager.run("sample_run").unwrap().runs_to_add().map(<[_]>::len),
        Some(2)
    );
    assert_eq!(manager.ws_name("sample_run").unwrap(), "SR_MAR011001SumOf2");
    assert_eq!(names(&manager), vec!["SR_MAR011001SumOf2"]);
}

#[test]
fn adopted_dataset_is_renamed_to_run_scheme() {
    let mut manager = manager(&[]);
    manager
        .store_mut()
        .insert("my_data", Dataset::new(Some(11005)));
    manager.set("sample_run", PropertyValue::dataset("my_data")).unwrap();
    assert!(!manager.store().exists("my_data"));
    let value = manager.get("sample_run").unwrap();
    let name = value.dataset_name().unwrap();
    assert!(name.starts_with("SR_MAR"));
    assert!(name.ends_with("011005"));
}

#[test]
fn action_suffix_renames_on_synchronize() {
    let mut manager = manager(&["MAR11001.raw"]);
    manager.set("sample_run", 11001).unwrap();
    manager.get_workspace("sample_run").unwrap();
    let target = manager.set_action_suffix("sample_run", Some("SPE")).unwrap();
    assert_eq!(target, "SR_MAR011001SPE");
    assert_eq!(manager.synchronize("sample_run").unwrap(), "SR_MAR011001SPE");
    assert_eq!(names(&manager), vec!["SR_MAR011001SPE", "SR_MAR011001SPE_monitors"]);
}

#[test]
fn ws_name_fails_when_dataset_was_deleted() {
    let mut manager = manager(&["MAR11001.raw"]);
    manager.set("sample_run", 11001).unwrap();
    manager.get_workspace("sample_run").unwrap();
    manager.store_mut().delete("SR_MAR011001").unwrap();
    assert_matches!(
        manager.ws_name("sample_run"),
        Err(ReductionError::DatasetNotFound(_))
    );
}

#[test]
fn file_calibration_is_applied_once() {
    let loader = MockLoader::default();
    let mut manager = manager_with(&["MAR11001.raw", "det_corr.nxs"], loader);
    manager.set("det_cal_file", "det_corr.nxs").unwrap();
    manager.set("sample_run", 11001).unwrap();
    let ws = manager.get_workspace("sample_run").unwrap().unwrap();
    let dataset = manager.store().get(&ws).unwrap();
    assert!(dataset.is_calibrated());
    assert_eq!(
        dataset.instrument_parameters.get("detector_table").map(String::as_str),
        Some("det_corr.nxs")
    );
}

#[test]
fn missing_calibration_file_fails() {
    let mut manager = manager(&["MAR11001.raw"]);
    manager.set("det_cal_file", "absent.nxs").unwrap();
    manager.set("sample_run", 11001).unwrap();
    assert_matches!(
        manager.get_workspace("sample_run"),
        Err(ReductionError::CalibrationSource(_))
    );
}

#[test]
fn calibration_embedded_in_run_takes_precedence() {
    let loader = MockLoader {
        embedded_calibration: Some("embedded.dat".to_string()),
        ..MockLoader::default()
    };
    let mut manager = manager_with(&["MAR11001.raw", "embedded.dat"], loader);
    manager.set("sample_run", 11001).unwrap();
    let ws = manager.get_workspace("sample_run").unwrap().unwrap();
    let dataset = manager.store().get(&ws).unwrap();
    assert_eq!(
        dataset.logs.get(CALIBRATED_LOG).map(String::as_str),
        Some("embedded.dat")
    );
}

#[test]
fn embedded_calibration_missing_without_override_fails() {
    let loader = MockLoader {
        embedded_calibration: Some("embedded.dat".to_string()),
        ..MockLoader::default()
    };
    let mut manager = manager_with(&["MAR11001.raw"], loader);
    manager.set("sample_run", 11001).unwrap();
    assert_matches!(
        manager.get_workspace("sample_run"),
        Err(ReductionError::CalibrationSource(_))
    );
}

#[test]
fn calibration_copied_from_dataset() {
    let mut manager = manager(&["MAR11001.raw"]);
    let mut source = Dataset::new(None);
    source
        .instrument_parameters
        .insert("detector_table".to_string(), "from_ws".to_string());
    manager.store_mut().insert("cal_ws", source);
    manager.set("det_cal_file", "cal_ws").unwrap();
    manager.set("sample_run", 11001).unwrap();
    let ws = manager.get_workspace("sample_run").unwrap().unwrap();
    let dataset = manager.store().get(&ws).unwrap();
    assert_eq!(dataset.logs.get(CALIBRATED_LOG).map(String::as_str), Some("cal_ws"));
    assert_eq!(
        dataset.instrument_parameters.get("detector_table").map(String::as_str),
        Some("from_ws")
    );
}

#[test]
fn calibrate_rejects_unknown_dataset() {
    let mut manager = manager(&["det_corr.nxs"]);
    manager.set("det_cal_file", "det_corr.nxs").unwrap();
    assert_matches!(
        manager.calibrate("not_there"),
        Err(ReductionError::TypeMismatch(_))
    );
}

#[test]
fn monitors_with_copied_detector_spectrum() {
    let mut manager = manager(&["MAR11001.raw"]);
    manager.set("spectra_to_monitors_list", 10).unwrap();
    manager.set("sample_run", 11001).unwrap();
    let mon_ws = manager.monitors_workspace("sample_run", None).unwrap();
    assert_eq!(mon_ws.as_deref(), Some("SR_MAR011001_monitors"));
    let monitors = manager.store().get("SR_MAR011001_monitors").unwrap();
    let numbers: Vec<u32> = monitors.spectra.iter().map(|s| s.number).collect();
    assert_eq!(numbers, vec![1, 10]);
    assert!(!manager.store().exists("tmp_mon"));

    assert!(manager.monitors_workspace("sample_run", Some(1)).unwrap().is_some());
    assert_eq!(manager.monitors_workspace("sample_run", Some(99)).unwrap(), None);
    assert!(manager.is_monws_separate("sample_run").unwrap());
}

#[test]
fn monitors_loaded_with_workspace() {
    let mut manager = manager(&["MAR11001.raw"]);
    manager.set("load_monitors_with_workspace", true).unwrap();
    manager.set("sample_run", 11001).unwrap();
    assert_eq!(
        manager.monitors_workspace("sample_run", Some(1)).unwrap().as_deref(),
        Some("SR_MAR011001")
    );
    assert!(!manager.is_monws_separate("sample_run").unwrap());
}

#[test]
fn clone_is_not_bound_to_the_run() {
    let mut manager = manager(&["MAR11001.raw"]);
    manager.set("sample_run", 11001).unwrap();
    let clone = manager.clone_workspace("sample_run", "copy").unwrap();
    assert_eq!(clone.as_deref(), Some("copy"));
    assert!(manager.store().exists("copy_monitors"));
    manager.set("sample_run", PropertyValue::None).unwrap();
    assert_eq!(names(&manager), vec!["copy", "copy_monitors"]);
}

#[test]
fn forced_reload_reads_the_file_again() {
    let loader = MockLoader::default();
    let loaded = Rc::clone(&loader.loaded);
    let mut manager = manager_with(&["MAR11001.raw"], loader);
    manager.set("sample_run", 11001).unwrap();
    manager.load_run("sample_run", false).unwrap();
    manager.load_run("sample_run", false).unwrap();
    manager.load_run("sample_run", true).unwrap();
    assert_eq!(loaded.borrow().len(), 2);
}

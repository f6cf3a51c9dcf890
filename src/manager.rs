use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use tracing::{debug, error, warn};

use crate::config::{InstrumentDefaults, dotted};
use crate::descriptor::{DescriptorTable, PropertyKind};
use crate::error::{MissingFile, ReductionError};
use crate::logging::LogLevel;
use crate::run::{
    Calibration, LoadRequest, RunContext, RunDescriptor, RunDescriptorDependent, RunState,
    SumPolicy, apply_calibration,
};
use crate::services::Services;
use crate::store::{Dataset, DatasetStore};
use crate::value::{Normalized, PropertyValue};

/// Parameters which should normally be changed for an absolute units run.
const MONOVAN_PROPERTIES: [&str; 3] = ["sample_mass", "sample_rmm", "monovan_run"];

#[derive(Debug, Clone, PartialEq, Eq)]
enum RunSlot {
    Primary(RunDescriptor),
    Dependent(RunDescriptorDependent),
}

/// Reduction properties of one session.
///
/// Properties exist only if the instrument defaults or a descriptor declare
/// them. Every successful `set` records the canonical name as changed, which
/// is what `log_changed_values` reports and what `migrate_defaults_from`
/// protects.
pub struct PropertyManager {
    instrument: String,
    short_name: String,
    facility: Option<String>,
    descriptors: Arc<DescriptorTable>,
    defaults: BTreeMap<String, PropertyValue>,
    values: BTreeMap<String, PropertyValue>,
    synonyms: BTreeMap<String, String>,
    allowed_values: BTreeMap<String, Vec<PropertyValue>>,
    changed: BTreeSet<String>,
    file_properties: Vec<String>,
    abs_norm_file_properties: Vec<String>,
    runs: BTreeMap<String, RunSlot>,
    services: Services,
}

impl PropertyManager {
    pub fn new(defaults: InstrumentDefaults, services: Services) -> Self {
        let descriptors = Arc::new(DescriptorTable::build(&defaults));

        let mut values = builtin_values(&defaults);
        values.extend(defaults.parameters.clone());
        let default_values = values.clone();
        for descriptor in descriptors.iter() {
            match descriptor.kind() {
                PropertyKind::File { .. } => {
                    values.entry(descriptor.name().to_string()).or_default();
                }
                PropertyKind::Composite { fields } => {
                    for field in fields {
                        values.entry(field.clone()).or_default();
                    }
                }
                _ => {}
            }
        }
        for name in defaults
            .file_properties
            .iter()
            .chain(&defaults.abs_norm_file_properties)
        {
            if !descriptors.contains(name) {
                values.entry(name.clone()).or_default();
            }
        }

        let mut runs = BTreeMap::new();
        for descriptor in descriptors.iter() {
            match descriptor.kind() {
                PropertyKind::Run { prefix } => {
                    values.remove(descriptor.name());
                    runs.insert(
                        descriptor.name().to_string(),
                        RunSlot::Primary(RunDescriptor::new(prefix)),
                    );
                }
                PropertyKind::DependentRun { host, prefix } => {
                    values.remove(descriptor.name());
                    runs.insert(
                        descriptor.name().to_string(),
                        RunSlot::Dependent(RunDescriptorDependent::new(host, prefix)),
                    );
                }
                _ => {}
            }
        }

        let mut allowed_values = builtin_allowed_values();
        allowed_values.retain(|name, _| values.contains_key(name));
        allowed_values.extend(defaults.allowed_values.clone());

        let mut manager = Self {
            instrument: defaults.instrument.clone(),
            short_name: defaults.short_name.clone(),
            facility: defaults.facility.clone(),
            descriptors,
            defaults: default_values,
            values,
            synonyms: defaults.synonyms.clone(),
            allowed_values,
            changed: BTreeSet::new(),
            file_properties: defaults.file_properties.clone(),
            abs_norm_file_properties: defaults.abs_norm_file_properties.clone(),
            runs,
            services,
        };

        for (name, value) in &defaults.parameters {
            if manager.descriptors.contains(name) {
                let descriptors = Arc::clone(&manager.descriptors);
                if let Some(descriptor) = descriptors.get(name) {
                    if let Err(err) = descriptor.set(&mut manager, value.clone()) {
                        warn!("default value {value} of property {name} rejected: {err}");
                    }
                }
            }
        }
        manager
    }

    pub fn instrument(&self) -> &str {
        &self.instrument
    }

    pub fn short_inst_name(&self) -> String {
        self.values
            .get("short_inst_name")
            .and_then(PropertyValue::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| self.short_name.clone())
    }

    pub fn facility(&self) -> Option<&str> {
        self.facility.as_deref()
    }

    pub fn descriptors(&self) -> &DescriptorTable {
        &self.descriptors
    }

    pub fn store(&self) -> &dyn DatasetStore {
        self.services.store.as_ref()
    }

    pub fn store_mut(&mut self) -> &mut dyn DatasetStore {
        self.services.store.as_mut()
    }

    /// Canonical name for `name`, following the synonym table.
    pub fn canonical<'a>(&'a self, name: &'a str) -> &'a str {
        self.synonyms.get(name).map(String::as_str).unwrap_or(name)
    }

    pub fn is_declared(&self, name: &str) -> bool {
        self.values.contains_key(name) || self.descriptors.contains(name)
    }

    /// Every declared canonical property name.
    pub fn names(&self) -> BTreeSet<String> {
        self.values
            .keys()
            .cloned()
            .chain(self.descriptors.iter().map(|d| d.name().to_string()))
            .collect()
    }

    /// Instrument default of a property. A composite's default is the list
    /// of its fields' defaults.
    pub fn default_value(&self, name: &str) -> PropertyValue {
        let name = self.canonical(name);
        if let Some(PropertyKind::Composite { fields }) =
            self.descriptors.get(name).map(|descriptor| descriptor.kind())
        {
            return PropertyValue::List(
                fields
                    .iter()
                    .map(|field| self.defaults.get(field).cloned().unwrap_or_default())
                    .collect(),
            );
        }
        self.defaults.get(name).cloned().unwrap_or_default()
    }

    pub fn set(&mut self, name: &str, value: impl Into<PropertyValue>) -> Result<(), ReductionError> {
        let canonical = self.canonical(name).to_string();
        if !self.is_declared(&canonical) {
            return Err(ReductionError::UndeclaredProperty(name.to_string()));
        }

        let value = match value.into().normalized() {
            Normalized::Value(value) => value,
            Normalized::Default => self.default_value(&canonical),
        };

        if let Some(allowed) = self.allowed_values.get(&canonical) {
            if !allowed.contains(&value) {
                return Err(ReductionError::invalid_value(&canonical, &value));
            }
        }

        let descriptors = Arc::clone(&self.descriptors);
        match descriptors.get(&canonical) {
            Some(descriptor) => descriptor.set(self, value)?,
            None => {
                self.values.insert(canonical.clone(), value);
            }
        }

        self.changed.insert(canonical);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Result<PropertyValue, ReductionError> {
        let canonical = self.canonical(name);
        match self.descriptors.get(canonical) {
            Some(descriptor) => descriptor.get(self),
            None => self.stored(canonical),
        }
    }

    /// Sets each entry in turn. With `ignore_absent`, entries whose value is
    /// absent or empty are skipped instead of clearing the property.
    pub fn set_many<I, K, V>(
        &mut self,
        entries: I,
        ignore_absent: bool,
    ) -> Result<BTreeSet<String>, ReductionError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<PropertyValue>,
    {
        for (name, value) in entries {
            let value = value.into();
            if ignore_absent && value.is_absent() {
                continue;
            }
            self.set(name.as_ref(), value)?;
        }
        Ok(self.changed.clone())
    }

    pub fn changed_properties(&self) -> &BTreeSet<String> {
        &self.changed
    }

    pub fn reset_changed_properties(
        &mut self,
        changed: BTreeSet<String>,
    ) -> Result<(), ReductionError> {
        if let Some(unknown) = changed.iter().find(|name| !self.is_declared(name)) {
            return Err(ReductionError::UndeclaredProperty(unknown.clone()));
        }
        self.changed = changed;
        Ok(())
    }

    /// Replaces defaults with those of another configuration of the
    /// instrument, leaving explicitly changed properties (and the properties
    /// they derive from) alone.
    ///
    /// Returns the merged changed set; with `ignore_changes` the changed set
    /// is restored to what it was and returned unchanged.
    pub fn migrate_defaults_from(
        &mut self,
        other: &InstrumentDefaults,
        ignore_changes: bool,
    ) -> Result<BTreeSet<String>, ReductionError> {
        if self.instrument != other.instrument {
            warn!(
                "*** WARNING: Setting reduction properties of the instrument {} from the instrument {}. \
                 This only works if both instruments have the same reduction properties!",
                self.instrument, other.instrument
            );
        }

        let old_changes = std::mem::take(&mut self.changed);
        let mut existing_changes = old_changes.clone();
        for change in &old_changes {
            if let Some(descriptor) = self.descriptors.get(change) {
                existing_changes.extend(descriptor.dependencies().iter().cloned());
            }
        }

        // Properties set before a failure remain in the changed set.
        let migrated = self.apply_migrated_defaults(other, &existing_changes);
        self.changed = if ignore_changes {
            old_changes
        } else {
            old_changes.union(&self.changed).cloned().collect()
        };
        migrated?;
        Ok(self.changed.clone())
    }

    fn apply_migrated_defaults(
        &mut self,
        other: &InstrumentDefaults,
        existing_changes: &BTreeSet<String>,
    ) -> Result<(), ReductionError> {
        let mut remaining: BTreeMap<String, PropertyValue> = other
            .parameters
            .iter()
            .map(|(name, value)| (self.canonical(name).to_string(), value.clone()))
            .collect();

        let descriptors = Arc::clone(&self.descriptors);
        for (name, fields) in descriptors.composites() {
            let touched = fields.iter().any(|field| remaining.contains_key(field));
            if !touched {
                continue;
            }
            let protected = existing_changes.contains(name)
                || fields.iter().any(|field| existing_changes.contains(field));
            if !protected {
                let old_value = self.get(name)?;
                let mut new_fields = Vec::with_capacity(fields.len());
                for field in fields {
                    let value = match remaining.get(field) {
                        Some(value) => value.clone(),
                        None => self.stored(field)?,
                    };
                    new_fields.push(value);
                }
                let new_value = PropertyValue::List(new_fields);
                if old_value != new_value {
                    self.set(name, new_value)?;
                }
            }
            for field in fields {
                remaining.remove(field);
            }
        }

        for (name, new_value) in remaining {
            if !self.is_declared(&name) {
                warn!(
                    "property {name} or its derivatives have not been found in existing defaults. Ignoring this property"
                );
                continue;
            }
            self.defaults.insert(name.clone(), new_value.clone());
            if existing_changes.contains(&name) {
                continue;
            }
            let old_value = self.get(&name)?;
            if old_value != new_value {
                self.set(&name, new_value)?;
            }
        }
        for field in descriptors.composites().flat_map(|(_, fields)| fields) {
            if let Some(value) = other.parameters.get(field) {
                self.defaults.insert(field.clone(), value.clone());
            }
        }

        Ok(())
    }

    /// Checks that every file named by a file property can be found.
    /// `abs_units` extends the check to the absolute-units file properties.
    /// All missing files are logged and reported together.
    pub fn check_necessary_files(&self, abs_units: bool) -> Result<(), ReductionError> {
        let mut missing = Vec::new();
        self.collect_missing_files(&self.file_properties, &mut missing);
        if abs_units {
            self.collect_missing_files(&self.abs_norm_file_properties, &mut missing);
        }
        if missing.is_empty() {
            Ok(())
        } else {
            Err(ReductionError::FilesMissing { missing })
        }
    }

    fn collect_missing_files(&self, properties: &[String], missing: &mut Vec<MissingFile>) {
        for property in properties {
            let value = match self.get(property) {
                Ok(value) => value,
                Err(_) => {
                    debug!("file property {property} is not declared; skipping");
                    continue;
                }
            };
            let Some(file) = value.as_str() else {
                continue;
            };
            if self.services.finder.find_file(file).is_err() {
                error!(" Can not find file \"{file}\" for property: {property} ");
                missing.push(MissingFile {
                    property: property.clone(),
                    file: file.to_string(),
                });
            }
        }
    }

    /// True when detectors are to be moved according to a calibration file.
    pub fn relocate_dets(&self) -> bool {
        self.values
            .get("det_cal_file")
            .is_some_and(|value| !value.is_none())
    }

    /// Absolute-units parameters still at their defaults.
    pub fn check_monovan_par_changed(&self) -> Vec<String> {
        MONOVAN_PROPERTIES
            .iter()
            .filter(|name| !self.changed.contains(**name))
            .map(|name| name.to_string())
            .collect()
    }

    pub fn log_changed_values(
        &self,
        level: LogLevel,
        display_header: bool,
        already_changed: &BTreeSet<String>,
    ) {
        let abs_units = self
            .get("monovan_run")
            .map(|value| !value.is_none())
            .unwrap_or(false);

        if display_header {
            if abs_units {
                LogLevel::Notice.log("****************************************************************");
                LogLevel::Notice.log("*** Output will be in absolute units of mb/str/mev/fu");
                for name in self.check_monovan_par_changed() {
                    let value = self.get(&name).unwrap_or_default();
                    LogLevel::Warning.log(&format!(
                        "***WARNING!: Absolute units reduction parameter : {name} has its default value: {value}. \
                         This may need to change for correct absolute units reduction"
                    ));
                }
            }
            if let Ok(energy) = self.get("incident_energy") {
                level.log(&format!("*** Provisional Incident energy: {energy:>12} mEv"));
            }
        }

        level.log("****************************************************************");
        for name in self.changed.difference(already_changed) {
            let value = self.get(name).unwrap_or_default();
            level.log(&format!("  Value of : {name:<25} is set to : {value:<20} "));
        }

        if !display_header {
            return;
        }
        level.log("****************************************************************");
        if abs_units && !self.changed.contains("van_mass") {
            if let Ok(mass) = self.get("van_mass") {
                level.log(&format!("*** Monochromatic vanadium mass used : {mass} "));
            }
        }
        if let Ok(method) = self.get("normalise_method") {
            level.log(&format!("*** Output will be normalized to {method}"));
        }
        if self.get("map_file").map(|map| map.is_none()).unwrap_or(true) {
            level.log("*** one2one map selected");
        }
        level.log("****************************************************************");
    }

    /// Diagnostic parameters with their current values; parameters the
    /// instrument does not declare fall back to built-in values.
    pub fn diagnostics_parameters(&self) -> BTreeMap<String, PropertyValue> {
        let mut result = BTreeMap::new();
        for (name, fallback) in diagnostics_fallbacks(&self.instrument) {
            let value = match self.get(name) {
                Ok(value) => value,
                Err(_) => {
                    warn!(
                        "--- Diagnostics property {name} is not found in instrument properties. Default value: {fallback} is used instead"
                    );
                    fallback
                }
            };
            result.insert(name.to_string(), value);
        }
        result
    }

    /// Settings runs resolve against, taken from the current property values.
    pub fn run_context(&self) -> RunContext {
        let short_inst_name = self.short_inst_name();
        let default_ext = self
            .values
            .get("data_file_ext")
            .and_then(PropertyValue::as_str)
            .map(dotted)
            .unwrap_or_else(|| ".raw".to_string());
        let calibration = self
            .values
            .get("det_cal_file")
            .and_then(|value| self.calibration_of(value, &short_inst_name, &default_ext));

        RunContext {
            calibration,
            prefer_ws_calibration: !self.changed.contains("det_cal_file"),
            load_monitors_with_workspace: self
                .values
                .get("load_monitors_with_workspace")
                .and_then(PropertyValue::as_bool)
                .unwrap_or(false),
            sum_runs: self
                .values
                .get("sum_runs")
                .map(SumPolicy::from_value)
                .unwrap_or(SumPolicy::Off),
            spectra_to_monitors: self
                .values
                .get("spectra_to_monitors_list")
                .map(spectra_list)
                .unwrap_or_default(),
            short_inst_name,
            default_ext,
        }
    }

    fn calibration_of(
        &self,
        value: &PropertyValue,
        short_inst_name: &str,
        default_ext: &str,
    ) -> Option<Calibration> {
        match value {
            PropertyValue::Str(name) if self.services.store.exists(name) => {
                Some(Calibration::Dataset(name.clone()))
            }
            PropertyValue::Str(file) => Some(Calibration::File(file.clone())),
            PropertyValue::Dataset { dataset } => Some(Calibration::Dataset(dataset.clone())),
            PropertyValue::Int(run) => Some(Calibration::File(format!(
                "{short_inst_name}{run}{default_ext}"
            ))),
            _ => None,
        }
    }

    pub(crate) fn stored(&self, name: &str) -> Result<PropertyValue, ReductionError> {
        self.values
            .get(name)
            .cloned()
            .ok_or_else(|| ReductionError::UndeclaredProperty(name.to_string()))
    }

    pub(crate) fn store_value(
        &mut self,
        name: &str,
        value: PropertyValue,
    ) -> Result<(), ReductionError> {
        self.values.insert(name.to_string(), value);
        Ok(())
    }

    pub(crate) fn run_value(&self, name: &str) -> Result<PropertyValue, ReductionError> {
        Ok(self.run(name)?.value(self.services.store.as_ref()))
    }

    pub(crate) fn assign_run(
        &mut self,
        name: &str,
        value: PropertyValue,
    ) -> Result<(), ReductionError> {
        let ctx = self.run_context();
        match self.runs.get_mut(name) {
            Some(RunSlot::Primary(run)) => run.assign(value, &ctx, &mut self.services),
            Some(RunSlot::Dependent(dependent)) => {
                dependent.assign(value, &ctx, &mut self.services)
            }
            None => Err(ReductionError::UndeclaredProperty(name.to_string())),
        }
    }

    /// Slot whose state answers for `name`: a dependent run without its own
    /// value answers through its host.
    fn run_target<'a>(&'a self, name: &'a str) -> Result<&'a str, ReductionError> {
        match self.runs.get(name) {
            None => Err(ReductionError::UndeclaredProperty(name.to_string())),
            Some(RunSlot::Dependent(dependent)) if !dependent.is_defined() => {
                self.run_target(dependent.host())
            }
            Some(_) => Ok(name),
        }
    }

    /// Run state currently answering for `name`.
    pub fn run(&self, name: &str) -> Result<&RunDescriptor, ReductionError> {
        let canonical = self.canonical(name);
        let target = self.run_target(canonical)?;
        match self.runs.get(target) {
            Some(RunSlot::Primary(run)) => Ok(run),
            Some(RunSlot::Dependent(dependent)) => Ok(dependent.run()),
            None => Err(ReductionError::UndeclaredProperty(name.to_string())),
        }
    }

    fn with_run<T>(
        &mut self,
        name: &str,
        action: impl FnOnce(&mut RunDescriptor, &RunContext, &mut Services) -> Result<T, ReductionError>,
    ) -> Result<T, ReductionError> {
        let target = {
            let canonical = self.canonical(name);
            self.run_target(canonical)?.to_string()
        };
        let ctx = self.run_context();
        let run = match self.runs.get_mut(&target) {
            Some(RunSlot::Primary(run)) => run,
            Some(RunSlot::Dependent(dependent)) => dependent.run_mut(),
            None => return Err(ReductionError::UndeclaredProperty(name.to_string())),
        };
        action(run, &ctx, &mut self.services)
    }

    pub fn run_state(&self, name: &str) -> Result<RunState, ReductionError> {
        Ok(self.run(name)?.state(self.services.store.as_ref()))
    }

    pub fn run_number(&self, name: &str) -> Result<Option<u32>, ReductionError> {
        Ok(self.run(name)?.run_number(self.services.store.as_ref()))
    }

    /// Resolves run property `name` to the name of a dataset in the store,
    /// loading, summing and calibrating as needed.
    pub fn get_workspace(&mut self, name: &str) -> Result<Option<String>, ReductionError> {
        self.with_run(name, |run, ctx, services| run.get_workspace(ctx, services))
    }

    pub fn workspace(&mut self, name: &str) -> Result<Option<&Dataset>, ReductionError> {
        let Some(ws_name) = self.get_workspace(name)? else {
            return Ok(None);
        };
        self.services.store.get(&ws_name).map(Some)
    }

    pub fn ws_name(&mut self, name: &str) -> Result<String, ReductionError> {
        self.with_run(name, |run, ctx, services| {
            run.ws_name(ctx, services.store.as_ref())
        })
    }

    pub fn load_run(&mut self, name: &str, force: bool) -> Result<String, ReductionError> {
        self.with_run(name, |run, ctx, services| {
            let request = LoadRequest {
                force,
                ..LoadRequest::from_context(ctx)
            };
            run.load_run(ctx, services, request)
        })
    }

    pub fn set_action_suffix(
        &mut self,
        name: &str,
        suffix: Option<&str>,
    ) -> Result<String, ReductionError> {
        self.with_run(name, |run, ctx, _| Ok(run.set_action_suffix(suffix, ctx)))
    }

    /// Renames the dataset bound to run `name` after its run number or
    /// suffix changed.
    pub fn synchronize(&mut self, name: &str) -> Result<String, ReductionError> {
        self.with_run(name, |run, ctx, services| run.synchronize(ctx, services, None))
    }

    pub fn file_ext(&self, name: &str) -> Result<String, ReductionError> {
        let ctx = self.run_context();
        Ok(self.run(name)?.file_ext(&ctx))
    }

    pub fn set_file_ext(&mut self, name: &str, ext: &str) -> Result<(), ReductionError> {
        self.with_run(name, |run, _, _| run.set_file_ext(ext))
    }

    pub fn clone_workspace(
        &mut self,
        name: &str,
        clone_name: &str,
    ) -> Result<Option<String>, ReductionError> {
        self.with_run(name, |run, ctx, services| {
            run.clone_workspace(ctx, services, clone_name)
        })
    }

    pub fn monitors_workspace(
        &mut self,
        name: &str,
        monitor_id: Option<u32>,
    ) -> Result<Option<String>, ReductionError> {
        self.with_run(name, |run, ctx, services| {
            run.monitors_workspace(ctx, services, monitor_id)
        })
    }

    pub fn is_monws_separate(&mut self, name: &str) -> Result<bool, ReductionError> {
        self.with_run(name, |run, ctx, services| run.is_monws_separate(ctx, services))
    }

    /// Applies the session calibration to any dataset in the store.
    pub fn calibrate(&mut self, dataset: &str) -> Result<(), ReductionError> {
        let ctx = self.run_context();
        apply_calibration(
            &mut self.services,
            dataset,
            ctx.calibration,
            ctx.prefer_ws_calibration,
        )
    }
}

fn builtin_values(defaults: &InstrumentDefaults) -> BTreeMap<String, PropertyValue> {
    BTreeMap::from([
        (
            "instr_name".to_string(),
            PropertyValue::from(defaults.instrument.as_str()),
        ),
        (
            "short_inst_name".to_string(),
            PropertyValue::from(defaults.short_name.as_str()),
        ),
        ("sum_runs".to_string(), PropertyValue::Bool(false)),
        (
            "load_monitors_with_workspace".to_string(),
            PropertyValue::Bool(false),
        ),
        ("data_file_ext".to_string(), PropertyValue::from(".raw")),
        ("det_cal_file".to_string(), PropertyValue::None),
        ("spectra_to_monitors_list".to_string(), PropertyValue::None),
    ])
}

fn builtin_allowed_values() -> BTreeMap<String, Vec<PropertyValue>> {
    BTreeMap::from([
        (
            "normalise_method".to_string(),
            vec![
                PropertyValue::None,
                PropertyValue::from("monitor-1"),
                PropertyValue::from("monitor-2"),
                PropertyValue::from("current"),
            ],
        ),
        (
            "deltaE_mode".to_string(),
            vec![PropertyValue::from("direct")],
        ),
    ])
}

fn diagnostics_fallbacks(instrument: &str) -> Vec<(&'static str, PropertyValue)> {
    vec![
        ("tiny", PropertyValue::Float(1e-10)),
        ("huge", PropertyValue::Float(1e10)),
        ("samp_zero", PropertyValue::Bool(false)),
        ("samp_lo", PropertyValue::Float(0.0)),
        ("samp_hi", PropertyValue::Float(2.0)),
        ("samp_sig", PropertyValue::Float(3.0)),
        ("van_out_lo", PropertyValue::Float(0.01)),
        ("van_out_hi", PropertyValue::Float(100.0)),
        ("van_lo", PropertyValue::Float(0.1)),
        ("van_hi", PropertyValue::Float(1.5)),
        ("van_sig", PropertyValue::Float(0.0)),
        ("variation", PropertyValue::Float(1.1)),
        ("bleed_test", PropertyValue::Bool(false)),
        ("bleed_pixels", PropertyValue::Int(0)),
        ("bleed_maxrate", PropertyValue::Int(0)),
        ("hard_mask_file", PropertyValue::None),
        ("use_hard_mask_only", PropertyValue::Bool(false)),
        ("background_test_range", PropertyValue::None),
        ("instr_name", PropertyValue::from(instrument)),
        ("print_diag_results", PropertyValue::Bool(true)),
    ]
}

/// `spectra_to_monitors_list` may be given as a number, a comma separated
/// string or a list.
fn spectra_list(value: &PropertyValue) -> Vec<u32> {
    match value {
        PropertyValue::Str(text) => text
            .split(',')
            .filter_map(|item| item.trim().parse().ok())
            .collect(),
        PropertyValue::List(items) => items
            .iter()
            .filter_map(|item| item.as_int())
            .filter_map(|item| u32::try_from(item).ok())
            .collect(),
        other => other
            .as_int()
            .and_then(|item| u32::try_from(item).ok())
            .into_iter()
            .collect(),
    }
}

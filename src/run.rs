use camino::{Utf8Path, Utf8PathBuf};
use tracing::{debug, info, warn};

use crate::algorithms::MonitorLoading;
use crate::config::dotted;
use crate::error::ReductionError;
use crate::run_spec::{RunFile, RunFileSpec};
use crate::services::Services;
use crate::store::{CALIBRATED_LOG, DatasetStore, MONITORS_SUFFIX, SUM_OF_RUNS_LOG, monitors_name};
use crate::value::PropertyValue;

const TMP_MONITOR: &str = "tmp_mon";

/// How many runs of a list are summed into one dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SumPolicy {
    Off,
    All,
    First(usize),
}

impl SumPolicy {
    pub fn from_value(value: &PropertyValue) -> Self {
        match value {
            PropertyValue::Bool(true) => SumPolicy::All,
            PropertyValue::Int(count) if *count > 0 => SumPolicy::First(*count as usize),
            _ => SumPolicy::Off,
        }
    }
}

/// Source of detector positions for a dataset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Calibration {
    File(String),
    Dataset(String),
}

/// Settings of the owning manager a run needs while resolving. Built fresh
/// by the manager for every operation.
#[derive(Debug, Clone)]
pub struct RunContext {
    pub short_inst_name: String,
    pub default_ext: String,
    pub calibration: Option<Calibration>,
    pub prefer_ws_calibration: bool,
    pub load_monitors_with_workspace: bool,
    pub sum_runs: SumPolicy,
    pub spectra_to_monitors: Vec<u32>,
}

impl RunContext {
    pub fn new(short_inst_name: &str) -> Self {
        Self {
            short_inst_name: short_inst_name.to_string(),
            default_ext: ".raw".to_string(),
            calibration: None,
            prefer_ws_calibration: false,
            load_monitors_with_workspace: false,
            sum_runs: SumPolicy::Off,
            spectra_to_monitors: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Unset,
    Identified,
    Resolved,
}

/// One contribution to a summed run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunToAdd {
    pub file_path: Option<String>,
    pub run_number: u32,
    pub ext: Option<String>,
}

impl From<&RunFile> for RunToAdd {
    fn from(file: &RunFile) -> Self {
        Self {
            file_path: file.path.clone(),
            run_number: file.run_number,
            ext: file.ext.clone(),
        }
    }
}

/// Options of a single run load.
#[derive(Debug, Clone, Default)]
pub struct LoadRequest {
    pub calibration: Option<Calibration>,
    pub force: bool,
    pub load_monitors_with_workspace: bool,
    pub use_ws_calibration: bool,
    pub file_path: Option<String>,
    pub file_ext: Option<String>,
    pub file_hint: Option<String>,
    pub ws_name: Option<String>,
}

impl LoadRequest {
    /// Load with the calibration and monitor settings of `ctx`.
    pub fn from_context(ctx: &RunContext) -> Self {
        Self {
            calibration: ctx.calibration.clone(),
            load_monitors_with_workspace: ctx.load_monitors_with_workspace,
            use_ws_calibration: ctx.prefer_ws_calibration,
            ..Self::default()
        }
    }
}

/// State of one run property: which run it names, where the data came from
/// and which dataset in the store currently represents it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunDescriptor {
    prop_name: String,
    run_number: Option<u32>,
    run_file_path: Option<String>,
    run_ext: Option<String>,
    ws_name: Option<String>,
    ws_cname: String,
    ws_suffix: String,
    runs_to_add: Option<Vec<RunToAdd>>,
}

impl RunDescriptor {
    pub fn new(prop_name: &str) -> Self {
        Self {
            prop_name: prop_name.to_string(),
            run_number: None,
            run_file_path: None,
            run_ext: None,
            ws_name: None,
            ws_cname: String::new(),
            ws_suffix: String::new(),
            runs_to_add: None,
        }
    }

    pub fn prop_name(&self) -> &str {
        &self.prop_name
    }

    /// Name of the dataset this run is bound to, if any.
    pub fn bound_ws_name(&self) -> Option<&str> {
        self.ws_name.as_deref()
    }

    pub fn runs_to_add(&self) -> Option<&[RunToAdd]> {
        self.runs_to_add.as_deref()
    }

    pub fn file_path(&self) -> Option<&str> {
        self.run_file_path.as_deref()
    }

    pub fn state(&self, store: &dyn DatasetStore) -> RunState {
        match &self.ws_name {
            Some(name) if store.exists(name) => RunState::Resolved,
            _ if self.run_number.is_some() => RunState::Identified,
            _ => RunState::Unset,
        }
    }

    /// The bound dataset when it exists, otherwise the run number.
    pub fn value(&self, store: &dyn DatasetStore) -> PropertyValue {
        match &self.ws_name {
            Some(name) if store.exists(name) => PropertyValue::dataset(name.clone()),
            _ => self
                .run_number
                .map(|run| PropertyValue::Int(run.into()))
                .unwrap_or_default(),
        }
    }

    /// Run number of the bound dataset, or the assigned one before loading.
    pub fn run_number(&self, store: &dyn DatasetStore) -> Option<u32> {
        match &self.ws_name {
            Some(name) if store.exists(name) => store
                .get(name)
                .ok()
                .and_then(|dataset| dataset.run_number)
                .or(self.run_number),
            _ => self.run_number,
        }
    }

    pub fn assign(
        &mut self,
        value: PropertyValue,
        ctx: &RunContext,
        services: &mut Services,
    ) -> Result<(), ReductionError> {
        let old_ws_name = self.ws_name.clone();

        let clear_add_list = match value {
            PropertyValue::None => {
                self.run_number = None;
                self.ws_name = None;
                self.ws_cname.clear();
                self.ws_suffix.clear();
                self.run_file_path = None;
                self.run_ext = None;
                self.clear_old_ws(old_ws_name, None, services, true)?;
                return Ok(());
            }
            PropertyValue::List(items) if items.is_empty() => {
                return self.assign(PropertyValue::None, ctx, services);
            }
            PropertyValue::Dataset { dataset } => {
                return self.adopt_dataset(&dataset, old_ws_name, ctx, services);
            }
            PropertyValue::Str(text) => {
                if services.store.exists(text.trim()) {
                    return self.adopt_dataset(text.trim(), old_ws_name, ctx, services);
                }
                match text.parse::<RunFileSpec>()? {
                    RunFileSpec::Multiple(files) => self.assign_run_files(&files, ctx)?,
                    RunFileSpec::Single(file) => {
                        self.set_from_file(&file);
                        true
                    }
                }
            }
            PropertyValue::List(items) => {
                let mut files = Vec::new();
                for item in &items {
                    files.extend(run_files_of(item)?);
                }
                self.assign_run_files(&files, ctx)?
            }
            other => {
                let run = coerce_run_number(&other)?;
                self.run_number = Some(run);
                self.run_file_path = None;
                self.run_ext = None;
                true
            }
        };

        self.ws_cname.clear();
        self.ws_name = None;
        self.clear_old_ws(old_ws_name, None, services, clear_add_list)
    }

    fn set_from_file(&mut self, file: &RunFile) {
        self.run_number = Some(file.run_number);
        self.run_file_path = file.path.clone();
        self.run_ext = file.ext.clone().filter(|ext| !ext.is_empty());
    }

    /// Returns whether the summation list should be dropped.
    fn assign_run_files(
        &mut self,
        files: &[RunFile],
        ctx: &RunContext,
    ) -> Result<bool, ReductionError> {
        let Some(first) = files.first() else {
            return Err(ReductionError::invalid_value("run", "[]"));
        };
        let count = match ctx.sum_runs {
            _ if files.len() == 1 => None,
            SumPolicy::Off => None,
            SumPolicy::All => Some(files.len()),
            SumPolicy::First(count) if count > files.len() => {
                return Err(ReductionError::invalid_value(
                    "sum_runs",
                    format!(
                        "requested to sum {count} runs but provided the list of only {} runs",
                        files.len()
                    ),
                ));
            }
            SumPolicy::First(count) => Some(count),
        };
        self.set_from_file(first);
        let Some(count) = count else {
            return Ok(true);
        };
        self.runs_to_add = Some(files[..count].iter().map(RunToAdd::from).collect());
        Ok(false)
    }

    fn adopt_dataset(
        &mut self,
        name: &str,
        old_ws_name: Option<String>,
        ctx: &RunContext,
        services: &mut Services,
    ) -> Result<(), ReductionError> {
        let dataset = services.store.get(name)?;
        self.run_number = dataset.run_number;
        self.runs_to_add = dataset.summed_runs().and_then(|runs| {
            let list = runs
                .split(',')
                .filter_map(|run| run.trim().parse::<u32>().ok())
                .map(|run_number| RunToAdd {
                    file_path: None,
                    run_number,
                    ext: None,
                })
                .collect::<Vec<_>>();
            (list.len() > 1).then_some(list)
        });
        self.run_file_path = None;
        self.run_ext = None;
        self.split_ws_name(name, ctx);
        let new_name = self.synchronize(ctx, services, Some(name))?;
        self.clear_old_ws(old_ws_name, Some(&new_name), services, false)
    }

    /// Deletes the dataset (and its monitors) previously bound to this run
    /// when the binding moves to a different name.
    fn clear_old_ws(
        &mut self,
        old_ws_name: Option<String>,
        new_name: Option<&str>,
        services: &mut Services,
        clear_runs_to_add: bool,
    ) -> Result<(), ReductionError> {
        if clear_runs_to_add {
            self.runs_to_add = None;
        }
        let Some(old_ws_name) = old_ws_name else {
            return Ok(());
        };
        if new_name == Some(old_ws_name.as_str()) {
            return Ok(());
        }
        if services.store.exists(&old_ws_name) {
            debug!(dataset = %old_ws_name, "deleting dataset of previous run");
            services.store.delete(&old_ws_name)?;
        }
        let old_mon_ws = monitors_name(&old_ws_name);
        if services.store.exists(&old_mon_ws) {
            services.store.delete(&old_mon_ws)?;
        }
        Ok(())
    }

    fn sum_ext(&self) -> String {
        match &self.runs_to_add {
            Some(runs) => format!("SumOf{}", runs.len()),
            None => String::new(),
        }
    }

    /// Name the dataset of this run has to carry in the store.
    pub fn build_ws_name(&self, ctx: &RunContext) -> String {
        let sum_ext = self.sum_ext();
        match self.run_number {
            Some(run) => format!(
                "{}{}{}{:06}{}{}",
                self.prop_name, ctx.short_inst_name, self.ws_cname, run, sum_ext, self.ws_suffix
            ),
            None => format!(
                "{}{}{}{}",
                self.prop_name, self.ws_cname, sum_ext, self.ws_suffix
            ),
        }
    }

    /// Recovers the classification fragment from an existing dataset name so
    /// that `build_ws_name` reproduces it when it follows the naming scheme.
    fn split_ws_name(&mut self, ws_name: &str, ctx: &RunContext) {
        let mut name = ws_name;
        if !self.ws_suffix.is_empty() {
            name = name.strip_suffix(self.ws_suffix.as_str()).unwrap_or(name);
        }
        let sum_ext = self.sum_ext();
        if !sum_ext.is_empty() {
            name = name.strip_suffix(sum_ext.as_str()).unwrap_or(name);
        }
        let name = name.replacen(&self.prop_name, "", 1);
        if self.run_number.is_some() {
            let name = name.replacen(&ctx.short_inst_name, "", 1);
            self.ws_cname = name.chars().filter(|ch| !ch.is_ascii_digit()).collect();
        } else {
            self.ws_cname = name;
        }
    }

    /// Sets the action part of the name (e.g. `SPE` after conversion to
    /// energy) and returns the name the dataset will get on the next
    /// [`RunDescriptor::synchronize`].
    pub fn set_action_suffix(&mut self, suffix: Option<&str>, ctx: &RunContext) -> String {
        self.ws_suffix = suffix.unwrap_or_default().to_string();
        self.build_ws_name(ctx)
    }

    /// Renames `current` (or the bound dataset) and its monitors to the name
    /// derived from the present run number and suffix. A dataset already
    /// holding the target name is deleted first. Afterwards the run is bound
    /// to the derived name.
    pub fn synchronize(
        &mut self,
        ctx: &RunContext,
        services: &mut Services,
        current: Option<&str>,
    ) -> Result<String, ReductionError> {
        let old_name = match current {
            Some(name) => name.to_string(),
            None => self.ws_name.clone().ok_or_else(|| {
                ReductionError::DatasetNotFound(format!(
                    "run {} is not bound to a dataset",
                    self.prop_name
                ))
            })?,
        };
        let new_name = self.build_ws_name(ctx);
        if new_name != old_name {
            if !services.store.exists(&old_name) {
                return Err(ReductionError::DatasetNotFound(old_name));
            }
            if services.store.exists(&new_name) {
                services.store.delete(&new_name)?;
            }
            services.store.rename(&old_name, &new_name)?;

            let old_mon_name = monitors_name(&old_name);
            let new_mon_name = monitors_name(&new_name);
            if services.store.exists(&new_mon_name) {
                services.store.delete(&new_mon_name)?;
            }
            if services.store.exists(&old_mon_name) {
                services.store.rename(&old_mon_name, &new_mon_name)?;
            }
        }
        self.ws_name = Some(new_name.clone());
        Ok(new_name)
    }

    /// Bound name when the dataset exists; otherwise the derived name, which
    /// becomes the binding.
    fn target_ws_name(&mut self, ctx: &RunContext, store: &dyn DatasetStore) -> String {
        match &self.ws_name {
            Some(name) if store.exists(name) => name.clone(),
            _ => {
                let name = self.build_ws_name(ctx);
                self.ws_name = Some(name.clone());
                name
            }
        }
    }

    /// Dataset name of this run. Fails when the run is bound to a dataset
    /// that has since disappeared from the store.
    pub fn ws_name(
        &mut self,
        ctx: &RunContext,
        store: &dyn DatasetStore,
    ) -> Result<String, ReductionError> {
        if let Some(name) = &self.ws_name {
            if store.exists(name) {
                return Ok(name.clone());
            }
            return Err(ReductionError::DatasetNotFound(format!(
                "{name}: run get_workspace first"
            )));
        }
        let name = self.build_ws_name(ctx);
        self.ws_name = Some(name.clone());
        Ok(name)
    }

    pub fn file_ext(&self, ctx: &RunContext) -> String {
        self.run_ext
            .clone()
            .unwrap_or_else(|| ctx.default_ext.clone())
    }

    pub fn set_file_ext(&mut self, ext: &str) -> Result<(), ReductionError> {
        if ext.trim().is_empty() {
            return Err(ReductionError::invalid_value("file extension", ext));
        }
        self.run_ext = Some(dotted(ext.trim()));
        Ok(())
    }

    fn file_hint(
        &self,
        ctx: &RunContext,
        run_num: &str,
        file_path: Option<&str>,
        file_ext: Option<&str>,
        explicit_hint: Option<&str>,
    ) -> (String, String) {
        let (hint, ext) = match explicit_hint {
            Some(hint) => {
                let ext = Utf8Path::new(hint)
                    .extension()
                    .map(dotted)
                    .unwrap_or_else(|| self.file_ext(ctx));
                (hint.to_string(), ext)
            }
            None => {
                let ext = file_ext
                    .filter(|ext| !ext.is_empty())
                    .map(dotted)
                    .unwrap_or_else(|| self.file_ext(ctx));
                let file_name = format!("{}{}{}", ctx.short_inst_name, run_num, ext);
                let hint = match file_path.or(self.run_file_path.as_deref()) {
                    Some(dir) if Utf8Path::new(dir).as_std_path().is_dir() => {
                        Utf8Path::new(dir).join(&file_name).to_string()
                    }
                    _ => file_name,
                };
                (hint, ext)
            }
        };
        if Utf8Path::new(&hint).as_std_path().exists() {
            return (hint, ext);
        }
        let bare = Utf8Path::new(&hint)
            .file_name()
            .map(str::to_string)
            .unwrap_or(hint);
        (bare, ext)
    }

    /// Looks up the data file of this (or the given) run and remembers where
    /// it was found.
    pub fn find_file(
        &mut self,
        ctx: &RunContext,
        services: &Services,
        run_number: Option<u32>,
        file_path: Option<&str>,
        file_ext: Option<&str>,
        file_hint: Option<&str>,
    ) -> Result<Utf8PathBuf, ReductionError> {
        let run_num = run_number
            .or_else(|| self.run_number(services.store.as_ref()))
            .map(|run| run.to_string())
            .unwrap_or_default();
        let (hint, old_ext) = self.file_hint(ctx, &run_num, file_path, file_ext, file_hint);

        let found = services
            .finder
            .find_runs(&hint)
            .ok()
            .and_then(|files| files.into_iter().next());
        let Some(file) = found else {
            let message = format!(
                "Cannot find file matching hint {hint} on current search paths for instrument {}",
                ctx.short_inst_name
            );
            warn!("{message}");
            return Err(ReductionError::FileNotFound(message));
        };

        let found_ext = file.extension().map(dotted).unwrap_or_default();
        if !found_ext.eq_ignore_ascii_case(&old_ext) {
            info!("Cannot find run-file with extension {old_ext}. Found file {file} instead");
        }
        self.run_ext = Some(found_ext);
        self.run_file_path = file
            .parent()
            .filter(|dir| !dir.as_str().is_empty())
            .map(|dir| dir.to_string());
        Ok(file)
    }

    /// Loads the run into the store, reusing an existing dataset unless
    /// `force` is set, and calibrates it.
    pub fn load_run(
        &mut self,
        ctx: &RunContext,
        services: &mut Services,
        request: LoadRequest,
    ) -> Result<String, ReductionError> {
        let ws_name = match request.ws_name.clone() {
            Some(name) => name,
            None => self.target_ws_name(ctx, services.store.as_ref()),
        };

        if services.store.exists(&ws_name) && !request.force {
            info!("{ws_name} already loaded as workspace.");
        } else {
            let data_file = self.find_file(
                ctx,
                services,
                None,
                request.file_path.as_deref(),
                request.file_ext.as_deref(),
                request.file_hint.as_deref(),
            )?;
            let monitors = MonitorLoading::from_policy(request.load_monitors_with_workspace);
            services
                .algorithms
                .load(services.store.as_mut(), &data_file, &ws_name, monitors)?;
            info!("Loaded {data_file}");
        }

        apply_calibration(
            services,
            &ws_name,
            request.calibration,
            request.use_ws_calibration,
        )?;
        Ok(ws_name)
    }

    /// Resolves the run to a dataset, loading (and summing) it when needed.
    /// Returns `None` when no run number is known.
    pub fn get_workspace(
        &mut self,
        ctx: &RunContext,
        services: &mut Services,
    ) -> Result<Option<String>, ReductionError> {
        let ws_name = match &self.ws_name {
            Some(name) if services.store.exists(name) => name.clone(),
            _ => self.build_ws_name(ctx),
        };

        if services.store.exists(&ws_name) {
            self.ws_name = Some(ws_name.clone());
            if !services.store.get(&ws_name)?.is_calibrated() {
                apply_calibration(
                    services,
                    &ws_name,
                    ctx.calibration.clone(),
                    ctx.prefer_ws_calibration,
                )?;
            }
            return Ok(Some(ws_name));
        }

        if self.run_number.is_none() {
            return Ok(None);
        }
        self.ws_name = Some(ws_name);

        match self.runs_to_add.clone() {
            None => {
                let name = self.load_run(ctx, services, LoadRequest::from_context(ctx))?;
                Ok(Some(name))
            }
            Some(runs) => self.accumulate(ctx, services, &runs).map(Some),
        }
    }

    fn accumulate(
        &mut self,
        ctx: &RunContext,
        services: &mut Services,
        runs: &[RunToAdd],
    ) -> Result<String, ReductionError> {
        let mon_with_ws = ctx.load_monitors_with_workspace;
        let inst_name = ctx.short_inst_name.clone();
        let [first, rest @ ..] = runs else {
            return Err(ReductionError::invalid_value("runs_to_add", "[]"));
        };

        info!("*** Summing multiple runs            ****");
        info!("*** Loading run N: {} ", first.run_number);
        let sum_ws_name = self.load_run(
            ctx,
            services,
            LoadRequest {
                load_monitors_with_workspace: mon_with_ws,
                file_path: first.file_path.clone(),
                file_ext: first.ext.clone(),
                ..LoadRequest::default()
            },
        )?;
        let sum_mon_name = monitors_name(&sum_ws_name);

        let mut added_runs = vec![first.run_number.to_string()];
        let num_terms = runs.len();
        for (index, run) in rest.iter().enumerate() {
            info!("*** Adding  run N: {} ", run.run_number);
            let term_name = format!("{inst_name}_ADDITIVE_#{}/{num_terms}", index + 2);
            let file_name = format!(
                "{inst_name}{}{}",
                run.run_number,
                run.ext.as_deref().unwrap_or_default()
            );
            let file_hint = match &run.file_path {
                Some(dir) => Utf8Path::new(dir).join(file_name).to_string(),
                None => file_name,
            };
            let term = self.load_run(
                ctx,
                services,
                LoadRequest {
                    load_monitors_with_workspace: mon_with_ws,
                    file_hint: Some(file_hint),
                    ws_name: Some(term_name),
                    ..LoadRequest::default()
                },
            )?;

            services.algorithms.plus(
                services.store.as_mut(),
                &sum_ws_name,
                &term,
                &sum_ws_name,
                true,
            )?;
            let term_mon = monitors_name(&term);
            if !mon_with_ws && services.store.exists(&term_mon) {
                if services.store.exists(&sum_mon_name) {
                    services.algorithms.plus(
                        services.store.as_mut(),
                        &sum_mon_name,
                        &term_mon,
                        &sum_mon_name,
                        true,
                    )?;
                } else {
                    services.store.delete(&term_mon)?;
                }
            }
            added_runs.push(run.run_number.to_string());
        }
        info!("*** Summing multiple runs  completed ****");

        let ws_name = self.synchronize(ctx, services, Some(&sum_ws_name))?;
        apply_calibration(
            services,
            &ws_name,
            ctx.calibration.clone(),
            ctx.prefer_ws_calibration,
        )?;
        services.algorithms.add_sample_log(
            services.store.as_mut(),
            &ws_name,
            SUM_OF_RUNS_LOG,
            &added_runs.join(","),
        )?;
        Ok(ws_name)
    }

    /// Unbound copy of the run's dataset (and its separate monitors).
    pub fn clone_workspace(
        &mut self,
        ctx: &RunContext,
        services: &mut Services,
        clone_name: &str,
    ) -> Result<Option<String>, ReductionError> {
        let Some(ws_name) = self.get_workspace(ctx, services)? else {
            return Ok(None);
        };
        services
            .algorithms
            .clone_workspace(services.store.as_mut(), &ws_name, clone_name)?;
        let mon_ws_name = monitors_name(&ws_name);
        if services.store.exists(&mon_ws_name) {
            services.algorithms.clone_workspace(
                services.store.as_mut(),
                &mon_ws_name,
                &monitors_name(clone_name),
            )?;
        }
        Ok(Some(clone_name.to_string()))
    }

    /// Dataset holding the monitors of this run. With separate monitors, the
    /// detector spectra listed in `ctx.spectra_to_monitors` are copied in
    /// first. Yields `None` when `monitor_id` is not among the monitors.
    pub fn monitors_workspace(
        &mut self,
        ctx: &RunContext,
        services: &mut Services,
        monitor_id: Option<u32>,
    ) -> Result<Option<String>, ReductionError> {
        let Some(data_ws) = self.get_workspace(ctx, services)? else {
            return Ok(None);
        };
        let separate_name = monitors_name(&data_ws);
        let (mon_ws, separate) = if services.store.exists(&separate_name) {
            (separate_name, true)
        } else {
            (data_ws.clone(), false)
        };

        if separate {
            for spectrum in &ctx.spectra_to_monitors {
                copy_spectrum_to_monitors(services, &data_ws, &mon_ws, *spectrum)?;
            }
        }

        if let Some(monitor_id) = monitor_id {
            if services
                .store
                .get(&mon_ws)?
                .index_of_spectrum(monitor_id)
                .is_none()
            {
                return Ok(None);
            }
        }
        Ok(Some(mon_ws))
    }

    pub fn is_monws_separate(
        &mut self,
        ctx: &RunContext,
        services: &mut Services,
    ) -> Result<bool, ReductionError> {
        Ok(self
            .monitors_workspace(ctx, services, None)?
            .is_some_and(|name| name.ends_with(MONITORS_SUFFIX)))
    }
}

/// Run property whose value defaults to another ("host") run until it is
/// given one of its own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunDescriptorDependent {
    host: String,
    run: RunDescriptor,
    defined: bool,
}

impl RunDescriptorDependent {
    pub fn new(host: &str, prop_name: &str) -> Self {
        Self {
            host: host.to_string(),
            run: RunDescriptor::new(prop_name),
            defined: false,
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn is_defined(&self) -> bool {
        self.defined
    }

    pub fn run(&self) -> &RunDescriptor {
        &self.run
    }

    pub fn run_mut(&mut self) -> &mut RunDescriptor {
        &mut self.run
    }

    /// `None` returns the property to following its host; the own state is
    /// kept but no longer consulted.
    pub fn assign(
        &mut self,
        value: PropertyValue,
        ctx: &RunContext,
        services: &mut Services,
    ) -> Result<(), ReductionError> {
        if value.is_none() {
            self.defined = false;
            return Ok(());
        }
        self.run.assign(value, ctx, services)?;
        self.defined = true;
        Ok(())
    }
}

/// Calibrates `ws_name` unless it already carries the calibrated log.
///
/// With `use_ws_calibration` the `det_cal_file` recorded in the dataset's own
/// instrument parameters takes precedence over `calibration`.
pub fn apply_calibration(
    services: &mut Services,
    ws_name: &str,
    calibration: Option<Calibration>,
    use_ws_calibration: bool,
) -> Result<(), ReductionError> {
    if calibration.is_none() && !use_ws_calibration {
        return Ok(());
    }
    let dataset = services.store.get(ws_name).map_err(|_| {
        ReductionError::TypeMismatch(format!(
            "calibration can be applied to a dataset only and got {ws_name}"
        ))
    })?;
    if dataset.is_calibrated() {
        return Ok(());
    }

    let mut source = calibration;
    if use_ws_calibration {
        let embedded = dataset
            .instrument_parameters
            .get("det_cal_file")
            .map(|file| file.trim().to_string())
            .filter(|file| !file.is_empty() && !file.eq_ignore_ascii_case("none"));
        if let Some(embedded) = embedded {
            match services.finder.find_file(&embedded) {
                Ok(path) => {
                    info!(
                        "*** load_data: Calibrating data using workspace defined calibration file: {path}"
                    );
                    source = Some(Calibration::File(path.to_string()));
                }
                Err(_) if source.is_some() => {
                    warn!(
                        "calibration file {embedded} defined in run {ws_name} not found; using det_cal_file"
                    );
                }
                Err(_) => {
                    return Err(ReductionError::CalibrationSource(format!(
                        "Can not find defined in run {ws_name} calibration file {embedded}. Define det_cal_file reduction parameter properly"
                    )));
                }
            }
        }
    }

    match source {
        None => Ok(()),
        Some(Calibration::File(file)) => {
            let path = services.finder.find_file(&file).map_err(|_| {
                ReductionError::CalibrationSource(format!(
                    "Can not find calibration file {file} given by det_cal_file for dataset {ws_name}"
                ))
            })?;
            debug!("load_data: Moving detectors to positions specified in cal file {path}");
            services
                .algorithms
                .load_detector_info(services.store.as_mut(), ws_name, &path)?;
            services.algorithms.add_sample_log(
                services.store.as_mut(),
                ws_name,
                CALIBRATED_LOG,
                path.as_str(),
            )
        }
        Some(Calibration::Dataset(source_ws)) => {
            if !services.store.exists(&source_ws) {
                return Err(ReductionError::CalibrationSource(format!(
                    "calibration dataset {source_ws} given by det_cal_file for dataset {ws_name} does not exist"
                )));
            }
            debug!("load_data: Copying detectors positions from workspace {source_ws}");
            services.algorithms.copy_instrument_parameters(
                services.store.as_mut(),
                &source_ws,
                ws_name,
            )?;
            services.algorithms.add_sample_log(
                services.store.as_mut(),
                ws_name,
                CALIBRATED_LOG,
                &source_ws,
            )
        }
    }
}

/// Copies detector spectrum `spectrum` of `data_ws` into the monitor dataset,
/// rebinned to the monitor binning. No-op when it is already there.
fn copy_spectrum_to_monitors(
    services: &mut Services,
    data_ws: &str,
    mon_ws: &str,
    spectrum: u32,
) -> Result<(), ReductionError> {
    let monitors = services.store.get(mon_ws)?;
    if monitors.index_of_spectrum(spectrum).is_some() {
        return Ok(());
    }
    let Some(x) = monitors
        .spectra
        .first()
        .map(|first| first.x.as_slice())
        .filter(|x| x.len() >= 2)
    else {
        return Err(ReductionError::TypeMismatch(format!(
            "monitor dataset {mon_ws} has no binning to copy spectrum {spectrum} into"
        )));
    };
    let bins = [x[0], x[1] - x[0], x[x.len() - 1]];
    let ws_index = services
        .store
        .get(data_ws)?
        .index_of_spectrum(spectrum)
        .ok_or_else(|| ReductionError::invalid_value("spectra_to_monitors_list", spectrum))?;

    let store = services.store.as_mut();
    services
        .algorithms
        .extract_single_spectrum(store, data_ws, TMP_MONITOR, ws_index)?;
    services
        .algorithms
        .rebin(services.store.as_mut(), TMP_MONITOR, TMP_MONITOR, bins)?;
    services
        .algorithms
        .conjoin(services.store.as_mut(), mon_ws, TMP_MONITOR)?;
    if services.store.exists(TMP_MONITOR) {
        services.store.delete(TMP_MONITOR)?;
    }
    Ok(())
}

fn coerce_run_number(value: &PropertyValue) -> Result<u32, ReductionError> {
    value
        .as_int()
        .and_then(|run| u32::try_from(run).ok())
        .ok_or_else(|| ReductionError::invalid_value("run", value))
}

fn run_files_of(item: &PropertyValue) -> Result<Vec<RunFile>, ReductionError> {
    match item {
        PropertyValue::Str(text) => Ok(text.parse::<RunFileSpec>()?.files().to_vec()),
        other => Ok(vec![RunFile {
            path: None,
            run_number: coerce_run_number(other)?,
            ext: None,
        }]),
    }
}

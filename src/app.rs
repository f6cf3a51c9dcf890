use std::collections::BTreeSet;

use serde::Serialize;
use tracing::info;

use crate::config::InstrumentDefaults;
use crate::error::ReductionError;
use crate::logging::LogLevel;
use crate::manager::PropertyManager;
use crate::run::RunState;
use crate::services::Services;
use crate::store::SUM_OF_RUNS_LOG;
use crate::value::PropertyValue;

#[derive(Debug, Clone, Serialize)]
pub struct PropertiesResult {
    pub instrument: String,
    pub properties: Vec<PropertyEntry>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PropertyEntry {
    pub name: String,
    pub value: PropertyValue,
    pub changed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub doc: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CheckFilesResult {
    pub instrument: String,
    pub abs_units: bool,
    pub ok: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct MigrateResult {
    pub from: String,
    pub to: String,
    pub changed: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResolveResult {
    pub property: String,
    pub state: String,
    pub run_number: Option<u32>,
    pub workspace: Option<String>,
    pub summed_runs: Option<String>,
    pub calibrated: bool,
    pub spectra: usize,
}

/// Command-level operations over one reduction session.
pub struct App {
    manager: PropertyManager,
}

impl App {
    pub fn new(defaults: InstrumentDefaults, services: Services) -> Self {
        Self {
            manager: PropertyManager::new(defaults, services),
        }
    }

    pub fn manager(&self) -> &PropertyManager {
        &self.manager
    }

    pub fn manager_mut(&mut self) -> &mut PropertyManager {
        &mut self.manager
    }

    /// Applies `name=value` overrides given on the command line and logs
    /// what they changed.
    pub fn apply_overrides(
        &mut self,
        overrides: &[(String, PropertyValue)],
    ) -> Result<BTreeSet<String>, ReductionError> {
        let before = self.manager.changed_properties().clone();
        let changed = self.manager.set_many(overrides.iter().cloned(), false)?;
        if changed != before {
            self.manager
                .log_changed_values(LogLevel::Notice, false, &before);
        }
        Ok(changed)
    }

    pub fn show(&self) -> Result<PropertiesResult, ReductionError> {
        let changed = self.manager.changed_properties();
        let mut properties = Vec::new();
        for name in self.manager.names() {
            let value = self.manager.get(&name)?;
            let doc = self
                .manager
                .descriptors()
                .get(&name)
                .and_then(|descriptor| descriptor.doc())
                .map(str::to_string);
            properties.push(PropertyEntry {
                changed: changed.contains(&name),
                name,
                value,
                doc,
            });
        }
        Ok(PropertiesResult {
            instrument: self.manager.instrument().to_string(),
            properties,
        })
    }

    pub fn check_files(&self, abs_units: bool) -> Result<CheckFilesResult, ReductionError> {
        self.manager.check_necessary_files(abs_units)?;
        Ok(CheckFilesResult {
            instrument: self.manager.instrument().to_string(),
            abs_units,
            ok: true,
        })
    }

    pub fn migrate(
        &mut self,
        other: &InstrumentDefaults,
        ignore_changes: bool,
    ) -> Result<MigrateResult, ReductionError> {
        let changed = self.manager.migrate_defaults_from(other, ignore_changes)?;
        self.manager
            .log_changed_values(LogLevel::Notice, true, &BTreeSet::new());
        Ok(MigrateResult {
            from: other.instrument.clone(),
            to: self.manager.instrument().to_string(),
            changed: changed.into_iter().collect(),
        })
    }

    /// Resolves run property `property` to a dataset, optionally renaming it
    /// with an action suffix afterwards.
    pub fn resolve(
        &mut self,
        property: &str,
        suffix: Option<&str>,
    ) -> Result<ResolveResult, ReductionError> {
        let mut workspace = self.manager.get_workspace(property)?;
        if let (Some(suffix), Some(_)) = (suffix, workspace.as_ref()) {
            self.manager.set_action_suffix(property, Some(suffix))?;
            workspace = Some(self.manager.synchronize(property)?);
        }
        if let Some(name) = &workspace {
            info!("{property} resolved to {name}");
        }

        let state = match self.manager.run_state(property)? {
            RunState::Unset => "unset",
            RunState::Identified => "identified",
            RunState::Resolved => "resolved",
        };
        let dataset = match &workspace {
            Some(name) => Some(self.manager.store().get(name)?),
            None => None,
        };
        Ok(ResolveResult {
            property: property.to_string(),
            state: state.to_string(),
            run_number: self.manager.run_number(property)?,
            summed_runs: dataset
                .and_then(|dataset| dataset.logs.get(SUM_OF_RUNS_LOG))
                .cloned(),
            calibrated: dataset.is_some_and(|dataset| dataset.is_calibrated()),
            spectra: dataset.map(|dataset| dataset.spectra.len()).unwrap_or(0),
            workspace,
        })
    }
}

use std::collections::BTreeMap;

use camino::Utf8Path;

use crate::config::InstrumentDefaults;
use crate::error::ReductionError;
use crate::manager::PropertyManager;
use crate::value::PropertyValue;

/// Behaviour a property has beyond plain storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PropertyKind {
    Plain,
    /// File name; a name given without extension gets `default_ext`.
    File { default_ext: String },
    /// List view over several stored fields.
    Composite { fields: Vec<String> },
    Run { prefix: String },
    /// Run that follows `host` until given its own value.
    DependentRun { host: String, prefix: String },
}

/// Stateless description of a property. Per-session values live in the
/// `PropertyManager` the descriptor is applied to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyDescriptor {
    name: String,
    doc: Option<String>,
    kind: PropertyKind,
}

impl PropertyDescriptor {
    pub fn plain(name: &str) -> Self {
        Self::with_kind(name, PropertyKind::Plain)
    }

    pub fn file(name: &str, default_ext: &str) -> Self {
        Self::with_kind(
            name,
            PropertyKind::File {
                default_ext: default_ext.to_string(),
            },
        )
    }

    pub fn composite(name: &str, fields: Vec<String>) -> Self {
        Self::with_kind(name, PropertyKind::Composite { fields })
    }

    pub fn run(name: &str, prefix: &str) -> Self {
        Self::with_kind(
            name,
            PropertyKind::Run {
                prefix: prefix.to_string(),
            },
        )
    }

    pub fn dependent_run(name: &str, host: &str, prefix: &str) -> Self {
        Self::with_kind(
            name,
            PropertyKind::DependentRun {
                host: host.to_string(),
                prefix: prefix.to_string(),
            },
        )
    }

    fn with_kind(name: &str, kind: PropertyKind) -> Self {
        Self {
            name: name.to_string(),
            doc: None,
            kind,
        }
    }

    pub fn with_doc(mut self, doc: &str) -> Self {
        self.doc = Some(doc.to_string());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn doc(&self) -> Option<&str> {
        self.doc.as_deref()
    }

    pub fn kind(&self) -> &PropertyKind {
        &self.kind
    }

    pub fn is_run(&self) -> bool {
        matches!(
            self.kind,
            PropertyKind::Run { .. } | PropertyKind::DependentRun { .. }
        )
    }

    /// Properties this one is derived from.
    pub fn dependencies(&self) -> &[String] {
        match &self.kind {
            PropertyKind::Composite { fields } => fields,
            PropertyKind::DependentRun { host, .. } => std::slice::from_ref(host),
            _ => &[],
        }
    }

    pub fn get(&self, manager: &PropertyManager) -> Result<PropertyValue, ReductionError> {
        match &self.kind {
            PropertyKind::Plain | PropertyKind::File { .. } => manager.stored(&self.name),
            PropertyKind::Composite { fields } => {
                let mut values = Vec::with_capacity(fields.len());
                for field in fields {
                    values.push(manager.stored(field)?);
                }
                Ok(PropertyValue::List(values))
            }
            PropertyKind::Run { .. } | PropertyKind::DependentRun { .. } => {
                manager.run_value(&self.name)
            }
        }
    }

    pub fn set(
        &self,
        manager: &mut PropertyManager,
        value: PropertyValue,
    ) -> Result<(), ReductionError> {
        match &self.kind {
            PropertyKind::Plain => manager.store_value(&self.name, value),
            PropertyKind::File { default_ext } => {
                let value = match value {
                    PropertyValue::Str(file) if Utf8Path::new(&file).extension().is_none() => {
                        PropertyValue::Str(format!("{file}{default_ext}"))
                    }
                    other => other,
                };
                manager.store_value(&self.name, value)
            }
            PropertyKind::Composite { fields } => match value {
                PropertyValue::None => {
                    for field in fields {
                        manager.store_value(field, PropertyValue::None)?;
                    }
                    Ok(())
                }
                PropertyValue::List(items) if items.len() == fields.len() => {
                    for (field, item) in fields.iter().zip(items) {
                        manager.store_value(field, item)?;
                    }
                    Ok(())
                }
                other => Err(ReductionError::invalid_value(&self.name, other)),
            },
            PropertyKind::Run { .. } | PropertyKind::DependentRun { .. } => {
                manager.assign_run(&self.name, value)
            }
        }
    }
}

/// All descriptors of a manager, built once from the instrument defaults and
/// shared by clones of the manager.
#[derive(Debug, Clone, Default)]
pub struct DescriptorTable {
    descriptors: BTreeMap<String, PropertyDescriptor>,
}

impl DescriptorTable {
    pub fn build(defaults: &InstrumentDefaults) -> Self {
        let mut table = Self::default();
        for descriptor in standard_runs() {
            table.insert(descriptor);
        }
        for (name, ext) in &defaults.file_extensions {
            table.insert(PropertyDescriptor::file(name, ext));
        }
        for (name, fields) in &defaults.composites {
            table.insert(PropertyDescriptor::composite(name, fields.clone()));
        }
        table
    }

    pub fn insert(&mut self, descriptor: PropertyDescriptor) {
        self.descriptors
            .insert(descriptor.name.clone(), descriptor);
    }

    pub fn get(&self, name: &str) -> Option<&PropertyDescriptor> {
        self.descriptors.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.descriptors.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &PropertyDescriptor> {
        self.descriptors.values()
    }

    pub fn composites(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.descriptors
            .values()
            .filter_map(|descriptor| match &descriptor.kind {
                PropertyKind::Composite { fields } => Some((descriptor.name(), fields.as_slice())),
                _ => None,
            })
    }
}

fn standard_runs() -> Vec<PropertyDescriptor> {
    vec![
        PropertyDescriptor::run("sample_run", "SR_")
            .with_doc("Run number, file or dataset of the sample run"),
        PropertyDescriptor::run("wb_run", "WB_")
            .with_doc("White beam vanadium run used for detector calibration"),
        PropertyDescriptor::run("monovan_run", "MV_")
            .with_doc("Mono-vanadium run used for absolute units normalisation"),
        PropertyDescriptor::dependent_run("mask_run", "sample_run", "MSK_")
            .with_doc("Run used for diagnostics; the sample run unless set"),
        PropertyDescriptor::dependent_run("wb_for_monovan_run", "wb_run", "MV_WB_")
            .with_doc("White beam run for the mono-vanadium; the white beam run unless set"),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_declares_standard_runs_and_composites() {
        let defaults = InstrumentDefaults::new("MARI", "MAR")
            .with_composite("norm_mon_integration_range", &["norm-mon1-min", "norm-mon1-max"]);
        let table = DescriptorTable::build(&defaults);
        assert!(table.get("sample_run").unwrap().is_run());
        assert_eq!(
            table.get("mask_run").unwrap().dependencies(),
            &["sample_run".to_string()]
        );
        assert_eq!(
            table.get("norm_mon_integration_range").unwrap().dependencies(),
            &["norm-mon1-min".to_string(), "norm-mon1-max".to_string()]
        );
        assert_eq!(table.composites().count(), 1);
        assert!(matches!(
            table.get("hard_mask_file").unwrap().kind(),
            PropertyKind::File { default_ext } if default_ext == ".msk"
        ));
    }
}

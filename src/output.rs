use std::io::{self, Write};

use serde::Serialize;

use crate::app::{CheckFilesResult, MigrateResult, PropertiesResult, ResolveResult};

#[derive(Debug, Clone, Copy)]
pub enum OutputMode {
    Interactive,
    NonInteractive,
}

pub struct JsonOutput;

impl JsonOutput {
    pub fn print_properties(result: &PropertiesResult) -> io::Result<()> {
        Self::print_json(result)
    }

    pub fn print_check_files(result: &CheckFilesResult) -> io::Result<()> {
        Self::print_json(result)
    }

    pub fn print_migrate(result: &MigrateResult) -> io::Result<()> {
        Self::print_json(result)
    }

    pub fn print_resolve(result: &ResolveResult) -> io::Result<()> {
        Self::print_json(result)
    }

    fn print_json<T: Serialize>(value: &T) -> io::Result<()> {
        let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
        let mut stdout = io::stdout();
        stdout.write_all(json.as_bytes())?;
        stdout.write_all(b"\n")?;
        Ok(())
    }
}

/// Plain-text rendering for a terminal.
pub struct TextOutput;

impl TextOutput {
    pub fn print_properties(result: &PropertiesResult) -> io::Result<()> {
        let mut stdout = io::stdout().lock();
        writeln!(stdout, "Reduction properties of {}", result.instrument)?;
        for entry in &result.properties {
            let mark = if entry.changed { "*" } else { " " };
            writeln!(stdout, "{mark} {:<32} {}", entry.name, entry.value)?;
        }
        Ok(())
    }

    pub fn print_check_files(result: &CheckFilesResult) -> io::Result<()> {
        let scope = if result.abs_units {
            "including absolute units files"
        } else {
            "excluding absolute units files"
        };
        println!("All files needed by {} found ({scope})", result.instrument);
        Ok(())
    }

    pub fn print_migrate(result: &MigrateResult) -> io::Result<()> {
        let mut stdout = io::stdout().lock();
        writeln!(
            stdout,
            "Defaults of {} migrated into {}",
            result.from, result.to
        )?;
        for name in &result.changed {
            writeln!(stdout, "  changed: {name}")?;
        }
        Ok(())
    }

    pub fn print_resolve(result: &ResolveResult) -> io::Result<()> {
        let mut stdout = io::stdout().lock();
        writeln!(stdout, "{}: {}", result.property, result.state)?;
        if let Some(run) = result.run_number {
            writeln!(stdout, "  run number: {run}")?;
        }
        if let Some(workspace) = &result.workspace {
            writeln!(stdout, "  dataset:    {workspace} ({} spectra)", result.spectra)?;
        }
        if let Some(runs) = &result.summed_runs {
            writeln!(stdout, "  summed:     {runs}")?;
        }
        if result.calibrated {
            writeln!(stdout, "  calibrated")?;
        }
        Ok(())
    }
}

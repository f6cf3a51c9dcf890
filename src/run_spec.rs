use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;

use crate::error::ReductionError;

/// Most runs a single specification may name, ranges included.
pub const MAX_RUNS: usize = u16::MAX as usize;

static RUN_TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(?P<dir>.*[/\\])?(?P<inst>[A-Za-z_]*)(?P<run>\d+)(?:[-:][A-Za-z_]*(?P<end>\d+))?(?P<ext>\.[A-Za-z0-9]+)?$",
    )
    .expect("run token pattern is valid")
});

/// One run file named by a run specification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunFile {
    /// Directory the file was given in, if any (with trailing separator removed).
    pub path: Option<String>,
    pub run_number: u32,
    /// Lower-cased extension including the leading dot.
    pub ext: Option<String>,
}

impl fmt::Display for RunFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(path) = &self.path {
            write!(f, "{path}/")?;
        }
        write!(f, "{}", self.run_number)?;
        if let Some(ext) = &self.ext {
            write!(f, "{ext}")?;
        }
        Ok(())
    }
}

/// Parsed form of a run given as text: `11001`, `MAR11001.raw`,
/// `/data/MAR11001.nxs`, `11001,11002` or `11001-11003`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunFileSpec {
    Single(RunFile),
    Multiple(Vec<RunFile>),
}

impl RunFileSpec {
    pub fn files(&self) -> &[RunFile] {
        match self {
            RunFileSpec::Single(file) => std::slice::from_ref(file),
            RunFileSpec::Multiple(files) => files,
        }
    }

    pub fn run_numbers(&self) -> Vec<u32> {
        self.files().iter().map(|file| file.run_number).collect()
    }
}

impl FromStr for RunFileSpec {
    type Err = ReductionError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let mut files = Vec::new();
        for token in value.split(',').map(str::trim).filter(|token| !token.is_empty()) {
            parse_token(token, &mut files)
                .ok_or_else(|| ReductionError::invalid_value("run", value))?;
        }
        match files.len() {
            0 => Err(ReductionError::invalid_value("run", value)),
            1 => Ok(RunFileSpec::Single(files.remove(0))),
            _ => Ok(RunFileSpec::Multiple(files)),
        }
    }
}

fn parse_token(token: &str, files: &mut Vec<RunFile>) -> Option<()> {
    let captures = RUN_TOKEN.captures(token)?;
    let path = captures
        .name("dir")
        .map(|dir| dir.as_str().trim_end_matches(['/', '\\']).to_string())
        .filter(|dir| !dir.is_empty());
    let ext = captures
        .name("ext")
        .map(|ext| ext.as_str().to_lowercase());
    let start: u32 = captures.name("run")?.as_str().parse().ok()?;
    let end: u32 = match captures.name("end") {
        Some(end) => end.as_str().parse().ok()?,
        None => start,
    };
    if end < start {
        return None;
    }
    let count = usize::try_from(end - start).ok()?.checked_add(1)?;
    if files.len().checked_add(count)? > MAX_RUNS {
        return None;
    }
    for run_number in start..=end {
        files.push(RunFile {
            path: path.clone(),
            run_number,
            ext: ext.clone(),
        });
    }
    Some(())
}

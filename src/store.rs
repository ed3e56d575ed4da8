//! Stored fio job files.
//!
//! A job file is an INI document: a `[global]` section followed by one or more
//! job sections of `key=value` options. Stored jobs live in one directory, one
//! `<name>.fio` file per job.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::HarnessError;

pub const JOB_FILE_SUFFIX: &str = ".fio";
pub const GLOBAL_SECTION: &str = "global";

/// Option name → value handed to fio for one job.
pub type ParamSet = BTreeMap<String, String>;

/// Parse a JSON object of fio options. Numbers and booleans are stringified.
pub fn params_from_json(json: &str) -> Result<ParamSet, HarnessError> {
    let value: serde_json::Value = serde_json::from_str(json)
        .map_err(|e| HarnessError::InvalidParams(format!("not valid JSON: {e}")))?;
    let object = value
        .as_object()
        .ok_or_else(|| HarnessError::InvalidParams("expected a JSON object".to_string()))?;

    let mut params = ParamSet::new();
    for (key, value) in object {
        let text = match value {
            serde_json::Value::String(s) => s.clone(),
            serde_json::Value::Number(n) => n.to_string(),
            serde_json::Value::Bool(b) => (if *b { "1" } else { "0" }).to_string(),
            other => {
                return Err(HarnessError::InvalidParams(format!(
                    "option '{key}' has unsupported value {other}"
                )))
            }
        };
        params.insert(key.clone(), text);
    }
    Ok(params)
}

// ─── Job file ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
struct Section {
    name: String,
    /// `None` marks a bare flag such as `time_based`.
    options: Vec<(String, Option<String>)>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobFile {
    sections: Vec<Section>,
}

impl Default for JobFile {
    fn default() -> Self {
        Self::new()
    }
}

impl JobFile {
    /// An empty job file holding only the `[global]` section.
    pub fn new() -> Self {
        JobFile {
            sections: vec![Section {
                name: GLOBAL_SECTION.to_string(),
                options: Vec::new(),
            }],
        }
    }

    /// Job file with an empty `[global]` section and one job.
    pub fn single_job(job_name: &str, params: &ParamSet) -> Self {
        let mut file = Self::new();
        file.add_job(job_name, params);
        file
    }

    pub fn add_job(&mut self, job_name: &str, params: &ParamSet) {
        for (key, value) in params {
            self.set(job_name, key, value);
        }
        if self.section(job_name).is_none() {
            self.sections.push(Section {
                name: job_name.to_string(),
                options: Vec::new(),
            });
        }
    }

    pub fn parse(text: &str) -> Result<Self, String> {
        let mut sections: Vec<Section> = Vec::new();

        for (idx, raw_line) in text.lines().enumerate() {
            let line = raw_line.trim();
            if line.is_empty() || line.starts_with(';') || line.starts_with('#') {
                continue;
            }

            if let Some(rest) = line.strip_prefix('[') {
                let name = rest
                    .strip_suffix(']')
                    .ok_or_else(|| format!("line {}: unterminated section header", idx + 1))?
                    .trim();
                if name.is_empty() {
                    return Err(format!("line {}: empty section name", idx + 1));
                }
                sections.push(Section {
                    name: name.to_string(),
                    options: Vec::new(),
                });
                continue;
            }

            let section = sections
                .last_mut()
                .ok_or_else(|| format!("line {}: option outside of any section", idx + 1))?;
            let option = match line.split_once('=') {
                Some((key, value)) => (key.trim().to_string(), Some(value.trim().to_string())),
                None => (line.to_string(), None),
            };
            section.options.push(option);
        }

        Ok(JobFile { sections })
    }

    /// Serialized form written to disk and handed to fio.
    pub fn to_ini(&self) -> String {
        let mut out = String::new();
        for section in &self.sections {
            out.push('[');
            out.push_str(&section.name);
            out.push_str("]\n");
            for (key, value) in &section.options {
                out.push_str(key);
                if let Some(value) = value {
                    out.push('=');
                    out.push_str(value);
                }
                out.push('\n');
            }
            out.push('\n');
        }
        out
    }

    pub fn has_section(&self, name: &str) -> bool {
        self.section(name).is_some()
    }

    pub fn get(&self, section: &str, key: &str) -> Option<&str> {
        self.section(section)?
            .options
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_deref().unwrap_or(""))
    }

    /// Set an option, creating the section when needed.
    pub fn set(&mut self, section: &str, key: &str, value: &str) {
        let idx = match self.sections.iter().position(|s| s.name == section) {
            Some(idx) => idx,
            None => {
                self.sections.push(Section {
                    name: section.to_string(),
                    options: Vec::new(),
                });
                self.sections.len() - 1
            }
        };
        let options = &mut self.sections[idx].options;
        match options.iter_mut().find(|(k, _)| k == key) {
            Some((_, existing)) => *existing = Some(value.to_string()),
            None => options.push((key.to_string(), Some(value.to_string()))),
        }
    }

    fn section(&self, name: &str) -> Option<&Section> {
        self.sections.iter().find(|s| s.name == name)
    }
}

impl fmt::Display for JobFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for section in &self.sections {
            writeln!(f, "[{}]", section.name)?;
            for (key, value) in &section.options {
                match value {
                    Some(value) => writeln!(f, "    {key}={value}")?,
                    None => writeln!(f, "    {key}")?,
                }
            }
        }
        Ok(())
    }
}

// ─── Store ────────────────────────────────────────────────────────────────────

pub struct ConfigStore {
    dir: PathBuf,
}

impl ConfigStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        ConfigStore { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{name}{JOB_FILE_SUFFIX}"))
    }

    /// Names of all stored jobs, sorted.
    pub fn list(&self) -> Result<Vec<String>, HarnessError> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }
        let mut names = Vec::new();
        for entry in std::fs::read_dir(&self.dir)? {
            let entry = entry?;
            let file_name = entry.file_name();
            let Some(file_name) = file_name.to_str() else {
                continue;
            };
            if let Some(name) = file_name.strip_suffix(JOB_FILE_SUFFIX) {
                if entry.file_type()?.is_file() && !name.is_empty() {
                    names.push(name.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }

    pub fn get(&self, name: &str) -> Result<JobFile, HarnessError> {
        let path = self.path_for(name);
        let text = match std::fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(HarnessError::ConfigNotFound {
                    name: name.to_string(),
                    dir: self.dir.clone(),
                })
            }
            Err(e) => return Err(e.into()),
        };
        JobFile::parse(&text).map_err(|reason| {
            HarnessError::InvalidParams(format!("{}: {reason}", path.display()))
        })
    }

    /// Store a job, replacing any existing job of the same name.
    pub fn add(&self, name: &str, params: &ParamSet) -> Result<JobFile, HarnessError> {
        validate_name(name)?;
        std::fs::create_dir_all(&self.dir)?;
        let job = JobFile::single_job(name, params);
        std::fs::write(self.path_for(name), job.to_ini())?;
        tracing::debug!(job = name, dir = %self.dir.display(), "stored fio job");
        Ok(job)
    }

    /// Remove a stored job. Missing jobs are not an error.
    pub fn delete(&self, name: &str) -> Result<(), HarnessError> {
        match std::fs::remove_file(self.path_for(name)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Load a stored job and point its `global.filename` at `device`.
    pub fn prepare(&self, name: &str, device: &str) -> Result<JobFile, HarnessError> {
        let mut job = self.get(name)?;
        if job.has_section(GLOBAL_SECTION) {
            if let Some(previous) = job.get(GLOBAL_SECTION, "filename") {
                tracing::debug!(job = name, previous, device, "replacing stored filename");
            }
            job.set(GLOBAL_SECTION, "filename", device);
        } else {
            tracing::warn!(
                job = name,
                device,
                "job has no [global] section, cannot point it at the requested device"
            );
        }
        Ok(job)
    }
}

fn validate_name(name: &str) -> Result<(), HarnessError> {
    if name.is_empty() || name.contains(['/', '\\']) || name == "." || name == ".." {
        return Err(HarnessError::InvalidParams(format!(
            "invalid job name '{name}'"
        )));
    }
    Ok(())
}

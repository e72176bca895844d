use crate::constants::placeholders;
use crate::errors::ModelError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Eq, PartialEq, Hash, Serialize, Deserialize, Ord, PartialOrd)]
pub struct JobName(pub String);

impl fmt::Display for JobName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl JobName {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for JobName {
    fn from(s: String) -> Self {
        JobName(s)
    }
}

impl From<&str> for JobName {
    fn from(s: &str) -> Self {
        JobName(s.to_string())
    }
}

impl FromStr for JobName {
    type Err = std::convert::Infallible;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(JobName(s.to_string()))
    }
}

/// A single job as declared by the user. Immutable once the pipeline is
/// initialized; structural equality against the previous incarnation
/// decides whether a finished job must be re-run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobDeclaration {
    pub command: String,
    #[serde(default)]
    pub files_in: Vec<String>,
    #[serde(default)]
    pub files_out: Vec<String>,
    #[serde(default)]
    pub opts: serde_json::Value,
}

/// The empty string and the omitted-file token never participate in
/// dependency analysis or pre-flight checks.
pub fn is_placeholder(file: &str) -> bool {
    let trimmed = file.trim();
    trimmed.is_empty() || trimmed == placeholders::OMITTED
}

impl JobDeclaration {
    pub fn new(command: impl Into<String>) -> Self {
        JobDeclaration {
            command: command.into(),
            files_in: Vec::new(),
            files_out: Vec::new(),
            opts: serde_json::Value::Null,
        }
    }

    /// Declared inputs, trimmed, with placeholders dropped.
    pub fn inputs(&self) -> impl Iterator<Item = &str> {
        self.files_in
            .iter()
            .map(|f| f.trim())
            .filter(|f| !is_placeholder(f))
    }

    /// Declared outputs, trimmed, with placeholders dropped.
    pub fn outputs(&self) -> impl Iterator<Item = &str> {
        self.files_out
            .iter()
            .map(|f| f.trim())
            .filter(|f| !is_placeholder(f))
    }
}

/// One named job as it appears in the pipeline file and in the per-job
/// payload written to the log directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRecord {
    pub name: JobName,
    #[serde(flatten)]
    pub declaration: JobDeclaration,
}

/// A collection of named jobs. Insertion order is the canonical job
/// ordering and serves as the index space for the scheduler masks.
#[derive(Debug, Clone, Default)]
pub struct Pipeline {
    names: Vec<JobName>,
    jobs: HashMap<JobName, JobDeclaration>,
}

impl Pipeline {
    pub fn new() -> Self {
        Pipeline::default()
    }

    pub fn insert(
        &mut self,
        name: impl Into<JobName>,
        declaration: JobDeclaration,
    ) -> Result<(), ModelError> {
        let name = name.into();
        if self.jobs.contains_key(&name) {
            return Err(ModelError::DuplicateJob(name));
        }
        self.names.push(name.clone());
        self.jobs.insert(name, declaration);
        Ok(())
    }

    pub fn get(&self, name: &JobName) -> Option<&JobDeclaration> {
        self.jobs.get(name)
    }

    pub fn contains(&self, name: &JobName) -> bool {
        self.jobs.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &JobName> {
        self.names.iter()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&JobName, &JobDeclaration)> {
        self.names.iter().map(|n| (n, &self.jobs[n]))
    }

    pub fn from_records(records: Vec<JobRecord>) -> Result<Self, ModelError> {
        let mut pipeline = Pipeline::new();
        for record in records {
            pipeline.insert(record.name, record.declaration)?;
        }
        Ok(pipeline)
    }

    pub fn to_records(&self) -> Vec<JobRecord> {
        self.iter()
            .map(|(name, declaration)| JobRecord {
                name: name.clone(),
                declaration: declaration.clone(),
            })
            .collect()
    }
}

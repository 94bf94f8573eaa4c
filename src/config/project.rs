use std::path::{Path, PathBuf};

use serde_yaml::Value;

use crate::{CliError, Result};

/// Per-project settings file, looked up in the working directory
pub const PROJECT_FILE_NAME: &str = ".netsells.yml";

pub const DOCKER_SERVICES: &str = "docker.services";
pub const DOCKER_AWS_REGION: &str = "docker.aws.region";
pub const DOCKER_AWS_ACCOUNT_ID: &str = "docker.aws.account-id";
pub const DOCKER_ECS_SERVICE: &str = "docker.aws.ecs.service";
pub const DOCKER_ECS_CLUSTER: &str = "docker.aws.ecs.cluster";
pub const DOCKER_ECS_TASK_DEFINITION: &str = "docker.aws.ecs.task-definition";

/// Parsed `.netsells.yml`, queried with dotted key paths
#[derive(Debug, Clone)]
pub struct ProjectFile {
    path: PathBuf,
    data: Value,
}

impl ProjectFile {
    /// Load the project file from `dir`. A missing file is not an error.
    pub fn discover(dir: &Path) -> Result<Option<Self>> {
        let path = dir.join(PROJECT_FILE_NAME);

        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        Self::parse(path, &content).map(Some)
    }

    pub fn parse(path: PathBuf, content: &str) -> Result<Self> {
        let data: Value = serde_yaml::from_str(content).map_err(|e| CliError::ProjectFile {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;

        Ok(Self { path, data })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lookup(&self, key_path: &str) -> Option<&Value> {
        key_path
            .split('.')
            .try_fold(&self.data, |node, segment| node.get(segment))
    }

    /// Scalar value at `key_path`. Numbers and booleans come back as text,
    /// so unquoted account IDs still work.
    pub fn get_string(&self, key_path: &str) -> Option<String> {
        scalar_to_string(self.lookup(key_path)?)
    }

    /// List of scalars at `key_path`; a single scalar becomes a one-item list.
    pub fn get_string_list(&self, key_path: &str) -> Vec<String> {
        match self.lookup(key_path) {
            Some(Value::Sequence(items)) => items.iter().filter_map(scalar_to_string).collect(),
            Some(value) => scalar_to_string(value).into_iter().collect(),
            None => Vec::new(),
        }
    }
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

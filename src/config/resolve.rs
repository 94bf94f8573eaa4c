use std::collections::HashMap;

use tracing::debug;

use super::project::{self, ProjectFile};
use super::settings::Settings;
use crate::{CliError, Result};

pub const DEFAULT_AWS_REGION: &str = "eu-west-2";
pub const DEFAULT_AWS_ACCOUNT_ID: &str = "422860057079";
pub const DEFAULT_EDITOR: &str = "vi";

/// Values given explicitly on the command line
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub aws_region: Option<String>,
    pub aws_profile: Option<String>,
    pub aws_account_id: Option<String>,
    pub tag: Option<String>,
    pub tag_prefix: Option<String>,
    pub environment: Option<String>,
    pub services: Vec<String>,
    pub ecs_service: Option<String>,
    pub ecs_cluster: Option<String>,
    pub ecs_task_definition: Option<String>,
    pub s3_bucket_name: Option<String>,
}

/// Everything configuration can come from, captured once per invocation
#[derive(Debug)]
pub struct ConfigSources<'a> {
    pub overrides: &'a ConfigOverrides,
    pub env: &'a HashMap<String, String>,
    pub project: Option<&'a ProjectFile>,
    pub settings: &'a Settings,
    /// Fallback image tag, normally the current commit SHA
    pub default_tag: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConfigOption {
    AwsRegion,
    AwsProfile,
    AwsAccountId,
    Tag,
    TagPrefix,
    Environment,
    EcsService,
    EcsCluster,
    EcsTaskDefinition,
    S3BucketName,
}

impl ConfigOption {
    fn name(self) -> &'static str {
        match self {
            ConfigOption::AwsRegion => "aws-region",
            ConfigOption::AwsProfile => "aws-profile",
            ConfigOption::AwsAccountId => "aws-account-id",
            ConfigOption::Tag => "tag",
            ConfigOption::TagPrefix => "tag-prefix",
            ConfigOption::Environment => "environment",
            ConfigOption::EcsService => "ecs-service",
            ConfigOption::EcsCluster => "ecs-cluster",
            ConfigOption::EcsTaskDefinition => "ecs-task-definition",
            ConfigOption::S3BucketName => "s3-bucket-name",
        }
    }

    /// `NETSELLS_` followed by the upper-cased option name
    fn env_var(self) -> String {
        format!("NETSELLS_{}", self.name().to_uppercase().replace('-', "_"))
    }

    fn legacy_env_var(self) -> Option<&'static str> {
        match self {
            ConfigOption::Tag => Some("TAG"),
            ConfigOption::TagPrefix => Some("TAG_PREFIX"),
            // Exported into assumed-role shells
            ConfigOption::S3BucketName => Some("AWS_S3_ENV"),
            _ => None,
        }
    }

    fn project_key(self) -> Option<&'static str> {
        match self {
            ConfigOption::AwsRegion => Some(project::DOCKER_AWS_REGION),
            ConfigOption::AwsAccountId => Some(project::DOCKER_AWS_ACCOUNT_ID),
            ConfigOption::EcsService => Some(project::DOCKER_ECS_SERVICE),
            ConfigOption::EcsCluster => Some(project::DOCKER_ECS_CLUSTER),
            ConfigOption::EcsTaskDefinition => Some(project::DOCKER_ECS_TASK_DEFINITION),
            _ => None,
        }
    }
}

/// Configuration for one command invocation, after applying precedence:
/// flag, environment variable, project file, user settings, default.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedConfig {
    pub aws_region: String,
    pub aws_profile: Option<String>,
    pub aws_account_id: String,
    pub tag: Option<String>,
    pub tag_prefix: Option<String>,
    pub environment: Option<String>,
    pub services: Vec<String>,
    pub ecs_service: Option<String>,
    pub ecs_cluster: Option<String>,
    pub ecs_task_definition: Option<String>,
    /// Bucket holding environment variable files
    pub s3_bucket_name: Option<String>,
    /// Editor command line from `EDITOR`
    pub editor: String,
}

impl Default for ResolvedConfig {
    fn default() -> Self {
        Self {
            aws_region: DEFAULT_AWS_REGION.to_string(),
            aws_profile: None,
            aws_account_id: DEFAULT_AWS_ACCOUNT_ID.to_string(),
            tag: None,
            tag_prefix: None,
            environment: None,
            services: Vec::new(),
            ecs_service: None,
            ecs_cluster: None,
            ecs_task_definition: None,
            s3_bucket_name: None,
            editor: DEFAULT_EDITOR.to_string(),
        }
    }
}

/// Cluster, service and task definition family for a deployment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EcsTarget {
    pub cluster: String,
    pub service: String,
    pub task_definition: String,
}

impl ResolvedConfig {
    pub fn resolve(sources: &ConfigSources<'_>) -> Self {
        let overrides = sources.overrides;
        let settings = sources.settings;

        let aws_region = resolve_option(
            sources,
            ConfigOption::AwsRegion,
            overrides.aws_region.as_deref(),
            settings.region.as_deref(),
        )
        .unwrap_or_else(|| DEFAULT_AWS_REGION.to_string());

        let aws_account_id = resolve_option(
            sources,
            ConfigOption::AwsAccountId,
            overrides.aws_account_id.as_deref(),
            settings.account_id.as_deref(),
        )
        .unwrap_or_else(|| DEFAULT_AWS_ACCOUNT_ID.to_string());

        let aws_profile = resolve_option(
            sources,
            ConfigOption::AwsProfile,
            overrides.aws_profile.as_deref(),
            settings.profile.as_deref(),
        );

        let tag = resolve_option(sources, ConfigOption::Tag, overrides.tag.as_deref(), None)
            .or_else(|| {
                debug!("falling back to the current commit for the image tag");
                sources.default_tag.clone()
            });

        let services = if !overrides.services.is_empty() {
            overrides.services.clone()
        } else {
            sources
                .project
                .map(|file| file.get_string_list(project::DOCKER_SERVICES))
                .unwrap_or_default()
        };

        Self {
            aws_region,
            aws_profile,
            aws_account_id,
            tag,
            tag_prefix: resolve_option(
                sources,
                ConfigOption::TagPrefix,
                overrides.tag_prefix.as_deref(),
                None,
            ),
            environment: resolve_option(
                sources,
                ConfigOption::Environment,
                overrides.environment.as_deref(),
                None,
            ),
            services,
            ecs_service: resolve_option(
                sources,
                ConfigOption::EcsService,
                overrides.ecs_service.as_deref(),
                None,
            ),
            ecs_cluster: resolve_option(
                sources,
                ConfigOption::EcsCluster,
                overrides.ecs_cluster.as_deref(),
                None,
            ),
            ecs_task_definition: resolve_option(
                sources,
                ConfigOption::EcsTaskDefinition,
                overrides.ecs_task_definition.as_deref(),
                None,
            ),
            s3_bucket_name: resolve_option(
                sources,
                ConfigOption::S3BucketName,
                overrides.s3_bucket_name.as_deref(),
                None,
            ),
            editor: sources
                .env
                .get("EDITOR")
                .and_then(|value| non_empty(value))
                .unwrap_or_else(|| DEFAULT_EDITOR.to_string()),
        }
    }

    /// The ECS deployment target; every part must be set somewhere.
    pub fn ecs_target(&self) -> Result<EcsTarget> {
        let mut missing = Vec::new();
        if self.ecs_cluster.is_none() {
            missing.push("ecs-cluster");
        }
        if self.ecs_service.is_none() {
            missing.push("ecs-service");
        }
        if self.ecs_task_definition.is_none() {
            missing.push("ecs-task-definition");
        }

        match (&self.ecs_cluster, &self.ecs_service, &self.ecs_task_definition) {
            (Some(cluster), Some(service), Some(task_definition)) => Ok(EcsTarget {
                cluster: cluster.clone(),
                service: service.clone(),
                task_definition: task_definition.clone(),
            }),
            _ => Err(CliError::MissingEcsTarget(format!(
                "set {} via flags, NETSELLS_* variables or the {} file",
                missing.join(", "),
                project::PROJECT_FILE_NAME
            ))),
        }
    }
}

fn non_empty(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

fn resolve_option(
    sources: &ConfigSources<'_>,
    option: ConfigOption,
    flag: Option<&str>,
    setting: Option<&str>,
) -> Option<String> {
    let name = option.name();

    if let Some(value) = flag.and_then(non_empty) {
        debug!(option = name, value = %value, "using command line flag");
        return Some(value);
    }

    let env_var = option.env_var();
    let from_env = std::iter::once(env_var.as_str())
        .chain(option.legacy_env_var())
        .find_map(|var| sources.env.get(var).and_then(|v| non_empty(v)).map(|v| (var, v)));
    if let Some((var, value)) = from_env {
        debug!(option = name, variable = var, value = %value, "using environment variable");
        return Some(value);
    }

    if let (Some(file), Some(key)) = (sources.project, option.project_key()) {
        if let Some(value) = file.get_string(key) {
            debug!(option = name, key, value = %value, "using project file");
            return Some(value);
        }
    }

    if let Some(value) = setting.and_then(non_empty) {
        debug!(option = name, value = %value, "using user settings");
        return Some(value);
    }

    None
}

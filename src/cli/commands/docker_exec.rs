use clap::Args;

use super::ecs_connect::{open_session, pick_container, running_tasks, DEFAULT_SHELL};
use crate::aws::AwsCli;
use crate::checks;
use crate::config::{ResolvedConfig, PROJECT_FILE_NAME};
use crate::ui::Prompter;
use crate::{CliError, Result};

#[derive(Args, Debug, Clone, Default)]
pub struct ExecArgs {
    /// The container name to run the command in
    #[arg(long)]
    pub container: Option<String>,

    /// The command to run
    #[arg(long, default_value = DEFAULT_SHELL)]
    pub command: String,
}

/// Cluster and service of the project's deployment
fn deployment(config: &ResolvedConfig) -> Result<(String, String)> {
    match (&config.ecs_cluster, &config.ecs_service) {
        (Some(cluster), Some(service)) => Ok((cluster.clone(), service.clone())),
        (cluster, service) => {
            let mut missing = Vec::new();
            if cluster.is_none() {
                missing.push("ecs-cluster");
            }
            if service.is_none() {
                missing.push("ecs-service");
            }
            Err(CliError::MissingEcsTarget(format!(
                "set {} via flags, NETSELLS_* variables or the {} file",
                missing.join(", "),
                PROJECT_FILE_NAME
            )))
        }
    }
}

pub async fn execute(config: &ResolvedConfig, args: &ExecArgs, prompter: &dyn Prompter) -> Result<()> {
    checks::require_binaries(&["aws", "session-manager-plugin"])?;

    let (cluster, service) = deployment(config)?;
    let aws = AwsCli::from_config(config);

    let tasks = running_tasks(&aws, &cluster, &service).await?;
    let task = match tasks.as_slice() {
        [] => return Err(CliError::NoTasks { cluster, service }),
        [task] => task,
        _ => {
            let labels: Vec<String> = tasks.iter().map(|task| task.label()).collect();
            let index = prompter.present_choice("Which task do you want to run the command in?", &labels)?;
            &tasks[index]
        }
    };
    let container = pick_container(prompter, task, args.container.as_deref())?;

    open_session(&aws, &cluster, task, &container, &args.command).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deployment_needs_cluster_and_service() {
        let config = ResolvedConfig {
            ecs_service: Some("api".to_string()),
            ..ResolvedConfig::default()
        };
        let err = deployment(&config).unwrap_err().to_string();
        assert!(err.contains("ecs-cluster"));
        assert!(!err.contains("ecs-service"));

        let config = ResolvedConfig {
            ecs_cluster: Some("prod".to_string()),
            ecs_service: Some("api".to_string()),
            ..ResolvedConfig::default()
        };
        assert_eq!(
            deployment(&config).unwrap(),
            ("prod".to_string(), "api".to_string())
        );
    }
}

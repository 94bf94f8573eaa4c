use clap::Args;
use tracing::{info, warn};

use crate::aws::ecs::{self, RunningTask};
use crate::aws::AwsCli;
use crate::checks;
use crate::config::ResolvedConfig;
use crate::ui::{create_spinner, Prompter};
use crate::{CliError, Result};

pub(crate) const DEFAULT_SHELL: &str = "/bin/bash";

#[derive(Args, Debug, Clone, Default)]
pub struct EcsConnectArgs {
    /// The ECS cluster to connect to
    #[arg(long)]
    pub cluster: Option<String>,

    /// The ECS service to connect to
    #[arg(long)]
    pub service: Option<String>,

    /// The task ID to connect to
    #[arg(long)]
    pub task: Option<String>,

    /// The container name to connect to
    #[arg(long)]
    pub container: Option<String>,

    /// The command to run in the container
    #[arg(long)]
    pub command: Option<String>,
}

/// Pick one of `arns` by its short name.
///
/// A `preferred` name that exists is used as is. One that does not is
/// reported and the usual choice follows. A single entry is picked without
/// asking.
pub(crate) fn pick_named(
    prompter: &dyn Prompter,
    kind: &str,
    arns: &[String],
    preferred: Option<&str>,
) -> Result<String> {
    let names: Vec<String> = arns.iter().map(|arn| ecs::arn_name(arn).to_string()).collect();

    if let Some(preferred) = preferred {
        if names.iter().any(|name| name == preferred) {
            info!(kind, name = preferred, "Using configured value");
            return Ok(preferred.to_string());
        }
        warn!(kind, name = preferred, "Configured value not found");
        println!("The {} '{}' could not be found, please choose one.", kind, preferred);
    }

    match names.len() {
        0 => Err(CliError::NoChoices(format!("no {}s available", kind))),
        1 => Ok(names[0].clone()),
        _ => {
            let index = prompter.present_choice(&format!("Which {} do you want to connect to?", kind), &names)?;
            Ok(names[index].clone())
        }
    }
}

pub(crate) fn pick_task<'a>(
    prompter: &dyn Prompter,
    tasks: &'a [RunningTask],
    preferred: Option<&str>,
) -> Result<&'a RunningTask> {
    if let Some(preferred) = preferred {
        if let Some(task) = tasks.iter().find(|task| task.id() == preferred) {
            return Ok(task);
        }
        println!("The task '{}' could not be found, please choose one.", preferred);
    }

    match tasks {
        [] => Err(CliError::NoChoices("no tasks available".to_string())),
        [task] => Ok(task),
        _ => {
            let labels: Vec<String> = tasks.iter().map(RunningTask::label).collect();
            let index = prompter.present_choice("Which task do you want to connect to?", &labels)?;
            Ok(&tasks[index])
        }
    }
}

pub(crate) fn pick_container(
    prompter: &dyn Prompter,
    task: &RunningTask,
    preferred: Option<&str>,
) -> Result<String> {
    let names = task.container_names();

    if let Some(preferred) = preferred {
        if names.iter().any(|name| name == preferred) {
            return Ok(preferred.to_string());
        }
        println!("The container '{}' could not be found, please choose one.", preferred);
    }

    match names.len() {
        0 => Err(CliError::NoChoices(format!("no containers in task {}", task.id()))),
        1 => Ok(names[0].clone()),
        _ => {
            let index = prompter.present_choice("Which container do you want to connect to?", &names)?;
            Ok(names[index].clone())
        }
    }
}

/// An empty answer means the default shell
fn command_or_ask(command: Option<String>, prompter: &dyn Prompter) -> Result<String> {
    let command = match command {
        Some(command) => command,
        None => prompter.ask("What command do you want to run?", &[DEFAULT_SHELL])?,
    };
    let command = command.trim();
    Ok(if command.is_empty() {
        DEFAULT_SHELL.to_string()
    } else {
        command.to_string()
    })
}

pub(crate) async fn running_tasks(aws: &AwsCli, cluster: &str, service: &str) -> Result<Vec<RunningTask>> {
    let spinner = create_spinner("Fetching running tasks...");
    let tasks = match ecs::list_tasks(aws, cluster, service).await {
        Ok(arns) => ecs::describe_tasks(aws, cluster, &arns).await,
        Err(err) => Err(err),
    };
    spinner.finish_and_clear();
    tasks
}

pub(crate) async fn open_session(
    aws: &AwsCli,
    cluster: &str,
    task: &RunningTask,
    container: &str,
    command: &str,
) -> Result<()> {
    println!(
        "Connecting to {} in task {} ({}), this may take a few seconds...",
        container,
        task.id(),
        cluster
    );
    ecs::execute_command_process(aws, cluster, task.id(), container, command)
        .run()
        .await?;
    Ok(())
}

pub async fn execute(config: &ResolvedConfig, args: &EcsConnectArgs, prompter: &dyn Prompter) -> Result<()> {
    checks::require_binaries(&["aws", "session-manager-plugin"])?;

    let aws = AwsCli::from_config(config);
    let preferred_cluster = args.cluster.clone().or_else(|| config.ecs_cluster.clone());
    let preferred_service = args.service.clone().or_else(|| config.ecs_service.clone());

    let clusters = ecs::list_clusters(&aws).await?;
    let cluster = pick_named(prompter, "cluster", &clusters, preferred_cluster.as_deref())?;

    let services = ecs::list_services(&aws, &cluster).await?;
    let service = pick_named(prompter, "service", &services, preferred_service.as_deref())?;

    let tasks = running_tasks(&aws, &cluster, &service).await?;
    let task = pick_task(prompter, &tasks, args.task.as_deref())?;
    let container = pick_container(prompter, task, args.container.as_deref())?;
    let command = command_or_ask(args.command.clone(), prompter)?;

    open_session(&aws, &cluster, task, &container, &command).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aws::ecs::RunningContainer;
    use crate::ui::ScriptedPrompter;

    fn arns() -> Vec<String> {
        vec![
            "arn:aws:ecs:eu-west-2:1:cluster/staging".to_string(),
            "arn:aws:ecs:eu-west-2:1:cluster/prod".to_string(),
        ]
    }

    fn task(id: &str, containers: &[&str]) -> RunningTask {
        RunningTask {
            task_arn: format!("arn:aws:ecs:eu-west-2:1:task/prod/{}", id),
            task_definition_arn: "arn:aws:ecs:eu-west-2:1:task-definition/api:8".to_string(),
            containers: containers
                .iter()
                .map(|name| RunningContainer {
                    name: name.to_string(),
                })
                .collect(),
        }
    }

    #[test]
    fn test_configured_name_skips_the_menu() {
        let prompter = ScriptedPrompter::new(&[], &[]);
        assert_eq!(pick_named(&prompter, "cluster", &arns(), Some("prod")).unwrap(), "prod");
        assert!(prompter.asked.borrow().is_empty());
    }

    #[test]
    fn test_unknown_configured_name_falls_back_to_menu() {
        let prompter = ScriptedPrompter::new(&[0], &[]);
        assert_eq!(pick_named(&prompter, "cluster", &arns(), Some("dev")).unwrap(), "staging");
        assert_eq!(prompter.asked.borrow().len(), 1);
    }

    #[test]
    fn test_single_entry_is_picked() {
        let prompter = ScriptedPrompter::new(&[], &[]);
        let arns = vec!["arn:aws:ecs:eu-west-2:1:service/prod/api".to_string()];
        assert_eq!(pick_named(&prompter, "service", &arns, None).unwrap(), "api");
    }

    #[test]
    fn test_nothing_to_pick() {
        let prompter = ScriptedPrompter::new(&[], &[]);
        assert!(matches!(
            pick_named(&prompter, "service", &[], None),
            Err(CliError::NoChoices(_))
        ));
    }

    #[test]
    fn test_pick_task_and_container() {
        let tasks = vec![task("aaa", &["php"]), task("bbb", &["php", "nginx"])];
        let prompter = ScriptedPrompter::new(&[1, 1], &[]);

        let chosen = pick_task(&prompter, &tasks, None).unwrap();
        assert_eq!(chosen.id(), "bbb");
        assert_eq!(pick_container(&prompter, chosen, None).unwrap(), "nginx");

        let only = pick_container(&prompter, &tasks[0], None).unwrap();
        assert_eq!(only, "php");
        assert_eq!(prompter.asked.borrow().len(), 2);
    }

    #[test]
    fn test_given_task_id_is_used() {
        let tasks = vec![task("aaa", &["php"]), task("bbb", &["php"])];
        let prompter = ScriptedPrompter::new(&[], &[]);
        assert_eq!(pick_task(&prompter, &tasks, Some("bbb")).unwrap().id(), "bbb");
    }

    #[test]
    fn test_empty_command_is_the_default_shell() {
        let prompter = ScriptedPrompter::new(&[], &[""]);
        assert_eq!(command_or_ask(None, &prompter).unwrap(), DEFAULT_SHELL);

        let prompter = ScriptedPrompter::new(&[], &[]);
        assert_eq!(
            command_or_ask(Some("php artisan tinker".to_string()), &prompter).unwrap(),
            "php artisan tinker"
        );
    }
}

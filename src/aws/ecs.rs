use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use super::cli::AwsCli;
use crate::docker::split_image;
use crate::process::ProcessRunner;
use crate::{CliError, Result};

/// Keys `describe-task-definition` returns that `register-task-definition` rejects
const READ_ONLY_KEYS: [&str; 7] = [
    "taskDefinitionArn",
    "revision",
    "status",
    "requiresAttributes",
    "compatibilities",
    "registeredAt",
    "registeredBy",
];

/// Container images in `task_definition` that are tagged and built from one
/// of `target_repositories`
pub fn controlling_images(task_definition: &Value, target_repositories: &[String]) -> Vec<String> {
    let containers = task_definition
        .pointer("/taskDefinition/containerDefinitions")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();

    let mut images = Vec::new();
    for image in containers.iter().filter_map(|c| c.get("image").and_then(Value::as_str)) {
        let (repository, tag) = split_image(image);
        if tag.is_some()
            && target_repositories.iter().any(|t| t == repository)
            && !images.iter().any(|i| i == image)
        {
            images.push(image.to_string());
        }
    }
    images
}

/// Replace every string value equal to `old` with `new`, anywhere in `value`
pub fn replace_string_values(value: &mut Value, old: &str, new: &str) {
    match value {
        Value::String(s) if s == old => *s = new.to_string(),
        Value::Array(items) => items
            .iter_mut()
            .for_each(|item| replace_string_values(item, old, new)),
        Value::Object(map) => map
            .values_mut()
            .for_each(|item| replace_string_values(item, old, new)),
        _ => {}
    }
}

/// Turn a `describe-task-definition` response into `register-task-definition` input
pub fn prepare_for_register(described: &Value) -> Result<Value> {
    let mut task_definition = described
        .get("taskDefinition")
        .cloned()
        .ok_or_else(|| CliError::TaskDefinition("response has no taskDefinition".to_string()))?;

    let map = task_definition
        .as_object_mut()
        .ok_or_else(|| CliError::TaskDefinition("taskDefinition is not an object".to_string()))?;
    for key in READ_ONLY_KEYS {
        map.remove(key);
    }

    Ok(task_definition)
}

/// `family:revision` of a `register-task-definition` response
pub fn registered_revision(family: &str, registered: &Value) -> Result<String> {
    let revision = registered
        .pointer("/taskDefinition/revision")
        .and_then(Value::as_u64)
        .ok_or_else(|| CliError::TaskDefinition("registered definition has no revision".to_string()))?;

    Ok(format!("{}:{}", family, revision))
}

pub fn deployment_url(region: &str, cluster: &str, service: &str) -> String {
    format!(
        "https://{}.console.aws.amazon.com/ecs/home#/clusters/{}/services/{}/deployments",
        region, cluster, service
    )
}

pub async fn describe_task_definition(aws: &AwsCli, name: &str) -> Result<Value> {
    let arg = format!("--task-definition={}", name);
    aws.run_json(&["ecs", "describe-task-definition", arg.as_str()])
        .await
}

pub async fn register_task_definition(aws: &AwsCli, task_definition: &Value) -> Result<Value> {
    let input = serde_json::to_string(task_definition)?;
    debug!(bytes = input.len(), "Registering task definition");
    aws.run_json(&["ecs", "register-task-definition", "--cli-input-json", input.as_str()])
        .await
}

pub async fn update_service(
    aws: &AwsCli,
    cluster: &str,
    service: &str,
    task_definition: &str,
) -> Result<Value> {
    let cluster = format!("--cluster={}", cluster);
    let service = format!("--service={}", service);
    let task_definition = format!("--task-definition={}", task_definition);
    aws.run_json(&[
        "ecs",
        "update-service",
        cluster.as_str(),
        service.as_str(),
        task_definition.as_str(),
    ])
    .await
}

/// Last `/` separated part of an ARN (`arn:aws:ecs:...:cluster/prod` is `prod`)
pub fn arn_name(arn: &str) -> &str {
    arn.rsplit('/').next().unwrap_or(arn)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ClusterList {
    #[serde(default)]
    cluster_arns: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ServiceList {
    #[serde(default)]
    service_arns: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TaskList {
    #[serde(default)]
    task_arns: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct DescribedTasks {
    #[serde(default)]
    tasks: Vec<RunningTask>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunningTask {
    pub task_arn: String,
    #[serde(default)]
    pub task_definition_arn: String,
    #[serde(default)]
    pub containers: Vec<RunningContainer>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RunningContainer {
    pub name: String,
}

impl RunningTask {
    pub fn id(&self) -> &str {
        arn_name(&self.task_arn)
    }

    pub fn container_names(&self) -> Vec<String> {
        self.containers.iter().map(|c| c.name.clone()).collect()
    }

    /// `task-id (family:revision)`
    pub fn label(&self) -> String {
        format!("{} ({})", self.id(), arn_name(&self.task_definition_arn))
    }
}

pub async fn list_clusters(aws: &AwsCli) -> Result<Vec<String>> {
    let list: ClusterList = aws.run_json(&["ecs", "list-clusters"]).await?;
    Ok(list.cluster_arns)
}

pub async fn list_services(aws: &AwsCli, cluster: &str) -> Result<Vec<String>> {
    let cluster = format!("--cluster={}", cluster);
    let list: ServiceList = aws
        .run_json(&["ecs", "list-services", cluster.as_str()])
        .await?;
    Ok(list.service_arns)
}

pub async fn list_tasks(aws: &AwsCli, cluster: &str, service: &str) -> Result<Vec<String>> {
    let cluster = format!("--cluster={}", cluster);
    let service = format!("--service-name={}", service);
    let list: TaskList = aws
        .run_json(&["ecs", "list-tasks", cluster.as_str(), service.as_str()])
        .await?;
    Ok(list.task_arns)
}

pub async fn describe_tasks(
    aws: &AwsCli,
    cluster: &str,
    task_arns: &[String],
) -> Result<Vec<RunningTask>> {
    if task_arns.is_empty() {
        return Ok(Vec::new());
    }

    let mut args = vec![
        "ecs".to_string(),
        "describe-tasks".to_string(),
        format!("--cluster={}", cluster),
        "--tasks".to_string(),
    ];
    args.extend(task_arns.iter().cloned());

    let described: DescribedTasks = aws.run_json(&args).await?;
    Ok(described.tasks)
}

/// Interactive `ecs execute-command` session inside one container
pub fn execute_command_process(
    aws: &AwsCli,
    cluster: &str,
    task: &str,
    container: &str,
    command: &str,
) -> ProcessRunner {
    aws.process(&[
        "ecs",
        "execute-command",
        "--cluster",
        cluster,
        "--task",
        task,
        "--container",
        container,
        "--interactive",
        "--command",
        command,
    ])
    .interactive()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn described() -> Value {
        json!({
            "taskDefinition": {
                "taskDefinitionArn": "arn:aws:ecs:eu-west-2:1:task-definition/api:7",
                "family": "api",
                "revision": 7,
                "status": "ACTIVE",
                "compatibilities": ["EC2"],
                "requiresAttributes": [],
                "registeredAt": "2024-01-01T00:00:00Z",
                "registeredBy": "arn:aws:iam::1:user/dev",
                "containerDefinitions": [
                    {"name": "web", "image": "1.dkr.ecr.eu-west-2.amazonaws.com/api-web:abc123"},
                    {"name": "worker", "image": "1.dkr.ecr.eu-west-2.amazonaws.com/api-web:abc123"},
                    {"name": "php", "image": "1.dkr.ecr.eu-west-2.amazonaws.com/api-php:abc123"},
                    {"name": "sidecar", "image": "datadog/agent:7"},
                    {"name": "untagged", "image": "1.dkr.ecr.eu-west-2.amazonaws.com/api-cron"}
                ],
                "tags": [{"key": "image", "value": "1.dkr.ecr.eu-west-2.amazonaws.com/api-php:abc123"}]
            }
        })
    }

    fn targets() -> Vec<String> {
        vec![
            "1.dkr.ecr.eu-west-2.amazonaws.com/api-web".to_string(),
            "1.dkr.ecr.eu-west-2.amazonaws.com/api-php".to_string(),
            "1.dkr.ecr.eu-west-2.amazonaws.com/api-cron".to_string(),
        ]
    }

    #[test]
    fn test_controlling_images_filters_and_dedupes() {
        let images = controlling_images(&described(), &targets());
        assert_eq!(
            images,
            vec![
                "1.dkr.ecr.eu-west-2.amazonaws.com/api-web:abc123",
                "1.dkr.ecr.eu-west-2.amazonaws.com/api-php:abc123",
            ]
        );
    }

    #[test]
    fn test_controlling_images_without_containers() {
        assert!(controlling_images(&json!({"taskDefinition": {}}), &targets()).is_empty());
    }

    #[test]
    fn test_replace_string_values_is_exact_match() {
        let mut value = described();
        replace_string_values(
            &mut value,
            "1.dkr.ecr.eu-west-2.amazonaws.com/api-php:abc123",
            "1.dkr.ecr.eu-west-2.amazonaws.com/api-php:def456",
        );

        assert_eq!(
            value.pointer("/taskDefinition/containerDefinitions/2/image"),
            Some(&json!("1.dkr.ecr.eu-west-2.amazonaws.com/api-php:def456"))
        );
        assert_eq!(
            value.pointer("/taskDefinition/tags/0/value"),
            Some(&json!("1.dkr.ecr.eu-west-2.amazonaws.com/api-php:def456"))
        );
        assert_eq!(
            value.pointer("/taskDefinition/containerDefinitions/0/image"),
            Some(&json!("1.dkr.ecr.eu-west-2.amazonaws.com/api-web:abc123"))
        );
    }

    #[test]
    fn test_prepare_for_register_strips_read_only_keys() {
        let prepared = prepare_for_register(&described()).unwrap();
        let map = prepared.as_object().unwrap();
        for key in READ_ONLY_KEYS {
            assert!(!map.contains_key(key), "{} should be removed", key);
        }
        assert_eq!(map["family"], "api");
        assert!(map.contains_key("containerDefinitions"));
    }

    #[test]
    fn test_prepare_for_register_requires_task_definition() {
        assert!(matches!(
            prepare_for_register(&json!({})),
            Err(CliError::TaskDefinition(_))
        ));
    }

    #[test]
    fn test_registered_revision() {
        let registered = json!({"taskDefinition": {"family": "api", "revision": 8}});
        assert_eq!(registered_revision("api", &registered).unwrap(), "api:8");
        assert!(registered_revision("api", &json!({})).is_err());
    }

    #[test]
    fn test_deployment_url() {
        assert_eq!(
            deployment_url("eu-west-2", "prod", "api"),
            "https://eu-west-2.console.aws.amazon.com/ecs/home#/clusters/prod/services/api/deployments"
        );
    }

    #[test]
    fn test_arn_name() {
        assert_eq!(arn_name("arn:aws:ecs:eu-west-2:1:cluster/prod"), "prod");
        assert_eq!(arn_name("arn:aws:ecs:eu-west-2:1:task/prod/0a1b2c"), "0a1b2c");
        assert_eq!(arn_name("prod"), "prod");
    }

    #[test]
    fn test_described_tasks_parse() {
        let described: DescribedTasks = serde_json::from_value(json!({
            "tasks": [{
                "taskArn": "arn:aws:ecs:eu-west-2:1:task/prod/0a1b2c",
                "taskDefinitionArn": "arn:aws:ecs:eu-west-2:1:task-definition/api:8",
                "lastStatus": "RUNNING",
                "containers": [{"name": "php", "lastStatus": "RUNNING"}, {"name": "nginx"}]
            }],
            "failures": []
        }))
        .unwrap();

        let task = &described.tasks[0];
        assert_eq!(task.id(), "0a1b2c");
        assert_eq!(task.label(), "0a1b2c (api:8)");
        assert_eq!(task.container_names(), vec!["php", "nginx"]);
    }

    #[test]
    fn test_execute_command_argv() {
        let aws = AwsCli::new("eu-west-2", None);
        let runner = execute_command_process(&aws, "prod", "0a1b2c", "php", "/bin/bash");
        assert_eq!(
            runner.argv(),
            [
                "aws",
                "ecs",
                "execute-command",
                "--cluster",
                "prod",
                "--task",
                "0a1b2c",
                "--container",
                "php",
                "--interactive",
                "--command",
                "/bin/bash",
                "--region=eu-west-2",
            ]
        );
    }
}

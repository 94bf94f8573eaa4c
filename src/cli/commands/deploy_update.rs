use serde_json::Value;
use tracing::info;

use crate::aws::{ecs, AwsCli};
use crate::checks;
use crate::config::ResolvedConfig;
use crate::docker::{self, compose, retag_image, split_image};
use crate::Result;

/// Repositories (image references without tags) the compose files build
fn target_repositories(image_urls: &[String]) -> Vec<String> {
    let mut repositories: Vec<String> = Vec::new();
    for url in image_urls {
        let (repository, _) = split_image(url);
        if !repositories.iter().any(|r| r == repository) {
            repositories.push(repository.to_string());
        }
    }
    repositories
}

/// Point every controlling image at `new_tag`; returns (old, new) pairs
fn retag_task_definition(
    task_definition: &mut Value,
    repositories: &[String],
    new_tag: &str,
) -> Vec<(String, String)> {
    let controlling = ecs::controlling_images(task_definition, repositories);

    controlling
        .into_iter()
        .map(|old| {
            let new = retag_image(&old, new_tag);
            ecs::replace_string_values(task_definition, &old, &new);
            (old, new)
        })
        .collect()
}

pub async fn execute(config: &ResolvedConfig) -> Result<()> {
    checks::require_binaries(&["aws", "docker-compose"])?;

    let tag = docker::prefixed_tag(config)?;
    let target = config.ecs_target()?;
    let aws = AwsCli::from_config(config);

    let mut task_definition = ecs::describe_task_definition(&aws, &target.task_definition).await?;
    let image_urls = compose::image_urls(&config.services, &tag).await?;
    let repositories = target_repositories(&image_urls);

    let replaced = retag_task_definition(&mut task_definition, &repositories, &tag);
    if replaced.is_empty() {
        info!(task_definition = %target.task_definition, "No controlling images found");
    }
    for (old, new) in &replaced {
        println!(
            "Updating images {} to {} in {}",
            old, new, target.task_definition
        );
    }

    let input = ecs::prepare_for_register(&task_definition)?;
    let registered = ecs::register_task_definition(&aws, &input).await?;
    let revision = ecs::registered_revision(&target.task_definition, &registered)?;
    println!("Task definition updated to revision {}", revision);

    ecs::update_service(&aws, &target.cluster, &target.service, &revision).await?;
    println!("Service updated to task definition {}", revision);

    println!(
        "Successfully deployed to ECS, deployment can be seen at {}",
        ecs::deployment_url(aws.region(), &target.cluster, &target.service)
    );
    Ok(())
}

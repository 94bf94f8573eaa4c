use crate::aws::AwsCli;
use crate::checks::{self, COMPOSE_FILES};
use crate::config::ResolvedConfig;
use crate::docker::{self, compose};
use crate::Result;

async fn push_service(service: Option<&str>, source_tag: &str, tags: &[String]) -> Result<()> {
    compose::tag_images(service, source_tag, tags).await?;
    for tag in tags {
        compose::push(service, tag).await?;
    }
    Ok(())
}

pub async fn execute(config: &ResolvedConfig, skip_additional_tags: bool) -> Result<()> {
    checks::require_binaries(&["docker", "docker-compose", "aws"])?;
    checks::require_files(&COMPOSE_FILES)?;

    let source_tag = docker::prefixed_tag(config)?;
    let tags = docker::push_tags(config, skip_additional_tags)?;

    let aws = AwsCli::from_config(config);
    docker::login(&aws, &config.aws_account_id).await?;

    if config.services.is_empty() {
        println!("Pushing docker images for all services with tags {}", tags.join(", "));
        push_service(None, &source_tag, &tags).await?;
    } else {
        println!(
            "Pushing docker images for services with tags {}: {}",
            tags.join(", "),
            config.services.join(",")
        );
        for service in &config.services {
            push_service(Some(service), &source_tag, &tags).await?;
        }
    }

    println!("Docker images pushed.");
    Ok(())
}

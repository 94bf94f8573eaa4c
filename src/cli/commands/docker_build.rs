use crate::aws::AwsCli;
use crate::checks::{self, COMPOSE_FILES};
use crate::config::ResolvedConfig;
use crate::docker::{self, compose};
use crate::Result;

pub async fn execute(config: &ResolvedConfig) -> Result<()> {
    checks::require_binaries(&["docker", "docker-compose", "aws"])?;
    checks::require_files(&COMPOSE_FILES)?;

    let tag = docker::prefixed_tag(config)?;
    let aws = AwsCli::from_config(config);
    docker::login(&aws, &config.aws_account_id).await?;

    if config.services.is_empty() {
        println!("Building docker images for all services with tag {}", tag);
        compose::build(None, &tag).await?;
    } else {
        println!(
            "Building docker images for services with tag {}: {}",
            tag,
            config.services.join(",")
        );
        for service in &config.services {
            compose::build(Some(service), &tag).await?;
        }
    }

    println!("Docker images built.");
    Ok(())
}

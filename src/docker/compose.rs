use std::time::Duration;

use serde_json::Value;
use tracing::{debug, info};

use super::tags::retag_image;
use crate::checks::COMPOSE_FILES;
use crate::process::ProcessRunner;
use crate::{CliError, Result};

/// Builds and pushes can take a long time on a cold cache
pub const LONG_RUNNING_TIMEOUT: Duration = Duration::from_secs(20 * 60);

/// `docker-compose -f docker-compose.yml -f docker-compose.prod.yml <args> [service]`
pub fn compose_argv(args: &[&str], service: Option<&str>) -> Vec<String> {
    let mut argv = vec!["docker-compose".to_string()];
    for file in COMPOSE_FILES {
        argv.push("-f".to_string());
        argv.push(file.to_string());
    }
    argv.extend(args.iter().map(|a| a.to_string()));
    argv.extend(service.map(str::to_string));
    argv
}

fn compose(args: &[&str], service: Option<&str>, tag: &str) -> ProcessRunner {
    ProcessRunner::new()
        .with_command(compose_argv(args, service))
        .with_environment([("TAG", tag)])
}

pub async fn build(service: Option<&str>, tag: &str) -> Result<()> {
    info!(?service, tag, "Building images");
    compose(&["build", "--no-cache"], service, tag)
        .with_timeout(Some(LONG_RUNNING_TIMEOUT))
        .with_output_streaming(true)
        .run()
        .await?;
    Ok(())
}

pub async fn push(service: Option<&str>, tag: &str) -> Result<()> {
    info!(?service, tag, "Pushing images");
    compose(&["push"], service, tag)
        .with_timeout(Some(LONG_RUNNING_TIMEOUT))
        .with_output_streaming(true)
        .run()
        .await?;
    Ok(())
}

/// Image references from `docker-compose config` output, limited to
/// `services` unless it is empty
pub fn parse_image_urls(config_json: &str, services: &[String]) -> Result<Vec<String>> {
    let config: Value = serde_json::from_str(config_json)?;
    let defined = config
        .get("services")
        .and_then(Value::as_object)
        .ok_or_else(|| CliError::Config("docker-compose config has no services".to_string()))?;

    let mut urls = Vec::new();
    for (name, definition) in defined {
        if !services.is_empty() && !services.contains(name) {
            continue;
        }
        if let Some(image) = definition.get("image").and_then(Value::as_str) {
            if !urls.iter().any(|u| u == image) {
                urls.push(image.to_string());
            }
        }
    }
    Ok(urls)
}

/// Image references the compose files produce with `TAG=<tag>`
pub async fn image_urls(services: &[String], tag: &str) -> Result<Vec<String>> {
    let output = compose(&["config", "--format", "json"], None, tag)
        .with_failure_echo(false)
        .run()
        .await?;
    parse_image_urls(&output, services)
}

/// Tag the images built under `source_tag` with each of `tags`
pub async fn tag_images(service: Option<&str>, source_tag: &str, tags: &[String]) -> Result<()> {
    let services: Vec<String> = service.map(str::to_string).into_iter().collect();
    let sources = image_urls(&services, source_tag).await?;

    for source in &sources {
        for tag in tags.iter().filter(|t| t.as_str() != source_tag) {
            let target = retag_image(source, tag);
            debug!(%source, %target, "Tagging image");
            ProcessRunner::new()
                .with_command(["docker", "tag", source.as_str(), target.as_str()])
                .run()
                .await?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONFIG: &str = r#"{
        "name": "api",
        "services": {
            "web": {"image": "1.dkr.ecr.eu-west-2.amazonaws.com/api-web:abc123"},
            "queue": {"image": "1.dkr.ecr.eu-west-2.amazonaws.com/api-web:abc123"},
            "php": {"image": "1.dkr.ecr.eu-west-2.amazonaws.com/api-php:abc123"},
            "redis": {"build": {"context": "."}}
        }
    }"#;

    #[test]
    fn test_compose_argv() {
        assert_eq!(
            compose_argv(&["build", "--no-cache"], Some("web")).join(" "),
            "docker-compose -f docker-compose.yml -f docker-compose.prod.yml build --no-cache web"
        );
        assert_eq!(
            compose_argv(&["push"], None).join(" "),
            "docker-compose -f docker-compose.yml -f docker-compose.prod.yml push"
        );
    }

    #[test]
    fn test_image_urls_for_all_services() {
        let mut urls = parse_image_urls(CONFIG, &[]).unwrap();
        urls.sort();
        assert_eq!(
            urls,
            vec![
                "1.dkr.ecr.eu-west-2.amazonaws.com/api-php:abc123",
                "1.dkr.ecr.eu-west-2.amazonaws.com/api-web:abc123",
            ]
        );
    }

    #[test]
    fn test_image_urls_for_selected_services() {
        let urls = parse_image_urls(CONFIG, &["php".to_string(), "redis".to_string()]).unwrap();
        assert_eq!(urls, vec!["1.dkr.ecr.eu-west-2.amazonaws.com/api-php:abc123"]);
    }

    #[test]
    fn test_image_urls_requires_services() {
        assert!(parse_image_urls("{}", &[]).is_err());
        assert!(parse_image_urls("nope", &[]).is_err());
    }
}

use tracing::info;

use crate::aws::{ecr, AwsCli};
use crate::process::ProcessRunner;
use crate::{CliError, Result};

/// Log docker into the account's ECR registry; returns the registry hostname
pub async fn login(aws: &AwsCli, account_id: &str) -> Result<String> {
    let hostname = ecr::registry_hostname(account_id, aws.region());
    let credentials = ecr::get_registry_login(aws).await?;
    info!(registry = %hostname, "Logging docker into registry");

    ProcessRunner::new()
        .with_command([
            "docker",
            "login",
            "--username",
            credentials.username.as_str(),
            "--password-stdin",
            hostname.as_str(),
        ])
        .with_input(credentials.password)
        .run()
        .await
        .map_err(|e| CliError::DockerLogin(e.to_string()))?;

    Ok(hostname)
}

use crate::aws::AwsCli;
use crate::checks;
use crate::config::ResolvedConfig;
use crate::{docker, Result};

pub async fn execute(config: &ResolvedConfig) -> Result<()> {
    checks::require_binaries(&["docker", "aws"])?;

    let aws = AwsCli::from_config(config);
    let registry = docker::login(&aws, &config.aws_account_id).await?;

    println!("Logged into docker registry {}.", registry);
    Ok(())
}

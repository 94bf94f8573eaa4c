use crate::aws::AwsCli;
use crate::checks;
use crate::config::ResolvedConfig;
use crate::{ssh, Result};

pub async fn execute(config: &ResolvedConfig, username: &str, instance_id: &str) -> Result<()> {
    checks::require_binaries(&["aws", "ssh", "ssh-keygen"])?;

    let aws = AwsCli::from_config(config);
    ssh::send_temporary_key(&aws, username, instance_id).await?;

    println!(
        "Temporary SSH key sent to {} for user {}; it is removed again after a few seconds.",
        instance_id, username
    );
    Ok(())
}

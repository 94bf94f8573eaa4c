use tracing::info;

use crate::aws::{ssm, AwsCli};
use crate::checks;
use crate::config::ResolvedConfig;
use crate::{ssh, Result};

/// Authorize the temporary key, then print the `aws ssm start-session`
/// command. Runs as an SSH ProxyCommand, so stdout carries nothing else.
pub async fn execute(config: &ResolvedConfig, username: &str, instance_id: &str) -> Result<()> {
    checks::require_binaries(&["aws", "ssh-keygen"])?;

    let aws = AwsCli::from_config(config);
    ssh::send_temporary_key(&aws, username, instance_id).await?;
    info!(instance_id, username, "Temporary key authorized");

    let session = ssm::start_session_process(&aws, instance_id);
    println!("{}", session.argv().join(" "));
    Ok(())
}

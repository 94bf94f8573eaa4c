use serde_json::json;
use tracing::debug;

use super::cli::AwsCli;
use crate::process::ProcessRunner;
use crate::Result;

pub const RUN_SHELL_SCRIPT_DOCUMENT: &str = "AWS-RunShellScript";
pub const START_SSH_SESSION_DOCUMENT: &str = "AWS-StartSSHSession";
const SEND_COMMAND_COMMENT: &str = "Temporary SSM SSH Access via Netsells CLI";

/// `--parameters` value for AWS-RunShellScript, one line per command
fn shell_script_parameters(script: &str) -> String {
    let commands: Vec<&str> = script.lines().collect();
    json!({ "commands": commands }).to_string()
}

/// Run a shell script on an instance through `ssm send-command`.
///
/// Returns once SSM has accepted the command; the script itself runs
/// asynchronously on the instance.
pub async fn send_shell_script(aws: &AwsCli, instance_id: &str, script: &str) -> Result<()> {
    let parameters = shell_script_parameters(script);
    debug!(instance_id, "Sending shell script via SSM");

    aws.process(&[
        "ssm",
        "send-command",
        "--instance-ids",
        instance_id,
        "--document-name",
        RUN_SHELL_SCRIPT_DOCUMENT,
        "--parameters",
        parameters.as_str(),
        "--comment",
        SEND_COMMAND_COMMENT,
    ])
    .with_failure_echo(false)
    .run()
    .await?;

    Ok(())
}

/// The `aws ssm start-session` invocation an SSH ProxyCommand runs
pub fn start_session_process(aws: &AwsCli, instance_id: &str) -> ProcessRunner {
    aws.process(&[
        "ssm",
        "start-session",
        "--target",
        instance_id,
        "--document-name",
        START_SSH_SESSION_DOCUMENT,
    ])
}

//! SSH over SSM: a throwaway key is authorized on the instance for a few
//! seconds via `ssm send-command`, and ssh tunnels through `ssm start-session`.

mod keys;
mod options;
mod remote;

pub use keys::{regenerate_key, temp_key_path};
pub use options::{SshConnection, Tunnel};
pub use remote::{authorize_key_script, validate_username};

use crate::aws::{ssm, AwsCli};
use crate::{CliError, Result};

/// Regenerate the temporary key and authorize it for `username` on the instance
pub async fn send_temporary_key(aws: &AwsCli, username: &str, instance_id: &str) -> Result<()> {
    validate_username(username)?;

    let key_path = temp_key_path()
        .ok_or_else(|| CliError::Config("cannot determine home directory".to_string()))?;
    let public_key = regenerate_key(&key_path).await?;
    let script = authorize_key_script(username, &public_key)?;

    ssm::send_shell_script(aws, instance_id, &script).await
}

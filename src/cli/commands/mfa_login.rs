use tracing::info;

use super::assume_role::{choose_mfa_device, print_expiry, run_shell, shell_environment};
use crate::aws::iam::{self, MfaToken};
use crate::aws::AwsClients;
use crate::checks;
use crate::config::ResolvedConfig;
use crate::ui::Prompter;
use crate::{CliError, Result};

const SHELL_LABEL: &str = "mfa-authd";

pub async fn execute(config: &ResolvedConfig, prompter: &dyn Prompter) -> Result<()> {
    checks::require_binaries(&["bash"])?;

    let clients = AwsClients::from_config(config).await;
    let caller_arn = clients.caller_arn().await?;
    info!(%caller_arn, "Resolved caller identity");

    let devices = iam::list_mfa_devices(&clients, &caller_arn).await?;
    let Some(serial_number) = choose_mfa_device(prompter, &devices)? else {
        return Err(CliError::NoMfaDevicesForCaller(caller_arn));
    };

    let code = prompter.ask("Please enter the code generated by your MFA device...", &[])?;
    if code.is_empty() {
        println!("No code provided, exiting.");
        return Ok(());
    }

    let credentials = iam::session_token(
        &clients,
        &MfaToken {
            serial_number,
            code,
        },
    )
    .await?;

    println!("Now opening a session following your MFA authentication. Type `exit` to leave this shell.");
    print_expiry(&credentials);

    run_shell(shell_environment(&credentials, SHELL_LABEL)).await
}

use std::collections::BTreeMap;

use chrono::{DateTime, Local};
use serde::Deserialize;
use tracing::{info, warn};

use crate::aws::iam::{self, AssumeRoleOutcome, AssumeRoleRequest, MfaToken, SessionCredentials};
use crate::aws::{s3, AwsCli, AwsClients};
use crate::checks;
use crate::config::ResolvedConfig;
use crate::process::{FailureKind, ProcessRunner};
use crate::ui::Prompter;
use crate::{CliError, Result};

const SECURITY_META_BUCKET: &str = "netsells-security-meta";

#[derive(Debug, Clone, Deserialize)]
pub struct Account {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub s3env: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AccountsFile {
    accounts: Vec<Account>,
}

#[derive(Debug, Deserialize)]
struct Role {
    name: String,
}

#[derive(Debug, Deserialize)]
struct RolesFile {
    roles: Vec<Role>,
}

fn choose_account<'a>(prompter: &dyn Prompter, accounts: &'a [Account]) -> Result<&'a Account> {
    let labels: Vec<String> = accounts
        .iter()
        .map(|a| format!("{} ({})", a.name, a.id))
        .collect();
    let index = prompter.present_choice("Choose an account to connect to...", &labels)?;
    Ok(&accounts[index])
}

fn choose_role(prompter: &dyn Prompter, roles: &[String]) -> Result<String> {
    let index = prompter.present_choice("Choose a role to assume...", roles)?;
    Ok(roles[index].clone())
}

/// Pick the MFA device to use; a single device is used without asking
pub(crate) fn choose_mfa_device(prompter: &dyn Prompter, devices: &[String]) -> Result<Option<String>> {
    match devices {
        [] => Ok(None),
        [only] => Ok(Some(only.clone())),
        _ => {
            let index =
                prompter.present_choice("Choose the MFA device you want to use...", devices)?;
            Ok(Some(devices[index].clone()))
        }
    }
}

/// Environment for a shell running on `credentials`, with `label` in its prompt
pub(crate) fn shell_environment(
    credentials: &SessionCredentials,
    label: &str,
) -> BTreeMap<String, String> {
    let mut env = credentials.to_env();
    env.insert("BASH_SILENCE_DEPRECATION_WARNING".to_string(), "1".to_string());
    env.insert(
        "PS1".to_string(),
        format!("\\e[32mnscli\\e[34m({})$\\e[39m ", label),
    );
    env
}

/// Hand the terminal to an interactive bash with `env` set
pub(crate) async fn run_shell(env: BTreeMap<String, String>) -> Result<()> {
    let result = ProcessRunner::new()
        .with_command(["bash"])
        .with_environment(env)
        .interactive()
        .run()
        .await;

    match result {
        Ok(_) => Ok(()),
        // The shell reports the status of whatever ran last
        Err(failure) if matches!(failure.kind(), FailureKind::NonZeroExit) => {
            warn!(code = failure.exit_code(), "credentials shell exited unsuccessfully");
            Ok(())
        }
        Err(failure) => Err(failure.into()),
    }
}

pub(crate) fn print_expiry(credentials: &SessionCredentials) {
    if let Some(expiry) = credentials.expiration.as_deref().and_then(local_expiry) {
        println!("The credentials expire at {}.", expiry);
    }
}

fn local_expiry(expiration: &str) -> Option<String> {
    DateTime::parse_from_rfc3339(expiration)
        .ok()
        .map(|at| at.with_timezone(&Local).format("%H:%M:%S").to_string())
}

pub async fn execute(config: &ResolvedConfig, prompter: &dyn Prompter) -> Result<()> {
    checks::require_binaries(&["aws", "bash"])?;

    let aws = AwsCli::from_config(config);
    let clients = AwsClients::from_config(config).await;

    let accounts: AccountsFile =
        s3::get_json_file(&aws, SECURITY_META_BUCKET, "accounts.json").await?;
    if accounts.accounts.is_empty() {
        return Err(CliError::NoChoices("no accounts available".to_string()));
    }
    let account = choose_account(prompter, &accounts.accounts)?.clone();

    let roles: RolesFile = s3::get_json_file(&aws, SECURITY_META_BUCKET, "roles.json").await?;
    let roles: Vec<String> = roles.roles.into_iter().map(|r| r.name).collect();
    let role = choose_role(prompter, &roles)?;

    let caller_arn = clients.caller_arn().await?;
    let session_user = iam::session_user(&caller_arn);
    info!(%caller_arn, %session_user, "Resolved caller identity");

    let request = AssumeRoleRequest {
        account_id: account.id.clone(),
        role: role.clone(),
        session_user: session_user.clone(),
    };

    let credentials = match iam::assume_role(&clients, &request, None).await? {
        AssumeRoleOutcome::Assumed(credentials) => credentials,
        AssumeRoleOutcome::AccessDenied => {
            // Usually means the role requires MFA
            let devices = iam::list_mfa_devices(&clients, &caller_arn).await?;
            let Some(serial_number) = choose_mfa_device(prompter, &devices)? else {
                return Err(CliError::NoMfaDevices {
                    role,
                    user: session_user,
                });
            };

            let code = prompter.ask("Please enter the code generated by your MFA device...", &[])?;
            if code.is_empty() {
                println!("No code provided, exiting.");
                return Ok(());
            }

            let mfa = MfaToken {
                serial_number,
                code,
            };
            match iam::assume_role(&clients, &request, Some(&mfa)).await? {
                AssumeRoleOutcome::Assumed(credentials) => credentials,
                AssumeRoleOutcome::AccessDenied => {
                    return Err(CliError::Sts(format!(
                        "access denied assuming role {} on {} even with MFA",
                        role, account.id
                    )))
                }
            }
        }
    };

    println!(
        "Now opening a session following you ({}) assuming the role {} on {} ({}). Type `exit` to leave this shell.",
        session_user, role, account.name, account.id
    );
    print_expiry(&credentials);

    let mut env = shell_environment(&credentials, &format!("{}:{}", session_user, account.name));
    env.insert(
        "AWS_S3_ENV".to_string(),
        account.s3env.clone().unwrap_or_default(),
    );
    run_shell(env).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ui::ScriptedPrompter;

    fn accounts() -> Vec<Account> {
        serde_json::from_str::<AccountsFile>(
            r#"{"accounts": [
                {"id": "111111111111", "name": "staging", "s3env": "stage"},
                {"id": "222222222222", "name": "production"}
            ]}"#,
        )
        .unwrap()
        .accounts
    }

    fn credentials() -> SessionCredentials {
        SessionCredentials {
            access_key_id: "AKIA".to_string(),
            secret_access_key: "secret".to_string(),
            session_token: "token".to_string(),
            expiration: Some("2026-10-18T12:00:00Z".to_string()),
        }
    }

    #[test]
    fn test_choose_account() {
        let accounts = accounts();
        let prompter = ScriptedPrompter::new(&[1], &[]);
        let account = choose_account(&prompter, &accounts).unwrap();
        assert_eq!(account.id, "222222222222");
        assert_eq!(account.s3env, None);
    }

    #[test]
    fn test_roles_file_parses() {
        let roles: RolesFile =
            serde_json::from_str(r#"{"roles": [{"name": "developer"}, {"name": "admin"}]}"#).unwrap();
        let names: Vec<String> = roles.roles.into_iter().map(|r| r.name).collect();
        let prompter = ScriptedPrompter::new(&[1], &[]);
        assert_eq!(choose_role(&prompter, &names).unwrap(), "admin");
    }

    #[test]
    fn test_single_mfa_device_is_used_without_asking() {
        let prompter = ScriptedPrompter::new(&[], &[]);
        let device = choose_mfa_device(&prompter, &["arn:aws:iam::1:mfa/jane".to_string()]).unwrap();
        assert_eq!(device.as_deref(), Some("arn:aws:iam::1:mfa/jane"));
        assert!(prompter.asked.borrow().is_empty());
    }

    #[test]
    fn test_mfa_device_choice() {
        let devices = vec!["arn:a".to_string(), "arn:b".to_string()];
        let prompter = ScriptedPrompter::new(&[1], &[]);
        assert_eq!(
            choose_mfa_device(&prompter, &devices).unwrap().as_deref(),
            Some("arn:b")
        );
        assert_eq!(choose_mfa_device(&prompter, &[]).unwrap(), None);
    }

    #[test]
    fn test_shell_environment() {
        let env = shell_environment(&credentials(), "jane.doe:staging");

        assert_eq!(env["AWS_ACCESS_KEY_ID"], "AKIA");
        assert_eq!(env["AWS_SESSION_TOKEN"], "token");
        assert_eq!(env["BASH_SILENCE_DEPRECATION_WARNING"], "1");
        assert_eq!(env["PS1"], "\\e[32mnscli\\e[34m(jane.doe:staging)$\\e[39m ");
    }

    #[test]
    fn test_local_expiry() {
        assert!(local_expiry("2026-10-18T12:00:00Z").is_some());
        assert!(local_expiry("tomorrow").is_none());
    }
}

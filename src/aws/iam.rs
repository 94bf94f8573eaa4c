use std::collections::BTreeMap;

use aws_sdk_iam::types::AssignmentStatusType;
use aws_sdk_sts::error::ProvideErrorMetadata;
use aws_smithy_types::date_time::Format;
use tracing::{debug, warn};

use super::client::AwsClients;
use crate::{CliError, Result};

const UNKNOWN_SESSION_USER: &str = "unknown.user";

/// Session user name from a caller ARN (`arn:aws:iam::1:user/jane.doe` → `jane.doe`)
pub fn session_user(caller_arn: &str) -> String {
    caller_arn
        .split_once("user/")
        .map(|(_, user)| user.to_string())
        .filter(|user| !user.is_empty())
        .unwrap_or_else(|| UNKNOWN_SESSION_USER.to_string())
}

pub fn role_arn(account_id: &str, role: &str) -> String {
    format!("arn:aws:iam::{}:role/{}", account_id, role)
}

pub fn role_session_name(session_user: &str, account_id: &str) -> String {
    format!("{}-on-{}", session_user, account_id)
}

#[derive(Debug, Clone)]
pub struct AssumeRoleRequest {
    pub account_id: String,
    pub role: String,
    pub session_user: String,
}

/// An MFA device serial and the current code from it
#[derive(Debug, Clone)]
pub struct MfaToken {
    pub serial_number: String,
    pub code: String,
}

/// Temporary credentials from STS
#[derive(Debug, Clone)]
pub struct SessionCredentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: String,
    pub expiration: Option<String>,
}

impl SessionCredentials {
    fn from_sts(credentials: &aws_sdk_sts::types::Credentials) -> Self {
        Self {
            access_key_id: credentials.access_key_id().to_string(),
            secret_access_key: credentials.secret_access_key().to_string(),
            session_token: credentials.session_token().to_string(),
            expiration: credentials.expiration().fmt(Format::DateTime).ok(),
        }
    }

    /// The credentials as the standard AWS environment variables
    pub fn to_env(&self) -> BTreeMap<String, String> {
        BTreeMap::from([
            ("AWS_ACCESS_KEY_ID".to_string(), self.access_key_id.clone()),
            ("AWS_SECRET_ACCESS_KEY".to_string(), self.secret_access_key.clone()),
            ("AWS_SESSION_TOKEN".to_string(), self.session_token.clone()),
        ])
    }
}

#[derive(Debug)]
pub enum AssumeRoleOutcome {
    Assumed(SessionCredentials),
    /// STS answered `AccessDenied`; usually means MFA is required
    AccessDenied,
}

pub async fn assume_role(
    clients: &AwsClients,
    request: &AssumeRoleRequest,
    mfa: Option<&MfaToken>,
) -> Result<AssumeRoleOutcome> {
    let arn = role_arn(&request.account_id, &request.role);
    let session_name = role_session_name(&request.session_user, &request.account_id);
    debug!(role_arn = %arn, session_name, with_mfa = mfa.is_some(), "Assuming role");

    let mut call = clients
        .sts
        .assume_role()
        .role_arn(&arn)
        .role_session_name(&session_name);

    if let Some(mfa) = mfa {
        call = call
            .serial_number(&mfa.serial_number)
            .token_code(&mfa.code);
    }

    let response = match call.send().await {
        Ok(response) => response,
        Err(err) if err.code() == Some("AccessDenied") => {
            warn!(role_arn = %arn, "Access denied assuming role");
            return Ok(AssumeRoleOutcome::AccessDenied);
        }
        Err(err) => return Err(CliError::sts(err)),
    };

    let credentials = response
        .credentials()
        .ok_or_else(|| CliError::Sts("AssumeRole returned no credentials".to_string()))?;

    Ok(AssumeRoleOutcome::Assumed(SessionCredentials::from_sts(credentials)))
}

/// MFA-authenticated session credentials for the caller's own identity
pub async fn session_token(clients: &AwsClients, mfa: &MfaToken) -> Result<SessionCredentials> {
    debug!(serial_number = %mfa.serial_number, "Requesting MFA session token");

    let response = clients
        .sts
        .get_session_token()
        .serial_number(&mfa.serial_number)
        .token_code(&mfa.code)
        .send()
        .await
        .map_err(CliError::sts)?;

    let credentials = response
        .credentials()
        .ok_or_else(|| CliError::Sts("GetSessionToken returned no credentials".to_string()))?;

    Ok(SessionCredentials::from_sts(credentials))
}

/// Serial numbers of the assigned virtual MFA devices belonging to `user_arn`
pub async fn list_mfa_devices(clients: &AwsClients, user_arn: &str) -> Result<Vec<String>> {
    let mut serials = Vec::new();
    let mut marker: Option<String> = None;

    loop {
        let response = clients
            .iam
            .list_virtual_mfa_devices()
            .assignment_status(AssignmentStatusType::Assigned)
            .set_marker(marker.take())
            .send()
            .await
            .map_err(CliError::iam)?;

        serials.extend(
            response
                .virtual_mfa_devices()
                .iter()
                .filter(|device| device.user().map(|u| u.arn()) == Some(user_arn))
                .map(|device| device.serial_number().to_string()),
        );

        match response.marker() {
            Some(next) if response.is_truncated() => marker = Some(next.to_string()),
            _ => break,
        }
    }

    Ok(serials)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_user_from_user_arn() {
        assert_eq!(session_user("arn:aws:iam::123456789012:user/jane.doe"), "jane.doe");
    }

    #[test]
    fn test_session_user_falls_back() {
        assert_eq!(
            session_user("arn:aws:sts::123456789012:assumed-role/admin/session"),
            "unknown.user"
        );
        assert_eq!(session_user("arn:aws:iam::123456789012:user/"), "unknown.user");
    }

    #[test]
    fn test_role_names() {
        assert_eq!(
            role_arn("123456789012", "developer"),
            "arn:aws:iam::123456789012:role/developer"
        );
        assert_eq!(
            role_session_name("jane.doe", "123456789012"),
            "jane.doe-on-123456789012"
        );
    }

    #[test]
    fn test_credentials_env() {
        let creds = SessionCredentials {
            access_key_id: "AKIA".to_string(),
            secret_access_key: "secret".to_string(),
            session_token: "token".to_string(),
            expiration: None,
        };
        let env = creds.to_env();
        assert_eq!(env["AWS_ACCESS_KEY_ID"], "AKIA");
        assert_eq!(env["AWS_SECRET_ACCESS_KEY"], "secret");
        assert_eq!(env["AWS_SESSION_TOKEN"], "token");
        assert_eq!(env.len(), 3);
    }
}

use base64::{engine::general_purpose::STANDARD, Engine};
use serde::Deserialize;

use super::cli::AwsCli;
use crate::{CliError, Result};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AuthorizationTokenResponse {
    authorization_data: Vec<AuthorizationData>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AuthorizationData {
    authorization_token: String,
}

/// Registry credentials decoded from an ECR authorization token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryLogin {
    pub username: String,
    pub password: String,
}

pub fn registry_hostname(account_id: &str, region: &str) -> String {
    format!("{}.dkr.ecr.{}.amazonaws.com", account_id, region)
}

/// Decode a base64 `user:password` token
pub fn decode_token(token: &str) -> Result<RegistryLogin> {
    let bytes = STANDARD
        .decode(token.trim())
        .map_err(|e| CliError::DockerLogin(format!("authorization token is not base64: {}", e)))?;
    let decoded = String::from_utf8(bytes)
        .map_err(|_| CliError::DockerLogin("authorization token is not UTF-8".to_string()))?;

    let (username, password) = decoded
        .split_once(':')
        .ok_or_else(|| CliError::DockerLogin("authorization token has no password".to_string()))?;

    Ok(RegistryLogin {
        username: username.to_string(),
        password: password.to_string(),
    })
}

pub async fn get_registry_login(aws: &AwsCli) -> Result<RegistryLogin> {
    let response: AuthorizationTokenResponse = aws
        .run_json(&["ecr", "get-authorization-token"])
        .await?;

    let data = response
        .authorization_data
        .first()
        .ok_or_else(|| CliError::DockerLogin("no authorization data returned".to_string()))?;

    decode_token(&data.authorization_token)
}

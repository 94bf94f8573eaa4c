use aws_config::{BehaviorVersion, Region};
use aws_sdk_iam::Client as IamClient;
use aws_sdk_sts::Client as StsClient;
use tracing::debug;

use crate::config::ResolvedConfig;
use crate::{CliError, Result};

/// SDK clients for the calls that need structured errors (STS, IAM)
#[derive(Clone)]
pub struct AwsClients {
    pub sts: StsClient,
    pub iam: IamClient,
    pub region: String,
}

impl AwsClients {
    /// Create clients for a region, optionally from a named profile
    pub async fn new(region: &str, profile: Option<&str>) -> Self {
        let mut loader = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(region.to_string()));

        if let Some(profile) = profile {
            loader = loader.profile_name(profile);
        }

        let config = loader.load().await;
        debug!(region, ?profile, "Loaded AWS SDK configuration");

        Self {
            sts: StsClient::new(&config),
            iam: IamClient::new(&config),
            region: region.to_string(),
        }
    }

    pub async fn from_config(config: &ResolvedConfig) -> Self {
        Self::new(&config.aws_region, config.aws_profile.as_deref()).await
    }

    /// ARN of the identity making the calls
    pub async fn caller_arn(&self) -> Result<String> {
        let identity = self
            .sts
            .get_caller_identity()
            .send()
            .await
            .map_err(CliError::sts)?;

        identity
            .arn()
            .map(str::to_string)
            .ok_or(CliError::AwsCredentials)
    }
}

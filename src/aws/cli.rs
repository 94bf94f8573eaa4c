use serde::de::DeserializeOwned;

use crate::config::ResolvedConfig;
use crate::process::ProcessRunner;
use crate::{CliError, Result};

/// Builds `aws` CLI invocations pinned to the resolved region and profile
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AwsCli {
    region: String,
    profile: Option<String>,
}

impl AwsCli {
    pub fn new(region: impl Into<String>, profile: Option<String>) -> Self {
        Self {
            region: region.into(),
            profile,
        }
    }

    pub fn from_config(config: &ResolvedConfig) -> Self {
        Self::new(config.aws_region.clone(), config.aws_profile.clone())
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    /// `--region` and, when set, `--profile`, appended to every call
    pub fn standard_args(&self) -> Vec<String> {
        let mut args = vec![format!("--region={}", self.region)];
        if let Some(ref profile) = self.profile {
            args.push(format!("--profile={}", profile));
        }
        args
    }

    /// Full argv for `aws <args...> <standard args>`
    pub fn argv<S: AsRef<str>>(&self, args: &[S]) -> Vec<String> {
        std::iter::once("aws".to_string())
            .chain(args.iter().map(|a| a.as_ref().to_string()))
            .chain(self.standard_args())
            .collect()
    }

    pub fn process<S: AsRef<str>>(&self, args: &[S]) -> ProcessRunner {
        ProcessRunner::new().with_command(self.argv(args))
    }

    /// Run a call and decode its JSON output
    pub async fn run_json<T: DeserializeOwned, S: AsRef<str>>(&self, args: &[S]) -> Result<T> {
        let output = self.process(args).run().await?;
        parse_json(&output)
    }
}

pub(crate) fn parse_json<T: DeserializeOwned>(output: &str) -> Result<T> {
    serde_json::from_str(output).map_err(|e| {
        let preview: String = output.trim().chars().take(200).collect();
        CliError::AwsOutput(format!("{} in {:?}", e, preview))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_args_appended() {
        let cli = AwsCli::new("eu-west-2", None);
        assert_eq!(
            cli.argv(&["ecs", "describe-task-definition", "--task-definition=api"]),
            vec![
                "aws",
                "ecs",
                "describe-task-definition",
                "--task-definition=api",
                "--region=eu-west-2",
            ]
        );
    }

    #[test]
    fn test_profile_included_when_set() {
        let cli = AwsCli::new("eu-west-1", Some("agency".to_string()));
        assert_eq!(
            cli.standard_args(),
            vec!["--region=eu-west-1", "--profile=agency"]
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_stderr_warnings_do_not_break_json_output() {
        let warnings = crate::process::SharedBuffer::default();
        let output = ProcessRunner::new()
            .with_command([
                "sh",
                "-c",
                "echo 'WARN: the attribute version is obsolete' >&2; echo '{\"a\":1}'",
            ])
            .with_error_output(warnings.sink())
            .run()
            .await
            .unwrap();

        let value: serde_json::Value = parse_json(&output).unwrap();
        assert_eq!(value["a"], 1);
    }

    #[test]
    fn test_parse_json_error_mentions_output() {
        let err = parse_json::<serde_json::Value>("not json").unwrap_err();
        assert!(matches!(err, CliError::AwsOutput(ref msg) if msg.contains("not json")));
    }
}

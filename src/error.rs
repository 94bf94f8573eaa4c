use thiserror::Error;

use crate::process::ProcessFailure;

#[derive(Error, Debug)]
pub enum CliError {
    // External commands
    #[error("Process failed: {0}")]
    Process(#[from] ProcessFailure),

    #[error("Cannot run due to missing required binaries: {}", .0.join(", "))]
    MissingBinaries(Vec<String>),

    #[error("Cannot run due to missing required files: {}", .0.join(", "))]
    MissingFiles(Vec<String>),

    // AWS Errors
    #[error("AWS STS error: {0}")]
    Sts(String),

    #[error("AWS IAM error: {0}")]
    Iam(String),

    #[error("AWS credentials not found or invalid")]
    AwsCredentials,

    #[error("Unexpected AWS CLI output: {0}")]
    AwsOutput(String),

    #[error("Access denied assuming role {role}: no MFA devices available for user {user}")]
    NoMfaDevices { role: String, user: String },

    #[error("No MFA devices for current user ({0})")]
    NoMfaDevicesForCaller(String),

    #[error("No S3 bucket for environment files. Pass --s3-bucket-name or run aws:assume-role first.")]
    NoEnvBucket,

    #[error("Environment files must have a .env extension: {0}")]
    InvalidEnvFile(String),

    // ECS / Docker Errors
    #[error("Invalid task definition: {0}")]
    TaskDefinition(String),

    #[error("No tag set or available from git. Cannot proceed.")]
    MissingTag,

    #[error("Missing ECS deployment settings: {0}")]
    MissingEcsTarget(String),

    #[error("No tasks found for service {service} in cluster {cluster}")]
    NoTasks { cluster: String, service: String },

    #[error("Docker registry login failed: {0}")]
    DockerLogin(String),

    // SSH Errors
    #[error("Invalid SSH key: {0}")]
    SshKeyInvalid(String),

    #[error("Invalid username: {0}")]
    InvalidUsername(String),

    // Config Errors
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid project file {path}: {reason}")]
    ProjectFile { path: String, reason: String },

    #[error("Prerequisites not met: {0}")]
    Prerequisites(String),

    // Prompts
    #[error("Nothing to choose from: {0}")]
    NoChoices(String),

    #[error("Operation cancelled by user")]
    Cancelled,

    // File/IO Errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

macro_rules! format_sdk_error {
    ($sdk:ident, $err:expr) => {{
        use $sdk::error::SdkError;
        match &$err {
            SdkError::ServiceError(service_err) => format!("{:?}", service_err.err()),
            SdkError::TimeoutError(_) => "Request timed out".to_string(),
            SdkError::DispatchFailure(dispatch) => {
                if dispatch.is_io() {
                    "Network error - please check your connection".to_string()
                } else if dispatch.is_timeout() {
                    "Connection timed out".to_string()
                } else {
                    format!("Connection error: {:?}", dispatch)
                }
            }
            SdkError::ConstructionFailure(_) => "Failed to construct request".to_string(),
            SdkError::ResponseError(resp) => format!("Response error: {:?}", resp),
            _ => $err.to_string(),
        }
    }};
}

impl CliError {
    pub fn sts<E, R>(err: aws_sdk_sts::error::SdkError<E, R>) -> Self
    where
        E: std::fmt::Debug + std::error::Error + 'static,
        R: std::fmt::Debug,
    {
        CliError::Sts(format_sdk_error!(aws_sdk_sts, err))
    }

    pub fn iam<E, R>(err: aws_sdk_iam::error::SdkError<E, R>) -> Self
    where
        E: std::fmt::Debug + std::error::Error + 'static,
        R: std::fmt::Debug,
    {
        CliError::Iam(format_sdk_error!(aws_sdk_iam, err))
    }

    /// Exit code of the failed external command, if that is what went wrong
    pub fn process_exit_code(&self) -> Option<i32> {
        match self {
            CliError::Process(failure) => Some(failure.exit_code()),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, CliError>;

use clap::{Args, CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use tracing_subscriber::EnvFilter;

mod aws;
mod checks;
mod cli;
mod config;
mod docker;
mod error;
mod git;
mod process;
mod ssh;
mod ui;

pub use error::{CliError, Result};

use cli::commands::docker_exec::ExecArgs;
use cli::commands::ecs_connect::EcsConnectArgs;
use cli::commands::manage_env::ManageEnvArgs;
use cli::commands::ssm_connect::ConnectArgs;
use cli::commands::ssm_copy::CopyArgs;
use config::{ConfigOverrides, SettingKey};
use ui::TerminalPrompter;

#[derive(Parser)]
#[command(name = "netsells")]
#[command(about = "AWS, Docker and SSM workflows for Netsells engineers")]
#[command(version)]
#[command(propagate_version = true)]
struct Cli {
    #[command(flatten)]
    aws: AwsArgs,

    /// Increase log output (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Debug, Clone, Default)]
struct AwsArgs {
    /// AWS region to target
    #[arg(long, global = true)]
    aws_region: Option<String>,

    /// AWS CLI/SDK profile to use
    #[arg(long, global = true)]
    aws_profile: Option<String>,

    /// AWS account ID hosting the ECR registry
    #[arg(long, global = true)]
    aws_account_id: Option<String>,
}

#[derive(Args, Debug, Clone, Default)]
struct DockerArgs {
    /// Image tag (defaults to the current commit SHA)
    #[arg(long)]
    tag: Option<String>,

    /// Prefix prepended to the image tag
    #[arg(long)]
    tag_prefix: Option<String>,

    /// Environment name, used as tag prefix and additional tag
    #[arg(long)]
    environment: Option<String>,

    /// Limit to these compose services (repeatable)
    #[arg(long = "service")]
    services: Vec<String>,
}

#[derive(Args, Debug, Clone, Default)]
struct EcsArgs {
    /// The ECS service name
    #[arg(long)]
    ecs_service: Option<String>,

    /// The ECS cluster name
    #[arg(long)]
    ecs_cluster: Option<String>,

    /// The ECS task definition name
    #[arg(long)]
    ecs_task_definition: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// List the EC2 instances available
    #[command(name = "aws:ec2:list")]
    Ec2List,

    /// Authorize a temporary SSH key on an instance via SSM
    #[command(name = "aws:ssm:send-ssh-key")]
    SsmSendSshKey {
        /// The username to connect with
        username: String,
        /// The instance ID to connect to
        instance_id: String,
    },

    /// Authorize a temporary key and print the SSM session command (for ProxyCommand)
    #[command(name = "aws:ssm:start-session")]
    SsmStartSession {
        /// The username to connect with
        username: String,
        /// The instance ID to connect to
        instance_id: String,
    },

    /// Connect to a server via SSH over SSM
    #[command(name = "aws:ssm:connect")]
    SsmConnect(ConnectArgs),

    /// Copy files to or from a server via SCP over SSM
    #[command(name = "aws:ssm:copy")]
    SsmCopy(CopyArgs),

    /// Open a shell (or run a command) in a running ECS container
    #[command(name = "aws:ecs:connect")]
    EcsConnect(EcsConnectArgs),

    /// Edit the environment files kept in S3
    #[command(name = "aws:ecs:manage-env")]
    ManageEnv(ManageEnvArgs),

    /// Assume an IAM role in another account and open a shell with it
    #[command(name = "aws:assume-role")]
    AssumeRole,

    /// Authenticate with an MFA device and open a shell with the session
    #[command(name = "aws:mfa:login")]
    MfaLogin,

    /// Log docker into the AWS account's ECR registry
    #[command(name = "docker:login", visible_alias = "docker:aws:login")]
    DockerLogin,

    /// Build docker-compose images for production
    #[command(name = "docker:build")]
    DockerBuild {
        #[command(flatten)]
        docker: DockerArgs,
    },

    /// Push docker-compose built images to ECR
    #[command(name = "docker:aws:push")]
    DockerPush {
        #[command(flatten)]
        docker: DockerArgs,

        /// Skip the latest and environment tags
        #[arg(long)]
        skip_additional_tags: bool,
    },

    /// Update the ECS task definition with the new tag and roll the service
    #[command(name = "docker:aws:deploy-update")]
    DeployUpdate {
        #[command(flatten)]
        docker: DockerArgs,

        #[command(flatten)]
        ecs: EcsArgs,
    },

    /// Run a command in the project's running ECS service
    #[command(name = "docker:aws:exec")]
    DockerExec {
        #[command(flatten)]
        ecs: EcsArgs,

        #[command(flatten)]
        exec: ExecArgs,
    },

    /// Manage saved settings and check prerequisites
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },

    /// Print a shell completion script
    Completions {
        /// Shell to generate completions for
        shell: Shell,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Show saved settings and the effective configuration
    Show,

    /// Save a default
    Set {
        key: SettingKey,
        value: String,
    },

    /// Remove a saved default
    Unset { key: SettingKey },

    /// Check required tools and AWS credentials
    Check,
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("netsells={}", level)));

    // stdout belongs to command output (ProxyCommand reads it)
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn overrides(aws: &AwsArgs, docker: Option<&DockerArgs>, ecs: Option<&EcsArgs>) -> ConfigOverrides {
    let docker = docker.cloned().unwrap_or_default();
    let ecs = ecs.cloned().unwrap_or_default();

    ConfigOverrides {
        aws_region: aws.aws_region.clone(),
        aws_profile: aws.aws_profile.clone(),
        aws_account_id: aws.aws_account_id.clone(),
        tag: docker.tag,
        tag_prefix: docker.tag_prefix,
        environment: docker.environment,
        services: docker.services,
        ecs_service: ecs.ecs_service,
        ecs_cluster: ecs.ecs_cluster,
        ecs_task_definition: ecs.ecs_task_definition,
        s3_bucket_name: None,
    }
}

async fn run(cli: Cli) -> Result<()> {
    let prompter = TerminalPrompter;
    let verbose = cli.verbose > 0;

    match cli.command {
        Commands::Ec2List => {
            let config = config::load(&overrides(&cli.aws, None, None))?;
            cli::commands::ec2_list::execute(&config).await
        }
        Commands::SsmSendSshKey {
            username,
            instance_id,
        } => {
            let config = config::load(&overrides(&cli.aws, None, None))?;
            cli::commands::ssm_send_ssh_key::execute(&config, &username, &instance_id).await
        }
        Commands::SsmStartSession {
            username,
            instance_id,
        } => {
            let config = config::load(&overrides(&cli.aws, None, None))?;
            cli::commands::ssm_start_session::execute(&config, &username, &instance_id).await
        }
        Commands::SsmConnect(args) => {
            let config = config::load(&overrides(&cli.aws, None, None))?;
            cli::commands::ssm_connect::execute(&config, &args, &prompter, verbose).await
        }
        Commands::SsmCopy(args) => {
            let config = config::load(&overrides(&cli.aws, None, None))?;
            cli::commands::ssm_copy::execute(&config, &args, &prompter, verbose).await
        }
        Commands::EcsConnect(args) => {
            let config = config::load(&overrides(&cli.aws, None, None))?;
            cli::commands::ecs_connect::execute(&config, &args, &prompter).await
        }
        Commands::ManageEnv(args) => {
            let mut overrides = overrides(&cli.aws, None, None);
            overrides.s3_bucket_name = args.s3_bucket_name;
            let config = config::load(&overrides)?;
            cli::commands::manage_env::execute(&config, &prompter).await
        }
        Commands::MfaLogin => {
            let config = config::load(&overrides(&cli.aws, None, None))?;
            cli::commands::mfa_login::execute(&config, &prompter).await
        }
        Commands::AssumeRole => {
            let config = config::load(&overrides(&cli.aws, None, None))?;
            cli::commands::assume_role::execute(&config, &prompter).await
        }
        Commands::DockerLogin => {
            let config = config::load(&overrides(&cli.aws, None, None))?;
            cli::commands::docker_login::execute(&config).await
        }
        Commands::DockerBuild { docker } => {
            let config = config::load(&overrides(&cli.aws, Some(&docker), None))?;
            cli::commands::docker_build::execute(&config).await
        }
        Commands::DockerPush {
            docker,
            skip_additional_tags,
        } => {
            let config = config::load(&overrides(&cli.aws, Some(&docker), None))?;
            cli::commands::docker_push::execute(&config, skip_additional_tags).await
        }
        Commands::DeployUpdate { docker, ecs } => {
            let config = config::load(&overrides(&cli.aws, Some(&docker), Some(&ecs)))?;
            cli::commands::deploy_update::execute(&config).await
        }
        Commands::DockerExec { ecs, exec } => {
            let config = config::load(&overrides(&cli.aws, None, Some(&ecs)))?;
            cli::commands::docker_exec::execute(&config, &exec, &prompter).await
        }
        Commands::Config { command } => match command {
            ConfigCommands::Show => {
                let config = config::load(&overrides(&cli.aws, None, None))?;
                cli::commands::config::show(&config)
            }
            ConfigCommands::Set { key, value } => cli::commands::config::set(key, &value),
            ConfigCommands::Unset { key } => cli::commands::config::unset(key),
            ConfigCommands::Check => {
                let config = config::load(&overrides(&cli.aws, None, None))?;
                cli::commands::config::check(&config).await
            }
        },
        Commands::Completions { shell } => {
            cli::commands::completions::execute(shell, &mut Cli::command());
            Ok(())
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(err) = run(cli).await {
        // Mirror the failed tool's exit status
        if let Some(code) = err.process_exit_code().filter(|code| *code > 0) {
            eprintln!("Error: {}", err);
            std::process::exit(code);
        }
        return Err(err.into());
    }

    Ok(())
}

use clap::Args;
use tracing::warn;

use crate::aws::ec2::{self, InstanceSummary};
use crate::aws::AwsCli;
use crate::checks;
use crate::config::ResolvedConfig;
use crate::process::FailureKind;
use crate::ssh::{self, SshConnection, Tunnel};
use crate::ui::{create_spinner, Prompter};
use crate::{CliError, Result};

const USERNAME_SUGGESTIONS: [&str; 4] = ["ubuntu", "ec2-user", "admin", "root"];

#[derive(Args, Debug, Clone, Default)]
pub struct ConnectArgs {
    /// The instance ID to connect to
    #[arg(long)]
    pub instance_id: Option<String>,

    /// The username to connect with
    #[arg(long)]
    pub username: Option<String>,

    /// Set up an SSH tunnel instead of a shell
    #[arg(long)]
    pub tunnel: bool,

    /// The SSH tunnel remote server
    #[arg(long)]
    pub tunnel_remote_server: Option<String>,

    /// The SSH tunnel remote port
    #[arg(long)]
    pub tunnel_remote_port: Option<String>,

    /// The SSH tunnel local port
    #[arg(long)]
    pub tunnel_local_port: Option<String>,

    /// Show the SSH command instead of running it
    #[arg(long)]
    pub show_command: bool,
}

fn choose_instance(prompter: &dyn Prompter, instances: &[InstanceSummary]) -> Result<String> {
    let labels: Vec<String> = instances.iter().map(InstanceSummary::label).collect();
    let index = prompter.present_choice("Choose an instance to connect to...", &labels)?;
    Ok(instances[index].instance_id.clone())
}

pub(crate) fn ask_required(prompter: &dyn Prompter, prompt: &str, suggestions: &[&str]) -> Result<String> {
    let answer = prompter.ask(prompt, suggestions)?;
    if answer.is_empty() {
        return Err(CliError::Cancelled);
    }
    Ok(answer)
}

fn resolve_tunnel(args: &ConnectArgs, prompter: &dyn Prompter) -> Result<Option<Tunnel>> {
    if !args.tunnel {
        return Ok(None);
    }

    let remote_server = match args.tunnel_remote_server.clone() {
        Some(server) => server,
        None => ask_required(prompter, "What is the remote server URL/IP for the SSH tunnel?", &[])?,
    };
    let remote_port = match args.tunnel_remote_port.clone() {
        Some(port) => port,
        None => ask_required(prompter, "What is the remote port for the SSH tunnel?", &[])?,
    };
    let local_port = match args.tunnel_local_port.clone() {
        Some(port) => port,
        None => ask_required(prompter, "What is the local port for the SSH tunnel?", &[])?,
    };

    Ok(Some(Tunnel {
        local_port,
        remote_server,
        remote_port,
    }))
}

fn current_program() -> String {
    std::env::current_exe()
        .map(|path| path.display().to_string())
        .unwrap_or_else(|_| "netsells".to_string())
}

/// The given instance, or one chosen from the account's instances
pub(crate) async fn instance_or_choose(
    aws: &AwsCli,
    instance_id: Option<String>,
    prompter: &dyn Prompter,
) -> Result<String> {
    if let Some(id) = instance_id {
        return Ok(id);
    }

    let spinner = create_spinner("Listing EC2 instances...");
    let instances = ec2::list_instances(aws).await;
    spinner.finish_and_clear();
    choose_instance(prompter, &instances?)
}

/// The given username, or one asked for; either way it must be safe to use remotely
pub(crate) fn username_or_ask(username: Option<String>, prompter: &dyn Prompter) -> Result<String> {
    let username = match username {
        Some(username) => username,
        None => ask_required(
            prompter,
            "What user do you want to connect with?",
            &USERNAME_SUGGESTIONS,
        )?,
    };
    ssh::validate_username(&username)?;
    Ok(username)
}

/// Connection details for `username` on `instance_id` using the temporary key
pub(crate) fn connection_for(
    config: &ResolvedConfig,
    username: String,
    instance_id: String,
    verbose: bool,
) -> Result<SshConnection> {
    let identity_file = ssh::temp_key_path()
        .ok_or_else(|| CliError::Config("cannot determine home directory".to_string()))?;

    Ok(SshConnection {
        program: current_program(),
        identity_file,
        username,
        instance_id,
        aws_region: config.aws_region.clone(),
        aws_profile: config.aws_profile.clone(),
        tunnel: None,
        verbose,
    })
}

pub(crate) fn print_rerun_hint(command: &str) {
    println!();
    println!("You can run this command again without having to go through options using this:");
    println!();
    println!("{}", command);
    println!();
}

pub async fn execute(
    config: &ResolvedConfig,
    args: &ConnectArgs,
    prompter: &dyn Prompter,
    verbose: bool,
) -> Result<()> {
    checks::require_binaries(&["aws", "ssh"])?;

    let aws = AwsCli::from_config(config);

    let instance_id = instance_or_choose(&aws, args.instance_id.clone(), prompter).await?;
    let username = username_or_ask(args.username.clone(), prompter)?;

    let mut connection = connection_for(config, username, instance_id, verbose)?;
    connection.tunnel = resolve_tunnel(args, prompter)?;

    if args.show_command {
        println!("Run the following command to connect:");
        println!();
        println!("{}", connection.display_command());
        println!();
    } else {
        println!(
            "Establishing an SSH connection with {}, this may take a few seconds...",
            connection.instance_id
        );

        let result = crate::process::ProcessRunner::new()
            .with_command(connection.argv())
            .interactive()
            .run()
            .await;

        match result {
            Ok(_) => {}
            Err(failure) if matches!(failure.kind(), FailureKind::NonZeroExit) => {
                warn!(code = failure.exit_code(), "ssh exited unsuccessfully");
                println!();
                println!("SSH command exited with an exit code of {}", failure.exit_code());
            }
            Err(failure) => return Err(failure.into()),
        }
    }

    print_rerun_hint(&connection.rerun_command());

    Ok(())
}

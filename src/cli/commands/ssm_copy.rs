use clap::{Args, ValueEnum};
use tracing::warn;

use super::ssm_connect::{
    ask_required, connection_for, instance_or_choose, print_rerun_hint, username_or_ask,
};
use crate::aws::AwsCli;
use crate::checks;
use crate::config::ResolvedConfig;
use crate::process::{FailureKind, ProcessRunner};
use crate::ssh::SshConnection;
use crate::ui::Prompter;
use crate::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Direction {
    /// From the local side to the instance
    Up,
    /// From the instance to the local side
    Down,
}

impl Direction {
    fn as_arg(self) -> &'static str {
        match self {
            Direction::Up => "up",
            Direction::Down => "down",
        }
    }
}

#[derive(Args, Debug, Clone, Default)]
pub struct CopyArgs {
    /// The instance ID to connect to
    #[arg(long)]
    pub instance_id: Option<String>,

    /// The username to connect with
    #[arg(long)]
    pub username: Option<String>,

    /// Which way the files travel
    #[arg(long, value_enum)]
    pub direction: Option<Direction>,

    /// Path on the local side (this machine, or --other-server). File or folder.
    #[arg(long)]
    pub local_path: Option<String>,

    /// Path on the instance. File or folder.
    #[arg(long)]
    pub remote_path: Option<String>,

    /// Copy to/from `user@host` instead of this machine
    #[arg(long)]
    pub other_server: Option<String>,
}

fn direction_or_choose(direction: Option<Direction>, prompter: &dyn Prompter) -> Result<Direction> {
    if let Some(direction) = direction {
        return Ok(direction);
    }

    let options = ["Upstream".to_string(), "Downstream".to_string()];
    let index = prompter.present_choice("Which direction are you sending the files?", &options)?;
    Ok(if index == 0 {
        Direction::Up
    } else {
        Direction::Down
    })
}

/// `None` means this machine
fn other_server_or_ask(other_server: Option<String>, prompter: &dyn Prompter) -> Result<Option<String>> {
    let server = match other_server {
        Some(server) => server,
        None => prompter.ask(
            "What is the other server? Should be in the format username@hostname. Leave blank for this computer",
            &[],
        )?,
    };
    let server = server.trim();
    Ok((!server.is_empty()).then(|| server.to_string()))
}

/// Source and destination for scp, in that order
fn copy_endpoints(
    connection: &SshConnection,
    direction: Direction,
    local_path: &str,
    remote_path: &str,
    other_server: Option<&str>,
) -> (String, String) {
    let local = match other_server {
        Some(server) => format!("{}:{}", server, local_path),
        None => local_path.to_string(),
    };
    let remote = connection.remote_location(remote_path);

    match direction {
        Direction::Up => (local, remote),
        Direction::Down => (remote, local),
    }
}

fn rerun_extra(
    direction: Direction,
    local_path: &str,
    remote_path: &str,
    other_server: Option<&str>,
) -> Vec<String> {
    let mut extra = vec![
        "--direction".to_string(),
        direction.as_arg().to_string(),
        "--local-path".to_string(),
        local_path.to_string(),
        "--remote-path".to_string(),
        remote_path.to_string(),
    ];
    if let Some(server) = other_server {
        extra.push("--other-server".to_string());
        extra.push(server.to_string());
    }
    extra
}

pub async fn execute(
    config: &ResolvedConfig,
    args: &CopyArgs,
    prompter: &dyn Prompter,
    verbose: bool,
) -> Result<()> {
    checks::require_binaries(&["aws", "ssh", "scp"])?;

    let aws = AwsCli::from_config(config);

    let instance_id = instance_or_choose(&aws, args.instance_id.clone(), prompter).await?;
    let username = username_or_ask(args.username.clone(), prompter)?;
    let connection = connection_for(config, username, instance_id, verbose)?;

    let direction = direction_or_choose(args.direction, prompter)?;
    let other_server = other_server_or_ask(args.other_server.clone(), prompter)?;

    let local_path = match args.local_path.clone() {
        Some(path) => path,
        None => {
            let prompt = match other_server {
                Some(ref server) => format!(
                    "What is the path of the file/folder on the other server? ({})",
                    server
                ),
                None => "What is the path of the file/folder on your computer?".to_string(),
            };
            ask_required(prompter, &prompt, &[])?
        }
    };
    let remote_path = match args.remote_path.clone() {
        Some(path) => path,
        None => ask_required(
            prompter,
            "What is the path of the file/folder on the remote server?",
            &[],
        )?,
    };

    print_rerun_hint(&connection.rerun_command_with(
        "aws:ssm:copy",
        &rerun_extra(direction, &local_path, &remote_path, other_server.as_deref()),
    ));

    let (from, to) = copy_endpoints(
        &connection,
        direction,
        &local_path,
        &remote_path,
        other_server.as_deref(),
    );

    let result = ProcessRunner::new()
        .with_command(connection.scp_argv(&from, &to))
        .interactive()
        .run()
        .await;

    match result {
        Ok(_) => Ok(()),
        Err(failure) if matches!(failure.kind(), FailureKind::NonZeroExit) => {
            warn!(code = failure.exit_code(), "scp exited unsuccessfully");
            println!();
            println!("SCP command exited with an exit code of {}", failure.exit_code());
            Ok(())
        }
        Err(failure) => Err(failure.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ui::ScriptedPrompter;
    use std::path::PathBuf;

    fn connection() -> SshConnection {
        SshConnection {
            program: "netsells".to_string(),
            identity_file: PathBuf::from("/home/dev/.ssh/netsells-cli-ssm-ssh-tmp"),
            username: "ubuntu".to_string(),
            instance_id: "i-0abc".to_string(),
            aws_region: "eu-west-2".to_string(),
            aws_profile: None,
            tunnel: None,
            verbose: false,
        }
    }

    #[test]
    fn test_upload_goes_local_to_remote() {
        let (from, to) = copy_endpoints(&connection(), Direction::Up, "./site", "/var/www", None);
        assert_eq!(from, "./site");
        assert_eq!(to, "ubuntu@i-0abc:/var/www");
    }

    #[test]
    fn test_download_via_other_server() {
        let (from, to) = copy_endpoints(
            &connection(),
            Direction::Down,
            "/backups/db.sql",
            "/tmp/db.sql",
            Some("deploy@bastion"),
        );
        assert_eq!(from, "ubuntu@i-0abc:/tmp/db.sql");
        assert_eq!(to, "deploy@bastion:/backups/db.sql");
    }

    #[test]
    fn test_direction_menu() {
        let prompter = ScriptedPrompter::new(&[1], &[]);
        assert_eq!(direction_or_choose(None, &prompter).unwrap(), Direction::Down);

        let prompter = ScriptedPrompter::new(&[], &[]);
        assert_eq!(
            direction_or_choose(Some(Direction::Up), &prompter).unwrap(),
            Direction::Up
        );
        assert!(prompter.asked.borrow().is_empty());
    }

    #[test]
    fn test_blank_other_server_means_this_machine() {
        let prompter = ScriptedPrompter::new(&[], &["  "]);
        assert_eq!(other_server_or_ask(None, &prompter).unwrap(), None);

        let prompter = ScriptedPrompter::new(&[], &["deploy@bastion"]);
        assert_eq!(
            other_server_or_ask(None, &prompter).unwrap().as_deref(),
            Some("deploy@bastion")
        );
    }

    #[test]
    fn test_rerun_extra() {
        assert_eq!(
            rerun_extra(Direction::Up, "./a", "/b", Some("me@host")),
            vec![
                "--direction",
                "up",
                "--local-path",
                "./a",
                "--remote-path",
                "/b",
                "--other-server",
                "me@host",
            ]
        );
    }
}

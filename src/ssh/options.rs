use std::borrow::Cow;
use std::path::PathBuf;

/// Local port forward set up instead of a shell
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tunnel {
    pub local_port: String,
    pub remote_server: String,
    pub remote_port: String,
}

impl Tunnel {
    fn forward_arg(&self) -> String {
        format!("{}:{}:{}", self.local_port, self.remote_server, self.remote_port)
    }
}

/// Everything needed to open SSH to an instance through an SSM session
#[derive(Debug, Clone)]
pub struct SshConnection {
    /// Binary the ProxyCommand re-invokes to start the SSM session
    pub program: String,
    pub identity_file: PathBuf,
    pub username: String,
    pub instance_id: String,
    pub aws_region: String,
    pub aws_profile: Option<String>,
    pub tunnel: Option<Tunnel>,
    pub verbose: bool,
}

fn is_shell_safe(c: char) -> bool {
    c.is_ascii_alphanumeric() || "-_=/,.+:@%".contains(c)
}

/// Quote an argument only when a shell would otherwise split or expand it
fn escape(arg: &str) -> Cow<'_, str> {
    if !arg.is_empty() && arg.chars().all(is_shell_safe) {
        return Cow::Borrowed(arg);
    }
    shell_escape::escape(Cow::Borrowed(arg))
}

impl SshConnection {
    fn aws_args(&self) -> Vec<String> {
        let mut args = Vec::new();
        if let Some(ref profile) = self.aws_profile {
            args.push("--aws-profile".to_string());
            args.push(profile.clone());
        }
        args.push("--aws-region".to_string());
        args.push(self.aws_region.clone());
        args
    }

    /// Prints the `aws ssm start-session` command for the instance, which
    /// `bash -c` then runs with its stdio wired to ssh.
    pub fn proxy_command(&self) -> String {
        let inner: Vec<String> = [
            self.program.as_str(),
            "aws:ssm:start-session",
            self.username.as_str(),
            self.instance_id.as_str(),
        ]
        .into_iter()
        .map(str::to_string)
        .chain(self.aws_args())
        .map(|arg| escape(&arg).into_owned())
        .collect();

        format!("ProxyCommand bash -c \"$({})\"", inner.join(" "))
    }

    pub fn options(&self) -> Vec<String> {
        let mut options = vec![
            "-o".to_string(),
            format!("IdentityFile {}", self.identity_file.display()),
            "-o".to_string(),
            "IdentitiesOnly yes".to_string(),
            "-o".to_string(),
            "GSSAPIAuthentication no".to_string(),
            "-o".to_string(),
            "PasswordAuthentication no".to_string(),
            "-o".to_string(),
            self.proxy_command(),
        ];

        if self.verbose {
            options.push("-vvv".to_string());
        }

        if let Some(ref tunnel) = self.tunnel {
            options.push("-N".to_string());
            options.push("-L".to_string());
            options.push(tunnel.forward_arg());
        }

        options
    }

    pub fn destination(&self) -> String {
        format!("{}@{}", self.username, self.instance_id)
    }

    pub fn argv(&self) -> Vec<String> {
        std::iter::once("ssh".to_string())
            .chain(self.options())
            .chain(std::iter::once(self.destination()))
            .collect()
    }

    /// The ssh command as a line that can be pasted into a shell
    pub fn display_command(&self) -> String {
        self.argv()
            .iter()
            .map(|arg| escape(arg).into_owned())
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// `user@instance:path`, as scp expects a remote location
    pub fn remote_location(&self, path: &str) -> String {
        format!("{}:{}", self.destination(), path)
    }

    /// scp through the same proxy, copying `from` to `to`
    pub fn scp_argv(&self, from: &str, to: &str) -> Vec<String> {
        std::iter::once("scp".to_string())
            .chain(self.options())
            .chain([from.to_string(), to.to_string()])
            .collect()
    }

    /// Arguments that reach the same target without prompting
    fn target_args(&self) -> Vec<String> {
        let mut args = vec![
            "--username".to_string(),
            self.username.clone(),
            "--instance-id".to_string(),
            self.instance_id.clone(),
        ];
        args.extend(self.aws_args());
        args
    }

    fn tunnel_args(&self) -> Vec<String> {
        match self.tunnel {
            Some(ref tunnel) => vec![
                "--tunnel".to_string(),
                "--tunnel-remote-server".to_string(),
                tunnel.remote_server.clone(),
                "--tunnel-remote-port".to_string(),
                tunnel.remote_port.clone(),
                "--tunnel-local-port".to_string(),
                tunnel.local_port.clone(),
            ],
            None => Vec::new(),
        }
    }

    /// `<program> <subcommand>` for this target followed by `extra`, shell-escaped
    pub fn rerun_command_with(&self, subcommand: &str, extra: &[String]) -> String {
        [self.program.clone(), subcommand.to_string()]
            .into_iter()
            .chain(self.target_args())
            .chain(extra.iter().cloned())
            .map(|arg| escape(&arg).into_owned())
            .collect::<Vec<_>>()
            .join(" ")
    }

    pub fn rerun_command(&self) -> String {
        self.rerun_command_with("aws:ssm:connect", &self.tunnel_args())
    }
}

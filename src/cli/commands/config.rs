use crate::aws::AwsClients;
use crate::checks;
use crate::config::{ResolvedConfig, SettingKey, Settings, PROJECT_FILE_NAME};
use crate::process::ProcessRunner;
use crate::{CliError, Result};

/// Binaries some command needs, with what needs them
const TOOLS: [(&str, &str); 8] = [
    ("aws", "all AWS commands"),
    ("session-manager-plugin", "aws:ssm:connect, aws:ecs:connect"),
    ("ssh", "aws:ssm:connect"),
    ("scp", "aws:ssm:copy"),
    ("ssh-keygen", "aws:ssm:*"),
    ("docker", "docker:*"),
    ("docker-compose", "docker:*"),
    ("bash", "aws:assume-role, aws:mfa:login"),
];

const SESSION_MANAGER_PLUGIN_URL: &str =
    "https://docs.aws.amazon.com/systems-manager/latest/userguide/session-manager-working-with-install-plugin.html";

fn display_or_unset(value: Option<&str>) -> &str {
    value.unwrap_or("(not set)")
}

pub fn show(config: &ResolvedConfig) -> Result<()> {
    let settings = Settings::load()?;

    println!("Settings file:");
    match Settings::config_path() {
        Some(path) => println!("  {}", path.display()),
        None => println!("  (no config directory available)"),
    }

    println!();
    println!("Saved settings:");
    for key in [SettingKey::Region, SettingKey::Profile, SettingKey::AccountId] {
        println!("  {:<12} {}", key.to_string(), display_or_unset(settings.get(key)));
    }

    println!();
    println!("Effective configuration (flags, NETSELLS_* env, {}, settings):", PROJECT_FILE_NAME);
    println!("  {:<20} {}", "aws-region", config.aws_region);
    println!("  {:<20} {}", "aws-profile", display_or_unset(config.aws_profile.as_deref()));
    println!("  {:<20} {}", "aws-account-id", config.aws_account_id);
    println!("  {:<20} {}", "tag", display_or_unset(config.tag.as_deref()));
    println!("  {:<20} {}", "tag-prefix", display_or_unset(config.tag_prefix.as_deref()));
    println!("  {:<20} {}", "environment", display_or_unset(config.environment.as_deref()));
    if !config.services.is_empty() {
        println!("  {:<20} {}", "services", config.services.join(", "));
    }
    println!("  {:<20} {}", "ecs-cluster", display_or_unset(config.ecs_cluster.as_deref()));
    println!("  {:<20} {}", "ecs-service", display_or_unset(config.ecs_service.as_deref()));
    println!(
        "  {:<20} {}",
        "ecs-task-definition",
        display_or_unset(config.ecs_task_definition.as_deref())
    );
    println!("  {:<20} {}", "s3-bucket-name", display_or_unset(config.s3_bucket_name.as_deref()));
    println!("  {:<20} {}", "editor", config.editor);

    Ok(())
}

pub fn set(key: SettingKey, value: &str) -> Result<()> {
    let mut settings = Settings::load()?;
    settings.set(key, value)?;
    settings.save()?;

    println!("Set {} to '{}'", key, value);
    Ok(())
}

pub fn unset(key: SettingKey) -> Result<()> {
    let mut settings = Settings::load()?;

    match settings.unset(key) {
        Some(previous) => {
            settings.save()?;
            println!("Removed {} (was '{}')", key, previous);
        }
        None => println!("{} was not set", key),
    }

    Ok(())
}

async fn tool_version(binary: &str) -> Option<String> {
    let output = ProcessRunner::new()
        .with_command([binary, "--version"])
        .with_failure_echo(false)
        .run()
        .await
        .ok()?;

    output.lines().next().map(|line| line.trim().to_string())
}

/// Report every prerequisite and fail if any is missing
pub async fn check(config: &ResolvedConfig) -> Result<()> {
    println!("Checking prerequisites...\n");

    let mut all_ok = true;

    for (binary, used_by) in TOOLS {
        print!("  {:<24}", binary);
        if checks::is_missing_binary(binary) {
            println!("MISSING (needed for {})", used_by);
            if binary == "session-manager-plugin" {
                println!("    Install from: {}", SESSION_MANAGER_PLUGIN_URL);
            }
            all_ok = false;
            continue;
        }

        match tool_version(binary).await {
            Some(version) if !version.is_empty() => println!("OK ({})", version),
            _ => println!("OK"),
        }
    }

    print!("  {:<24}", "AWS credentials");
    let clients = AwsClients::from_config(config).await;
    match clients.caller_arn().await {
        Ok(arn) => {
            println!("OK");
            println!("    Identity: {}", arn);
            println!("    Region: {}", clients.region);
        }
        Err(e) => {
            println!("MISSING/INVALID");
            println!("    {}", e);
            println!("    Configure with: aws configure");
            all_ok = false;
        }
    }

    println!();

    if all_ok {
        println!("All prerequisites met.");
        Ok(())
    } else {
        Err(CliError::Prerequisites(
            "Some prerequisites are not met".to_string(),
        ))
    }
}

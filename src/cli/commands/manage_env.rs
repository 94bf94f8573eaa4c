//! `aws:ecs:manage-env`: edit the `.env` files kept in an S3 bucket.

use std::path::Path;

use clap::Args;
use similar::{ChangeTag, TextDiff};
use tracing::{debug, info};

use crate::aws::{s3, AwsCli, AwsClients};
use crate::checks;
use crate::config::{ResolvedConfig, DEFAULT_EDITOR};
use crate::process::ProcessRunner;
use crate::ui::{create_spinner, Prompter};
use crate::{CliError, Result};

const ENV_EXTENSION: &str = ".env";

/// Role segment of the caller ARN allowed to delete files
const DELETING_ROLE: &str = "NetsellsSecurityOps";

#[derive(Args, Debug, Clone, Default)]
pub struct ManageEnvArgs {
    /// The S3 bucket holding the environment files
    #[arg(long)]
    pub s3_bucket_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum EnvAction {
    Edit(String),
    Create,
    Delete,
}

/// Menu entries: the files, then the actions
fn menu(files: &[String], can_delete: bool) -> Vec<String> {
    let mut entries = files.to_vec();
    entries.push("Create new file".to_string());
    if can_delete {
        entries.push("Delete file".to_string());
    }
    entries
}

fn action_for(index: usize, files: &[String]) -> EnvAction {
    match index.checked_sub(files.len()) {
        None => EnvAction::Edit(files[index].clone()),
        Some(0) => EnvAction::Create,
        Some(_) => EnvAction::Delete,
    }
}

/// Assumed-role ARNs look like `arn:aws:sts::1:assumed-role/<role>/<session>`
fn can_delete(caller_arn: &str) -> bool {
    caller_arn.split('/').nth(1) == Some(DELETING_ROLE)
}

fn env_files(keys: Vec<String>) -> Vec<String> {
    keys.into_iter()
        .filter(|key| key.ends_with(ENV_EXTENSION))
        .collect()
}

fn validate_file_name(name: &str) -> Result<String> {
    let name = name.trim();
    if name.len() <= ENV_EXTENSION.len() || !name.ends_with(ENV_EXTENSION) {
        return Err(CliError::InvalidEnvFile(name.to_string()));
    }
    Ok(name.to_string())
}

/// Changed lines prefixed with `-`/`+`, or `None` when nothing changed
fn render_changes(old: &str, new: &str) -> Option<String> {
    if old == new {
        return None;
    }

    let mut rendered = String::new();
    for change in TextDiff::from_lines(old, new).iter_all_changes() {
        let sign = match change.tag() {
            ChangeTag::Delete => "-",
            ChangeTag::Insert => "+",
            ChangeTag::Equal => continue,
        };
        rendered.push_str(sign);
        rendered.push_str(change.value().trim_end_matches('\n'));
        rendered.push('\n');
    }
    Some(rendered)
}

/// `$EDITOR` may carry arguments (`code --wait`)
fn editor_argv(editor: &str, path: &Path) -> Vec<String> {
    let mut argv: Vec<String> = editor.split_whitespace().map(str::to_string).collect();
    if argv.is_empty() {
        argv.push(DEFAULT_EDITOR.to_string());
    }
    argv.push(path.display().to_string());
    argv
}

async fn bucket_or_choose(
    aws: &AwsCli,
    bucket: Option<String>,
    prompter: &dyn Prompter,
) -> Result<String> {
    if let Some(bucket) = bucket {
        return Ok(bucket);
    }

    let buckets = s3::list_buckets(aws).await?;
    if buckets.is_empty() {
        return Err(CliError::NoEnvBucket);
    }
    let index = prompter.present_choice("Which bucket holds the environment files?", &buckets)?;
    Ok(buckets[index].clone())
}

async fn edit_file(
    aws: &AwsCli,
    bucket: &str,
    key: &str,
    existing: bool,
    editor: &str,
    prompter: &dyn Prompter,
) -> Result<()> {
    let original = if existing {
        let spinner = create_spinner(format!("Downloading {}...", key));
        let contents = s3::get_file(aws, bucket, key).await;
        spinner.finish_and_clear();
        contents?
    } else {
        String::new()
    };

    let workspace = tempfile::tempdir()?;
    let file_name = key.rsplit('/').next().unwrap_or(key);
    let path = workspace.path().join(file_name);
    std::fs::write(&path, &original)?;
    debug!(path = %path.display(), "Opening editor");

    ProcessRunner::new()
        .with_command(editor_argv(editor, &path))
        .interactive()
        .run()
        .await?;

    let edited = std::fs::read_to_string(&path)?;
    let Some(changes) = render_changes(&original, &edited) else {
        println!("No changes made.");
        return Ok(());
    };

    println!("{}", changes);
    if !prompter.confirm("Do you want to upload the changes?")? {
        println!("Changes discarded.");
        return Ok(());
    }

    s3::put_file(aws, &path, bucket, key).await?;
    info!(bucket, key, "Uploaded environment file");
    println!("Changes saved.");
    Ok(())
}

async fn delete_file(aws: &AwsCli, bucket: &str, files: &[String], prompter: &dyn Prompter) -> Result<()> {
    let index = prompter.present_choice("Which file do you want to delete?", files)?;
    let key = &files[index];

    if !prompter.confirm(&format!("Are you sure you want to delete {}?", key))? {
        return Ok(());
    }

    s3::delete_file(aws, bucket, key).await?;
    info!(bucket, key = key.as_str(), "Deleted environment file");
    println!("Deleted {}.", key);
    Ok(())
}

pub async fn execute(config: &ResolvedConfig, prompter: &dyn Prompter) -> Result<()> {
    let editor_binary = config.editor.split_whitespace().next().unwrap_or(DEFAULT_EDITOR);
    checks::require_binaries(&["aws", editor_binary])?;

    let aws = AwsCli::from_config(config);
    let clients = AwsClients::from_config(config).await;
    let caller_arn = clients.caller_arn().await?;

    let bucket = bucket_or_choose(&aws, config.s3_bucket_name.clone(), prompter).await?;

    let files = env_files(s3::list_keys(&aws, &bucket).await?);
    let allow_delete = can_delete(&caller_arn);
    let index = prompter.present_choice("Which file do you want to edit?", &menu(&files, allow_delete))?;

    match action_for(index, &files) {
        EnvAction::Edit(key) => edit_file(&aws, &bucket, &key, true, &config.editor, prompter).await,
        EnvAction::Create => {
            let name = prompter.ask("What is the name of the new file? (must end in .env)", &[])?;
            let key = validate_file_name(&name)?;
            edit_file(&aws, &bucket, &key, false, &config.editor, prompter).await
        }
        EnvAction::Delete => delete_file(&aws, &bucket, &files, prompter).await,
    }
}

use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// Spinner for waits on commands whose output isn't streamed.
/// Draws on stderr, so stdout stays clean for piping.
pub fn create_spinner(message: impl Into<String>) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    let style = ProgressStyle::default_spinner()
        .template("{spinner:.green} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner());
    spinner.set_style(style);
    spinner.set_message(message.into());
    spinner.enable_steady_tick(Duration::from_millis(100));
    spinner
}

mod prompt;
mod spinner;

pub use prompt::{Prompter, TerminalPrompter};
pub use spinner::create_spinner;

#[cfg(test)]
pub use prompt::ScriptedPrompter;

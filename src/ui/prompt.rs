use dialoguer::theme::ColorfulTheme;
use dialoguer::{Confirm, Input, Select};

use crate::{CliError, Result};

/// Interactive questions commands need answered.
///
/// Command logic takes `&dyn Prompter` so it can run without a terminal.
pub trait Prompter {
    /// Ask the user to pick one of `options`; returns the chosen index.
    fn present_choice(&self, prompt: &str, options: &[String]) -> Result<usize>;

    /// Ask for free text. `suggestions` are shown as hints, not enforced.
    fn ask(&self, prompt: &str, suggestions: &[&str]) -> Result<String>;

    /// Yes/no question, defaulting to no
    fn confirm(&self, prompt: &str) -> Result<bool>;
}

/// Prompter backed by the real terminal
#[derive(Debug, Default)]
pub struct TerminalPrompter;

impl Prompter for TerminalPrompter {
    fn present_choice(&self, prompt: &str, options: &[String]) -> Result<usize> {
        if options.is_empty() {
            return Err(CliError::NoChoices(prompt.to_string()));
        }

        Select::with_theme(&ColorfulTheme::default())
            .with_prompt(prompt)
            .items(options)
            .default(0)
            .interact_opt()
            .map_err(|_| CliError::Cancelled)?
            .ok_or(CliError::Cancelled)
    }

    fn ask(&self, prompt: &str, suggestions: &[&str]) -> Result<String> {
        let prompt = if suggestions.is_empty() {
            prompt.to_string()
        } else {
            format!("{} ({})", prompt, suggestions.join(", "))
        };

        let answer: String = Input::with_theme(&ColorfulTheme::default())
            .with_prompt(prompt)
            .allow_empty(true)
            .interact_text()
            .map_err(|_| CliError::Cancelled)?;

        Ok(answer.trim().to_string())
    }

    fn confirm(&self, prompt: &str) -> Result<bool> {
        Ok(Confirm::with_theme(&ColorfulTheme::default())
            .with_prompt(prompt)
            .default(false)
            .interact_opt()
            .map_err(|_| CliError::Cancelled)?
            .unwrap_or(false))
    }
}

/// Prompter that replays canned answers, for tests
#[cfg(test)]
pub struct ScriptedPrompter {
    choices: std::cell::RefCell<std::collections::VecDeque<usize>>,
    answers: std::cell::RefCell<std::collections::VecDeque<String>>,
    confirmations: std::cell::RefCell<std::collections::VecDeque<bool>>,
    pub asked: std::cell::RefCell<Vec<String>>,
}

#[cfg(test)]
impl ScriptedPrompter {
    pub fn new(choices: &[usize], answers: &[&str]) -> Self {
        Self {
            choices: std::cell::RefCell::new(choices.iter().copied().collect()),
            answers: std::cell::RefCell::new(answers.iter().map(|a| a.to_string()).collect()),
            confirmations: std::cell::RefCell::new(std::collections::VecDeque::new()),
            asked: std::cell::RefCell::new(Vec::new()),
        }
    }

    pub fn with_confirmations(self, confirmations: &[bool]) -> Self {
        self.confirmations
            .borrow_mut()
            .extend(confirmations.iter().copied());
        self
    }
}

#[cfg(test)]
impl Prompter for ScriptedPrompter {
    fn present_choice(&self, prompt: &str, options: &[String]) -> Result<usize> {
        self.asked.borrow_mut().push(prompt.to_string());
        if options.is_empty() {
            return Err(CliError::NoChoices(prompt.to_string()));
        }
        let choice = self.choices.borrow_mut().pop_front().ok_or(CliError::Cancelled)?;
        assert!(choice < options.len(), "scripted choice out of range");
        Ok(choice)
    }

    fn ask(&self, prompt: &str, _suggestions: &[&str]) -> Result<String> {
        self.asked.borrow_mut().push(prompt.to_string());
        self.answers.borrow_mut().pop_front().ok_or(CliError::Cancelled)
    }

    fn confirm(&self, prompt: &str) -> Result<bool> {
        self.asked.borrow_mut().push(prompt.to_string());
        self.confirmations
            .borrow_mut()
            .pop_front()
            .ok_or(CliError::Cancelled)
    }
}

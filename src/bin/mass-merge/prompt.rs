use anyhow::{Context, Result};
use dialoguer::{Confirm, MultiSelect, theme::ColorfulTheme};
use mass_merge::{GroupChoice, Selector};

/// Prompts on the terminal with `dialoguer`.
pub struct TerminalSelector {
    theme: ColorfulTheme,
    question: String,
}

impl TerminalSelector {
    pub fn new(question: impl Into<String>) -> Self {
        Self {
            theme: ColorfulTheme::default(),
            question: question.into(),
        }
    }
}

impl Selector for TerminalSelector {
    fn choose_groups(&mut self, choices: &[GroupChoice]) -> Result<Vec<String>> {
        if choices.is_empty() {
            return Ok(Vec::new());
        }

        let labels: Vec<&str> = choices.iter().map(|choice| choice.label.as_str()).collect();
        let picked = MultiSelect::with_theme(&self.theme)
            .with_prompt(&self.question)
            .items(&labels)
            .interact()
            .context("Failed to read group selection")?;

        Ok(picked
            .into_iter()
            .filter_map(|index| choices.get(index))
            .map(|choice| choice.key.clone())
            .collect())
    }

    fn confirm(&mut self, prompt: &str, default: bool) -> Result<bool> {
        Confirm::with_theme(&self.theme)
            .with_prompt(prompt)
            .default(default)
            .interact()
            .context("Failed to read confirmation")
    }
}

//! Select prompt that reports Ctrl+C instead of failing

use anyhow::Result;
use dialoguer::{Select, theme::ColorfulTheme};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

pub struct EnhancedSelect<'a> {
    prompt: String,
    items: Vec<String>,
    default: usize,
    theme: &'a ColorfulTheme,
    interrupted: Option<Arc<AtomicBool>>,
}

pub enum SelectResult {
    Selected(usize),
    Interrupted,
}

impl<'a> EnhancedSelect<'a> {
    pub fn new(theme: &'a ColorfulTheme) -> Self {
        Self {
            prompt: String::new(),
            items: Vec::new(),
            default: 0,
            theme,
            interrupted: None,
        }
    }

    pub fn with_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = prompt.into();
        self
    }

    pub fn items(mut self, items: &[impl ToString]) -> Self {
        self.items = items.iter().map(|item| item.to_string()).collect();
        self
    }

    pub fn default(mut self, index: usize) -> Self {
        self.default = index;
        self
    }

    pub fn with_interrupt(mut self, interrupted: Arc<AtomicBool>) -> Self {
        self.interrupted = Some(interrupted);
        self
    }

    pub fn interact(self) -> Result<SelectResult> {
        if let Some(interrupted) = &self.interrupted
            && interrupted.load(Ordering::SeqCst)
        {
            return Ok(SelectResult::Interrupted);
        }

        // Esc 与 Ctrl+C 都按中断处理
        match Select::with_theme(self.theme)
            .with_prompt(&self.prompt)
            .items(&self.items)
            .default(self.default)
            .interact_opt()
        {
            Ok(Some(selection)) => Ok(SelectResult::Selected(selection)),
            Ok(None) | Err(_) => Ok(SelectResult::Interrupted),
        }
    }
}

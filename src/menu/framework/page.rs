//! Page abstraction and shared context

use anyhow::Result;
use colored::*;
use gitea_deploy_common::{DeployConfig, EnvironmentProfile};
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use crate::menu::navigation::NavigationStack;
use crate::system::{
    CommandRunner, SystemProvider, SystemProviderFactory, press_any_key_to_with_interrupt,
};

/// What the page stack does after a page returns
pub enum PageResult {
    Navigate(Box<dyn Page>),
    Back,
    BackToRoot,
    Exit,
    Stay,
}

/// State shared by every page
pub struct PageContext {
    pub navigation: NavigationStack,
    pub config: DeployConfig,
    pub runner: Arc<dyn CommandRunner>,
    pub debug: bool,
    pub interrupted: Arc<AtomicBool>,
}

impl PageContext {
    pub fn new(
        config: DeployConfig,
        runner: Arc<dyn CommandRunner>,
        debug: bool,
        interrupted: Arc<AtomicBool>,
    ) -> Self {
        Self {
            navigation: NavigationStack::new(),
            config,
            runner,
            debug,
            interrupted,
        }
    }

    /// Provider for the host; detected per action
    pub fn provider(&self) -> Result<Box<dyn SystemProvider>> {
        SystemProviderFactory::detect(self.runner.clone(), &self.config.retry)
    }

    /// Environment profile, re-read so edits made outside the menu are seen
    pub fn profile(&self) -> Result<EnvironmentProfile> {
        Ok(EnvironmentProfile::load(&self.config.env_file)?)
    }
}

pub trait Page {
    fn title(&self) -> &str;

    fn render(&mut self, context: &mut PageContext) -> Result<PageResult>;

    fn on_enter(&mut self, context: &mut PageContext) {
        context.navigation.push(self.title());
    }

    fn on_leave(&mut self, context: &mut PageContext) {
        context.navigation.pop();
    }
}

/// Run an action, report its failure and wait for Enter
///
/// A failed action never ends the menu; the error chain is shown instead.
pub fn run_action(context: &PageContext, action: impl FnOnce() -> Result<()>) -> PageResult {
    if let Err(e) = action() {
        eprintln!("\n{} {:#}", "❌".red(), e);
    }
    if press_any_key_to_with_interrupt("continue", context.interrupted.clone()) {
        PageResult::Stay
    } else {
        PageResult::Back
    }
}

//! System check result structures

use colored::*;

/// Result of a single dependency check
#[derive(Debug, Clone)]
pub struct CheckItem {
    pub name: String,
    pub status: CheckStatus,
    pub message: String,
}

/// Status of a dependency check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckStatus {
    Ok,
    /// Missing but installed or handled later by the tool
    Warning,
    /// Precondition failure: the run cannot continue
    Error,
}

impl CheckItem {
    pub fn ok(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(name, CheckStatus::Ok, message)
    }

    pub fn warning(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(name, CheckStatus::Warning, message)
    }

    pub fn error(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(name, CheckStatus::Error, message)
    }

    fn new(name: impl Into<String>, status: CheckStatus, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status,
            message: message.into(),
        }
    }

    /// Get the status icon
    pub fn icon(&self) -> &'static str {
        match self.status {
            CheckStatus::Ok => "✅",
            CheckStatus::Warning => "⚠️ ",
            CheckStatus::Error => "❌",
        }
    }
}

/// Overall dependency check result
#[derive(Debug, Default)]
pub struct DependencyCheckResult {
    pub items: Vec<CheckItem>,
}

impl DependencyCheckResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_item(&mut self, item: CheckItem) {
        self.items.push(item);
    }

    pub fn all_critical_ok(&self) -> bool {
        self.errors().next().is_none()
    }

    pub fn errors(&self) -> impl Iterator<Item = &CheckItem> {
        self.items
            .iter()
            .filter(|item| item.status == CheckStatus::Error)
    }

    pub fn summary_message(&self) -> String {
        if self.all_critical_ok() {
            "🎉 All essential dependencies are satisfied!".to_string()
        } else {
            "❌ Some critical dependencies are missing!".to_string()
        }
    }

    /// Print every item followed by the summary
    pub fn print(&self) {
        for item in &self.items {
            println!("{} {}: {}", item.icon(), item.name.bold(), item.message);
        }
        println!();
        if self.all_critical_ok() {
            println!("{}", self.summary_message().bright_green().bold());
        } else {
            println!("{}", self.summary_message().bright_red().bold());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_errors_fail_the_check() {
        let mut result = DependencyCheckResult::new();
        result.add_item(CheckItem::ok("Platform", "linux-amd64"));
        result.add_item(CheckItem::warning("certbot", "installed on demand"));
        assert!(result.all_critical_ok());

        result.add_item(CheckItem::error("Environment file", "gitea.env not found"));
        assert!(!result.all_critical_ok());
        assert_eq!(result.errors().count(), 1);
        assert!(result.summary_message().contains("missing"));
    }
}

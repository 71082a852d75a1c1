//! Page content blocks

use colored::*;

use crate::system::DependencyCheckResult;

pub trait Component {
    fn render(&self);
}

/// Key/value lines grouped under bold section titles
#[derive(Default)]
pub struct ContentArea {
    lines: Vec<String>,
}

impl ContentArea {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_line(mut self, line: impl Into<String>) -> Self {
        self.lines.push(line.into());
        self
    }

    pub fn add_field(self, name: &str, value: impl std::fmt::Display) -> Self {
        let line = format!("  {:<14} {}", format!("{name}:").bold(), value);
        self.add_line(line)
    }

    pub fn add_section(mut self, title: impl Into<String>, lines: Vec<String>) -> Self {
        self.lines.push(format!("{}:", title.into()).bold().to_string());
        self.lines.extend(lines.into_iter().map(|line| format!("  {line}")));
        self.lines.push(String::new());
        self
    }
}

impl Component for ContentArea {
    fn render(&self) {
        for line in &self.lines {
            println!("{}", line);
        }
    }
}

pub struct DependencyCheckComponent {
    result: DependencyCheckResult,
}

impl DependencyCheckComponent {
    pub fn new(result: DependencyCheckResult) -> Self {
        Self { result }
    }
}

impl Component for DependencyCheckComponent {
    fn render(&self) {
        self.result.print();
    }
}

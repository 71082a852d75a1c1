//! Page layout: tool title, breadcrumb, hint, content

use colored::*;

use super::components::Component;
use super::screen::Screen;

pub const TOOL_TITLE: &str = "Gitea Deployment";

pub trait Layout {
    fn render(&self, components: LayoutComponents);
}

pub struct LayoutComponents<'a> {
    pub tool_title: String,
    pub page_title: Option<String>,
    pub operation_hint: Option<String>,
    pub content: Vec<Box<dyn Component + 'a>>,
}

impl<'a> LayoutComponents<'a> {
    pub fn new() -> Self {
        Self {
            tool_title: TOOL_TITLE.to_string(),
            page_title: None,
            operation_hint: None,
            content: Vec::new(),
        }
    }

    pub fn with_page_title(mut self, title: impl Into<String>) -> Self {
        self.page_title = Some(title.into());
        self
    }

    pub fn with_operation_hint(mut self, hint: impl Into<String>) -> Self {
        self.operation_hint = Some(hint.into());
        self
    }

    pub fn add_content<C: Component + 'a>(mut self, component: C) -> Self {
        self.content.push(Box::new(component));
        self
    }
}

pub struct StandardLayout;

impl Layout for StandardLayout {
    fn render(&self, components: LayoutComponents) {
        Screen::clear();

        // 工具标题 + 双线
        let title = &components.tool_title;
        println!("{}", title.green());
        println!("{}", "═".repeat(title.chars().count()).green());

        // 页面标题 + 单线
        if let Some(page_title) = &components.page_title {
            println!("{}", page_title.bright_white().bold());
            println!("{}", "─".repeat(page_title.chars().count()).bright_white());
        }

        if let Some(hint) = &components.operation_hint {
            println!("{}", hint.dimmed());
        }
        println!();

        for component in components.content {
            component.render();
        }
    }
}

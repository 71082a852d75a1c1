//! Main page

use anyhow::Result;

use super::{CertificatePage, DependenciesPage, ModePage, RegistrationPage, ServicePage};
use crate::menu::framework::{
    DefaultTheme, EnhancedSelect, Layout, LayoutComponents, Page, PageContext, PageResult,
    SelectResult, StandardLayout, Theme,
};

const OPTIONS: [&str; 6] = [
    "Change Domain / Mode",
    "Regenerate Certificate",
    "Toggle Open Registration",
    "Service Status",
    "Check Dependencies",
    "Exit",
];

pub struct MainPage {
    theme: DefaultTheme,
    layout: StandardLayout,
}

impl MainPage {
    pub fn new() -> Self {
        Self {
            theme: DefaultTheme::default(),
            layout: StandardLayout,
        }
    }
}

impl Page for MainPage {
    fn title(&self) -> &str {
        "Main"
    }

    fn render(&mut self, context: &mut PageContext) -> Result<PageResult> {
        self.layout.render(
            LayoutComponents::new()
                .with_page_title("Main")
                .with_operation_hint("Use ↑↓ to navigate, Enter to select, Ctrl+C to exit"),
        );

        let selection = EnhancedSelect::new(self.theme.dialoguer_theme())
            .with_prompt("Choose an action")
            .items(&OPTIONS)
            .with_interrupt(context.interrupted.clone())
            .interact()?;

        let next: Box<dyn Page> = match selection {
            SelectResult::Selected(0) => Box::new(ModePage::new()),
            SelectResult::Selected(1) => Box::new(CertificatePage::new()),
            SelectResult::Selected(2) => Box::new(RegistrationPage::new()),
            SelectResult::Selected(3) => Box::new(ServicePage::new()),
            SelectResult::Selected(4) => Box::new(DependenciesPage::new()),
            SelectResult::Selected(_) => {
                println!("👋 Goodbye!\n");
                return Ok(PageResult::Exit);
            }
            // 交给 MenuApplication 按页面栈处理
            SelectResult::Interrupted => return Ok(PageResult::Stay),
        };
        Ok(PageResult::Navigate(next))
    }
}

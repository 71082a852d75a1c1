//! Service status, recent log and restart

use anyhow::Result;
use colored::*;

use crate::install::wait_for_service;
use crate::menu::framework::{
    ContentArea, DefaultTheme, EnhancedSelect, Layout, LayoutComponents, Page, PageContext,
    PageResult, SelectResult, StandardLayout, Theme, run_action,
};
use crate::system::ServiceStatus;

const LOG_LINES: usize = 15;

pub struct ServicePage {
    theme: DefaultTheme,
    layout: StandardLayout,
}

impl ServicePage {
    pub fn new() -> Self {
        Self {
            theme: DefaultTheme::default(),
            layout: StandardLayout,
        }
    }
}

fn colored_status(status: &ServiceStatus) -> ColoredString {
    match status {
        ServiceStatus::Running => status.to_string().bright_green(),
        ServiceStatus::Activating => status.to_string().bright_yellow(),
        ServiceStatus::Failed(_) => status.to_string().bright_red(),
        _ => status.to_string().dimmed(),
    }
}

impl Page for ServicePage {
    fn title(&self) -> &str {
        "Service Status"
    }

    fn render(&mut self, context: &mut PageContext) -> Result<PageResult> {
        let provider = match context.provider() {
            Ok(provider) => provider,
            Err(e) => return Ok(run_action(context, || Err(e))),
        };
        let provider = provider.as_ref();
        let service = context.config.service.name.clone();
        let status = provider.service_status(&service);

        let log: Vec<String> = provider
            .service_logs(&service, LOG_LINES)
            .lines()
            .map(str::to_string)
            .collect();
        self.layout.render(
            LayoutComponents::new()
                .with_page_title(context.navigation.breadcrumb())
                .add_content(
                    ContentArea::new()
                        .add_field("Service", &service)
                        .add_field("Manager", format!("{:?}", provider.service_manager()))
                        .add_field("Status", colored_status(&status))
                        .add_line("")
                        .add_section("Recent log", log),
                ),
        );

        let selection = EnhancedSelect::new(self.theme.dialoguer_theme())
            .with_prompt("Action")
            .items(&["Restart service", "Refresh", "Back"])
            .with_interrupt(context.interrupted.clone())
            .interact()?;

        match selection {
            SelectResult::Selected(0) => {
                let result = run_action(context, || {
                    if status == ServiceStatus::Running {
                        provider.restart_service(&service)?;
                    } else {
                        provider.start_service(&service)?;
                    }
                    wait_for_service(provider, &context.config)
                });
                // 操作完成后回到本页面查看新状态
                Ok(match result {
                    PageResult::Back => PageResult::Stay,
                    other => other,
                })
            }
            SelectResult::Selected(1) => Ok(PageResult::Stay),
            SelectResult::Selected(_) => Ok(PageResult::Back),
            SelectResult::Interrupted => Ok(PageResult::Stay),
        }
    }
}

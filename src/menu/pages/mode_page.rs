//! Change the domain or deployment mode of a running install

use anyhow::Result;

use crate::install::change_mode;
use crate::menu::framework::{
    Layout, LayoutComponents, Page, PageContext, PageResult, StandardLayout, run_action,
};
use crate::system::ServiceStatus;

pub struct ModePage {
    layout: StandardLayout,
}

impl ModePage {
    pub fn new() -> Self {
        Self {
            layout: StandardLayout,
        }
    }
}

impl Page for ModePage {
    fn title(&self) -> &str {
        "Change Domain / Mode"
    }

    fn render(&mut self, context: &mut PageContext) -> Result<PageResult> {
        self.layout.render(
            LayoutComponents::new()
                .with_page_title(context.navigation.breadcrumb())
                .with_operation_hint(
                    "Re-issues the certificate and rewrites the [server] keys of app.ini",
                ),
        );

        Ok(run_action(context, || {
            let provider = context.provider()?;
            let provider = provider.as_ref();
            let mut profile = context.profile()?;
            let config = &context.config;

            let mode = change_mode(provider, config, &mut profile)?;

            let service = &config.service.name;
            if provider.service_status(service) == ServiceStatus::Running {
                provider.restart_service(service)?;
                println!("✅ Service '{}' restarted", service);
            } else {
                println!("ℹ️  Service '{}' is not running; start it to apply", service);
            }
            println!("🌐 {}", mode.root_url());
            Ok(())
        }))
    }
}

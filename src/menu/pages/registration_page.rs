//! Toggle self-registration (`[service] DISABLE_REGISTRATION`)

use anyhow::{Result, bail};
use dialoguer::Confirm;

use crate::install::{read_app_ini, registration_open, set_registration};
use crate::menu::framework::{
    ContentArea, DefaultTheme, Layout, LayoutComponents, Page, PageContext, PageResult,
    StandardLayout, Theme, run_action,
};
use crate::system::ServiceStatus;

pub struct RegistrationPage {
    theme: DefaultTheme,
    layout: StandardLayout,
}

impl RegistrationPage {
    pub fn new() -> Self {
        Self {
            theme: DefaultTheme::default(),
            layout: StandardLayout,
        }
    }
}

impl Page for RegistrationPage {
    fn title(&self) -> &str {
        "Toggle Open Registration"
    }

    fn render(&mut self, context: &mut PageContext) -> Result<PageResult> {
        let provider = match context.provider() {
            Ok(provider) => provider,
            Err(e) => return Ok(run_action(context, || Err(e))),
        };
        let current = match read_app_ini(provider.as_ref(), &context.config) {
            Ok(current) => current,
            Err(e) => return Ok(run_action(context, || Err(e))),
        };

        let mut content = ContentArea::new().add_field(
            "Config",
            context.config.paths.app_ini().display(),
        );
        if let Some(doc) = &current {
            let state = if registration_open(doc) { "open" } else { "closed" };
            content = content.add_field("Registration", state);
        }
        self.layout.render(
            LayoutComponents::new()
                .with_page_title(context.navigation.breadcrumb())
                .add_content(content),
        );

        let theme = self.theme.dialoguer_theme();
        Ok(run_action(context, || {
            let Some(doc) = current else {
                bail!("No app.ini found; install or configure Gitea first");
            };
            let open = !registration_open(&doc);
            let prompt = if open {
                "Allow anyone to register an account?"
            } else {
                "Disable self-registration?"
            };
            if !Confirm::with_theme(theme)
                .with_prompt(prompt)
                .default(true)
                .interact()?
            {
                println!("Unchanged");
                return Ok(());
            }

            let provider = provider.as_ref();
            set_registration(provider, &context.config, open)?;
            println!(
                "✅ Registration {}",
                if open { "opened" } else { "closed" }
            );

            let service = &context.config.service.name;
            if provider.service_status(service) == ServiceStatus::Running {
                provider.restart_service(service)?;
                println!("✅ Service '{}' restarted", service);
            }
            Ok(())
        }))
    }
}

//! Regenerate the certificate for the configured mode

use anyhow::Result;

use crate::install::regenerate_certificate;
use crate::menu::framework::{
    Layout, LayoutComponents, Page, PageContext, PageResult, StandardLayout, run_action,
};

pub struct CertificatePage {
    layout: StandardLayout,
}

impl CertificatePage {
    pub fn new() -> Self {
        Self {
            layout: StandardLayout,
        }
    }
}

impl Page for CertificatePage {
    fn title(&self) -> &str {
        "Regenerate Certificate"
    }

    fn render(&mut self, context: &mut PageContext) -> Result<PageResult> {
        self.layout.render(
            LayoutComponents::new()
                .with_page_title(context.navigation.breadcrumb())
                .with_operation_hint(format!(
                    "Certificate and key are written to {}",
                    context.config.paths.cert_dir.display()
                )),
        );

        Ok(run_action(context, || {
            let provider = context.provider()?;
            let profile = context.profile()?;
            regenerate_certificate(provider.as_ref(), &context.config, &profile)
        }))
    }
}

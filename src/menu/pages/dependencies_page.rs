//! Dependency check page

use anyhow::Result;

use crate::menu::framework::{
    DependencyCheckComponent, Layout, LayoutComponents, Page, PageContext, PageResult,
    StandardLayout,
};
use crate::system::{check_dependencies_data, press_any_key_to_with_interrupt};

pub struct DependenciesPage {
    layout: StandardLayout,
}

impl DependenciesPage {
    pub fn new() -> Self {
        Self {
            layout: StandardLayout,
        }
    }
}

impl Page for DependenciesPage {
    fn title(&self) -> &str {
        "Check Dependencies"
    }

    fn render(&mut self, context: &mut PageContext) -> Result<PageResult> {
        let result = check_dependencies_data(context.runner.as_ref(), &context.config, None);
        self.layout.render(
            LayoutComponents::new()
                .with_page_title(context.navigation.breadcrumb())
                .with_operation_hint("Checking platform, privileges and required tools...")
                .add_content(DependencyCheckComponent::new(result)),
        );

        if press_any_key_to_with_interrupt("continue", context.interrupted.clone()) {
            Ok(PageResult::Stay)
        } else {
            Ok(PageResult::Back)
        }
    }
}

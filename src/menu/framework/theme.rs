//! Prompt styling

use dialoguer::theme::ColorfulTheme;

pub trait Theme {
    fn dialoguer_theme(&self) -> &ColorfulTheme;
}

#[derive(Default)]
pub struct DefaultTheme {
    dialoguer: ColorfulTheme,
}

impl Theme for DefaultTheme {
    fn dialoguer_theme(&self) -> &ColorfulTheme {
        &self.dialoguer
    }
}

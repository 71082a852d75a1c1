//! Menu framework

pub mod components;
pub mod input;
pub mod layout;
pub mod page;
pub mod screen;
pub mod theme;

pub use components::{ContentArea, DependencyCheckComponent};
pub use input::{EnhancedSelect, SelectResult};
pub use layout::{Layout, LayoutComponents, StandardLayout};
pub use page::{Page, PageContext, PageResult, run_action};
pub use theme::{DefaultTheme, Theme};

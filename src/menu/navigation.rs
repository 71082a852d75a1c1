//! Breadcrumb stack for nested menu pages

/// Titles of the pages entered so far, root first
#[derive(Debug, Default)]
pub struct NavigationStack {
    titles: Vec<String>,
}

impl NavigationStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, title: &str) {
        self.titles.push(title.to_string());
    }

    /// Pop the current page, the root always stays
    pub fn pop(&mut self) -> bool {
        if self.titles.len() > 1 {
            self.titles.pop();
            true
        } else {
            false
        }
    }

    pub fn reset(&mut self) {
        self.titles.truncate(1);
    }

    /// `Main › Service` style path of the current page
    pub fn breadcrumb(&self) -> String {
        self.titles.join(" › ")
    }

    pub fn depth(&self) -> usize {
        self.titles.len()
    }
}

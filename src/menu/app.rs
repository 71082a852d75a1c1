//! Page stack driver

use super::framework::{Page, PageContext, PageResult};
use super::pages::MainPage;
use anyhow::Result;
use std::sync::atomic::Ordering;

/// Runs pages until the operator exits
pub struct MenuApplication {
    context: PageContext,
    page_stack: Vec<Box<dyn Page>>,
}

impl MenuApplication {
    pub fn new(context: PageContext) -> Self {
        Self {
            context,
            page_stack: vec![Box::new(MainPage::new())],
        }
    }

    pub fn run(&mut self) -> Result<()> {
        while let Some(mut current_page) = self.page_stack.pop() {
            current_page.on_enter(&mut self.context);
            let result = current_page.render(&mut self.context)?;
            current_page.on_leave(&mut self.context);

            // Ctrl+C: 主页面上退出，其他页面回到主页面
            if self.context.interrupted.swap(false, Ordering::SeqCst) {
                if self.context.debug {
                    println!(
                        "\nDEBUG: stack size {}, navigation depth {}",
                        self.page_stack.len(),
                        self.context.navigation.depth()
                    );
                }
                if self.page_stack.is_empty() {
                    println!("\n👋 Goodbye!\n");
                    break;
                }
                println!("\n🔙 Returning to main...");
                self.page_stack.truncate(1);
                self.context.navigation.reset();
                continue;
            }

            match result {
                PageResult::Navigate(next_page) => {
                    self.page_stack.push(current_page);
                    self.page_stack.push(next_page);
                }
                PageResult::Back => {
                    if self.page_stack.is_empty() {
                        break;
                    }
                }
                PageResult::BackToRoot => {
                    self.page_stack.truncate(1);
                    self.context.navigation.reset();
                }
                PageResult::Exit => {
                    self.page_stack.clear();
                    break;
                }
                PageResult::Stay => self.page_stack.push(current_page),
            }
        }

        Ok(())
    }
}

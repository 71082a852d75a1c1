//! Helper functions for interactive terminal input

use dialoguer::{Input, theme::ColorfulTheme};
use std::io::{self, Read, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Clear input buffer to prevent fast keypress from affecting next input
pub fn clear_input_buffer() {
    #[cfg(unix)]
    {
        use std::os::unix::io::AsRawFd;

        let stdin_fd = io::stdin().as_raw_fd();

        let flags = unsafe { libc::fcntl(stdin_fd, libc::F_GETFL) };
        if flags != -1 {
            unsafe { libc::fcntl(stdin_fd, libc::F_SETFL, flags | libc::O_NONBLOCK) };

            let mut buffer = [0u8; 1024];
            let mut stdin = io::stdin();
            while matches!(stdin.read(&mut buffer), Ok(n) if n > 0) {}

            unsafe { libc::fcntl(stdin_fd, libc::F_SETFL, flags) };
        }
    }

    #[cfg(not(unix))]
    {
        std::thread::sleep(std::time::Duration::from_millis(50));
    }
}

/// Wait for Enter, returns true when the wait was interrupted
pub fn press_any_key_to_with_interrupt(to: &str, interrupted: Arc<AtomicBool>) -> bool {
    if interrupted.load(Ordering::SeqCst) {
        return true;
    }

    clear_input_buffer();

    print!("\nPress Enter to {}...", to);
    let _ = io::stdout().flush();

    match Input::<String>::with_theme(&ColorfulTheme::default())
        .with_prompt("")
        .allow_empty(true)
        .interact()
    {
        Ok(_) => interrupted.load(Ordering::SeqCst),
        Err(_) => true,
    }
}

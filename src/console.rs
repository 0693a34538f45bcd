//! Line-oriented operator I/O.

use std::io::{self, BufRead, Write};

/// Where prompts go and answers come from.
pub trait Console {
    /// Show `message` and read one line, without its line terminator.
    /// `None` means end of input.
    fn prompt(&mut self, message: &str) -> Option<String>;

    /// Print one line of output.
    fn print(&mut self, line: &str);
}

/// The process's stdin/stdout.
#[derive(Debug, Default)]
pub struct Terminal;

impl Console for Terminal {
    fn prompt(&mut self, message: &str) -> Option<String> {
        let mut stdout = io::stdout().lock();
        let _ = write!(stdout, "{}", message);
        let _ = stdout.flush();
        drop(stdout);

        let mut line = String::new();
        match io::stdin().lock().read_line(&mut line) {
            Ok(0) | Err(_) => None,
            Ok(_) => Some(strip_line_ending(&line).to_string()),
        }
    }

    fn print(&mut self, line: &str) {
        println!("{}", line);
    }
}

/// Drop a trailing `\n` or `\r\n`, nothing else.
pub fn strip_line_ending(line: &str) -> &str {
    line.strip_suffix('\n')
        .map(|l| l.strip_suffix('\r').unwrap_or(l))
        .unwrap_or(line)
}

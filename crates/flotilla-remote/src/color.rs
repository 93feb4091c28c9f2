//! Per-hostname console colors for streamed remote output.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Mutex, PoisonError};

use colored::{Color, Colorize};

const PALETTE: [Color; 6] = [
    Color::Blue,
    Color::Red,
    Color::Green,
    Color::Cyan,
    Color::Magenta,
    Color::Yellow,
];

/// Which remote stream a line came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputStream {
    Stdout,
    Stderr,
}

impl fmt::Display for OutputStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputStream::Stdout => write!(f, "stdout"),
            OutputStream::Stderr => write!(f, "stderr"),
        }
    }
}

/// Hostname → color table shared by every worker streaming output.
///
/// The first lookup of a hostname fixes its color for the rest of the run.
#[derive(Debug, Default)]
pub struct ColorRegistry {
    assigned: Mutex<HashMap<String, Color>>,
}

impl ColorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn color_for(&self, hostname: &str) -> Color {
        let mut assigned = self.assigned.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(color) = assigned.get(hostname) {
            return *color;
        }
        let color = PALETTE[assigned.len() % PALETTE.len()];
        assigned.insert(hostname.to_string(), color);
        color
    }

    /// Format one output line: `<host> [stdout] ===> <line>`.
    pub fn paint(&self, hostname: &str, stream: OutputStream, line: &str) -> String {
        let color = self.color_for(hostname);
        format!("{hostname} [{stream}] ===> {line}")
            .color(color)
            .to_string()
    }

    pub fn print_line(&self, hostname: &str, stream: OutputStream, line: &str) {
        println!("{}", self.paint(hostname, stream, line));
    }

    pub fn len(&self) -> usize {
        self.assigned
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    #[test]
    fn first_assignment_wins() {
        let colors = ColorRegistry::new();
        let a = colors.color_for("a.example.org");
        let b = colors.color_for("b.example.org");
        assert_eq!(a, Color::Blue);
        assert_eq!(b, Color::Red);
        assert_eq!(colors.color_for("a.example.org"), a);
        assert_eq!(colors.len(), 2);
    }

    #[test]
    fn palette_wraps_around() {
        let colors = ColorRegistry::new();
        for i in 0..PALETTE.len() {
            colors.color_for(&format!("host-{i}"));
        }
        assert_eq!(colors.color_for("host-6"), Color::Blue);
    }

    #[test]
    fn paint_contains_prefix() {
        colored::control::set_override(false);
        let colors = ColorRegistry::new();
        let line = colors.paint("n1", OutputStream::Stderr, "oops");
        assert_eq!(line, "n1 [stderr] ===> oops");
    }

    #[test]
    fn concurrent_lookups_agree() {
        let colors = Arc::new(ColorRegistry::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let colors = Arc::clone(&colors);
                std::thread::spawn(move || {
                    (0..20)
                        .map(|i| colors.color_for(&format!("host-{i}")))
                        .collect::<Vec<_>>()
                })
            })
            .collect();
        let seen: Vec<Vec<Color>> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        for other in &seen[1..] {
            assert_eq!(other, &seen[0]);
        }
        assert_eq!(colors.len(), 20);
    }
}

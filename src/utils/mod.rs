//! Utilities module for logging, error types and display helpers

pub mod error;
pub mod logging;

// Re-export main types for convenience
pub use error::{CropDocError, ErrorCategory, Result};
pub use logging::init_logging;

/// Format a duration in milliseconds in a human-readable way
pub fn format_millis(ms: f64) -> String {
    if ms < 1000.0 {
        format!("{:.1} ms", ms)
    } else {
        format!("{:.2} s", ms / 1000.0)
    }
}

/// Format a probability as a percentage with a progress bar
pub fn format_progress_bar(progress: f64, width: usize) -> String {
    let filled = (progress.clamp(0.0, 1.0) * width as f64).round() as usize;
    let empty = width.saturating_sub(filled);

    format!(
        "[{}{}] {:.1}%",
        "█".repeat(filled),
        "░".repeat(empty),
        progress * 100.0
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_millis() {
        assert_eq!(format_millis(12.34), "12.3 ms");
        assert_eq!(format_millis(2500.0), "2.50 s");
    }

    #[test]
    fn test_format_progress_bar() {
        let bar = format_progress_bar(0.5, 10);
        assert!(bar.contains("50.0%"));
        assert!(bar.contains("█████"));
    }
}

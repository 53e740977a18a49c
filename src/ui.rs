use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;
use termion::color;

/// Right-aligned, colored status lines plus spinners and progress bars for
/// the long phases.
pub struct StatusUI;

impl StatusUI {
    fn line<C: color::Color>(fg: color::Fg<C>, category: &str, message: &str) {
        println!(
            "{}{:>12}{} {}",
            fg,
            category,
            color::Fg(color::Reset),
            message
        );
    }

    pub fn info(message: &str) {
        Self::line(color::Fg(color::Blue), "Info", message);
    }

    pub fn success(message: &str) {
        Self::line(color::Fg(color::Green), "Done", message);
    }

    pub fn warning(message: &str) {
        Self::line(color::Fg(color::Yellow), "Warning", message);
    }

    pub fn error(message: &str) {
        Self::line(color::Fg(color::Red), "Error", message);
    }

    pub fn spinner(message: &str) -> ProgressBar {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{prefix:.blue.bold} {spinner:.blue} {msg}")
                .expect("Invalid spinner template")
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
        );
        pb.set_prefix(format!("{:>12}", "Working"));
        pb.set_message(message.to_string());
        pb.enable_steady_tick(Duration::from_millis(80));
        pb
    }

    /// Progress bar for the parallel lookup phase.
    pub fn lookup_progress(total: u64) -> ProgressBar {
        let pb = ProgressBar::new(total);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{prefix:.blue.bold} [{bar:30}] {pos}/{len} notes ({msg})")
                .expect("Invalid progress template")
                .progress_chars("=> "),
        );
        pb.set_prefix(format!("{:>12}", "Resolving"));
        pb.set_message("starting...");
        pb
    }

    pub fn finish_spinner_success(pb: ProgressBar, message: &str) {
        pb.finish_and_clear();
        Self::success(message);
    }

    pub fn finish_spinner_warning(pb: ProgressBar, message: &str) {
        pb.finish_and_clear();
        Self::warning(message);
    }
}

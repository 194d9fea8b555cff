use indicatif::{ProgressBar, ProgressStyle};

/// Create a spinner for indeterminate progress operations
pub fn create_spinner(msg: &str) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
    );
    spinner.set_message(msg.to_string());
    spinner.enable_steady_tick(std::time::Duration::from_millis(100));
    spinner
}

/// Create a progress bar counting `unit` items (courses, files)
pub fn create_progress_bar(total: u64, prefix: &str, unit: &str) -> ProgressBar {
    let bar = ProgressBar::new(total);
    let template = format!(
        "{{prefix:.bold}} [{{bar:40.cyan/blue}}] {{pos}}/{{len}} {} ({{eta}}) {{wide_msg}}",
        unit
    );
    bar.set_style(
        ProgressStyle::default_bar()
            .template(&template)
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("━━╸"),
    );
    bar.set_prefix(prefix.to_string());
    bar
}

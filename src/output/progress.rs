use indicatif::{ProgressBar, ProgressStyle};
use log::info;
use std::io::{self, IsTerminal};
use std::time::Duration;

const PREFIX: &str = "[gransync]";

/// Spinner for waits of unknown length, such as the document listing.
pub fn create_spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template(&format!("{} {{spinner}} {{msg}}", PREFIX))
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

/// Per-document progress. Draws a bar when stderr is a TTY; otherwise
/// messages go to the log instead.
pub struct SyncProgress {
    bar: Option<ProgressBar>,
}

impl SyncProgress {
    pub fn new(total: u64) -> Self {
        let bar = (total > 0 && io::stderr().is_terminal()).then(|| {
            let pb = ProgressBar::new(total);
            pb.set_style(
                ProgressStyle::default_bar()
                    .template(&format!(
                        "{} {{pos}}/{{len}} [{{bar:30}}] {{elapsed}}, ~{{eta}} left {{msg}}",
                        PREFIX
                    ))
                    .unwrap_or_else(|_| ProgressStyle::default_bar())
                    .progress_chars("=> "),
            );
            pb
        });
        Self { bar }
    }

    /// Show which document is being worked on.
    pub fn begin(&self, title: &str) {
        if let Some(ref pb) = self.bar {
            pb.set_message(title.to_string());
        }
    }

    /// Print a line above the bar, or log it when there is no bar.
    pub fn println(&self, msg: &str) {
        match self.bar {
            Some(ref pb) => pb.println(format!("{} {}", PREFIX, msg)),
            None => info!("{}", msg),
        }
    }

    pub fn inc(&self) {
        if let Some(ref pb) = self.bar {
            pb.inc(1);
        }
    }

    pub fn finish(&self) {
        if let Some(ref pb) = self.bar {
            pb.finish_and_clear();
        }
    }
}

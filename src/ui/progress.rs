use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// Progress bar for one stage run; hidden when stdout is not a terminal,
/// in which case item lines go straight to stdout instead.
pub struct StageProgress {
    pb: ProgressBar,
    visible: bool,
}

impl StageProgress {
    pub fn new(stage: &str, total: usize) -> Self {
        let visible = console::Term::stdout().is_term();
        let pb = if visible {
            let pb = ProgressBar::new(total as u64);
            if let Ok(style) = ProgressStyle::with_template(
                "[{elapsed_precise}] {bar:40.cyan/blue} {pos:>7}/{len:7} {msg}",
            ) {
                pb.set_style(style.progress_chars("##-"));
            }
            pb.set_message(stage.to_string());
            pb.enable_steady_tick(Duration::from_millis(250));
            pb
        } else {
            ProgressBar::hidden()
        };
        Self { pb, visible }
    }

    pub fn set_message(&self, msg: &str) {
        self.pb.set_message(msg.to_string());
    }

    /// Print a line above the bar without tearing it
    pub fn println(&self, line: &str) {
        if self.visible {
            self.pb.println(line);
        } else {
            println!("{}", line);
        }
    }

    pub fn inc(&self) {
        self.pb.inc(1);
    }

    pub fn finish(&self) {
        self.pb.finish_and_clear();
    }
}

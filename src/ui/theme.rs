use owo_colors::Style;
use std::sync::OnceLock;

static THEME: OnceLock<Theme> = OnceLock::new();

/// One style per kind of line the pipeline prints
#[derive(Debug, Clone)]
pub struct Theme {
    pub heading: Style,
    pub done: Style,
    pub skipped: Style,
    pub failed: Style,
    pub warning: Style,
    /// Quota pause notices
    pub pause: Style,
    /// `[local/total][global/total]` prefix of item lines
    pub position: Style,
    /// Keys of `key: value` lines and other secondary text
    pub label: Style,
}

impl Theme {
    /// Colors only when stdout is a terminal; piped runs stay greppable
    pub fn detect() -> Self {
        Self::new(console::Term::stdout().is_term())
    }

    pub fn new(colored: bool) -> Self {
        if !colored {
            return Self {
                heading: Style::new(),
                done: Style::new(),
                skipped: Style::new(),
                failed: Style::new(),
                warning: Style::new(),
                pause: Style::new(),
                position: Style::new(),
                label: Style::new(),
            };
        }
        Self {
            heading: Style::new().cyan().bold(),
            done: Style::new().green(),
            skipped: Style::new().bright_black(),
            failed: Style::new().red().bold(),
            warning: Style::new().yellow().bold(),
            pause: Style::new().yellow().italic(),
            position: Style::new().blue().dimmed(),
            label: Style::new().white().dimmed(),
        }
    }
}

pub fn theme() -> &'static Theme {
    THEME.get_or_init(Theme::detect)
}

use crate::ui::{theme, Icons};
use owo_colors::OwoColorize;

pub fn header(text: &str) {
    println!("{} {}", Icons::ROCKET, text.style(theme().heading.clone()));
}

pub fn success(label: &str) {
    println!("{} {}", Icons::CHECK, label.style(theme().done.clone()));
}

pub fn error(label: &str) {
    eprintln!("{} {}", Icons::CROSS, label.style(theme().failed.clone()));
}

pub fn warn(label: &str) {
    eprintln!("{} {}", Icons::WARN, label.style(theme().warning.clone()));
}

pub fn info(label: &str, value: &str) {
    println!(
        "{} {}: {}",
        Icons::INFO,
        label.style(theme().label.clone()),
        value
    );
}

pub fn section(title: &str) {
    println!();
    println!("━{}━", title.style(theme().heading.clone()));
}

pub fn timing(elapsed: &str) {
    println!("{} {}", Icons::CLOCK.style(theme().label.clone()), elapsed);
}

/// Quota pause notice, printed before the fetcher blocks
pub fn pause(until: &str, seconds: i64) {
    eprintln!(
        "{} {}",
        Icons::HOURGLASS,
        format!("Pausing until {} ({} seconds)", until, seconds).style(theme().pause.clone())
    );
}

pub fn item_done(position: &str, item: &str, detail: &str) -> String {
    format!(
        "{} {} {} {}",
        position.style(theme().position.clone()),
        Icons::CHECK,
        item,
        detail.style(theme().done.clone())
    )
}

pub fn item_skipped(position: &str, item: &str, reason: &str) -> String {
    format!(
        "{} {} {} {}",
        position.style(theme().position.clone()),
        Icons::SKIP,
        item,
        reason.style(theme().skipped.clone())
    )
}

pub fn item_failed(position: &str, item: &str, message: &str) -> String {
    format!(
        "{} {} {} {}",
        position.style(theme().position.clone()),
        Icons::CROSS,
        item,
        message.style(theme().failed.clone())
    )
}

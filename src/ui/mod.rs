pub mod icons;
pub mod output;
pub mod progress;
pub mod table;
pub mod theme;

pub use icons::Icons;
pub use output::{
    error, header, info, item_done, item_failed, item_skipped, pause, section, success,
    timing, warn,
};
pub use progress::StageProgress;
pub use table::{summary_table, TableBuilder};
pub use theme::{theme, Theme};

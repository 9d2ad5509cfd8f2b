use crate::runner::RunSummary;
use tabled::{settings::Style, Table, Tabled};

#[derive(Tabled)]
pub struct TableRow {
    #[tabled(rename = "Metric")]
    pub metric: String,
    #[tabled(rename = "Value")]
    pub value: String,
}

pub struct TableBuilder {
    rows: Vec<TableRow>,
}

impl Default for TableBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TableBuilder {
    pub fn new() -> Self {
        Self { rows: Vec::new() }
    }

    pub fn add_row(&mut self, label: &str, value: &str) {
        self.rows.push(TableRow {
            metric: label.to_string(),
            value: value.to_string(),
        });
    }

    pub fn build(&self) -> String {
        if self.rows.is_empty() {
            return String::new();
        }

        Table::new(&self.rows).with(Style::rounded()).to_string()
    }
}

/// Render the per-run outcome counts
pub fn summary_table(stage: &str, summary: &RunSummary) -> String {
    let mut builder = TableBuilder::new();
    builder.add_row("Stage", stage);
    builder.add_row("Visited", &summary.visited.to_string());
    builder.add_row("Done", &summary.done.to_string());
    builder.add_row("Skipped", &summary.skipped.to_string());
    builder.add_row("Failed", &summary.failed.to_string());
    builder.build()
}

//! Line counter adapter (`scc --by-file --format=csv`)

use crate::process::run_captured;
use crate::{Error, Result};
use std::path::Path;
use std::process::Command;

/// Per-file counts as reported by the line counter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileCount {
    /// File name relative to the counted directory
    pub name: String,
    /// Physical lines
    pub lines: i64,
    /// Lines of code
    pub code: i64,
}

/// Counts lines for every file in a directory
pub trait LineCounter {
    fn count(&self, dir: &Path) -> Result<Vec<FileCount>>;
}

/// `scc` run as an external process
pub struct SccCounter {
    program: String,
}

impl SccCounter {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl LineCounter for SccCounter {
    fn count(&self, dir: &Path) -> Result<Vec<FileCount>> {
        let mut command = Command::new(&self.program);
        command.args(["--by-file", "--format=csv"]).current_dir(dir);
        let stdout = run_captured(&mut command, &self.program)?;
        parse_scc_csv(&String::from_utf8_lossy(&stdout))
    }
}

/// Split one CSV row, honouring double-quoted fields (`""` is a literal quote)
fn split_row(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut field = String::new();
    let mut quoted = false;
    let mut chars = line.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '"' if quoted && chars.peek() == Some(&'"') => {
                field.push('"');
                chars.next();
            }
            '"' => quoted = !quoted,
            ',' if !quoted => fields.push(std::mem::take(&mut field).trim().to_string()),
            _ => field.push(c),
        }
    }
    fields.push(field.trim().to_string());
    fields
}

fn column(header: &[String], name: &str) -> Option<usize> {
    header.iter().position(|h| h == name)
}

/// Parse the CSV report. The file path is taken from `Provider` (the full
/// location) when present, otherwise from `Filename`.
pub fn parse_scc_csv(report: &str) -> Result<Vec<FileCount>> {
    let mut lines = report.lines().filter(|l| !l.trim().is_empty());
    let header = match lines.next() {
        Some(h) => split_row(h),
        None => return Ok(Vec::new()),
    };

    let path_col = column(&header, "Provider")
        .or_else(|| column(&header, "Filename"))
        .ok_or_else(|| Error::Report("no file column in header".to_string()))?;
    let lines_col = column(&header, "Lines")
        .ok_or_else(|| Error::Report("no Lines column in header".to_string()))?;
    let code_col = column(&header, "Code")
        .ok_or_else(|| Error::Report("no Code column in header".to_string()))?;

    let mut counts = Vec::new();
    for (i, line) in lines.enumerate() {
        let fields = split_row(line);
        let field = |col: usize| {
            fields
                .get(col)
                .map(String::as_str)
                .ok_or_else(|| Error::Report(format!("row {} is too short", i + 1)))
        };
        let number = |col: usize| -> Result<i64> {
            let raw = field(col)?;
            raw.parse()
                .map_err(|_| Error::Report(format!("row {}: not a count: {:?}", i + 1, raw)))
        };

        let path = field(path_col)?;
        let name = Path::new(path)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| Error::Report(format!("row {}: bad path {:?}", i + 1, path)))?;
        counts.push(FileCount {
            name,
            lines: number(lines_col)?,
            code: number(code_col)?,
        });
    }
    Ok(counts)
}

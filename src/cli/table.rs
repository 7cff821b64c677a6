//! Table formatting for CLI list commands
//!
//! Commands collect rows of plain strings; the output format decides how
//! they are rendered. `auto` and `md` use tabled, the rest are line-oriented
//! for piping.

use console::style;
use tabled::{builder::Builder, settings::Style};

use crate::cli::helpers::escape_csv;
use crate::cli::OutputFormat;

/// Rows of a list command
#[derive(Debug, Clone, Default)]
pub struct Table {
    headers: Vec<&'static str>,
    rows: Vec<Vec<String>>,
}

impl Table {
    pub fn new(headers: &[&'static str]) -> Self {
        Self {
            headers: headers.to_vec(),
            rows: Vec::new(),
        }
    }

    pub fn push(&mut self, row: Vec<String>) {
        self.rows.push(row);
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Render the table; the first column is the id column
    pub fn render(&self, format: OutputFormat) -> String {
        match format {
            OutputFormat::Tsv => self.delimited("\t", |s| s.to_string()),
            OutputFormat::Csv => self.delimited(",", escape_csv),
            OutputFormat::Id => self
                .rows
                .iter()
                .filter_map(|r| r.first())
                .map(|id| format!("{}\n", id))
                .collect(),
            _ => {
                let mut builder = Builder::default();
                builder.push_record(self.headers.iter().copied());
                for row in &self.rows {
                    builder.push_record(row.iter().map(String::as_str));
                }
                format!("{}\n", builder.build().with(Style::markdown()))
            }
        }
    }

    /// Print the table followed by a count line for human formats
    pub fn print(&self, format: OutputFormat, noun: &str, quiet: bool) {
        print!("{}", self.render(format));
        if matches!(format, OutputFormat::Auto | OutputFormat::Md) && !quiet {
            println!();
            println!("{} {}(s) found", style(self.rows.len()).cyan(), noun);
        }
    }

    fn delimited(&self, sep: &str, cell: impl Fn(&str) -> String) -> String {
        let mut out = String::new();
        let header: Vec<String> = self.headers.iter().map(|h| cell(h)).collect();
        out.push_str(&header.join(sep));
        out.push('\n');
        for row in &self.rows {
            let cells: Vec<String> = row.iter().map(|c| cell(c)).collect();
            out.push_str(&cells.join(sep));
            out.push('\n');
        }
        out
    }
}

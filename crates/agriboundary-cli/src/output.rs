use console::style;
use serde::Serialize;
use std::fmt::Display;
use tabled::{settings::Style, Table, Tabled};

use crate::errors::CliError;

/// Output format mode
#[derive(Debug, Clone, Copy)]
pub enum OutputFormat {
    Human,
    Json,
}

pub struct OutputWriter {
    format: OutputFormat,
}

impl OutputWriter {
    pub fn new(json: bool) -> Self {
        Self {
            format: if json {
                OutputFormat::Json
            } else {
                OutputFormat::Human
            },
        }
    }

    pub fn success(&self, message: impl Display) {
        match self.format {
            OutputFormat::Human => {
                println!("{} {}", style("✓").green().bold(), message);
            }
            OutputFormat::Json => {}
        }
    }

    pub fn info(&self, message: impl Display) {
        match self.format {
            OutputFormat::Human => {
                println!("{} {}", style("ℹ").blue().bold(), message);
            }
            OutputFormat::Json => {}
        }
    }

    pub fn warning(&self, message: impl Display) {
        match self.format {
            OutputFormat::Human => {
                eprintln!("{} {}", style("⚠").yellow().bold(), message);
            }
            OutputFormat::Json => {
                let output = serde_json::json!({
                    "status": "warning",
                    "message": message.to_string(),
                });
                eprintln!("{}", output);
            }
        }
    }

    /// Structured error on stderr, for `--json` runs
    pub fn error_details(&self, error: &CliError) {
        match self.format {
            OutputFormat::Human => error.display(),
            OutputFormat::Json => {
                let output = serde_json::json!({
                    "status": "error",
                    "message": error.message,
                    "stage": error.stage.map(|s| s.to_string()),
                    "context": error.context,
                    "suggestions": error.suggestions,
                });
                eprintln!("{}", output);
            }
        }
    }

    pub fn table<T: Tabled>(&self, data: impl IntoIterator<Item = T>) {
        let data: Vec<T> = data.into_iter().collect();
        if data.is_empty() {
            println!("{}", style("(no data)").dim());
        } else {
            let mut table = Table::new(data);
            table.with(Style::rounded());
            println!("{}", table);
        }
    }

    /// Human output goes through `human`; JSON output wraps `data` in a status envelope
    pub fn result<T: Serialize>(&self, data: T, human: impl FnOnce(&T)) -> anyhow::Result<()> {
        match self.format {
            OutputFormat::Human => human(&data),
            OutputFormat::Json => {
                let output = serde_json::json!({
                    "status": "success",
                    "data": data,
                });
                println!("{}", serde_json::to_string_pretty(&output)?);
            }
        }
        Ok(())
    }

    pub fn kv(&self, key: impl Display, value: impl Display) {
        println!("{}: {}", style(key).bold(), value);
    }

    pub fn section(&self, title: impl Display) {
        println!("\n{}", style(title).bold().underlined());
    }

    pub fn is_json(&self) -> bool {
        matches!(self.format, OutputFormat::Json)
    }
}

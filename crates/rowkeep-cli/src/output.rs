//! Output formatting for CLI
//!
//! Provides consistent output formatting across all commands:
//! - Human-readable default output
//! - JSON output (--json flag)
//! - Quiet mode for scripting (--quiet flag)

use serde::Serialize;
use serde_json::json;

use rowkeep_core::types::value_as_string;
use rowkeep_core::{TableDump, TableVersion, Value};

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable output (default)
    Human,
    /// JSON output
    Json,
    /// Quiet mode - minimal output
    Quiet,
}

impl OutputFormat {
    /// Create format from CLI flags
    pub fn from_flags(json: bool, quiet: bool) -> Self {
        if quiet {
            OutputFormat::Quiet
        } else if json {
            OutputFormat::Json
        } else {
            OutputFormat::Human
        }
    }
}

/// One managed table as listed by `status` and `tables`
#[derive(Debug, Clone, Serialize)]
pub struct TableSummary {
    pub name: String,
    pub version: i32,
    /// `None` when the table is recorded but missing from the file
    pub rows: Option<i64>,
}

impl TableSummary {
    pub fn new(version: &TableVersion, rows: Option<i64>) -> Self {
        Self {
            name: version.table_name().to_string(),
            version: version.version(),
            rows,
        }
    }
}

/// Output helper for consistent formatting
pub struct Output {
    /// The output format
    pub format: OutputFormat,
}

impl Output {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Print the managed tables
    pub fn print_tables(&self, tables: &[TableSummary]) {
        match self.format {
            OutputFormat::Human => {
                if tables.is_empty() {
                    println!("No managed tables.");
                    return;
                }
                let width = tables.iter().map(|t| t.name.len()).max().unwrap_or(0);
                for table in tables {
                    let rows = table
                        .rows
                        .map(|n| n.to_string())
                        .unwrap_or_else(|| "missing".to_string());
                    println!(
                        "{:<width$} | v{} | {} row(s)",
                        table.name,
                        table.version,
                        rows,
                        width = width
                    );
                }
                println!("\n{} table(s)", tables.len());
            }
            OutputFormat::Json => {
                println!("{:#}", json!(tables));
            }
            OutputFormat::Quiet => {
                for table in tables {
                    println!("{}", table.name);
                }
            }
        }
    }

    /// Print every row of a table
    pub fn print_dump(&self, table: &str, dump: &TableDump) {
        match self.format {
            OutputFormat::Human => {
                if dump.rows.is_empty() {
                    println!("No rows in {}.", table);
                    return;
                }
                println!("{}", dump.columns.join(" | "));
                for row in &dump.rows {
                    let cells: Vec<String> = row.iter().map(render_cell).collect();
                    println!("{}", cells.join(" | "));
                }
                println!("\n{} row(s)", dump.rows.len());
            }
            OutputFormat::Json => {
                let rows: Vec<serde_json::Value> = dump
                    .rows
                    .iter()
                    .map(|row| {
                        let object: serde_json::Map<String, serde_json::Value> = dump
                            .columns
                            .iter()
                            .cloned()
                            .zip(row.iter().map(to_json))
                            .collect();
                        serde_json::Value::Object(object)
                    })
                    .collect();
                println!("{:#}", json!({ "table": table, "rows": rows }));
            }
            OutputFormat::Quiet => {
                println!("{}", dump.rows.len());
            }
        }
    }

    /// Print a success message
    pub fn success(&self, message: &str) {
        match self.format {
            OutputFormat::Human => println!("✓ {}", message),
            OutputFormat::Json => {
                println!(
                    "{}",
                    json!({"status": "success", "message": message})
                );
            }
            OutputFormat::Quiet => {}
        }
    }

    /// Check if we should prompt for confirmation
    pub fn should_prompt(&self) -> bool {
        self.format == OutputFormat::Human
    }
}

/// Human rendering of one cell
fn render_cell(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::Blob(bytes) => format!("<{} bytes>", bytes.len()),
        other => truncate(&value_as_string(other), 40),
    }
}

fn to_json(value: &Value) -> serde_json::Value {
    match value {
        Value::Null => serde_json::Value::Null,
        Value::Integer(i) => json!(i),
        Value::Real(f) => json!(f),
        Value::Text(s) => json!(s),
        Value::Blob(bytes) => json!(bytes),
    }
}

/// Truncate a string to max length, adding "..." if truncated
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len - 3).collect();
        format!("{}...", kept)
    }
}

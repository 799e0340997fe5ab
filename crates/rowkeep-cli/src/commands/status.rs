//! Status command handler

use std::path::Path;

use anyhow::{Context, Result};
use serde_json::json;

use rowkeep_core::Database;

use crate::commands::table::summarize;
use crate::output::{Output, OutputFormat};

/// Show status information
pub fn show(db: &Database, path: &Path, output: &Output) -> Result<()> {
    let tables = summarize(db)?;
    let size = std::fs::metadata(path)
        .with_context(|| format!("Failed to read database file: {:?}", path))?
        .len();
    let rows: i64 = tables.iter().filter_map(|t| t.rows).sum();

    match output.format {
        OutputFormat::Json => {
            println!(
                "{:#}",
                json!({
                    "database": path,
                    "size": size,
                    "tables": tables,
                    "total_rows": rows
                })
            );
        }
        OutputFormat::Quiet => {
            println!("{}", path.display());
        }
        OutputFormat::Human => {
            println!("Rowkeep Status");
            println!("==============");
            println!();
            println!("Database:");
            println!("  Location: {}", path.display());
            println!("  Size:     {}", human_size(size));
            println!();
            println!("Contents:");
            println!("  Tables: {}", tables.len());
            println!("  Rows:   {}", rows);
            for table in &tables {
                match table.rows {
                    Some(n) => println!("    {} (v{}): {}", table.name, table.version, n),
                    None => println!("    {} (v{}): missing", table.name, table.version),
                }
            }
        }
    }

    Ok(())
}

/// Format a byte count for humans
fn human_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} {}", bytes, UNITS[0])
    } else {
        format!("{:.1} {}", size, UNITS[unit])
    }
}

//! Table command handlers

use std::io::{self, IsTerminal, Write};

use anyhow::{bail, Context, Result};

use rowkeep_core::{Database, PersistenceError, VERSION_TABLE};

use crate::output::{Output, TableSummary};

/// Version record and row count of every managed table
pub fn summarize(db: &Database) -> Result<Vec<TableSummary>> {
    let versions = db.versions().context("Failed to read version records")?;
    versions
        .iter()
        .map(|version| {
            let rows = match db.count_rows(version.table_name()) {
                Ok(rows) => Some(rows),
                Err(PersistenceError::Database(_)) => None,
                Err(e) => return Err(e.into()),
            };
            Ok(TableSummary::new(version, rows))
        })
        .collect()
}

/// List managed tables
pub fn list(db: &Database, output: &Output) -> Result<()> {
    let tables = summarize(db)?;
    output.print_tables(&tables);
    Ok(())
}

/// Show every row of a managed table
pub fn show(db: &Database, table: &str, output: &Output) -> Result<()> {
    require_managed(db, table, true)?;
    let dump = db
        .dump_table(table)
        .with_context(|| format!("Failed to read table {}", table))?;
    output.print_dump(table, &dump);
    Ok(())
}

/// Drop a managed table and its version record
pub fn drop_table(db: &Database, table: &str, yes: bool, output: &Output) -> Result<()> {
    require_managed(db, table, false)?;

    if output.should_prompt() && !yes {
        let rows = db.count_rows(table).unwrap_or(0);
        println!("Drop table: {} ({} row(s))", table, rows);
        if !confirm("Are you sure?")? {
            println!("Cancelled.");
            return Ok(());
        }
    }

    db.drop_table(table)
        .with_context(|| format!("Failed to drop table {}", table))?;

    output.success(&format!("Dropped table: {}", table));

    Ok(())
}

fn require_managed(db: &Database, table: &str, allow_registry: bool) -> Result<()> {
    if table == VERSION_TABLE {
        if allow_registry {
            return Ok(());
        }
        bail!("'{}' holds the version records and cannot be dropped", table);
    }

    if db.stored_version(table)?.is_none() {
        bail!(
            "Table '{}' is not managed by rowkeep\nRun `rowkeep tables` to list managed tables",
            table
        );
    }
    Ok(())
}

/// Ask a yes/no question on the terminal; non-interactive input means no
fn confirm(prompt: &str) -> Result<bool> {
    if !io::stdin().is_terminal() {
        return Ok(false);
    }

    print!("{} [y/N] ", prompt);
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;

    let input = input.trim().to_lowercase();
    Ok(input == "y" || input == "yes")
}

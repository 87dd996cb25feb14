use super::snapshot::{SnapshotColumn, SnapshotTable, SnapshotWriter};
use crate::{error::SomaResult, types::format_date};
use rusqlite::{params_from_iter, types::Value, Connection};
use std::path::Path;

/// Mirrors a table into a single-table SQLite file.
pub struct SqliteSnapshotWriter;

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

impl SnapshotWriter for SqliteSnapshotWriter {
    fn name(&self) -> &'static str { "sqlite" }

    fn extension(&self) -> &'static str { "sqlite" }

    fn write(&self, table: &SnapshotTable, path: &Path) -> SomaResult<()> {
        // Wholesale: never merge into an older mirror.
        if path.exists() {
            std::fs::remove_file(path)?;
        }
        let mut conn = Connection::open(path)?;

        let column_defs = table
            .columns
            .iter()
            .map(|(name, col)| {
                let ty = match col {
                    SnapshotColumn::Date(_) | SnapshotColumn::Text(_) => "TEXT",
                    SnapshotColumn::Number(_) => "REAL",
                };
                format!("{} {ty} NOT NULL", quote_ident(name))
            })
            .collect::<Vec<_>>()
            .join(", ");
        let placeholders = (1..=table.columns.len())
            .map(|i| format!("?{i}"))
            .collect::<Vec<_>>()
            .join(", ");
        let table_name = quote_ident(table.name);

        let tx = conn.transaction()?;
        tx.execute_batch(&format!("CREATE TABLE {table_name} ({column_defs});"))?;
        {
            let mut stmt = tx.prepare(&format!("INSERT INTO {table_name} VALUES ({placeholders})"))?;
            for row in 0..table.row_count() {
                let values = table.columns.iter().map(|(_, col)| match col {
                    SnapshotColumn::Date(v)   => Value::Text(format_date(v[row])),
                    SnapshotColumn::Text(v)   => Value::Text(v[row].clone()),
                    SnapshotColumn::Number(v) => Value::Real(v[row]),
                });
                stmt.execute(params_from_iter(values))?;
            }
        }
        tx.commit()?;
        Ok(())
    }
}

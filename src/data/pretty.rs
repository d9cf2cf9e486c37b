// Human-readable table rendering, for debugging only
// Author: Gabriel Demetrios Lafis

use super::{Table, Value};

/// Render a table as an aligned text grid.
///
/// Debug aid only; the output format is not part of the data contract.
pub fn render_table(table: &Table, max_rows: usize) -> String {
    let num_rows = table.len().min(max_rows);

    let mut cells: Vec<Vec<String>> = Vec::with_capacity(num_rows + 1);
    cells.push(table.schema.field_names());

    for row_index in 0..num_rows {
        let row = table
            .columns
            .iter()
            .map(|column| match &column.values[row_index] {
                Value::Null => "NULL".to_string(),
                value => value.to_display_string(),
            })
            .collect();
        cells.push(row);
    }

    let num_columns = table.num_columns();
    let mut widths = vec![0usize; num_columns];
    for row in &cells {
        for (i, cell) in row.iter().enumerate() {
            widths[i] = widths[i].max(cell.chars().count());
        }
    }

    let mut out = String::new();

    for (line_index, row) in cells.iter().enumerate() {
        for (i, cell) in row.iter().enumerate() {
            if i > 0 {
                out.push_str(" | ");
            }
            out.push_str(cell);
            for _ in cell.chars().count()..widths[i] {
                out.push(' ');
            }
        }
        out.push('\n');

        if line_index == 0 {
            for (i, width) in widths.iter().enumerate() {
                if i > 0 {
                    out.push_str("-+-");
                }
                out.push_str(&"-".repeat(*width));
            }
            out.push('\n');
        }
    }

    if table.len() > num_rows {
        out.push_str(&format!("... {} more rows\n", table.len() - num_rows));
    }

    out
}

impl Table {
    /// Print up to `max_rows` rows of the table to stdout
    pub fn show(&self, max_rows: usize) {
        print!("{}", render_table(self, max_rows));
    }
}

//! Text rendering for tool results.
//!
//! Query results are rendered like the MySQL command-line client. Column
//! widths use display width, so CJK text stays aligned.

use crate::db::types::display_value;
use crate::models::QueryResult;
use serde_json::Value as JsonValue;
use unicode_width::UnicodeWidthStr;

/// Render an executed statement the way the MySQL CLI would.
pub fn format_result(result: &QueryResult) -> String {
    if result.has_result_set() {
        return format_as_table(result);
    }
    let secs = seconds(result.execution_time_ms);
    if result.rows_affected > 0 {
        let row_text = if result.rows_affected == 1 { "row" } else { "rows" };
        format!(
            "Query OK, {} {} affected ({:.2} sec)",
            result.rows_affected, row_text, secs
        )
    } else {
        format!("Empty set ({:.2} sec)", secs)
    }
}

fn seconds(ms: u64) -> f64 {
    ms as f64 / 1000.0
}

pub fn format_as_table(result: &QueryResult) -> String {
    let columns = &result.columns;
    if columns.is_empty() {
        return format!("Empty set ({:.2} sec)", seconds(result.execution_time_ms));
    }

    let cells: Vec<Vec<String>> = result
        .rows
        .iter()
        .map(|row| row.iter().map(display_value).collect())
        .collect();

    let mut widths: Vec<usize> = columns.iter().map(|c| c.name.width()).collect();
    for row in &cells {
        for (i, cell) in row.iter().enumerate().take(widths.len()) {
            widths[i] = widths[i].max(cell.width());
        }
    }

    let separator: String = widths
        .iter()
        .map(|w| format!("+{}", "-".repeat(w + 2)))
        .collect::<String>()
        + "+\n";

    let mut output = String::new();
    output.push_str(&separator);
    let header: String = columns
        .iter()
        .zip(&widths)
        .map(|(col, w)| format!("| {} ", pad(&col.name, *w, Align::Center)))
        .collect::<String>()
        + "|\n";
    output.push_str(&header);
    output.push_str(&separator);

    for (row, values) in cells.iter().zip(&result.rows) {
        let line: String = widths
            .iter()
            .enumerate()
            .map(|(i, w)| {
                let text = row.get(i).map(String::as_str).unwrap_or("NULL");
                let align = if matches!(values.get(i), Some(JsonValue::Number(_))) {
                    Align::Right
                } else {
                    Align::Left
                };
                format!("| {} ", pad(text, *w, align))
            })
            .collect::<String>()
            + "|\n";
        output.push_str(&line);
    }
    output.push_str(&separator);

    let row_count = result.row_count();
    let row_text = if row_count == 1 { "row" } else { "rows" };
    output.push_str(&format!(
        "{} {} in set ({:.2} sec)",
        row_count,
        row_text,
        seconds(result.execution_time_ms)
    ));
    output
}

#[derive(Clone, Copy)]
enum Align {
    Left,
    Right,
    Center,
}

/// Pad by display width; `format!` width counts chars, not columns.
fn pad(text: &str, width: usize, align: Align) -> String {
    let fill = width.saturating_sub(text.width());
    match align {
        Align::Left => format!("{}{}", text, " ".repeat(fill)),
        Align::Right => format!("{}{}", " ".repeat(fill), text),
        Align::Center => {
            let left = fill / 2;
            format!("{}{}{}", " ".repeat(left), text, " ".repeat(fill - left))
        }
    }
}

//! Pipe table rendering.

use crate::types::Table;

/// Render a table as a GitHub-flavored Markdown pipe table.
///
/// Tables without a header promote their first row. Rows are padded with empty cells to
/// the widest row. Returns an empty string for a table with no cells at all.
pub fn render_table(table: &Table) -> String {
    let mut rows = table.rows.iter();
    let header = match &table.header {
        Some(header) => header.clone(),
        None => match rows.next() {
            Some(first) => first.clone(),
            None => return String::new(),
        },
    };
    let body: Vec<&Vec<String>> = rows.collect();

    let width = body
        .iter()
        .map(|row| row.len())
        .chain(std::iter::once(header.len()))
        .max()
        .unwrap_or(0)
        .max(1);

    let mut lines = Vec::with_capacity(body.len() + 2);
    lines.push(render_row(&header, width));
    lines.push(format!("|{}", " --- |".repeat(width)));
    for row in body {
        lines.push(render_row(row, width));
    }
    lines.join("\n")
}

fn render_row(cells: &[String], width: usize) -> String {
    let mut line = String::from("|");
    for index in 0..width {
        let cell = cells.get(index).map(|cell| escape_cell(cell)).unwrap_or_default();
        line.push(' ');
        line.push_str(&cell);
        line.push_str(" |");
    }
    line
}

/// Escape pipes and fold the cell onto one line.
pub fn escape_cell(cell: &str) -> String {
    cell.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .replace('|', "\\|")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(cells: &[&str]) -> Vec<String> {
        cells.iter().map(|c| c.to_string()).collect()
    }

    #[test]
    fn test_render_with_header() {
        let table = Table::new(
            Some(strings(&["Name", "Qty"])),
            vec![strings(&["apple", "3"]), strings(&["pear", "10"])],
        );
        assert_eq!(
            render_table(&table),
            "| Name | Qty |\n| --- | --- |\n| apple | 3 |\n| pear | 10 |"
        );
    }

    #[test]
    fn test_first_row_promoted() {
        let table = Table::new(None, vec![strings(&["h1", "h2"]), strings(&["a", "b"])]);
        assert_eq!(render_table(&table), "| h1 | h2 |\n| --- | --- |\n| a | b |");
    }

    #[test]
    fn test_escaping_and_padding() {
        let table = Table::new(
            Some(strings(&["a|b"])),
            vec![strings(&["line one\nline two", "extra"])],
        );
        assert_eq!(
            render_table(&table),
            "| a\\|b |  |\n| --- | --- |\n| line one line two | extra |"
        );
    }

    #[test]
    fn test_empty_table() {
        assert_eq!(render_table(&Table::default()), "");
    }
}

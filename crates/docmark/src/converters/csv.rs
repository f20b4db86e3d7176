//! CSV and TSV converter.

use crate::Result;
use crate::converters::decode_text;
use crate::core::context::ConversionContext;
use crate::core::formats;
use crate::plugins::{Converter, ConverterDescriptor, FormatMatcher, Plugin};
use crate::types::{Block, InputDocument, Intermediate, Table};
use async_trait::async_trait;
use std::sync::Arc;

/// Renders delimited text as a single table whose first record is the header.
pub struct CsvConverter;

impl CsvConverter {
    pub fn new() -> Self {
        Self
    }

    pub fn descriptor() -> ConverterDescriptor {
        ConverterDescriptor::new(Arc::new(Self::new()), FormatMatcher::formats([formats::CSV, formats::TSV]))
    }
}

impl Default for CsvConverter {
    fn default() -> Self {
        Self::new()
    }
}

impl Plugin for CsvConverter {
    fn name(&self) -> &str {
        "csv"
    }

    fn version(&self) -> String {
        env!("CARGO_PKG_VERSION").to_string()
    }

    fn description(&self) -> &str {
        "Converts CSV and TSV files into a Markdown table"
    }
}

#[async_trait]
impl Converter for CsvConverter {
    async fn convert(&self, document: &InputDocument, _context: &ConversionContext) -> Result<Intermediate> {
        let text = decode_text(document.bytes());
        let delimiter = delimiter_for(document, &text);

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .delimiter(delimiter)
            .from_reader(text.as_bytes());

        let mut records: Vec<Vec<String>> = Vec::new();
        for record in reader.records() {
            let record = record?;
            let cells: Vec<String> = record.iter().map(|cell| cell.trim().to_string()).collect();
            if cells.iter().any(|cell| !cell.is_empty()) {
                records.push(cells);
            }
        }

        let mut output = Intermediate::new();
        if records.is_empty() {
            return Ok(output);
        }

        let header = records.remove(0);
        let column_count = records.iter().map(Vec::len).chain(std::iter::once(header.len())).max().unwrap_or(0);
        output.insert_metadata("row_count", records.len());
        output.insert_metadata("column_count", column_count);
        output.push(Block::Table(Table::new(Some(header), records)));
        Ok(output)
    }
}

/// Tab for `.tsv` files and tab-separated content types, otherwise whichever of comma,
/// semicolon or tab occurs most often in the first line.
fn delimiter_for(document: &InputDocument, text: &str) -> u8 {
    let declared_tsv = document
        .content_type()
        .and_then(formats::format_for_mime)
        .is_some_and(|format| format == formats::TSV);
    if declared_tsv || document.extension().as_deref() == Some("tsv") {
        return b'\t';
    }

    let first_line = text.lines().next().unwrap_or_default();
    [b',', b';', b'\t']
        .into_iter()
        .max_by_key(|candidate| (first_line.bytes().filter(|b| b == candidate).count(), *candidate == b','))
        .unwrap_or(b',')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::converters::test_context;

    fn table_of(output: &Intermediate) -> &Table {
        match &output.blocks[0] {
            Block::Table(table) => table,
            other => panic!("expected table, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_csv_becomes_table() {
        let document = InputDocument::new(b"name,qty\napple,3\n\"pear, green\",10\n".to_vec(), "fruit.csv");
        let output = CsvConverter::new().convert(&document, &test_context()).await.unwrap();

        let table = table_of(&output);
        assert_eq!(table.header.as_deref(), Some(&["name".to_string(), "qty".to_string()][..]));
        assert_eq!(table.rows[1], vec!["pear, green".to_string(), "10".to_string()]);
        assert_eq!(output.metadata["row_count"], 2);
    }

    #[tokio::test]
    async fn test_tsv_by_extension() {
        let document = InputDocument::new(b"a\tb\n1\t2,5\n".to_vec(), "data.tsv");
        let output = CsvConverter::new().convert(&document, &test_context()).await.unwrap();
        assert_eq!(table_of(&output).rows[0], vec!["1".to_string(), "2,5".to_string()]);
    }

    #[tokio::test]
    async fn test_semicolon_detected() {
        let document = InputDocument::new(b"a;b;c\n1;2;3\n".to_vec(), "data.csv");
        let output = CsvConverter::new().convert(&document, &test_context()).await.unwrap();
        assert_eq!(table_of(&output).rows[0].len(), 3);
    }

    #[tokio::test]
    async fn test_ragged_rows_are_kept() {
        let document = InputDocument::new(b"a,b\n1\n2,3,4\n".to_vec(), "data.csv");
        let output = CsvConverter::new().convert(&document, &test_context()).await.unwrap();
        assert_eq!(output.metadata["column_count"], 3);
    }

    #[tokio::test]
    async fn test_empty_csv_is_empty() {
        let document = InputDocument::new(b"\n , \n".to_vec(), "data.csv");
        let output = CsvConverter::new().convert(&document, &test_context()).await.unwrap();
        assert!(output.is_empty());
    }
}

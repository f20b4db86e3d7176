//! Canonical form for Markdown text.
//!
//! [`normalize_markdown`] is idempotent: feeding its output back in returns the same
//! string. The document is split into blocks (paragraphs, headings, tables, fenced code)
//! which are re-emitted separated by exactly one blank line.

use crate::core::config::NormalizeOptions;

const TAB_WIDTH: usize = 4;

#[derive(Debug, PartialEq)]
enum Block {
    Paragraph(Vec<String>),
    Heading(String),
    Table(Vec<String>),
    Fence(Vec<String>),
}

struct Fence {
    marker: char,
    len: usize,
}

/// Normalize Markdown text.
///
/// - line endings become `\n`
/// - fenced code passes through verbatim (unclosed fences are closed)
/// - table rows (`|` lines) keep their inner spacing
/// - ATX headings are clamped to `max_heading_level` and never skip a level downwards;
///   the first heading is level 1
/// - other lines keep leading indentation (tabs expanded) and collapse inner whitespace
/// - blocks are separated by one blank line, the output ends with a single `\n`
pub fn normalize_markdown(input: &str, options: &NormalizeOptions) -> String {
    let text = input.replace("\r\n", "\n").replace('\r', "\n");
    let max_level = options.max_heading_level.clamp(1, 6) as usize;

    let mut blocks: Vec<Block> = Vec::new();
    let mut previous_level: Option<usize> = None;
    let mut lines = text.split('\n').peekable();

    while let Some(line) = lines.next() {
        let trimmed = line.trim();

        if trimmed.is_empty() {
            close_open_block(&mut blocks);
            continue;
        }

        if let Some(fence) = fence_opener(line) {
            let mut fenced = vec![line.trim_end().to_string()];
            let mut closed = false;
            for content in lines.by_ref() {
                if is_fence_closer(content, &fence) {
                    fenced.push(content.trim_end().to_string());
                    closed = true;
                    break;
                }
                fenced.push(content.to_string());
            }
            if !closed {
                while fenced.len() > 1 && fenced.last().is_some_and(|l| l.trim().is_empty()) {
                    fenced.pop();
                }
                fenced.push(fence.marker.to_string().repeat(fence.len));
            }
            blocks.push(Block::Fence(fenced));
            continue;
        }

        if trimmed.starts_with('|') {
            match blocks.last_mut() {
                Some(Block::Table(rows)) if !rows.is_empty() => rows.push(trimmed.to_string()),
                _ => blocks.push(Block::Table(vec![trimmed.to_string()])),
            }
            continue;
        }

        if let Some((hashes, heading_text)) = atx_heading(trimmed) {
            let mut level = hashes.min(max_level);
            level = match previous_level {
                None => 1,
                Some(previous) => level.min(previous + 1),
            };
            previous_level = Some(level);

            let mut heading = "#".repeat(level);
            if !heading_text.is_empty() {
                heading.push(' ');
                heading.push_str(&heading_text);
            }
            blocks.push(Block::Heading(heading));
            continue;
        }

        let normalized = normalize_text_line(line);
        match blocks.last_mut() {
            Some(Block::Paragraph(paragraph)) if !paragraph.is_empty() => paragraph.push(normalized),
            _ => blocks.push(Block::Paragraph(vec![normalized])),
        }
    }

    let rendered: Vec<String> = blocks
        .into_iter()
        .filter_map(|block| match block {
            Block::Paragraph(lines) | Block::Table(lines) | Block::Fence(lines) => {
                (!lines.is_empty()).then(|| lines.join("\n"))
            }
            Block::Heading(heading) => Some(heading),
        })
        .collect();

    if rendered.is_empty() {
        return String::new();
    }

    let mut output = rendered.join("\n\n");
    output.push('\n');
    output
}

/// Blank lines end paragraphs and tables; an empty sentinel marks the boundary so the
/// next line starts a new block.
fn close_open_block(blocks: &mut Vec<Block>) {
    match blocks.last() {
        Some(Block::Paragraph(lines)) | Some(Block::Table(lines)) if !lines.is_empty() => {
            blocks.push(Block::Paragraph(Vec::new()));
        }
        _ => {}
    }
}

fn fence_opener(line: &str) -> Option<Fence> {
    let trimmed = line.trim_start();
    let marker = trimmed.chars().next().filter(|c| *c == '`' || *c == '~')?;
    let len = trimmed.chars().take_while(|c| *c == marker).count();
    if len < 3 {
        return None;
    }
    // Backtick fences cannot carry backticks in their info string.
    if marker == '`' && trimmed[len..].contains('`') {
        return None;
    }
    Some(Fence { marker, len })
}

fn is_fence_closer(line: &str, fence: &Fence) -> bool {
    let trimmed = line.trim();
    let len = trimmed.chars().take_while(|c| *c == fence.marker).count();
    len >= fence.len && len == trimmed.chars().count()
}

/// Returns the hash count and the cleaned heading text of an ATX heading.
fn atx_heading(trimmed: &str) -> Option<(usize, String)> {
    let hashes = trimmed.chars().take_while(|c| *c == '#').count();
    if hashes == 0 || hashes > 6 {
        return None;
    }

    let rest = &trimmed[hashes..];
    if !rest.is_empty() && !rest.starts_with(char::is_whitespace) {
        return None;
    }

    let mut text = collapse_whitespace(rest);
    loop {
        let without_hashes = text.trim_end_matches('#');
        if without_hashes.len() == text.len() {
            break;
        }
        if without_hashes.is_empty() || without_hashes.ends_with(' ') {
            text = without_hashes.trim_end().to_string();
        } else {
            break;
        }
    }

    Some((hashes, text))
}

fn normalize_text_line(line: &str) -> String {
    let content_start = line.len() - line.trim_start().len();
    let (indent, content) = line.split_at(content_start);

    let mut result = String::with_capacity(line.len());
    for c in indent.chars() {
        if c == '\t' {
            result.push_str(&" ".repeat(TAB_WIDTH));
        } else {
            result.push(' ');
        }
    }
    result.push_str(&collapse_whitespace(content));
    result
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn normalize(input: &str) -> String {
        normalize_markdown(input, &NormalizeOptions::default())
    }

    #[test]
    fn test_line_endings_and_trailing_newline() {
        assert_eq!(normalize("a\r\nb\rc"), "a\nb\nc\n");
        assert_eq!(normalize(""), "");
        assert_eq!(normalize("\n\n  \n"), "");
    }

    #[test]
    fn test_whitespace_collapse_keeps_indentation() {
        assert_eq!(normalize("  a   b\t c   "), "  a b c\n");
        assert_eq!(normalize("\t- item"), "    - item\n");
    }

    #[test]
    fn test_blank_line_runs_collapse() {
        assert_eq!(normalize("\n\nfirst\n\n\n\nsecond\n\n"), "first\n\nsecond\n");
    }

    #[test]
    fn test_heading_levels_are_remapped() {
        let input = "### Intro\ntext\n##### Deep\n## Back\n####### not a heading";
        assert_eq!(
            normalize(input),
            "# Intro\n\ntext\n\n## Deep\n\n## Back\n\n####### not a heading\n"
        );
    }

    #[test]
    fn test_heading_clamped_to_max_level() {
        let options = NormalizeOptions {
            max_heading_level: 2,
            ..Default::default()
        };
        let output = normalize_markdown("# A\n## B\n### C\n#### D", &options);
        assert_eq!(output, "# A\n\n## B\n\n## C\n\n## D\n");
    }

    #[test]
    fn test_heading_closing_sequence_removed() {
        assert_eq!(normalize("#   Title   ##"), "# Title\n");
        assert_eq!(normalize("# C#"), "# C#\n");
        assert_eq!(normalize("# a # #"), "# a\n");
        assert_eq!(normalize("#hashtag"), "#hashtag\n");
        assert_eq!(normalize("# #"), "#\n");
    }

    #[test]
    fn test_fenced_code_is_verbatim() {
        let input = "text\n```rust\nfn  main()  {\n\n\n    x  \n}\n```\nafter";
        assert_eq!(
            normalize(input),
            "text\n\n```rust\nfn  main()  {\n\n\n    x  \n}\n```\n\nafter\n"
        );
    }

    #[test]
    fn test_unclosed_fence_is_closed() {
        assert_eq!(normalize("~~~~\ncode\n\n"), "~~~~\ncode\n~~~~\n");
    }

    #[test]
    fn test_table_spacing_preserved_and_separated() {
        let input = "intro\n|  a  | b |   \n| --- | --- |\n| 1 |  2 |\nouter";
        assert_eq!(
            normalize(input),
            "intro\n\n|  a  | b |\n| --- | --- |\n| 1 |  2 |\n\nouter\n"
        );
    }

    #[test]
    fn test_metadata_block_shape() {
        let input = "body\n\n---\n- **a.b**:   c";
        assert_eq!(normalize(input), "body\n\n---\n- **a.b**: c\n");
    }

    #[test]
    fn test_idempotent_on_mixed_document() {
        let input = "\r\n## Title ##\n\tsome   text\n|x|y|\n|-|-|\n\n\n### Sub\n```\n  raw  \n```\n~~~\nunclosed";
        let once = normalize(input);
        assert_eq!(normalize(&once), once);
    }
}

//! Plain text and Markdown outlines of a tree.
//!
//! Each container lists its datasets, each dataset its columns, and each
//! column its attributes, top values and moments, indented one level per
//! step. At most [`MAX_ENTRIES`] entries are listed per level.

use crate::node::{ColumnStat, Columns, Content, MetaNode};

/// Entries shown per level before eliding the rest.
pub const MAX_ENTRIES: usize = 100;

const INDENT: &str = "    ";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Style {
    #[default]
    Text,
    Markdown,
}

impl Style {
    fn name(self, name: &str) -> String {
        match self {
            Style::Text => name.to_string(),
            Style::Markdown => format!("- **{name}**"),
        }
    }

    fn section(self, name: &str) -> String {
        format!("{}:", self.name(name))
    }

    fn attr(self, key: &str, value: &str) -> String {
        match self {
            Style::Text => format!("{key}: {value}"),
            Style::Markdown => format!("- *{key}*: {value}"),
        }
    }

    fn more(self) -> String {
        match self {
            Style::Text => "...".to_string(),
            Style::Markdown => "- ...".to_string(),
        }
    }
}

fn thousands(n: usize) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, digit) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(digit);
    }
    out
}

fn indented(lines: Vec<String>) -> impl Iterator<Item = String> {
    lines.into_iter().map(|line| format!("{INDENT}{line}"))
}

/// Right-align keys and values in text; leave them alone in Markdown.
fn aligned(style: Style, entries: Vec<(String, String)>) -> Vec<String> {
    let (key_width, value_width) = match style {
        Style::Text => (
            entries.iter().map(|(key, _)| key.chars().count()).max().unwrap_or(0),
            entries.iter().map(|(_, value)| value.chars().count()).max().unwrap_or(0),
        ),
        Style::Markdown => (0, 0),
    };
    entries
        .into_iter()
        .map(|(key, value)| style.attr(&format!("{key:>key_width$}"), &format!("{value:>value_width$}")))
        .collect()
}

fn column_detail(column: &ColumnStat, style: Style) -> Vec<String> {
    let mut lines = vec![
        style.attr("name", &column.name),
        style.attr("dtype", &column.dtype),
        style.attr("missing", &column.missing.to_string()),
        style.attr("nunique", &column.nunique.to_string()),
    ];
    if !column.top.is_empty() {
        lines.push(style.section("top"));
        let entries = column.top.iter().map(|(value, count)| (value.clone(), count.to_string())).collect();
        lines.extend(indented(aligned(style, entries)));
    }
    if let Some(moments) = &column.moments {
        lines.push(style.section("moments"));
        let entries = moments
            .entries()
            .into_iter()
            .map(|(label, value)| (label.to_string(), value.map_or_else(|| "-".to_string(), |v| format!("{v:.2}"))))
            .collect();
        lines.extend(indented(aligned(style, entries)));
    }
    lines.truncate(MAX_ENTRIES);
    lines
}

fn columns(columns: &Columns, style: Style) -> Vec<String> {
    let columns = match columns {
        Columns::Stats(columns) => columns,
        Columns::See(name) => return vec![style.attr("see", name)],
    };
    let mut lines = Vec::new();
    for column in columns.iter().take(MAX_ENTRIES) {
        lines.push(style.section(&column.name));
        lines.extend(indented(column_detail(column, style)));
    }
    if columns.len() > MAX_ENTRIES {
        lines.push(style.more());
    }
    lines
}

fn node(node: &MetaNode, style: Style) -> Vec<String> {
    let name = style.name(node.label());
    let format = node.format.map_or("format?", |format| format.as_str());
    let mut lines = Vec::new();
    match (&node.content, &node.stats) {
        (Content::Datasets(children), _) => {
            lines.push(format!("{name} ({format}) {} datasets", children.len()));
            let mut nested = Vec::new();
            for child in children.iter().take(MAX_ENTRIES) {
                nested.extend(self::node(child, style));
            }
            if children.len() > MAX_ENTRIES {
                nested.push(style.more());
            }
            lines.extend(indented(nested));
        },
        (_, Some(stats)) => {
            let more = if stats.capped { "+" } else { "" };
            lines.push(format!("{name} ({format}) {}{more} rows {} cols", thousands(stats.rows), thousands(stats.width)));
            lines.extend(indented(columns(&stats.columns, style)));
        },
        (_, None) => lines.push(format!("{name} ({format}). No datasets/rows detected")),
    }
    if let Some(error) = &node.error {
        lines.push(format!("{INDENT}{}", style.attr("error", error)));
    }
    lines
}

/// Outline of `tree` down to column details.
pub fn outline(tree: &MetaNode, style: Style) -> String {
    node(tree, style).join("\n")
}

/// [`outline`] as plain text.
pub fn to_text(tree: &MetaNode) -> String {
    outline(tree, Style::Text)
}

/// [`outline`] as a nested Markdown list.
pub fn to_markdown(tree: &MetaNode) -> String {
    outline(tree, Style::Markdown)
}

//! Plain-text export: markdown with its markup stripped.

use comrak::nodes::{AstNode, ListType, NodeValue};
use comrak::{Arena, Options, parse_document};

use super::enable_extensions;

/// Strip markdown syntax, keeping the readable text.
///
/// Blocks are separated by blank lines, list items keep a bullet or number,
/// code blocks are copied verbatim and images are replaced by their alt text.
pub fn render_plain_text(markdown: &str) -> String {
    let arena = Arena::new();
    let mut options = Options::default();
    enable_extensions(&mut options);
    let root = parse_document(&arena, markdown, &options);

    let mut blocks = Vec::new();
    collect_blocks(root, "", &mut blocks);
    let mut out = blocks.join("\n\n");
    if !out.is_empty() {
        out.push('\n');
    }
    out
}

fn collect_blocks<'a>(node: &'a AstNode<'a>, indent: &str, blocks: &mut Vec<String>) {
    for child in node.children() {
        if let Some(block) = render_block(child, indent) {
            blocks.push(block);
        }
    }
}

fn render_block<'a>(node: &'a AstNode<'a>, indent: &str) -> Option<String> {
    let value = node.data.borrow().value.clone();
    match value {
        NodeValue::Paragraph | NodeValue::Heading(_) | NodeValue::TableCell => {
            let text = inline_text(node);
            Some(indent_lines(text.trim_end(), indent))
        }
        NodeValue::CodeBlock(block) => {
            Some(indent_lines(block.literal.trim_end_matches('\n'), indent))
        }
        NodeValue::List(list) => {
            let tight = list.tight;
            let mut items = Vec::new();
            for (index, item) in node.children().enumerate() {
                let marker = match (&item.data.borrow().value, list.list_type) {
                    (NodeValue::TaskItem(symbol), _) => {
                        if symbol.is_some() { "[x] ".to_string() } else { "[ ] ".to_string() }
                    }
                    (_, ListType::Bullet) => "- ".to_string(),
                    (_, ListType::Ordered) => format!("{}. ", list.start + index),
                };
                items.push(render_item(item, indent, &marker));
            }
            Some(items.join(if tight { "\n" } else { "\n\n" }))
        }
        NodeValue::Table(_) => {
            let rows: Vec<String> = node
                .children()
                .map(|row| {
                    row.children()
                        .map(|cell| inline_text(cell).trim().to_string())
                        .collect::<Vec<_>>()
                        .join("\t")
                })
                .collect();
            Some(indent_lines(&rows.join("\n"), indent))
        }
        NodeValue::ThematicBreak => Some(format!("{indent}----------")),
        NodeValue::HtmlBlock(_) => None,
        _ => {
            let mut nested = Vec::new();
            collect_blocks(node, indent, &mut nested);
            (!nested.is_empty()).then(|| nested.join("\n\n"))
        }
    }
}

fn render_item<'a>(item: &'a AstNode<'a>, indent: &str, marker: &str) -> String {
    let child_indent = format!("{indent}{}", " ".repeat(marker.chars().count()));
    let mut blocks = Vec::new();
    collect_blocks(item, &child_indent, &mut blocks);
    let body = blocks.join("\n");
    let first_line_body = body.strip_prefix(child_indent.as_str()).unwrap_or(&body);
    format!("{indent}{marker}{first_line_body}")
}

fn indent_lines(text: &str, indent: &str) -> String {
    if indent.is_empty() {
        return text.to_string();
    }
    text.lines()
        .map(|line| format!("{indent}{line}"))
        .collect::<Vec<_>>()
        .join("\n")
}

fn inline_text<'a>(node: &'a AstNode<'a>) -> String {
    let mut text = String::new();
    push_inline(node, &mut text);
    text
}

fn push_inline<'a>(node: &'a AstNode<'a>, text: &mut String) {
    for child in node.children() {
        match &child.data.borrow().value {
            NodeValue::Text(t) => text.push_str(t),
            NodeValue::Code(code) => text.push_str(&code.literal),
            NodeValue::SoftBreak | NodeValue::LineBreak => text.push('\n'),
            NodeValue::HtmlInline(_) | NodeValue::FootnoteReference(_) => {}
            _ => push_inline(child, text),
        }
    }
}

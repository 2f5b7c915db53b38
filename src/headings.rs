//! Heading outline extraction.
//!
//! Headings are collected in document order, including those nested in
//! block quotes and list items, and nested by level: each heading becomes a
//! child of the nearest preceding heading with a smaller level.
use crate::ast::{Block, Document, HeaderNode, Inline};

/// Visible text of an inline sequence, markup removed.
pub fn plain_text(inlines: &[Inline]) -> String {
    let mut text = String::new();
    push_plain_text(inlines, &mut text);
    text
}

fn push_plain_text(inlines: &[Inline], out: &mut String) {
    for inline in inlines {
        match inline {
            Inline::Text(text) | Inline::CodeSpan(text) => out.push_str(text),
            Inline::Emphasis(children)
            | Inline::Strong(children)
            | Inline::Strikethrough(children)
            | Inline::Link { children, .. } => push_plain_text(children, out),
            Inline::Image { alt_text, .. } => out.push_str(alt_text),
            Inline::LineBreak => out.push(' '),
        }
    }
}

pub fn build_header_tree(document: &Document) -> Vec<HeaderNode> {
    let mut headings = Vec::new();
    collect_headings(&document.blocks, &mut headings);
    log::debug!("collected {} headings", headings.len());
    nest_by_level(headings)
}

fn collect_headings(blocks: &[Block], out: &mut Vec<HeaderNode>) {
    for block in blocks {
        match block {
            Block::Heading { level, id, content } => {
                out.push(HeaderNode::new(plain_text(content).trim(), *level, id.as_str()));
            }
            Block::BlockQuote(children) => collect_headings(children, out),
            Block::List { items, .. } => {
                for item in items {
                    collect_headings(&item.children, out);
                }
            }
            _ => {}
        }
    }
}

fn nest_by_level(headings: Vec<HeaderNode>) -> Vec<HeaderNode> {
    let mut roots = Vec::new();
    let mut open: Vec<HeaderNode> = Vec::new();

    for heading in headings {
        while open.last().is_some_and(|top| top.level >= heading.level) {
            attach_top(&mut open, &mut roots);
        }
        open.push(heading);
    }
    while !open.is_empty() {
        attach_top(&mut open, &mut roots);
    }
    roots
}

/// Pop the innermost open heading into its parent, or into the roots.
fn attach_top(open: &mut Vec<HeaderNode>, roots: &mut Vec<HeaderNode>) {
    if let Some(done) = open.pop() {
        match open.last_mut() {
            Some(parent) => parent.children.push(done),
            None => roots.push(done),
        }
    }
}

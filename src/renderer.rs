/// HTML renderer for the document tree
use crate::ast::{Alignment, Block, Document, Inline, ListItem};
use crate::config::Options;

const SHELL_OPEN: &str = "<!doctype html><html><head><meta charset=\"utf-8\"></head><body>\n";
const SHELL_CLOSE: &str = "</body></html>\n";

pub struct HtmlRenderer {
    options: Options,
}

impl HtmlRenderer {
    pub fn new(options: Options) -> Self {
        HtmlRenderer { options }
    }

    /// Render the document, wrapped in a minimal page unless
    /// `document_shell` is off.
    pub fn render(&self, document: &Document) -> String {
        let fragment = self.render_fragment(document);
        if self.options.document_shell {
            format!("{SHELL_OPEN}{fragment}{SHELL_CLOSE}")
        } else {
            fragment
        }
    }

    pub fn render_fragment(&self, document: &Document) -> String {
        let mut out = String::new();
        render_blocks(&document.blocks, &mut out);
        out
    }
}

impl Default for HtmlRenderer {
    fn default() -> Self {
        Self::new(Options::default())
    }
}

fn render_blocks(blocks: &[Block], out: &mut String) {
    for block in blocks {
        render_block(block, out);
    }
}

fn render_block(block: &Block, out: &mut String) {
    match block {
        Block::Heading { level, id, content } => {
            out.push_str(&format!("<h{level} id=\""));
            escape_html(id, out);
            out.push_str("\">");
            render_inlines(content, out);
            out.push_str(&format!("</h{level}>\n"));
        }
        Block::Paragraph(content) => {
            out.push_str("<p>");
            render_inlines(content, out);
            out.push_str("</p>\n");
        }
        Block::ThematicBreak => out.push_str("<hr />\n"),
        Block::CodeBlock { language, literal } => {
            match language {
                Some(language) => {
                    out.push_str("<pre><code class=\"language-");
                    escape_html(language, out);
                    out.push_str("\">");
                }
                None => out.push_str("<pre><code>"),
            }
            escape_html(literal, out);
            out.push_str("</code></pre>\n");
        }
        Block::BlockQuote(children) => {
            out.push_str("<blockquote>\n");
            render_blocks(children, out);
            out.push_str("</blockquote>\n");
        }
        Block::List {
            ordered,
            start,
            tight,
            items,
        } => {
            let tag = if *ordered { "ol" } else { "ul" };
            match start {
                Some(n) if *ordered && *n != 1 => out.push_str(&format!("<ol start=\"{n}\">\n")),
                _ => out.push_str(&format!("<{tag}>\n")),
            }
            for item in items {
                render_list_item(item, *tight, out);
            }
            out.push_str(&format!("</{tag}>\n"));
        }
        Block::Table {
            alignments,
            header,
            rows,
        } => {
            out.push_str("<table>\n<thead>\n");
            render_table_row(header, alignments, "th", out);
            out.push_str("</thead>\n");
            if !rows.is_empty() {
                out.push_str("<tbody>\n");
                for row in rows {
                    render_table_row(row, alignments, "td", out);
                }
                out.push_str("</tbody>\n");
            }
            out.push_str("</table>\n");
        }
        Block::LinkReferenceDefinition { .. } => {}
    }
}

/// Paragraphs in tight lists render without `<p>`.
fn render_list_item(item: &ListItem, tight: bool, out: &mut String) {
    out.push_str("<li>");
    for child in &item.children {
        match child {
            Block::Paragraph(content) if tight => render_inlines(content, out),
            _ => {
                if !out.ends_with('\n') {
                    out.push('\n');
                }
                render_block(child, out);
            }
        }
    }
    out.push_str("</li>\n");
}

fn render_table_row(cells: &[Vec<Inline>], alignments: &[Alignment], tag: &str, out: &mut String) {
    out.push_str("<tr>\n");
    for (index, cell) in cells.iter().enumerate() {
        match alignments.get(index).copied().unwrap_or(Alignment::None) {
            Alignment::None => out.push_str(&format!("<{tag}>")),
            Alignment::Left => out.push_str(&format!("<{tag} style=\"text-align:left\">")),
            Alignment::Right => out.push_str(&format!("<{tag} style=\"text-align:right\">")),
            Alignment::Center => out.push_str(&format!("<{tag} style=\"text-align:center\">")),
        }
        render_inlines(cell, out);
        out.push_str(&format!("</{tag}>\n"));
    }
    out.push_str("</tr>\n");
}

fn render_inlines(inlines: &[Inline], out: &mut String) {
    for inline in inlines {
        render_inline(inline, out);
    }
}

fn render_inline(inline: &Inline, out: &mut String) {
    match inline {
        Inline::Text(text) => escape_html(text, out),
        Inline::CodeSpan(code) => {
            out.push_str("<code>");
            escape_html(code, out);
            out.push_str("</code>");
        }
        Inline::Emphasis(children) => {
            out.push_str("<em>");
            render_inlines(children, out);
            out.push_str("</em>");
        }
        Inline::Strong(children) => {
            out.push_str("<strong>");
            render_inlines(children, out);
            out.push_str("</strong>");
        }
        Inline::Strikethrough(children) => {
            out.push_str("<del>");
            render_inlines(children, out);
            out.push_str("</del>");
        }
        Inline::LineBreak => out.push_str("<br />\n"),
        Inline::Link {
            children,
            url,
            title,
        } => {
            out.push_str("<a href=\"");
            escape_html(url, out);
            out.push('"');
            push_title(title.as_deref(), out);
            out.push('>');
            render_inlines(children, out);
            out.push_str("</a>");
        }
        Inline::Image {
            alt_text,
            url,
            title,
        } => {
            out.push_str("<img src=\"");
            escape_html(url, out);
            out.push_str("\" alt=\"");
            escape_html(alt_text, out);
            out.push('"');
            push_title(title.as_deref(), out);
            out.push_str(" />");
        }
    }
}

fn push_title(title: Option<&str>, out: &mut String) {
    if let Some(title) = title {
        out.push_str(" title=\"");
        escape_html(title, out);
        out.push('"');
    }
}

fn escape_html(text: &str, out: &mut String) {
    for c in text.chars() {
        match c {
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
}

/// Markdown to HTML conversion with GitHub-style heading anchors and a heading tree
pub mod ast;
pub mod config;
pub mod error;
pub mod headings;
pub mod inline;
pub mod parser;
pub mod renderer;
pub mod scanner;
pub mod slug;

use serde::Serialize;

pub use ast::{Document, HeaderNode};
pub use config::Options;
pub use error::{Error, Result};

use parser::BlockParser;
use renderer::HtmlRenderer;

/// HTML and heading outline produced from one parse, so the ids agree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Conversion {
    pub html: String,
    pub headings: Vec<HeaderNode>,
}

/// Entry point for conversions. Holds only its options, so one processor
/// can be shared freely between threads.
#[derive(Debug, Clone, Copy, Default)]
pub struct MarkdownProcessor {
    options: Options,
}

impl MarkdownProcessor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: Options) -> Self {
        MarkdownProcessor { options }
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    pub fn parse(&self, markdown: &str) -> Document {
        BlockParser::new(self.options).parse(markdown)
    }

    pub fn convert_to_html(&self, markdown: &str) -> String {
        let document = self.parse(markdown);
        let html = HtmlRenderer::new(self.options).render(&document);
        log::debug!(
            "converted {} bytes of markdown into {} bytes of html",
            markdown.len(),
            html.len()
        );
        html
    }

    pub fn build_header_tree(&self, markdown: &str) -> Vec<HeaderNode> {
        headings::build_header_tree(&self.parse(markdown))
    }

    pub fn convert(&self, markdown: &str) -> Conversion {
        let document = self.parse(markdown);
        Conversion {
            html: HtmlRenderer::new(self.options).render(&document),
            headings: headings::build_header_tree(&document),
        }
    }

    /// Convert a raw buffer. Fails when the buffer is not UTF-8.
    pub fn convert_bytes(&self, input: &[u8]) -> Result<String> {
        Ok(self.convert_to_html(decode(input)?))
    }

    pub fn header_tree_from_bytes(&self, input: &[u8]) -> Result<Vec<HeaderNode>> {
        Ok(self.build_header_tree(decode(input)?))
    }
}

fn decode(input: &[u8]) -> Result<&str> {
    std::str::from_utf8(input).map_err(|err| Error::InvalidInput {
        reason: format!("input is not valid UTF-8 ({err})"),
    })
}

/// Parse markdown text and render to HTML with default options
pub fn markdown_to_html(markdown: &str) -> String {
    MarkdownProcessor::new().convert_to_html(markdown)
}

/// Heading outline of markdown text with default options
pub fn build_header_tree(markdown: &str) -> Vec<HeaderNode> {
    MarkdownProcessor::new().build_header_tree(markdown)
}

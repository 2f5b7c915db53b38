/// Document tree produced by the parser
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub blocks: Vec<Block>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Block {
    Heading {
        level: u8,
        id: String, // assigned once per document, shared by renderer and heading tree
        content: Vec<Inline>,
    },
    Paragraph(Vec<Inline>),
    ThematicBreak,
    CodeBlock {
        language: Option<String>,
        literal: String,
    },
    BlockQuote(Vec<Block>),
    List {
        ordered: bool,
        start: Option<u32>,
        tight: bool, // Tight lists render item paragraphs without <p>
        items: Vec<ListItem>,
    },
    Table {
        alignments: Vec<Alignment>,
        header: Vec<Vec<Inline>>,
        rows: Vec<Vec<Vec<Inline>>>,
    },
    // Not rendered; kept so the tree reflects the whole source
    LinkReferenceDefinition {
        label: String,
        url: String,
        title: Option<String>,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ListItem {
    pub children: Vec<Block>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Inline {
    Text(String),
    Emphasis(Vec<Inline>),
    Strong(Vec<Inline>),
    Strikethrough(Vec<Inline>),
    CodeSpan(String),
    LineBreak,
    Link {
        children: Vec<Inline>,
        url: String,
        title: Option<String>,
    },
    Image {
        alt_text: String,
        url: String,
        title: Option<String>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Alignment {
    None,
    Left,
    Right,
    Center,
}

/// A heading in the outline returned to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeaderNode {
    pub text: String,
    pub level: u8,
    pub id: String,
    pub children: Vec<HeaderNode>,
}

impl HeaderNode {
    pub fn new(text: impl Into<String>, level: u8, id: impl Into<String>) -> Self {
        HeaderNode {
            text: text.into(),
            level,
            id: id.into(),
            children: Vec::new(),
        }
    }

    /// Iterate over this node and all of its descendants, parents first.
    pub fn iter(&self) -> impl Iterator<Item = &HeaderNode> {
        let mut pending = vec![self];
        std::iter::from_fn(move || {
            let node = pending.pop()?;
            pending.extend(node.children.iter().rev());
            Some(node)
        })
    }
}

impl std::fmt::Display for HeaderNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.text)
    }
}

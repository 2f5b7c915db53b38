/// Block structure: open-container stack, leaf blocks and link reference definitions
use crate::ast::{Alignment, Block, Document, ListItem};
use crate::config::Options;
use crate::headings::plain_text;
use crate::inline::{
    InlineParser, LinkReferences, LinkTarget, ReferenceDefinition, parse_reference_definition,
};
use crate::scanner::{LineCursor, Scanner, is_ascii_punctuation, is_space_or_tab};
use crate::slug::Slugger;

/// Containers nested deeper than this are read as plain text.
pub const MAX_NESTING: usize = 64;

/// List type identifier
#[derive(Debug, Clone, Copy, PartialEq)]
enum ListType {
    Unordered(char),    // The marker character (-, +, *)
    Ordered(u32, char), // Start number and delimiter (. or ))
}

impl ListType {
    /// Check if two list types are compatible (can be in the same list)
    fn is_compatible(&self, other: &ListType) -> bool {
        match (self, other) {
            (ListType::Unordered(a), ListType::Unordered(b)) => a == b,
            (ListType::Ordered(_, a), ListType::Ordered(_, b)) => a == b,
            _ => false,
        }
    }
}

/// Blocks whose inline content has not been parsed yet
#[derive(Debug)]
enum RawBlock {
    Heading {
        level: u8,
        text: String,
    },
    Paragraph(String),
    ThematicBreak,
    CodeBlock {
        language: Option<String>,
        literal: String,
    },
    BlockQuote(Vec<RawBlock>),
    List {
        list_type: ListType,
        tight: bool,
        items: Vec<Vec<RawBlock>>,
    },
    Table {
        alignments: Vec<Alignment>,
        header: Vec<String>,
        rows: Vec<Vec<String>>,
    },
    Definition(ReferenceDefinition),
}

#[derive(Debug)]
enum ContainerKind {
    Document,
    BlockQuote,
    List {
        list_type: ListType,
        tight: bool,
        items: Vec<Vec<RawBlock>>,
    },
    Item {
        content_indent: usize, // Relative to the enclosing container's content
    },
}

#[derive(Debug)]
struct Container {
    kind: ContainerKind,
    children: Vec<RawBlock>,
    blank_pending: bool, // A blank line was seen since the last content line
}

impl Container {
    fn new(kind: ContainerKind) -> Self {
        Container {
            kind,
            children: Vec::new(),
            blank_pending: false,
        }
    }
}

/// The single open leaf, always owned by the innermost container
#[derive(Debug)]
enum Leaf {
    Paragraph(Vec<String>),
    FencedCode {
        fence: char,
        len: usize,
        indent: usize,
        language: Option<String>,
        lines: Vec<String>,
    },
    IndentedCode(Vec<String>),
    Table {
        alignments: Vec<Alignment>,
        header: Vec<String>,
        rows: Vec<Vec<String>>,
    },
}

#[derive(Debug, Clone, Copy)]
struct ListMarker {
    list_type: ListType,
    width: usize,
}

/// Line-at-a-time block parser.
///
/// Each line first walks the open containers from the outside in, then opens
/// any new containers and leaves it starts. Inline content is parsed only
/// after the last line, once every link reference definition is known.
pub struct BlockParser {
    options: Options,
    stack: Vec<Container>,
    leaf: Option<Leaf>,
    references: LinkReferences,
}

impl BlockParser {
    pub fn new(options: Options) -> Self {
        BlockParser {
            options,
            stack: vec![Container::new(ContainerKind::Document)],
            leaf: None,
            references: LinkReferences::new(),
        }
    }

    pub fn parse(mut self, input: &str) -> Document {
        let mut line_count = 0;
        for line in Scanner::new(input).lines() {
            self.process_line(line.text);
            line_count += 1;
        }
        self.close_containers(1);
        self.close_leaf();

        log::debug!(
            "scanned {} lines, {} link reference definitions",
            line_count,
            self.references.len()
        );
        self.finish()
    }

    fn finish(self) -> Document {
        let BlockParser {
            options,
            mut stack,
            references,
            ..
        } = self;
        let raw = stack.pop().map(|document| document.children).unwrap_or_default();

        let inline = InlineParser::new(&references, &options);
        let mut slugger = Slugger::new();
        Document {
            blocks: resolve_blocks(raw, &inline, &mut slugger),
        }
    }

    fn process_line(&mut self, text: &str) {
        let mut cursor = LineCursor::new(text);
        let matched = self.match_containers(&mut cursor);

        if matched == self.stack.len() && self.continue_code(&cursor) {
            return;
        }

        let mut open = matched;
        loop {
            if cursor.is_blank() {
                break;
            }
            let indent = cursor.indent();

            if indent >= 4 {
                // Indented code cannot interrupt a paragraph, lazy or not
                if matches!(self.leaf, Some(Leaf::Paragraph(_))) {
                    break;
                }
                self.start_block(open);
                cursor.advance_columns(4);
                self.leaf = Some(Leaf::IndentedCode(vec![cursor.rest().into_owned()]));
                self.end_content_line();
                return;
            }

            let mut probe = cursor.clone();
            probe.skip_indent();
            let rest = probe.rest();
            let room = open < MAX_NESTING;

            if room && probe.peek() == Some('>') {
                self.start_block(open);
                self.push_container(ContainerKind::BlockQuote);
                probe.advance_char();
                if probe.peek().is_some_and(is_space_or_tab) {
                    probe.advance_columns(1);
                }
                cursor = probe;
                open = self.stack.len();
                continue;
            }

            if let Some((level, content)) = parse_atx_heading(&rest) {
                self.start_block(open);
                self.push_block(RawBlock::Heading {
                    level,
                    text: content,
                });
                self.end_content_line();
                return;
            }

            if let Some((fence, len, language)) = parse_fence_open(&rest) {
                self.start_block(open);
                self.leaf = Some(Leaf::FencedCode {
                    fence,
                    len,
                    indent,
                    language,
                    lines: Vec::new(),
                });
                self.end_content_line();
                return;
            }

            if self.options.tables
                && open == self.stack.len()
                && let Some(alignments) = self.table_delimiter(&rest)
            {
                self.start_table(alignments);
                self.end_content_line();
                return;
            }

            if is_thematic_break(&rest) {
                self.start_block(open);
                self.push_block(RawBlock::ThematicBreak);
                self.end_content_line();
                return;
            }

            if room && let Some(marker) = parse_list_marker(&rest) {
                let mut after = probe.clone();
                for _ in 0..marker.width {
                    after.advance_char();
                }
                let empty = after.is_blank();
                let interrupts =
                    open == self.stack.len() && matches!(self.leaf, Some(Leaf::Paragraph(_)));
                let restricted = empty || matches!(marker.list_type, ListType::Ordered(n, _) if n != 1);

                if !(interrupts && restricted) {
                    let spaces = after.indent();
                    let padding = if empty || spaces >= 5 { 1 } else { spaces };
                    if !empty {
                        after.advance_columns(padding);
                    }
                    self.start_item(open, marker.list_type, indent + marker.width + padding);
                    cursor = after;
                    open = self.stack.len();
                    continue;
                }
            }

            break;
        }

        if cursor.is_blank() {
            self.close_containers(open);
            if matches!(self.leaf, Some(Leaf::Paragraph(_) | Leaf::Table { .. })) {
                self.close_leaf();
            }
            // A line that only opened containers (`>` or an empty item) is
            // not a separating blank line
            if open == matched {
                for container in &mut self.stack {
                    container.blank_pending = true;
                }
            }
            return;
        }

        let rest = cursor.rest();
        let content = rest.trim_start_matches(is_space_or_tab);

        // Lazy continuation keeps unmatched containers open
        if open == matched
            && let Some(Leaf::Paragraph(lines)) = &mut self.leaf
        {
            lines.push(content.to_string());
            self.end_content_line();
            return;
        }

        if open == self.stack.len()
            && let Some(Leaf::Table { header, rows, .. }) = &mut self.leaf
        {
            let mut cells = split_row(content);
            cells.resize(header.len(), String::new());
            rows.push(cells);
            self.end_content_line();
            return;
        }

        self.start_block(open);
        self.leaf = Some(Leaf::Paragraph(vec![content.to_string()]));
        self.end_content_line();
    }

    /// Consume container markers for this line. Returns how many stack
    /// entries (document included) the line continues.
    fn match_containers(&self, cursor: &mut LineCursor<'_>) -> usize {
        let mut matched = 1;
        while matched < self.stack.len() {
            let container = &self.stack[matched];
            let continues = match container.kind {
                ContainerKind::Document | ContainerKind::List { .. } => true,
                ContainerKind::BlockQuote => {
                    if cursor.indent() <= 3 && cursor.peek_nonspace() == Some('>') {
                        cursor.skip_indent();
                        cursor.advance_char();
                        if cursor.peek().is_some_and(is_space_or_tab) {
                            cursor.advance_columns(1);
                        }
                        true
                    } else {
                        false
                    }
                }
                ContainerKind::Item { content_indent } => {
                    if cursor.is_blank() {
                        // An item that has not started yet ends at a blank line
                        matched + 1 < self.stack.len()
                            || !container.children.is_empty()
                            || self.leaf.is_some()
                    } else if cursor.indent() >= content_indent {
                        cursor.advance_columns(content_indent);
                        true
                    } else {
                        false
                    }
                }
            };
            if !continues {
                break;
            }
            matched += 1;
        }
        matched
    }

    /// Feed the line to an open code block. Returns false when the line
    /// does not belong to it.
    fn continue_code(&mut self, cursor: &LineCursor<'_>) -> bool {
        match &mut self.leaf {
            Some(Leaf::FencedCode {
                fence,
                len,
                indent,
                lines,
                ..
            }) => {
                if !is_closing_fence(cursor, *fence, *len) {
                    lines.push(strip_columns(cursor, *indent));
                    return true;
                }
            }
            Some(Leaf::IndentedCode(lines)) => {
                if cursor.indent() >= 4 || cursor.is_blank() {
                    lines.push(strip_columns(cursor, 4));
                    return true;
                }
                return false;
            }
            _ => return false,
        }
        self.close_leaf();
        true
    }

    fn end_content_line(&mut self) {
        for container in &mut self.stack {
            container.blank_pending = false;
        }
    }

    /// Close everything the line did not continue, then make the innermost
    /// container ready to receive a new block.
    fn start_block(&mut self, open: usize) {
        self.close_containers(open);
        self.close_leaf();
        self.prepare_child();
    }

    fn prepare_child(&mut self) {
        // Only items live directly inside a list
        while matches!(
            self.stack.last().map(|container| &container.kind),
            Some(ContainerKind::List { .. })
        ) {
            self.close_top();
        }

        let len = self.stack.len();
        let top = &self.stack[len - 1];
        if top.blank_pending
            && matches!(top.kind, ContainerKind::Item { .. })
            && !top.children.is_empty()
            && let ContainerKind::List { tight, .. } = &mut self.stack[len - 2].kind
        {
            *tight = false;
        }
    }

    fn start_item(&mut self, open: usize, list_type: ListType, content_indent: usize) {
        self.close_containers(open);
        self.close_leaf();

        let continues = match self.stack.last_mut() {
            Some(Container {
                kind:
                    ContainerKind::List {
                        list_type: current,
                        tight,
                        items,
                    },
                blank_pending,
                ..
            }) if current.is_compatible(&list_type) => {
                if *blank_pending && !items.is_empty() {
                    *tight = false;
                }
                true
            }
            _ => false,
        };

        if !continues {
            self.prepare_child();
            self.push_container(ContainerKind::List {
                list_type,
                tight: true,
                items: Vec::new(),
            });
        }
        self.push_container(ContainerKind::Item { content_indent });
    }

    fn table_delimiter(&self, rest: &str) -> Option<Vec<Alignment>> {
        let Some(Leaf::Paragraph(lines)) = &self.leaf else {
            return None;
        };
        if !lines.last()?.contains('|') {
            return None;
        }
        parse_delimiter_row(rest)
    }

    /// The paragraph's last line becomes the header row.
    fn start_table(&mut self, mut alignments: Vec<Alignment>) {
        let Some(Leaf::Paragraph(mut lines)) = self.leaf.take() else {
            return;
        };
        let header_line = lines.pop().unwrap_or_default();
        if !lines.is_empty() {
            self.close_paragraph(lines);
        }

        let header = split_row(&header_line);
        alignments.resize(header.len(), Alignment::None);
        self.leaf = Some(Leaf::Table {
            alignments,
            header,
            rows: Vec::new(),
        });
    }

    fn push_container(&mut self, kind: ContainerKind) {
        log::trace!("open {:?} at depth {}", container_name(&kind), self.stack.len());
        self.stack.push(Container::new(kind));
    }

    fn push_block(&mut self, block: RawBlock) {
        if let Some(top) = self.stack.last_mut() {
            top.children.push(block);
        }
    }

    fn close_containers(&mut self, keep: usize) {
        while self.stack.len() > keep.max(1) {
            self.close_top();
        }
    }

    fn close_top(&mut self) {
        if self.stack.len() <= 1 {
            return;
        }
        self.close_leaf();
        let Some(container) = self.stack.pop() else {
            return;
        };
        log::trace!("close {:?} at depth {}", container_name(&container.kind), self.stack.len());

        let Some(parent) = self.stack.last_mut() else {
            return;
        };
        match container.kind {
            ContainerKind::BlockQuote => parent
                .children
                .push(RawBlock::BlockQuote(container.children)),
            ContainerKind::Item { .. } => {
                if let ContainerKind::List { items, .. } = &mut parent.kind {
                    items.push(container.children);
                }
            }
            ContainerKind::List {
                list_type,
                tight,
                items,
            } => parent.children.push(RawBlock::List {
                list_type,
                tight,
                items,
            }),
            ContainerKind::Document => {}
        }
    }

    fn close_leaf(&mut self) {
        let Some(leaf) = self.leaf.take() else {
            return;
        };
        match leaf {
            Leaf::Paragraph(lines) => self.close_paragraph(lines),
            Leaf::FencedCode {
                language, lines, ..
            } => self.push_block(RawBlock::CodeBlock {
                language,
                literal: join_code_lines(lines),
            }),
            Leaf::IndentedCode(mut lines) => {
                while lines.last().is_some_and(|line| line.trim().is_empty()) {
                    lines.pop();
                }
                self.push_block(RawBlock::CodeBlock {
                    language: None,
                    literal: join_code_lines(lines),
                });
            }
            Leaf::Table {
                alignments,
                header,
                rows,
            } => self.push_block(RawBlock::Table {
                alignments,
                header,
                rows,
            }),
        }
    }

    /// Strip leading link reference definitions, then keep what is left as
    /// paragraph text.
    fn close_paragraph(&mut self, lines: Vec<String>) {
        let text = lines.join("\n");
        let mut remaining = text.as_str();
        let leftover;

        if text.starts_with('[') {
            let chars: Vec<char> = text.chars().collect();
            let mut pos = 0;
            while let Some((definition, used)) = parse_reference_definition(&chars[pos..]) {
                let target = LinkTarget {
                    url: definition.url.clone(),
                    title: definition.title.clone(),
                };
                if !self.references.insert(&definition.label, target) {
                    log::debug!("duplicate link reference [{}] ignored", definition.label);
                }
                self.push_block(RawBlock::Definition(definition));
                pos += used;
            }
            if pos > 0 {
                leftover = chars[pos..].iter().collect::<String>();
                remaining = leftover.as_str();
            }
        }

        let remaining = remaining.trim_end();
        if !remaining.is_empty() {
            self.push_block(RawBlock::Paragraph(remaining.to_string()));
        }
    }
}

fn container_name(kind: &ContainerKind) -> &'static str {
    match kind {
        ContainerKind::Document => "document",
        ContainerKind::BlockQuote => "blockquote",
        ContainerKind::List { .. } => "list",
        ContainerKind::Item { .. } => "item",
    }
}

fn resolve_blocks(
    raw: Vec<RawBlock>,
    inline: &InlineParser<'_>,
    slugger: &mut Slugger,
) -> Vec<Block> {
    raw.into_iter()
        .map(|block| resolve_block(block, inline, slugger))
        .collect()
}

/// Parse inline content and assign heading ids in document order.
fn resolve_block(block: RawBlock, inline: &InlineParser<'_>, slugger: &mut Slugger) -> Block {
    match block {
        RawBlock::Heading { level, text } => {
            let content = inline.parse(&text);
            let id = slugger.slug(plain_text(&content).trim());
            Block::Heading { level, id, content }
        }
        RawBlock::Paragraph(text) => Block::Paragraph(inline.parse(&text)),
        RawBlock::ThematicBreak => Block::ThematicBreak,
        RawBlock::CodeBlock { language, literal } => Block::CodeBlock { language, literal },
        RawBlock::BlockQuote(children) => {
            Block::BlockQuote(resolve_blocks(children, inline, slugger))
        }
        RawBlock::List {
            list_type,
            tight,
            items,
        } => {
            let (ordered, start) = match list_type {
                ListType::Unordered(_) => (false, None),
                ListType::Ordered(start, _) => (true, Some(start)),
            };
            let items = items
                .into_iter()
                .map(|children| ListItem {
                    children: resolve_blocks(children, inline, slugger),
                })
                .collect();
            Block::List {
                ordered,
                start,
                tight,
                items,
            }
        }
        RawBlock::Table {
            alignments,
            header,
            rows,
        } => Block::Table {
            alignments,
            header: header.iter().map(|cell| inline.parse(cell)).collect(),
            rows: rows
                .iter()
                .map(|row| row.iter().map(|cell| inline.parse(cell)).collect())
                .collect(),
        },
        RawBlock::Definition(ReferenceDefinition { label, url, title }) => {
            Block::LinkReferenceDefinition { label, url, title }
        }
    }
}

fn join_code_lines(lines: Vec<String>) -> String {
    if lines.is_empty() {
        String::new()
    } else {
        lines.join("\n") + "\n"
    }
}

/// Remove up to `columns` of leading whitespace.
fn strip_columns(cursor: &LineCursor<'_>, columns: usize) -> String {
    let mut line = cursor.clone();
    let strip = line.indent().min(columns);
    line.advance_columns(strip);
    line.rest().into_owned()
}

/// `#` to `######` followed by whitespace or end of line. Returns the level
/// and the heading text with any closing `#` sequence removed.
fn parse_atx_heading(line: &str) -> Option<(u8, String)> {
    let hash_count = line.chars().take_while(|&c| c == '#').count();
    if hash_count == 0 || hash_count > 6 {
        return None;
    }

    let after_hashes = &line[hash_count..];
    if !after_hashes.is_empty() && !after_hashes.starts_with(is_space_or_tab) {
        return None;
    }

    let mut text = after_hashes.trim_matches(is_space_or_tab);

    // The closing sequence must be preceded by whitespace
    let without_closing = text.trim_end_matches('#');
    if without_closing.is_empty() {
        text = "";
    } else if without_closing.len() < text.len() && without_closing.ends_with(is_space_or_tab) {
        text = without_closing.trim_end_matches(is_space_or_tab);
    }

    Some((hash_count as u8, text.to_string()))
}

/// Opening fence: three or more backticks or tildes. Returns the fence
/// character, its length and the language from the info string.
fn parse_fence_open(line: &str) -> Option<(char, usize, Option<String>)> {
    let fence_char = line.chars().next()?;
    if fence_char != '`' && fence_char != '~' {
        return None;
    }

    let fence_len = line.chars().take_while(|&c| c == fence_char).count();
    if fence_len < 3 {
        return None;
    }

    let info = &line[fence_len..];
    if fence_char == '`' && info.contains('`') {
        return None;
    }

    let language = info.split_whitespace().next().map(unescape_backslashes);
    Some((fence_char, fence_len, language))
}

fn is_closing_fence(cursor: &LineCursor<'_>, fence_char: char, min_len: usize) -> bool {
    if cursor.indent() > 3 {
        return false;
    }
    let mut probe = cursor.clone();
    probe.skip_indent();
    let rest = probe.rest();

    let fence_len = rest.chars().take_while(|&c| c == fence_char).count();
    fence_len >= min_len && rest[fence_len..].trim().is_empty()
}

fn unescape_backslashes(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    while let Some(ch) = chars.next() {
        if ch == '\\'
            && let Some(&next) = chars.peek()
            && is_ascii_punctuation(next)
        {
            result.push(next);
            chars.next();
        } else {
            result.push(ch);
        }
    }
    result
}

fn is_thematic_break(line: &str) -> bool {
    // Three or more matching -, _ or * with optional spaces between
    let chars_only: Vec<char> = line.chars().filter(|&c| !is_space_or_tab(c)).collect();
    if chars_only.len() < 3 {
        return false;
    }

    let first_char = match chars_only[0] {
        c @ ('-' | '_' | '*') => c,
        _ => return false,
    };
    chars_only.iter().all(|&c| c == first_char)
}

/// Bullet (`-`, `+`, `*`) or ordered (`1.`, `1)`) marker followed by
/// whitespace or end of line.
fn parse_list_marker(line: &str) -> Option<ListMarker> {
    let first_char = line.chars().next()?;
    if matches!(first_char, '-' | '+' | '*') {
        let after = &line[1..];
        if after.is_empty() || after.starts_with(is_space_or_tab) {
            return Some(ListMarker {
                list_type: ListType::Unordered(first_char),
                width: 1,
            });
        }
        return None;
    }

    let digit_count = line.chars().take_while(|c| c.is_ascii_digit()).count();
    if digit_count == 0 || digit_count > 9 {
        return None;
    }
    let delimiter = line[digit_count..].chars().next()?;
    if delimiter != '.' && delimiter != ')' {
        return None;
    }
    let after = &line[digit_count + 1..];
    if !after.is_empty() && !after.starts_with(is_space_or_tab) {
        return None;
    }

    let start = line[..digit_count].parse::<u32>().ok()?;
    Some(ListMarker {
        list_type: ListType::Ordered(start, delimiter),
        width: digit_count + 1,
    })
}

/// Split a table row into trimmed cells. Leading and trailing pipes are
/// optional and `\|` stays inside its cell.
fn split_row(line: &str) -> Vec<String> {
    let line = line.trim();
    let line = line.strip_prefix('|').unwrap_or(line);

    let mut cells = Vec::new();
    let mut cell = String::new();
    let mut chars = line.chars();
    while let Some(ch) = chars.next() {
        match ch {
            '\\' => {
                cell.push('\\');
                if let Some(next) = chars.next() {
                    cell.push(next);
                }
            }
            '|' => cells.push(std::mem::take(&mut cell)),
            _ => cell.push(ch),
        }
    }
    if !cell.trim().is_empty() || cells.is_empty() {
        cells.push(cell);
    }

    cells.into_iter().map(|cell| cell.trim().to_string()).collect()
}

fn parse_delimiter_row(line: &str) -> Option<Vec<Alignment>> {
    split_row(line)
        .iter()
        .map(|cell| {
            let left = cell.starts_with(':');
            let right = cell.len() > 1 && cell.ends_with(':');
            let dashes = cell.strip_prefix(':').unwrap_or(cell);
            let dashes = dashes.strip_suffix(':').unwrap_or(dashes);
            if dashes.is_empty() || !dashes.chars().all(|c| c == '-') {
                return None;
            }
            Some(match (left, right) {
                (true, true) => Alignment::Center,
                (true, false) => Alignment::Left,
                (false, true) => Alignment::Right,
                (false, false) => Alignment::None,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Inline;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn parse(input: &str) -> Vec<Block> {
        BlockParser::new(Options::default()).parse(input).blocks
    }

    fn text(s: &str) -> Inline {
        Inline::Text(s.to_string())
    }

    fn para(s: &str) -> Block {
        Block::Paragraph(vec![text(s)])
    }

    fn item(children: Vec<Block>) -> ListItem {
        ListItem { children }
    }

    #[rstest]
    #[case("# One", Some((1, "One")))]
    #[case("###### Six", Some((6, "Six")))]
    #[case("## Closed ##", Some((2, "Closed")))]
    #[case("# Not#closed", Some((1, "Not#closed")))]
    #[case("#", Some((1, "")))]
    #[case("# ###", Some((1, "")))]
    #[case("####### seven", None)]
    #[case("#hashtag", None)]
    fn atx_headings(#[case] line: &str, #[case] expected: Option<(u8, &str)>) {
        let parsed = parse_atx_heading(line);
        assert_eq!(
            parsed.as_ref().map(|(level, text)| (*level, text.as_str())),
            expected
        );
    }

    #[test]
    fn headings_get_ids_in_document_order() {
        let blocks = parse("# A\n> # A\n- # A");
        let ids: Vec<String> = crate::headings::build_header_tree(&Document { blocks })
            .iter()
            .flat_map(|node| node.iter().map(|n| n.id.clone()).collect::<Vec<_>>())
            .collect();
        assert_eq!(ids, vec!["a", "a-1", "a-2"]);
    }

    #[test]
    fn setext_underlines_are_not_headings() {
        assert_eq!(
            parse("Title\n===\n\nOther\n---"),
            vec![para("Title\n==="), para("Other"), Block::ThematicBreak]
        );
    }

    #[test]
    fn fenced_code_with_language() {
        assert_eq!(
            parse("```rust extra\nfn main() {}\n\n```\nafter"),
            vec![
                Block::CodeBlock {
                    language: Some("rust".to_string()),
                    literal: "fn main() {}\n\n".to_string(),
                },
                para("after"),
            ]
        );
    }

    #[test]
    fn unterminated_fence_takes_the_rest() {
        assert_eq!(
            parse("~~~\n# not a heading\n  text"),
            vec![Block::CodeBlock {
                language: None,
                literal: "# not a heading\n  text\n".to_string(),
            }]
        );
    }

    #[test]
    fn unterminated_fence_ends_with_its_container() {
        assert_eq!(
            parse("> ```\n> code\nafter"),
            vec![
                Block::BlockQuote(vec![Block::CodeBlock {
                    language: None,
                    literal: "code\n".to_string(),
                }]),
                para("after"),
            ]
        );
    }

    #[test]
    fn indented_code_cannot_interrupt_paragraph() {
        assert_eq!(
            parse("text\n    more\n\n    code\n\n    kept\n"),
            vec![
                para("text\nmore"),
                Block::CodeBlock {
                    language: None,
                    literal: "code\n\nkept\n".to_string(),
                },
            ]
        );
    }

    #[test]
    fn blockquote_lazy_continuation() {
        assert_eq!(
            parse("> a\nb\n\nc"),
            vec![Block::BlockQuote(vec![para("a\nb")]), para("c")]
        );
    }

    #[test]
    fn tight_and_loose_lists() {
        assert_eq!(
            parse("- a\n- b"),
            vec![Block::List {
                ordered: false,
                start: None,
                tight: true,
                items: vec![item(vec![para("a")]), item(vec![para("b")])],
            }]
        );
        assert_eq!(
            parse("- a\n- b\n\n- c"),
            vec![Block::List {
                ordered: false,
                start: None,
                tight: false,
                items: vec![
                    item(vec![para("a")]),
                    item(vec![para("b")]),
                    item(vec![para("c")]),
                ],
            }]
        );
        assert_eq!(
            parse("- a\n\n  b"),
            vec![Block::List {
                ordered: false,
                start: None,
                tight: false,
                items: vec![item(vec![para("a"), para("b")])],
            }]
        );
    }

    #[test]
    fn trailing_blank_line_keeps_list_tight() {
        let blocks = parse("1. one\n2. two\n\nafter");
        assert_eq!(
            blocks,
            vec![
                Block::List {
                    ordered: true,
                    start: Some(1),
                    tight: true,
                    items: vec![item(vec![para("one")]), item(vec![para("two")])],
                },
                para("after"),
            ]
        );
    }

    #[test]
    fn nested_lists() {
        assert_eq!(
            parse("- a\n  - b\n- c"),
            vec![Block::List {
                ordered: false,
                start: None,
                tight: true,
                items: vec![
                    item(vec![
                        para("a"),
                        Block::List {
                            ordered: false,
                            start: None,
                            tight: true,
                            items: vec![item(vec![para("b")])],
                        },
                    ]),
                    item(vec![para("c")]),
                ],
            }]
        );
    }

    #[test]
    fn marker_change_starts_new_list() {
        let blocks = parse("- a\n+ b\n1. c\n2) d");
        assert_eq!(blocks.len(), 4);
        assert!(blocks.iter().all(|block| matches!(block, Block::List { .. })));
    }

    #[test]
    fn ordered_start_number() {
        assert_eq!(
            parse("3. x"),
            vec![Block::List {
                ordered: true,
                start: Some(3),
                tight: true,
                items: vec![item(vec![para("x")])],
            }]
        );
    }

    #[test]
    fn list_interruption_rules() {
        assert_eq!(parse("text\n2. not a list"), vec![para("text\n2. not a list")]);
        assert_eq!(parse("text\n-\nmore"), vec![para("text\n-\nmore")]);
        assert_eq!(
            parse("text\n1. list"),
            vec![
                para("text"),
                Block::List {
                    ordered: true,
                    start: Some(1),
                    tight: true,
                    items: vec![item(vec![para("list")])],
                },
            ]
        );
    }

    #[test]
    fn thematic_break_wins_over_bullet() {
        assert_eq!(parse("* * *"), vec![Block::ThematicBreak]);
        assert_eq!(parse("_ _ _ _"), vec![Block::ThematicBreak]);
    }

    #[test]
    fn table_with_alignment_and_ragged_rows() {
        assert_eq!(
            parse("| a | b |\n|:-|-:|\n| 1 | 2 | 3 |\n| x |\n\nafter"),
            vec![
                Block::Table {
                    alignments: vec![Alignment::Left, Alignment::Right],
                    header: vec![vec![text("a")], vec![text("b")]],
                    rows: vec![
                        vec![vec![text("1")], vec![text("2")]],
                        vec![vec![text("x")], vec![]],
                    ],
                },
                para("after"),
            ]
        );
    }

    #[test]
    fn table_needs_pipe_in_header() {
        assert_eq!(parse("plain\n---"), vec![para("plain"), Block::ThematicBreak]);
    }

    #[test]
    fn table_keeps_preceding_paragraph_lines() {
        let blocks = parse("intro\na | b\n--- | ---\n");
        assert_eq!(blocks[0], para("intro"));
        assert!(matches!(blocks[1], Block::Table { .. }));
    }

    #[test]
    fn escaped_pipe_stays_in_cell() {
        assert_eq!(split_row(r"| a \| b | c |"), vec![r"a \| b", "c"]);
    }

    #[test]
    fn tables_can_be_disabled() {
        let options = Options {
            tables: false,
            ..Options::default()
        };
        let blocks = BlockParser::new(options).parse("a | b\n--- | ---").blocks;
        assert_eq!(blocks, vec![para("a | b\n--- | ---")]);
    }

    #[test]
    fn forward_reference_resolves() {
        assert_eq!(
            parse("[home]\n\n[Home]: /index.html 'Start'"),
            vec![
                Block::Paragraph(vec![Inline::Link {
                    children: vec![text("home")],
                    url: "/index.html".to_string(),
                    title: Some("Start".to_string()),
                }]),
                Block::LinkReferenceDefinition {
                    label: "Home".to_string(),
                    url: "/index.html".to_string(),
                    title: Some("Start".to_string()),
                },
            ]
        );
    }

    #[test]
    fn definition_followed_by_paragraph_text() {
        let blocks = parse("[a]: /a\nstill text");
        assert_eq!(
            blocks,
            vec![
                Block::LinkReferenceDefinition {
                    label: "a".to_string(),
                    url: "/a".to_string(),
                    title: None,
                },
                para("still text"),
            ]
        );
    }

    #[test]
    fn container_nesting_is_capped() {
        let input = format!("{} deep", ">".repeat(200));
        let blocks = parse(&input);

        let mut depth = 0;
        let mut current = &blocks;
        while let [Block::BlockQuote(children)] = current.as_slice() {
            depth += 1;
            current = children;
        }
        assert!(depth < MAX_NESTING);
        assert!(matches!(current.as_slice(), [Block::Paragraph(_)]));
    }

    #[test]
    fn crlf_and_tabs() {
        assert_eq!(
            parse("-\tone\r\n-\ttwo\r\n"),
            vec![Block::List {
                ordered: false,
                start: None,
                tight: true,
                items: vec![item(vec![para("one")]), item(vec![para("two")])],
            }]
        );
    }
}

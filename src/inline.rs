/// Inline span parsing: emphasis, code spans, links, images
use std::collections::HashMap;
use std::collections::hash_map::Entry;

use unicode_casefold::UnicodeCaseFold;

use crate::ast::Inline;
use crate::config::Options;
use crate::headings::plain_text;
use crate::scanner::{is_ascii_punctuation, is_punctuation};

/// Links inside link text are parsed recursively up to this depth.
const MAX_LINK_DEPTH: usize = 8;
/// Deeper emphasis is left as literal delimiters.
const MAX_EMPHASIS_DEPTH: usize = 32;
const MAX_LABEL_LEN: usize = 999;
const MAX_DESTINATION_PARENS: usize = 32;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkTarget {
    pub url: String,
    pub title: Option<String>,
}

/// Document-wide table of `[label]: url "title"` definitions.
#[derive(Debug, Clone, Default)]
pub struct LinkReferences {
    targets: HashMap<String, LinkTarget>,
}

impl LinkReferences {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a definition. The first definition of a label wins; returns
    /// `false` when the label was already taken.
    pub fn insert(&mut self, label: &str, target: LinkTarget) -> bool {
        match self.targets.entry(normalize_label(label)) {
            Entry::Vacant(slot) => {
                slot.insert(target);
                true
            }
            Entry::Occupied(_) => false,
        }
    }

    pub fn get(&self, label: &str) -> Option<&LinkTarget> {
        self.targets.get(&normalize_label(label))
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}

/// Labels match case-insensitively (Unicode case folding) with internal
/// whitespace collapsed.
pub fn normalize_label(label: &str) -> String {
    let folded: String = label.chars().case_fold().collect();
    folded.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceDefinition {
    pub label: String,
    pub url: String,
    pub title: Option<String>,
}

/// Delimiter run on the stack for emphasis processing
#[derive(Debug, Clone)]
struct Delimiter {
    ch: char,
    remaining: usize,
    original: usize,
    node: usize, // Index of the Text node holding the run
    can_open: bool,
    can_close: bool,
    depth: usize, // Deepest nesting among the nodes up to the next run
}

/// Backtick runs of a span, grouped by length. Closers are found by binary
/// search, including for a run entered midway after an escaped backtick.
struct CodeSpans {
    starts_by_len: HashMap<usize, Vec<usize>>,
}

impl CodeSpans {
    fn scan(chars: &[char]) -> Self {
        let mut starts_by_len: HashMap<usize, Vec<usize>> = HashMap::new();
        let mut i = 0;
        while i < chars.len() {
            if chars[i] == '`' {
                let start = i;
                while i < chars.len() && chars[i] == '`' {
                    i += 1;
                }
                starts_by_len.entry(i - start).or_default().push(start);
            } else {
                i += 1;
            }
        }
        CodeSpans { starts_by_len }
    }

    /// Code span content and the index after the closing run.
    fn span_at(&self, chars: &[char], start: usize) -> Option<(String, usize)> {
        let len = chars[start..].iter().take_while(|&&c| c == '`').count();
        let starts = self.starts_by_len.get(&len)?;
        let close = *starts.get(starts.partition_point(|&s| s <= start))?;

        let raw: String = chars[start + len..close].iter().collect();
        let mut content = raw.replace('\n', " ");
        if content.starts_with(' ') && content.ends_with(' ') && content.chars().any(|c| c != ' ')
        {
            content = content[1..content.len() - 1].to_string();
        }
        Some((content, close + len))
    }
}

/// Matching `]` for each `[` of a span. One forward scan records every
/// bracket it lands on, so later lookups are answered from the table.
#[derive(Default)]
struct Brackets {
    closers: HashMap<usize, Option<usize>>,
}

impl Brackets {
    /// Index of the `]` matching the `[` at `open`, skipping escapes and code spans.
    fn closing(&mut self, chars: &[char], open: usize, code_spans: &CodeSpans) -> Option<usize> {
        if let Some(&close) = self.closers.get(&open) {
            return close;
        }

        let mut stack = Vec::new();
        let mut i = open;
        while i < chars.len() {
            match chars[i] {
                '\\' => {
                    i += 2;
                    continue;
                }
                '`' => {
                    if let Some((_, next)) = code_spans.span_at(chars, i) {
                        i = next;
                    } else {
                        while i < chars.len() && chars[i] == '`' {
                            i += 1;
                        }
                    }
                    continue;
                }
                '[' => stack.push(i),
                ']' => {
                    if let Some(start) = stack.pop() {
                        self.closers.entry(start).or_insert(Some(i));
                    }
                }
                _ => {}
            }
            i += 1;
        }
        for start in stack {
            self.closers.entry(start).or_insert(None);
        }
        self.closers.get(&open).copied().flatten()
    }
}

/// What a `[...]` span turned into.
enum Bracketed {
    Node(Inline, usize),
    /// Link text that holds a link of its own. The outer brackets stay
    /// literal around the parsed text, and parsing resumes after `]`.
    Literal(Vec<Inline>, usize),
}

pub struct InlineParser<'a> {
    references: &'a LinkReferences,
    options: &'a Options,
}

impl<'a> InlineParser<'a> {
    pub fn new(references: &'a LinkReferences, options: &'a Options) -> Self {
        InlineParser {
            references,
            options,
        }
    }

    pub fn parse(&self, text: &str) -> Vec<Inline> {
        let chars: Vec<char> = text.chars().collect();
        self.parse_span(&chars, 0)
    }

    fn parse_span(&self, chars: &[char], depth: usize) -> Vec<Inline> {
        let code_spans = CodeSpans::scan(chars);
        let mut brackets = Brackets::default();
        let mut nodes: Vec<Inline> = Vec::new();
        let mut delimiters: Vec<Delimiter> = Vec::new();
        let mut text = String::new();
        let end = chars.len();
        let mut i = 0;

        while i < end {
            let c = chars[i];
            match c {
                '\\' => match chars.get(i + 1) {
                    Some('\n') => {
                        flush_text(&mut text, &mut nodes);
                        nodes.push(Inline::LineBreak);
                        i = skip_spaces(chars, i + 2);
                        continue;
                    }
                    Some(&next) if is_ascii_punctuation(next) => {
                        text.push(next);
                        i += 2;
                        continue;
                    }
                    _ => {}
                },
                '&' => {
                    if let Some((decoded, next)) = parse_entity(chars, i) {
                        text.push_str(&decoded);
                        i = next;
                        continue;
                    }
                }
                '`' => {
                    if let Some((code, next)) = code_spans.span_at(chars, i) {
                        flush_text(&mut text, &mut nodes);
                        nodes.push(Inline::CodeSpan(code));
                        i = next;
                    } else {
                        // An unmatched run is literal as a whole
                        while i < end && chars[i] == '`' {
                            text.push('`');
                            i += 1;
                        }
                    }
                    continue;
                }
                '<' if self.options.autolinks => {
                    if let Some((link, next)) = parse_autolink(chars, i) {
                        flush_text(&mut text, &mut nodes);
                        push_node(&mut nodes, &mut delimiters, link);
                        i = next;
                        continue;
                    }
                }
                '!' if chars.get(i + 1) == Some(&'[') => {
                    if let Some(Bracketed::Node(image, next)) =
                        self.parse_link(chars, i + 1, &code_spans, &mut brackets, depth, true)
                    {
                        flush_text(&mut text, &mut nodes);
                        push_node(&mut nodes, &mut delimiters, image);
                        i = next;
                        continue;
                    }
                }
                '[' => match self.parse_link(chars, i, &code_spans, &mut brackets, depth, false) {
                    Some(Bracketed::Node(link, next)) => {
                        flush_text(&mut text, &mut nodes);
                        push_node(&mut nodes, &mut delimiters, link);
                        i = next;
                        continue;
                    }
                    Some(Bracketed::Literal(children, next)) => {
                        text.push('[');
                        flush_text(&mut text, &mut nodes);
                        for child in children {
                            push_node(&mut nodes, &mut delimiters, child);
                        }
                        text.push(']');
                        i = next;
                        continue;
                    }
                    None => {}
                },
                '*' | '_' | '~' => {
                    let start = i;
                    while i < end && chars[i] == c {
                        i += 1;
                    }
                    let count = i - start;
                    let run: String = chars[start..i].iter().collect();

                    // Only `~~` strikes through; other tilde runs are plain text
                    if c == '~' && (!self.options.strikethrough || count != 2) {
                        text.push_str(&run);
                        continue;
                    }

                    let before = if start == 0 { ' ' } else { chars[start - 1] };
                    let after = chars.get(i).copied().unwrap_or(' ');
                    let left = is_left_flanking(before, after);
                    let right = is_right_flanking(before, after);
                    let (can_open, can_close) = if c == '_' {
                        (
                            left && (!right || is_punctuation(before)),
                            right && (!left || is_punctuation(after)),
                        )
                    } else {
                        (left, right)
                    };

                    flush_text(&mut text, &mut nodes);
                    nodes.push(Inline::Text(run));
                    if can_open || can_close {
                        delimiters.push(Delimiter {
                            ch: c,
                            remaining: count,
                            original: count,
                            node: nodes.len() - 1,
                            can_open,
                            can_close,
                            depth: 0,
                        });
                    }
                    continue;
                }
                '\n' => {
                    let kept = text.trim_end_matches(' ').len();
                    let trailing = text.len() - kept;
                    text.truncate(kept);
                    if trailing >= 2 {
                        flush_text(&mut text, &mut nodes);
                        nodes.push(Inline::LineBreak);
                    } else {
                        text.push('\n');
                    }
                    i = skip_spaces(chars, i + 1);
                    continue;
                }
                _ => {}
            }

            text.push(c);
            i += 1;
        }

        flush_text(&mut text, &mut nodes);
        normalize(process_emphasis(nodes, delimiters))
    }

    /// Link or image starting at the `[` at `open`.
    fn parse_link(
        &self,
        chars: &[char],
        open: usize,
        code_spans: &CodeSpans,
        brackets: &mut Brackets,
        depth: usize,
        image: bool,
    ) -> Option<Bracketed> {
        if depth >= MAX_LINK_DEPTH {
            return None;
        }
        let close = brackets.closing(chars, open, code_spans)?;
        let label = &chars[open + 1..close];

        let (url, title, end) = parse_inline_target(chars, close + 1)
            .or_else(|| self.parse_reference_target(chars, close + 1, label))?;

        let children = self.parse_span(label, depth + 1);
        let node = if image {
            Inline::Image {
                alt_text: plain_text(&children),
                url,
                title,
            }
        } else if contains_link(&children) {
            return Some(Bracketed::Literal(children, close + 1));
        } else {
            Inline::Link {
                children,
                url,
                title,
            }
        };
        Some(Bracketed::Node(node, end))
    }

    /// `[text][label]`, `[text][]` or `[text]`, resolved against the table.
    fn parse_reference_target(
        &self,
        chars: &[char],
        after: usize,
        text: &[char],
    ) -> Option<(String, Option<String>, usize)> {
        let label_of = |label: &[char]| -> Option<String> {
            (label.len() <= MAX_LABEL_LEN).then(|| label.iter().collect())
        };

        if chars.get(after) == Some(&'[')
            && let Some(len) = chars[after + 1..].iter().position(|&c| c == ']' || c == '[')
            && chars[after + 1 + len] == ']'
        {
            let close = after + 1 + len;
            let raw = &chars[after + 1..close];
            let label = label_of(if raw.is_empty() { text } else { raw })?;
            let target = self.references.get(&label)?;
            return Some((target.url.clone(), target.title.clone(), close + 1));
        }

        let target = self.references.get(&label_of(text)?)?;
        Some((target.url.clone(), target.title.clone(), after))
    }
}

fn flush_text(text: &mut String, nodes: &mut Vec<Inline>) {
    if !text.is_empty() {
        nodes.push(Inline::Text(std::mem::take(text)));
    }
}

/// Push a finished node, recording its nesting under the latest run.
fn push_node(nodes: &mut Vec<Inline>, delimiters: &mut [Delimiter], node: Inline) {
    if let Some(last) = delimiters.last_mut() {
        last.depth = last.depth.max(nesting_depth(&node));
    }
    nodes.push(node);
}

fn contains_link(inlines: &[Inline]) -> bool {
    inlines.iter().any(|inline| match inline {
        Inline::Link { .. } => true,
        Inline::Emphasis(children) | Inline::Strong(children) | Inline::Strikethrough(children) => {
            contains_link(children)
        }
        _ => false,
    })
}

fn skip_spaces(chars: &[char], mut i: usize) -> usize {
    while i < chars.len() && (chars[i] == ' ' || chars[i] == '\t') {
        i += 1;
    }
    i
}

fn skip_whitespace(chars: &[char], mut i: usize) -> usize {
    while i < chars.len() && chars[i].is_whitespace() {
        i += 1;
    }
    i
}

fn is_left_flanking(before: char, after: char) -> bool {
    if after.is_whitespace() {
        return false;
    }
    !is_punctuation(after) || before.is_whitespace() || is_punctuation(before)
}

fn is_right_flanking(before: char, after: char) -> bool {
    if before.is_whitespace() {
        return false;
    }
    !is_punctuation(before) || after.is_whitespace() || is_punctuation(after)
}

/// Runs still able to match, doubly linked so removals keep indices stable.
struct DelimiterStack {
    runs: Vec<Delimiter>,
    prev: Vec<Option<usize>>,
    next: Vec<Option<usize>>,
}

impl DelimiterStack {
    fn new(runs: Vec<Delimiter>) -> Self {
        let count = runs.len();
        DelimiterStack {
            runs,
            prev: (0..count).map(|d| d.checked_sub(1)).collect(),
            next: (1..=count).map(|d| (d < count).then_some(d)).collect(),
        }
    }

    /// Unlink a run; the nodes after it now belong to the previous run.
    fn remove(&mut self, d: usize) {
        let (prev, next) = (self.prev[d], self.next[d]);
        if let Some(p) = prev {
            self.runs[p].depth = self.runs[p].depth.max(self.runs[d].depth);
            self.next[p] = next;
        }
        if let Some(n) = next {
            self.prev[n] = prev;
        }
    }

    fn remove_between(&mut self, opener: usize, closer: usize) {
        self.next[opener] = Some(closer);
        self.prev[closer] = Some(opener);
    }
}

/// Match closers against openers and wrap the nodes between them.
///
/// Nodes form a linked list, so a wrap only touches the nodes it moves. A
/// failed opener search records a lower bound per (character, can open,
/// length mod 3), and later closers of the same kind never search below it.
fn process_emphasis(mut slots: Vec<Inline>, delimiters: Vec<Delimiter>) -> Vec<Inline> {
    let count = slots.len();
    let mut next_slot: Vec<Option<usize>> = (1..=count).map(|n| (n < count).then_some(n)).collect();
    let mut stack = DelimiterStack::new(delimiters);
    let mut bottoms: HashMap<(char, bool, usize), usize> = HashMap::new();
    let mut closer = (!stack.runs.is_empty()).then_some(0);

    while let Some(c) = closer {
        if !stack.runs[c].can_close {
            closer = stack.next[c];
            continue;
        }

        let key = (stack.runs[c].ch, stack.runs[c].can_open, stack.runs[c].original % 3);
        let bottom = bottoms.get(&key).copied().unwrap_or(0);
        let mut inner_depth = 0;
        let mut opener = None;
        let mut candidate = stack.prev[c];
        while let Some(o) = candidate.filter(|&o| o >= bottom) {
            inner_depth = inner_depth.max(stack.runs[o].depth);
            if can_pair(&stack.runs[o], &stack.runs[c]) {
                opener = Some(o);
                break;
            }
            candidate = stack.prev[o];
        }

        let Some(o) = opener else {
            bottoms.insert(key, c);
            closer = stack.next[c];
            // Not a closer after all; keep it only if it may still open
            if !stack.runs[c].can_open {
                stack.remove(c);
            }
            continue;
        };

        if inner_depth + 1 > MAX_EMPHASIS_DEPTH {
            // Too deep: the closer and every run inside stay literal
            stack.runs[o].depth = inner_depth;
            stack.remove_between(o, c);
            closer = stack.next[c];
            stack.remove(c);
            continue;
        }

        let ch = stack.runs[c].ch;
        let used = if ch == '~' || (stack.runs[o].remaining >= 2 && stack.runs[c].remaining >= 2) {
            2
        } else {
            1
        };
        stack.runs[o].remaining -= used;
        stack.runs[c].remaining -= used;
        let (open_node, close_node) = (stack.runs[o].node, stack.runs[c].node);
        set_run_text(&mut slots[open_node], ch, stack.runs[o].remaining);
        set_run_text(&mut slots[close_node], ch, stack.runs[c].remaining);

        let mut inner = Vec::new();
        let mut slot = next_slot[open_node];
        while let Some(s) = slot.filter(|&s| s != close_node) {
            inner.push(std::mem::replace(&mut slots[s], Inline::Text(String::new())));
            slot = next_slot[s];
        }
        slots.push(match (ch, used) {
            ('~', _) => Inline::Strikethrough(inner),
            (_, 2) => Inline::Strong(inner),
            _ => Inline::Emphasis(inner),
        });
        next_slot.push(Some(close_node));
        next_slot[open_node] = Some(slots.len() - 1);

        // Runs inside the wrapped range can no longer match
        stack.remove_between(o, c);
        stack.runs[o].depth = inner_depth + 1;
        if stack.runs[o].remaining == 0 {
            stack.remove(o);
        }
        if stack.runs[c].remaining == 0 {
            closer = stack.next[c];
            stack.remove(c);
        }
    }

    let mut ordered = Vec::with_capacity(count);
    let mut slot = (!slots.is_empty()).then_some(0);
    while let Some(s) = slot {
        ordered.push(std::mem::replace(&mut slots[s], Inline::Text(String::new())));
        slot = next_slot[s];
    }
    ordered
}

fn can_pair(opener: &Delimiter, closer: &Delimiter) -> bool {
    if opener.ch != closer.ch || !opener.can_open {
        return false;
    }
    // A run that can both open and close only pairs when the lengths are
    // not a multiple of 3 in total, unless both are
    let either_both = opener.can_close || closer.can_open;
    !(either_both
        && (opener.original + closer.original) % 3 == 0
        && !(opener.original % 3 == 0 && closer.original % 3 == 0))
}

fn set_run_text(node: &mut Inline, ch: char, remaining: usize) {
    if let Inline::Text(text) = node {
        *text = ch.to_string().repeat(remaining);
    }
}

fn nesting_depth(node: &Inline) -> usize {
    match node {
        Inline::Emphasis(children)
        | Inline::Strong(children)
        | Inline::Strikethrough(children)
        | Inline::Link { children, .. } => {
            1 + children.iter().map(nesting_depth).max().unwrap_or(0)
        }
        _ => 0,
    }
}

/// Merge adjacent text and drop empty runs left over from emphasis matching.
fn normalize(nodes: Vec<Inline>) -> Vec<Inline> {
    let mut out: Vec<Inline> = Vec::with_capacity(nodes.len());
    for node in nodes {
        let node = match node {
            Inline::Text(text) if text.is_empty() => continue,
            Inline::Emphasis(children) => Inline::Emphasis(normalize(children)),
            Inline::Strong(children) => Inline::Strong(normalize(children)),
            Inline::Strikethrough(children) => Inline::Strikethrough(normalize(children)),
            other => other,
        };
        if let (Some(Inline::Text(previous)), Inline::Text(next)) = (out.last_mut(), &node) {
            previous.push_str(next);
            continue;
        }
        out.push(node);
    }
    out
}

/// `(destination "title")` immediately after the closing bracket.
fn parse_inline_target(chars: &[char], start: usize) -> Option<(String, Option<String>, usize)> {
    if chars.get(start) != Some(&'(') {
        return None;
    }
    let mut i = skip_whitespace(chars, start + 1);

    let url = if chars.get(i) == Some(&')') {
        String::new()
    } else {
        let (url, next) = scan_link_destination(chars, i)?;
        i = next;
        url
    };

    let after_destination = i;
    i = skip_whitespace(chars, i);
    let mut title = None;
    if i > after_destination
        && let Some((text, next)) = scan_link_title(chars, i)
    {
        title = Some(text);
        i = skip_whitespace(chars, next);
    }

    if chars.get(i) != Some(&')') {
        return None;
    }
    Some((url, title, i + 1))
}

/// Link destination at `start`, either `<...>` or a run of non-space
/// characters with balanced parentheses.
pub fn scan_link_destination(chars: &[char], start: usize) -> Option<(String, usize)> {
    let mut dest = String::new();
    let mut i = start;

    if chars.get(start) == Some(&'<') {
        i += 1;
        while let Some(&c) = chars.get(i) {
            match c {
                '>' => return Some((encode_url(&decode_entities(&dest)), i + 1)),
                '\\' if chars.get(i + 1).is_some_and(|&n| is_ascii_punctuation(n)) => {
                    dest.push(chars[i + 1]);
                    i += 2;
                }
                '<' | '\n' => return None,
                _ => {
                    dest.push(c);
                    i += 1;
                }
            }
        }
        return None;
    }

    let mut parens = 0usize;
    while let Some(&c) = chars.get(i) {
        match c {
            '\\' if chars.get(i + 1).is_some_and(|&n| is_ascii_punctuation(n)) => {
                dest.push(chars[i + 1]);
                i += 2;
                continue;
            }
            '(' => {
                parens += 1;
                if parens > MAX_DESTINATION_PARENS {
                    return None;
                }
            }
            ')' => {
                if parens == 0 {
                    break;
                }
                parens -= 1;
            }
            c if c.is_whitespace() || c.is_ascii_control() => break,
            _ => {}
        }
        dest.push(c);
        i += 1;
    }

    if i == start || parens != 0 {
        return None;
    }
    Some((encode_url(&decode_entities(&dest)), i))
}

/// Title in `"..."`, `'...'` or `(...)`.
pub fn scan_link_title(chars: &[char], start: usize) -> Option<(String, usize)> {
    let close = match chars.get(start)? {
        '"' => '"',
        '\'' => '\'',
        '(' => ')',
        _ => return None,
    };
    let mut title = String::new();
    let mut i = start + 1;
    while let Some(&c) = chars.get(i) {
        if c == close {
            return Some((decode_entities(&title), i + 1));
        }
        if c == '(' && close == ')' {
            return None;
        }
        if c == '\\' && chars.get(i + 1).is_some_and(|&n| is_ascii_punctuation(n)) {
            title.push(chars[i + 1]);
            i += 2;
            continue;
        }
        title.push(c);
        i += 1;
    }
    None
}

/// Parse one `[label]: destination "title"` definition at the start of
/// `chars`. Returns the definition and the number of characters consumed,
/// including the terminating newline.
pub fn parse_reference_definition(chars: &[char]) -> Option<(ReferenceDefinition, usize)> {
    let mut i = skip_spaces(chars, 0);
    if i > 3 || chars.get(i) != Some(&'[') {
        return None;
    }

    let label_start = i + 1;
    i = label_start;
    loop {
        match chars.get(i)? {
            '\\' => i += 2,
            '[' => return None,
            ']' => break,
            _ => i += 1,
        }
        if i - label_start > MAX_LABEL_LEN {
            return None;
        }
    }
    let label: String = chars[label_start..i].iter().collect();
    if label.trim().is_empty() || chars.get(i + 1) != Some(&':') {
        return None;
    }

    let i = skip_whitespace(chars, i + 2);
    let (url, after_destination) = scan_link_destination(chars, i)?;

    let title_start = skip_whitespace(chars, after_destination);
    if title_start > after_destination
        && let Some((title, after_title)) = scan_link_title(chars, title_start)
        && let Some(end) = end_of_blank_rest(chars, after_title)
    {
        let definition = ReferenceDefinition {
            label,
            url,
            title: Some(title),
        };
        return Some((definition, end));
    }

    let end = end_of_blank_rest(chars, after_destination)?;
    Some((
        ReferenceDefinition {
            label,
            url,
            title: None,
        },
        end,
    ))
}

/// If only spaces remain on the line, the index after its newline.
fn end_of_blank_rest(chars: &[char], start: usize) -> Option<usize> {
    let i = skip_spaces(chars, start);
    match chars.get(i) {
        None => Some(i),
        Some('\n') => Some(i + 1),
        Some(_) => None,
    }
}

fn parse_autolink(chars: &[char], start: usize) -> Option<(Inline, usize)> {
    // Neither whitespace nor `<` can appear inside, so the scan stops there
    let len = chars[start + 1..]
        .iter()
        .position(|&c| c == '>' || c == '<' || c.is_whitespace())?;
    let close = start + 1 + len;
    if len == 0 || chars[close] != '>' {
        return None;
    }
    let inner: String = chars[start + 1..close].iter().collect();

    let url = if is_absolute_uri(&inner) {
        encode_url(&inner.replace('\\', "%5C"))
    } else if is_email_address(&inner) {
        format!("mailto:{inner}")
    } else {
        return None;
    };
    let link = Inline::Link {
        children: vec![Inline::Text(inner)],
        url,
        title: None,
    };
    Some((link, close + 1))
}

fn is_absolute_uri(text: &str) -> bool {
    let Some((scheme, _)) = text.split_once(':') else {
        return false;
    };
    (2..=32).contains(&scheme.len())
        && scheme.starts_with(|c: char| c.is_ascii_alphabetic())
        && scheme
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '.' | '-'))
        && !text.chars().any(|c| c.is_ascii_control())
}

fn is_email_address(text: &str) -> bool {
    let Some((local, domain)) = text.split_once('@') else {
        return false;
    };
    let local_ok = !local.is_empty()
        && local
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || ".!#$%&'*+/=?^_`{|}~-".contains(c));
    let domain_ok = domain.split('.').all(|label| {
        (1..=63).contains(&label.len())
            && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
            && !label.starts_with('-')
            && !label.ends_with('-')
    });
    local_ok && domain_ok
}

/// `&name;`, `&#123;` or `&#x1F600;` at `start`.
fn parse_entity(chars: &[char], start: usize) -> Option<(String, usize)> {
    let mut i = start + 1;

    if chars.get(i) == Some(&'#') {
        i += 1;
        let radix = if matches!(chars.get(i), Some('x') | Some('X')) {
            i += 1;
            16
        } else {
            10
        };
        let digits_start = i;
        while i < chars.len() && chars[i].is_digit(radix) && i - digits_start < 7 {
            i += 1;
        }
        if i == digits_start || chars.get(i) != Some(&';') {
            return None;
        }
        let digits: String = chars[digits_start..i].iter().collect();
        let code = u32::from_str_radix(&digits, radix).ok()?;
        let ch = match code {
            0 => '\u{FFFD}',
            _ => char::from_u32(code).unwrap_or('\u{FFFD}'),
        };
        return Some((ch.to_string(), i + 1));
    }

    let name_start = i;
    while i < chars.len() && chars[i].is_ascii_alphanumeric() && i - name_start < 32 {
        i += 1;
    }
    if chars.get(i) != Some(&';') {
        return None;
    }
    let name: String = chars[name_start..i].iter().collect();
    let decoded = match name.as_str() {
        "amp" => "&",
        "lt" => "<",
        "gt" => ">",
        "quot" => "\"",
        "apos" => "'",
        "nbsp" => "\u{A0}",
        "copy" => "©",
        "reg" => "®",
        "trade" => "™",
        "hellip" => "…",
        "mdash" => "—",
        "ndash" => "–",
        _ => return None,
    };
    Some((decoded.to_string(), i + 1))
}

fn decode_entities(text: &str) -> String {
    if !text.contains('&') {
        return text.to_string();
    }
    let chars: Vec<char> = text.chars().collect();
    let mut result = String::with_capacity(text.len());
    let mut i = 0;
    while i < chars.len() {
        if chars[i] == '&'
            && let Some((decoded, next)) = parse_entity(&chars, i)
        {
            result.push_str(&decoded);
            i = next;
        } else {
            result.push(chars[i]);
            i += 1;
        }
    }
    result
}

/// Percent-encode characters outside the URL-safe set. Existing `%XX`
/// escapes are left alone.
fn encode_url(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    for ch in text.chars() {
        if ch.is_ascii_alphanumeric() || "-_.~!*'();:@&=+$,/?#[]%".contains(ch) {
            result.push(ch);
        } else {
            let mut buf = [0u8; 4];
            for byte in ch.encode_utf8(&mut buf).bytes() {
                result.push_str(&format!("%{byte:02X}"));
            }
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn text(s: &str) -> Inline {
        Inline::Text(s.to_string())
    }

    fn parse(input: &str) -> Vec<Inline> {
        parse_with(input, &LinkReferences::new())
    }

    fn parse_with(input: &str, references: &LinkReferences) -> Vec<Inline> {
        let options = Options::default();
        InlineParser::new(references, &options).parse(input)
    }

    #[test]
    fn emphasis_and_strong() {
        assert_eq!(
            parse("Some *em* and **strong** text"),
            vec![
                text("Some "),
                Inline::Emphasis(vec![text("em")]),
                text(" and "),
                Inline::Strong(vec![text("strong")]),
                text(" text"),
            ]
        );
    }

    #[test]
    fn nested_emphasis_inside_strong() {
        assert_eq!(
            parse("***both***"),
            vec![Inline::Emphasis(vec![Inline::Strong(vec![text("both")])])]
        );
        assert_eq!(
            parse("**bold *and em***"),
            vec![Inline::Strong(vec![
                text("bold "),
                Inline::Emphasis(vec![text("and em")]),
            ])]
        );
    }

    #[test]
    fn underscore_does_not_split_words() {
        assert_eq!(parse("snake_case_name"), vec![text("snake_case_name")]);
        assert_eq!(
            parse("_under_ score"),
            vec![Inline::Emphasis(vec![text("under")]), text(" score")]
        );
    }

    #[test]
    fn whitespace_blocks_flanking() {
        assert_eq!(parse("a * not em *"), vec![text("a * not em *")]);
        assert_eq!(parse("*unclosed"), vec![text("*unclosed")]);
    }

    #[test]
    fn strikethrough_needs_two_tildes() {
        assert_eq!(
            parse("~~gone~~ H~2~O"),
            vec![Inline::Strikethrough(vec![text("gone")]), text(" H~2~O")]
        );
    }

    #[test]
    fn strikethrough_can_be_disabled() {
        let options = Options {
            strikethrough: false,
            ..Options::default()
        };
        let references = LinkReferences::new();
        let parsed = InlineParser::new(&references, &options).parse("~~kept~~");
        assert_eq!(parsed, vec![text("~~kept~~")]);
    }

    #[test]
    fn code_spans_are_opaque() {
        assert_eq!(
            parse("`*not em*` and ``a ` tick``"),
            vec![
                Inline::CodeSpan("*not em*".to_string()),
                text(" and "),
                Inline::CodeSpan("a ` tick".to_string()),
            ]
        );
        assert_eq!(parse("``unmatched`"), vec![text("``unmatched`")]);
    }

    #[test]
    fn backslash_escapes() {
        assert_eq!(parse(r"\*literal\* \q"), vec![text(r"*literal* \q")]);
    }

    #[test]
    fn hard_and_soft_breaks() {
        assert_eq!(
            parse("one  \ntwo\\\nthree\nfour"),
            vec![
                text("one"),
                Inline::LineBreak,
                text("two"),
                Inline::LineBreak,
                text("three\nfour"),
            ]
        );
    }

    #[test]
    fn inline_link_with_title() {
        assert_eq!(
            parse(r#"[a *b*](/url "T")"#),
            vec![Inline::Link {
                children: vec![text("a "), Inline::Emphasis(vec![text("b")])],
                url: "/url".to_string(),
                title: Some("T".to_string()),
            }]
        );
    }

    #[test]
    fn destination_is_percent_encoded() {
        assert_eq!(
            parse("[x](<a b>) [y](/ä%20)"),
            vec![
                Inline::Link {
                    children: vec![text("x")],
                    url: "a%20b".to_string(),
                    title: None,
                },
                text(" "),
                Inline::Link {
                    children: vec![text("y")],
                    url: "/%C3%A4%20".to_string(),
                    title: None,
                },
            ]
        );
    }

    #[test]
    fn reference_links_resolve() {
        let mut references = LinkReferences::new();
        references.insert(
            "Foo Bar",
            LinkTarget {
                url: "/foo".to_string(),
                title: None,
            },
        );
        let expected = |label: &str| Inline::Link {
            children: vec![text(label)],
            url: "/foo".to_string(),
            title: None,
        };
        assert_eq!(
            parse_with("[x][foo  bar] [Foo Bar][] [FOO BAR]", &references),
            vec![
                expected("x"),
                text(" "),
                expected("Foo Bar"),
                text(" "),
                expected("FOO BAR"),
            ]
        );
    }

    #[test]
    fn unresolved_reference_stays_literal() {
        assert_eq!(parse("[missing] and [x][nope]"), vec![text("[missing] and [x][nope]")]);
    }

    #[test]
    fn image_alt_text_is_flattened() {
        assert_eq!(
            parse(r#"![a *cat*](/cat.png "Cat")"#),
            vec![Inline::Image {
                alt_text: "a cat".to_string(),
                url: "/cat.png".to_string(),
                title: Some("Cat".to_string()),
            }]
        );
    }

    #[test]
    fn autolinks() {
        assert_eq!(
            parse("<https://example.com/a> <me@example.com> <not a link>"),
            vec![
                Inline::Link {
                    children: vec![text("https://example.com/a")],
                    url: "https://example.com/a".to_string(),
                    title: None,
                },
                text(" "),
                Inline::Link {
                    children: vec![text("me@example.com")],
                    url: "mailto:me@example.com".to_string(),
                    title: None,
                },
                text(" <not a link>"),
            ]
        );
    }

    #[test]
    fn entities_decode() {
        assert_eq!(
            parse("&amp; &#65; &#x263A; &bogus;"),
            vec![text("& A ☺ &bogus;")]
        );
    }

    #[test]
    fn reference_definition_forms() {
        let chars: Vec<char> = "[Foo]: /url \"Title\"\nrest".chars().collect();
        let (definition, consumed) = parse_reference_definition(&chars).unwrap();
        assert_eq!(
            definition,
            ReferenceDefinition {
                label: "Foo".to_string(),
                url: "/url".to_string(),
                title: Some("Title".to_string()),
            }
        );
        assert_eq!(consumed, 20);

        let chars: Vec<char> = "[a]:\n<b c>\n'd'".chars().collect();
        let (definition, consumed) = parse_reference_definition(&chars).unwrap();
        assert_eq!(definition.url, "b%20c");
        assert_eq!(definition.title.as_deref(), Some("d"));
        assert_eq!(consumed, chars.len());

        let chars: Vec<char> = "[a]: /u \"t\" trailing".chars().collect();
        assert_eq!(parse_reference_definition(&chars), None);

        let chars: Vec<char> = "[]: /u".chars().collect();
        assert_eq!(parse_reference_definition(&chars), None);
    }

    #[test]
    fn label_normalization_folds_case_and_space() {
        assert_eq!(normalize_label("  Foo \n BAR "), "foo bar");
        assert_eq!(normalize_label("Straße"), normalize_label("STRASSE"));
    }

    #[test]
    fn first_definition_wins() {
        let mut references = LinkReferences::new();
        let target = |url: &str| LinkTarget {
            url: url.to_string(),
            title: None,
        };
        assert!(references.insert("a", target("/first")));
        assert!(!references.insert("A", target("/second")));
        assert_eq!(references.get("a").unwrap().url, "/first");
        assert_eq!(references.len(), 1);
    }

    #[test]
    fn deep_delimiter_runs_stay_bounded() {
        let input = format!("{}a{}", "*".repeat(500), "*".repeat(500));
        let parsed = parse(&input);
        assert!(parsed.iter().map(nesting_depth).max().unwrap_or(0) <= MAX_EMPHASIS_DEPTH);
    }

    #[test]
    fn links_do_not_nest() {
        assert_eq!(
            parse("[a [b](c) d](e)"),
            vec![
                text("[a "),
                Inline::Link {
                    children: vec![text("b")],
                    url: "c".to_string(),
                    title: None,
                },
                text(" d](e)"),
            ]
        );
        assert_eq!(
            parse("[*x [y](/y)*](/z)"),
            vec![
                text("["),
                Inline::Emphasis(vec![
                    text("x "),
                    Inline::Link {
                        children: vec![text("y")],
                        url: "/y".to_string(),
                        title: None,
                    },
                ]),
                text("](/z)"),
            ]
        );
    }

    #[test]
    fn image_description_may_hold_a_link() {
        assert_eq!(
            parse("![a [b](c)](d)"),
            vec![Inline::Image {
                alt_text: "a b".to_string(),
                url: "d".to_string(),
                title: None,
            }]
        );
    }

    #[test]
    fn autolink_scan_stops_at_next_angle_bracket() {
        assert_eq!(
            parse("<a<https://x.y> <b c>"),
            vec![
                text("<a"),
                Inline::Link {
                    children: vec![text("https://x.y")],
                    url: "https://x.y".to_string(),
                    title: None,
                },
                text(" <b c>"),
            ]
        );
    }

    #[test]
    fn unclosed_brackets_share_one_scan() {
        let input = "[".repeat(300) + "[x](/u)";
        let parsed = parse(&input);
        assert_eq!(
            parsed,
            vec![
                text(&"[".repeat(300)),
                Inline::Link {
                    children: vec![text("x")],
                    url: "/u".to_string(),
                    title: None,
                },
            ]
        );
    }

    #[test]
    fn code_span_after_escaped_backtick() {
        assert_eq!(
            parse("\\``code` x"),
            vec![text("`"), Inline::CodeSpan("code".to_string()), text(" x")]
        );
    }

    #[test]
    fn alternating_runs_pair_neighbours() {
        let parsed = parse(&("*a".repeat(3) + &"a*".repeat(3)));
        let emphasis = parsed
            .iter()
            .filter(|node| matches!(node, Inline::Emphasis(_)))
            .count();
        assert_eq!(emphasis, 3);
        assert_eq!(plain_text(&parsed), "aaaaaa");
    }

    #[test]
    fn destination_paren_nesting_is_capped() {
        let deep = format!("[x]({}y{})", "(".repeat(40), ")".repeat(40));
        assert!(matches!(parse(&deep).first(), Some(Inline::Text(_))));
        let shallow = format!("[x]({}y{})", "(".repeat(3), ")".repeat(3));
        assert!(matches!(parse(&shallow).first(), Some(Inline::Link { .. })));
    }
}

//! Bounded brace scanner
//!
//! Finds the extent of a `{ ... }` region in Java-like source without
//! parsing it. String literals, char literals, text blocks and comments are
//! skipped so braces inside them never count.

/// Lexical state while walking source text
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lex {
    Code,
    Str,
    TextBlock,
    Char,
    LineComment,
    BlockComment,
}

/// Walks `text` byte-wise, calling `on_code(index, byte)` for every byte that
/// is real code (outside literals and comments). Stops early when `on_code`
/// returns `false`. Returns the index where walking stopped, if it stopped.
fn walk_code<F>(text: &str, start: usize, mut on_code: F) -> Option<usize>
where
    F: FnMut(usize, u8) -> bool,
{
    let bytes = text.as_bytes();
    let mut state = Lex::Code;
    let mut i = start;
    while i < bytes.len() {
        let b = bytes[i];
        let next = bytes.get(i + 1).copied();
        match state {
            Lex::Code => {
                if b == b'/' && next == Some(b'/') {
                    state = Lex::LineComment;
                    i += 2;
                    continue;
                }
                if b == b'/' && next == Some(b'*') {
                    state = Lex::BlockComment;
                    i += 2;
                    continue;
                }
                if b == b'"' {
                    if bytes.get(i + 1..i + 3) == Some(b"\"\"") {
                        state = Lex::TextBlock;
                        i += 3;
                    } else {
                        state = Lex::Str;
                        i += 1;
                    }
                    continue;
                }
                if b == b'\'' {
                    state = Lex::Char;
                    i += 1;
                    continue;
                }
                if !on_code(i, b) {
                    return Some(i);
                }
            }
            Lex::Str | Lex::Char => {
                let close = if state == Lex::Str { b'"' } else { b'\'' };
                if b == b'\\' {
                    i += 2;
                    continue;
                }
                if b == close || b == b'\n' {
                    state = Lex::Code;
                }
            }
            Lex::TextBlock => {
                if b == b'\\' {
                    i += 2;
                    continue;
                }
                if bytes.get(i..i + 3) == Some(b"\"\"\"") {
                    state = Lex::Code;
                    i += 3;
                    continue;
                }
            }
            Lex::LineComment => {
                if b == b'\n' {
                    state = Lex::Code;
                }
            }
            Lex::BlockComment => {
                if b == b'*' && next == Some(b'/') {
                    state = Lex::Code;
                    i += 2;
                    continue;
                }
            }
        }
        i += 1;
    }
    None
}

/// Remove `//` and `/* */` comments, keeping literals verbatim. A block
/// comment becomes one space; a line comment keeps its newline.
pub fn strip_comments(text: &str) -> String {
    let bytes = text.as_bytes();
    let mut out = String::with_capacity(text.len());
    let mut state = Lex::Code;
    let mut keep_from = 0usize;
    let mut i = 0usize;
    while i < bytes.len() {
        let b = bytes[i];
        let next = bytes.get(i + 1).copied();
        match state {
            Lex::Code => {
                if b == b'/' && (next == Some(b'/') || next == Some(b'*')) {
                    out.push_str(&text[keep_from..i]);
                    state = if next == Some(b'/') { Lex::LineComment } else { Lex::BlockComment };
                    i += 2;
                    continue;
                }
                if b == b'"' {
                    if bytes.get(i + 1..i + 3) == Some(b"\"\"") {
                        state = Lex::TextBlock;
                        i += 3;
                    } else {
                        state = Lex::Str;
                        i += 1;
                    }
                    continue;
                }
                if b == b'\'' {
                    state = Lex::Char;
                }
            }
            Lex::Str | Lex::Char => {
                let close = if state == Lex::Str { b'"' } else { b'\'' };
                if b == b'\\' {
                    i += 2;
                    continue;
                }
                if b == close || b == b'\n' {
                    state = Lex::Code;
                }
            }
            Lex::TextBlock => {
                if b == b'\\' {
                    i += 2;
                    continue;
                }
                if bytes.get(i..i + 3) == Some(b"\"\"\"") {
                    state = Lex::Code;
                    i += 3;
                    continue;
                }
            }
            Lex::LineComment => {
                if b == b'\n' {
                    state = Lex::Code;
                    keep_from = i;
                }
            }
            Lex::BlockComment => {
                if b == b'*' && next == Some(b'/') {
                    state = Lex::Code;
                    out.push(' ');
                    i += 2;
                    keep_from = i;
                    continue;
                }
            }
        }
        i += 1;
    }
    if !matches!(state, Lex::LineComment | Lex::BlockComment) {
        out.push_str(&text[keep_from.min(text.len())..]);
    }
    out
}

/// Extract the body of the brace block opening at `open_index`.
///
/// Returns the text strictly between the braces and the index of the
/// matching `}`. `None` when `open_index` is not a `{` or the block never
/// closes.
pub fn scan_block(text: &str, open_index: usize) -> Option<(&str, usize)> {
    scan_delimited(text, open_index, b'{', b'}')
}

/// Same as [`scan_block`] for an arbitrary delimiter pair such as `(`/`)`.
pub fn scan_delimited(text: &str, open_index: usize, open: u8, close: u8) -> Option<(&str, usize)> {
    if text.as_bytes().get(open_index) != Some(&open) {
        return None;
    }
    let mut depth = 0usize;
    let end = walk_code(text, open_index, |_, b| {
        if b == open {
            depth += 1;
        } else if b == close {
            depth -= 1;
            if depth == 0 {
                return false;
            }
        }
        true
    })?;
    Some((&text[open_index + 1..end], end))
}

/// Index of the first `wanted` byte at or after `from` that is real code.
pub fn find_code_byte(text: &str, from: usize, wanted: u8) -> Option<usize> {
    walk_code(text, from, |_, b| b != wanted)
}

/// Index of the first real-code byte at or after `from` that is any of `wanted`.
pub fn find_code_any(text: &str, from: usize, wanted: &[u8]) -> Option<usize> {
    walk_code(text, from, |_, b| !wanted.contains(&b))
}

/// Split a method body into statements at `;`, `{` and `}` outside literals,
/// comments and parentheses. Comments are dropped; empty statements skipped.
/// Each statement is returned with its byte offset in `body`.
pub fn split_statements(body: &str) -> Vec<(usize, String)> {
    let mut statements = Vec::new();
    let mut current = String::new();
    let mut current_start: Option<usize> = None;
    let mut paren_depth = 0usize;
    // Depth inside an array initializer such as `int[] x = {1, 2}`
    let mut init_depth = 0usize;
    let bytes = body.as_bytes();

    let flush = |current: &mut String, start: &mut Option<usize>, out: &mut Vec<(usize, String)>| {
        let trimmed = current.trim();
        if !trimmed.is_empty() && !BARE_BLOCK_KEYWORDS.contains(&trimmed) {
            out.push((start.unwrap_or(0), trimmed.to_string()));
        }
        current.clear();
        *start = None;
    };

    let mut state = Lex::Code;
    let mut i = 0usize;
    while i < bytes.len() {
        let b = bytes[i];
        let next = bytes.get(i + 1).copied();
        match state {
            Lex::Code => {
                if b == b'/' && next == Some(b'/') {
                    state = Lex::LineComment;
                    i += 2;
                    continue;
                }
                if b == b'/' && next == Some(b'*') {
                    state = Lex::BlockComment;
                    i += 2;
                    continue;
                }
                match b {
                    b'"' => {
                        current_start.get_or_insert(i);
                        if bytes.get(i + 1..i + 3) == Some(b"\"\"") {
                            state = Lex::TextBlock;
                            current.push_str("\"\"\"");
                            i += 3;
                            continue;
                        }
                        state = Lex::Str;
                    }
                    b'\'' => {
                        current_start.get_or_insert(i);
                        state = Lex::Char;
                    }
                    b'(' => paren_depth += 1,
                    b')' => paren_depth = paren_depth.saturating_sub(1),
                    b'{' if init_depth > 0 => init_depth += 1,
                    b'}' if init_depth > 0 => init_depth -= 1,
                    b'{' if paren_depth == 0 && opens_initializer(&current) => init_depth = 1,
                    b';' | b'{' | b'}' if paren_depth == 0 && init_depth == 0 => {
                        flush(&mut current, &mut current_start, &mut statements);
                        i += 1;
                        continue;
                    }
                    _ => {}
                }
                if !b.is_ascii_whitespace() {
                    current_start.get_or_insert(i);
                }
            }
            Lex::Str | Lex::Char => {
                let close = if state == Lex::Str { b'"' } else { b'\'' };
                if b == b'\\' {
                    current.push('\\');
                    i += 1;
                    if let Some(&escaped) = bytes.get(i) {
                        let width = utf8_width(escaped);
                        if let Some(ch) = body.get(i..i + width) {
                            current.push_str(ch);
                        }
                        i += width;
                    }
                    continue;
                }
                if b == close || b == b'\n' {
                    state = Lex::Code;
                }
            }
            Lex::TextBlock => {
                if bytes.get(i..i + 3) == Some(b"\"\"\"") {
                    state = Lex::Code;
                    current.push_str("\"\"\"");
                    i += 3;
                    continue;
                }
            }
            Lex::LineComment => {
                if b == b'\n' {
                    state = Lex::Code;
                    current.push(' ');
                }
                i += 1;
                continue;
            }
            Lex::BlockComment => {
                if b == b'*' && next == Some(b'/') {
                    state = Lex::Code;
                    current.push(' ');
                    i += 2;
                    continue;
                }
                i += 1;
                continue;
            }
        }
        // Push the whole UTF-8 character starting at i
        let width = utf8_width(b);
        if let Some(ch) = body.get(i..i + width) {
            current.push_str(ch);
        }
        i += width;
    }
    flush(&mut current, &mut current_start, &mut statements);
    statements
}

/// Block openers that carry no statement of their own
const BARE_BLOCK_KEYWORDS: &[&str] = &["else", "try", "do", "finally"];

fn opens_initializer(current: &str) -> bool {
    let trimmed = current.trim_end();
    trimmed.ends_with('=') || trimmed.ends_with("[]")
}

fn utf8_width(first: u8) -> usize {
    match first {
        0x00..=0x7f => 1,
        0xc0..=0xdf => 2,
        0xe0..=0xef => 3,
        0xf0..=0xf7 => 4,
        _ => 1,
    }
}

/// Split an argument list at top-level commas, respecting literals and nesting.
pub fn split_args(args: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut current = String::new();
    let mut depth = 0i32;
    let mut in_str: Option<char> = None;
    let mut escaped = false;
    for ch in args.chars() {
        if let Some(quote) = in_str {
            current.push(ch);
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == quote {
                in_str = None;
            }
            continue;
        }
        match ch {
            '"' | '\'' => {
                in_str = Some(ch);
                current.push(ch);
            }
            '(' | '[' | '{' | '<' => {
                depth += 1;
                current.push(ch);
            }
            ')' | ']' | '}' | '>' => {
                depth -= 1;
                current.push(ch);
            }
            ',' if depth <= 0 => {
                out.push(current.trim().to_string());
                current.clear();
            }
            _ => current.push(ch),
        }
    }
    if !current.trim().is_empty() {
        out.push(current.trim().to_string());
    }
    out
}

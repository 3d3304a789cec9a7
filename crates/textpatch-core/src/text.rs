//! Text utilities: positions, context windows, line endings.
//!
//! ## Coordinate Conventions
//!
//! - Lines and columns are **1-indexed** (matching editor conventions)
//! - Byte offsets are **0-indexed**
//! - Columns count Unicode scalar values, not bytes

// ============================================================================
// Positions
// ============================================================================

/// Convert a byte offset to 1-indexed line and column (Unicode-aware).
///
/// If `offset` exceeds the content length, returns the position at the end
/// of content.
pub fn byte_offset_to_position(content: &str, offset: usize) -> (u32, u32) {
    let mut line = 1u32;
    let mut col = 1u32;
    let mut current_offset = 0usize;

    for ch in content.chars() {
        if current_offset >= offset {
            break;
        }
        if ch == '\n' {
            line += 1;
            col = 1;
        } else {
            col += 1;
        }
        current_offset += ch.len_utf8();
    }

    (line, col)
}

// ============================================================================
// Context Windows
// ============================================================================

/// Round `offset` down to the nearest char boundary in `content`.
fn floor_char_boundary(content: &str, offset: usize) -> usize {
    let mut offset = offset.min(content.len());
    while !content.is_char_boundary(offset) {
        offset -= 1;
    }
    offset
}

/// Round `offset` up to the nearest char boundary in `content`.
fn ceil_char_boundary(content: &str, offset: usize) -> usize {
    let mut offset = offset.min(content.len());
    while !content.is_char_boundary(offset) {
        offset += 1;
    }
    offset
}

/// Extract up to `radius` bytes either side of `[start, end)`.
///
/// The window is widened to char boundaries so the result is always valid
/// UTF-8, which may make it a few bytes wider than requested around
/// multi-byte characters.
pub fn context_window(content: &str, start: usize, end: usize, radius: usize) -> &str {
    let from = floor_char_boundary(content, start.saturating_sub(radius));
    let to = ceil_char_boundary(content, end.saturating_add(radius));
    &content[from..to]
}

// ============================================================================
// Line Endings
// ============================================================================

/// True if the content contains at least one CRLF line ending.
pub fn has_crlf(content: &str) -> bool {
    content.contains("\r\n")
}

/// True if the content contains a `\n` not preceded by `\r`.
pub fn has_bare_lf(content: &str) -> bool {
    let bytes = content.as_bytes();
    bytes
        .iter()
        .enumerate()
        .any(|(i, &b)| b == b'\n' && (i == 0 || bytes[i - 1] != b'\r'))
}

/// Rewrite every bare `\n` as `\r\n`. Existing `\r\n` pairs are kept as is.
pub fn lf_to_crlf(content: &str) -> String {
    let mut out = String::with_capacity(content.len() + content.len() / 16);
    let mut prev = '\0';
    for ch in content.chars() {
        if ch == '\n' && prev != '\r' {
            out.push('\r');
        }
        out.push(ch);
        prev = ch;
    }
    out
}

/// Count the number of lines in the content (a trailing newline does not
/// start a new line).
pub fn line_count(content: &str) -> usize {
    if content.is_empty() {
        return 0;
    }
    let newlines = content.matches('\n').count();
    if content.ends_with('\n') {
        newlines
    } else {
        newlines + 1
    }
}

// ============================================================================
// Tests
// ============================================================================

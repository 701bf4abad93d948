//! Small text helpers shared by the syntax layer and the generators.

/// Format a float as a source literal that always carries a decimal point
/// (`1.0`, `0.25`, `1e-7`). Non-finite values collapse to `0.0`.
pub fn fmt_float(v: f32) -> String {
    if v.is_finite() {
        format!("{v:?}")
    } else {
        "0.0".to_string()
    }
}

/// Replace every character outside `[A-Za-z0-9_]` with `_`.
pub fn sanitize_ident(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        if ch.is_ascii_alphanumeric() || ch == '_' {
            out.push(ch);
        } else {
            out.push('_');
        }
    }
    if out.is_empty() {
        out.push('_');
    }
    out
}

/// Indent every non-empty line of `block` by `depth` levels of four spaces.
pub fn indent_block(block: &str, depth: usize) -> String {
    let pad = "    ".repeat(depth);
    let mut out = String::with_capacity(block.len() + 8);
    for line in block.lines() {
        if line.trim().is_empty() {
            out.push('\n');
        } else {
            out.push_str(&pad);
            out.push_str(line);
            out.push('\n');
        }
    }
    out
}

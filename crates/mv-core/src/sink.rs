use std::io::{self, Write};

/// Separator between rendered values.
pub const SEPARATOR: &str = " | ";

/// Render a result vector as `v0 | v1 | ...`.
pub fn render(values: &[i64]) -> String {
    values
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join(SEPARATOR)
}

/// Write the rendered vector followed by a newline.
pub fn write_result<W: Write>(out: &mut W, values: &[i64]) -> io::Result<()> {
    writeln!(out, "{}", render(values))
}

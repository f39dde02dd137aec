use std::{borrow::Cow, fmt::Write as _};

/// Narrowest width an aligned cell is padded to.
pub const MIN_CELL_WIDTH: usize = 4;
/// Spaces added after the widest cell of a column.
pub const CELL_PADDING: usize = 1;

/// One line of aligned output: the cells to pad, then free text appended as-is.
#[derive(Debug, Clone, Default)]
pub struct AlignedLine {
    pub cells: Vec<String>,
    pub trailer: String,
}

impl AlignedLine {
    pub fn new(cells: Vec<String>, trailer: impl Into<String>) -> Self {
        Self {
            cells,
            trailer: trailer.into(),
        }
    }
}

/// Pads every cell to its column's tab stop: the widest cell in the column
/// plus [`CELL_PADDING`], never less than [`MIN_CELL_WIDTH`].
pub fn render_aligned(lines: &[AlignedLine]) -> String {
    let column_count = lines.iter().map(|line| line.cells.len()).max().unwrap_or(0);
    let mut widths = vec![MIN_CELL_WIDTH; column_count];
    for line in lines {
        for (idx, cell) in line.cells.iter().enumerate() {
            widths[idx] = widths[idx].max(display_width(cell) + CELL_PADDING);
        }
    }

    let mut output = String::new();
    for line in lines {
        for (idx, cell) in line.cells.iter().enumerate() {
            output.push_str(cell);
            let padding = widths[idx].saturating_sub(display_width(cell));
            output.push_str(&" ".repeat(padding));
        }
        let _ = writeln!(output, "{}", line.trailer);
    }
    output
}

fn display_width(value: &str) -> usize {
    value.chars().count()
}

/// Replaces line breaks and tabs with spaces so the text fits on one line.
pub fn single_line(value: &str) -> Cow<'_, str> {
    if value.contains(['\n', '\r', '\t']) {
        let mut sanitized = String::with_capacity(value.len());
        for ch in value.chars() {
            match ch {
                '\n' | '\r' | '\t' => sanitized.push(' '),
                other => sanitized.push(other),
            }
        }
        Cow::Owned(sanitized)
    } else {
        Cow::Borrowed(value)
    }
}

//! Terminal rendering of decoded grids
//!
//! Turns a [`TableGrid`] into aligned text, honoring the scalings' display
//! formats. Only the formats seen in real definitions are interpreted
//! (`%d` and `%.Nf`); anything else falls back to three decimals.

use rom_workbench::{TableGrid, TableKind};

/// Format one cell value with a printf-style display format
pub fn format_cell(value: f32, format: Option<&str>) -> String {
    match format {
        Some(fmt) if fmt.contains("%d") => format!("{}", value.round() as i64),
        Some(fmt) => match precision_of(fmt) {
            Some(precision) => format!("{:.*}", precision, value),
            None => format!("{:.3}", value),
        },
        None => format!("{:.3}", value),
    }
}

/// Extract N from a "%.Nf" format string
fn precision_of(fmt: &str) -> Option<usize> {
    let rest = &fmt[fmt.find("%.")? + 2..];
    let digits: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
    if rest[digits.len()..].starts_with('f') {
        digits.parse().ok()
    } else {
        None
    }
}

/// Render a grid as column-aligned rows of text
pub fn render_grid(grid: &TableGrid) -> String {
    let mut formatted = vec![vec![String::new(); grid.cols]; grid.rows];
    for row in 0..grid.rows {
        for col in 0..grid.cols {
            if let Some(value) = grid.get(row, col) {
                formatted[row][col] = format_cell(value, cell_format(grid, row, col));
            }
        }
    }

    let mut widths = vec![0usize; grid.cols];
    for row in &formatted {
        for (col, text) in row.iter().enumerate() {
            widths[col] = widths[col].max(text.len());
        }
    }

    let mut out = String::new();
    for row in &formatted {
        let line: Vec<String> = row
            .iter()
            .enumerate()
            .map(|(col, text)| format!("{:>width$}", text, width = widths[col]))
            .collect();
        out.push_str(line.join("  ").trim_end());
        out.push('\n');
    }
    out
}

/// Pick the display format for a grid position: header row and header
/// column carry the axis formats, everything else the data format.
fn cell_format<'a>(grid: &'a TableGrid, row: usize, col: usize) -> Option<&'a str> {
    match grid.kind {
        TableKind::OneD => grid.cell_format.as_deref(),
        TableKind::TwoD => {
            if row == 0 && col > 0 {
                grid.x_format.as_deref()
            } else {
                grid.cell_format.as_deref()
            }
        }
        TableKind::ThreeD => {
            if row == 0 {
                grid.x_format.as_deref()
            } else if col == 0 {
                grid.y_format.as_deref()
            } else {
                grid.cell_format.as_deref()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_cell_integer() {
        assert_eq!(format_cell(4000.0, Some("%d")), "4000");
        assert_eq!(format_cell(0.6, Some("%d")), "1");
    }

    #[test]
    fn test_format_cell_precision() {
        assert_eq!(format_cell(14.7031, Some("%.2f")), "14.70");
        assert_eq!(format_cell(14.7031, Some("%.1f")), "14.7");
    }

    #[test]
    fn test_format_cell_fallback() {
        assert_eq!(format_cell(1.5, None), "1.500");
        assert_eq!(format_cell(1.5, Some("%x")), "1.500");
    }

    #[test]
    fn test_precision_of() {
        assert_eq!(precision_of("%.2f"), Some(2));
        assert_eq!(precision_of("%.10f"), Some(10));
        assert_eq!(precision_of("%d"), None);
        assert_eq!(precision_of("%.2g"), None);
    }
}

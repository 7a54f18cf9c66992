use crate::types::{PlacedPiece, Sheet};

const MAX_COLS: f64 = 80.0;
const MAX_ROWS: f64 = 40.0;

struct Canvas {
    cells: Vec<Vec<char>>,
}

impl Canvas {
    fn new(cols: usize, rows: usize) -> Self {
        Self {
            cells: vec![vec![' '; cols + 1]; rows + 1],
        }
    }

    fn put(&mut self, col: usize, row: usize, ch: char) {
        let Some(cell) = self.cells.get_mut(row).and_then(|r| r.get_mut(col)) else {
            return;
        };
        *cell = match (*cell, ch) {
            ('+', _) | ('-', '|') | ('|', '-') => '+',
            _ => ch,
        };
    }

    fn outline(&mut self, col: usize, row: usize, w: usize, h: usize) {
        for c in col..=col + w {
            self.put(c, row, '-');
            self.put(c, row + h, '-');
        }
        for r in row..=row + h {
            self.put(col, r, '|');
            self.put(col + w, r, '|');
        }
        for (c, r) in [(col, row), (col + w, row), (col, row + h), (col + w, row + h)] {
            if let Some(cell) = self.cells.get_mut(r).and_then(|line| line.get_mut(c)) {
                *cell = '+';
            }
        }
    }

    /// Centres `label` inside the box, skipping characters that would land on
    /// or past its border.
    fn label(&mut self, col: usize, row: usize, w: usize, h: usize, label: &str) {
        let chars: Vec<char> = label.chars().collect();
        let mid_row = row + h / 2;
        if w <= 2 || mid_row <= row || mid_row >= row + h {
            return;
        }
        let start = (col + w / 2).saturating_sub(chars.len() / 2);
        for (i, ch) in chars.into_iter().enumerate() {
            let c = start + i;
            if c > col && c < col + w {
                if let Some(cell) = self.cells.get_mut(mid_row).and_then(|line| line.get_mut(c)) {
                    *cell = ch;
                }
            }
        }
    }

    fn into_string(self) -> String {
        let mut out = String::new();
        for row in self.cells {
            let line: String = row.into_iter().collect();
            out.push_str(line.trim_end());
            out.push('\n');
        }
        out
    }
}

/// Draws the sheet and its pieces as ASCII boxes, scaled to fit a terminal.
/// Rotated pieces carry an `r` suffix on their label.
pub fn render_sheet(sheet: &Sheet) -> String {
    let stock = sheet.stock;
    if stock.is_empty() {
        return String::new();
    }
    let scale = f64::min(MAX_COLS / stock.w as f64, MAX_ROWS / stock.h as f64);
    let to_cells = |v: u32| (v as f64 * scale).round() as usize;

    let cols = to_cells(stock.w);
    let rows = to_cells(stock.h);
    if cols == 0 || rows == 0 {
        return String::new();
    }

    let mut canvas = Canvas::new(cols, rows);
    canvas.outline(0, 0, cols, rows);

    for p in &sheet.placements {
        let (col, row) = (to_cells(p.x), to_cells(p.y));
        let (w, h) = (to_cells(p.rect.w), to_cells(p.rect.h));
        if w == 0 || h == 0 {
            continue;
        }
        canvas.outline(col, row, w, h);
        canvas.label(col, row, w, h, &piece_label(p));
    }

    canvas.into_string()
}

fn piece_label(p: &PlacedPiece) -> String {
    if p.rotated {
        format!("{}r", p.rect)
    } else {
        p.rect.to_string()
    }
}

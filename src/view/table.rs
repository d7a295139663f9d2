//! Plain-text tables for terminal output.
//!
//! ```text
//! +-------+-------+
//! |foo/bar|baz/qux|
//! |   *   |@@@    |
//! +-------+-------+
//! |    123|456    |
//! +-------+-------+
//! ```

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Align {
    Left,
    Right,
    Center,
}

impl Align {
    /// `l`, `r` or `c`; anything else aligns left.
    pub fn from_char(c: char) -> Self {
        match c {
            'r' => Align::Right,
            'c' => Align::Center,
            _ => Align::Left,
        }
    }

    fn pad(self, text: &str, width: usize) -> String {
        let fill = width.saturating_sub(text.chars().count());
        let (left, right) = match self {
            Align::Left => (0, fill),
            Align::Right => (fill, 0),
            Align::Center => (fill / 2, fill - fill / 2),
        };
        format!("{}{}{}", " ".repeat(left), text, " ".repeat(right))
    }
}

/// A table cell, optionally overriding its column's alignment.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Cell {
    align: Option<Align>,
    text: String,
}

impl Cell {
    pub fn new(text: impl Into<String>) -> Self {
        Self { align: None, text: text.into() }
    }

    pub fn centered(text: impl Into<String>) -> Self {
        Self { align: Some(Align::Center), text: text.into() }
    }

    pub fn text(&self) -> &str {
        &self.text
    }
}

impl From<&str> for Cell {
    fn from(text: &str) -> Self {
        Cell::new(text)
    }
}

impl From<String> for Cell {
    fn from(text: String) -> Self {
        Cell::new(text)
    }
}

#[derive(Clone, Debug)]
pub struct TextTable {
    format: Vec<Align>,
    rows: Vec<Option<Vec<Cell>>>,
}

impl TextTable {
    /// `format` holds one alignment character per column.
    pub fn new(format: &str) -> Self {
        Self {
            format: format.chars().map(Align::from_char).collect(),
            rows: Vec::new(),
        }
    }

    pub fn push<I, C>(&mut self, row: I)
    where
        I: IntoIterator<Item = C>,
        C: Into<Cell>,
    {
        self.rows.push(Some(row.into_iter().map(Into::into).collect()));
    }

    /// Horizontal rule.
    pub fn separator(&mut self) {
        self.rows.push(None);
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    fn widths(&self) -> Vec<usize> {
        let mut widths: Vec<usize> = Vec::new();
        for row in self.rows.iter().flatten() {
            for (idx, cell) in row.iter().enumerate() {
                let width = cell.text.chars().count();
                match widths.get_mut(idx) {
                    Some(w) => *w = (*w).max(width),
                    None => widths.push(width),
                }
            }
        }
        widths
    }

    pub fn render(&self) -> String {
        let widths = self.widths();
        let bar = format!(
            "+{}+",
            widths.iter().map(|w| "-".repeat(*w)).collect::<Vec<_>>().join("+")
        );

        let mut lines = vec![bar.clone()];
        for row in &self.rows {
            match row {
                Some(cells) => {
                    let padded: Vec<String> = widths
                        .iter()
                        .enumerate()
                        .map(|(idx, width)| {
                            let cell = cells.get(idx);
                            let align = cell
                                .and_then(|c| c.align)
                                .or_else(|| self.format.get(idx).copied())
                                .unwrap_or(Align::Left);
                            align.pad(cell.map_or("", |c| c.text.as_str()), *width)
                        })
                        .collect();
                    lines.push(format!("|{}|", padded.join("|")));
                }
                None => lines.push(bar.clone()),
            }
        }
        lines.push(bar);
        lines.join("\n")
    }
}

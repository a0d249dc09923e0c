//! Plain-text table rendering.
//!
//! Column widths are laid out once to fit a viewport and reused by every
//! `render` call. Cells either wrap inside their column or are truncated
//! with an ellipsis. Widths are display columns, so wide characters count
//! double.
//!
//! When a viewport is too narrow for the column minimums the table is laid
//! out at its minimum width and overflows.

use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

const ELLIPSIS: char = '…';

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wrap {
    WrapInsideColumn,
    TruncateInsideColumn,
}

/// How readily a column gives up or takes width during layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Adjustability {
    /// Lower resistance adjusts first.
    Resistance(u32),
    Fixed,
}

#[derive(Debug, Clone)]
pub struct Column {
    pub title: String,
    pub min_width: usize,
    pub max_width: Option<usize>,
    pub adjustability: Adjustability,
    pub wrap: Wrap,
}

impl Column {
    /// A column whose minimum width is its title's width.
    pub fn new(title: impl Into<String>, adjustability: Adjustability, wrap: Wrap) -> Self {
        let title = title.into();
        Self {
            min_width: title.width(),
            title,
            max_width: None,
            adjustability,
            wrap,
        }
    }

    pub fn min_width(mut self, width: usize) -> Self {
        self.min_width = width;
        self
    }

    pub fn max_width(mut self, width: usize) -> Self {
        self.max_width = Some(width.max(self.min_width));
        self
    }
}

#[derive(Debug, Clone, Copy)]
pub struct TableOptions {
    /// First row label, or `None` to hide the index column.
    pub index_start: Option<usize>,
    pub margin: usize,
    pub show_headers: bool,
    pub capitalize_headers: bool,
}

pub struct PlainTextTable {
    columns: Vec<Column>,
    options: TableOptions,
    widths: Vec<usize>,
    index_width: usize,
}

impl PlainTextTable {
    pub fn new(columns: Vec<Column>, options: TableOptions) -> Self {
        let widths = columns.iter().map(|c| c.min_width).collect();
        let index_width = usize::from(options.index_start.is_some());
        Self {
            columns,
            options,
            widths,
            index_width,
        }
    }

    /// Current width of a rendered line, margins included.
    pub fn table_width(&self) -> usize {
        let labeled = usize::from(self.options.index_start.is_some());
        let gaps = (self.columns.len() + labeled).saturating_sub(1);
        self.index_width + gaps * self.options.margin + self.widths.iter().sum::<usize>()
    }

    /// Grow or shrink adjustable columns to fill `viewport_width`.
    pub fn layout_for_viewport(&mut self, viewport_width: usize) {
        let change = viewport_width as isize - self.table_width() as isize;
        self.adjust(change);
    }

    /// Render rows of cells. Missing cells render empty; extra cells are ignored.
    pub fn render(&mut self, rows: &[Vec<String>]) -> String {
        self.fit_index_column(rows.len());

        let mut out = String::new();
        if self.options.show_headers {
            let mut cells = Vec::new();
            if self.options.index_start.is_some() {
                cells.push(vec![fit("#", self.index_width)]);
            }
            let titles: Vec<String> = self.columns.iter().map(|c| c.title.clone()).collect();
            cells.extend(self.cells_for(&titles));
            let header = self.join_lines(&cells);
            if self.options.capitalize_headers {
                out.push_str(&header.to_uppercase());
            } else {
                out.push_str(&header);
            }
        }

        for (offset, row) in rows.iter().enumerate() {
            let mut cells = Vec::new();
            if let Some(start) = self.options.index_start {
                let label = (offset + start).to_string();
                cells.push(vec![fit(&label, self.index_width)]);
            }
            cells.extend(self.cells_for(row));
            out.push_str(&self.join_lines(&cells));
        }
        out
    }

    /// Resize the index column for `rows` labels, paying for the change out
    /// of the adjustable columns.
    fn fit_index_column(&mut self, rows: usize) {
        let Some(start) = self.options.index_start else {
            return;
        };
        let last_label = (rows + start).saturating_sub(1);
        let needed = last_label.to_string().len();
        let change = needed as isize - self.index_width as isize;
        if change != 0 {
            self.index_width = needed;
            self.adjust(-change);
        }
    }

    fn cells_for(&self, row: &[String]) -> Vec<Vec<String>> {
        self.columns
            .iter()
            .zip(&self.widths)
            .enumerate()
            .map(|(i, (column, &width))| {
                let text = row.get(i).map(String::as_str).unwrap_or("");
                match column.wrap {
                    Wrap::TruncateInsideColumn => vec![truncate(text, width)],
                    Wrap::WrapInsideColumn => wrap(text, width)
                        .iter()
                        .map(|line| fit(line, width))
                        .collect(),
                }
            })
            .collect()
    }

    fn cell_width(&self, position: usize) -> usize {
        if self.options.index_start.is_some() {
            if position == 0 {
                self.index_width
            } else {
                self.widths[position - 1]
            }
        } else {
            self.widths[position]
        }
    }

    /// Lay cells side by side, one output line per wrapped line. Every
    /// output line ends in a newline and has no trailing spaces.
    fn join_lines(&self, cells: &[Vec<String>]) -> String {
        let margin = " ".repeat(self.options.margin);
        let height = cells.iter().map(Vec::len).max().unwrap_or(0);
        let mut out = String::new();
        for line in 0..height {
            let mut text = String::new();
            for (position, cell) in cells.iter().enumerate() {
                if position > 0 {
                    text.push_str(&margin);
                }
                match cell.get(line) {
                    Some(fragment) => text.push_str(fragment),
                    None => text.push_str(&" ".repeat(self.cell_width(position))),
                }
            }
            out.push_str(text.trim_end());
            out.push('\n');
        }
        out
    }

    /// Spread `change` columns of width over adjustable columns, least
    /// resistant first. Columns of equal resistance share the change, the
    /// rightmost first.
    fn adjust(&mut self, change: isize) {
        if change == 0 {
            return;
        }
        let step = change.signum();
        let mut remaining = change;

        let mut order: Vec<usize> = (0..self.columns.len()).collect();
        order.sort_by_key(|&i| self.columns[i].adjustability);

        let mut start = 0;
        while remaining != 0 && start < order.len() {
            let rank = self.columns[order[start]].adjustability;
            if rank == Adjustability::Fixed {
                break;
            }
            let end = order[start..]
                .iter()
                .position(|&i| self.columns[i].adjustability != rank)
                .map_or(order.len(), |n| start + n);
            let mut group: Vec<usize> = order[start..end].iter().rev().copied().collect();
            start = end;

            while remaining != 0 && !group.is_empty() {
                group.retain(|&i| {
                    let column = &self.columns[i];
                    if step < 0 {
                        self.widths[i] > column.min_width
                    } else {
                        column.max_width.is_none_or(|max| self.widths[i] < max)
                    }
                });
                for &i in &group {
                    if remaining == 0 {
                        break;
                    }
                    self.widths[i] = self.widths[i].saturating_add_signed(step);
                    remaining -= step;
                }
            }
        }
    }
}

/// Pad `text` with spaces to exactly `width` display columns, truncating
/// without a marker if it is too wide.
fn fit(text: &str, width: usize) -> String {
    let mut out = String::new();
    let mut used = 0;
    for c in text.chars() {
        let w = c.width().unwrap_or(0);
        if used + w > width {
            break;
        }
        out.push(c);
        used += w;
    }
    out.push_str(&" ".repeat(width - used));
    out
}

/// Fit `text` on one line of `width`, ending in an ellipsis when cut.
fn truncate(text: &str, width: usize) -> String {
    let flat: String = text
        .chars()
        .map(|c| if c.is_whitespace() { ' ' } else { c })
        .collect();
    if flat.width() <= width {
        return fit(&flat, width);
    }
    if width == 0 {
        return String::new();
    }
    let mut cut = fit(&flat, width - 1).trim_end().to_string();
    cut.push(ELLIPSIS);
    fit(&cut, width)
}

/// Break `text` into lines of at most `width` display columns.
///
/// Lines break at explicit newlines, else at the last whitespace that fits,
/// else mid-word. Leading whitespace on each line is dropped.
fn wrap(text: &str, width: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    let width = width.max(1);
    let mut lines = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        while i < chars.len() && chars[i].is_whitespace() {
            i += 1;
        }
        if i == chars.len() {
            break;
        }

        // Longest span starting at i that fits; always at least one char.
        let mut end = i;
        let mut used = 0;
        while end < chars.len() {
            let w = chars[end].width().unwrap_or(0);
            if end > i && used + w > width {
                break;
            }
            used += w;
            end += 1;
        }
        let span = &chars[i..end];

        if let Some(newline) = span.iter().position(|&c| c == '\n') {
            lines.push(span[..newline].iter().collect::<String>().trim_end().to_string());
            i += newline + 1;
            continue;
        }
        if end == chars.len() || chars[end].is_whitespace() {
            lines.push(span.iter().collect::<String>().trim_end().to_string());
            i = end;
            continue;
        }
        match span.iter().rposition(|c| c.is_whitespace()) {
            Some(space) if space > 0 => {
                lines.push(span[..space].iter().collect::<String>().trim_end().to_string());
                i += space + 1;
            }
            _ => {
                lines.push(span.iter().collect());
                i = end;
            }
        }
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    const LENNON: [&str; 5] = [
        "Imagine all the people",
        "A brotherhood of man",
        "No need for greed or hunger",
        "I wonder if you can",
        "Imagine no possessions",
    ];

    fn caps_zero_based() -> TableOptions {
        TableOptions {
            index_start: Some(0),
            margin: 1,
            show_headers: true,
            capitalize_headers: true,
        }
    }

    fn title_table() -> PlainTextTable {
        PlainTextTable::new(
            vec![
                Column::new("Title", Adjustability::Resistance(0), Wrap::WrapInsideColumn)
                    .min_width(10),
            ],
            caps_zero_based(),
        )
    }

    fn single_column(lines: &[&str]) -> Vec<Vec<String>> {
        lines.iter().map(|l| vec![l.to_string()]).collect()
    }

    fn grid(rows: usize, columns: usize) -> Vec<Vec<String>> {
        (0..rows)
            .map(|r| (0..columns).map(|c| format!("R{}C{}", r, c)).collect())
            .collect()
    }

    #[test]
    fn narrow_viewport_wraps_words() {
        let mut table = title_table();
        table.layout_for_viewport(20);
        let expected = "\
# TITLE
0 Imagine all the
  people
1 A brotherhood of
  man
2 No need for greed
  or hunger
3 I wonder if you
  can
4 Imagine no
  possessions
";
        assert_eq!(table.render(&single_column(&LENNON)), expected);
    }

    #[test]
    fn wider_viewport_breaks_on_last_space() {
        let mut table = title_table();
        table.layout_for_viewport(28);
        let expected = "\
# TITLE
0 Imagine all the people
1 A brotherhood of man
2 No need for greed or
  hunger
3 I wonder if you can
4 Imagine no possessions
";
        assert_eq!(table.render(&single_column(&LENNON)), expected);
    }

    #[test]
    fn headers_can_be_hidden() {
        let options = TableOptions {
            show_headers: false,
            ..caps_zero_based()
        };
        let columns = (0..3)
            .map(|i| {
                Column::new(format!("C{}", i), Adjustability::Fixed, Wrap::TruncateInsideColumn)
                    .min_width(4)
            })
            .collect();
        let mut table = PlainTextTable::new(columns, options);
        let rows = grid(2, 3);
        assert_eq!(table.render(&rows), "0 R0C0 R0C1 R0C2\n1 R1C0 R1C1 R1C2\n");
    }

    #[test]
    fn headers_can_appear_verbatim_without_indexes() {
        let options = TableOptions {
            index_start: None,
            capitalize_headers: false,
            ..caps_zero_based()
        };
        let columns = (0..3)
            .map(|i| {
                Column::new(format!("C{}", i), Adjustability::Fixed, Wrap::TruncateInsideColumn)
                    .min_width(4)
            })
            .collect();
        let mut table = PlainTextTable::new(columns, options);
        let rows = grid(2, 3);
        assert_eq!(table.render(&rows), "C0   C1   C2\nR0C0 R0C1 R0C2\nR1C0 R1C1 R1C2\n");
    }

    #[test]
    fn one_based_labels_fill_viewport() {
        let options = TableOptions {
            index_start: Some(1),
            capitalize_headers: false,
            ..caps_zero_based()
        };
        let columns = vec![
            Column::new("C0", Adjustability::Resistance(0), Wrap::TruncateInsideColumn),
        ];
        let mut table = PlainTextTable::new(columns, options);
        table.layout_for_viewport(6);
        let rows = grid(2, 1);
        assert_eq!(table.render(&rows), "# C0\n1 R0C0\n2 R1C0\n");
    }

    #[test]
    fn index_column_grows_with_row_count() {
        let mut table = title_table();
        table.layout_for_viewport(30);
        let rows: Vec<Vec<String>> = (0..12).map(|i| vec![format!("entry {}", i)]).collect();
        let rendered = table.render(&rows);
        assert!(rendered.starts_with("#  TITLE\n0  entry 0\n"));
        assert!(rendered.contains("\n11 entry 11\n"));
        assert_eq!(table.table_width(), 30);
    }

    #[test]
    fn truncated_cells_end_in_ellipsis() {
        let columns = vec![
            Column::new("Title", Adjustability::Resistance(0), Wrap::TruncateInsideColumn)
                .min_width(8)
                .max_width(8),
        ];
        let options = TableOptions {
            index_start: None,
            ..caps_zero_based()
        };
        let mut table = PlainTextTable::new(columns, options);
        let rendered = table.render(&single_column(&["A brotherhood of man", "Short"]));
        assert_eq!(rendered, "TITLE\nA broth…\nShort\n");
    }

    #[test]
    fn fixed_columns_keep_their_width() {
        let columns = vec![
            Column::new("Title", Adjustability::Resistance(0), Wrap::WrapInsideColumn).min_width(5),
            Column::new("Edited", Adjustability::Fixed, Wrap::TruncateInsideColumn).min_width(16),
        ];
        let mut table = PlainTextTable::new(columns, caps_zero_based());
        table.layout_for_viewport(40);
        assert_eq!(table.widths, vec![21, 16]);
        table.layout_for_viewport(10);
        assert_eq!(table.widths, vec![5, 16]);
    }

    #[test]
    fn max_width_caps_growth() {
        let columns = vec![
            Column::new("A", Adjustability::Resistance(0), Wrap::WrapInsideColumn).max_width(4),
            Column::new("B", Adjustability::Resistance(1), Wrap::WrapInsideColumn),
        ];
        let options = TableOptions {
            index_start: None,
            ..caps_zero_based()
        };
        let mut table = PlainTextTable::new(columns, options);
        table.layout_for_viewport(20);
        assert_eq!(table.widths, vec![4, 15]);
    }

    #[test]
    fn wrap_honors_newlines_and_long_words() {
        assert_eq!(wrap("one\ntwo", 10), vec!["one", "two"]);
        assert_eq!(wrap("abcdefgh", 3), vec!["abc", "def", "gh"]);
        assert!(wrap("   ", 5).is_empty());
    }

    #[test]
    fn wide_characters_count_double() {
        assert_eq!(fit("日本", 4), "日本");
        assert_eq!(fit("日本語", 5), "日本 ");
        assert_eq!(wrap("日本語", 4), vec!["日本", "語"]);
    }
}

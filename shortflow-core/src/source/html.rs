//! First-table extraction from an HTML document.
//!
//! Scans the first `<table>` for `<tr>` rows and `<th>`/`<td>` cells in document
//! order. `colspan` repeats a cell across columns and `rowspan` carries it into
//! the rows below, so every header level comes out fully populated. Header rows
//! are kept as ordinary rows: the first row becomes the CSV header line and the
//! rest follow it.

use super::SourceError;
use crate::table::RawTable;

const MAX_SPAN: usize = 1000;

/// Parse the first table in `html` into a raw table.
pub fn parse_first_table(html: &str) -> Result<RawTable, SourceError> {
    // ASCII lowercasing keeps byte offsets identical to `html`.
    let lc = html.to_ascii_lowercase();
    let start = find_tag(&lc, "<table", 0).ok_or(SourceError::NoTable)?;
    let end = lc[start..]
        .find("</table")
        .map(|e| e + start)
        .unwrap_or(lc.len());

    let grid = parse_rows(&html[start..end], &lc[start..end]);
    if grid.is_empty() {
        return Err(SourceError::NoTable);
    }
    RawTable::from_grid(grid).map_err(|_| SourceError::NoTable)
}

/// Position of `<name` followed by whitespace, `>` or `/`, at or after `from`.
fn find_tag(lc: &str, open: &str, from: usize) -> Option<usize> {
    let mut pos = from;
    while let Some(rel) = lc.get(pos..)?.find(open) {
        let at = pos + rel;
        match lc.as_bytes().get(at + open.len()) {
            Some(b) if b.is_ascii_whitespace() || *b == b'>' || *b == b'/' => return Some(at),
            None => return None,
            _ => pos = at + open.len(),
        }
    }
    None
}

/// Earliest of several tags.
fn find_any_tag(lc: &str, opens: &[&str], from: usize) -> Option<usize> {
    opens.iter().filter_map(|o| find_tag(lc, o, from)).min()
}

fn parse_rows(html: &str, lc: &str) -> Vec<Vec<String>> {
    let mut grid: Vec<Vec<String>> = Vec::new();
    let mut pending: Vec<Option<(String, usize)>> = Vec::new();

    let mut pos = 0;
    while let Some(row_start) = find_tag(lc, "<tr", pos) {
        let Some(open_end) = lc[row_start..].find('>').map(|i| row_start + i + 1) else {
            break;
        };
        let row_end = [
            lc[open_end..].find("</tr").map(|i| open_end + i),
            find_tag(lc, "<tr", open_end),
        ]
        .into_iter()
            .flatten()
            .min()
            .unwrap_or(lc.len());

        let cells = parse_cells(&html[open_end..row_end], &lc[open_end..row_end]);
        pos = row_end;

        if cells.is_empty() {
            continue;
        }
        grid.push(expand_row(cells, &mut pending));
    }

    let width = grid.iter().map(Vec::len).max().unwrap_or(0);
    for row in &mut grid {
        row.resize(width, String::new());
    }
    grid
}

struct Cell {
    text: String,
    colspan: usize,
    rowspan: usize,
}

fn parse_cells(html: &str, lc: &str) -> Vec<Cell> {
    let mut cells = Vec::new();
    let mut pos = 0;
    while let Some(cell_start) = find_any_tag(lc, &["<td", "<th"], pos) {
        let Some(open_end) = lc[cell_start..].find('>').map(|i| cell_start + i + 1) else {
            break;
        };
        let open_tag = &lc[cell_start..open_end];
        let cell_end = [
            lc[open_end..].find("</td").map(|i| open_end + i),
            lc[open_end..].find("</th").map(|i| open_end + i),
            find_any_tag(lc, &["<td", "<th"], open_end),
        ]
        .into_iter()
        .flatten()
        .min()
        .unwrap_or(lc.len());

        cells.push(Cell {
            text: cell_text(&html[open_end..cell_end]),
            colspan: span_attr(open_tag, "colspan"),
            rowspan: span_attr(open_tag, "rowspan"),
        });
        pos = cell_end;
    }
    cells
}

/// Lay out one row's cells, filling columns still covered by earlier rowspans.
fn expand_row(cells: Vec<Cell>, pending: &mut Vec<Option<(String, usize)>>) -> Vec<String> {
    let mut out = Vec::new();
    let mut col = 0;

    for cell in cells {
        take_pending(pending, &mut col, &mut out);
        for _ in 0..cell.colspan {
            if cell.rowspan > 1 {
                if pending.len() <= col {
                    pending.resize(col + 1, None);
                }
                pending[col] = Some((cell.text.clone(), cell.rowspan - 1));
            }
            out.push(cell.text.clone());
            col += 1;
        }
    }
    take_pending(pending, &mut col, &mut out);
    out
}

fn take_pending(
    pending: &mut [Option<(String, usize)>],
    col: &mut usize,
    out: &mut Vec<String>,
) {
    loop {
        let (text, remaining) = match pending.get(*col) {
            Some(Some((text, remaining))) => (text.clone(), *remaining),
            _ => break,
        };
        pending[*col] = if remaining > 1 {
            Some((text.clone(), remaining - 1))
        } else {
            None
        };
        out.push(text);
        *col += 1;
    }
}

/// `colspan="3"` / `rowspan=2` → value clamped to `1..=MAX_SPAN`, default 1.
fn span_attr(open_tag: &str, attr: &str) -> usize {
    let Some(at) = open_tag.find(attr) else {
        return 1;
    };
    let rest = open_tag[at + attr.len()..].trim_start();
    let Some(rest) = rest.strip_prefix('=') else {
        return 1;
    };
    let digits: String = rest
        .trim_start()
        .trim_start_matches(['"', '\''])
        .chars()
        .take_while(char::is_ascii_digit)
        .collect();
    digits.parse::<usize>().unwrap_or(1).clamp(1, MAX_SPAN)
}

fn cell_text(inner: &str) -> String {
    let mut stripped = String::with_capacity(inner.len());
    let mut in_tag = false;
    for ch in inner.chars() {
        match ch {
            '<' => {
                in_tag = true;
                stripped.push(' ');
            }
            '>' if in_tag => in_tag = false,
            _ if !in_tag => stripped.push(ch),
            _ => {}
        }
    }
    let decoded = decode_entities(&stripped);
    let collapsed = decoded.split_whitespace().collect::<Vec<_>>().join(" ");
    strip_thousands(&collapsed)
}

fn decode_entities(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let tail = &rest[amp..];
        let decoded = tail.find(';').filter(|&semi| semi <= 10).and_then(|semi| {
            let entity = &tail[1..semi];
            let ch = match entity {
                "nbsp" => Some(' '),
                "amp" => Some('&'),
                "lt" => Some('<'),
                "gt" => Some('>'),
                "quot" => Some('"'),
                "apos" => Some('\''),
                _ => entity
                    .strip_prefix("#x")
                    .or_else(|| entity.strip_prefix("#X"))
                    .and_then(|hex| u32::from_str_radix(hex, 16).ok())
                    .or_else(|| entity.strip_prefix('#').and_then(|d| d.parse().ok()))
                    .and_then(char::from_u32),
            };
            ch.map(|c| (c, semi))
        });
        match decoded {
            Some((c, semi)) => {
                out.push(c);
                rest = &tail[semi + 1..];
            }
            None => {
                out.push('&');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

/// `1,234,567.5` → `1234567.5`; anything that is not a grouped number is unchanged.
fn strip_thousands(s: &str) -> String {
    if !s.contains(',') {
        return s.to_string();
    }
    let unsigned = s.strip_prefix(['-', '+']).unwrap_or(s);
    let (int_part, frac_part) = match unsigned.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (unsigned, None),
    };
    let groups: Vec<&str> = int_part.split(',').collect();
    let grouped = groups[0].len() <= 3
        && !groups[0].is_empty()
        && groups[1..].iter().all(|g| g.len() == 3)
        && groups.iter().all(|g| g.chars().all(|c| c.is_ascii_digit()))
        && frac_part.map_or(true, |f| !f.is_empty() && f.chars().all(|c| c.is_ascii_digit()));
    if grouped {
        s.replace(',', "")
    } else {
        s.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const REPORT: &str = r#"
<html><body>
<p>Daily Short Sale Balances</p>
<TABLE class="data">
  <thead>
    <tr><th colspan="8">2024/03/07 Short Sale Balances</th></tr>
    <tr>
      <th rowspan="2">Security Code</th>
      <th colspan="3">Margin Short Sales</th>
      <th colspan="3">SBL Short Sales</th>
      <th rowspan="2">Note</th>
    </tr>
    <tr>
      <th>Previous Day Balance</th><th>Current Day Balance</th><th>Quota</th>
      <th>Previous Day Balance</th><th>Current Day Balance</th><th>Quota for the Next Day</th>
    </tr>
  </thead>
  <tbody>
    <tr><td>1101</td><td>1,000</td><td>1,250</td><td>2,500,000</td><td>0</td><td>12</td><td>3,000</td><td>&nbsp;</td></tr>
    <tr><td>2330</td><td>5</td><td>5</td><td>100</td><td>7</td><td>7</td><td>100</td><td>X&amp;Y</td></tr>
  </tbody>
  <tfoot><tr><td colspan="8">Note: <b>units</b> are shares</td></tr></tfoot>
</TABLE>
</body></html>"#;

    fn row(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn parses_multi_level_header_with_spans() {
        let table = parse_first_table(REPORT).unwrap();
        assert_eq!(table.width(), 8);
        assert_eq!(table.header(), vec!["2024/03/07 Short Sale Balances"; 8].as_slice());

        let rows = table.rows();
        assert_eq!(rows.len(), 5);
        assert_eq!(
            rows[0],
            row(&[
                "Security Code",
                "Margin Short Sales",
                "Margin Short Sales",
                "Margin Short Sales",
                "SBL Short Sales",
                "SBL Short Sales",
                "SBL Short Sales",
                "Note",
            ])
        );
        assert_eq!(
            rows[1],
            row(&[
                "Security Code",
                "Previous Day Balance",
                "Current Day Balance",
                "Quota",
                "Previous Day Balance",
                "Current Day Balance",
                "Quota for the Next Day",
                "Note",
            ])
        );
    }

    #[test]
    fn strips_thousands_and_decodes_entities() {
        let table = parse_first_table(REPORT).unwrap();
        let rows = table.rows();
        assert_eq!(rows[2], row(&["1101", "1000", "1250", "2500000", "0", "12", "3000", ""]));
        assert_eq!(rows[3][7], "X&Y");
        assert_eq!(rows[4][0], "Note: units are shares");
    }

    #[test]
    fn missing_table_is_error() {
        assert!(matches!(
            parse_first_table("<html><p>maintenance</p></html>"),
            Err(SourceError::NoTable)
        ));
    }

    #[test]
    fn only_first_table_is_read() {
        let html = "<table><tr><td>a</td></tr></table><table><tr><td>b</td></tr></table>";
        let table = parse_first_table(html).unwrap();
        assert_eq!(table.header(), row(&["a"]).as_slice());
        assert!(table.is_empty());
    }

    #[test]
    fn tolerates_unclosed_cells() {
        let html = "<table><tr><td>a<td>b<tr><td>1<td>2</table>";
        let table = parse_first_table(html).unwrap();
        assert_eq!(table.header(), row(&["a", "b"]).as_slice());
        assert_eq!(table.rows()[0], row(&["1", "2"]));
    }

    #[test]
    fn thousands_only_for_grouped_numbers() {
        assert_eq!(strip_thousands("1,234"), "1234");
        assert_eq!(strip_thousands("-12,345.50"), "-12345.50");
        assert_eq!(strip_thousands("1,2"), "1,2");
        assert_eq!(strip_thousands("A, B"), "A, B");
        assert_eq!(strip_thousands("42"), "42");
    }

    #[test]
    fn span_attribute_parsing() {
        assert_eq!(span_attr(r#"<td colspan="3">"#, "colspan"), 3);
        assert_eq!(span_attr("<td colspan=2>", "colspan"), 2);
        assert_eq!(span_attr("<td>", "rowspan"), 1);
        assert_eq!(span_attr("<td rowspan='0'>", "rowspan"), 1);
    }

    #[test]
    fn tr_prefix_does_not_match_track() {
        assert_eq!(find_tag("<track><tr>", "<tr", 0), Some(7));
    }
}

/*!
A1-notation range references.

Tab names are always quoted when embedded in a range, with any embedded
single quote doubled, so `O'Brien` becomes `'O''Brien'!A2:E`.
*/

/// Quote a tab name for use in a range reference.
pub fn quote_tab(tab: &str) -> String {
    format!("'{}'", tab.replace('\'', "''"))
}

/// 1-based column number to column letters (1 -> "A", 27 -> "AA").
pub fn column_letters(mut n: usize) -> String {
    let mut letters: Vec<u8> = Vec::new();
    while n > 0 {
        let rem = (n - 1) % 26;
        letters.push(b'A' + rem as u8);
        n = (n - 1) / 26;
    }
    letters.reverse();
    String::from_utf8(letters).unwrap_or_default()
}

/// Column letters to a 1-based column number.
pub fn column_number(letters: &str) -> Option<usize> {
    if letters.is_empty() {
        return None;
    }
    let mut n: usize = 0;
    for c in letters.chars() {
        if !c.is_ascii_alphabetic() {
            return None;
        }
        let d = (c.to_ascii_uppercase() as u8 - b'A') as usize + 1;
        n = n.checked_mul(26)?.checked_add(d)?;
    }
    Some(n)
}

/// `'tab'!A<first_row>:<last col>`, open-ended downward.
pub fn rows_from(tab: &str, first_row: u32, n_cols: usize) -> String {
    format!(
        "{}!A{}:{}",
        quote_tab(tab), first_row, column_letters(n_cols)
    )
}

/// `'tab'!A<row>:<last col><row>`, exactly one row.
pub fn single_row(tab: &str, row: u32, n_cols: usize) -> String {
    let last = column_letters(n_cols);
    format!("{}!A{}:{}{}", quote_tab(tab), row, last, row)
}

/// `'tab'!A:<last col>`, the whole table.
pub fn columns(tab: &str, n_cols: usize) -> String {
    format!("{}!A:{}", quote_tab(tab), column_letters(n_cols))
}

/// A parsed range reference. Columns are 1-based; rows are 1-based sheet rows.
#[derive(Debug, Clone, PartialEq)]
pub struct A1Range {
    pub tab: String,
    pub first_col: usize,
    pub first_row: u32,
    /// `None` means "to the last column".
    pub last_col: Option<usize>,
    /// `None` means "to the last row".
    pub last_row: Option<u32>,
}

fn parse_cell(s: &str) -> Result<(Option<usize>, Option<u32>), String> {
    let split = s.find(|c: char| c.is_ascii_digit()).unwrap_or(s.len());
    let (letters, digits) = s.split_at(split);
    let col = match letters {
        "" => None,
        x => Some(column_number(x).ok_or_else(|| format!("Bad column {:?}.", x))?),
    };
    let row = match digits {
        "" => None,
        x => Some(x.parse::<u32>().map_err(|e| format!("Bad row {:?}: {}", x, &e))?),
    };
    Ok((col, row))
}

/// Split a range reference into its tab name and cell part, undoing quoting.
fn split_tab(s: &str) -> Result<(String, Option<&str>), String> {
    if let Some(rest) = s.strip_prefix('\'') {
        let mut tab = String::new();
        let mut chars = rest.char_indices().peekable();
        while let Some((i, c)) = chars.next() {
            if c == '\'' {
                if let Some((_, '\'')) = chars.peek() {
                    tab.push('\'');
                    chars.next();
                    continue;
                }
                let after = &rest[i + 1..];
                return match after.strip_prefix('!') {
                    Some(cells) => Ok((tab, Some(cells))),
                    None if after.is_empty() => Ok((tab, None)),
                    None => Err(format!("Unexpected text after tab name in {:?}.", s)),
                };
            }
            tab.push(c);
        }
        Err(format!("Unterminated tab name in {:?}.", s))
    } else {
        match s.split_once('!') {
            Some((tab, cells)) => Ok((tab.to_owned(), Some(cells))),
            None => Ok((s.to_owned(), None)),
        }
    }
}

pub fn parse(s: &str) -> Result<A1Range, String> {
    let (tab, cells) = split_tab(s)?;
    let cells = match cells {
        None => {
            return Ok(A1Range {
                tab, first_col: 1, first_row: 1, last_col: None, last_row: None,
            });
        },
        Some(cells) => cells,
    };

    let (start, end) = match cells.split_once(':') {
        Some((a, b)) => (a, Some(b)),
        None => (cells, None),
    };

    let (c0, r0) = parse_cell(start)?;
    let (last_col, last_row) = match end {
        Some(end) => parse_cell(end)?,
        None => (c0, r0),
    };

    Ok(A1Range {
        tab,
        first_col: c0.unwrap_or(1),
        first_row: r0.unwrap_or(1),
        last_col,
        last_row,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quotes_are_doubled() {
        assert_eq!(quote_tab("Users"), "'Users'");
        assert_eq!(quote_tab("O'Brien"), "'O''Brien'");
        assert_eq!(rows_from("O'Brien", 2, 6), "'O''Brien'!A2:F");
    }

    #[test]
    fn column_letters_both_ways() {
        for (n, s) in [(1, "A"), (8, "H"), (26, "Z"), (27, "AA"), (52, "AZ"), (53, "BA")] {
            assert_eq!(column_letters(n), s);
            assert_eq!(column_number(s), Some(n));
        }
        assert_eq!(column_number(""), None);
        assert_eq!(column_number("A1"), None);
    }

    #[test]
    fn parse_ranges() {
        let r = parse("'O''Brien'!A2:F").unwrap();
        assert_eq!(r, A1Range {
            tab: "O'Brien".to_owned(),
            first_col: 1, first_row: 2, last_col: Some(6), last_row: None,
        });

        let r = parse(&single_row("Users", 5, 8)).unwrap();
        assert_eq!((r.first_row, r.last_row, r.last_col), (5, Some(5), Some(8)));

        let r = parse("Fines!A:A").unwrap();
        assert_eq!((r.tab.as_str(), r.first_row, r.last_col), ("Fines", 1, Some(1)));

        let r = parse("'Groups'").unwrap();
        assert_eq!((r.tab.as_str(), r.last_col, r.last_row), ("Groups", None, None));

        assert!(parse("'Unterminated!A1").is_err());
    }
}

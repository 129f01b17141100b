//! Parsing of the interactive file selection (`1,3,5-7`, `all`, `exit`).

use std::collections::BTreeSet;

use crate::error::{Result, ShareError};

/// What the user asked for at the selection prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    /// Download everything.
    All,
    /// Stop without downloading.
    Exit,
    /// Nothing entered; ask again.
    Empty,
    /// These listing indices, ascending.
    Indices(BTreeSet<usize>),
}

/// Parse a selection against a listing of `count` files.
///
/// ```
/// use sharepoint_link::selection::{parse_selection, Selection};
///
/// let sel = parse_selection("0,2-3", 5).unwrap();
/// assert_eq!(sel, Selection::Indices([0, 2, 3].into_iter().collect()));
/// assert_eq!(parse_selection("all", 5).unwrap(), Selection::All);
/// assert!(parse_selection("4-2", 5).is_err());
/// ```
pub fn parse_selection(input: &str, count: usize) -> Result<Selection> {
    let trimmed = input.trim();
    match trimmed {
        "" => return Ok(Selection::Empty),
        "all" => return Ok(Selection::All),
        "exit" => return Ok(Selection::Exit),
        _ => {}
    }

    let invalid = || ShareError::InvalidSelection(input.to_string());
    let index = |s: &str| -> Result<usize> {
        s.trim()
            .parse::<usize>()
            .ok()
            .filter(|&n| n < count)
            .ok_or_else(invalid)
    };

    let mut selected = BTreeSet::new();
    for part in trimmed.split(',') {
        match part.split_once('-') {
            Some((begin, end)) => {
                let (begin, end) = (index(begin)?, index(end)?);
                if end < begin {
                    return Err(invalid());
                }
                selected.extend(begin..=end);
            }
            None => {
                selected.insert(index(part)?);
            }
        }
    }

    Ok(Selection::Indices(selected))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn indices(v: &[usize]) -> Selection {
        Selection::Indices(v.iter().copied().collect())
    }

    #[test]
    fn test_keywords() {
        assert_eq!(parse_selection("", 3).unwrap(), Selection::Empty);
        assert_eq!(parse_selection("  all ", 3).unwrap(), Selection::All);
        assert_eq!(parse_selection("exit", 3).unwrap(), Selection::Exit);
    }

    #[test]
    fn test_single_and_ranges() {
        assert_eq!(parse_selection("1,3,5-7", 8).unwrap(), indices(&[1, 3, 5, 6, 7]));
        assert_eq!(parse_selection("2 , 2-3", 4).unwrap(), indices(&[2, 3]));
        assert_eq!(parse_selection("0-0", 1).unwrap(), indices(&[0]));
    }

    #[test]
    fn test_out_of_range() {
        assert!(parse_selection("3", 3).is_err());
        assert!(parse_selection("1-3", 3).is_err());
    }

    #[test]
    fn test_garbage() {
        let err = parse_selection("1,x", 3).unwrap_err();
        assert!(matches!(err, ShareError::InvalidSelection(_)));
        assert!(parse_selection("-1", 3).is_err());
        assert!(parse_selection("2-1", 3).is_err());
        assert!(parse_selection("1,", 3).is_err());
    }
}

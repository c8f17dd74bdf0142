//! Selection syntax for numbered records
//!
//! A selection is a comma-separated list of bare numbers and inclusive
//! ranges: `"1-3,5,7-9"`. Used for bulk wallet removal and for picking
//! wallets to mine with.

use std::collections::BTreeSet;

use crate::error::{Error, Result};

/// Upper bound on a single range span; keeps a typo like `1-99999999`
/// from materializing millions of entries.
const MAX_RANGE_SPAN: u32 = 10_000;

/// Parse a selection string into an ascending, de-duplicated number list.
///
/// Ranges are normalized so the smaller bound comes first (`"5-1"` means
/// `1..=5`). Any malformed part fails the whole parse; callers must not
/// mutate anything on error.
pub fn parse_selection(selection: &str) -> Result<Vec<u32>> {
    let mut selected: BTreeSet<u32> = BTreeSet::new();

    for part in selection.split(',') {
        let part = part.trim();
        if part.is_empty() {
            return Err(Error::Validation(format!(
                "empty entry in selection '{selection}'"
            )));
        }

        if let Some((start, end)) = part.split_once('-') {
            let start = parse_number(start.trim(), part)?;
            let end = parse_number(end.trim(), part)?;
            let (lo, hi) = if start <= end {
                (start, end)
            } else {
                (end, start)
            };

            if hi - lo >= MAX_RANGE_SPAN {
                return Err(Error::Validation(format!(
                    "range '{part}' spans more than {MAX_RANGE_SPAN} entries"
                )));
            }

            selected.extend(lo..=hi);
        } else {
            selected.insert(parse_number(part, part)?);
        }
    }

    if selected.is_empty() {
        return Err(Error::Validation("selection is empty".to_string()));
    }

    Ok(selected.into_iter().collect())
}

fn parse_number(text: &str, part: &str) -> Result<u32> {
    let number: u32 = text
        .parse()
        .map_err(|_| Error::Validation(format!("invalid number format: {part}")))?;

    if number == 0 {
        return Err(Error::Validation(format!(
            "numbering starts at 1, got '{part}'"
        )));
    }

    Ok(number)
}

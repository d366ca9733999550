//! Extraction of catalog entries from the listing page.
//!
//! The listing page initialises its catalog in one inline script line:
//!
//! ```text
//! <script type='text/javascript'>refcardzNodes = new Array(); refcardzNode = new Object();
//!   refcardzNode["number"] = "12"; refcardzNode["title"] = "Core Java";
//!   refcardzNodes["345"] = refcardzNode; ...
//! ```
//!
//! (all on a single line in the real page). Three independent patterns pick
//! out numbers, titles and ids, and the n-th match of each is assumed to
//! belong to the n-th entry.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;

use crate::catalog::{Catalog, CatalogEntry};
use crate::error::{Error, Result};

/// Substring identifying the line that carries the embedded catalog.
pub const CATALOG_SCRIPT_MARKER: &str =
    "<script type='text/javascript'>refcardzNodes = new Array()";

static NUMBER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"refcardzNode\["number"\] = "(\d+)""#).expect("valid regex")
});

static TITLE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"refcardzNode\["title"\] = "([^"]+)""#).expect("valid regex")
});

static ID_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"refcardzNodes\["(\d+)"\] = refcardzNode;"#).expect("valid regex")
});

/// One (number, title, id) group found in the catalog script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingTriple {
    /// Display number.
    pub number: u32,
    /// Title text as it appears in the script.
    pub title: String,
    /// Remote id.
    pub id: u32,
}

/// Pairs up the n-th number, title and id matches of one script line.
///
/// The three scans are independent: when their match counts differ the
/// extra matches of the longer scans are dropped and a warning is logged,
/// and groups after the first missing field may be misaligned. No attempt is
/// made to detect that.
///
/// # Errors
///
/// Returns [`Error::Parse`] if a matched number or id does not fit in `u32`.
pub fn extract_triples(line: &str, line_no: usize) -> Result<Vec<ListingTriple>> {
    let numbers: Vec<&str> = captures(&NUMBER_RE, line).collect();
    let titles: Vec<&str> = captures(&TITLE_RE, line).collect();
    let ids: Vec<&str> = captures(&ID_RE, line).collect();

    if numbers.len() != titles.len() || titles.len() != ids.len() {
        log::warn!(
            "Listing line {line_no}: {} numbers, {} titles, {} ids; extra matches ignored",
            numbers.len(),
            titles.len(),
            ids.len()
        );
    }

    numbers
        .into_iter()
        .zip(titles)
        .zip(ids)
        .map(|((number, title), id)| {
            Ok(ListingTriple {
                number: parse_field(number, "number", line_no)?,
                title: title.to_string(),
                id: parse_field(id, "id", line_no)?,
            })
        })
        .collect()
}

fn captures<'h>(re: &'h Regex, line: &'h str) -> impl Iterator<Item = &'h str> {
    re.captures_iter(line)
        .filter_map(|c| c.get(1))
        .map(|m| m.as_str())
}

fn parse_field(raw: &str, column: &'static str, line: usize) -> Result<u32> {
    raw.parse().map_err(|_| Error::Parse {
        line,
        column,
        value: raw.to_string(),
    })
}

/// Returns the entries of the listing page that `known` does not contain yet,
/// in page order. Each id is reported at most once.
///
/// # Errors
///
/// Returns [`Error::Parse`] if a matched number or id does not fit in `u32`.
pub fn find_new_entries(html: &str, known: &Catalog) -> Result<Vec<CatalogEntry>> {
    let mut seen = HashSet::new();
    let mut found = Vec::new();

    for (i, line) in html.lines().enumerate() {
        if !line.contains(CATALOG_SCRIPT_MARKER) {
            continue;
        }
        log::debug!("Catalog script on line {} ({} bytes)", i + 1, line.len());
        for triple in extract_triples(line, i + 1)? {
            if known.contains(triple.id) || !seen.insert(triple.id) {
                continue;
            }
            found.push(CatalogEntry::new(triple.number, triple.title, triple.id));
        }
    }

    Ok(found)
}

//! The persisted catalog of known entries.
//!
//! On disk the catalog is one tab-separated record per line with the fixed
//! column order `number`, `title`, `id`, `filename`; no header row. Missing
//! trailing columns take their zero value and an empty `filename` column
//! means the artifact name has not been resolved yet. Records are always
//! written sorted by `number`.

use std::collections::HashMap;
use std::fmt;
use std::path::Path;

use crate::error::{Error, Result};

/// One document listed by the remote catalog.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CatalogEntry {
    /// Display order; the sort key of the persisted catalog.
    pub number: u32,
    /// Human-readable label.
    pub title: String,
    /// Stable remote identifier.
    pub id: u32,
    filename: Option<String>,
}

impl CatalogEntry {
    /// Creates an entry whose artifact filename is not yet known.
    #[must_use]
    pub fn new(number: u32, title: impl Into<String>, id: u32) -> Self {
        Self {
            number,
            title: title.into(),
            id,
            filename: None,
        }
    }

    /// Sets the filename at construction time.
    #[must_use]
    pub fn with_filename(mut self, filename: impl Into<String>) -> Self {
        self.attach_filename(filename);
        self
    }

    /// The resolved artifact filename, if any.
    #[must_use]
    pub fn filename(&self) -> Option<&str> {
        self.filename.as_deref()
    }

    /// Records the resolved artifact filename.
    ///
    /// Resolution is one-shot: once a filename is known it is kept, and an
    /// empty name never counts as resolved. Returns whether the entry changed.
    pub fn attach_filename(&mut self, filename: impl Into<String>) -> bool {
        if self.filename.is_some() {
            return false;
        }
        let filename = filename.into();
        if filename.is_empty() {
            return false;
        }
        self.filename = Some(filename);
        true
    }

    /// Encodes the entry as one catalog record, without line terminator.
    ///
    /// Tabs and line breaks inside the title are replaced by spaces so the
    /// record keeps its four columns.
    #[must_use]
    pub fn encode(&self) -> String {
        let title: String = self
            .title
            .chars()
            .map(|c| if matches!(c, '\t' | '\n' | '\r') { ' ' } else { c })
            .collect();
        format!(
            "{}\t{}\t{}\t{}",
            self.number,
            title,
            self.id,
            self.filename.as_deref().unwrap_or("")
        )
    }

    /// Decodes one catalog record. `line_no` is only used in errors.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Parse`] if the `number` or `id` column is not numeric.
    pub fn decode(record: &str, line_no: usize) -> Result<Self> {
        let mut columns = record.trim_end_matches('\r').split('\t');
        let number = parse_column(columns.next(), "number", line_no)?;
        let title = columns.next().unwrap_or_default().to_string();
        let id = parse_column(columns.next(), "id", line_no)?;
        let filename = columns
            .next()
            .filter(|f| !f.is_empty())
            .map(str::to_string);
        Ok(Self {
            number,
            title,
            id,
            filename,
        })
    }
}

fn parse_column(column: Option<&str>, name: &'static str, line: usize) -> Result<u32> {
    match column {
        None | Some("") => Ok(0),
        Some(raw) => raw.trim().parse().map_err(|_| Error::Parse {
            line,
            column: name,
            value: raw.to_string(),
        }),
    }
}

impl fmt::Display for CatalogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "no:{} id:{} filename:[{}] title:[{}]",
            self.number,
            self.id,
            self.filename.as_deref().unwrap_or(""),
            self.title
        )
    }
}

/// The set of known entries, ordered and indexed by id.
///
/// Every entry in the list has exactly one index slot and vice versa.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    entries: Vec<CatalogEntry>,
    index: HashMap<u32, usize>,
}

impl Catalog {
    /// Creates an empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a catalog from entries; later duplicates of an id are dropped.
    #[must_use]
    pub fn from_entries(entries: impl IntoIterator<Item = CatalogEntry>) -> Self {
        let mut catalog = Self::new();
        for entry in entries {
            let id = entry.id;
            if !catalog.insert(entry) {
                log::warn!("Ignoring duplicate catalog entry for id {id}");
            }
        }
        catalog
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the catalog has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns true if an entry with this id is known.
    #[must_use]
    pub fn contains(&self, id: u32) -> bool {
        self.index.contains_key(&id)
    }

    /// Looks up an entry by id.
    #[must_use]
    pub fn get(&self, id: u32) -> Option<&CatalogEntry> {
        self.index.get(&id).map(|&i| &self.entries[i])
    }

    /// Looks up an entry by id for mutation.
    pub fn get_mut(&mut self, id: u32) -> Option<&mut CatalogEntry> {
        self.index.get(&id).map(|&i| &mut self.entries[i])
    }

    /// Adds an entry unless its id is already known. Returns whether it was added.
    pub fn insert(&mut self, entry: CatalogEntry) -> bool {
        if self.index.contains_key(&entry.id) {
            return false;
        }
        self.index.insert(entry.id, self.entries.len());
        self.entries.push(entry);
        true
    }

    /// Entries in their current order.
    #[must_use]
    pub fn entries(&self) -> &[CatalogEntry] {
        &self.entries
    }

    /// Iterates over the entries in their current order.
    pub fn iter(&self) -> impl Iterator<Item = &CatalogEntry> {
        self.entries.iter()
    }

    /// Sorts entries by `number` (stable) and rebuilds the index.
    pub fn sort_by_number(&mut self) {
        self.entries.sort_by_key(|e| e.number);
        self.index = self
            .entries
            .iter()
            .enumerate()
            .map(|(i, e)| (e.id, i))
            .collect();
    }

    /// Parses catalog text. Blank lines are skipped.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Parse`] on the first malformed record.
    pub fn parse(text: &str) -> Result<Self> {
        let mut entries = Vec::new();
        for (i, line) in text.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            entries.push(CatalogEntry::decode(line, i + 1)?);
        }
        let mut catalog = Self::from_entries(entries);
        catalog.sort_by_number();
        Ok(catalog)
    }

    /// Encodes every entry, one `\n`-terminated record per line, sorted by `number`.
    #[must_use]
    pub fn encode(&self) -> String {
        let mut sorted: Vec<&CatalogEntry> = self.entries.iter().collect();
        sorted.sort_by_key(|e| e.number);
        sorted.iter().fold(String::new(), |mut out, entry| {
            out.push_str(&entry.encode());
            out.push('\n');
            out
        })
    }

    /// Loads the catalog from `path`; a missing file is an empty catalog.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or a record is malformed.
    pub fn load(path: &Path) -> Result<Self> {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::info!("No catalog at {}, starting empty", path.display());
                return Ok(Self::new());
            }
            Err(e) => return Err(e.into()),
        };
        log::info!("Loading catalog from [{}]", path.display());
        let catalog = Self::parse(&text)?;
        log::info!("{} entries loaded", catalog.len());
        Ok(catalog)
    }

    /// Saves the catalog to `path` atomically (write tmp + rename).
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let mut tmp_name = path.as_os_str().to_owned();
        tmp_name.push(".tmp");
        let tmp_path = Path::new(&tmp_name);

        std::fs::write(tmp_path, self.encode())?;
        std::fs::rename(tmp_path, path)?;
        log::debug!("Saved {} entries to {}", self.len(), path.display());
        Ok(())
    }
}

impl<'a> IntoIterator for &'a Catalog {
    type Item = &'a CatalogEntry;
    type IntoIter = std::slice::Iter<'a, CatalogEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_full_record() {
        let entry = CatalogEntry::decode("12\tCore Java\t345\trc012-corejava.pdf", 1).unwrap();
        assert_eq!(entry.number, 12);
        assert_eq!(entry.title, "Core Java");
        assert_eq!(entry.id, 345);
        assert_eq!(entry.filename(), Some("rc012-corejava.pdf"));
    }

    #[test]
    fn decode_missing_trailing_columns() {
        let entry = CatalogEntry::decode("12\tCore Java", 1).unwrap();
        assert_eq!(entry.id, 0);
        assert_eq!(entry.filename(), None);

        let entry = CatalogEntry::decode("7", 1).unwrap();
        assert_eq!(entry, CatalogEntry::new(7, "", 0));
    }

    #[test]
    fn empty_filename_column_is_absent_and_reencodes_empty() {
        let entry = CatalogEntry::decode("3\tGit\t99\t", 1).unwrap();
        assert_eq!(entry.filename(), None);
        assert_eq!(entry.encode(), "3\tGit\t99\t");
        assert!(!entry.encode().contains("null"));
    }

    #[test]
    fn decode_keeps_empty_title_position() {
        let entry = CatalogEntry::decode("3\t\t99\tgit.pdf", 1).unwrap();
        assert_eq!(entry.title, "");
        assert_eq!(entry.id, 99);
        assert_eq!(entry.filename(), Some("git.pdf"));
    }

    #[test]
    fn decode_rejects_non_numeric_id() {
        let err = CatalogEntry::decode("3\tGit\tabc\t", 4).unwrap_err();
        match err {
            Error::Parse { line, column, value } => {
                assert_eq!(line, 4);
                assert_eq!(column, "id");
                assert_eq!(value, "abc");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn decode_strips_carriage_return() {
        let entry = CatalogEntry::decode("1\tA\t2\ta.pdf\r", 1).unwrap();
        assert_eq!(entry.filename(), Some("a.pdf"));
    }

    #[test]
    fn encode_flattens_tabs_in_title() {
        let entry = CatalogEntry::new(1, "a\tb\nc", 2);
        assert_eq!(entry.encode(), "1\ta b c\t2\t");
    }

    #[test]
    fn filename_is_one_shot() {
        let mut entry = CatalogEntry::new(1, "A", 2);
        assert!(!entry.attach_filename(""));
        assert_eq!(entry.filename(), None);
        assert!(entry.attach_filename("a.pdf"));
        assert!(!entry.attach_filename("b.pdf"));
        assert_eq!(entry.filename(), Some("a.pdf"));
    }

    #[test]
    fn display_format() {
        let entry = CatalogEntry::new(5, "Spring", 77).with_filename("s.pdf");
        assert_eq!(entry.to_string(), "no:5 id:77 filename:[s.pdf] title:[Spring]");
    }

    #[test]
    fn insert_rejects_known_id() {
        let mut catalog = Catalog::new();
        assert!(catalog.insert(CatalogEntry::new(1, "A", 10)));
        assert!(!catalog.insert(CatalogEntry::new(2, "B", 10)));
        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog.get(10).unwrap().title, "A");
    }

    #[test]
    fn sort_keeps_index_consistent() {
        let mut catalog = Catalog::from_entries([
            CatalogEntry::new(30, "C", 3),
            CatalogEntry::new(10, "A", 1),
            CatalogEntry::new(20, "B", 2),
        ]);
        catalog.sort_by_number();
        let numbers: Vec<u32> = catalog.iter().map(|e| e.number).collect();
        assert_eq!(numbers, vec![10, 20, 30]);
        for entry in &catalog {
            assert_eq!(catalog.get(entry.id), Some(entry));
        }
        catalog.get_mut(3).unwrap().attach_filename("c.pdf");
        assert_eq!(catalog.entries()[2].filename(), Some("c.pdf"));
    }

    #[test]
    fn encode_sorts_by_number() {
        let catalog = Catalog::from_entries([
            CatalogEntry::new(2, "B", 20),
            CatalogEntry::new(1, "A", 10).with_filename("a.pdf"),
        ]);
        assert_eq!(catalog.encode(), "1\tA\t10\ta.pdf\n2\tB\t20\t\n");
    }

    #[test]
    fn parse_skips_blank_lines_and_reports_line_numbers() {
        let catalog = Catalog::parse("1\tA\t10\t\n\n2\tB\t20\tb.pdf\n").unwrap();
        assert_eq!(catalog.len(), 2);

        let err = Catalog::parse("1\tA\t10\t\nx\tB\t20\t\n").unwrap_err();
        assert!(matches!(err, Error::Parse { line: 2, column: "number", .. }));
    }

    #[test]
    fn parse_keeps_first_duplicate() {
        let catalog = Catalog::parse("1\tA\t10\ta.pdf\n2\tA2\t10\t\n").unwrap();
        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog.get(10).unwrap().filename(), Some("a.pdf"));
    }

    #[test]
    fn load_missing_file_is_empty() {
        let dir = tempfile::TempDir::new().unwrap();
        let catalog = Catalog::load(&dir.path().join("none.csv")).unwrap();
        assert!(catalog.is_empty());
    }

    #[test]
    fn save_and_load() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("catalog.csv");
        let catalog = Catalog::from_entries([
            CatalogEntry::new(2, "Docker", 20),
            CatalogEntry::new(1, "Git", 10).with_filename("rc001-git.pdf"),
        ]);
        catalog.save(&path).unwrap();

        let on_disk = std::fs::read_to_string(&path).unwrap();
        assert_eq!(on_disk, "1\tGit\t10\trc001-git.pdf\n2\tDocker\t20\t\n");
        assert!(!dir.path().join("catalog.csv.tmp").exists());

        let loaded = Catalog::load(&path).unwrap();
        assert_eq!(loaded.entries(), catalog_sorted(&catalog).as_slice());
    }

    #[test]
    fn save_overwrites_previous_catalog() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("catalog.csv");
        std::fs::write(&path, "9\tOld\t90\t\n8\tOlder\t80\t\n").unwrap();
        Catalog::from_entries([CatalogEntry::new(1, "New", 1)])
            .save(&path)
            .unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "1\tNew\t1\t\n");
    }

    fn catalog_sorted(catalog: &Catalog) -> Vec<CatalogEntry> {
        let mut entries = catalog.entries().to_vec();
        entries.sort_by_key(|e| e.number);
        entries
    }

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        fn entries_strategy() -> impl Strategy<Value = Vec<CatalogEntry>> {
            proptest::collection::btree_map(
                any::<u32>(),
                (
                    any::<u32>(),
                    "[A-Za-z0-9 .:#+-]{0,24}",
                    proptest::option::of("[a-z0-9_.-]{1,16}"),
                ),
                0..24,
            )
            .prop_map(|by_id| {
                let mut entries: Vec<CatalogEntry> = by_id
                    .into_iter()
                    .map(|(id, (number, title, filename))| {
                        let entry = CatalogEntry::new(number, title, id);
                        match filename {
                            Some(f) => entry.with_filename(f),
                            None => entry,
                        }
                    })
                    .collect();
                entries.sort_by_key(|e| e.number);
                entries
            })
        }

        proptest! {
            #[test]
            fn save_load_save_is_identity(entries in entries_strategy()) {
                let first = Catalog::from_entries(entries.clone()).encode();
                let reloaded = Catalog::parse(&first).unwrap();
                prop_assert_eq!(reloaded.entries(), entries.as_slice());
                prop_assert_eq!(reloaded.encode(), first);
            }

            #[test]
            fn decode_never_panics(line in "\\PC{0,64}") {
                let _ = CatalogEntry::decode(&line, 1);
            }
        }
    }
}

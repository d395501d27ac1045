//! Street names and the "does this name change need announcing?" query.
//!
//! Names are interned as ids; id 0 is reserved for the empty name. Two ids
//! denote the same street when their names agree up to case and up to the
//! suffix words of a [`SuffixTable`], so "Market St" continues "Market Street"
//! without an announcement.

use std::collections::HashSet;
use std::sync::OnceLock;

/// Interned street-name id. 0 means "no name".
pub type NameId = u32;

/// The reserved id of the empty name.
pub const EMPTY_NAME_ID: NameId = 0;

/// Id-indexed street names. Index 0 always holds the empty name.
#[derive(Debug, Clone)]
pub struct NameTable {
    names: Vec<String>,
}

impl NameTable {
    pub fn new() -> Self {
        Self {
            names: vec![String::new()],
        }
    }

    /// Intern a name, returning its id. Repeated inserts of the same string
    /// return the already assigned id.
    pub fn insert(&mut self, name: &str) -> NameId {
        if name.is_empty() {
            return EMPTY_NAME_ID;
        }
        if let Some(position) = self.names.iter().position(|known| known == name) {
            return position as NameId;
        }
        self.names.push(name.to_owned());
        (self.names.len() - 1) as NameId
    }

    /// Look up a name; unknown ids read as the empty name.
    pub fn get(&self, id: NameId) -> &str {
        self.names.get(id as usize).map(String::as_str).unwrap_or("")
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        // Index 0 is always occupied by the empty name.
        self.names.len() <= 1
    }
}

impl Default for NameTable {
    fn default() -> Self {
        Self::new()
    }
}

/// Case-insensitive set of words that do not distinguish street names.
#[derive(Debug, Clone)]
pub struct SuffixTable {
    suffixes: HashSet<String>,
}

impl SuffixTable {
    pub fn new<I, S>(suffixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            suffixes: suffixes
                .into_iter()
                .map(|suffix| suffix.as_ref().to_ascii_lowercase())
                .collect(),
        }
    }

    /// An empty table: every word distinguishes.
    pub fn empty() -> Self {
        Self::new(std::iter::empty::<&str>())
    }

    /// The built-in table of common English street suffixes and cardinal
    /// directions, built once and shared.
    pub fn standard() -> &'static SuffixTable {
        static STANDARD: OnceLock<SuffixTable> = OnceLock::new();
        STANDARD.get_or_init(|| {
            SuffixTable::new([
                "street", "st", "road", "rd", "avenue", "ave", "boulevard", "blvd", "lane",
                "ln", "drive", "dr", "way", "court", "ct", "place", "pl", "north", "south",
                "east", "west", "n", "s", "e", "w",
            ])
        })
    }

    pub fn is_suffix(&self, word: &str) -> bool {
        self.suffixes.contains(&word.to_ascii_lowercase())
    }
}

/// Whether moving from name `a` to name `b` requires a spoken announcement.
///
/// False iff both ids denote the same street: identical ids, equal names up
/// to case, or equal after trimming leading and trailing suffix words. A
/// transition between an empty and a non-empty name is always announced.
pub fn requires_name_announced(
    a: NameId,
    b: NameId,
    names: &NameTable,
    suffixes: &SuffixTable,
) -> bool {
    if a == b {
        return false;
    }
    let first = names.get(a);
    let second = names.get(b);
    if first.is_empty() && second.is_empty() {
        return false;
    }
    if first.is_empty() != second.is_empty() {
        return true;
    }
    if first.eq_ignore_ascii_case(second) {
        return false;
    }
    core_words(first, suffixes) != core_words(second, suffixes)
}

/// Lowercased words of a name with suffix words stripped from both ends.
/// A name consisting purely of suffix words keeps all of them, so "West
/// Street" stays distinguishable from "North Road".
fn core_words(name: &str, suffixes: &SuffixTable) -> Vec<String> {
    let words: Vec<String> = name
        .split_whitespace()
        .map(str::to_ascii_lowercase)
        .collect();
    let mut first = 0;
    let mut last = words.len();
    while first < last && suffixes.is_suffix(&words[first]) {
        first += 1;
    }
    while last > first && suffixes.is_suffix(&words[last - 1]) {
        last -= 1;
    }
    if first == last {
        return words;
    }
    words[first..last].to_vec()
}

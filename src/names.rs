//! Bidirectional string interning table.
//!
//! Every identifier in a circuit description - reserved words, device
//! names, port suffixes - is represented elsewhere in the crate by a
//! [`NameId`] rather than by its text. [`Names`] is the single place that
//! maps between the two, and also hands out the disjoint integer ranges
//! the other subsystems use as error codes.

use indexmap::IndexSet;

/// Opaque handle for an interned string.
///
/// Deliberately not a bare `usize`: every map keyed by device, port, or
/// keyword identity in this crate uses `NameId`, so an index into an
/// unrelated collection cannot be passed where a name is expected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NameId(usize);

impl NameId {
    fn from_index(index: usize) -> Self {
        NameId(index)
    }
}

impl std::fmt::Display for NameId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Programmer-misuse failure: an out-of-domain argument was supplied.
///
/// Unlike source errors (malformed circuit descriptions) and simulation
/// errors (oscillation), this is a defect in the calling code and is
/// never recovered from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArgumentError {
    /// `unique_error_codes` was asked for a count that would overflow
    /// the running allocation total.
    ErrorCodeCountOverflow,
}

/// Reserved words pre-interned at construction, in keyword/grammar order.
///
/// Pre-interning means their ids are stable for the lifetime of a
/// [`Names`] table and known to the scanner and parser without a lookup
/// round-trip.
pub const RESERVED_WORDS: &[&str] = &[
    "DEVICES", "CONNECTIONS", "MONITORS", "END",
    "AND", "NAND", "OR", "NOR", "XOR", "DTYPE",
    "SWITCH", "CLOCK", "SIGGEN", "RC",
    "CLK", "SET", "CLEAR", "DATA", "Q", "QBAR",
    "I1", "I2", "I3", "I4", "I5", "I6", "I7", "I8",
    "I9", "I10", "I11", "I12", "I13", "I14", "I15", "I16",
];

/// Maps variable names and string names to unique integers.
///
/// Mirrors the prototype's `Names` class: an append-only list of strings
/// plus a running count of error codes allocated by other subsystems.
#[derive(Debug)]
pub struct Names {
    names_list: IndexSet<String>,
    error_code_count: usize,
}

impl Names {
    /// Creates a table with the reserved words already interned.
    pub fn new() -> Self {
        let mut names = Names {
            names_list: IndexSet::new(),
            error_code_count: 0,
        };
        names.lookup(RESERVED_WORDS);
        names
    }

    /// Returns a name id for each string, inserting any not already
    /// present. Insertion order defines the id, so repeated calls with
    /// the same string are idempotent.
    pub fn lookup(&mut self, strings: &[&str]) -> Vec<NameId> {
        strings
            .iter()
            .map(|s| {
                let (index, _) = self.names_list.insert_full(s.to_string());
                NameId::from_index(index)
            })
            .collect()
    }

    /// Returns the id for `string` without inserting it.
    pub fn query(&self, string: &str) -> Option<NameId> {
        self.names_list.get_index_of(string).map(NameId::from_index)
    }

    /// Returns the string for `id`, or `None` if it is out of range.
    pub fn get_name_string(&self, id: NameId) -> Option<&str> {
        self.names_list.get_index(id.0).map(|s| s.as_str())
    }

    /// Allocates `count` fresh, mutually distinct error codes and
    /// returns them as a contiguous range.
    pub fn unique_error_codes(&mut self, count: usize) -> Result<std::ops::Range<usize>, ArgumentError> {
        let new_total = self
            .error_code_count
            .checked_add(count)
            .ok_or(ArgumentError::ErrorCodeCountOverflow)?;
        let range = self.error_code_count..new_total;
        self.error_code_count = new_total;
        Ok(range)
    }

    /// Looks up the id already assigned to a reserved word.
    ///
    /// Panics if `word` is not a member of [`RESERVED_WORDS`]; this is a
    /// programmer error in the scanner/parser, never user input.
    pub fn reserved(&self, word: &str) -> NameId {
        self.query(word)
            .unwrap_or_else(|| panic!("'{}' is not a pre-interned reserved word", word))
    }
}

impl Default for Names {
    fn default() -> Self {
        Names::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_round_trips_through_get_name_string() {
        let mut names = Names::new();
        let ids = names.lookup(&["sw1"]);
        assert_eq!(names.get_name_string(ids[0]), Some("sw1"));
    }

    #[test]
    fn lookup_is_idempotent() {
        let mut names = Names::new();
        let first = names.lookup(&["a"]);
        let second = names.lookup(&["a"]);
        assert_eq!(first, second);
    }

    #[test]
    fn query_is_none_until_looked_up() {
        let mut names = Names::new();
        assert_eq!(names.query("a"), None);
        names.lookup(&["a"]);
        assert!(names.query("a").is_some());
    }

    #[test]
    fn unique_error_codes_are_disjoint() {
        let mut names = Names::new();
        let a = names.unique_error_codes(3).unwrap();
        let b = names.unique_error_codes(2).unwrap();
        assert!(a.end <= b.start);
    }

    #[test]
    fn out_of_range_id_returns_none() {
        let names = Names::new();
        let bogus = NameId::from_index(10_000);
        assert_eq!(names.get_name_string(bogus), None);
    }

    #[test]
    fn reserved_words_are_preinterned() {
        let names = Names::new();
        for word in RESERVED_WORDS {
            assert!(names.query(word).is_some(), "{} not preinterned", word);
        }
    }
}

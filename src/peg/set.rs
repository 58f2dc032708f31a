//! Sets of chars, kept as sorted, merged ranges.
//!
//! Keeping them normalized means two sets with the same members are `==`, however they were
//! written: `{'a', 'b', 'c'}` and `{'a'..'c'}` are the same set.

use std::{cmp::Ordering, fmt};

use itertools::Itertools;

#[derive(Derivative, Clone, Default, PartialEq, Eq, Hash)]
#[derivative(Debug)]
pub struct CharSet {
    /// Inclusive, sorted, and no two touch or overlap.
    #[derivative(Debug(format_with = "CharSet::ranges_formatter"))]
    ranges: Vec<(char, char)>,
}

impl CharSet {
    /// The set with nothing in it. Matching against it always fails.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a set from inclusive ranges. Backwards ranges are ignored.
    pub fn from_ranges<I: IntoIterator<Item = (char, char)>>(ranges: I) -> Self {
        let mut ranges = ranges
            .into_iter()
            .filter(|(lo, hi)| {
                debug_assert!(lo <= hi, "backwards range {:?}..{:?}", lo, hi);
                lo <= hi
            })
            .collect_vec();
        ranges.sort_unstable();

        // Merge anything overlapping or adjacent.
        let ranges = ranges
            .into_iter()
            .coalesce(|(alo, ahi), (blo, bhi)| {
                // If there's no successor, `a` runs to the end and swallows everything after it.
                if successor(ahi).map_or(true, |next| blo <= next) {
                    Ok((alo, ahi.max(bhi)))
                } else {
                    Err(((alo, ahi), (blo, bhi)))
                }
            })
            .collect();
        Self { ranges }
    }

    pub fn from_chars<I: IntoIterator<Item = char>>(chars: I) -> Self {
        Self::from_ranges(chars.into_iter().map(|c| (c, c)))
    }

    pub fn union(&self, other: &CharSet) -> Self {
        Self::from_ranges(self.ranges.iter().chain(other.ranges.iter()).copied())
    }

    pub fn contains(&self, c: char) -> bool {
        self.ranges
            .binary_search_by(|&(lo, hi)| {
                if hi < c {
                    Ordering::Less
                } else if lo > c {
                    Ordering::Greater
                } else {
                    Ordering::Equal
                }
            })
            .is_ok()
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    pub fn ranges(&self) -> &[(char, char)] {
        &self.ranges
    }

    #[allow(clippy::ptr_arg)]
    fn ranges_formatter(ranges: &Vec<(char, char)>, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{{{}}}",
            ranges
                .iter()
                .map(|&(lo, hi)| if lo == hi {
                    format!("{:?}", lo)
                } else {
                    format!("{:?}..{:?}", lo, hi)
                })
                .join(", ")
        )
    }
}

/// The next char up, hopping over the surrogate gap.
fn successor(c: char) -> Option<char> {
    match c as u32 {
        0xD7FF => Some('\u{E000}'),
        n => std::char::from_u32(n + 1),
    }
}

#[test]
fn normalizes() {
    let spelled_out = CharSet::from_chars("cabba".chars());
    let ranged = CharSet::from_ranges(vec![('a', 'c')]);
    assert_eq!(spelled_out, ranged);
    assert_eq!(ranged.ranges(), &[('a', 'c')]);

    let overlapping = CharSet::from_ranges(vec![('m', 'z'), ('a', 'n'), ('0', '9')]);
    assert_eq!(overlapping.ranges(), &[('0', '9'), ('a', 'z')]);

    let gap = CharSet::from_ranges(vec![('\u{D000}', '\u{D7FF}'), ('\u{E000}', '\u{E001}')]);
    assert_eq!(gap.ranges(), &[('\u{D000}', '\u{E001}')]);
    let top = CharSet::from_ranges(vec![(char::MAX, char::MAX), ('a', 'b')]);
    assert_eq!(top.ranges(), &[('a', 'b'), (char::MAX, char::MAX)]);
}

#[test]
fn membership() {
    let set = CharSet::from_ranges(vec![('a', 'c'), ('x', 'x'), ('0', '9')]);
    for c in "abcx05".chars() {
        assert!(set.contains(c), "{:?}", c);
    }
    for c in "dwyA/:".chars() {
        assert!(!set.contains(c), "{:?}", c);
    }
    assert!(!CharSet::empty().contains('a'));
    assert!(CharSet::empty().is_empty());
}

#[test]
fn unions() {
    let lower = CharSet::from_ranges(vec![('a', 'c')]);
    let upper = CharSet::from_ranges(vec![('A', 'C')]);
    assert_eq!(lower.union(&upper), CharSet::from_chars("abcABC".chars()));
    assert!(format!("{:?}", lower.union(&upper)).contains("{'A'..'C', 'a'..'c'}"));
}

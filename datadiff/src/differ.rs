//! Identifier-level comparison of the two sides of a narrowed range.

use std::collections::BTreeMap;
use std::fmt;

use crate::histogram::RecordId;

/// Where an identifier was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Presence {
    OnlyPrimary,
    Both,
    OnlySecondary,
}

impl Presence {
    /// Numeric code used in the textual report: `-1`, `0` or `1`.
    pub fn code(self) -> i8 {
        match self {
            Presence::OnlyPrimary => -1,
            Presence::Both => 0,
            Presence::OnlySecondary => 1,
        }
    }
}

/// An identifier present on exactly one side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IdMismatch {
    pub id: RecordId,
    pub presence: Presence,
}

impl IdMismatch {
    pub fn new(id: RecordId, presence: Presence) -> Self {
        Self { id, presence }
    }
}

/// Renders the mismatch as a report line body: `<id>,<code>`.
impl fmt::Display for IdMismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.id, self.presence.code())
    }
}

/// Compares two identifier lists and returns the identifiers found on one side only.
///
/// Duplicates within a side collapse. The result is sorted by identifier and never
/// contains [`Presence::Both`].
pub fn diff_ids(primary: &[RecordId], secondary: &[RecordId]) -> Vec<IdMismatch> {
    let mut presence: BTreeMap<RecordId, Presence> = primary
        .iter()
        .map(|&id| (id, Presence::OnlyPrimary))
        .collect();

    for &id in secondary {
        presence
            .entry(id)
            .and_modify(|seen| {
                if *seen == Presence::OnlyPrimary {
                    *seen = Presence::Both;
                }
            })
            .or_insert(Presence::OnlySecondary);
    }

    presence
        .into_iter()
        .filter(|(_, presence)| *presence != Presence::Both)
        .map(|(id, presence)| IdMismatch::new(id, presence))
        .collect()
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn reports_asymmetric_identifiers() {
        let mismatches = diff_ids(&[1, 2, 3, 4, 5, 7], &[1, 2, 3, 4, 5, 6]);

        assert_eq!(
            mismatches,
            vec![
                IdMismatch::new(6, Presence::OnlySecondary),
                IdMismatch::new(7, Presence::OnlyPrimary),
            ]
        );
        assert_eq!(mismatches[0].to_string(), "6,1");
        assert_eq!(mismatches[1].to_string(), "7,-1");
    }

    #[test]
    fn duplicates_collapse() {
        assert!(diff_ids(&[3, 3, 4], &[4, 3, 4]).is_empty());
        assert_eq!(
            diff_ids(&[9, 9], &[]),
            vec![IdMismatch::new(9, Presence::OnlyPrimary)]
        );
    }

    #[test]
    fn empty_sides_produce_nothing() {
        assert!(diff_ids(&[], &[]).is_empty());
    }

    proptest! {
        #[test]
        fn mismatches_are_the_symmetric_difference(
            primary in prop::collection::vec(-200i64..200, 0..60),
            secondary in prop::collection::vec(-200i64..200, 0..60),
        ) {
            let mismatches = diff_ids(&primary, &secondary);

            let p: BTreeSet<_> = primary.iter().copied().collect();
            let s: BTreeSet<_> = secondary.iter().copied().collect();

            let only_primary: BTreeSet<_> = p.difference(&s).copied().collect();
            let only_secondary: BTreeSet<_> = s.difference(&p).copied().collect();

            prop_assert!(mismatches.iter().all(|m| m.presence != Presence::Both));
            prop_assert_eq!(mismatches.len(), only_primary.len() + only_secondary.len());

            for mismatch in &mismatches {
                match mismatch.presence {
                    Presence::OnlyPrimary => prop_assert!(only_primary.contains(&mismatch.id)),
                    Presence::OnlySecondary => prop_assert!(only_secondary.contains(&mismatch.id)),
                    Presence::Both => unreachable!(),
                }
            }

            prop_assert_eq!(diff_ids(&primary, &secondary), mismatches);
        }
    }
}

use thiserror::Error;

use crate::{chat::MIN_CHAT_FIELDS, game::SERVER_INFO_FIELDS, players::PLAYER_FIELDS};

/// A dump line that didn't carry enough tab separated fields to be parsed.
/// These are always skipped by the caller and never surfaced further.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("Malformed record: expected at least {expected} fields, found {found}")]
pub struct MalformedRecordError {
    pub expected: usize,
    pub found: usize,
}

/// Ensures a split record carries at least `expected` fields.
///
/// # Errors
/// If the record is too short
pub const fn require_fields(fields: &[&str], expected: usize) -> Result<(), MalformedRecordError> {
    if fields.len() < expected {
        return Err(MalformedRecordError {
            expected,
            found: fields.len(),
        });
    }

    Ok(())
}

/// Splits a dump into its carriage return separated records, each split into
/// its tab separated fields. Blank records are skipped.
pub fn records(dump: &str) -> impl Iterator<Item = Vec<&str>> {
    dump.split('\r')
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .map(|r| r.split('\t').collect())
}

/// The shape of a response as far as it can be told from the response alone.
/// The protocol has no request identifiers, so every dump is recognized by the
/// number of fields in its first record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseKind {
    Players,
    ServerInfo,
    Chat,
    State,
    VipList,
    MapList,
    Other,
}

impl ResponseKind {
    #[must_use]
    pub fn identify(response: &str) -> Self {
        let first = response.split('\r').next().unwrap_or_default();
        let fields = first.trim().split('\t').count();

        match fields {
            PLAYER_FIELDS => Self::Players,
            SERVER_INFO_FIELDS => Self::ServerInfo,
            n if n == MIN_CHAT_FIELDS || n == MIN_CHAT_FIELDS + 1 => Self::Chat,
            _ if response.len() == 1 => Self::State,
            2 => Self::VipList,
            1 if first
                .split('\n')
                .next()
                .is_some_and(|l| l.split(' ').count() == 3) =>
            {
                Self::MapList
            }
            _ => Self::Other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(n: usize) -> String {
        vec!["x"; n].join("\t")
    }

    #[test]
    fn identifies_by_field_count() {
        assert_eq!(ResponseKind::identify(&fields(48)), ResponseKind::Players);
        assert_eq!(ResponseKind::identify(&fields(32)), ResponseKind::ServerInfo);
        assert_eq!(ResponseKind::identify(&fields(5)), ResponseKind::Chat);
        assert_eq!(ResponseKind::identify(&fields(6)), ResponseKind::Chat);
        assert_eq!(ResponseKind::identify(&fields(7)), ResponseKind::Other);
        assert_eq!(ResponseKind::identify(&fields(2)), ResponseKind::VipList);
        assert_eq!(ResponseKind::identify("1"), ResponseKind::State);
        assert_eq!(ResponseKind::identify("map mode size\nnext map"), ResponseKind::MapList);
        assert_eq!(ResponseKind::identify("unknown command"), ResponseKind::Other);
    }

    #[test]
    fn only_first_record_decides() {
        let dump = format!("{}\r{}", fields(48), fields(3));
        assert_eq!(ResponseKind::identify(&dump), ResponseKind::Players);
    }

    #[test]
    fn short_records_are_rejected() {
        let err = require_fields(&["a", "b"], 5).unwrap_err();
        assert_eq!(err, MalformedRecordError { expected: 5, found: 2 });
        assert!(require_fields(&["a"; 5], 5).is_ok());
    }

    #[test]
    fn blank_records_are_skipped() {
        let split: Vec<Vec<&str>> = records("a\tb\r\r  \rc").collect();
        assert_eq!(split, vec![vec!["a", "b"], vec!["c"]]);
    }
}

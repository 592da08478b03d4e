use std::fmt;
use std::str::FromStr;

use once_cell::sync::Lazy;
use regex::Regex;
use time::Date;

use crate::model::format_compact_date;

const LABEL_CHARS: usize = 7;

static SNIPPET_ID_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d{8}-\d{2,}$").expect("valid snippet id pattern"));

/// `YYYYMMDD-NN` identifier of a snippet.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SnippetId(String);

impl SnippetId {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn label(&self) -> String {
        short_label(&self.0)
    }

    pub fn sequence(&self) -> Option<u32> {
        sequence_suffix(&self.0)
    }
}

impl fmt::Display for SnippetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for SnippetId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("'{0}' is not a snippet id (expected YYYYMMDD-NN)")]
pub struct InvalidSnippetId(pub String);

impl FromStr for SnippetId {
    type Err = InvalidSnippetId;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let trimmed = raw.trim();
        if SNIPPET_ID_PATTERN.is_match(trimmed) {
            Ok(Self(trimmed.to_string()))
        } else {
            Err(InvalidSnippetId(raw.to_string()))
        }
    }
}

/// Next free id for `creation_date`: highest existing same-day suffix plus one.
///
/// Gaps left by deleted snippets are never reused, so a count of existing
/// ids is not a substitute for the maximum.
pub fn allocate<'a, I>(creation_date: Date, existing_ids: I) -> SnippetId
where
    I: IntoIterator<Item = &'a str>,
{
    let prefix = format_compact_date(creation_date);
    let max_seq = existing_ids
        .into_iter()
        .filter(|id| matches!(id.rsplit_once('-'), Some((day, _)) if day == prefix))
        .filter_map(sequence_suffix)
        .max()
        .unwrap_or(0);
    SnippetId(format!("{prefix}-{:02}", max_seq + 1))
}

/// Last seven characters of an id, used as the compact calendar label.
pub fn short_label(id: &str) -> String {
    let count = id.chars().count();
    if count <= LABEL_CHARS {
        return id.to_string();
    }
    id.chars().skip(count - LABEL_CHARS).collect()
}

fn sequence_suffix(id: &str) -> Option<u32> {
    let (_, suffix) = id.rsplit_once('-')?;
    suffix.trim().parse::<u32>().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::date;

    #[test]
    fn first_id_of_the_day_is_01() {
        let id = allocate(date!(2024 - 01 - 01), std::iter::empty());
        assert_eq!(id.as_str(), "20240101-01");
    }

    #[test]
    fn allocation_uses_max_suffix_not_count() {
        let existing = ["20240101-01", "20240101-02", "20240101-04", "20240101-05"];
        let id = allocate(date!(2024 - 01 - 01), existing.iter().copied());
        assert_eq!(id.as_str(), "20240101-06");
    }

    #[test]
    fn other_days_and_malformed_suffixes_are_ignored() {
        let existing = [
            "20231231-09",
            "20240101-xx",
            "20240101",
            "20240102-03",
            "20240101-02",
        ];
        let id = allocate(date!(2024 - 01 - 01), existing.iter().copied());
        assert_eq!(id.as_str(), "20240101-03");
    }

    #[test]
    fn longer_prefixes_are_not_the_same_day() {
        let existing = ["202401011-07", "20240101-02", "2024010-09"];
        let id = allocate(date!(2024 - 01 - 01), existing.iter().copied());
        assert_eq!(id.as_str(), "20240101-03");
    }

    #[test]
    fn sequence_grows_past_two_digits() {
        let existing = ["20240101-99"];
        let id = allocate(date!(2024 - 01 - 01), existing.iter().copied());
        assert_eq!(id.as_str(), "20240101-100");
        assert_eq!(id.sequence(), Some(100));
    }

    #[test]
    fn labels_keep_the_last_seven_characters() {
        assert_eq!(short_label("20240101-01"), "0101-01");
        assert_eq!(short_label("0101-01"), "0101-01");
        assert_eq!(short_label("abc"), "abc");
    }

    #[test]
    fn parsing_validates_the_id_shape() {
        assert!("20240101-01".parse::<SnippetId>().is_ok());
        assert!(" 20240101-12 ".parse::<SnippetId>().is_ok());
        assert_eq!(
            "2024-01-01".parse::<SnippetId>(),
            Err(InvalidSnippetId("2024-01-01".into()))
        );
        assert!("20240101-1".parse::<SnippetId>().is_err());
    }
}

use std::fmt;

pub const DEFAULT_OFFSETS: &str = "1,3,7,14,30";

/// Ordered review offsets in days. Duplicates are kept.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct OffsetList(Vec<u32>);

impl OffsetList {
    /// Parses comma-separated offsets, dropping tokens that are not
    /// non-negative integers.
    pub fn parse(raw: &str) -> Self {
        let mut offsets = Vec::new();
        for token in raw.split(',') {
            let token = token.trim();
            match token.parse::<u32>() {
                Ok(days) => offsets.push(days),
                Err(_) => {
                    tracing::debug!(token, "discarding offset token");
                }
            }
        }
        Self(offsets)
    }

    pub fn from_days(days: impl IntoIterator<Item = u32>) -> Self {
        Self(days.into_iter().collect())
    }

    pub fn days(&self) -> &[u32] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

impl fmt::Display for OffsetList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let joined = self
            .0
            .iter()
            .map(|days| days.to_string())
            .collect::<Vec<_>>()
            .join(",");
        f.write_str(&joined)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_offsets_parse_in_order() {
        let offsets = OffsetList::parse(DEFAULT_OFFSETS);
        assert_eq!(offsets.days(), &[1, 3, 7, 14, 30]);
        assert_eq!(offsets.to_string(), DEFAULT_OFFSETS);
    }

    #[test]
    fn blank_and_non_numeric_tokens_are_dropped() {
        assert_eq!(OffsetList::parse("1,,abc,7").days(), &[1, 7]);
        assert_eq!(OffsetList::parse(" 2 , -1, 4.5, 9").days(), &[2, 9]);
    }

    #[test]
    fn duplicates_survive() {
        assert_eq!(OffsetList::parse("3,3,0").days(), &[3, 3, 0]);
    }

    #[test]
    fn nothing_usable_is_empty() {
        assert!(OffsetList::parse("").is_empty());
        assert!(OffsetList::parse("x, y").is_empty());
    }
}

pub const DEFAULT_TYPES: [&str; 4] = ["note", "vocab", "quote", "other"];

/// Snippet types a user may pick, in configured order. Never empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnippetTypeRegistry {
    names: Vec<String>,
}

impl SnippetTypeRegistry {
    /// Blank and case-insensitive duplicate names are dropped; an empty
    /// result falls back to the defaults.
    pub fn from_names<S: AsRef<str>>(names: &[S]) -> Self {
        let mut kept: Vec<String> = Vec::new();
        for name in names {
            let name = name.as_ref().trim();
            if name.is_empty() || kept.iter().any(|k| k.eq_ignore_ascii_case(name)) {
                continue;
            }
            kept.push(name.to_string());
        }
        if kept.is_empty() {
            return Self::default();
        }
        Self { names: kept }
    }

    /// Registered spelling of `name`, matched case-insensitively.
    pub fn resolve(&self, name: &str) -> Option<&str> {
        let name = name.trim();
        self.names
            .iter()
            .find(|known| known.eq_ignore_ascii_case(name))
            .map(String::as_str)
    }

    pub fn all(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }

    pub fn first(&self) -> &str {
        self.names.first().map(String::as_str).unwrap_or(DEFAULT_TYPES[0])
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Name following `current` in registry order, wrapping around.
    pub fn next_after(&self, current: &str) -> &str {
        let position = self
            .names
            .iter()
            .position(|known| known.eq_ignore_ascii_case(current.trim()));
        match position {
            Some(i) => &self.names[(i + 1) % self.names.len()],
            None => self.first(),
        }
    }
}

impl Default for SnippetTypeRegistry {
    fn default() -> Self {
        Self {
            names: DEFAULT_TYPES.iter().map(|name| name.to_string()).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_are_trimmed_deduplicated_and_resolved_case_insensitively() {
        let registry = SnippetTypeRegistry::from_names(&[" Vocab", "vocab", "", "idiom"]);
        assert_eq!(registry.all().collect::<Vec<_>>(), vec!["Vocab", "idiom"]);
        assert_eq!(registry.resolve("VOCAB"), Some("Vocab"));
        assert!(registry.resolve("note").is_none());
        assert_eq!(registry.next_after("idiom"), "Vocab");
        assert_eq!(registry.next_after("unknown"), "Vocab");
    }

    #[test]
    fn empty_lists_fall_back_to_defaults() {
        let registry = SnippetTypeRegistry::from_names::<&str>(&[]);
        assert_eq!(registry, SnippetTypeRegistry::default());
        assert_eq!(registry.first(), "note");
        assert_eq!(registry.len(), 4);
    }
}

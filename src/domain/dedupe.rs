use std::fmt;

/// Normalizes a display string for comparison purposes.
///
/// Lowercases, trims, and collapses internal whitespace runs to a single
/// space, so that `"Alice   Smith"` and `"alice smith"` compare equal.
#[must_use]
pub fn normalize(s: &str) -> String {
    s.to_lowercase().split_whitespace().collect::<Vec<_>>().join(" ")
}

/// The uniqueness handle for a request.
///
/// Two requests are duplicates when their normalized student name, song
/// title, and artist all match. The key is the three normalized parts
/// joined with `|`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DedupeKey(String);

impl DedupeKey {
    /// Builds the key from the three raw display strings.
    #[must_use]
    pub fn new(student: &str, song: &str, artist: &str) -> Self {
        Self(format!(
            "{}|{}|{}",
            normalize(student),
            normalize(song),
            normalize(artist)
        ))
    }

    /// Returns the key as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DedupeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;

    #[test_case("Alice Smith", "alice smith"; "case folded")]
    #[test_case("  Alice Smith  ", "alice smith"; "trimmed")]
    #[test_case("Alice   Smith", "alice smith"; "internal runs collapsed")]
    #[test_case("Alice\tSmith", "alice smith"; "tabs collapsed")]
    #[test_case("", ""; "empty stays empty")]
    #[test_case("   ", ""; "blank stays empty")]
    fn normalize_cases(input: &str, expected: &str) {
        assert_eq!(normalize(input), expected);
    }

    #[test]
    fn keys_ignore_case_and_whitespace() {
        let a = DedupeKey::new("Alice Smith", "Song A", "Band X");
        let b = DedupeKey::new("alice   smith", "song a", "BAND X");
        assert_eq!(a, b);
    }

    #[test]
    fn keys_distinguish_different_requests() {
        let a = DedupeKey::new("Alice Smith", "Song A", "Band X");
        let b = DedupeKey::new("Alice Smith", "Song B", "Band X");
        assert_ne!(a, b);
    }

    #[test]
    fn key_joins_parts_with_pipes() {
        let key = DedupeKey::new("Alice", "Song", "Band");
        assert_eq!(key.as_str(), "alice|song|band");
    }
}

//! Client-generated session identifiers

use std::fmt;

use rand::Rng;

const SUFFIX_ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
const SUFFIX_LEN: usize = 7;

/// Opaque identifier of one connection attempt
///
/// Formatted as `gs_<unix millis>_<random base36>`; only uniqueness matters.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionId(String);

impl SessionId {
    /// Generate a fresh identifier
    #[must_use]
    pub fn generate() -> Self {
        let mut rng = rand::thread_rng();
        let suffix: String = (0..SUFFIX_LEN)
            .map(|_| char::from(SUFFIX_ALPHABET[rng.gen_range(0..SUFFIX_ALPHABET.len())]))
            .collect();
        Self(format!(
            "gs_{}_{suffix}",
            chrono::Utc::now().timestamp_millis()
        ))
    }

    /// The identifier as sent on the wire
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn has_expected_shape() {
        let id = SessionId::generate();
        let parts: Vec<&str> = id.as_str().split('_').collect();

        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "gs");
        assert!(parts[1].parse::<i64>().is_ok());
        assert_eq!(parts[2].len(), SUFFIX_LEN);
        assert!(parts[2].bytes().all(|b| SUFFIX_ALPHABET.contains(&b)));
    }

    #[test]
    fn identifiers_are_unique() {
        let ids: HashSet<SessionId> = (0..1000).map(|_| SessionId::generate()).collect();
        assert_eq!(ids.len(), 1000);
    }
}

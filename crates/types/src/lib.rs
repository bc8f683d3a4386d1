//! Validated text primitives shared across the APR workspace.
//!
//! Two wrapper types live here:
//!
//! - [`NonEmptyText`]: a string guaranteed to contain at least one
//!   non-whitespace character, used for human-facing fields (names,
//!   descriptions).
//! - [`RecordId`]: a document identifier safe to embed in a store path.
//!
//! Both validate on construction so downstream code can take their contents
//! for granted.

/// Errors that can occur when creating validated text types.
#[derive(Debug, thiserror::Error)]
pub enum TextError {
    /// The input text was empty or contained only whitespace
    #[error("Text cannot be empty")]
    Empty,
    /// The identifier contained a character that is not allowed in a store path
    #[error("Identifier contains forbidden character: {0:?}")]
    ForbiddenCharacter(char),
    /// The identifier exceeded the maximum permitted length
    #[error("Identifier exceeds {MAX_ID_LENGTH} characters")]
    TooLong,
}

/// Maximum length of a [`RecordId`], in characters.
pub const MAX_ID_LENGTH: usize = 128;

/// A string type that guarantees non-empty content.
///
/// This type wraps a `String` and ensures it contains at least one
/// non-whitespace character. The input is automatically trimmed of leading
/// and trailing whitespace during construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NonEmptyText(String);

impl NonEmptyText {
    /// Creates a new `NonEmptyText` from the given input.
    ///
    /// The input is trimmed of leading and trailing whitespace. If the trimmed
    /// result is empty, an error is returned.
    ///
    /// # Errors
    ///
    /// Returns `TextError::Empty` if the trimmed input is empty or contains
    /// only whitespace.
    pub fn new(input: impl AsRef<str>) -> Result<Self, TextError> {
        let trimmed = input.as_ref().trim();
        if trimmed.is_empty() {
            return Err(TextError::Empty);
        }
        Ok(Self(trimmed.to_owned()))
    }

    /// Returns the inner string as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for NonEmptyText {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for NonEmptyText {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl serde::Serialize for NonEmptyText {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> serde::Deserialize<'de> for NonEmptyText {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        NonEmptyText::new(&s).map_err(serde::de::Error::custom)
    }
}

/// A validated document identifier.
///
/// Identifiers address documents inside the store, so they must never be
/// empty and must never contain a path separator. Callers supplying an empty
/// or malformed identifier are rejected here, before any store round-trip.
///
/// # Construction
///
/// [`RecordId::new`] validates an externally supplied identifier (CLI input,
/// API request path segment). Identifiers allocated by the store itself are
/// canonical UUIDs and always pass this validation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecordId(String);

impl RecordId {
    /// Validates and wraps a document identifier.
    ///
    /// # Errors
    ///
    /// - `TextError::Empty` if the trimmed input is empty.
    /// - `TextError::ForbiddenCharacter` if the input contains `/`,
    ///   whitespace or a control character.
    /// - `TextError::TooLong` if the input exceeds [`MAX_ID_LENGTH`]
    ///   characters.
    pub fn new(input: impl AsRef<str>) -> Result<Self, TextError> {
        let trimmed = input.as_ref().trim();
        if trimmed.is_empty() {
            return Err(TextError::Empty);
        }
        if trimmed.chars().count() > MAX_ID_LENGTH {
            return Err(TextError::TooLong);
        }
        if let Some(bad) = trimmed
            .chars()
            .find(|c| *c == '/' || c.is_whitespace() || c.is_control())
        {
            return Err(TextError::ForbiddenCharacter(bad));
        }
        Ok(Self(trimmed.to_owned()))
    }

    /// Returns the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RecordId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for RecordId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::str::FromStr for RecordId {
    type Err = TextError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl serde::Serialize for RecordId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> serde::Deserialize<'de> for RecordId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        RecordId::new(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_empty_text_trims_and_accepts() {
        let text = NonEmptyText::new("  Ana Souza  ").expect("valid text");
        assert_eq!(text.as_str(), "Ana Souza");
    }

    #[test]
    fn non_empty_text_rejects_whitespace_only() {
        let err = NonEmptyText::new("   \t").expect_err("expected rejection");
        assert!(matches!(err, TextError::Empty));
    }

    #[test]
    fn record_id_accepts_simple_identifiers() {
        for id in ["p1", "proc1", "550e8400e29b41d4a716446655440000"] {
            RecordId::new(id).expect("valid id");
        }
    }

    #[test]
    fn record_id_rejects_empty() {
        let err = RecordId::new("").expect_err("expected rejection");
        assert!(matches!(err, TextError::Empty));
    }

    #[test]
    fn record_id_rejects_path_separator() {
        let err = RecordId::new("patients/p1").expect_err("expected rejection");
        assert!(matches!(err, TextError::ForbiddenCharacter('/')));
    }

    #[test]
    fn record_id_rejects_interior_whitespace() {
        let err = RecordId::new("p 1").expect_err("expected rejection");
        assert!(matches!(err, TextError::ForbiddenCharacter(' ')));
    }

    #[test]
    fn record_id_survives_serde_round_trip() {
        let id = RecordId::new("proc1").expect("valid id");
        let json = serde_json::to_string(&id).expect("serialize");
        let back: RecordId = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(id, back);
    }
}

//! Filters for key listings.

/// Filter for `GET /cmd/keys`.
///
/// Patterns are kept in their delimited textual form (`/^user\./`); the
/// listing request strips exactly the first and last character before sending
/// the source as the `keys` query parameter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum KeyFilter {
    /// List every key.
    #[default]
    None,
    /// Plain filter text, sent as-is.
    Text(String),
    /// Delimited pattern literal such as `/^user\./`.
    Pattern(String),
}

impl KeyFilter {
    /// Build a pattern filter from an undelimited regular expression source.
    pub fn pattern<S: AsRef<str>>(source: S) -> Self {
        KeyFilter::Pattern(format!("/{}/", source.as_ref()))
    }

    /// The value of the `keys` query parameter, `None` when no filter applies.
    pub fn query_value(&self) -> Option<String> {
        match self {
            KeyFilter::None => None,
            KeyFilter::Text(text) => Some(text.clone()),
            KeyFilter::Pattern(literal) => Some(strip_delimiters(literal).to_string()),
        }
    }
}

/// Drop exactly the first and the last character of `literal`.
fn strip_delimiters(literal: &str) -> &str {
    let mut chars = literal.chars();
    chars.next();
    chars.next_back();
    chars.as_str()
}

impl From<&str> for KeyFilter {
    fn from(value: &str) -> Self {
        KeyFilter::Text(value.to_string())
    }
}

impl From<String> for KeyFilter {
    fn from(value: String) -> Self {
        KeyFilter::Text(value)
    }
}

impl From<Option<&str>> for KeyFilter {
    fn from(value: Option<&str>) -> Self {
        value.map_or(KeyFilter::None, KeyFilter::from)
    }
}

impl From<&regex::Regex> for KeyFilter {
    fn from(value: &regex::Regex) -> Self {
        KeyFilter::pattern(value.as_str())
    }
}

impl From<regex::Regex> for KeyFilter {
    fn from(value: regex::Regex) -> Self {
        KeyFilter::from(&value)
    }
}

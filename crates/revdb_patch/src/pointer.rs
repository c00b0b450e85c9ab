//! RFC 6901 JSON pointers.

use std::fmt;
use std::str::FromStr;

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{PatchError, PatchResult};

/// A parsed JSON pointer such as `/tags/0` or `/a~1b`.
///
/// Tokens are stored unescaped; [`Display`](fmt::Display) re-applies the
/// `~0`/`~1` escapes. The empty pointer addresses the whole document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Pointer {
    tokens: Vec<String>,
}

impl Pointer {
    /// The pointer to the document root.
    #[must_use]
    pub fn root() -> Self {
        Self::default()
    }

    /// Builds a pointer from unescaped tokens.
    pub fn from_tokens<I, T>(tokens: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        Self {
            tokens: tokens.into_iter().map(Into::into).collect(),
        }
    }

    /// Parses pointer text.
    ///
    /// # Errors
    ///
    /// Returns [`PatchError::InvalidPointer`] if the text is non-empty and
    /// does not start with `/`, or contains a `~` not followed by `0` or `1`.
    pub fn parse(text: &str) -> PatchResult<Self> {
        if text.is_empty() {
            return Ok(Self::root());
        }
        let Some(rest) = text.strip_prefix('/') else {
            return Err(PatchError::invalid_pointer(text, "must start with '/'"));
        };
        let tokens = rest
            .split('/')
            .map(|raw| {
                unescape(raw).ok_or_else(|| PatchError::invalid_pointer(text, "bad '~' escape"))
            })
            .collect::<PatchResult<Vec<_>>>()?;
        Ok(Self { tokens })
    }

    /// Returns the unescaped tokens.
    #[must_use]
    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    /// Returns the number of tokens.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    /// Returns true for the root pointer.
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Appends a token.
    pub fn push(&mut self, token: impl Into<String>) {
        self.tokens.push(token.into());
    }

    /// Returns a new pointer one level deeper.
    #[must_use]
    pub fn child(&self, token: impl Into<String>) -> Self {
        let mut child = self.clone();
        child.push(token);
        child
    }

    /// Returns the parent pointer, or `None` for the root.
    #[must_use]
    pub fn parent(&self) -> Option<Self> {
        let (_, parent) = self.tokens.split_last()?;
        Some(Self {
            tokens: parent.to_vec(),
        })
    }

    /// Returns the last token, or `None` for the root.
    #[must_use]
    pub fn last(&self) -> Option<&str> {
        self.tokens.last().map(String::as_str)
    }

    /// Returns true if `self` equals `prefix` or lies beneath it.
    #[must_use]
    pub fn starts_with(&self, prefix: &Pointer) -> bool {
        self.tokens.starts_with(&prefix.tokens)
    }

    /// Returns true if `self` lies strictly beneath `ancestor`.
    #[must_use]
    pub fn is_beneath(&self, ancestor: &Pointer) -> bool {
        self.len() > ancestor.len() && self.starts_with(ancestor)
    }

    pub(crate) fn set_token(&mut self, position: usize, token: String) {
        self.tokens[position] = token;
    }
}

fn unescape(raw: &str) -> Option<String> {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c == '~' {
            match chars.next() {
                Some('0') => out.push('~'),
                Some('1') => out.push('/'),
                _ => return None,
            }
        } else {
            out.push(c);
        }
    }
    Some(out)
}

impl fmt::Display for Pointer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for token in &self.tokens {
            f.write_str("/")?;
            f.write_str(&token.replace('~', "~0").replace('/', "~1"))?;
        }
        Ok(())
    }
}

impl FromStr for Pointer {
    type Err = PatchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for Pointer {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Pointer {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        Self::parse(&text).map_err(de::Error::custom)
    }
}

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::contract::ValidationError;

/// Deepest split tree the harness accepts (2^16 leaves).
pub const MAX_SPLIT_DEPTH: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Branch {
    Left,
    Right,
}

impl Branch {
    pub fn digit(self) -> char {
        match self {
            Self::Left => '0',
            Self::Right => '1',
        }
    }
}

/// Position of a shard in the binary split tree.
///
/// Serialized as the string of `0`/`1` choices taken from the root, so the
/// root is the empty string and `"01"` is the right half of the left half.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SplitPath(String);

impl SplitPath {
    pub fn root() -> Self {
        Self(String::new())
    }

    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        let trimmed = raw.trim();
        if let Some(invalid) = trimmed.chars().find(|digit| !matches!(digit, '0' | '1')) {
            return Err(ValidationError::new(format!(
                "Split path '{trimmed}' contains invalid digit '{invalid}'"
            )));
        }
        if trimmed.len() > MAX_SPLIT_DEPTH {
            return Err(ValidationError::new(format!(
                "Split path '{trimmed}' exceeds MAX_SPLIT_DEPTH={MAX_SPLIT_DEPTH}"
            )));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn depth(&self) -> usize {
        self.0.len()
    }

    pub fn child(&self, branch: Branch) -> Self {
        let mut digits = String::with_capacity(self.0.len() + 1);
        digits.push_str(&self.0);
        digits.push(branch.digit());
        Self(digits)
    }

    pub fn children(&self) -> [Self; 2] {
        [self.child(Branch::Left), self.child(Branch::Right)]
    }

    pub fn ensure_within(&self, max_level: usize) -> Result<(), ValidationError> {
        if self.depth() > max_level {
            return Err(ValidationError::new(format!(
                "Split path '{}' is deeper than max_level={max_level}",
                self.0
            )));
        }
        Ok(())
    }
}

impl fmt::Display for SplitPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for SplitPath {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<SplitPath> for String {
    fn from(value: SplitPath) -> Self {
        value.0
    }
}

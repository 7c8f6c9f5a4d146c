//! Random opaque identifiers.
//!
//! Tokens name registered callbacks and installations. They are v4 UUIDs,
//! never derived from a counter, so a freed token cannot alias one issued
//! later. The only accepted text form is the 32-character lowercase
//! `simple` rendering.

use std::fmt;
use thiserror::Error;
use uuid::Uuid;

const TOKEN_CHARS: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Token(Uuid);

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenParseError {
    #[error("token must be {expected} hex characters, got {found}")]
    Length { expected: usize, found: usize },
    #[error("token is not lowercase hex")]
    InvalidHex,
}

impl Token {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn parse(s: &str) -> Result<Self, TokenParseError> {
        let s = s.trim();
        if s.len() != TOKEN_CHARS {
            return Err(TokenParseError::Length {
                expected: TOKEN_CHARS,
                found: s.len(),
            });
        }
        let uuid = Uuid::try_parse(s).map_err(|_| TokenParseError::InvalidHex)?;
        // One text form per token.
        if uuid.simple().to_string() != s {
            return Err(TokenParseError::InvalidHex);
        }
        Ok(Self(uuid))
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.simple())
    }
}

impl std::str::FromStr for Token {
    type Err = TokenParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

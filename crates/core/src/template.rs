//! Message template tokenizer and column validation.
//!
//! Templates use single-brace placeholders: `Hi {Name}, your order {Order} shipped`.
//! Only fully delimited `{key}` tokens are placeholders; a `{` that is not
//! closed before the next `{` (or the end of input) is literal text.

use crate::error::ValidationError;
use std::collections::HashSet;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    Literal(String),
    Placeholder(String),
}

/// A parsed template. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    source: String,
    tokens: Vec<Token>,
}

impl Template {
    pub fn parse(source: &str) -> Self {
        Self {
            source: source.to_string(),
            tokens: tokenize(source),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    /// Placeholder keys in order of appearance (repeats included).
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.tokens.iter().filter_map(|t| match t {
            Token::Placeholder(key) => Some(key.as_str()),
            Token::Literal(_) => None,
        })
    }

    /// Check every placeholder against the available columns.
    /// The first missing key short-circuits.
    pub fn validate(&self, columns: &HashSet<String>) -> Result<(), ValidationError> {
        match self.keys().find(|key| !columns.contains(*key)) {
            Some(key) => Err(ValidationError::MissingKey(key.to_string())),
            None => Ok(()),
        }
    }

    /// Substitute placeholders using `lookup`. Returns the first key the
    /// lookup cannot resolve as the error.
    pub fn render<'a, F>(&self, mut lookup: F) -> Result<String, String>
    where
        F: FnMut(&str) -> Option<&'a str>,
    {
        let mut out = String::with_capacity(self.source.len());
        for token in &self.tokens {
            match token {
                Token::Literal(text) => out.push_str(text),
                Token::Placeholder(key) => match lookup(key) {
                    Some(value) => out.push_str(value),
                    None => return Err(key.clone()),
                },
            }
        }
        Ok(out)
    }
}

/// Validate a raw template string against a column set.
pub fn validate(template: &str, columns: &HashSet<String>) -> Result<(), ValidationError> {
    Template::parse(template).validate(columns)
}

fn tokenize(source: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut literal = String::new();
    let mut rest = source;

    while let Some(open) = rest.find('{') {
        literal.push_str(&rest[..open]);
        let after = &rest[open + 1..];

        match after.find(['{', '}']) {
            Some(close) if after[close..].starts_with('}') => {
                if !literal.is_empty() {
                    tokens.push(Token::Literal(std::mem::take(&mut literal)));
                }
                tokens.push(Token::Placeholder(after[..close].to_string()));
                rest = &after[close + 1..];
            }
            // Another `{` opens before this one closes: this brace is text.
            Some(next_open) => {
                literal.push('{');
                literal.push_str(&after[..next_open]);
                rest = &after[next_open..];
            }
            None => {
                literal.push('{');
                literal.push_str(after);
                rest = "";
            }
        }
    }

    literal.push_str(rest);
    if !literal.is_empty() {
        tokens.push(Token::Literal(literal));
    }
    tokens
}

// Copyright 2019 Google LLC
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     https://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Tokens, the terminal values handed from a scanner to the parser.

use {
  crate::utils::{Name, ToDoc},
  std::hash::{Hash, Hasher},
};

/// A literal payload carried by a token, or computed into a tree node by a
/// traversal.
#[derive(Clone, PartialEq, Debug)]
pub enum Literal {
  None,
  Bool(bool),
  Int(i64),
  Float(f64),
  Str(String),
}

impl Literal {
  pub fn as_str(&self) -> Option<&str> {
    match self {
      Literal::Str(s) => Some(s),
      _ => None,
    }
  }

  pub fn as_int(&self) -> Option<i64> {
    match self {
      Literal::Int(i) => Some(*i),
      _ => None,
    }
  }

  /// Returns a numeric view of this literal, converting integers.
  pub fn as_float(&self) -> Option<f64> {
    match self {
      Literal::Int(i) => Some(*i as f64),
      Literal::Float(f) => Some(*f),
      _ => None,
    }
  }

  pub fn is_none(&self) -> bool {
    matches!(self, Literal::None)
  }
}

impl std::fmt::Display for Literal {
  fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
    match self {
      Literal::None => Ok(()),
      Literal::Bool(b) => write!(f, "{}", b),
      Literal::Int(i) => write!(f, "{}", i),
      Literal::Float(v) => write!(f, "{}", v),
      Literal::Str(s) => f.write_str(s),
    }
  }
}

impl From<&str> for Literal {
  fn from(s: &str) -> Self {
    Literal::Str(s.to_string())
  }
}

impl From<String> for Literal {
  fn from(s: String) -> Self {
    Literal::Str(s)
  }
}

impl From<i64> for Literal {
  fn from(i: i64) -> Self {
    Literal::Int(i)
  }
}

impl From<i32> for Literal {
  fn from(i: i32) -> Self {
    Literal::Int(i64::from(i))
  }
}

impl From<f64> for Literal {
  fn from(v: f64) -> Self {
    Literal::Float(v)
  }
}

impl From<bool> for Literal {
  fn from(b: bool) -> Self {
    Literal::Bool(b)
  }
}

/// A position in source text.
///
/// `line` and `column` are zero based; columns count grapheme clusters.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Default)]
pub struct TextPos {
  pub line: usize,
  pub column: usize,
  pub byte_offset: usize,
}

impl std::fmt::Display for TextPos {
  fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
    write!(f, "{}:{}", self.line + 1, self.column + 1)
  }
}

/// A terminal symbol instance.
///
/// Two tokens are equal when their kinds and attributes are equal; the
/// source position is ignored. A token also compares equal to a bare kind
/// string, which is convenient when checking a node's children.
#[derive(Clone, Debug)]
pub struct Token {
  kind: Name,
  attr: Literal,
  pos: Option<TextPos>,
}

impl Token {
  pub fn new(kind: impl Into<Name>, attr: impl Into<Literal>) -> Self {
    Token {
      kind: kind.into(),
      attr: attr.into(),
      pos: None,
    }
  }

  /// Creates a token carrying no payload.
  pub fn bare(kind: impl Into<Name>) -> Self {
    Token {
      kind: kind.into(),
      attr: Literal::None,
      pos: None,
    }
  }

  pub fn with_pos(mut self, pos: TextPos) -> Self {
    self.pos = Some(pos);
    self
  }

  pub fn kind(&self) -> &Name {
    &self.kind
  }

  pub fn attr(&self) -> &Literal {
    &self.attr
  }

  pub fn pos(&self) -> Option<TextPos> {
    self.pos
  }
}

impl PartialEq for Token {
  fn eq(&self, other: &Self) -> bool {
    self.kind == other.kind && self.attr == other.attr
  }
}

impl PartialEq<str> for Token {
  fn eq(&self, other: &str) -> bool {
    self.kind == *other
  }
}

impl PartialEq<&str> for Token {
  fn eq(&self, other: &&str) -> bool {
    self.kind == **other
  }
}

impl Hash for Token {
  fn hash<H: Hasher>(&self, state: &mut H) {
    self.kind.hash(state);
  }
}

impl std::fmt::Display for Token {
  fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
    if self.attr.is_none() {
      write!(f, "{}", self.kind)
    } else {
      write!(f, "{}: {}", self.kind, self.attr)
    }
  }
}

impl ToDoc for Token {
  fn to_doc<'a, DA: pretty::DocAllocator<'a>>(
    &self,
    da: &'a DA,
  ) -> pretty::DocBuilder<'a, DA> {
    da.text(self.to_string())
  }
}

#[cfg(test)]
mod test {
  use super::*;

  #[test]
  fn test_equality_ignores_position() {
    let a = Token::new("INTEGER", 1).with_pos(TextPos {
      line: 0,
      column: 4,
      byte_offset: 4,
    });
    let b = Token::new("INTEGER", 1);
    assert_eq!(a, b);
    assert_ne!(a, Token::new("INTEGER", 2));
  }

  #[test]
  fn test_compares_with_kind() {
    let t = Token::new("ADD_OP", "+");
    assert!(t == "ADD_OP");
    assert!(t != "MULT_OP");
  }

  #[test]
  fn test_display() {
    assert_eq!(Token::new("NUMBER", 12).to_string(), "NUMBER: 12");
    assert_eq!(Token::bare("COLON").to_string(), "COLON");
  }
}

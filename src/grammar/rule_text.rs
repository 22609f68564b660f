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

//! Parsing of declarative rule text.
//!
//! Rule text is a sequence of productions written as
//!
//! ```text
//! # comment lines are ignored
//! expr ::= expr ADD_OP term
//! expr ::= term | LPAREN expr RPAREN
//! stmts ::= stmt+
//! empty ::=
//! ```
//!
//! Symbols are separated by whitespace, and a production may span several
//! lines: every `::=` takes the symbol just before it as its left-hand side,
//! and its right-hand side runs until the symbol before the next `::=`.

use {super::GrammarError, crate::utils::Name};

const DERIVES: &str = "::=";
const ALTERNATIVE: &str = "|";

/// One alternative of a production, as written (operator suffixes are kept).
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct RuleText {
  pub lhs: Name,
  pub rhs: Vec<Name>,
}

/// A trailing extended operator on a right-hand side symbol.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub enum Operator {
  /// `X+`: one or more.
  Plus,
  /// `X*`: zero or more.
  Star,
  /// `X?`: zero or one.
  Opt,
}

impl Operator {
  fn from_char(c: char) -> Option<Self> {
    match c {
      '+' => Some(Operator::Plus),
      '*' => Some(Operator::Star),
      '?' => Some(Operator::Opt),
      _ => None,
    }
  }

  /// The suffix used to name a helper nonterminal for this operator.
  pub fn helper_suffix(self) -> &'static str {
    match self {
      Operator::Plus => "_plus",
      Operator::Star => "_star",
      Operator::Opt => "_opt",
    }
  }
}

/// Splits a symbol into its base name and its operator suffix, if any.
///
/// A symbol made only of operator characters, or carrying more than one
/// operator, is an error.
pub fn split_operator(
  symbol: &str,
) -> Result<(&str, Option<Operator>), GrammarError> {
  let bad = || GrammarError::BadOperator {
    symbol: symbol.to_string(),
  };
  match symbol.chars().last().and_then(Operator::from_char) {
    None => Ok((symbol, None)),
    Some(op) => {
      let base = &symbol[..symbol.len() - 1];
      let doubled = base.chars().last().and_then(Operator::from_char);
      if base.is_empty() || doubled.is_some() {
        Err(bad())
      } else {
        Ok((base, Some(op)))
      }
    }
  }
}

fn strip_comments(text: &str) -> impl Iterator<Item = &str> {
  text.lines().map(|line| match line.find('#') {
    Some(pos)
      if line[..pos]
        .chars()
        .last()
        .map_or(true, char::is_whitespace) =>
    {
      &line[..pos]
    }
    _ => line,
  })
}

fn malformed(text: &str, reason: impl Into<String>) -> GrammarError {
  GrammarError::MalformedRule {
    text: text.trim().to_string(),
    reason: reason.into(),
  }
}

/// Parses rule text into the list of alternatives it declares, in order.
pub fn parse_rules(text: &str) -> Result<Vec<RuleText>, GrammarError> {
  let words = strip_comments(text)
    .flat_map(str::split_whitespace)
    .collect::<Vec<_>>();

  let derives = words
    .iter()
    .enumerate()
    .filter(|(_, w)| **w == DERIVES)
    .map(|(i, _)| i)
    .collect::<Vec<_>>();

  match derives.first() {
    None if words.is_empty() => return Ok(Vec::new()),
    None => return Err(malformed(text, "no `::=' found")),
    Some(0) => return Err(malformed(text, "`::=' without a left-hand side")),
    Some(1) => {}
    Some(_) => {
      return Err(malformed(text, "symbols before the first left-hand side"))
    }
  }

  let mut result = Vec::new();
  for (n, &pos) in derives.iter().enumerate() {
    let lhs = words[pos - 1];
    if lhs == DERIVES || lhs == ALTERNATIVE {
      return Err(malformed(
        text,
        format!("`{}' is not a valid left-hand side", lhs),
      ));
    }
    if split_operator(lhs)?.1.is_some() {
      return Err(malformed(
        text,
        format!("left-hand side `{}' has an operator", lhs),
      ));
    }
    let end = match derives.get(n + 1) {
      Some(next) => next - 1,
      None => words.len(),
    };
    if end < pos + 1 {
      return Err(malformed(text, "`::=' has no left-hand side"));
    }

    let lhs = Name::new(lhs);
    for alt in words[pos + 1..end].split(|w| *w == ALTERNATIVE) {
      result.push(RuleText {
        lhs: lhs.clone(),
        rhs: alt.iter().map(Name::new).collect(),
      });
    }
  }

  Ok(result)
}

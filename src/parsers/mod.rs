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

use {
  crate::{
    grammar::{Grammar, Rule},
    token::Token,
    utils::Name,
  },
  std::{collections::BTreeSet, sync::Arc},
  unicode_segmentation::UnicodeSegmentation,
};

pub mod earley;

/// A child value handed to a semantic action: either the matched token, or
/// the value produced for a nonterminal.
#[derive(Clone, Debug, PartialEq)]
pub enum Arg<V> {
  Token(Token),
  Value(V),
}

impl<V> Arg<V> {
  pub fn as_token(&self) -> Option<&Token> {
    match self {
      Arg::Token(t) => Some(t),
      Arg::Value(_) => None,
    }
  }

  pub fn as_value(&self) -> Option<&V> {
    match self {
      Arg::Token(_) => None,
      Arg::Value(v) => Some(v),
    }
  }

  pub fn into_value(self) -> Option<V> {
    match self {
      Arg::Token(_) => None,
      Arg::Value(v) => Some(v),
    }
  }
}

/// A semantic action, invoked with the children of a completed rule.
pub type Action<V> = Arc<dyn Fn(Vec<Arg<V>>) -> V + Send + Sync>;

/// Produces values for rules that have no semantic action of their own.
pub trait TreeBuilder<V> {
  fn nonterminal(&self, grammar: &Grammar<V>, rule: &Rule, args: Vec<Arg<V>>)
    -> V;
}

impl<V, F> TreeBuilder<V> for F
where
  F: Fn(&Rule, Vec<Arg<V>>) -> V,
{
  fn nonterminal(
    &self,
    _grammar: &Grammar<V>,
    rule: &Rule,
    args: Vec<Arg<V>>,
  ) -> V {
    self(rule, args)
  }
}

/// Debug output controls for a parser. Output goes through the `log` facade,
/// so it is only visible when a logger is installed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParseOptions {
  /// Log the grammar's rules once before parsing.
  pub rules: bool,
  /// Log every item added to the chart.
  pub transitions: bool,
  /// Log every reduction applied while building the result.
  pub reductions: bool,
  /// Number of tokens shown on each side of a syntax error.
  pub error_context: usize,
}

impl Default for ParseOptions {
  fn default() -> Self {
    ParseOptions {
      rules: false,
      transitions: false,
      reductions: false,
      error_context: 3,
    }
  }
}

#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum ParseError {
  /// No parse covers the input. `token` is `None` when the input ended
  /// early.
  #[error("{}", describe_syntax_error(.token, .position))]
  Syntax {
    token: Option<Token>,
    position: usize,
    expected: BTreeSet<Name>,
  },
}

fn describe_syntax_error(token: &Option<Token>, position: &usize) -> String {
  match token {
    Some(t) => format!("Syntax error at or near `{}' (token {})", t, position),
    None => "Syntax error at end of input".to_string(),
  }
}

impl ParseError {
  pub fn position(&self) -> usize {
    match self {
      ParseError::Syntax { position, .. } => *position,
    }
  }

  pub fn token(&self) -> Option<&Token> {
    match self {
      ParseError::Syntax { token, .. } => token.as_ref(),
    }
  }

  pub fn expected(&self) -> &BTreeSet<Name> {
    match self {
      ParseError::Syntax { expected, .. } => expected,
    }
  }

  /// Renders up to `radius` tokens on each side of the error, with a caret
  /// under the offending token. Columns count graphemes.
  pub fn context(&self, tokens: &[Token], radius: usize) -> String {
    let position = self.position().min(tokens.len());
    let first = position.saturating_sub(radius);
    let last = (position + radius + 1).min(tokens.len());

    let mut line = String::new();
    let mut caret = 0;
    for (i, token) in tokens[first..last].iter().enumerate() {
      if !line.is_empty() {
        line.push(' ');
      }
      if first + i == position {
        caret = line.graphemes(true).count();
      }
      line.push_str(&token.to_string());
    }
    if position == tokens.len() {
      if !line.is_empty() {
        line.push(' ');
      }
      caret = line.graphemes(true).count();
      line.push_str("<EOF>");
    }
    format!("{}\n{}^", line, " ".repeat(caret))
  }
}

/// An Earley parser over a compiled grammar.
///
/// Rules with a semantic action produce their value through it; every other
/// rule goes to the tree builder. The grammar is only read, so one grammar
/// can back any number of parsers.
pub struct Parser<'g, V, B> {
  grammar: &'g Grammar<V>,
  builder: B,
  options: ParseOptions,
}

impl<'g, V, B> Parser<'g, V, B>
where
  B: TreeBuilder<V>,
{
  pub fn new(grammar: &'g Grammar<V>, builder: B) -> Self {
    Parser {
      grammar,
      builder,
      options: ParseOptions::default(),
    }
  }

  pub fn with_options(mut self, options: ParseOptions) -> Self {
    self.options = options;
    self
  }

  pub fn grammar(&self) -> &'g Grammar<V> {
    self.grammar
  }

  pub fn builder(&self) -> &B {
    &self.builder
  }

  pub fn options(&self) -> &ParseOptions {
    &self.options
  }

  /// Parses a complete token sequence into the value of the start symbol.
  pub fn parse(&self, tokens: &[Token]) -> Result<V, ParseError> {
    if self.options.rules {
      for rule in self.grammar.rules() {
        log::debug!("Rule: {}", rule);
      }
    }
    let chart = earley::Chart::recognize(self.grammar, tokens, &self.options)?;
    let mut forest = earley::forest::Forest::new(self.grammar, &chart, tokens);
    let root = forest
      .derive_root()
      .expect("recognized input always has a derivation");
    Ok(forest.evaluate(root, &self.builder, &self.options))
  }

  /// Formats a syntax error with the configured amount of context.
  pub fn describe_error(&self, err: &ParseError, tokens: &[Token]) -> String {
    format!(
      "{}\n{}",
      err,
      err.context(tokens, self.options.error_context)
    )
  }
}

#[cfg(test)]
mod test {
  use super::*;

  #[test]
  fn test_error_display() {
    let err = ParseError::Syntax {
      token: Some(Token::new("INTEGER", 2)),
      position: 1,
      expected: BTreeSet::new(),
    };
    assert_eq!(
      err.to_string(),
      "Syntax error at or near `INTEGER: 2' (token 1)"
    );

    let eof = ParseError::Syntax {
      token: None,
      position: 3,
      expected: BTreeSet::new(),
    };
    assert_eq!(eof.to_string(), "Syntax error at end of input");
  }

  #[test]
  fn test_error_context() {
    let tokens = vec![
      Token::new("INTEGER", 1),
      Token::new("INTEGER", 2),
      Token::bare("EOL"),
    ];
    let err = ParseError::Syntax {
      token: Some(tokens[1].clone()),
      position: 1,
      expected: BTreeSet::new(),
    };
    assert_eq!(
      err.context(&tokens, 1),
      "INTEGER: 1 INTEGER: 2 EOL\n           ^"
    );
  }

  #[test]
  fn test_error_context_counts_graphemes() {
    let tokens = vec![Token::new("NAME", "héé"), Token::new("INTEGER", 2)];
    let err = ParseError::Syntax {
      token: Some(tokens[1].clone()),
      position: 1,
      expected: BTreeSet::new(),
    };
    assert_eq!(
      err.context(&tokens, 1),
      format!("NAME: héé INTEGER: 2\n{}^", " ".repeat(10))
    );

    let eof = ParseError::Syntax {
      token: None,
      position: 2,
      expected: BTreeSet::new(),
    };
    assert_eq!(
      eof.context(&tokens, 2),
      format!("NAME: héé INTEGER: 2 <EOF>\n{}^", " ".repeat(21))
    );
  }
}

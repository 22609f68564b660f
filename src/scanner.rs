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

//! A table-driven scanner producing [`Token`]s for the parser.
//!
//! Patterns are tried in registration order at each position and the first
//! one that matches wins, whatever the length of later matches.

use {
  crate::{
    token::{Literal, TextPos, Token},
    utils::Name,
  },
  regex::Regex,
  std::sync::Arc,
  unicode_segmentation::UnicodeSegmentation,
};

/// Turns a matched lexeme into at most one token.
pub type ScanAction = Arc<dyn Fn(&str) -> Option<Token> + Send + Sync>;

#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum LexicalError {
  #[error("Lexical error at {position}: no token matches `{context}'")]
  NoMatch { position: TextPos, context: String },
  #[error("Pattern for {name} is invalid: {message}")]
  BadPattern { name: String, message: String },
  #[error("Pattern for {name} matched the empty string at {position}")]
  EmptyMatch { name: String, position: TextPos },
}

impl LexicalError {
  /// Renders the line the error is on with a caret under the position.
  pub fn caret(&self, text: &str) -> Option<String> {
    let position = match self {
      LexicalError::NoMatch { position, .. } => position,
      LexicalError::EmptyMatch { position, .. } => position,
      LexicalError::BadPattern { .. } => return None,
    };
    let line = text.lines().nth(position.line)?;
    Some(format!("{}\n{}^", line, " ".repeat(position.column)))
  }
}

struct ScanRule {
  name: Name,
  group: String,
  action: ScanAction,
}

/// Collects the scanner's patterns in priority order.
#[derive(Default)]
pub struct ScannerBuilder {
  rules: Vec<(Name, String, ScanAction)>,
}

impl ScannerBuilder {
  pub fn new() -> Self {
    Self::default()
  }

  /// Adds a pattern whose lexeme is handed to `action`.
  pub fn rule<F>(
    &mut self,
    name: impl Into<Name>,
    pattern: &str,
    action: F,
  ) -> &mut Self
  where
    F: Fn(&str) -> Option<Token> + Send + Sync + 'static,
  {
    self
      .rules
      .push((name.into(), pattern.to_string(), Arc::new(action)));
    self
  }

  /// Adds a pattern producing a `kind` token whose attribute is the lexeme.
  pub fn token(
    &mut self,
    kind: impl Into<Name>,
    pattern: &str,
  ) -> &mut Self {
    let kind = kind.into();
    let name = kind.clone();
    self.rule(name, pattern, move |s| {
      Some(Token::new(kind.clone(), Literal::from(s)))
    })
  }

  /// Adds a pattern whose matches produce no token.
  pub fn skip(&mut self, name: impl Into<Name>, pattern: &str) -> &mut Self {
    self.rule(name, pattern, |_| None)
  }

  pub fn build(&self) -> Result<Scanner, LexicalError> {
    let mut alternatives = Vec::with_capacity(self.rules.len());
    let mut rules = Vec::with_capacity(self.rules.len());
    for (i, (name, pattern, action)) in self.rules.iter().enumerate() {
      // Each pattern is checked alone first so errors name the culprit.
      Regex::new(pattern).map_err(|e| LexicalError::BadPattern {
        name: name.to_string(),
        message: e.to_string(),
      })?;
      let group = format!("r{}", i);
      alternatives.push(format!("(?P<{}>{})", group, pattern));
      rules.push(ScanRule {
        name: name.clone(),
        group,
        action: action.clone(),
      });
    }

    let combined = format!(r"\A(?:{})", alternatives.join("|"));
    let regex = Regex::new(&combined).map_err(|e| LexicalError::BadPattern {
      name: "<combined>".to_string(),
      message: e.to_string(),
    })?;
    Ok(Scanner { regex, rules })
  }
}

/// A compiled scanner. Scanning is read-only, so one scanner can be shared.
pub struct Scanner {
  regex: Regex,
  rules: Vec<ScanRule>,
}

impl std::fmt::Debug for Scanner {
  fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
    f.debug_struct("Scanner")
      .field("rules", &self.rules.iter().map(|r| &r.name).collect::<Vec<_>>())
      .finish()
  }
}

impl Scanner {
  pub fn builder() -> ScannerBuilder {
    ScannerBuilder::new()
  }

  /// Splits `text` into tokens. Fails at the first position no pattern
  /// matches; no tokens are returned in that case.
  pub fn tokenize(&self, text: &str) -> Result<Vec<Token>, LexicalError> {
    let mut tokens = Vec::new();
    let mut pos = TextPos::default();

    while pos.byte_offset < text.len() {
      let rest = &text[pos.byte_offset..];
      let caps = match self.regex.captures(rest) {
        Some(caps) => caps,
        None => {
          return Err(LexicalError::NoMatch {
            position: pos,
            context: rest.chars().take(10).collect(),
          })
        }
      };
      let (rule, lexeme) = self
        .rules
        .iter()
        .find_map(|r| caps.name(&r.group).map(|m| (r, m.as_str())))
        .expect("a match always comes from one alternative");

      if lexeme.is_empty() {
        return Err(LexicalError::EmptyMatch {
          name: rule.name.to_string(),
          position: pos,
        });
      }

      if let Some(token) = (rule.action)(lexeme) {
        log::trace!("Scanned {} at {}", token, pos);
        tokens.push(token.with_pos(pos));
      }
      pos = advance(pos, lexeme);
    }
    Ok(tokens)
  }
}

/// Moves `pos` past `lexeme`. Columns count grapheme clusters.
fn advance(mut pos: TextPos, lexeme: &str) -> TextPos {
  pos.byte_offset += lexeme.len();
  match lexeme.rfind('\n') {
    Some(i) => {
      pos.line += lexeme.matches('\n').count();
      pos.column = lexeme[i + 1..].graphemes(true).count();
    }
    None => pos.column += lexeme.graphemes(true).count(),
  }
  pos
}

#[cfg(test)]
mod test {
  use super::*;

  fn arith() -> Scanner {
    Scanner::builder()
      .skip("whitespace", r"\s+")
      .token("INTEGER", r"\d+")
      .token("ADD_OP", r"[+-]")
      .token("MULT_OP", r"[*/]")
      .build()
      .unwrap()
  }

  #[test]
  fn test_tokenize() {
    let tokens = arith().tokenize("1 + 23*4").unwrap();
    let kinds = tokens.iter().map(|t| t.kind().str()).collect::<Vec<_>>();
    assert_eq!(
      kinds,
      vec!["INTEGER", "ADD_OP", "INTEGER", "MULT_OP", "INTEGER"]
    );
    assert_eq!(tokens[2].attr().as_str(), Some("23"));
    assert_eq!(
      tokens[2].pos(),
      Some(TextPos {
        line: 0,
        column: 4,
        byte_offset: 4
      })
    );
  }

  #[test]
  fn test_first_alternative_wins() {
    let scanner = Scanner::builder()
      .token("WORD", r"[a-z]+")
      .token("IF", r"if")
      .build()
      .unwrap();
    let tokens = scanner.tokenize("if").unwrap();
    assert_eq!(tokens[0].kind(), "WORD");
  }

  #[test]
  fn test_positions_count_graphemes() {
    let scanner = Scanner::builder()
      .skip("space", r"\s+")
      .token("WORD", r"\w+")
      .build()
      .unwrap();
    let tokens = scanner.tokenize("héllo\n  wörld").unwrap();
    let pos = tokens[1].pos().unwrap();
    assert_eq!((pos.line, pos.column), (1, 2));
    assert_eq!(pos.byte_offset, 9);
  }

  #[test]
  fn test_lexical_error() {
    let err = arith().tokenize("1 + ?2").unwrap_err();
    match &err {
      LexicalError::NoMatch { position, context } => {
        assert_eq!(position.column, 4);
        assert_eq!(context, "?2");
      }
      other => panic!("unexpected error {:?}", other),
    }
    assert_eq!(err.caret("1 + ?2").unwrap(), "1 + ?2\n    ^");
  }

  #[test]
  fn test_bad_pattern() {
    let err = Scanner::builder().token("BAD", "(").build().unwrap_err();
    assert!(matches!(err, LexicalError::BadPattern { .. }));
  }

  #[test]
  fn test_custom_action() {
    let scanner = Scanner::builder()
      .rule("number", r"\d+", |s| {
        s.parse::<i64>().ok().map(|n| Token::new("NUMBER", n))
      })
      .build()
      .unwrap();
    let tokens = scanner.tokenize("42").unwrap();
    assert_eq!(tokens[0].attr().as_int(), Some(42));
  }
}

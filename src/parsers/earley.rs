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

//! An Earley chart parser for any grammar.
//!
//! Parsing happens in three phases. The chart is built by the recognizer
//! below; `forest` then extracts a single derivation from the chart,
//! following the tie-break policy, and finally evaluates it bottom-up
//! through the semantic actions.
//!
//! Empty rules are handled by remembering, per state set, the nonterminals
//! that completed with an empty span there. An item predicting such a
//! nonterminal after it completed is advanced immediately.

pub mod forest;
pub mod state;

use {
  crate::{
    grammar::{Grammar, START},
    parsers::{ParseError, ParseOptions},
    token::Token,
    utils::Name,
  },
  state::{EarleyStateSet, Item},
  std::collections::BTreeSet,
};

/// The completed chart of a successful recognition: one state set per input
/// position, `0..=tokens.len()`.
#[derive(Clone, Debug)]
pub struct Chart {
  sets: Vec<EarleyStateSet>,
}

struct Recognizer<'a, V> {
  grammar: &'a Grammar<V>,
  tokens: &'a [Token],
  options: &'a ParseOptions,
  sets: Vec<EarleyStateSet>,
}

impl<'a, V> Recognizer<'a, V> {
  fn add(&mut self, position: usize, item: Item) {
    if self.sets[position].add(item) && self.options.transitions {
      log::trace!(
        "Set {}: added {}",
        position,
        item.describe(self.grammar)
      );
    }
  }

  fn complete(&mut self, k: usize, item: Item) {
    let grammar = self.grammar;
    let rule = grammar.rule(item.rule);
    if let Some(check) = grammar.reduce_check(rule.lhs()) {
      if check(rule, self.tokens, item.origin, k) {
        log::trace!("Reduce check rejected {}", item.describe(grammar));
        return;
      }
    }

    let lhs = rule.lhs().clone();
    if !self.sets[k].record_completion(&lhs, item.origin, item.rule, k) {
      return;
    }

    let waiting = self.sets[item.origin].waiting_on(&lhs).to_vec();
    for parent in waiting {
      self.add(k, parent.advance());
    }
  }

  fn predict(&mut self, k: usize, item: Item, nt: &Name) {
    let grammar = self.grammar;
    self.sets[k].add_waiting(nt, item);
    for &rule in grammar.rules_for(nt) {
      self.add(k, Item::new(rule, k));
    }
    if self.sets[k].completed_empty(nt) {
      self.add(k, item.advance());
    }
  }

  fn scan(&mut self, k: usize, item: Item, sym: &Name) {
    if let Some(token) = self.tokens.get(k) {
      if token.kind() == sym {
        self.add(k + 1, item.advance());
      }
    }
  }

  /// Runs every item of set `k` to closure.
  fn close(&mut self, k: usize) {
    let mut index = 0;
    while let Some(item) = self.sets[k].get(index) {
      index += 1;
      match item.next_symbol(self.grammar).cloned() {
        None => self.complete(k, item),
        Some(sym) if self.grammar.is_nonterminal(&sym) => {
          self.predict(k, item, &sym)
        }
        Some(sym) => self.scan(k, item, &sym),
      }
    }
  }

  /// Returns the terminals that items of set `k` could accept next.
  fn expected(&self, k: usize) -> BTreeSet<Name> {
    self.sets[k]
      .items()
      .iter()
      .filter_map(|item| item.next_symbol(self.grammar))
      .filter(|sym| !self.grammar.is_nonterminal(sym))
      .cloned()
      .collect()
  }

  fn error_at(&self, k: usize) -> ParseError {
    ParseError::Syntax {
      token: self.tokens.get(k).cloned(),
      position: k,
      expected: self.expected(k),
    }
  }
}

impl Chart {
  /// Recognizes `tokens`, returning the chart or the first syntax error.
  pub fn recognize<V>(
    grammar: &Grammar<V>,
    tokens: &[Token],
    options: &ParseOptions,
  ) -> Result<Chart, ParseError> {
    let mut rec = Recognizer {
      grammar,
      tokens,
      options,
      sets: (0..=tokens.len()).map(|_| EarleyStateSet::new()).collect(),
    };

    rec.add(0, Item::start());
    for k in 0..=tokens.len() {
      rec.close(k);
      if k < tokens.len() && rec.sets[k + 1].is_empty() {
        log::debug!("No items advance over token {}", k);
        return Err(rec.error_at(k));
      }
    }

    let n = tokens.len();
    let accepted = rec.sets[n]
      .completions(&Name::new(START), 0)
      .map_or(false, |rules| rules.contains(&0));
    if accepted {
      Ok(Chart { sets: rec.sets })
    } else {
      Err(rec.error_at(n))
    }
  }

  pub fn set(&self, position: usize) -> &EarleyStateSet {
    &self.sets[position]
  }

  pub fn num_sets(&self) -> usize {
    self.sets.len()
  }
}

#[cfg(test)]
mod test {
  use {
    super::*,
    crate::grammar::{examples, GrammarBuilder},
  };

  fn kinds(kinds: &[&str]) -> Vec<Token> {
    kinds.iter().map(|k| Token::bare(*k)).collect()
  }

  #[test]
  fn test_recognizes_expr() {
    let g = examples::make_expr::<()>();
    let tokens =
      kinds(&["INTEGER", "ADD_OP", "INTEGER", "MULT_OP", "INTEGER"]);
    let chart =
      Chart::recognize(&g, &tokens, &ParseOptions::default()).unwrap();
    assert_eq!(chart.num_sets(), 6);
  }

  #[test]
  fn test_error_on_unexpected_token() {
    let g = examples::make_expr::<()>();
    let tokens = kinds(&["INTEGER", "INTEGER"]);
    let err =
      Chart::recognize(&g, &tokens, &ParseOptions::default()).unwrap_err();
    assert_eq!(err.position(), 1);
    assert_eq!(err.token(), Some(&tokens[1]));
    let expected = err.expected().iter().map(Name::str).collect::<Vec<_>>();
    assert_eq!(expected, vec!["ADD_OP", "MULT_OP"]);
  }

  #[test]
  fn test_error_at_end_of_input() {
    let g = examples::make_expr::<()>();
    let tokens = kinds(&["INTEGER", "ADD_OP"]);
    let err =
      Chart::recognize(&g, &tokens, &ParseOptions::default()).unwrap_err();
    assert_eq!(err.position(), 2);
    assert!(err.token().is_none());
    assert!(err.expected().contains("INTEGER"));
  }

  #[test]
  fn test_empty_rules() {
    let mut gb = GrammarBuilder::<()>::new("s");
    gb.add_rules(
      "rules",
      "
      s ::= a b A
      a ::=
      b ::= a a
      ",
      None,
    );
    let g = gb.build().unwrap();
    let options = ParseOptions::default();
    assert!(Chart::recognize(&g, &kinds(&["A"]), &options).is_ok());
    assert!(Chart::recognize(&g, &kinds(&[]), &options).is_err());
  }

  #[test]
  fn test_reduce_check_rejects() {
    let mut gb = GrammarBuilder::<()>::new("s");
    gb.add_rules("rules", "s ::= A B\ns ::= A C", None)
      .add_reduce_check("s", |rule, _, _, _| rule.rhs()[1] == "B");
    let g = gb.build().unwrap();
    let options = ParseOptions::default();
    assert!(Chart::recognize(&g, &kinds(&["A", "C"]), &options).is_ok());
    assert!(Chart::recognize(&g, &kinds(&["A", "B"]), &options).is_err());
  }
}

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

//! Grammar diagnostics. None of these make a grammar unusable; they point at
//! likely mistakes and slow constructs.

use {
  super::{Pass, PassContext},
  crate::{
    grammar::{Grammar, Rule, BOF, START},
    utils::{breadth_first_search, Name},
  },
  std::{
    collections::{BTreeMap, BTreeSet},
    convert::Infallible,
  },
};

/// Returns true if a symbol looks like a terminal (token kind) name.
pub fn is_token_name(sym: &str) -> bool {
  sym.chars().next().map_or(false, |c| c.is_ascii_uppercase())
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GrammarDiagnostics {
  /// Left-hand sides that never appear on a right-hand side, other than the
  /// start symbol.
  pub unused_lhs: BTreeSet<Name>,
  /// Nonterminal-looking right-hand side symbols that have no rules.
  pub undefined_rhs: BTreeSet<Name>,
  /// Terminal-looking symbols used on right-hand sides.
  pub tokens: BTreeSet<Name>,
  /// Rules whose last symbol is their own left-hand side.
  pub right_recursive: BTreeSet<Rule>,
  /// Right-hand sides shared by several rules, with those rules.
  pub dup_rhs: BTreeMap<Vec<Name>, Vec<Rule>>,
}

impl GrammarDiagnostics {
  pub fn compute<V>(g: &Grammar<V>) -> Self {
    let user_rules = || g.rules().filter(|r| r.lhs() != START);

    let rhs_symbols = user_rules()
      .flat_map(|r| r.rhs())
      .collect::<BTreeSet<_>>();

    let unused_lhs = g
      .nonterminals()
      .filter(|nt| *nt != START && *nt != g.start())
      .filter(|nt| !rhs_symbols.contains(nt))
      .cloned()
      .collect();

    let undefined_rhs = rhs_symbols
      .iter()
      .filter(|sym| !is_token_name(sym) && **sym != BOF)
      .filter(|sym| !g.is_nonterminal(sym))
      .map(|sym| (*sym).clone())
      .collect();

    let tokens = rhs_symbols
      .iter()
      .filter(|sym| is_token_name(sym))
      .map(|sym| (*sym).clone())
      .collect();

    let right_recursive = user_rules()
      .filter(|r| r.rhs().last() == Some(r.lhs()))
      .cloned()
      .collect();

    let mut by_rhs: BTreeMap<Vec<Name>, Vec<Rule>> = BTreeMap::new();
    for rule in user_rules().filter(|r| !r.is_empty()) {
      by_rhs.entry(rule.rhs().to_vec()).or_default().push(rule.clone());
    }
    by_rhs.retain(|_, rules| rules.len() > 1);

    GrammarDiagnostics {
      unused_lhs,
      undefined_rhs,
      tokens,
      right_recursive,
      dup_rhs: by_rhs,
    }
  }

  /// Returns the number of non-empty warning categories. The token set is
  /// informational and never counts.
  pub fn warning_count(&self) -> usize {
    [
      !self.unused_lhs.is_empty(),
      !self.undefined_rhs.is_empty(),
      !self.right_recursive.is_empty(),
      !self.dup_rhs.is_empty(),
    ]
    .iter()
    .filter(|b| **b)
    .count()
  }

  pub fn is_clean(&self) -> bool {
    self.warning_count() == 0
  }

  /// Writes a human-readable report of every warning category.
  pub fn write_report(
    &self,
    out: &mut impl std::fmt::Write,
  ) -> std::fmt::Result {
    if !self.unused_lhs.is_empty() {
      writeln!(out, "LHS symbols not used on the RHS:")?;
      writeln!(out, "  {}", join(&self.unused_lhs))?;
    }
    if !self.undefined_rhs.is_empty() {
      writeln!(out, "RHS symbols not used on the LHS:")?;
      writeln!(out, "  {}", join(&self.undefined_rhs))?;
    }
    if !self.right_recursive.is_empty() {
      writeln!(out, "Right recursive rules:")?;
      for rule in &self.right_recursive {
        writeln!(out, "  {}", rule)?;
      }
    }
    if !self.dup_rhs.is_empty() {
      writeln!(out, "Rules sharing a right-hand side:")?;
      for rules in self.dup_rhs.values() {
        for rule in rules {
          writeln!(out, "  {}", rule)?;
        }
      }
    }
    Ok(())
  }

  /// Emits every finding as a warning through the `log` facade.
  pub fn log_warnings(&self) {
    for nt in &self.unused_lhs {
      log::warn!("LHS symbol not used on any RHS: {}", nt);
    }
    for sym in &self.undefined_rhs {
      log::warn!("RHS symbol with no rules: {}", sym);
    }
    for rule in &self.right_recursive {
      log::warn!("Right recursive rule: {}", rule);
    }
    for (rhs, rules) in &self.dup_rhs {
      log::warn!("{} rules share the right-hand side {:?}", rules.len(), rhs);
    }
  }
}

fn join(names: &BTreeSet<Name>) -> String {
  names.iter().map(Name::str).collect::<Vec<_>>().join(" ")
}

impl<V> Pass<V> for GrammarDiagnostics {
  type Error = Infallible;

  fn run_pass(pass_map: &PassContext<V>) -> Result<Self, Self::Error> {
    Ok(GrammarDiagnostics::compute(pass_map.grammar()))
  }
}

impl<V> Grammar<V> {
  /// Analyzes the grammar for likely mistakes. Never modifies the grammar.
  pub fn check_grammar(&self) -> GrammarDiagnostics {
    GrammarDiagnostics::compute(self)
  }

  /// Returns the nonterminals reachable from the start symbol, including
  /// the start symbol itself.
  pub fn reachable(&self) -> BTreeSet<Name> {
    breadth_first_search(vec![self.start().clone()], |nt| {
      self
        .rules_for(nt)
        .iter()
        .flat_map(|&id| self.rule(id).rhs())
        .filter(|sym| self.is_nonterminal(sym))
        .cloned()
        .collect::<Vec<_>>()
    })
  }
}

#[cfg(test)]
mod test {
  use {super::*, crate::grammar::examples};

  #[test]
  fn test_clean_grammar() {
    let g = examples::make_expr::<()>();
    let diags = g.check_grammar();
    assert!(diags.is_clean());
    let tokens = diags.tokens.iter().map(Name::str).collect::<Vec<_>>();
    assert_eq!(tokens, vec!["ADD_OP", "INTEGER", "MULT_OP"]);
  }

  #[test]
  fn test_right_recursive() {
    let diags = examples::make_right_recursive().check_grammar();
    assert!(diags.unused_lhs.is_empty());
    assert!(diags.undefined_rhs.is_empty());
    assert_eq!(diags.right_recursive.len(), 1);
  }

  #[test]
  fn test_unexpanded_nonterminal() {
    let diags = examples::make_unexpanded().check_grammar();
    assert!(diags.unused_lhs.is_empty());
    let undefined =
      diags.undefined_rhs.iter().map(Name::str).collect::<Vec<_>>();
    assert_eq!(undefined, vec!["term2"]);
    assert!(diags.right_recursive.is_empty());
  }

  #[test]
  fn test_unused_lhs() {
    let g = examples::make_unused_lhs();
    let pass_map = PassContext::new(&g);
    let diags = pass_map.get_pass::<GrammarDiagnostics>().unwrap();
    let unused = diags.unused_lhs.iter().map(Name::str).collect::<Vec<_>>();
    assert_eq!(unused, vec!["factor"]);
    assert!(diags.undefined_rhs.is_empty());
    assert!(diags.right_recursive.is_empty());
  }

  #[test]
  fn test_reachable() {
    let g = examples::make_bad_expr();
    let reachable_set = g.reachable();
    let reachable = reachable_set.iter().map(Name::str).collect::<Vec<_>>();
    assert_eq!(reachable, vec!["expr", "factor", "term"]);
  }

  #[test]
  fn test_bad_grammar_report() {
    let diags = examples::make_bad_expr().check_grammar();
    assert!(diags.warning_count() > 0);
    assert_eq!(diags.right_recursive.len(), 1);
    assert_eq!(diags.dup_rhs.len(), 1);

    let mut report = String::new();
    diags.write_report(&mut report).unwrap();
    expect_test::expect![[r#"
        LHS symbols not used on the RHS:
          foo
        Right recursive rules:
          factor ::= FLOAT factor
        Rules sharing a right-hand side:
          expr ::= expr ADD_OP term
          factor ::= expr ADD_OP term
    "#]]
    .assert_eq(&report);
  }
}

// Copyright 2018 Google LLC
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

pub mod builder;

use {
  crate::{
    parsers::Action,
    token::Token,
    utils::{Name, ToDoc},
  },
  std::{
    collections::{BTreeMap, BTreeSet},
    sync::Arc,
  },
};

/// Name of the augmented start nonterminal every compiled grammar carries.
pub const START: &str = "START";

/// The begin-of-file marker that opens the augmented start rule.
pub const BOF: &str = "|-";

/// Index of a rule within a compiled grammar. Index 0 is always the
/// augmented start rule.
pub type RuleId = usize;

/// A predicate deciding whether a completed rule over a token span must be
/// rejected. Receives the rule, all tokens, and the `[first, last)` span.
pub type ReduceCheck =
  Arc<dyn Fn(&Rule, &[Token], usize, usize) -> bool + Send + Sync>;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GrammarError {
  #[error("start symbol `{0}' has no rules")]
  UndefinedStart(Name),
  #[error(
    "nonterminals can never derive a terminal string: {}",
    join_names(.nonterms)
  )]
  Unproductive { nonterms: BTreeSet<Name> },
  #[error("malformed rule text {text:?}: {reason}")]
  MalformedRule { text: String, reason: String },
  #[error(
    "symbol `{symbol}' used by `{lhs}' is neither a rule nor a declared \
     terminal"
  )]
  UndeclaredSymbol { symbol: Name, lhs: Name },
  #[error("no rule `{lhs} ::= {}'", join_names(.rhs))]
  UnknownRule { lhs: Name, rhs: Vec<Name> },
  #[error("bad operator use in symbol `{symbol}'")]
  BadOperator { symbol: String },
}

fn join_names<'a>(names: impl IntoIterator<Item = &'a Name>) -> String {
  names
    .into_iter()
    .map(Name::str)
    .collect::<Vec<_>>()
    .join(" ")
}

/// The tag a synthetic (or whole-rule) operator expansion puts on its
/// left-hand side.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub enum ListKind {
  /// Produced by `X+` or `X*`.
  List,
  /// Produced by `X?`.
  Optional,
}

/// A single production: `lhs ::= rhs...`, labelled with the name of the
/// registration that produced it.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct Rule {
  lhs: Name,
  rhs: Vec<Name>,
  label: Name,
}

impl Rule {
  pub fn new(label: Name, lhs: Name, rhs: Vec<Name>) -> Self {
    Rule { lhs, rhs, label }
  }

  pub fn lhs(&self) -> &Name {
    &self.lhs
  }

  pub fn rhs(&self) -> &[Name] {
    &self.rhs
  }

  pub fn label(&self) -> &Name {
    &self.label
  }

  pub fn is_empty(&self) -> bool {
    self.rhs.is_empty()
  }

  /// The `(lhs, rhs)` pair identifying this rule within a grammar.
  pub fn key(&self) -> (Name, Vec<Name>) {
    (self.lhs.clone(), self.rhs.clone())
  }

  pub(crate) fn set_label(&mut self, label: Name) {
    self.label = label;
  }
}

impl std::fmt::Display for Rule {
  fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
    write!(f, "{} ::=", self.lhs)?;
    for sym in &self.rhs {
      write!(f, " {}", sym)?;
    }
    Ok(())
  }
}

impl ToDoc for Rule {
  fn to_doc<'a, DA: pretty::DocAllocator<'a>>(
    &self,
    da: &'a DA,
  ) -> pretty::DocBuilder<'a, DA>
  where
    DA::Doc: Clone,
  {
    let body = if self.rhs.is_empty() {
      da.text("ε")
    } else {
      da.intersperse(self.rhs.iter().map(|s| s.to_doc(da)), da.softline())
    };
    self
      .lhs
      .to_doc(da)
      .append(da.text(" ::="))
      .append(da.softline().append(body).nest(2))
      .group()
  }
}

/// A rule together with everything attached to it at registration time.
#[derive(Derivative)]
#[derivative(Clone(bound = ""))]
pub(crate) struct RuleEntry<V> {
  pub(crate) rule: Rule,
  pub(crate) action: Option<Action<V>>,
  pub(crate) priority: i32,
}

/// A compiled, read-only context-free grammar.
///
/// A grammar consists of
///
/// - A start nonterminal, wrapped by the augmented rule `START ::= |- start`
/// - An ordered list of rules, each with an optional semantic action and a
///   priority used to break ties between ambiguous derivations
/// - Tags for list-like and optional nonterminals created by `+`, `*` and
///   `?` expansions
/// - Per-nonterminal reduce checks
///
/// A symbol is a nonterminal exactly when it is the left-hand side of some
/// rule; every other symbol is matched against token kinds. Editing goes
/// through [`Grammar::to_builder`], which produces a fresh grammar.
#[derive(Derivative)]
#[derivative(Clone(bound = ""))]
pub struct Grammar<V> {
  start: Name,
  entries: Vec<RuleEntry<V>>,
  by_lhs: BTreeMap<Name, Vec<RuleId>>,
  tags: BTreeMap<Name, ListKind>,
  helpers: BTreeSet<Name>,
  terminals: Option<BTreeSet<Name>>,
  reduce_checks: BTreeMap<Name, ReduceCheck>,
}

impl<V> std::fmt::Debug for Grammar<V> {
  fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
    let mut dbg_struct = f.debug_struct("Grammar");
    dbg_struct.field("start", &self.start);
    dbg_struct.field("rules", &self.rules().collect::<Vec<_>>());
    dbg_struct.field("tags", &self.tags);
    dbg_struct.finish()
  }
}

impl<V> Grammar<V> {
  pub(crate) fn from_parts(
    start: Name,
    entries: Vec<RuleEntry<V>>,
    tags: BTreeMap<Name, ListKind>,
    helpers: BTreeSet<Name>,
    terminals: Option<BTreeSet<Name>>,
    reduce_checks: BTreeMap<Name, ReduceCheck>,
  ) -> Self {
    let mut by_lhs: BTreeMap<Name, Vec<RuleId>> = BTreeMap::new();
    for (id, entry) in entries.iter().enumerate() {
      by_lhs.entry(entry.rule.lhs.clone()).or_default().push(id);
    }
    Grammar {
      start,
      entries,
      by_lhs,
      tags,
      helpers,
      terminals,
      reduce_checks,
    }
  }

  pub(crate) fn entries(&self) -> &[RuleEntry<V>] {
    &self.entries
  }

  pub(crate) fn helpers(&self) -> &BTreeSet<Name> {
    &self.helpers
  }

  pub(crate) fn declared_terminals(&self) -> Option<&BTreeSet<Name>> {
    self.terminals.as_ref()
  }

  pub(crate) fn reduce_checks(&self) -> &BTreeMap<Name, ReduceCheck> {
    &self.reduce_checks
  }

  pub(crate) fn tags(&self) -> &BTreeMap<Name, ListKind> {
    &self.tags
  }

  /// Returns the user's start nonterminal (not the augmented `START`).
  pub fn start(&self) -> &Name {
    &self.start
  }

  /// Returns all rules in registration order, starting with the augmented
  /// start rule.
  pub fn rules(&self) -> impl Iterator<Item = &Rule> {
    self.entries.iter().map(|e| &e.rule)
  }

  pub fn num_rules(&self) -> usize {
    self.entries.len()
  }

  pub fn rule(&self, id: RuleId) -> &Rule {
    &self.entries[id].rule
  }

  pub fn action(&self, id: RuleId) -> Option<&Action<V>> {
    self.entries[id].action.as_ref()
  }

  pub fn priority(&self, id: RuleId) -> i32 {
    self.entries[id].priority
  }

  /// Returns the ids of all rules with the given left-hand side.
  pub fn rules_for(&self, lhs: &str) -> &[RuleId] {
    self.by_lhs.get(lhs).map(Vec::as_slice).unwrap_or(&[])
  }

  /// Looks up the id of the rule `lhs ::= rhs`.
  pub fn find_rule(&self, lhs: &str, rhs: &[&str]) -> Option<RuleId> {
    self.rules_for(lhs).iter().copied().find(|id| {
      let rule = self.rule(*id);
      rule.rhs.len() == rhs.len()
        && rule.rhs.iter().zip(rhs).all(|(a, b)| a == b)
    })
  }

  pub fn is_nonterminal(&self, sym: &str) -> bool {
    self.by_lhs.contains_key(sym)
  }

  /// Returns every left-hand side symbol, including `START`.
  pub fn nonterminals(&self) -> impl Iterator<Item = &Name> {
    self.by_lhs.keys()
  }

  pub fn list_kind(&self, nt: &str) -> Option<ListKind> {
    self.tags.get(nt).copied()
  }

  pub fn is_list_like(&self, nt: &str) -> bool {
    self.list_kind(nt) == Some(ListKind::List)
  }

  pub fn is_optional(&self, nt: &str) -> bool {
    self.list_kind(nt) == Some(ListKind::Optional)
  }

  pub fn reduce_check(&self, lhs: &str) -> Option<&ReduceCheck> {
    self.reduce_checks.get(lhs)
  }

  /// Returns the label of the rule `lhs ::= rhs`, if it exists.
  pub fn rule_label(&self, lhs: &str, rhs: &[&str]) -> Option<&Name> {
    self.find_rule(lhs, rhs).map(|id| self.rule(id).label())
  }

  /// Returns the full map from `(lhs, rhs)` to rule label.
  pub fn rule_labels(&self) -> BTreeMap<(Name, Vec<Name>), Name> {
    self
      .rules()
      .map(|r| (r.key(), r.label.clone()))
      .collect()
  }

  /// Writes every rule, one per line, in a canonical order: the augmented
  /// start rule first, then the remaining rules sorted by left-hand side and
  /// then right-hand side.
  pub fn dump_grammar(
    &self,
    out: &mut impl std::fmt::Write,
  ) -> std::fmt::Result {
    let mut rules = self.entries[1..]
      .iter()
      .map(|e| &e.rule)
      .collect::<Vec<_>>();
    rules.sort_by(|a, b| (&a.lhs, &a.rhs).cmp(&(&b.lhs, &b.rhs)));
    writeln!(out, "{}", self.rule(0))?;
    for rule in rules {
      writeln!(out, "{}", rule)?;
    }
    Ok(())
  }

  /// Returns the output of [`Grammar::dump_grammar`] as a string.
  pub fn dump_to_string(&self) -> String {
    let mut out = String::new();
    // Writing to a String never fails.
    let _ = self.dump_grammar(&mut out);
    out
  }

  pub fn to_pretty(&self) -> String {
    crate::utils::render_doc(self, 80)
  }
}

impl<V> ToDoc for Grammar<V> {
  fn to_doc<'a, DA: pretty::DocAllocator<'a>>(
    &self,
    da: &'a DA,
  ) -> pretty::DocBuilder<'a, DA>
  where
    DA::Doc: Clone,
  {
    let start_entry = da
      .text("Start =")
      .group()
      .append(da.softline())
      .append(self.start.to_doc(da));
    let rules_entry = da.text("Rules ").append(
      da.softline()
        .append(
          da.concat(self.rules().map(|rule| {
            rule.to_doc(da).append(da.text(";")).append(da.softline())
          }))
          .nest(2),
        )
        .braces(),
    );

    da.concat(
      vec![start_entry, rules_entry]
        .into_iter()
        .map(|doc| doc.append(da.text(",")).append(da.softline())),
    )
  }
}

#[cfg(test)]
mod test {
  use {super::*, crate::grammar::examples};

  #[test]
  fn test_dump_grammar() {
    let g = examples::make_expr::<()>();
    expect_test::expect![[r#"
        START ::= |- expr
        expr ::= expr ADD_OP term
        expr ::= term
        factor ::= INTEGER
        term ::= factor
        term ::= term MULT_OP factor
    "#]]
    .assert_eq(&g.dump_to_string());
  }

  #[test]
  fn test_empty_rhs_has_no_trailing_space() {
    let rule = Rule::new(
      Name::new("rules"),
      Name::new("opt"),
      Vec::new(),
    );
    assert_eq!(rule.to_string(), "opt ::=");
  }

  #[test]
  fn test_find_rule() {
    let g = examples::make_expr::<()>();
    let id = g.find_rule("term", &["factor"]).unwrap();
    assert_eq!(g.rule(id).lhs(), "term");
    assert!(g.find_rule("term", &["INTEGER"]).is_none());
    assert!(g.is_nonterminal("factor"));
    assert!(!g.is_nonterminal("INTEGER"));
  }

  #[test]
  fn test_start_rule_is_first() {
    let g = examples::make_expr::<()>();
    let start = g.rule(0);
    assert_eq!(start.lhs(), START);
    assert_eq!(start.rhs(), &[Name::new(BOF), Name::new("expr")]);
  }

  #[test]
  fn test_pretty() {
    let g = examples::make_expr::<()>();
    let text = g.to_pretty();
    assert!(text.contains("factor ::= INTEGER;"));
  }
}

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
  super::{
    Grammar, GrammarError, ListKind, ReduceCheck, Rule, RuleEntry, BOF, START,
  },
  crate::{
    grammar::{
      passes::{productive::Productive, PassContext},
      rule_text::{parse_rules, split_operator, Operator},
    },
    parsers::{Action, Arg},
    token::Token,
    utils::Name,
  },
  std::{
    collections::{BTreeMap, BTreeSet},
    sync::Arc,
  },
};

/// A helper trait to allow builder methods to either take a type `T`, or a
/// reference to `T` if it is clonable.
pub trait BuilderInto<T> {
  /// Consumes self and produces a value of type `T`.
  fn builder_into(self) -> T;
}

impl<T> BuilderInto<T> for T {
  fn builder_into(self) -> T {
    self
  }
}

impl<'a, T> BuilderInto<T> for &'a T
where
  T: Clone,
{
  fn builder_into(self) -> T {
    self.clone()
  }
}

impl BuilderInto<Name> for &'_ str {
  fn builder_into(self) -> Name {
    Name::new(self)
  }
}

impl BuilderInto<Name> for String {
  fn builder_into(self) -> Name {
    Name::from(self)
  }
}

type DuplicateObserver = Box<dyn FnMut(&Rule)>;

/// Collects rules, semantic actions and grammar options, and compiles them
/// into a [`Grammar`].
///
/// Builder methods never fail immediately. Problems found while registering
/// rules (malformed rule text, misplaced operators, removal of unknown
/// rules) are remembered and reported by [`GrammarBuilder::build`], so that
/// registration calls chain.
///
/// Registering an `(lhs, rhs)` pair a second time is not an error: the pair
/// is recorded as a duplicate, reported to the observer installed with
/// [`GrammarBuilder::on_duplicate`], and the most recent action replaces the
/// earlier one while the rule keeps its original position.
pub struct GrammarBuilder<V> {
  start: Name,
  entries: Vec<RuleEntry<V>>,
  index: BTreeMap<(Name, Vec<Name>), usize>,
  tags: BTreeMap<Name, ListKind>,
  helpers: BTreeSet<Name>,
  terminals: Option<BTreeSet<Name>>,
  reduce_checks: BTreeMap<Name, ReduceCheck>,
  duplicates: Vec<(Name, Vec<Name>)>,
  on_duplicate: Option<DuplicateObserver>,
  errors: Vec<GrammarError>,
  log_rules: bool,
}

impl<V> GrammarBuilder<V> {
  pub fn new(start: impl BuilderInto<Name>) -> Self {
    GrammarBuilder {
      start: start.builder_into(),
      entries: Vec::new(),
      index: BTreeMap::new(),
      tags: BTreeMap::new(),
      helpers: BTreeSet::new(),
      terminals: None,
      reduce_checks: BTreeMap::new(),
      duplicates: Vec::new(),
      on_duplicate: None,
      errors: Vec::new(),
      log_rules: false,
    }
  }

  /// Logs every rule of the compiled grammar at debug level when `build`
  /// is called.
  pub fn log_rules(&mut self, enabled: bool) -> &mut Self {
    self.log_rules = enabled;
    self
  }

  /// Installs a callback invoked for every duplicate rule registration.
  pub fn on_duplicate(
    &mut self,
    observer: impl FnMut(&Rule) + 'static,
  ) -> &mut Self {
    self.on_duplicate = Some(Box::new(observer));
    self
  }

  /// Returns every duplicate `(lhs, rhs)` registration seen so far.
  pub fn duplicates(&self) -> &[(Name, Vec<Name>)] {
    &self.duplicates
  }

  /// Declares the terminal vocabulary. Once declared, a right-hand side
  /// symbol that is neither a left-hand side nor a declared terminal makes
  /// `build` fail.
  pub fn declare_terminals<I>(&mut self, terminals: I) -> &mut Self
  where
    I: IntoIterator,
    I::Item: BuilderInto<Name>,
  {
    self
      .terminals
      .get_or_insert_with(BTreeSet::new)
      .extend(terminals.into_iter().map(BuilderInto::builder_into));
    self
  }

  /// Registers `lhs ::= rhs`, expanding any `X+`, `X*` or `X?` symbols.
  ///
  /// When `action` is `None`, the parser's tree builder produces the value
  /// for this rule.
  pub fn add_rule<I>(
    &mut self,
    label: impl BuilderInto<Name>,
    lhs: impl BuilderInto<Name>,
    rhs: I,
    action: Option<Action<V>>,
  ) -> &mut Self
  where
    I: IntoIterator,
    I::Item: BuilderInto<Name>,
  {
    let label = label.builder_into();
    let lhs = lhs.builder_into();
    let rhs = rhs
      .into_iter()
      .map(BuilderInto::builder_into)
      .collect::<Vec<Name>>();
    if let Err(e) = self.add_expanded(label, lhs, rhs, action) {
      self.errors.push(e);
    }
    self
  }

  /// Registers every production in `text` with the same action.
  pub fn add_rules(
    &mut self,
    label: impl BuilderInto<Name>,
    text: &str,
    action: Option<Action<V>>,
  ) -> &mut Self {
    let label = label.builder_into();
    match parse_rules(text) {
      Ok(rules) => {
        for rule in rules {
          if let Err(e) =
            self.add_expanded(label.clone(), rule.lhs, rule.rhs, action.clone())
          {
            self.errors.push(e);
          }
        }
      }
      Err(e) => self.errors.push(e),
    }
    self
  }

  /// Registers every production in `text` with an action built from the
  /// given closure.
  pub fn add_rules_with<F>(
    &mut self,
    label: impl BuilderInto<Name>,
    text: &str,
    action: F,
  ) -> &mut Self
  where
    F: Fn(Vec<Arg<V>>) -> V + Send + Sync + 'static,
  {
    self.add_rules(label, text, Some(Arc::new(action)))
  }

  /// Removes every production listed in `text`.
  ///
  /// A production written with a whole-rule operator (`stmts ::= stmt+`)
  /// removes both rules of its expansion. Helper nonterminals created for
  /// other operators are left in place.
  pub fn remove_rules(&mut self, text: &str) -> &mut Self {
    let rules = match parse_rules(text) {
      Ok(rules) => rules,
      Err(e) => {
        self.errors.push(e);
        return self;
      }
    };

    for rule in rules {
      match self.expanded_keys(&rule.lhs, &rule.rhs) {
        Ok(keys) => {
          for key in keys {
            if self.index.contains_key(&key) {
              self.remove_key(&key);
            } else {
              self.errors.push(GrammarError::UnknownRule {
                lhs: key.0,
                rhs: key.1,
              });
            }
          }
        }
        Err(e) => self.errors.push(e),
      }
    }
    self
  }

  /// Sets the priority of an existing rule. Higher priorities win when two
  /// rules derive the same span.
  pub fn set_priority(
    &mut self,
    lhs: &str,
    rhs: &[&str],
    priority: i32,
  ) -> &mut Self {
    let key = (Name::new(lhs), rhs.iter().map(Name::new).collect::<Vec<_>>());
    match self.index.get(&key) {
      Some(&i) => self.entries[i].priority = priority,
      None => self.errors.push(GrammarError::UnknownRule {
        lhs: key.0,
        rhs: key.1,
      }),
    }
    self
  }

  /// Installs a reduce check for every rule with the given left-hand side.
  /// A completion the check returns `true` for is discarded.
  pub fn add_reduce_check<F>(
    &mut self,
    lhs: impl BuilderInto<Name>,
    check: F,
  ) -> &mut Self
  where
    F: Fn(&Rule, &[Token], usize, usize) -> bool + Send + Sync + 'static,
  {
    self.reduce_checks.insert(lhs.builder_into(), Arc::new(check));
    self
  }

  /// Compiles the collected rules into a grammar.
  pub fn build(&self) -> Result<Grammar<V>, GrammarError> {
    if let Some(e) = self.errors.first() {
      return Err(e.clone());
    }

    if !self.entries.iter().any(|e| e.rule.lhs() == &self.start) {
      return Err(GrammarError::UndefinedStart(self.start.clone()));
    }

    let start_rule = RuleEntry {
      rule: Rule::new(
        Name::new(START),
        Name::new(START),
        vec![Name::new(BOF), self.start.clone()],
      ),
      action: None,
      priority: 0,
    };
    let entries = std::iter::once(start_rule)
      .chain(self.entries.iter().cloned())
      .collect::<Vec<_>>();

    let lhs_set = entries
      .iter()
      .map(|e| e.rule.lhs().clone())
      .collect::<BTreeSet<_>>();

    if let Some(terminals) = &self.terminals {
      for entry in &entries[1..] {
        if let Some(sym) = entry
          .rule
          .rhs()
          .iter()
          .find(|s| !lhs_set.contains(*s) && !terminals.contains(*s))
        {
          return Err(GrammarError::UndeclaredSymbol {
            symbol: sym.clone(),
            lhs: entry.rule.lhs().clone(),
          });
        }
      }
    }

    let tags = self
      .tags
      .iter()
      .filter(|(nt, _)| lhs_set.contains(*nt))
      .map(|(nt, kind)| (nt.clone(), *kind))
      .collect();

    let grammar = Grammar::from_parts(
      self.start.clone(),
      entries,
      tags,
      self.helpers.clone(),
      self.terminals.clone(),
      self.reduce_checks.clone(),
    );

    PassContext::new(&grammar).get_pass::<Productive>()?;

    if self.log_rules {
      for rule in grammar.rules() {
        log::debug!("Rule: {}", rule);
      }
    }

    Ok(grammar)
  }

  fn push_rule(
    &mut self,
    label: Name,
    lhs: Name,
    rhs: Vec<Name>,
    action: Option<Action<V>>,
  ) {
    let key = (lhs.clone(), rhs.clone());
    match self.index.get(&key) {
      Some(&i) => {
        log::warn!("Duplicate rule: {}", self.entries[i].rule);
        let entry = &mut self.entries[i];
        entry.action = action;
        entry.rule.set_label(label);
        if let Some(observer) = &mut self.on_duplicate {
          observer(&entry.rule);
        }
        self.duplicates.push(key);
      }
      None => {
        self.index.insert(key, self.entries.len());
        self.entries.push(RuleEntry {
          rule: Rule::new(label, lhs, rhs),
          action,
          priority: 0,
        });
      }
    }
  }

  fn add_expanded(
    &mut self,
    label: Name,
    lhs: Name,
    rhs: Vec<Name>,
    action: Option<Action<V>>,
  ) -> Result<(), GrammarError> {
    if let [only] = rhs.as_slice() {
      if let (base, Some(op)) = split_operator(only)? {
        let base = Name::new(base);
        self.add_operator_rules(&label, &lhs, &base, op, action);
        return Ok(());
      }
    }

    let mut expanded = Vec::with_capacity(rhs.len());
    for sym in &rhs {
      match split_operator(sym)? {
        (_, None) => expanded.push(sym.clone()),
        (base, Some(op)) => {
          let helper = Name::from(format!("{}{}", base, op.helper_suffix()));
          if self.helpers.insert(helper.clone()) {
            self.add_operator_rules(
              &label,
              &helper,
              &Name::new(base),
              op,
              None,
            );
          }
          expanded.push(helper);
        }
      }
    }
    self.push_rule(label, lhs, expanded, action);
    Ok(())
  }

  /// Adds the base rules that make `lhs` behave as `base` with the given
  /// operator applied, and tags `lhs`.
  fn add_operator_rules(
    &mut self,
    label: &Name,
    lhs: &Name,
    base: &Name,
    op: Operator,
    action: Option<Action<V>>,
  ) {
    for rhs in operator_rhs(lhs, base, op) {
      self.push_rule(label.clone(), lhs.clone(), rhs, action.clone());
    }
    let kind = match op {
      Operator::Plus | Operator::Star => ListKind::List,
      Operator::Opt => ListKind::Optional,
    };
    self.tags.insert(lhs.clone(), kind);
  }

  fn expanded_keys(
    &self,
    lhs: &Name,
    rhs: &[Name],
  ) -> Result<Vec<(Name, Vec<Name>)>, GrammarError> {
    if let [only] = rhs {
      if let (base, Some(op)) = split_operator(only)? {
        return Ok(
          operator_rhs(lhs, &Name::new(base), op)
            .into_iter()
            .map(|rhs| (lhs.clone(), rhs))
            .collect(),
        );
      }
    }

    let mut expanded = Vec::with_capacity(rhs.len());
    for sym in rhs {
      expanded.push(match split_operator(sym)? {
        (_, None) => sym.clone(),
        (base, Some(op)) => {
          Name::from(format!("{}{}", base, op.helper_suffix()))
        }
      });
    }
    Ok(vec![(lhs.clone(), expanded)])
  }

  fn remove_key(&mut self, key: &(Name, Vec<Name>)) {
    if let Some(i) = self.index.remove(key) {
      self.entries.remove(i);
      for pos in self.index.values_mut() {
        if *pos > i {
          *pos -= 1;
        }
      }
    }
  }
}

fn operator_rhs(lhs: &Name, base: &Name, op: Operator) -> Vec<Vec<Name>> {
  match op {
    Operator::Plus => vec![vec![lhs.clone(), base.clone()], vec![base.clone()]],
    Operator::Star => vec![vec![lhs.clone(), base.clone()], vec![]],
    Operator::Opt => vec![vec![base.clone()], vec![]],
  }
}

impl<V> Grammar<V> {
  /// Returns a builder seeded with every rule, action, priority, tag and
  /// reduce check of this grammar. Building it again yields an equal
  /// grammar.
  pub fn to_builder(&self) -> GrammarBuilder<V> {
    let mut builder = GrammarBuilder::new(self.start());
    for entry in &self.entries()[1..] {
      builder
        .index
        .insert(entry.rule.key(), builder.entries.len());
      builder.entries.push(entry.clone());
    }
    builder.tags = self.tags().clone();
    builder.helpers = self.helpers().clone();
    builder.terminals = self.declared_terminals().cloned();
    builder.reduce_checks = self.reduce_checks().clone();
    builder
  }
}

/// Builds a grammar using a builder function.
///
/// Example:
///
/// ```rust
/// # use spark_earley::grammar;
/// let g = grammar::build::<(), _>("expr", |gb| {
///   gb.add_rules("rules", "expr ::= expr ADD_OP term\nexpr ::= term", None)
///     .add_rules("rules", "term ::= INTEGER", None);
/// })
/// .unwrap();
/// assert_eq!(g.rules_for("expr").len(), 2);
/// ```
pub fn build<V, F>(
  start: impl BuilderInto<Name>,
  build_fn: F,
) -> Result<Grammar<V>, GrammarError>
where
  F: FnOnce(&mut GrammarBuilder<V>),
{
  let mut builder = GrammarBuilder::new(start);
  build_fn(&mut builder);
  builder.build()
}

#[cfg(test)]
mod test {
  use {
    super::*,
    crate::grammar::examples,
    std::{cell::RefCell, rc::Rc},
  };

  fn names(syms: &[&str]) -> Vec<Name> {
    syms.iter().map(Name::new).collect()
  }

  #[test]
  fn test_duplicate_rules_are_reported() {
    let seen = Rc::new(RefCell::new(Vec::new()));
    let mut gb = GrammarBuilder::<()>::new("x");
    gb.on_duplicate({
      let seen = seen.clone();
      move |rule| seen.borrow_mut().push(rule.to_string())
    });
    gb.add_rules(
      "rules",
      "
      x ::= TOKEN
      x ::= TOKEN

      stmts ::= stmt+
      ",
      None,
    );
    assert_eq!(gb.duplicates(), &[(Name::new("x"), names(&["TOKEN"]))]);
    assert_eq!(*seen.borrow(), vec!["x ::= TOKEN".to_string()]);

    let g = gb.build().unwrap();
    let labels = g.rule_labels();
    let expected: BTreeMap<_, _> = vec![
      ((Name::new(START), names(&[BOF, "x"])), Name::new(START)),
      ((Name::new("stmts"), names(&["stmt"])), Name::new("rules")),
      ((Name::new("stmts"), names(&["stmts", "stmt"])), Name::new("rules")),
      ((Name::new("x"), names(&["TOKEN"])), Name::new("rules")),
    ]
    .into_iter()
    .collect();
    assert_eq!(labels, expected);
    assert!(g.is_list_like("stmts"));
  }

  #[test]
  fn test_latest_duplicate_action_wins() {
    let g = build::<i64, _>("x", |gb| {
      gb.add_rules_with("first", "x ::= A", |_| 1)
        .add_rules_with("second", "x ::= A", |_| 2);
    })
    .unwrap();
    assert_eq!(g.num_rules(), 2);
    let action = g.action(1).unwrap();
    assert_eq!(action(vec![]), 2);
    assert_eq!(g.rule(1).label(), "second");
  }

  #[test]
  fn test_helper_nonterminals() {
    let g = build::<(), _>("call", |gb| {
      gb.add_rules(
        "rules",
        "
        call ::= NAME LPAREN arg* RPAREN
        call ::= NAME DOT arg* NAME?
        arg ::= NAME
        ",
        None,
      );
    })
    .unwrap();
    expect_test::expect![[r#"
        START ::= |- call
        NAME_opt ::=
        NAME_opt ::= NAME
        arg ::= NAME
        arg_star ::=
        arg_star ::= arg_star arg
        call ::= NAME DOT arg_star NAME_opt
        call ::= NAME LPAREN arg_star RPAREN
    "#]]
    .assert_eq(&g.dump_to_string());
    assert!(g.is_list_like("arg_star"));
    assert!(g.is_optional("NAME_opt"));
  }

  #[test]
  fn test_undefined_start() {
    let err = build::<(), _>("program", |gb| {
      gb.add_rules("rules", "expr ::= NUMBER", None);
    })
    .unwrap_err();
    assert_eq!(err, GrammarError::UndefinedStart(Name::new("program")));
  }

  #[test]
  fn test_unproductive() {
    let err = build::<(), _>("foo", |gb| {
      gb.add_rules("rules", "foo ::= foo", None);
    })
    .unwrap_err();
    assert!(matches!(err, GrammarError::Unproductive { .. }));
  }

  #[test]
  fn test_undeclared_symbol() {
    let err = build::<(), _>("expr", |gb| {
      gb.declare_terminals(vec!["NUMBER"])
        .add_rules("rules", "expr ::= NUMBER PLUS NUMBER", None);
    })
    .unwrap_err();
    assert_eq!(
      err,
      GrammarError::UndeclaredSymbol {
        symbol: Name::new("PLUS"),
        lhs: Name::new("expr"),
      }
    );
  }

  #[test]
  fn test_malformed_rule_is_reported_at_build() {
    let err = build::<(), _>("expr", |gb| {
      gb.add_rules("rules", "expr NUMBER", None);
    })
    .unwrap_err();
    assert!(matches!(err, GrammarError::MalformedRule { .. }));
  }

  #[test]
  fn test_add_then_remove_round_trips() {
    let g = examples::make_expr::<()>();
    let before = g.dump_to_string();

    let mut gb = g.to_builder();
    gb.add_rules("rules", "expr ::= expr SUB_OP term", None);
    let added = gb.build().unwrap();
    assert!(added.dump_to_string().contains("expr ::= expr SUB_OP term\n"));

    let mut gb = added.to_builder();
    gb.remove_rules("expr ::= expr SUB_OP term");
    assert_eq!(gb.build().unwrap().dump_to_string(), before);
  }

  #[test]
  fn test_remove_unknown_rule() {
    let mut gb = examples::make_expr::<()>().to_builder();
    gb.remove_rules("expr ::= NOTHING");
    assert!(matches!(gb.build(), Err(GrammarError::UnknownRule { .. })));
  }

  #[test]
  fn test_remove_whole_rule_operator() {
    let mut gb = GrammarBuilder::<()>::new("x");
    gb.add_rules("rules", "x ::= A\nstmts ::= stmt+", None);
    gb.remove_rules("stmts ::= stmt+");
    let g = gb.build().unwrap();
    assert!(!g.is_nonterminal("stmts"));
    assert!(!g.is_list_like("stmts"));
  }
}

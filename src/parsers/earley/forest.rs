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

//! Extraction and evaluation of a single derivation from a recognized chart.
//!
//! Among the rules completing the same nonterminal over the same span, the
//! one with the highest priority wins, and among equal priorities the one
//! registered first. When a rule's children can be split over the span in
//! more than one way, earlier children take the longest span they can, so
//! ambiguous binary rules associate to the left.

use {
  super::{state::Item, Chart},
  crate::{
    grammar::{Grammar, RuleId, START},
    parsers::{Arg, ParseOptions, TreeBuilder},
    token::Token,
    utils::Name,
  },
  im::Vector,
  std::{
    cmp::Reverse,
    collections::{BTreeMap, BTreeSet},
  },
};

/// Index of a derivation within its [`Forest`].
pub type DerivId = usize;

#[derive(Clone, Debug)]
pub enum DerivChild {
  /// The token at the given input position.
  Token(usize),
  Node(DerivId),
}

/// One chosen derivation of a nonterminal over the input span
/// `[start, end)`.
#[derive(Clone, Debug)]
pub struct Derivation {
  pub rule: RuleId,
  pub start: usize,
  pub end: usize,
  pub children: Vector<DerivChild>,
}

type SpanKey = (Name, usize, usize);

/// Derivations live in a flat arena and refer to their children by index,
/// so no part of extraction, evaluation or cleanup recurses along a chain of
/// derivations.
pub struct Forest<'a, V> {
  grammar: &'a Grammar<V>,
  chart: &'a Chart,
  tokens: &'a [Token],
  nodes: Vec<Derivation>,
  memo: BTreeMap<SpanKey, DerivId>,
  in_progress: BTreeSet<SpanKey>,
}

enum Step {
  Enter(DerivId),
  Reduce(DerivId),
}

impl<'a, V> Forest<'a, V> {
  pub fn new(
    grammar: &'a Grammar<V>,
    chart: &'a Chart,
    tokens: &'a [Token],
  ) -> Self {
    Forest {
      grammar,
      chart,
      tokens,
      nodes: Vec::new(),
      memo: BTreeMap::new(),
      in_progress: BTreeSet::new(),
    }
  }

  pub fn node(&self, id: DerivId) -> &Derivation {
    &self.nodes[id]
  }

  /// Derives the start symbol over the whole input.
  ///
  /// Every completion in the chart is derived first, by increasing end and
  /// then decreasing origin. A child ends no later than its parent and, at
  /// the same end, starts no earlier, so by the time a span is derived its
  /// children are already memoized and `derive` only nests across spans
  /// that are identical.
  pub fn derive_root(&mut self) -> Option<DerivId> {
    let chart = self.chart;
    for end in 0..=self.tokens.len() {
      let mut spans = chart
        .set(end)
        .completed_spans()
        .filter(|(nt, _)| *nt != START)
        .map(|(nt, origin)| (Reverse(origin), nt))
        .collect::<Vec<_>>();
      spans.sort();
      for (Reverse(origin), nt) in spans {
        self.derive(nt, origin, end);
      }
    }
    let start = self.grammar.start().clone();
    self.derive(&start, 0, self.tokens.len())
  }

  /// Chooses a derivation of `nt` over `[start, end)`.
  ///
  /// A span already being derived further up the stack is treated as
  /// underivable, which cuts cycles such as `a ::= b`, `b ::= a`.
  pub fn derive(
    &mut self,
    nt: &Name,
    start: usize,
    end: usize,
  ) -> Option<DerivId> {
    let key = (nt.clone(), start, end);
    if let Some(&id) = self.memo.get(&key) {
      return Some(id);
    }
    if !self.in_progress.insert(key.clone()) {
      return None;
    }

    let grammar = self.grammar;
    let mut candidates = self
      .chart
      .set(end)
      .completions(nt, start)
      .map(|rules| rules.iter().copied().collect::<Vec<_>>())
      .unwrap_or_default();
    candidates.sort_by_key(|&r| (Reverse(grammar.priority(r)), r));

    let mut result = None;
    for rule in candidates {
      let len = grammar.rule(rule).rhs().len();
      if let Some(children) = self.split(rule, len, start, end) {
        self.nodes.push(Derivation {
          rule,
          start,
          end,
          children,
        });
        result = Some(self.nodes.len() - 1);
        break;
      }
    }

    self.in_progress.remove(&key);
    if let Some(id) = result {
      self.memo.insert(key, id);
    }
    result
  }

  /// Matches the first `matched` symbols of `rule` over `[start, end)`.
  /// Recurses once per symbol of the rule.
  fn split(
    &mut self,
    rule: RuleId,
    matched: usize,
    start: usize,
    end: usize,
  ) -> Option<Vector<DerivChild>> {
    if matched == 0 {
      return if start == end {
        Some(Vector::new())
      } else {
        None
      };
    }

    let grammar = self.grammar;
    let chart = self.chart;
    let sym = &grammar.rule(rule).rhs()[matched - 1];
    let prefix_item = Item {
      rule,
      dot: matched - 1,
      origin: start,
    };

    if !grammar.is_nonterminal(sym) {
      if end == start
        || self.tokens[end - 1].kind() != sym
        || !chart.set(end - 1).contains(&prefix_item)
      {
        return None;
      }
      let mut children = self.split(rule, matched - 1, start, end - 1)?;
      children.push_back(DerivChild::Token(end - 1));
      return Some(children);
    }

    for mid in chart.set(end).completion_origins(sym, start, end) {
      if !chart.set(mid).contains(&prefix_item) {
        continue;
      }
      if let Some(child) = self.derive(sym, mid, end) {
        if let Some(mut children) = self.split(rule, matched - 1, start, mid)
        {
          children.push_back(DerivChild::Node(child));
          return Some(children);
        }
      }
    }
    None
  }

  /// Computes the value of a derivation bottom-up, through each rule's
  /// action or the tree builder.
  pub fn evaluate<B>(
    &self,
    root: DerivId,
    builder: &B,
    options: &ParseOptions,
  ) -> V
  where
    B: TreeBuilder<V> + ?Sized,
  {
    let mut steps = vec![Step::Enter(root)];
    let mut values: Vec<V> = Vec::new();
    while let Some(step) = steps.pop() {
      match step {
        Step::Enter(id) => {
          steps.push(Step::Reduce(id));
          for child in self.nodes[id].children.iter().rev() {
            if let DerivChild::Node(sub) = child {
              steps.push(Step::Enter(*sub));
            }
          }
        }
        Step::Reduce(id) => {
          let d = &self.nodes[id];
          let subtrees = d
            .children
            .iter()
            .filter(|c| matches!(c, DerivChild::Node(_)))
            .count();
          let mut subvalues =
            values.split_off(values.len() - subtrees).into_iter();
          let args = d
            .children
            .iter()
            .map(|child| match child {
              DerivChild::Token(pos) => Arg::Token(self.tokens[*pos].clone()),
              DerivChild::Node(_) => Arg::Value(
                subvalues.next().expect("children are evaluated first"),
              ),
            })
            .collect::<Vec<_>>();
          values.push(self.reduce(d, args, builder, options));
        }
      }
    }
    values.pop().expect("the root is evaluated last")
  }

  fn reduce<B>(
    &self,
    d: &Derivation,
    args: Vec<Arg<V>>,
    builder: &B,
    options: &ParseOptions,
  ) -> V
  where
    B: TreeBuilder<V> + ?Sized,
  {
    let rule = self.grammar.rule(d.rule);
    if options.reductions {
      log::debug!("Reduce {} over tokens {}..{}", rule, d.start, d.end);
    }
    match self.grammar.action(d.rule) {
      Some(action) => action(args),
      None => builder.nonterminal(self.grammar, rule, args),
    }
  }
}

#[cfg(test)]
mod test {
  use {
    super::*,
    crate::grammar::{build, examples, Rule},
  };

  fn derive_str(g: &Grammar<()>, kinds: &[&str]) -> String {
    let tokens = kinds.iter().map(|k| Token::bare(*k)).collect::<Vec<_>>();
    let chart =
      Chart::recognize(g, &tokens, &ParseOptions::default()).unwrap();
    let mut forest = Forest::new(g, &chart, &tokens);
    let root = forest.derive_root().unwrap();
    render(g, &forest, root)
  }

  fn render(g: &Grammar<()>, forest: &Forest<()>, id: DerivId) -> String {
    let d = forest.node(id);
    let parts = d
      .children
      .iter()
      .map(|c| match c {
        DerivChild::Token(pos) => pos.to_string(),
        DerivChild::Node(sub) => render(g, forest, *sub),
      })
      .collect::<Vec<_>>();
    format!("{}({})", g.rule(d.rule).lhs(), parts.join(" "))
  }

  #[test]
  fn test_left_associative_split() {
    let g = build::<(), _>("e", |gb| {
      gb.add_rules("rules", "e ::= e PLUS e\ne ::= N", None);
    })
    .unwrap();
    assert_eq!(
      derive_str(&g, &["N", "PLUS", "N", "PLUS", "N"]),
      "e(e(e(0) 1 e(2)) 3 e(4))"
    );
  }

  #[test]
  fn test_first_registered_rule_wins() {
    let g = build::<(), _>("s", |gb| {
      gb.add_rules("rules", "s ::= a\ns ::= b\na ::= X\nb ::= X", None);
    })
    .unwrap();
    assert_eq!(derive_str(&g, &["X"]), "s(a(0))");
  }

  #[test]
  fn test_priority_overrides_order() {
    let g = build::<(), _>("s", |gb| {
      gb.add_rules("rules", "s ::= a\ns ::= b\na ::= X\nb ::= X", None)
        .set_priority("s", &["b"], 1);
    })
    .unwrap();
    assert_eq!(derive_str(&g, &["X"]), "s(b(0))");
  }

  #[test]
  fn test_cycles_are_cut() {
    let g = build::<(), _>("a", |gb| {
      gb.add_rules("rules", "a ::= b\nb ::= a\nb ::= X", None);
    })
    .unwrap();
    assert_eq!(derive_str(&g, &["X"]), "a(b(0))");
  }

  #[test]
  fn test_empty_list() {
    let g = examples::make_star_list::<()>();
    assert_eq!(derive_str(&g, &[]), "items()");
  }

  #[test]
  fn test_long_list_is_a_chain() {
    let g = examples::make_plus_list::<usize>();
    let n = 100_000;
    let tokens = vec![Token::bare("ITEM"); n];
    let chart =
      Chart::recognize(&g, &tokens, &ParseOptions::default()).unwrap();
    let mut forest = Forest::new(&g, &chart, &tokens);
    let root = forest.derive_root().unwrap();

    let mut id = root;
    let mut depth = 1;
    while let Some(DerivChild::Node(head)) = forest.node(id).children.front() {
      if g.rule(forest.node(*head).rule).lhs() != "items" {
        break;
      }
      id = *head;
      depth += 1;
    }
    assert_eq!(depth, n);

    let count_items = |_: &Rule, args: Vec<Arg<usize>>| -> usize {
      args.into_iter().map(|a| a.into_value().unwrap_or(1)).sum()
    };
    let count = forest.evaluate(root, &count_items, &ParseOptions::default());
    assert_eq!(count, n);
  }
}

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

//! Provides base data structures to represent and work with Earley states.
//!
//! An Earley state set holds the items reached at one input position.

use {
  crate::{
    grammar::{Grammar, RuleId},
    utils::Name,
  },
  std::collections::{BTreeMap, BTreeSet},
};

/// A partially matched rule: `rule` with `dot` symbols matched, starting at
/// input position `origin`.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct Item {
  pub rule: RuleId,
  pub dot: usize,
  pub origin: usize,
}

impl Item {
  pub fn new(rule: RuleId, origin: usize) -> Self {
    Item {
      rule,
      dot: 0,
      origin,
    }
  }

  /// The item the chart is seeded with: the augmented start rule with the
  /// begin-of-file marker already matched.
  pub fn start() -> Self {
    Item {
      rule: 0,
      dot: 1,
      origin: 0,
    }
  }

  pub fn advance(self) -> Self {
    Item {
      dot: self.dot + 1,
      ..self
    }
  }

  pub fn next_symbol<'g, V>(&self, g: &'g Grammar<V>) -> Option<&'g Name> {
    g.rule(self.rule).rhs().get(self.dot)
  }

  pub fn is_complete<V>(&self, g: &Grammar<V>) -> bool {
    self.dot >= g.rule(self.rule).rhs().len()
  }

  /// Renders the item in the usual dotted notation, e.g.
  /// `expr ::= expr . ADD_OP term (0)`.
  pub fn describe<V>(&self, g: &Grammar<V>) -> String {
    let rule = g.rule(self.rule);
    let mut text = format!("{} ::=", rule.lhs());
    for (i, sym) in rule.rhs().iter().enumerate() {
      if i == self.dot {
        text.push_str(" .");
      }
      text.push(' ');
      text.push_str(sym);
    }
    if self.dot >= rule.rhs().len() {
      text.push_str(" .");
    }
    text.push_str(&format!(" ({})", self.origin));
    text
  }
}

/// The items reached at one input position, in the order they were added.
#[derive(Clone, Debug, Default)]
pub struct EarleyStateSet {
  items: Vec<Item>,
  seen: BTreeSet<Item>,
  /// Items of this set whose next symbol is the keyed nonterminal.
  waiting: BTreeMap<Name, Vec<Item>>,
  /// Accepted completions ending here, keyed by (lhs, origin).
  completed: BTreeMap<(Name, usize), BTreeSet<RuleId>>,
  /// Nonterminals that completed with an empty span at this position.
  empty_here: BTreeSet<Name>,
}

impl EarleyStateSet {
  pub fn new() -> Self {
    Self::default()
  }

  /// Adds an item if it is not already present. Returns true if added.
  pub fn add(&mut self, item: Item) -> bool {
    if self.seen.insert(item) {
      self.items.push(item);
      true
    } else {
      false
    }
  }

  pub fn contains(&self, item: &Item) -> bool {
    self.seen.contains(item)
  }

  pub fn len(&self) -> usize {
    self.items.len()
  }

  pub fn is_empty(&self) -> bool {
    self.items.is_empty()
  }

  pub fn get(&self, index: usize) -> Option<Item> {
    self.items.get(index).copied()
  }

  pub fn items(&self) -> &[Item] {
    &self.items
  }

  pub fn add_waiting(&mut self, sym: &Name, item: Item) {
    self.waiting.entry(sym.clone()).or_default().push(item);
  }

  pub fn waiting_on(&self, sym: &str) -> &[Item] {
    self.waiting.get(sym).map(Vec::as_slice).unwrap_or(&[])
  }

  /// Records an accepted completion of `rule` spanning `origin` up to this
  /// set. Returns true if it was not already recorded.
  pub fn record_completion(
    &mut self,
    lhs: &Name,
    origin: usize,
    rule: RuleId,
    here: usize,
  ) -> bool {
    if origin == here {
      self.empty_here.insert(lhs.clone());
    }
    self
      .completed
      .entry((lhs.clone(), origin))
      .or_default()
      .insert(rule)
  }

  pub fn completed_empty(&self, lhs: &str) -> bool {
    self.empty_here.contains(lhs)
  }

  /// Returns the rules of `lhs` completed from `origin` up to this set.
  pub fn completions(
    &self,
    lhs: &Name,
    origin: usize,
  ) -> Option<&BTreeSet<RuleId>> {
    self.completed.get(&(lhs.clone(), origin))
  }

  /// Origins in `[low, high]` from which `lhs` completed up to this set,
  /// latest first.
  pub fn completion_origins(
    &self,
    lhs: &Name,
    low: usize,
    high: usize,
  ) -> impl DoubleEndedIterator<Item = usize> + '_ {
    self
      .completed
      .range((lhs.clone(), low)..=(lhs.clone(), high))
      .rev()
      .map(|((_, origin), _)| *origin)
  }

  /// Every `(lhs, origin)` pair completed up to this set.
  pub fn completed_spans(&self) -> impl Iterator<Item = (&Name, usize)> {
    self.completed.keys().map(|(lhs, origin)| (lhs, *origin))
  }
}

#[cfg(test)]
mod test {
  use {super::*, crate::grammar::examples};

  #[test]
  fn test_describe_item() {
    let g = examples::make_expr::<()>();
    let id = g.find_rule("expr", &["expr", "ADD_OP", "term"]).unwrap();
    let item = Item::new(id, 0).advance();
    assert_eq!(item.describe(&g), "expr ::= expr . ADD_OP term (0)");
    assert_eq!(item.next_symbol(&g).unwrap(), "ADD_OP");
    assert!(item.advance().advance().is_complete(&g));
    assert_eq!(Item::start().describe(&g), "START ::= |- . expr (0)");
  }

  #[test]
  fn test_set_deduplicates() {
    let mut set = EarleyStateSet::new();
    assert!(set.add(Item::start()));
    assert!(!set.add(Item::start()));
    assert_eq!(set.len(), 1);
    assert!(set.contains(&Item::start()));
  }

  #[test]
  fn test_completion_origins() {
    let mut set = EarleyStateSet::new();
    let items = Name::from("items");
    set.record_completion(&items, 0, 1, 5);
    set.record_completion(&items, 3, 2, 5);
    set.record_completion(&Name::from("item"), 4, 3, 5);
    let origins = set.completion_origins(&items, 0, 5).collect::<Vec<_>>();
    assert_eq!(origins, vec![3, 0]);
    assert_eq!(set.completion_origins(&items, 1, 5).count(), 1);
    assert_eq!(set.completed_spans().count(), 3);
  }
}

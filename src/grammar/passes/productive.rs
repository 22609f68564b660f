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

//! Finds nonterminals that can never derive a string of terminals, such as
//! `foo` in `foo ::= foo`.

use {
  super::{Pass, PassContext},
  crate::{
    grammar::{Grammar, GrammarError, START},
    utils::{change_iter, change_loop, Name, WasChanged},
  },
  std::collections::BTreeSet,
};

/// The set of productive nonterminals of a grammar.
#[derive(Clone, Debug)]
pub struct Productive(BTreeSet<Name>);

impl Productive {
  pub fn is_productive(&self, nt: &str) -> bool {
    self.0.contains(nt)
  }

  pub fn productive_set(&self) -> &BTreeSet<Name> {
    &self.0
  }
}

fn calculate_productive<V>(g: &Grammar<V>) -> BTreeSet<Name> {
  let mut productive = BTreeSet::new();
  change_loop(|| {
    change_iter(g.rules(), |rule| {
      if productive.contains(rule.lhs()) {
        return WasChanged::Unchanged;
      }
      let derives = rule
        .rhs()
        .iter()
        .all(|sym| !g.is_nonterminal(sym) || productive.contains(sym));
      if derives {
        productive.insert(rule.lhs().clone());
      }
      WasChanged::from_changed(derives)
    })
  });
  productive
}

impl<V> Pass<V> for Productive {
  type Error = GrammarError;

  fn run_pass(pass_map: &PassContext<V>) -> Result<Self, Self::Error> {
    let g = pass_map.grammar();
    let productive = calculate_productive(g);
    let unproductive = g
      .nonterminals()
      .filter(|nt| *nt != START && !productive.contains(*nt))
      .cloned()
      .collect::<BTreeSet<_>>();
    if unproductive.is_empty() {
      Ok(Productive(productive))
    } else {
      Err(GrammarError::Unproductive {
        nonterms: unproductive,
      })
    }
  }
}

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

//! A pass is a type of query over the grammar that may be depended on by
//! other passes. Each pass is computed at most once per context, on demand.

pub mod check;
pub mod productive;

use {
  super::Grammar,
  std::{
    any::{Any, TypeId},
    cell::RefCell,
    collections::BTreeMap,
    rc::Rc,
  },
};

/// A unique placeholder type to represent the value of a pass that hasn't
/// completed.
///
/// This catches passes that depend on themselves, directly or indirectly.
struct NoCurrentValue;

/// A query over a grammar, producing a value of the implementing type.
pub trait Pass<V>: Any + Sized + 'static {
  type Error: std::error::Error + 'static;

  fn run_pass(pass_map: &PassContext<V>) -> Result<Self, Self::Error>;
}

/// A map from passes to their associated results.
pub struct PassContext<'a, V> {
  grammar: &'a Grammar<V>,
  passes: RefCell<BTreeMap<TypeId, Rc<dyn Any + 'static>>>,
}

impl<'a, V> PassContext<'a, V> {
  pub fn new(grammar: &'a Grammar<V>) -> Self {
    PassContext {
      grammar,
      passes: RefCell::new(BTreeMap::new()),
    }
  }

  /// Returns the underlying grammar.
  pub fn grammar(&self) -> &'a Grammar<V> {
    self.grammar
  }

  /// Returns the result of the given pass, computing it if it hasn't been
  /// computed yet.
  pub fn get_pass<P>(&self) -> Result<Rc<P>, P::Error>
  where
    P: Pass<V>,
  {
    let pass_type = TypeId::of::<P>();

    let contains_key = match self.passes.borrow().get(&pass_type) {
      Some(pass) => {
        if pass.downcast_ref::<NoCurrentValue>().is_some() {
          panic!("Detected recursive loop in pass dependencies.")
        }
        true
      }
      None => false,
    };

    if !contains_key {
      self
        .passes
        .borrow_mut()
        .insert(pass_type, Rc::new(NoCurrentValue));
      let value = match P::run_pass(self) {
        Ok(value) => value,
        Err(e) => {
          self.passes.borrow_mut().remove(&pass_type);
          return Err(e);
        }
      };
      self.passes.borrow_mut().insert(pass_type, Rc::new(value));
    }

    let any_pass_ref = self
      .passes
      .borrow()
      .get(&pass_type)
      .expect("existence already checked")
      .clone();

    Ok(any_pass_ref.downcast::<P>().expect("type already verified"))
  }
}

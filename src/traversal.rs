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

//! Tree walking with per-kind handlers.
//!
//! A [`Dispatch`] table maps node kinds to handlers, and is resolved once
//! when it is built. A [`Walker`] carries the table and a piece of user
//! state through a traversal. Handlers receive the walker itself, so they
//! can recurse into children explicitly, read or update the state, and
//! decide with [`Visit::Prune`] that the walker must not descend further.

use {
  crate::{
    ast::{Child, Node},
    token::Token,
    utils::Name,
  },
  std::{collections::BTreeMap, rc::Rc},
};

/// What the walker does after a node's handler returns.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum Visit {
  /// Descend into the children, then run the exit hook.
  Continue,
  /// Skip the children and the exit hook.
  Prune,
}

pub type NodeHandler<S, E> =
  Rc<dyn Fn(&mut Walker<S, E>, &mut Node) -> Result<Visit, E>>;
pub type ExitHandler<S, E> =
  Rc<dyn Fn(&mut Walker<S, E>, &mut Node) -> Result<(), E>>;
pub type TokenHandler<S, E> =
  Rc<dyn Fn(&mut Walker<S, E>, &Token) -> Result<(), E>>;

/// Handlers keyed by node or token kind, with optional fallbacks.
///
/// A kind without a handler is not an error: nodes go to the default
/// handler if one is set, and are otherwise simply descended into.
#[derive(Derivative)]
#[derivative(Clone(bound = ""))]
pub struct Dispatch<S, E> {
  enter: BTreeMap<Name, NodeHandler<S, E>>,
  exit: BTreeMap<Name, ExitHandler<S, E>>,
  tokens: BTreeMap<Name, TokenHandler<S, E>>,
  default: Option<NodeHandler<S, E>>,
  default_token: Option<TokenHandler<S, E>>,
}

impl<S, E> Default for Dispatch<S, E> {
  fn default() -> Self {
    Dispatch {
      enter: BTreeMap::new(),
      exit: BTreeMap::new(),
      tokens: BTreeMap::new(),
      default: None,
      default_token: None,
    }
  }
}

impl<S, E> std::fmt::Debug for Dispatch<S, E> {
  fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
    f.debug_struct("Dispatch")
      .field("enter", &self.enter.keys().collect::<Vec<_>>())
      .field("exit", &self.exit.keys().collect::<Vec<_>>())
      .field("tokens", &self.tokens.keys().collect::<Vec<_>>())
      .field("default", &self.default.is_some())
      .field("default_token", &self.default_token.is_some())
      .finish()
  }
}

impl<S, E> Dispatch<S, E> {
  pub fn new() -> Self {
    Self::default()
  }

  /// Sets the handler run when a node of `kind` is entered.
  pub fn on<F>(mut self, kind: impl Into<Name>, handler: F) -> Self
  where
    F: Fn(&mut Walker<S, E>, &mut Node) -> Result<Visit, E> + 'static,
  {
    self.enter.insert(kind.into(), Rc::new(handler));
    self
  }

  /// Sets the hook run after the children of a node of `kind`.
  pub fn on_exit<F>(mut self, kind: impl Into<Name>, handler: F) -> Self
  where
    F: Fn(&mut Walker<S, E>, &mut Node) -> Result<(), E> + 'static,
  {
    self.exit.insert(kind.into(), Rc::new(handler));
    self
  }

  pub fn on_token<F>(mut self, kind: impl Into<Name>, handler: F) -> Self
  where
    F: Fn(&mut Walker<S, E>, &Token) -> Result<(), E> + 'static,
  {
    self.tokens.insert(kind.into(), Rc::new(handler));
    self
  }

  /// Sets the handler for nodes whose kind has no handler of its own.
  pub fn on_default<F>(mut self, handler: F) -> Self
  where
    F: Fn(&mut Walker<S, E>, &mut Node) -> Result<Visit, E> + 'static,
  {
    self.default = Some(Rc::new(handler));
    self
  }

  pub fn on_default_token<F>(mut self, handler: F) -> Self
  where
    F: Fn(&mut Walker<S, E>, &Token) -> Result<(), E> + 'static,
  {
    self.default_token = Some(Rc::new(handler));
    self
  }

  pub fn has_handler(&self, kind: &str) -> bool {
    self.enter.contains_key(kind)
  }

  fn enter_handler(&self, kind: &str) -> Option<NodeHandler<S, E>> {
    self.enter.get(kind).or_else(|| self.default.as_ref()).cloned()
  }

  fn exit_handler(&self, kind: &str) -> Option<ExitHandler<S, E>> {
    self.exit.get(kind).cloned()
  }

  fn token_handler(&self, kind: &str) -> Option<TokenHandler<S, E>> {
    self.tokens.get(kind).or_else(|| self.default_token.as_ref()).cloned()
  }
}

/// Drives a traversal: a dispatch table plus the state handlers share.
pub struct Walker<S, E> {
  dispatch: Rc<Dispatch<S, E>>,
  state: S,
}

impl<S, E> Walker<S, E> {
  pub fn new(dispatch: impl Into<Rc<Dispatch<S, E>>>, state: S) -> Self {
    Walker {
      dispatch: dispatch.into(),
      state,
    }
  }

  pub fn state(&self) -> &S {
    &self.state
  }

  pub fn state_mut(&mut self) -> &mut S {
    &mut self.state
  }

  pub fn into_state(self) -> S {
    self.state
  }

  /// Runs the node's handler, then (unless pruned) every child in order,
  /// then the node's exit hook.
  pub fn preorder(&mut self, node: &mut Node) -> Result<(), E> {
    if self.enter(node)? == Visit::Prune {
      return Ok(());
    }
    for child in node.children_mut() {
      match child {
        Child::Node(n) => self.preorder(n)?,
        Child::Token(t) => self.token(t)?,
      }
    }
    self.exit(node)
  }

  /// Visits every child first, then runs the node's handler and, unless it
  /// prunes, the node's exit hook.
  pub fn postorder(&mut self, node: &mut Node) -> Result<(), E> {
    for child in node.children_mut() {
      match child {
        Child::Node(n) => self.postorder(n)?,
        Child::Token(t) => self.token(t)?,
      }
    }
    if self.enter(node)? == Visit::Prune {
      return Ok(());
    }
    self.exit(node)
  }

  /// Visits a single child in preorder.
  pub fn visit_child(&mut self, child: &mut Child) -> Result<(), E> {
    match child {
      Child::Node(n) => self.preorder(n),
      Child::Token(t) => self.token(t),
    }
  }

  /// Runs the handler for a token, if there is one.
  pub fn token(&mut self, token: &Token) -> Result<(), E> {
    match self.dispatch.token_handler(token.kind()) {
      Some(handler) => handler(self, token),
      None => Ok(()),
    }
  }

  fn enter(&mut self, node: &mut Node) -> Result<Visit, E> {
    match self.dispatch.enter_handler(node.kind()) {
      Some(handler) => handler(self, node),
      None => Ok(Visit::Continue),
    }
  }

  fn exit(&mut self, node: &mut Node) -> Result<(), E> {
    match self.dispatch.exit_handler(node.kind()) {
      Some(handler) => handler(self, node),
      None => Ok(()),
    }
  }
}

/// Walks `node` in preorder with a fresh walker and returns the final
/// state.
pub fn preorder<S, E>(
  dispatch: impl Into<Rc<Dispatch<S, E>>>,
  state: S,
  node: &mut Node,
) -> Result<S, E> {
  let mut walker = Walker::new(dispatch, state);
  walker.preorder(node)?;
  Ok(walker.into_state())
}

/// Walks `node` in postorder with a fresh walker and returns the final
/// state.
pub fn postorder<S, E>(
  dispatch: impl Into<Rc<Dispatch<S, E>>>,
  state: S,
  node: &mut Node,
) -> Result<S, E> {
  let mut walker = Walker::new(dispatch, state);
  walker.postorder(node)?;
  Ok(walker.into_state())
}

#[cfg(test)]
mod test {
  use {super::*, std::convert::Infallible};

  type Log = Vec<String>;

  fn leaf(kind: &str, attr: &str) -> Child {
    Child::Token(Token::new(kind, attr))
  }

  fn sample() -> Node {
    // add(single(1), multiply(2, 3))
    Node::new(
      "add",
      vec![
        Child::Node(Node::new("single", vec![leaf("INTEGER", "1")])),
        Child::Node(Node::new(
          "multiply",
          vec![leaf("INTEGER", "2"), leaf("INTEGER", "3")],
        )),
      ],
    )
  }

  fn logging() -> Dispatch<Log, Infallible> {
    Dispatch::new()
      .on_default(|w: &mut Walker<Log, Infallible>, n: &mut Node| {
        w.state_mut().push(format!("enter {}", n.kind()));
        Ok(Visit::Continue)
      })
      .on_exit("add", |w: &mut Walker<Log, Infallible>, _: &mut Node| {
        w.state_mut().push("exit add".to_string());
        Ok(())
      })
      .on_default_token(|w: &mut Walker<Log, Infallible>, t: &Token| {
        w.state_mut().push(format!("token {}", t.attr()));
        Ok(())
      })
  }

  #[test]
  fn test_preorder_with_exit_hook() {
    let log = preorder(logging(), Vec::new(), &mut sample()).unwrap();
    assert_eq!(
      log,
      vec![
        "enter add",
        "enter single",
        "token 1",
        "enter multiply",
        "token 2",
        "token 3",
        "exit add",
      ]
    );
  }

  #[test]
  fn test_postorder() {
    let log = postorder(logging(), Vec::new(), &mut sample()).unwrap();
    assert_eq!(
      log,
      vec![
        "token 1",
        "enter single",
        "token 2",
        "token 3",
        "enter multiply",
        "enter add",
        "exit add",
      ]
    );
  }

  #[test]
  fn test_prune_skips_children_and_exit() {
    let dispatch = logging().on(
      "add",
      |w: &mut Walker<Log, Infallible>, _: &mut Node| {
        w.state_mut().push("pruned add".to_string());
        Ok(Visit::Prune)
      },
    );
    let log = preorder(dispatch, Vec::new(), &mut sample()).unwrap();
    assert_eq!(log, vec!["pruned add"]);
  }

  #[test]
  fn test_handlers_set_values() {
    fn sum(
      w: &mut Walker<(), Infallible>,
      n: &mut Node,
    ) -> Result<Visit, Infallible> {
      let mut total = 0;
      for child in n.children_mut() {
        match child {
          Child::Token(t) => {
            let attr = t.attr().as_str();
            total += attr.and_then(|s| s.parse::<i64>().ok()).unwrap_or(0)
          }
          Child::Node(sub) => {
            w.preorder(sub)?;
            total += sub.value().as_int().unwrap_or(0);
          }
        }
      }
      n.set_value(total);
      Ok(Visit::Prune)
    }

    let mut tree = sample();
    preorder(Dispatch::new().on_default(sum), (), &mut tree).unwrap();
    assert_eq!(tree.value().as_int(), Some(6));
  }

  #[test]
  fn test_errors_propagate() {
    let dispatch = Dispatch::<(), String>::new()
      .on("multiply", |_: &mut Walker<(), String>, n: &mut Node| {
        Err(format!("cannot handle {}", n.kind()))
      });
    let err = preorder(dispatch, (), &mut sample()).unwrap_err();
    assert_eq!(err, "cannot handle multiply");
  }
}

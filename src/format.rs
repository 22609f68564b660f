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

//! Table-driven regeneration of text from trees.
//!
//! A [`TemplateTable`] maps kinds to compiled [`Template`]s. The
//! [`Formatter`] walks a tree in preorder; a node whose kind has a custom
//! handler is given to it, otherwise the node's template (if any) is
//! interpreted and its children are left to the template. Nodes without a
//! template are descended into, and tokens without one write nothing.
//!
//! By default a node's table key is its own kind. A key path makes the key
//! the kind of a descendant instead, so that e.g. a `stmt` wrapper is
//! formatted by the template of the statement kind it contains.

pub mod buffer;
pub mod template;

pub use {
  buffer::OutputBuffer,
  template::{Field, Subject, Template, TemplateArg},
};

use {
  crate::{
    ast::{Child, Node},
    token::Token,
    traversal::{Dispatch, Visit, Walker},
    utils::Name,
  },
  std::{collections::BTreeMap, rc::Rc},
  template::resolve_index,
};

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum FormatError {
  #[error("Unknown escape %{escape} in `{template}'")]
  UnknownEscape { escape: char, template: String },
  #[error("Unterminated escape in `{template}'")]
  Unterminated { template: String },
  #[error("Bad child index [{index}] in `{template}'")]
  BadIndex { index: String, template: String },
  #[error("Unknown field {{{field}}} in `{template}'")]
  UnknownField { field: String, template: String },
  #[error("Escape %{escape} in `{template}' has no argument")]
  MissingArgument { escape: char, template: String },
  #[error("Escape %{escape} in `{template}' cannot take {arg}")]
  ArgumentMismatch {
    escape: char,
    arg: String,
    template: String,
  },
  #[error("`{template}' has {count} unused arguments")]
  ExtraArguments { template: String, count: usize },
  #[error("{kind} has no child {index}")]
  ChildOutOfRange { kind: Name, index: isize },
  #[error("Expected a {expected} child, found {found}")]
  KindMismatch { expected: Name, found: Name },
  #[error("Token {kind} has no children")]
  NotANode { kind: Name },
  #[error("{kind} has no {field}")]
  MissingField { kind: Name, field: &'static str },
}

/// Templates keyed by kind, plus the key paths and indentation unit they
/// are formatted with.
#[derive(Clone, Debug)]
pub struct TemplateTable {
  templates: BTreeMap<Name, Template>,
  key_paths: BTreeMap<Name, Vec<isize>>,
  indent_unit: String,
}

impl Default for TemplateTable {
  fn default() -> Self {
    TemplateTable {
      templates: BTreeMap::new(),
      key_paths: BTreeMap::new(),
      indent_unit: "    ".to_string(),
    }
  }
}

impl TemplateTable {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn with_indent_unit(mut self, unit: impl Into<String>) -> Self {
    self.indent_unit = unit.into();
    self
  }

  pub fn indent_unit(&self) -> &str {
    &self.indent_unit
  }

  /// Compiles `format` with `args` and registers it for `kind`.
  pub fn add(
    &mut self,
    kind: impl Into<Name>,
    format: &str,
    args: Vec<TemplateArg>,
  ) -> Result<&mut Self, FormatError> {
    let template = Template::compile(format, args)?;
    Ok(self.insert(kind, template))
  }

  pub fn insert(
    &mut self,
    kind: impl Into<Name>,
    template: Template,
  ) -> &mut Self {
    self.templates.insert(kind.into(), template);
    self
  }

  /// Looks up nodes of `kind` by the kind of the descendant at `path`
  /// instead of their own kind.
  pub fn key_path(
    &mut self,
    kind: impl Into<Name>,
    path: Vec<isize>,
  ) -> &mut Self {
    self.key_paths.insert(kind.into(), path);
    self
  }

  pub fn get(&self, kind: &str) -> Option<&Template> {
    self.templates.get(kind)
  }

  /// Returns the table key for `node`.
  pub fn key_for(&self, node: &Node) -> Result<Name, FormatError> {
    let path = match self.key_paths.get(node.kind()) {
      Some(path) => path,
      None => return Ok(node.kind().clone()),
    };

    let mut current = node;
    let mut key = node.kind();
    for (step, &index) in path.iter().enumerate() {
      let i = resolve_index(index, current.len()).ok_or_else(|| {
        FormatError::ChildOutOfRange {
          kind: current.kind().clone(),
          index,
        }
      })?;
      match &current[i] {
        Child::Node(n) => {
          current = n;
          key = n.kind();
        }
        Child::Token(t) if step + 1 == path.len() => key = t.kind(),
        Child::Token(t) => {
          return Err(FormatError::NotANode {
            kind: t.kind().clone(),
          })
        }
      }
    }
    Ok(key.clone())
  }
}

/// The state a formatting walk carries: output, indentation and the
/// current operator precedence.
#[derive(Debug)]
pub struct FormatState {
  table: Rc<TemplateTable>,
  buffer: OutputBuffer,
  indent: String,
  precedence: i32,
}

impl FormatState {
  pub fn new(table: Rc<TemplateTable>) -> Self {
    FormatState {
      table,
      buffer: OutputBuffer::new(),
      indent: String::new(),
      precedence: 0,
    }
  }

  pub fn table(&self) -> &Rc<TemplateTable> {
    &self.table
  }

  pub fn write(&mut self, text: &str) {
    self.buffer.write(text);
  }

  pub fn println(&mut self, text: &str) {
    self.buffer.println(text);
  }

  pub fn buffer_mut(&mut self) -> &mut OutputBuffer {
    &mut self.buffer
  }

  pub fn indent(&self) -> &str {
    &self.indent
  }

  pub fn indent_more(&mut self) {
    self.indent.push_str(&self.table.indent_unit);
  }

  pub fn indent_less(&mut self) {
    let keep = self.indent.len().saturating_sub(self.table.indent_unit.len());
    self.indent.truncate(keep);
  }

  pub fn precedence(&self) -> i32 {
    self.precedence
  }

  /// Sets the precedence, returning the previous one.
  pub fn replace_precedence(&mut self, precedence: i32) -> i32 {
    std::mem::replace(&mut self.precedence, precedence)
  }

  pub fn into_output(self) -> String {
    self.buffer.finish()
  }
}

pub type FormatWalker = Walker<FormatState, FormatError>;

/// Formats `node` with its table template, if it has one. This is the
/// formatter's default handler; custom handlers can call it to fall back
/// on the table.
pub fn format_node(
  w: &mut FormatWalker,
  node: &mut Node,
) -> Result<Visit, FormatError> {
  let table = Rc::clone(w.state().table());
  let key = table.key_for(node)?;
  match table.get(&key) {
    Some(template) => {
      log::trace!("Formatting {} with `{}'", node.kind(), template.source());
      template.apply(w, Subject::Node(node))?;
      Ok(Visit::Prune)
    }
    None => Ok(Visit::Continue),
  }
}

pub fn format_token(
  w: &mut FormatWalker,
  token: &Token,
) -> Result<(), FormatError> {
  let table = Rc::clone(w.state().table());
  match table.get(token.kind()) {
    Some(template) => template.apply(w, Subject::Token(token)),
    None => Ok(()),
  }
}

/// Regenerates text from trees through a template table, with optional
/// per-kind handlers taking precedence over the table.
#[derive(Clone, Debug)]
pub struct Formatter {
  table: Rc<TemplateTable>,
  dispatch: Dispatch<FormatState, FormatError>,
}

impl Formatter {
  pub fn new(table: TemplateTable) -> Self {
    Formatter {
      table: Rc::new(table),
      dispatch: Dispatch::new()
        .on_default(format_node)
        .on_default_token(format_token),
    }
  }

  pub fn table(&self) -> &TemplateTable {
    &self.table
  }

  pub fn on<F>(mut self, kind: impl Into<Name>, handler: F) -> Self
  where
    F: Fn(&mut FormatWalker, &mut Node) -> Result<Visit, FormatError>
      + 'static,
  {
    self.dispatch = self.dispatch.on(kind, handler);
    self
  }

  pub fn on_exit<F>(mut self, kind: impl Into<Name>, handler: F) -> Self
  where
    F: Fn(&mut FormatWalker, &mut Node) -> Result<(), FormatError> + 'static,
  {
    self.dispatch = self.dispatch.on_exit(kind, handler);
    self
  }

  pub fn on_token<F>(mut self, kind: impl Into<Name>, handler: F) -> Self
  where
    F: Fn(&mut FormatWalker, &Token) -> Result<(), FormatError> + 'static,
  {
    self.dispatch = self.dispatch.on_token(kind, handler);
    self
  }

  /// Formats a tree. Nodes may have their `value` updated by custom
  /// handlers along the way.
  pub fn format(&self, node: &mut Node) -> Result<String, FormatError> {
    let state = FormatState::new(Rc::clone(&self.table));
    let mut walker = Walker::new(self.dispatch.clone(), state);
    walker.preorder(node)?;
    Ok(walker.into_state().into_output())
  }
}

#[cfg(test)]
mod test {
  use super::*;

  fn tok(kind: &str, attr: &str) -> Child {
    Child::Token(Token::new(kind, attr))
  }

  fn node(kind: &str, children: Vec<Child>) -> Child {
    Child::Node(Node::new(kind, children))
  }

  fn assign(name: &str, value: &str) -> Child {
    node(
      "assign",
      vec![tok("NAME", name), tok("EQUAL", "="), tok("NUMBER", value)],
    )
  }

  fn base_table() -> TemplateTable {
    let mut table = TemplateTable::new();
    table
      .add("NAME", "%{attr}", vec![])
      .unwrap()
      .add("NUMBER", "%{attr}", vec![])
      .unwrap()
      .add(
        "assign",
        "%|%c = %c\n",
        vec![TemplateArg::child(0), TemplateArg::checked(2, "NUMBER")],
      )
      .unwrap();
    table
  }

  #[test]
  fn test_statements() {
    let mut tree = Node::new("stmts", vec![assign("x", "1"), assign("y", "2")]);
    let out = Formatter::new(base_table()).format(&mut tree).unwrap();
    assert_eq!(out, "x = 1\ny = 2");
  }

  #[test]
  fn test_indentation() {
    let mut table = base_table();
    table
      .add(
        "while",
        "%|while %c:\n%+%c%-",
        vec![TemplateArg::child(1), TemplateArg::child(2)],
      )
      .unwrap();
    let body = node("body", vec![assign("x", "1"), assign("y", "2")]);
    let mut tree = Node::new(
      "stmts",
      vec![
        node("while", vec![tok("WHILE", "while"), tok("NAME", "x"), body]),
        assign("z", "3"),
      ],
    );
    let out = Formatter::new(table).format(&mut tree).unwrap();
    assert_eq!(out, "while x:\n    x = 1\n    y = 2\nz = 3");
  }

  #[test]
  fn test_ranges() {
    let mut table = base_table();
    table
      .add("call", "%c(%C)", vec![
        TemplateArg::child(0),
        TemplateArg::rest(1, ", "),
      ])
      .unwrap()
      .add("kwargs", "%D", vec![TemplateArg::rest(0, ", ")])
      .unwrap();

    let mut call = Node::new(
      "call",
      vec![tok("NAME", "f"), tok("NAME", "a"), tok("NUMBER", "1")],
    );
    let formatter = Formatter::new(table);
    assert_eq!(formatter.format(&mut call).unwrap(), "f(a, 1)");

    let mut kwargs = Node::new(
      "kwargs",
      vec![node("kwargs", vec![]), tok("NAME", "a"), tok("NAME", "b")],
    );
    assert_eq!(formatter.format(&mut kwargs).unwrap(), "a, b");
  }

  #[test]
  fn test_child_path_and_percent() {
    let mut table = base_table();
    table
      .add("pct", "%[1]{attr}%%", vec![])
      .unwrap()
      .add("last", "%[-1]c", vec![TemplateArg::child(0)])
      .unwrap();
    let formatter = Formatter::new(table);

    let mut pct = Node::new("pct", vec![tok("NAME", "x"), tok("NUMBER", "50")]);
    assert_eq!(formatter.format(&mut pct).unwrap(), "50%");

    let mut last = Node::new(
      "last",
      vec![tok("NAME", "x"), node("inner", vec![tok("NAME", "y")])],
    );
    assert_eq!(formatter.format(&mut last).unwrap(), "y");
  }

  #[test]
  fn test_key_path() {
    let operands = vec![TemplateArg::child(0), TemplateArg::child(2)];
    let mut table = base_table();
    table
      .add("PLUS", "%c + %c", operands.clone())
      .unwrap()
      .add("MINUS", "%c - %c", operands)
      .unwrap()
      .key_path("binop", vec![1]);
    let formatter = Formatter::new(table);

    let mut tree = Node::new(
      "binop",
      vec![tok("NUMBER", "1"), tok("MINUS", "-"), tok("NUMBER", "2")],
    );
    assert_eq!(formatter.format(&mut tree).unwrap(), "1 - 2");
  }

  #[test]
  fn test_precedence_and_custom_handlers() {
    let mut table = base_table();
    table
      .add(
        "wrap",
        "%p|%c",
        vec![TemplateArg::prec(0, 7), TemplateArg::child(0)],
      )
      .unwrap();
    let formatter = Formatter::new(table).on("leaf", |w, _| {
      let prec = w.state().precedence().to_string();
      w.state_mut().write(&prec);
      Ok(Visit::Prune)
    });
    let mut tree = Node::new("wrap", vec![node("leaf", vec![])]);
    assert_eq!(formatter.format(&mut tree).unwrap(), "7|0");
  }

  #[test]
  fn test_runtime_errors() {
    let formatter = Formatter::new(base_table());

    let mut short = Node::new("assign", vec![tok("NAME", "x")]);
    assert!(matches!(
      formatter.format(&mut short),
      Err(FormatError::ChildOutOfRange { index: 2, .. })
    ));

    let mut wrong = Node::new(
      "assign",
      vec![tok("NAME", "x"), tok("EQUAL", "="), tok("NAME", "y")],
    );
    assert!(matches!(
      formatter.format(&mut wrong),
      Err(FormatError::KindMismatch { .. })
    ));
  }
}

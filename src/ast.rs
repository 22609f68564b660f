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

//! Parse trees, and the default tree builder that produces them.

use {
  crate::{
    grammar::{Grammar, Rule},
    parsers::{Arg, ParseError, Parser, TreeBuilder},
    token::{Literal, Token},
    utils::{Name, ToDoc},
  },
  std::{
    collections::BTreeSet,
    hash::{Hash, Hasher},
  },
};

/// A child of a tree node.
#[derive(Clone, Debug, PartialEq)]
pub enum Child {
  Token(Token),
  Node(Node),
}

impl Child {
  /// The token kind, or the node kind.
  pub fn kind(&self) -> &Name {
    match self {
      Child::Token(t) => t.kind(),
      Child::Node(n) => n.kind(),
    }
  }

  pub fn as_node(&self) -> Option<&Node> {
    match self {
      Child::Node(n) => Some(n),
      Child::Token(_) => None,
    }
  }

  pub fn as_node_mut(&mut self) -> Option<&mut Node> {
    match self {
      Child::Node(n) => Some(n),
      Child::Token(_) => None,
    }
  }

  pub fn as_token(&self) -> Option<&Token> {
    match self {
      Child::Token(t) => Some(t),
      Child::Node(_) => None,
    }
  }
}

impl From<Token> for Child {
  fn from(t: Token) -> Self {
    Child::Token(t)
  }
}

impl From<Node> for Child {
  fn from(n: Node) -> Self {
    Child::Node(n)
  }
}

impl From<Arg<Node>> for Child {
  fn from(arg: Arg<Node>) -> Self {
    match arg {
      Arg::Token(t) => Child::Token(t),
      Arg::Value(n) => Child::Node(n),
    }
  }
}

impl PartialEq<str> for Child {
  fn eq(&self, other: &str) -> bool {
    self.kind() == other
  }
}

impl PartialEq<&str> for Child {
  fn eq(&self, other: &&str) -> bool {
    self.kind() == *other
  }
}

impl std::fmt::Display for Child {
  fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
    match self {
      Child::Token(t) => write!(f, "{}", t),
      Child::Node(n) => write!(f, "{}", n),
    }
  }
}

impl ToDoc for Child {
  fn to_doc<'a, DA: pretty::DocAllocator<'a>>(
    &self,
    da: &'a DA,
  ) -> pretty::DocBuilder<'a, DA>
  where
    DA::Doc: Clone,
  {
    match self {
      Child::Token(t) => t.to_doc(da),
      Child::Node(n) => n.to_doc(da),
    }
  }
}

/// A tree node: a kind and an ordered list of children.
///
/// Equality compares the kind and the children; the `value` slot, which
/// traversals use to store computed results, is ignored. Hashing uses the
/// kind only. A node also compares equal to its kind as a string.
#[derive(Clone, Debug)]
pub struct Node {
  kind: Name,
  children: Vec<Child>,
  value: Literal,
}

impl Node {
  pub fn new(kind: impl Into<Name>, children: Vec<Child>) -> Self {
    Node {
      kind: kind.into(),
      children,
      value: Literal::None,
    }
  }

  /// Creates a node without children.
  pub fn leaf(kind: impl Into<Name>) -> Self {
    Node::new(kind, Vec::new())
  }

  pub fn kind(&self) -> &Name {
    &self.kind
  }

  pub fn children(&self) -> &[Child] {
    &self.children
  }

  pub fn children_mut(&mut self) -> &mut Vec<Child> {
    &mut self.children
  }

  pub fn into_children(self) -> Vec<Child> {
    self.children
  }

  pub fn child(&self, index: usize) -> Option<&Child> {
    self.children.get(index)
  }

  pub fn len(&self) -> usize {
    self.children.len()
  }

  pub fn is_empty(&self) -> bool {
    self.children.is_empty()
  }

  pub fn push(&mut self, child: impl Into<Child>) {
    self.children.push(child.into());
  }

  pub fn value(&self) -> &Literal {
    &self.value
  }

  pub fn set_value(&mut self, value: impl Into<Literal>) {
    self.value = value.into();
  }

  pub fn with_value(mut self, value: impl Into<Literal>) -> Self {
    self.set_value(value);
    self
  }

  pub fn to_pretty(&self) -> String {
    crate::utils::render_doc(self, 80)
  }
}

impl std::ops::Index<usize> for Node {
  type Output = Child;

  fn index(&self, index: usize) -> &Child {
    &self.children[index]
  }
}

impl PartialEq for Node {
  fn eq(&self, other: &Self) -> bool {
    self.kind == other.kind && self.children == other.children
  }
}

impl PartialEq<str> for Node {
  fn eq(&self, other: &str) -> bool {
    self.kind == *other
  }
}

impl PartialEq<&str> for Node {
  fn eq(&self, other: &&str) -> bool {
    self.kind == **other
  }
}

impl Hash for Node {
  fn hash<H: Hasher>(&self, state: &mut H) {
    self.kind.hash(state);
  }
}

impl std::fmt::Display for Node {
  fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
    write!(f, "{}", self.kind)?;
    for child in &self.children {
      let text = child.to_string();
      for line in text.lines() {
        write!(f, "\n   {}", line)?;
      }
    }
    Ok(())
  }
}

impl ToDoc for Node {
  fn to_doc<'a, DA: pretty::DocAllocator<'a>>(
    &self,
    da: &'a DA,
  ) -> pretty::DocBuilder<'a, DA>
  where
    DA::Doc: Clone,
  {
    if self.children.is_empty() {
      return self.kind.to_doc(da).append(da.text("()"));
    }
    self
      .kind
      .to_doc(da)
      .append(da.text("("))
      .append(
        da.line_()
          .append(da.intersperse(
            self.children.iter().map(|c| c.to_doc(da)),
            da.text(",").append(da.line()),
          ))
          .nest(2),
      )
      .append(da.line_())
      .append(da.text(")"))
      .group()
  }
}

/// The default tree builder: every rule without its own action becomes a
/// [`Node`] named after the rule's left-hand side, with these reductions:
///
/// - List-like nonterminals (`X+`, `X*` expansions, and any listed with
///   [`AstBuilder::collect`]) are flattened: `L ::= L X` appends to the
///   existing `L` node instead of nesting.
/// - An optional nonterminal (`X?`) that matched a single node is replaced
///   by that node.
/// - A rule with exactly one child that is itself a node with exactly one
///   child is collapsed to `lhs` over that grandchild, unless the child's
///   kind was listed with [`AstBuilder::no_collapse`].
#[derive(Clone, Debug)]
pub struct AstBuilder {
  collapse_singletons: bool,
  no_collapse: BTreeSet<Name>,
  collect: BTreeSet<Name>,
}

impl Default for AstBuilder {
  fn default() -> Self {
    AstBuilder {
      collapse_singletons: true,
      no_collapse: BTreeSet::new(),
      collect: BTreeSet::new(),
    }
  }
}

impl AstBuilder {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn collapse_singletons(mut self, enabled: bool) -> Self {
    self.collapse_singletons = enabled;
    self
  }

  /// Kinds that are never elided by singleton collapse, such as a
  /// `pass_stmt` that only wraps a keyword.
  pub fn no_collapse<I>(mut self, nts: I) -> Self
  where
    I: IntoIterator,
    I::Item: Into<Name>,
  {
    self.no_collapse.extend(nts.into_iter().map(Into::into));
    self
  }

  pub fn collect<I>(mut self, nts: I) -> Self
  where
    I: IntoIterator,
    I::Item: Into<Name>,
  {
    self.collect.extend(nts.into_iter().map(Into::into));
    self
  }

  fn is_list(&self, grammar: &Grammar<Node>, nt: &Name) -> bool {
    grammar.is_list_like(nt) || self.collect.contains(nt)
  }
}

impl TreeBuilder<Node> for AstBuilder {
  fn nonterminal(
    &self,
    grammar: &Grammar<Node>,
    rule: &Rule,
    args: Vec<Arg<Node>>,
  ) -> Node {
    let nt = rule.lhs();
    let mut children = args.into_iter().map(Child::from);

    if self.is_list(grammar, nt) {
      return match children.next() {
        Some(Child::Node(mut head)) if head.kind() == nt => {
          head.children.extend(children);
          head
        }
        first => {
          Node::new(nt.clone(), first.into_iter().chain(children).collect())
        }
      };
    }

    let mut children = children.collect::<Vec<_>>();
    if children.len() != 1 {
      return Node::new(nt.clone(), children);
    }
    match children.pop() {
      Some(Child::Node(only)) if grammar.is_optional(nt) => only,
      Some(Child::Node(only))
        if self.collapse_singletons
          && !self.no_collapse.contains(only.kind())
          && only.len() == 1 =>
      {
        log::trace!("Collapsing singleton {} under {}", only.kind(), nt);
        Node::new(nt.clone(), only.children)
      }
      only => Node::new(nt.clone(), only.into_iter().collect()),
    }
  }
}

/// Parses `tokens` into a tree with the default [`AstBuilder`].
pub fn parse_ast(
  grammar: &Grammar<Node>,
  tokens: &[Token],
) -> Result<Node, ParseError> {
  Parser::new(grammar, AstBuilder::default()).parse(tokens)
}

#[cfg(test)]
mod test {
  use {super::*, crate::grammar::examples};

  fn int(i: i64) -> Child {
    Child::Token(Token::new("INTEGER", i))
  }

  #[test]
  fn test_equality_ignores_value() {
    let a = Node::new("expr", vec![int(1)]).with_value(1);
    let b = Node::new("expr", vec![int(1)]);
    assert_eq!(a, b);
    assert_ne!(a, Node::new("term", vec![int(1)]));
    assert!(a == "expr");
  }

  #[test]
  fn test_display() {
    let tree = Node::new(
      "add",
      vec![
        Child::Node(Node::new("single", vec![int(1)])),
        int(2),
      ],
    );
    assert_eq!(
      tree.to_string(),
      "add\n   single\n      INTEGER: 1\n   INTEGER: 2"
    );
  }

  #[test]
  fn test_singleton_collapse() {
    let g = examples::make_expr::<Node>();
    let tokens = vec![Token::new("INTEGER", 1)];
    let tree = parse_ast(&g, &tokens).unwrap();
    assert_eq!(tree, Node::new("expr", vec![int(1)]));
  }

  #[test]
  fn test_no_collapse() {
    let g = examples::make_expr::<Node>();
    let tokens = vec![Token::new("INTEGER", 1)];
    let builder = AstBuilder::new().no_collapse(vec!["term"]);
    let tree = Parser::new(&g, builder).parse(&tokens).unwrap();
    // `factor` still collapses into `term`, but `term` survives under `expr`.
    let term = Node::new("term", vec![int(1)]);
    assert_eq!(tree, Node::new("expr", vec![Child::Node(term)]));
  }

  #[test]
  fn test_no_collapse_keeps_keyword_statement() {
    let g = crate::grammar::build::<Node, _>("stmt", |gb| {
      gb.add_rules("rules", "stmt ::= pass_stmt\npass_stmt ::= PASS", None);
    })
    .unwrap();
    let tokens = vec![Token::bare("PASS")];

    let collapsed = parse_ast(&g, &tokens).unwrap();
    let pass = Child::Token(tokens[0].clone());
    assert_eq!(collapsed, Node::new("stmt", vec![pass]));

    let builder = AstBuilder::new().no_collapse(vec!["pass_stmt"]);
    let tree = Parser::new(&g, builder).parse(&tokens).unwrap();
    let pass = Node::new("pass_stmt", vec![Child::Token(tokens[0].clone())]);
    assert_eq!(tree, Node::new("stmt", vec![Child::Node(pass)]));
  }

  #[test]
  fn test_plus_list_is_flat() {
    let g = examples::make_plus_list::<Node>();
    let tokens = (0..4).map(|_| Token::bare("ITEM")).collect::<Vec<_>>();
    let tree = parse_ast(&g, &tokens).unwrap();
    assert_eq!(tree.kind(), "items");
    assert_eq!(tree.len(), 4);
    assert!(tree.children().iter().all(|c| *c == "item"));
  }

  #[test]
  fn test_empty_star_list() {
    let g = examples::make_star_list::<Node>();
    let tree = parse_ast(&g, &[]).unwrap();
    assert_eq!(tree, Node::leaf("items"));
  }

  #[test]
  fn test_optional() {
    let g = examples::make_optional::<Node>();
    let one = parse_ast(&g, &[Token::bare("NAME"), Token::bare("DOT")])
      .unwrap();
    assert_eq!(one.len(), 2);
    let none = parse_ast(&g, &[Token::bare("DOT")]).unwrap();
    assert_eq!(none[0], Child::Node(Node::leaf("NAME_opt")));
    assert!(parse_ast(
      &g,
      &[Token::bare("NAME"), Token::bare("NAME"), Token::bare("DOT")]
    )
    .is_err());
  }

  #[test]
  fn test_pretty() {
    let tree = Node::new("single", vec![int(1)]);
    assert_eq!(tree.to_pretty(), "single(INTEGER: 1)");
  }
}

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

//! Small grammars used throughout the tests, and a few complete front ends
//! built from them.

use {
  crate::{
    ast::{AstBuilder, Child, Node},
    grammar::{build, Grammar},
    parsers::{Arg, Parser},
    scanner::Scanner,
    token::{Literal, Token},
    traversal::{Dispatch, Visit, Walker},
  },
  anyhow::{anyhow, bail, Context},
};

fn from_text<V>(start: &str, text: &str) -> Grammar<V> {
  build(start, |gb| {
    gb.add_rules("rules", text, None);
  })
  .expect("example grammar is well formed")
}

/// The classic expression grammar, with no semantic actions.
pub fn make_expr<V>() -> Grammar<V> {
  from_text(
    "expr",
    "
    expr ::= expr ADD_OP term
    expr ::= term
    term ::= term MULT_OP factor
    term ::= factor
    factor ::= INTEGER
    ",
  )
}

pub fn make_right_recursive() -> Grammar<()> {
  from_text(
    "expr",
    "
    expr ::= term ADD expr
    expr ::= term
    term ::= NUMBER
    ",
  )
}

/// `term2` is used but never defined.
pub fn make_unexpanded() -> Grammar<()> {
  from_text(
    "expr",
    "
    expr ::= expr ADD term
    expr ::= term2
    term ::= NUMBER
    ",
  )
}

/// `factor` is defined but never used.
pub fn make_unused_lhs() -> Grammar<()> {
  from_text(
    "expr",
    "
    expr ::= expr ADD term
    expr ::= term
    factor ::= term
    term ::= NUMBER
    ",
  )
}

/// A grammar with one of each problem `check_grammar` reports, except for
/// undefined symbols.
pub fn make_bad_expr() -> Grammar<()> {
  from_text(
    "expr",
    "
    expr  ::= expr ADD_OP term
    expr  ::= term

    term ::= factor
    factor ::= INTEGER

    # right recursive
    factor ::= FLOAT factor

    # shares its right-hand side with an expr rule
    factor ::= expr ADD_OP term

    # foo is not used anywhere
    foo   ::= BAR
    ",
  )
}

pub fn make_star_list<V>() -> Grammar<V> {
  from_text("items", "items ::= item*\nitem ::= ITEM")
}

pub fn make_plus_list<V>() -> Grammar<V> {
  from_text("items", "items ::= item+\nitem ::= ITEM")
}

/// A sentence with an optional leading `NAME`, expanded through a helper.
pub fn make_optional<V>() -> Grammar<V> {
  from_text("sentence", "sentence ::= NAME? DOT")
}

fn keep(
  kind: &'static str,
  positions: &'static [usize],
) -> impl Fn(Vec<Arg<Node>>) -> Node + Send + Sync + 'static {
  move |args| {
    let mut args = args.into_iter().map(Some).collect::<Vec<_>>();
    let children = positions
      .iter()
      .filter_map(|&i| args.get_mut(i).and_then(Option::take))
      .map(Child::from)
      .collect();
    Node::new(kind, children)
  }
}

/// The expression grammar with an action per rule, building `single`, `add`
/// and `multiply` nodes.
pub fn make_arith() -> Grammar<Node> {
  build("expr", |gb| {
    gb.add_rules_with(
      "expr_add_term",
      "expr ::= expr ADD_OP term",
      keep("add", &[0, 2]),
    )
    .add_rules_with("expr_term", "expr ::= term", keep("single", &[0]))
    .add_rules_with(
      "term_mult_factor",
      "term ::= term MULT_OP factor",
      keep("multiply", &[0, 2]),
    )
    .add_rules_with("term_factor", "term ::= factor", keep("single", &[0]))
    .add_rules_with(
      "factor_integer",
      "factor ::= INTEGER",
      keep("single", &[0]),
    );
  })
  .expect("arithmetic grammar is well formed")
}

pub fn arith_scanner() -> Scanner {
  Scanner::builder()
    .skip("whitespace", r"\s+")
    .token("ADD_OP", r"\+")
    .token("MULT_OP", r"\*")
    .token("INTEGER", r"\d+")
    .build()
    .expect("arithmetic scanner patterns are valid")
}

/// Parses `text` with the action-driven arithmetic grammar.
pub fn parse_arith(text: &str) -> anyhow::Result<Node> {
  let tokens = arith_scanner().tokenize(text)?;
  let grammar = make_arith();
  Ok(Parser::new(&grammar, AstBuilder::default()).parse(&tokens)?)
}

/// An expression grammar with parentheses and no actions; trees come from
/// the default builder, with singleton derivations collapsed.
pub fn make_expr_ast() -> Grammar<Node> {
  from_text(
    "expr",
    "
    expr ::= expr ADD_OP term
    expr ::= term
    term ::= term MULT_OP atom
    term ::= atom
    atom ::= NUMBER
    atom ::= LPAREN expr RPAREN
    ",
  )
}

pub fn expr_scanner() -> Scanner {
  Scanner::builder()
    .skip("whitespace", r"\s+")
    .token("LPAREN", r"\(")
    .token("RPAREN", r"\)")
    .token("ADD_OP", r"[+-]")
    .token("MULT_OP", r"[*/]")
    .token("NUMBER", r"\d+(\.\d*)?")
    .build()
    .expect("expression scanner patterns are valid")
}

pub fn parse_expr(text: &str) -> anyhow::Result<Node> {
  let tokens = expr_scanner().tokenize(text)?;
  let grammar = make_expr_ast();
  let parser = Parser::new(&grammar, AstBuilder::default());
  parser
    .parse(&tokens)
    .map_err(|e| anyhow!(parser.describe_error(&e, &tokens)))
}

type Eval = Walker<(), anyhow::Error>;

fn number(token: &Token) -> anyhow::Result<f64> {
  match token.attr() {
    Literal::Int(i) => Ok(*i as f64),
    Literal::Float(f) => Ok(*f),
    Literal::Str(s) => s
      .parse()
      .with_context(|| format!("{} is not a number", s)),
    other => bail!("{} token has no numeric value: {:?}", token.kind(), other),
  }
}

fn child_value(w: &mut Eval, child: &mut Child) -> anyhow::Result<f64> {
  match child {
    Child::Token(t) => number(t),
    Child::Node(n) => {
      w.preorder(n)?;
      n.value()
        .as_float()
        .ok_or_else(|| anyhow!("{} has no value", n.kind()))
    }
  }
}

fn eval_binary(w: &mut Eval, node: &mut Node) -> anyhow::Result<Visit> {
  let value = match node.len() {
    1 => child_value(w, &mut node.children_mut()[0])?,
    3 => {
      let op = node[1]
        .as_token()
        .map(|t| t.attr().to_string())
        .ok_or_else(|| anyhow!("{} is missing its operator", node.kind()))?;
      let lhs = child_value(w, &mut node.children_mut()[0])?;
      let rhs = child_value(w, &mut node.children_mut()[2])?;
      match op.as_str() {
        "+" => lhs + rhs,
        "-" => lhs - rhs,
        "*" => lhs * rhs,
        "/" => lhs / rhs,
        _ => bail!("unknown operator {}", op),
      }
    }
    n => bail!("{} with {} children", node.kind(), n),
  };
  node.set_value(value);
  Ok(Visit::Prune)
}

fn eval_atom(w: &mut Eval, node: &mut Node) -> anyhow::Result<Visit> {
  let value = match node.len() {
    1 => child_value(w, &mut node.children_mut()[0])?,
    3 => child_value(w, &mut node.children_mut()[1])?,
    n => bail!("atom with {} children", n),
  };
  node.set_value(value);
  Ok(Visit::Prune)
}

/// Evaluates an expression tree, storing every subexpression's value on
/// its node.
pub fn evaluate(tree: &mut Node) -> anyhow::Result<f64> {
  let dispatch = Dispatch::new()
    .on("expr", eval_binary)
    .on("term", eval_binary)
    .on("atom", eval_atom)
    .on_default(|_: &mut Eval, n: &mut Node| -> anyhow::Result<Visit> {
      bail!("no evaluation rule for {}", n.kind())
    });
  let mut walker = Walker::new(dispatch, ());
  walker.preorder(tree)?;
  tree
    .value()
    .as_float()
    .ok_or_else(|| anyhow!("{} produced no value", tree.kind()))
}

/// Scans, parses and evaluates an arithmetic expression.
pub fn eval_arith(text: &str) -> anyhow::Result<f64> {
  let mut tree = parse_expr(text)?;
  evaluate(&mut tree)
}

/// A debugger-style location grammar: `file:line`, `file line N`, a bare
/// line number or a function, optionally followed by `if` and a condition.
///
/// The second word of `FILENAME SPACE FILENAME SPACE NUMBER` must be
/// `line`; a reduce check rejects the rule otherwise.
pub fn make_location() -> Grammar<Node> {
  build("start", |gb| {
    gb.add_rules(
      "location",
      "
      start       ::= opt_space location_if opt_space
      opt_space   ::= SPACE?

      location_if ::= location
      location_if ::= location SPACE IF tokens

      # no space is allowed between FILENAME and NUMBER
      location    ::= FILENAME COLON NUMBER
      location    ::= FUNCNAME
      location    ::= FILENAME SPACE FILENAME SPACE NUMBER
      location    ::= NUMBER
      location    ::= METHOD

      tokens      ::= token+
      token       ::= FILENAME | FUNCNAME | COLON | NUMBER | SPACE
      ",
      None,
    )
    .add_reduce_check("location", |rule, tokens, first, _last| {
      rule.rhs().len() == 5 && tokens[first + 2].attr().as_str() != Some("line")
    });
  })
  .expect("location grammar is well formed")
}

pub fn location_scanner() -> Scanner {
  Scanner::builder()
    .token("SPACE", r"\s+")
    .rule("number", r"\d+", |s| {
      s.parse::<i64>().ok().map(|n| Token::new("NUMBER", n))
    })
    .token("FUNCNAME", r"[a-zA-Z_]\w+\(\)")
    .token("COLON", ":")
    .rule("filename", r#"[^\t \n:]+|".+"|'.+'"#, |s| {
      if s == "if" {
        return Some(Token::new("IF", s));
      }
      let quoted = s.len() >= 2 && (s.starts_with('"') || s.starts_with('\''));
      let base = if quoted { &s[1..s.len() - 1] } else { s };
      Some(Token::new("FILENAME", base))
    })
    .build()
    .expect("location scanner patterns are valid")
}

pub fn parse_location(text: &str) -> anyhow::Result<Node> {
  let tokens = location_scanner().tokenize(text)?;
  let grammar = make_location();
  let builder = AstBuilder::default().collect(vec!["tokens"]);
  Ok(Parser::new(&grammar, builder).parse(&tokens)?)
}

#[cfg(test)]
mod test {
  use super::*;

  #[test]
  fn test_eval_arith() {
    assert_eq!(eval_arith("1").unwrap(), 1.0);
    assert_eq!(eval_arith("1 + 2 * 3").unwrap(), 7.0);
    assert_eq!(eval_arith("1 * 2 + 3").unwrap(), 5.0);
    assert_eq!(eval_arith("(1 + 2) * 3").unwrap(), 9.0);
    assert_eq!(eval_arith("8 - 2 - 1").unwrap(), 5.0);
  }

  #[test]
  fn test_eval_reports_syntax_errors() {
    let err = eval_arith("1 2").unwrap_err().to_string();
    assert!(err.starts_with("Syntax error at or near `NUMBER: 2' (token 1)"));
  }

  #[test]
  fn test_location_forms() {
    for text in &["/tmp/foo.py:12", "/tmp/foo.py line 12", "12", "gcd()"] {
      let tree = parse_location(text).unwrap();
      assert_eq!(tree.kind(), "start", "{}", text);
    }
  }

  #[test]
  fn test_location_line_word_is_checked() {
    let tree = parse_location("foo.py line 5").unwrap();
    let location_if = tree[1].as_node().unwrap();
    let location = location_if[0].as_node().unwrap();
    assert_eq!(location.len(), 5);
    assert!(parse_location("foo.py col 5").is_err());
  }

  #[test]
  fn test_location_condition() {
    let tree = parse_location("foo.py:5 if x > 1").unwrap();
    let location_if = tree[1].as_node().unwrap();
    assert_eq!(location_if.len(), 4);
    let tokens = location_if[3].as_node().unwrap();
    assert_eq!(tokens.kind(), "tokens");
    assert!(tokens.len() >= 5);
  }
}

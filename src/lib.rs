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

//! An Earley parsing toolkit.
//!
//! Grammars are written as `lhs ::= sym ...` rule text, with `+`, `*` and
//! `?` suffixes for repetition, and compiled by a [`GrammarBuilder`]. The
//! Earley [`Parser`] accepts any context-free grammar, including ambiguous
//! and left-recursive ones, and builds values through per-rule actions or
//! a [`TreeBuilder`] such as [`AstBuilder`]. Trees are walked with a
//! [`Dispatch`] table of per-kind handlers and turned back into text by a
//! template-driven [`Formatter`].
//!
//! ```rust
//! # use spark_earley::{
//! #   ast::AstBuilder, grammar, parsers::Parser, token::Token,
//! # };
//! let g = grammar::build("sum", |gb| {
//!   gb.add_rules("rules", "sum ::= sum PLUS NUMBER\nsum ::= NUMBER", None);
//! })
//! .unwrap();
//! let tokens = vec![
//!   Token::new("NUMBER", 1),
//!   Token::new("PLUS", "+"),
//!   Token::new("NUMBER", 2),
//! ];
//! let tree = Parser::new(&g, AstBuilder::default()).parse(&tokens).unwrap();
//! assert_eq!(tree.kind(), "sum");
//! assert_eq!(tree.len(), 3);
//! ```

#[macro_use]
extern crate derivative;

pub mod ast;
pub mod format;
pub mod grammar;
pub mod parsers;
pub mod scanner;
pub mod token;
pub mod traversal;
pub mod utils;

pub use crate::{
  ast::{AstBuilder, Child, Node},
  format::{Formatter, TemplateArg, TemplateTable},
  grammar::{Grammar, GrammarBuilder, GrammarError},
  parsers::{ParseError, ParseOptions, Parser, TreeBuilder},
  scanner::{LexicalError, Scanner},
  token::{Literal, TextPos, Token},
  traversal::{Dispatch, Visit, Walker},
};

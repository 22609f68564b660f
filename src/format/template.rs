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

//! Compilation and interpretation of format templates.
//!
//! A template is a string with printf-like escapes:
//!
//! | escape | argument | effect |
//! |---|---|---|
//! | `%c` | [`TemplateArg::Child`] or [`TemplateArg::Checked`] | format one child |
//! | `%p` | [`TemplateArg::Prec`] | format one child under a precedence |
//! | `%C` | [`TemplateArg::Range`] | format a range of children, separated |
//! | `%D` | [`TemplateArg::Range`] | like `%C`, skipping empty child nodes |
//! | `%P` | [`TemplateArg::PrecRange`] | like `%C`, under a precedence |
//! | `%|` | | write the current indentation |
//! | `%+`, `%-` | | indent one level more or less |
//! | `%{attr}`, `%{kind}`, `%{value}` | | write a field of the subject |
//! | `%%` | | a literal `%` |
//!
//! Any escape may be prefixed with `[n]` (e.g. `%[1]c`) to move to child
//! `n` of the subject first. Negative indexes count from the end.

use {
  super::{FormatError, FormatState},
  crate::{
    ast::{Child, Node},
    token::Token,
    traversal::Walker,
    utils::Name,
  },
  std::{iter::Peekable, str::Chars},
};

/// The argument consumed by an escape that needs one.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TemplateArg {
  Child(isize),
  /// A child that must have the given kind.
  Checked(isize, Name),
  Prec(isize, i32),
  /// Children `low..high`; `high: None` runs to the last child.
  Range {
    low: usize,
    high: Option<usize>,
    sep: String,
  },
  PrecRange {
    low: usize,
    high: Option<usize>,
    sep: String,
    prec: i32,
  },
}

impl TemplateArg {
  pub fn child(index: isize) -> Self {
    TemplateArg::Child(index)
  }

  pub fn checked(index: isize, kind: impl Into<Name>) -> Self {
    TemplateArg::Checked(index, kind.into())
  }

  pub fn prec(index: isize, prec: i32) -> Self {
    TemplateArg::Prec(index, prec)
  }

  pub fn range(
    low: usize,
    high: Option<usize>,
    sep: impl Into<String>,
  ) -> Self {
    TemplateArg::Range {
      low,
      high,
      sep: sep.into(),
    }
  }

  /// Every child from `low` on.
  pub fn rest(low: usize, sep: impl Into<String>) -> Self {
    Self::range(low, None, sep)
  }

  pub fn prec_range(
    low: usize,
    high: Option<usize>,
    sep: impl Into<String>,
    prec: i32,
  ) -> Self {
    TemplateArg::PrecRange {
      low,
      high,
      sep: sep.into(),
      prec,
    }
  }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Field {
  /// A token's attribute.
  Attr,
  Kind,
  /// A node's computed value, or a token's attribute.
  Value,
}

#[derive(Clone, Debug, PartialEq, Eq)]
enum Instr {
  Text(String),
  Indent,
  IndentMore,
  IndentLess,
  Child {
    at: Option<isize>,
    index: isize,
    expect: Option<Name>,
  },
  PrecChild {
    at: Option<isize>,
    index: isize,
    prec: i32,
  },
  Range {
    at: Option<isize>,
    low: usize,
    high: Option<usize>,
    sep: String,
    skip_empty: bool,
    prec: Option<i32>,
  },
  Field {
    at: Option<isize>,
    field: Field,
  },
}

/// A compiled format template.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Template {
  source: String,
  instrs: Vec<Instr>,
}

struct Compiler<'a> {
  source: &'a str,
  chars: Peekable<Chars<'a>>,
  args: std::vec::IntoIter<TemplateArg>,
  instrs: Vec<Instr>,
  text: String,
}

impl<'a> Compiler<'a> {
  fn unterminated(&self) -> FormatError {
    FormatError::Unterminated {
      template: self.source.to_string(),
    }
  }

  fn flush_text(&mut self) {
    if !self.text.is_empty() {
      let text = std::mem::take(&mut self.text);
      self.instrs.push(Instr::Text(text));
    }
  }

  fn next_arg(&mut self, escape: char) -> Result<TemplateArg, FormatError> {
    self.args.next().ok_or_else(|| FormatError::MissingArgument {
      escape,
      template: self.source.to_string(),
    })
  }

  fn mismatch(&self, escape: char, arg: TemplateArg) -> FormatError {
    FormatError::ArgumentMismatch {
      escape,
      arg: format!("{:?}", arg),
      template: self.source.to_string(),
    }
  }

  fn read_until(&mut self, end: char) -> Result<String, FormatError> {
    let mut out = String::new();
    loop {
      match self.chars.next() {
        Some(ch) if ch == end => return Ok(out),
        Some(ch) => out.push(ch),
        None => return Err(self.unterminated()),
      }
    }
  }

  fn read_path(&mut self) -> Result<Option<isize>, FormatError> {
    if self.chars.peek() != Some(&'[') {
      return Ok(None);
    }
    self.chars.next();
    let digits = self.read_until(']')?;
    digits
      .trim()
      .parse::<isize>()
      .map(Some)
      .map_err(|_| FormatError::BadIndex {
        index: digits.clone(),
        template: self.source.to_string(),
      })
  }

  fn escape(&mut self) -> Result<(), FormatError> {
    let at = self.read_path()?;
    let escape = self.chars.next().ok_or_else(|| self.unterminated())?;
    let instr = match escape {
      '%' => {
        self.text.push('%');
        return Ok(());
      }
      '|' => Instr::Indent,
      '+' => Instr::IndentMore,
      '-' => Instr::IndentLess,
      'c' => match self.next_arg(escape)? {
        TemplateArg::Child(index) => Instr::Child {
          at,
          index,
          expect: None,
        },
        TemplateArg::Checked(index, kind) => Instr::Child {
          at,
          index,
          expect: Some(kind),
        },
        other => return Err(self.mismatch(escape, other)),
      },
      'p' => match self.next_arg(escape)? {
        TemplateArg::Prec(index, prec) => Instr::PrecChild { at, index, prec },
        other => return Err(self.mismatch(escape, other)),
      },
      'C' | 'D' => match self.next_arg(escape)? {
        TemplateArg::Range { low, high, sep } => Instr::Range {
          at,
          low,
          high,
          sep,
          skip_empty: escape == 'D',
          prec: None,
        },
        other => return Err(self.mismatch(escape, other)),
      },
      'P' => match self.next_arg(escape)? {
        TemplateArg::PrecRange {
          low,
          high,
          sep,
          prec,
        } => Instr::Range {
          at,
          low,
          high,
          sep,
          skip_empty: false,
          prec: Some(prec),
        },
        other => return Err(self.mismatch(escape, other)),
      },
      '{' => {
        let name = self.read_until('}')?;
        let field = match name.trim() {
          "attr" => Some(Field::Attr),
          "kind" => Some(Field::Kind),
          "value" => Some(Field::Value),
          _ => None,
        };
        match field {
          Some(field) => Instr::Field { at, field },
          None => {
            return Err(FormatError::UnknownField {
              field: name,
              template: self.source.to_string(),
            })
          }
        }
      }
      _ => {
        return Err(FormatError::UnknownEscape {
          escape,
          template: self.source.to_string(),
        })
      }
    };
    self.flush_text();
    self.instrs.push(instr);
    Ok(())
  }

  fn run(mut self) -> Result<Template, FormatError> {
    while let Some(ch) = self.chars.next() {
      if ch == '%' {
        self.escape()?;
      } else {
        self.text.push(ch);
      }
    }
    self.flush_text();

    let count = self.args.len();
    if count > 0 {
      return Err(FormatError::ExtraArguments {
        template: self.source.to_string(),
        count,
      });
    }
    Ok(Template {
      source: self.source.to_string(),
      instrs: self.instrs,
    })
  }
}

/// The node or token a template is applied to.
pub enum Subject<'n> {
  Node(&'n mut Node),
  Token(&'n Token),
}

impl<'n> Subject<'n> {
  pub fn kind(&self) -> &Name {
    match self {
      Subject::Node(n) => n.kind(),
      Subject::Token(t) => t.kind(),
    }
  }

  fn reborrow(&mut self) -> Subject<'_> {
    match self {
      Subject::Node(n) => Subject::Node(&mut **n),
      Subject::Token(t) => Subject::Token(*t),
    }
  }

  fn into_node(self) -> Result<&'n mut Node, FormatError> {
    match self {
      Subject::Node(n) => Ok(n),
      Subject::Token(t) => Err(FormatError::NotANode {
        kind: t.kind().clone(),
      }),
    }
  }

  fn child(self, index: isize) -> Result<&'n mut Child, FormatError> {
    let node = self.into_node()?;
    let i = resolve_index(index, node.len()).ok_or_else(|| {
      FormatError::ChildOutOfRange {
        kind: node.kind().clone(),
        index,
      }
    })?;
    Ok(&mut node.children_mut()[i])
  }

  fn at(self, at: Option<isize>) -> Result<Subject<'n>, FormatError> {
    match at {
      None => Ok(self),
      Some(index) => Ok(match self.child(index)? {
        Child::Node(n) => Subject::Node(n),
        Child::Token(t) => Subject::Token(t),
      }),
    }
  }

  fn field(&self, field: Field) -> Result<String, FormatError> {
    match (self, field) {
      (_, Field::Kind) => Ok(self.kind().to_string()),
      (Subject::Token(t), _) => Ok(t.attr().to_string()),
      (Subject::Node(n), Field::Value) => Ok(n.value().to_string()),
      (Subject::Node(n), Field::Attr) => Err(FormatError::MissingField {
        kind: n.kind().clone(),
        field: "attr",
      }),
    }
  }
}

/// Resolves a possibly negative child index against `len` children.
pub(crate) fn resolve_index(index: isize, len: usize) -> Option<usize> {
  if index < 0 {
    len.checked_sub(index.unsigned_abs())
  } else if (index as usize) < len {
    Some(index as usize)
  } else {
    None
  }
}

impl Template {
  pub fn compile(
    source: &str,
    args: Vec<TemplateArg>,
  ) -> Result<Template, FormatError> {
    Compiler {
      source,
      chars: source.chars().peekable(),
      args: args.into_iter(),
      instrs: Vec::new(),
      text: String::new(),
    }
    .run()
  }

  pub fn source(&self) -> &str {
    &self.source
  }

  /// Interprets the template against `subject`, writing to the walker's
  /// output and recursing into children through the walker.
  pub fn apply(
    &self,
    w: &mut Walker<FormatState, FormatError>,
    mut subject: Subject<'_>,
  ) -> Result<(), FormatError> {
    for instr in &self.instrs {
      match instr {
        Instr::Text(text) => w.state_mut().write(text),
        Instr::Indent => {
          let indent = w.state().indent().to_string();
          w.state_mut().write(&indent);
        }
        Instr::IndentMore => w.state_mut().indent_more(),
        Instr::IndentLess => w.state_mut().indent_less(),
        Instr::Child { at, index, expect } => {
          let child = subject.reborrow().at(*at)?.child(*index)?;
          if let Some(expected) = expect {
            if child.kind() != expected {
              return Err(FormatError::KindMismatch {
                expected: expected.clone(),
                found: child.kind().clone(),
              });
            }
          }
          w.visit_child(child)?;
        }
        Instr::PrecChild { at, index, prec } => {
          let child = subject.reborrow().at(*at)?.child(*index)?;
          let saved = w.state_mut().replace_precedence(*prec);
          let result = w.visit_child(child);
          w.state_mut().replace_precedence(saved);
          result?;
        }
        Instr::Range {
          at,
          low,
          high,
          sep,
          skip_empty,
          prec,
        } => {
          let node = subject.reborrow().at(*at)?.into_node()?;
          let saved = prec.map(|p| w.state_mut().replace_precedence(p));
          let result = format_range(w, node, *low, *high, sep, *skip_empty);
          if let Some(saved) = saved {
            w.state_mut().replace_precedence(saved);
          }
          result?;
        }
        Instr::Field { at, field } => {
          let text = subject.reborrow().at(*at)?.field(*field)?;
          w.state_mut().write(&text);
        }
      }
    }
    Ok(())
  }
}

fn format_range(
  w: &mut Walker<FormatState, FormatError>,
  node: &mut Node,
  low: usize,
  high: Option<usize>,
  sep: &str,
  skip_empty: bool,
) -> Result<(), FormatError> {
  let len = node.len();
  let high = high.map_or(len, |h| h.min(len));
  let low = low.min(high);
  let mut remaining = high - low;
  for child in &mut node.children_mut()[low..high] {
    remaining -= 1;
    if skip_empty && child.as_node().map_or(false, Node::is_empty) {
      continue;
    }
    w.visit_child(child)?;
    if remaining > 0 {
      w.state_mut().write(sep);
    }
  }
  Ok(())
}

#[cfg(test)]
mod test {
  use super::*;

  #[test]
  fn test_compile_text_and_escapes() {
    let t = Template::compile(
      "%|del %c\n",
      vec![TemplateArg::child(1)],
    )
    .unwrap();
    assert_eq!(
      t.instrs,
      vec![
        Instr::Indent,
        Instr::Text("del ".to_string()),
        Instr::Child {
          at: None,
          index: 1,
          expect: None
        },
        Instr::Text("\n".to_string()),
      ]
    );
  }

  #[test]
  fn test_compile_path_and_percent() {
    let t = Template::compile("%[-1]{attr}%%", vec![]).unwrap();
    assert_eq!(
      t.instrs,
      vec![
        Instr::Field {
          at: Some(-1),
          field: Field::Attr
        },
        Instr::Text("%".to_string()),
      ]
    );
  }

  #[test]
  fn test_compile_errors() {
    assert!(matches!(
      Template::compile("%q", vec![]),
      Err(FormatError::UnknownEscape { escape: 'q', .. })
    ));
    assert!(matches!(
      Template::compile("%c", vec![]),
      Err(FormatError::MissingArgument { escape: 'c', .. })
    ));
    assert!(matches!(
      Template::compile("%C", vec![TemplateArg::child(0)]),
      Err(FormatError::ArgumentMismatch { escape: 'C', .. })
    ));
    assert!(matches!(
      Template::compile("x", vec![TemplateArg::child(0)]),
      Err(FormatError::ExtraArguments { count: 1, .. })
    ));
    assert!(matches!(
      Template::compile("%{name", vec![]),
      Err(FormatError::Unterminated { .. })
    ));
    assert!(matches!(
      Template::compile("%{name}", vec![]),
      Err(FormatError::UnknownField { .. })
    ));
    assert!(matches!(
      Template::compile("%[x]c", vec![TemplateArg::child(0)]),
      Err(FormatError::BadIndex { .. })
    ));
  }

  #[test]
  fn test_resolve_index() {
    assert_eq!(resolve_index(0, 3), Some(0));
    assert_eq!(resolve_index(-1, 3), Some(2));
    assert_eq!(resolve_index(-3, 3), Some(0));
    assert_eq!(resolve_index(-4, 3), None);
    assert_eq!(resolve_index(3, 3), None);
  }
}

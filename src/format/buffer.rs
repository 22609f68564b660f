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

//! An output buffer that holds back newlines.
//!
//! Newlines at either end of a write are not emitted right away. They are
//! kept as a pending count, and runs of requested newlines merge by taking
//! the largest, so two writers each asking for a blank line produce one
//! blank line. Pending newlines are only emitted once more text follows,
//! which means trailing newlines never reach the output.

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct OutputBuffer {
  text: String,
  pending_newlines: usize,
}

impl OutputBuffer {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn write(&mut self, data: &str) {
    if data.is_empty() {
      return;
    }

    let body = data.trim_start_matches('\n');
    let leading = data.len() - body.len();
    if body.is_empty() {
      self.pending_newlines = self.pending_newlines.max(leading);
      return;
    }
    if leading > 0 {
      self.pending_newlines = self.pending_newlines.max(leading);
    }

    self.flush_newlines();

    let trimmed = body.trim_end_matches('\n');
    self.pending_newlines = body.len() - trimmed.len();
    self.text.push_str(trimmed);
  }

  /// Writes `data`, then asks for at least one newline after it.
  pub fn println(&mut self, data: &str) {
    self.write(data);
    self.pending_newlines = self.pending_newlines.max(1);
  }

  pub fn pending_newlines(&self) -> usize {
    self.pending_newlines
  }

  /// Drops any newlines requested so far.
  pub fn clear_pending(&mut self) {
    self.pending_newlines = 0;
  }

  /// The text emitted so far, without pending newlines.
  pub fn as_str(&self) -> &str {
    &self.text
  }

  /// Returns the emitted text. Trailing newlines still pending are dropped.
  pub fn finish(self) -> String {
    self.text
  }

  fn flush_newlines(&mut self) {
    for _ in 0..self.pending_newlines {
      self.text.push('\n');
    }
    self.pending_newlines = 0;
  }
}

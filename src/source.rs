//! Source cursor: an immutable (text, index) pair advanced by regex
//! matches.
//!
//! Matching is "sticky": a pattern may only match at the exact current
//! index, never by scanning forward. The `regex` crate has no sticky
//! flag, so patterns are compiled with a `\A` anchor and applied to the
//! suffix of the input that starts at the cursor.

use std::rc::Rc;

use regex::Regex;

/// Compile `pattern` so it can only match at the start of a haystack.
pub fn sticky(pattern: &str) -> Regex {
  Regex::new(&format!(r"\A(?:{pattern})")).expect("grammar pattern must be a valid regex")
}

/// Immutable cursor into the program text. Cloning shares the text.
#[derive(Debug, Clone)]
pub struct Source {
  text: Rc<str>,
  index: usize,
}

impl Source {
  pub fn new(text: &str) -> Self {
    Self {
      text: Rc::from(text),
      index: 0,
    }
  }

  /// Byte index of the cursor, used for error reporting.
  pub fn index(&self) -> usize {
    self.index
  }

  /// True once every byte of the input has been consumed.
  pub fn at_end(&self) -> bool {
    self.index == self.text.len()
  }

  /// Match an anchored regex at the cursor. A hit yields the matched text
  /// and a cursor advanced past it; anything else is a miss.
  pub fn match_regex(&self, re: &Regex) -> Option<(String, Source)> {
    let matched = re.find(&self.text[self.index..])?;
    let advanced = Source {
      text: Rc::clone(&self.text),
      index: self.index + matched.end(),
    };
    Some((matched.as_str().to_string(), advanced))
  }
}

//! PEG-style parser combinators.
//!
//! A parser wraps a pure function from cursor to an optional (value,
//! rest-of-input) pair. A miss is `Ok(None)`; only `error` parsers
//! produce `Err`. Because parse functions never mutate the cursor they
//! are handed, ordered choice simply re-tries the next alternative from
//! the original cursor and no explicit backtracking is needed.

use std::cell::RefCell;
use std::rc::Rc;

use crate::error::{CompileError, CompileResult};
use crate::source::{Source, sticky};

type ParseFn<T> = dyn Fn(&Source) -> CompileResult<Option<(T, Source)>>;

/// A composable parser producing values of type `T`.
pub struct Parser<T> {
  run: Rc<ParseFn<T>>,
}

impl<T> Clone for Parser<T> {
  fn clone(&self) -> Self {
    Self {
      run: Rc::clone(&self.run),
    }
  }
}

impl<T: 'static> Parser<T> {
  /// Wrap a raw parse function.
  pub fn new(run: impl Fn(&Source) -> CompileResult<Option<(T, Source)>> + 'static) -> Self {
    Self { run: Rc::new(run) }
  }

  /// Apply the parser at `source`.
  pub fn parse(&self, source: &Source) -> CompileResult<Option<(T, Source)>> {
    (self.run)(source)
  }

  /// Succeed with `value` without consuming input.
  pub fn constant(value: T) -> Self
  where
    T: Clone,
  {
    Parser::new(move |source| Ok(Some((value.clone(), source.clone()))))
  }

  /// Raise a fatal grammar error when applied.
  pub fn error(message: impl Into<String>) -> Self {
    let message = message.into();
    Parser::new(move |_| {
      Err(CompileError::Grammar {
        message: message.clone(),
      })
    })
  }

  /// Ordered choice: try `self`, and on a miss try `other` from the same
  /// cursor.
  pub fn or(self, other: Parser<T>) -> Parser<T> {
    Parser::new(move |source| match self.parse(source)? {
      Some(hit) => Ok(Some(hit)),
      None => other.parse(source),
    })
  }

  /// Apply `self` repeatedly until it misses, collecting the values.
  /// Always succeeds, possibly with an empty vector.
  pub fn zero_or_more(self) -> Parser<Vec<T>> {
    Parser::new(move |source| {
      let mut items = Vec::new();
      let mut rest = source.clone();
      while let Some((item, next)) = self.parse(&rest)? {
        items.push(item);
        rest = next;
      }
      Ok(Some((items, rest)))
    })
  }

  /// Monadic sequencing: feed the parsed value into `next` and continue
  /// with the parser it returns.
  pub fn bind<U: 'static>(self, next: impl Fn(T) -> Parser<U> + 'static) -> Parser<U> {
    Parser::new(move |source| match self.parse(source)? {
      Some((value, rest)) => next(value).parse(&rest),
      None => Ok(None),
    })
  }

  /// Sequence two parsers, keeping the value of the second.
  pub fn and<U: 'static>(self, other: Parser<U>) -> Parser<U> {
    self.bind(move |_| other.clone())
  }

  /// Rewrite the value of a successful parse.
  pub fn map<U: 'static>(self, f: impl Fn(T) -> U + 'static) -> Parser<U> {
    Parser::new(move |source| Ok(self.parse(source)?.map(|(value, rest)| (f(value), rest))))
  }

  /// Turn a miss into a successful `None` without consuming input.
  pub fn maybe(self) -> Parser<Option<T>> {
    Parser::new(move |source| match self.parse(source)? {
      Some((value, rest)) => Ok(Some((Some(value), rest))),
      None => Ok(Some((None, source.clone()))),
    })
  }

  /// Driver: parse the whole of `text`, promoting a miss or a partial
  /// parse into a syntax error carrying the offending byte index.
  pub fn parse_string_to_completion(&self, text: &str) -> CompileResult<T> {
    let source = Source::new(text);
    let Some((value, rest)) = self.parse(&source)? else {
      return Err(CompileError::Syntax {
        index: source.index(),
      });
    };
    if !rest.at_end() {
      return Err(CompileError::Syntax { index: rest.index() });
    }
    Ok(value)
  }

  /// A placeholder for a parser defined later, so mutually recursive
  /// grammars can be tied together. Applying the placeholder before
  /// `ForwardRef::define` has run is a fatal error.
  pub fn forward(name: &'static str) -> (Parser<T>, ForwardRef<T>) {
    let slot: Rc<RefCell<Option<Parser<T>>>> = Rc::new(RefCell::new(None));
    let parser = {
      let slot = Rc::clone(&slot);
      Parser::new(move |source| match slot.borrow().as_ref() {
        Some(parser) => parser.parse(source),
        None => Err(CompileError::Grammar {
          message: format!("{name} parser used before definition"),
        }),
      })
    };
    (parser, ForwardRef { slot })
  }
}

impl Parser<String> {
  /// Succeed with the matched text iff the sticky regex matches at the
  /// cursor.
  pub fn regexp(pattern: &str) -> Parser<String> {
    let re = sticky(pattern);
    Parser::new(move |source| Ok(source.match_regex(&re)))
  }
}

/// Write-once definition slot backing a forward-declared parser.
pub struct ForwardRef<T> {
  slot: Rc<RefCell<Option<Parser<T>>>>,
}

impl<T> ForwardRef<T> {
  pub fn define(&self, parser: Parser<T>) {
    *self.slot.borrow_mut() = Some(parser);
  }
}

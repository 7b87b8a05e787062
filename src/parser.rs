//! Lexical layer and grammar: all syntactic knowledge lives here.
//!
//! The grammar is a PEG built from the `combinator` primitives. Ordered
//! choice encodes statement priority, and the expression ladder climbs
//! comparison, sum, product, unary, atom. Tokens consume their own
//! trailing whitespace and comments, so the rest of the grammar never
//! sees either.

use crate::ast::{Ast, BinaryOp};
use crate::combinator::Parser;
use crate::error::CompileResult;

/// Parse a whole program into its top-level block.
pub fn parse(source: &str) -> CompileResult<Ast> {
  PROGRAM.with(|program| program.parse_string_to_completion(source))
}

thread_local! {
  // The grammar compiles a few dozen regexes; build it once per thread.
  static PROGRAM: Parser<Ast> = program();
}

fn whitespace() -> Parser<String> {
  Parser::regexp(r"[ \t\r\n]+")
}

/// A line comment to end of line, or a block comment spanning any number
/// of lines.
fn comments() -> Parser<String> {
  Parser::regexp(r"//[^\n]*").or(Parser::regexp(r"/\*(?s:.*?)\*/"))
}

fn ignored() -> Parser<Vec<String>> {
  whitespace().or(comments()).zero_or_more()
}

/// Match `pattern`, then consume trailing insignificant input.
fn token(pattern: &str) -> Parser<String> {
  let trailing = ignored();
  Parser::regexp(pattern).bind(move |text| trailing.clone().and(Parser::constant(text)))
}

/// Keywords require a trailing word boundary so that `iffy` is never read
/// as `if` followed by `fy`.
fn keyword(word: &'static str) -> Parser<String> {
  token(&format!(r"{word}\b"))
}

/// One left-associative infix level: `operand ((op) operand)*`, folded
/// left to right over the collected pairs.
fn infix(operator: Parser<BinaryOp>, operand: Parser<Ast>) -> Parser<Ast> {
  let pairs = operator
    .bind({
      let operand = operand.clone();
      move |op| operand.clone().map(move |right| (op, right))
    })
    .zero_or_more();
  operand.bind(move |first| {
    pairs.clone().map(move |rest| {
      rest
        .into_iter()
        .fold(first.clone(), |left, (op, right)| Ast::binary(op, left, right))
    })
  })
}

/// `assert` is a parse-time intrinsic, not a user-definable function.
fn build_call(callee: String, args: Vec<Ast>) -> Parser<Ast> {
  if callee == "assert" {
    return match args.into_iter().next() {
      Some(condition) => Parser::constant(Ast::assert(condition)),
      None => Parser::error("assert requires a condition argument"),
    };
  }
  Parser::constant(Ast::call(callee, args))
}

fn program() -> Parser<Ast> {
  // The grammar is mutually recursive; expression and statement are tied
  // together through forward references resolved at the end.
  let (expression, expression_ref) = Parser::<Ast>::forward("expression");
  let (statement, statement_ref) = Parser::<Ast>::forward("statement");

  let function_kw = keyword("function");
  let if_kw = keyword("if");
  let else_kw = keyword("else");
  let return_kw = keyword("return");
  let var_kw = keyword("var");
  let while_kw = keyword("while");

  let comma = token(",");
  let semicolon = token(";");
  let left_paren = token(r"\(");
  let right_paren = token(r"\)");
  let left_brace = token(r"\{");
  let right_brace = token(r"\}");
  let assign_op = token("=");

  let id = token("[a-zA-Z_][a-zA-Z0-9_]*");
  let number = token("[0-9]+").bind(|digits| match digits.parse::<u32>() {
    Ok(value) => Parser::constant(Ast::Number(value)),
    Err(_) => Parser::error(format!("number literal out of range: {digits}")),
  });

  let not_op = token("!");
  let equality_op = token("==")
    .map(|_| BinaryOp::Eq)
    .or(token("!=").map(|_| BinaryOp::Ne));
  let additive_op = token(r"\+")
    .map(|_| BinaryOp::Add)
    .or(token("-").map(|_| BinaryOp::Sub));
  let multiplicative_op = token(r"\*")
    .map(|_| BinaryOp::Mul)
    .or(token("/").map(|_| BinaryOp::Div));

  // args <- (expression (',' expression)*)?
  let args = expression
    .clone()
    .bind({
      let comma = comma.clone();
      let expression = expression.clone();
      move |first| {
        comma
          .clone()
          .and(expression.clone())
          .zero_or_more()
          .map(move |mut rest| {
            let mut all = vec![first.clone()];
            all.append(&mut rest);
            all
          })
      }
    })
    .maybe()
    .map(Option::unwrap_or_default);

  // call <- ID '(' args ')'
  let call = id.clone().bind({
    let left_paren = left_paren.clone();
    let right_paren = right_paren.clone();
    move |callee| {
      left_paren.clone().and(args.clone()).bind({
        let right_paren = right_paren.clone();
        move |arguments| right_paren.clone().and(build_call(callee.clone(), arguments))
      })
    }
  });

  // atom <- call | id | number | '(' expression ')'
  let paren_expression = left_paren.clone().and(expression.clone()).bind({
    let right_paren = right_paren.clone();
    move |inner| right_paren.clone().and(Parser::constant(inner))
  });
  let atom = call
    .or(id.clone().map(Ast::Id))
    .or(number)
    .or(paren_expression);

  // unary <- '!'? atom
  let unary = not_op.maybe().bind(move |not| {
    atom
      .clone()
      .map(move |term| if not.is_some() { Ast::not(term) } else { term })
  });

  let product = infix(multiplicative_op, unary);
  let sum = infix(additive_op, product);
  let comparison = infix(equality_op, sum);
  expression_ref.define(comparison);

  // return <- 'return' expression ';'
  let return_stmt = return_kw.and(expression.clone()).bind({
    let semicolon = semicolon.clone();
    move |term| semicolon.clone().and(Parser::constant(Ast::ret(term)))
  });

  // Expression statements contribute the expression node itself.
  let expression_stmt = expression.clone().bind({
    let semicolon = semicolon.clone();
    move |term| semicolon.clone().and(Parser::constant(term))
  });

  // block <- '{' statement* '}'
  let block_stmt = left_brace.and(statement.clone().zero_or_more()).bind({
    let right_brace = right_brace.clone();
    move |statements| right_brace.clone().and(Parser::constant(Ast::block(statements)))
  });

  // parameters <- (ID (',' ID)*)?
  let parameters = id
    .clone()
    .bind({
      let comma = comma.clone();
      let id = id.clone();
      move |first| {
        comma
          .clone()
          .and(id.clone())
          .zero_or_more()
          .map(move |mut rest| {
            let mut all = vec![first.clone()];
            all.append(&mut rest);
            all
          })
      }
    })
    .maybe()
    .map(Option::unwrap_or_default);

  // function <- 'function' ID '(' parameters ')' block
  let function_stmt = function_kw.and(id.clone()).bind({
    let left_paren = left_paren.clone();
    let right_paren = right_paren.clone();
    let block_stmt = block_stmt.clone();
    move |name| {
      left_paren.clone().and(parameters.clone()).bind({
        let right_paren = right_paren.clone();
        let block_stmt = block_stmt.clone();
        move |params| {
          let name = name.clone();
          right_paren
            .clone()
            .and(block_stmt.clone())
            .map(move |body| Ast::function(name.clone(), params.clone(), body))
        }
      })
    }
  });

  // if <- 'if' '(' expression ')' statement 'else' statement
  let if_stmt = if_kw.and(left_paren.clone()).and(expression.clone()).bind({
    let right_paren = right_paren.clone();
    let statement = statement.clone();
    move |condition| {
      right_paren.clone().and(statement.clone()).bind({
        let else_kw = else_kw.clone();
        let statement = statement.clone();
        move |consequence| {
          let condition = condition.clone();
          else_kw.clone().and(statement.clone()).map(move |alternative| {
            Ast::if_stmt(condition.clone(), consequence.clone(), alternative)
          })
        }
      })
    }
  });

  // while <- 'while' '(' expression ')' statement
  let while_stmt = while_kw.and(left_paren.clone()).and(expression.clone()).bind({
    let right_paren = right_paren.clone();
    let statement = statement.clone();
    move |condition| {
      right_paren
        .clone()
        .and(statement.clone())
        .map(move |body| Ast::while_stmt(condition.clone(), body))
    }
  });

  // var <- 'var' ID '=' expression ';'
  let var_stmt = var_kw.and(id.clone()).bind({
    let assign_op = assign_op.clone();
    let expression = expression.clone();
    let semicolon = semicolon.clone();
    move |name| {
      assign_op.clone().and(expression.clone()).bind({
        let semicolon = semicolon.clone();
        move |value| semicolon.clone().and(Parser::constant(Ast::var(name.clone(), value)))
      })
    }
  });

  // assign <- ID '=' expression ';'
  let assign_stmt = id.bind({
    let expression = expression.clone();
    let semicolon = semicolon.clone();
    move |name| {
      assign_op.clone().and(expression.clone()).bind({
        let semicolon = semicolon.clone();
        move |value| semicolon.clone().and(Parser::constant(Ast::assign(name.clone(), value)))
      })
    }
  });

  // First match wins; assignment is tried before expression statements so
  // `x = 1;` never parses as the bare expression `x`.
  statement_ref.define(
    return_stmt
      .or(function_stmt)
      .or(if_stmt)
      .or(while_stmt)
      .or(var_stmt)
      .or(assign_stmt)
      .or(block_stmt)
      .or(expression_stmt),
  );

  ignored().and(statement.zero_or_more()).map(Ast::block)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::error::CompileError;

  fn parse_ok(source: &str) -> Ast {
    parse(source).unwrap()
  }

  #[test]
  fn parses_the_empty_program() {
    assert_eq!(Ast::block(vec![]), parse_ok(""));
    assert_eq!(Ast::block(vec![]), parse_ok("  // nothing here\n"));
  }

  #[test]
  fn subtraction_is_left_associative() {
    assert_eq!(
      Ast::block(vec![Ast::binary(
        BinaryOp::Sub,
        Ast::binary(BinaryOp::Sub, Ast::number(1), Ast::number(2)),
        Ast::number(3),
      )]),
      parse_ok("1 - 2 - 3;")
    );
  }

  #[test]
  fn product_binds_tighter_than_sum() {
    assert_eq!(
      Ast::block(vec![Ast::binary(
        BinaryOp::Add,
        Ast::number(1),
        Ast::binary(BinaryOp::Mul, Ast::number(2), Ast::number(3)),
      )]),
      parse_ok("1 + 2 * 3;")
    );
  }

  #[test]
  fn comparison_binds_loosest() {
    assert_eq!(
      Ast::block(vec![Ast::binary(
        BinaryOp::Eq,
        Ast::id("a"),
        Ast::binary(BinaryOp::Add, Ast::id("b"), Ast::id("c")),
      )]),
      parse_ok("a == b + c;")
    );
  }

  #[test]
  fn parentheses_override_precedence() {
    assert_eq!(
      Ast::block(vec![Ast::binary(
        BinaryOp::Mul,
        Ast::binary(BinaryOp::Add, Ast::number(1), Ast::number(2)),
        Ast::number(3),
      )]),
      parse_ok("(1 + 2) * 3;")
    );
  }

  #[test]
  fn unary_not_applies_to_the_atom() {
    assert_eq!(Ast::block(vec![Ast::not(Ast::id("x"))]), parse_ok("!x;"));
  }

  #[test]
  fn keywords_require_a_word_boundary() {
    assert_eq!(
      Ast::block(vec![Ast::id("functionality")]),
      parse_ok("functionality;")
    );
    assert_eq!(
      Ast::block(vec![Ast::assign("iffy", Ast::number(1))]),
      parse_ok("iffy = 1;")
    );
    assert_eq!(
      Ast::block(vec![Ast::assign("elsewhere", Ast::number(2))]),
      parse_ok("elsewhere = 2;")
    );
    assert_eq!(
      Ast::block(vec![Ast::assign("returning", Ast::number(3))]),
      parse_ok("returning = 3;")
    );
    assert_eq!(
      Ast::block(vec![Ast::assign("variant", Ast::number(4))]),
      parse_ok("variant = 4;")
    );
    assert_eq!(
      Ast::block(vec![Ast::assign("whiles", Ast::number(5))]),
      parse_ok("whiles = 5;")
    );
  }

  #[test]
  fn whitespace_and_comments_are_insignificant() {
    let compact = "function main() { return 10; }";
    let airy =
      "function /* which */ main ( ) {\n  // about to return\n  return /* the\n  answer */ 10 ; }";
    assert_eq!(parse_ok(compact), parse_ok(airy));
  }

  #[test]
  fn the_factorial_program_round_trips() {
    let source =
      "function fact(n) { var r = 1; while (n != 1) { r = r * n; n = n - 1; } return r; }";
    let expected = Ast::block(vec![Ast::function(
      "fact",
      vec!["n".to_string()],
      Ast::block(vec![
        Ast::var("r", Ast::number(1)),
        Ast::while_stmt(
          Ast::binary(BinaryOp::Ne, Ast::id("n"), Ast::number(1)),
          Ast::block(vec![
            Ast::assign("r", Ast::binary(BinaryOp::Mul, Ast::id("r"), Ast::id("n"))),
            Ast::assign("n", Ast::binary(BinaryOp::Sub, Ast::id("n"), Ast::number(1))),
          ]),
        ),
        Ast::ret(Ast::id("r")),
      ]),
    )]);
    assert_eq!(expected, parse_ok(source));
  }

  #[test]
  fn calls_collect_ordered_arguments() {
    assert_eq!(Ast::block(vec![Ast::call("f", vec![])]), parse_ok("f();"));
    assert_eq!(
      Ast::block(vec![Ast::call(
        "f",
        vec![
          Ast::number(1),
          Ast::id("x"),
          Ast::call("g", vec![Ast::number(2)]),
        ],
      )]),
      parse_ok("f(1, x, g(2));")
    );
  }

  #[test]
  fn assert_is_a_parse_time_intrinsic() {
    assert_eq!(
      Ast::block(vec![Ast::assert(Ast::binary(
        BinaryOp::Eq,
        Ast::number(1),
        Ast::number(1),
      ))]),
      parse_ok("assert(1 == 1);")
    );
    // Only the first argument is kept, whatever the count.
    assert_eq!(
      Ast::block(vec![Ast::assert(Ast::number(1))]),
      parse_ok("assert(1, 2);")
    );
  }

  #[test]
  fn assert_without_a_condition_is_rejected() {
    let err = parse("assert();").unwrap_err();
    assert_eq!("assert requires a condition argument", err.to_string());
  }

  #[test]
  fn if_requires_an_else_branch() {
    let err = parse("function f() { if (1) g(); }").unwrap_err();
    assert!(matches!(err, CompileError::Syntax { .. }), "{err}");
  }

  #[test]
  fn compound_assignment_is_rejected() {
    let err = parse("function f(n) { n += 10; }").unwrap_err();
    assert!(matches!(err, CompileError::Syntax { .. }), "{err}");
  }

  #[test]
  fn reports_the_index_where_progress_stopped() {
    let err = parse("1 + ;").unwrap_err();
    assert_eq!("Parse error at index 0", err.to_string());

    let err = parse("var x = 1; @").unwrap_err();
    assert_eq!("Parse error at index 11", err.to_string());
  }

  #[test]
  fn oversized_number_literals_are_fatal() {
    let err = parse("4294967296;").unwrap_err();
    assert_eq!(
      "number literal out of range: 4294967296",
      err.to_string()
    );
  }

  #[test]
  fn blocks_nest_as_statements() {
    assert_eq!(
      Ast::block(vec![Ast::block(vec![
        Ast::number(1),
        Ast::block(vec![]),
      ])]),
      parse_ok("{ 1; {} }")
    );
  }
}

//! Code generation: lower the AST into 32-bit ARM assembly text.
//!
//! The emitter is a stack machine. Every expression leaves its result in
//! `r0`; binary operators stash the left operand with a `push {r0, ip}`
//! pair so the stack stays 8-byte aligned. Locals live at negative
//! offsets from `fp`, and the generator appends one line per emit call
//! to an internal buffer that the driver returns whole.

use std::collections::HashMap;
use std::fmt;

use crate::ast::{Ast, BinaryOp};
use crate::error::{CompileError, CompileResult};

/// Per-function mapping from local name to fp-relative byte offset.
#[derive(Debug, Default)]
pub struct Environment {
  locals: HashMap<String, i32>,
  next_local_offset: i32,
}

impl Environment {
  pub fn new() -> Self {
    Self::default()
  }

  /// Fresh frame for a function body: parameter `i` lives in the spill
  /// slot at `4 * i - 16`, and locals start below the home area.
  fn with_parameters(parameters: &[String]) -> Self {
    let locals = parameters
      .iter()
      .enumerate()
      .map(|(i, name)| (name.clone(), 4 * i as i32 - 16))
      .collect();
    Self {
      locals,
      next_local_offset: -20,
    }
  }

  /// Frame offset of `name`. Absence is detected through the map entry
  /// itself, so a binding at offset 0 would still resolve.
  fn lookup(&self, name: &str) -> CompileResult<i32> {
    self
      .locals
      .get(name)
      .copied()
      .ok_or_else(|| CompileError::UndefinedVariable {
        name: name.to_string(),
      })
  }

  /// Reserve a fresh 8-byte slot and bind `name` to its upper word.
  fn bind(&mut self, name: &str) {
    self.locals.insert(name.to_string(), self.next_local_offset - 4);
    self.next_local_offset -= 8;
  }
}

/// Branch target rendered as `.L<n>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Label(u32);

impl fmt::Display for Label {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, ".L{}", self.0)
  }
}

/// Compile the program AST into an assembly listing.
pub fn generate(program: &Ast) -> CompileResult<String> {
  let mut generator = CodeGenerator::new();
  let mut env = Environment::new();
  generator.emit_node(program, &mut env)?;
  Ok(generator.asm)
}

struct CodeGenerator {
  asm: String,
  next_label: u32,
}

impl CodeGenerator {
  fn new() -> Self {
    Self {
      asm: String::new(),
      next_label: 0,
    }
  }

  /// Labels restart at `.L0` for every compilation, so output is
  /// reproducible run to run.
  fn new_label(&mut self) -> Label {
    let label = Label(self.next_label);
    self.next_label += 1;
    label
  }

  /// One instruction, indented.
  fn emit(&mut self, instruction: &str) {
    self.asm.push_str("  ");
    self.asm.push_str(instruction);
    self.asm.push('\n');
  }

  /// A label definition or directive at column zero.
  fn emit_unindented(&mut self, line: &str) {
    self.asm.push_str(line);
    self.asm.push('\n');
  }

  fn emit_node(&mut self, node: &Ast, env: &mut Environment) -> CompileResult<()> {
    match node {
      Ast::Number(value) => {
        self.emit(&format!("ldr r0, ={value}"));
      }
      Ast::Id(name) => {
        let offset = env.lookup(name)?;
        self.emit(&format!("ldr r0, [fp, #{offset}]"));
      }
      Ast::Not(term) => {
        self.emit_node(term, env)?;
        self.emit("cmp r0, #0");
        self.emit("moveq r0, #1");
        self.emit("movne r0, #0");
      }
      Ast::Binary { op, left, right } => {
        self.emit_node(left, env)?;
        self.emit("push {r0, ip}");
        self.emit_node(right, env)?;
        self.emit("pop {r1, ip}");
        self.emit_binary_op(*op);
      }
      Ast::Call { callee, args } => self.emit_call(callee, args, env)?,
      Ast::Return(term) => {
        self.emit_node(term, env)?;
        self.emit("mov sp, fp");
        self.emit("pop {fp, pc}");
      }
      Ast::Block(statements) => {
        for statement in statements {
          self.emit_node(statement, env)?;
        }
      }
      Ast::If {
        condition,
        consequence,
        alternative,
      } => {
        let if_false = self.new_label();
        let end_if = self.new_label();
        self.emit_node(condition, env)?;
        self.emit("cmp r0, #0");
        self.emit(&format!("beq {if_false}"));
        self.emit_node(consequence, env)?;
        self.emit(&format!("b {end_if}"));
        self.emit_unindented(&format!("{if_false}:"));
        self.emit_node(alternative, env)?;
        self.emit_unindented(&format!("{end_if}:"));
      }
      Ast::Function {
        name,
        parameters,
        body,
      } => self.emit_function(name, parameters, body)?,
      Ast::Var { name, value } => {
        self.emit_node(value, env)?;
        self.emit("push {r0, ip}");
        env.bind(name);
      }
      Ast::Assign { name, value } => {
        self.emit_node(value, env)?;
        let offset = env.lookup(name)?;
        self.emit(&format!("str r0, [fp, #{offset}]"));
      }
      Ast::While { condition, body } => {
        let loop_start = self.new_label();
        let loop_end = self.new_label();
        self.emit_unindented(&format!("{loop_start}:"));
        self.emit_node(condition, env)?;
        self.emit("cmp r0, #0");
        self.emit(&format!("beq {loop_end}"));
        self.emit_node(body, env)?;
        self.emit(&format!("b {loop_start}"));
        self.emit_unindented(&format!("{loop_end}:"));
      }
      Ast::Assert(condition) => {
        self.emit_node(condition, env)?;
        self.emit("cmp r0, #1");
        self.emit("moveq r0, #'.'");
        self.emit("movne r0, #'F'");
        self.emit("bl putchar");
      }
    }
    Ok(())
  }

  /// Right operand is in `r0`, left in `r1`; operand order matters for
  /// the non-commutative operators.
  fn emit_binary_op(&mut self, op: BinaryOp) {
    match op {
      BinaryOp::Add => self.emit("add r0, r0, r1"),
      BinaryOp::Sub => self.emit("sub r0, r1, r0"),
      BinaryOp::Mul => self.emit("mul r0, r1, r0"),
      BinaryOp::Div => self.emit("udiv r0, r1, r0"),
      BinaryOp::Eq => {
        self.emit("cmp r0, r1");
        self.emit("moveq r0, #1");
        self.emit("movne r0, #0");
      }
      BinaryOp::Ne => {
        self.emit("cmp r0, r1");
        self.emit("moveq r0, #0");
        self.emit("movne r0, #1");
      }
    }
  }

  fn emit_call(&mut self, callee: &str, args: &[Ast], env: &mut Environment) -> CompileResult<()> {
    match args.len() {
      0 => self.emit(&format!("bl {callee}")),
      1 => {
        self.emit_node(&args[0], env)?;
        self.emit(&format!("bl {callee}"));
      }
      2..=4 => {
        // Evaluate into the four argument slots, then load r0..r3 in one
        // go. The 16-byte block keeps the stack aligned.
        self.emit("sub sp, sp, #16");
        for (i, arg) in args.iter().enumerate() {
          self.emit_node(arg, env)?;
          self.emit(&format!("str r0, [sp, #{}]", 4 * i));
        }
        self.emit("pop {r0, r1, r2, r3}");
        self.emit(&format!("bl {callee}"));
      }
      _ => return Err(CompileError::TooManyArguments),
    }
    Ok(())
  }

  fn emit_function(&mut self, name: &str, parameters: &[String], body: &Ast) -> CompileResult<()> {
    if parameters.len() > 4 {
      return Err(CompileError::TooManyParameters);
    }
    self.emit_unindented(&format!(".global {name}"));
    self.emit_unindented(&format!("{name}:"));
    // Prologue: save the caller frame, then spill the argument registers
    // into their fixed home slots.
    self.emit("push {fp, lr}");
    self.emit("mov fp, sp");
    self.emit("push {r0, r1, r2, r3}");
    let mut env = Environment::with_parameters(parameters);
    self.emit_node(body, &mut env)?;
    // Fall-through epilogue: functions without an explicit return yield 0.
    self.emit("mov sp, fp");
    self.emit("mov r0, #0");
    self.emit("pop {fp, pc}");
    Ok(())
  }
}

// ABOUTME: Evaluator core: dispatch, user-function application, sequences, non-local return

use crate::builtins;
use crate::error::{EvalError, OutOfMemory};
use crate::heap::{Addr, Heap};
use crate::lists::Cursor;
use crate::reader::{Parsed, Reader};
use std::fs::File;

/// Outcome of one evaluation. `Return` is the in-band signal produced by
/// `(return ...)`; it travels up through sequence evaluation until a form
/// with an implicit NIL block (`do`, `dolist`, `dotimes`, `do-symbols`,
/// `loop`) absorbs it and takes the real result from the RETURNS stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Value(Addr),
    Return,
}

/// Unwrap a value, or propagate a non-local return to the caller.
macro_rules! try_value {
    ($flow:expr) => {
        match $flow {
            $crate::eval::Flow::Value(addr) => addr,
            $crate::eval::Flow::Return => return Ok($crate::eval::Flow::Return),
        }
    };
}
pub(crate) use try_value;

/// The interpreter: the heap plus the trace flags of the builtin table.
pub struct Interp {
    pub heap: Heap,
    pub(crate) traced: Vec<bool>,
}

impl Interp {
    pub fn new(cells: usize, trigger_pct: u32) -> Result<Self, OutOfMemory> {
        Ok(Interp {
            heap: Heap::new(cells, trigger_pct)?,
            traced: vec![false; builtins::TABLE.len()],
        })
    }

    /// Evaluate a top-level form against the global environment (a fresh
    /// one-frame environment holding DEFVARS).
    pub fn eval_top(&mut self, sexpr: Addr) -> Result<Addr, OutOfMemory> {
        let end = self.heap.nil()?;
        let env = self.heap.cons(self.heap.defvars, end)?;
        match self.eval(sexpr, env, 0)? {
            Flow::Value(addr) => Ok(addr),
            Flow::Return => self.heap.nil(),
        }
    }

    /// Print a soft diagnostic.
    pub(crate) fn report(&self, error: &EvalError) {
        println!("[error] {}", error);
    }

    /// Print a soft diagnostic and yield NIL from the offending form.
    pub(crate) fn fail(&mut self, error: EvalError) -> Result<Flow, OutOfMemory> {
        self.report(&error);
        Ok(Flow::Value(self.heap.nil()?))
    }

    /// Core dispatch. `env` is a list of association lists, innermost frame
    /// first; `depth` counts recursion for tracing indent. The depth-0 call
    /// pins the form and the environment on GCSAFE so everything reachable
    /// from them survives collections triggered further down.
    pub fn eval(&mut self, sexpr: Addr, env: Addr, depth: usize) -> Result<Flow, OutOfMemory> {
        if depth == 0 {
            self.heap.push(sexpr, self.heap.gcsafe)?;
            self.heap.push(env, self.heap.gcsafe)?;
        }
        if self.heap.over_trigger() {
            self.heap.gc("At eval");
        }

        let mut trace_exit = false;
        let result = if let Some(value) = self.heap.num(sexpr) {
            // Numbers are values, not identities: evaluate to a fresh cell.
            Flow::Value(self.heap.number(value)?)
        } else if let Some(name) = self.heap.sym(sexpr) {
            let name = name.to_string();
            self.eval_symbol(&name, env)?
        } else if self.heap.is_nil(sexpr) {
            Flow::Value(self.heap.nil()?)
        } else {
            let head = self.heap.car(sexpr);
            if let Some(fname) = self.heap.sym(head) {
                let fname = fname.to_string();
                self.eval_call(sexpr, &fname, env, depth, &mut trace_exit)?
            } else if self.heap.is_cons(head) {
                self.eval_inline_lambda(sexpr, head, env, depth)?
            } else {
                let value = self.heap.num(head).unwrap_or_default();
                self.fail(EvalError::message(format!(
                    "Expected symbol or lambda: {}",
                    value
                )))?
            }
        };

        if trace_exit {
            if let Flow::Value(addr) = result {
                println!("{}<<< {}", trace_indent(depth), self.heap.display(addr));
            }
        }
        if depth == 0 {
            self.heap.pop(self.heap.gcsafe);
            self.heap.pop(self.heap.gcsafe);
        }
        Ok(result)
    }

    fn eval_symbol(&mut self, name: &str, env: Addr) -> Result<Flow, OutOfMemory> {
        if name.eq_ignore_ascii_case("t") {
            return Ok(Flow::Value(self.heap.t()?));
        }
        if name.eq_ignore_ascii_case("nil") {
            return Ok(Flow::Value(self.heap.nil()?));
        }
        let mut cursor = Cursor::Start;
        while let Some(node) = self.heap.traverse(env, &mut cursor) {
            let frame = self.heap.car(node);
            if let Some(value) = self.heap.assoc_get(frame, name) {
                return Ok(Flow::Value(value));
            }
        }
        self.fail(EvalError::UndefinedSymbol(name.to_string()))
    }

    fn eval_call(
        &mut self,
        sexpr: Addr,
        fname: &str,
        env: Addr,
        depth: usize,
        trace_exit: &mut bool,
    ) -> Result<Flow, OutOfMemory> {
        let args = self.heap.cdr(sexpr);
        if let Some((index, builtin)) = builtins::lookup(fname) {
            let got = self.heap.length(args);
            if !builtin.arity.admits(got) {
                return self.fail(EvalError::Arity {
                    name: builtin.name.to_string(),
                    expected: builtin.arity.to_string(),
                    got,
                    form: self.heap.display(sexpr),
                });
            }
            if self.traced[index] {
                *trace_exit = true;
                println!("{}>>> {}", trace_indent(depth), self.heap.display(sexpr));
            }
            return (builtin.run)(self, sexpr, env, depth + 1);
        }
        if let Some(lambda) = self.heap.assoc_get(self.heap.defuns, fname) {
            let params = self.heap.car(lambda);
            let body = self.heap.cdr(lambda);
            *trace_exit = self.heap.assoc_get(self.heap.tracedfuncs, fname).is_some();
            return self.eval_lambda(fname, params, body, args, env, depth);
        }
        self.fail(EvalError::UndefinedFunction(fname.to_string()))
    }

    fn eval_inline_lambda(
        &mut self,
        sexpr: Addr,
        head: Addr,
        env: Addr,
        depth: usize,
    ) -> Result<Flow, OutOfMemory> {
        if self.heap.is_nil(head) {
            return self.fail(EvalError::message(format!(
                "Undefined function NIL: {}",
                self.heap.display(head)
            )));
        }
        let tag = self.heap.car(head);
        let is_lambda = self
            .heap
            .sym(tag)
            .is_some_and(|name| name.eq_ignore_ascii_case("lambda"));
        if !is_lambda {
            return self.fail(EvalError::message(format!(
                "Expected lambda: {}",
                self.heap.display(head)
            )));
        }
        let params = self.heap.nth(head, 1);
        if !self.heap.is_cons(params) {
            return self.fail(EvalError::message(format!(
                "Missing argument list: {}",
                self.heap.display(head)
            )));
        }
        let body = self.heap.cdr(self.heap.cdr(head));
        let args = self.heap.cdr(sexpr);
        self.eval_lambda("lambda", params, body, args, env, depth)
    }

    /// Apply a defuned function or inline lambda. Arguments are evaluated in
    /// the caller's environment, left to right, into a fresh frame; the frame
    /// is pinned on GCSAFE while it is only reachable from here, then
    /// prepended to the environment for the body.
    pub(crate) fn eval_lambda(
        &mut self,
        fname: &str,
        params: Addr,
        body: Addr,
        arg_exprs: Addr,
        env: Addr,
        depth: usize,
    ) -> Result<Flow, OutOfMemory> {
        let count = self.heap.length(params);
        if count != self.heap.length(arg_exprs) {
            return self.fail(EvalError::ArgumentsMismatch {
                name: fname.to_string(),
                args: self.heap.display(arg_exprs),
            });
        }
        let frame = self.heap.nil()?;
        self.heap.push(frame, self.heap.gcsafe)?;
        for i in 0..count {
            let param = self.heap.nth(params, i);
            let name = self.heap.sym(param).unwrap_or_default().to_string();
            let flow = self.eval(self.heap.nth(arg_exprs, i), env, depth + 1)?;
            let value = match flow {
                Flow::Value(addr) => addr,
                Flow::Return => {
                    self.heap.pop(self.heap.gcsafe);
                    return Ok(Flow::Return);
                }
            };
            self.heap.assoc_set(frame, &name, value)?;
        }
        self.heap.pop(self.heap.gcsafe);

        if self.heap.assoc_get(self.heap.tracedfuncs, fname).is_some() {
            let mut line = format!("{}>>> {}", trace_indent(depth), fname);
            let mut cursor = Cursor::Start;
            while let Some(node) = self.heap.traverse(frame, &mut cursor) {
                let pair = self.heap.car(node);
                line.push(' ');
                line.push_str(&self.heap.display(self.heap.cdr(pair)));
            }
            println!("{}", line);
        }

        self.heap.push(frame, env)?;
        let result = self.eval_sequence(body, env, depth + 1)?;
        self.heap.pop(env);
        Ok(result)
    }

    /// Evaluate an implicit sequence of forms; the last value wins. A
    /// `Return` stops the sequence and travels to the enclosing block form.
    pub(crate) fn eval_sequence(
        &mut self,
        list: Addr,
        env: Addr,
        depth: usize,
    ) -> Result<Flow, OutOfMemory> {
        let mut result = self.heap.nil()?;
        let mut cursor = Cursor::Start;
        while let Some(node) = self.heap.traverse(list, &mut cursor) {
            match self.eval(self.heap.car(node), env, depth)? {
                Flow::Value(addr) => result = addr,
                Flow::Return => return Ok(Flow::Return),
            }
        }
        Ok(Flow::Value(result))
    }

    /// Parse and evaluate every top-level form in a file against `env`.
    /// Returns false if the file cannot be opened.
    pub fn load_file(&mut self, path: &str, env: Addr) -> Result<bool, OutOfMemory> {
        let Ok(file) = File::open(path) else {
            return Ok(false);
        };
        let mut reader = Reader::from_file(file);
        loop {
            let parsed = reader.parse(&mut self.heap)?;
            if !reader.ok() {
                break;
            }
            match parsed {
                Parsed::Expr(addr) => {
                    self.eval(addr, env, 0)?;
                }
                _ => break,
            }
        }
        Ok(true)
    }

    /// Script mode: run a file against a fresh global environment.
    pub fn run_file(&mut self, path: &str) -> Result<bool, OutOfMemory> {
        let end = self.heap.nil()?;
        let env = self.heap.cons(self.heap.defvars, end)?;
        self.load_file(path, env)
    }
}

pub(crate) fn trace_indent(depth: usize) -> String {
    format!("[trace] {}", " ".repeat(depth))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn interp() -> Interp {
        Interp::new(65536, 80).unwrap()
    }

    fn run(interp: &mut Interp, src: &str) -> String {
        let mut reader = Reader::from_line(src);
        let mut last = String::from("NIL");
        loop {
            match reader.parse(&mut interp.heap).unwrap() {
                Parsed::Expr(addr) if reader.ok() => {
                    let result = interp.eval_top(addr).unwrap();
                    last = interp.heap.display(result);
                }
                _ => break,
            }
        }
        last
    }

    #[test]
    fn test_number_evaluates_to_fresh_cell() {
        let mut interp = interp();
        let mut reader = Reader::from_line("42");
        let Parsed::Expr(literal) = reader.parse(&mut interp.heap).unwrap() else {
            panic!("expected expression");
        };
        let result = interp.eval_top(literal).unwrap();
        assert_ne!(result, literal);
        assert_eq!(interp.heap.num(result), Some(42));
    }

    #[test]
    fn test_t_and_nil_symbols() {
        let mut interp = interp();
        assert_eq!(run(&mut interp, "t"), "T");
        assert_eq!(run(&mut interp, "T"), "T");
        assert_eq!(run(&mut interp, "nil"), "NIL");
        assert_eq!(run(&mut interp, "()"), "NIL");
    }

    #[test]
    fn test_undefined_symbol_yields_nil() {
        let mut interp = interp();
        assert_eq!(run(&mut interp, "no-such-thing"), "NIL");
    }

    #[test]
    fn test_undefined_function_yields_nil() {
        let mut interp = interp();
        assert_eq!(run(&mut interp, "(no-such-function 1 2)"), "NIL");
    }

    #[test]
    fn test_number_head_is_an_error() {
        let mut interp = interp();
        assert_eq!(run(&mut interp, "(42 1)"), "NIL");
    }

    #[test]
    fn test_defun_and_call() {
        let mut interp = interp();
        run(&mut interp, "(defun double (n) (* n 2))");
        assert_eq!(run(&mut interp, "(double 21)"), "42");
    }

    #[test]
    fn test_lambda_arity_mismatch_yields_nil() {
        let mut interp = interp();
        run(&mut interp, "(defun pair (a b) (cons a b))");
        assert_eq!(run(&mut interp, "(pair 1)"), "NIL");
    }

    #[test]
    fn test_inline_lambda_application() {
        let mut interp = interp();
        assert_eq!(run(&mut interp, "((lambda (x) (* x x)) 6)"), "36");
    }

    #[test]
    fn test_arguments_use_the_callers_environment() {
        let mut interp = interp();
        run(&mut interp, "(defun use-free () hidden)");
        run(&mut interp, "(defun with-binding (hidden) (use-free))");
        // Dynamic scope: `hidden` resolves through the caller's frame.
        assert_eq!(run(&mut interp, "(with-binding 5)"), "5");
    }

    #[test]
    fn test_recursive_function() {
        let mut interp = interp();
        run(
            &mut interp,
            "(defun fact (n) (if (< n 2) 1 (* n (fact (- n 1)))))",
        );
        assert_eq!(run(&mut interp, "(fact 5)"), "120");
    }

    #[test]
    fn test_depth_zero_keeps_gcsafe_balanced() {
        let mut interp = interp();
        let before = interp.heap.length(interp.heap.gcsafe);
        run(&mut interp, "(+ 1 2)");
        assert_eq!(interp.heap.length(interp.heap.gcsafe), before);
    }
}

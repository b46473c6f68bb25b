//! # Built-in Function Table
//!
//! The fixed dispatch table of every built-in form, organized into category
//! modules:
//!
//! - **[arithmetic]**: +, -, *, /, mod, =, <, > - numeric operations
//! - **[lists]**: car, cdr, cons, list, append, length, nth, push, pop, mapcar
//! - **[predicates]**: atom, null, not, boundp, fboundp, eq, eql, equal, type-of
//! - **[control]**: if, cond, and, or, progn, let, let*, do, dolist, dotimes,
//!   do-symbols, loop, return
//! - **[binding]**: quote, ', defun, defvar, defparameter, setq, setf, eval,
//!   apply, funcall
//! - **[console]**: print, prin1, terpri, read
//! - **[system]**: gc, dumpm, room, time, load, trace, untrace
//!
//! Name lookup is case-insensitive and happens before the DEFUNS search, so
//! built-ins cannot be shadowed by user functions. Each entry carries an
//! arity spec checked before the handler runs.

use crate::error::OutOfMemory;
use crate::eval::{Flow, Interp};
use crate::heap::Addr;
use std::fmt;

pub mod arithmetic;
pub mod binding;
pub mod console;
pub mod control;
pub mod lists;
pub mod predicates;
pub mod system;

/// Handlers receive the whole call form (operator included), the current
/// environment and the recursion depth, and evaluate their own arguments.
pub type BuiltinFn = fn(&mut Interp, Addr, Addr, usize) -> Result<Flow, OutOfMemory>;

/// Argument-count condition, written `=N`, `<N`, `>N` or `*` in the table
/// listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    Exactly(usize),
    LessThan(usize),
    MoreThan(usize),
    Any,
}

impl Arity {
    pub fn admits(&self, count: usize) -> bool {
        match self {
            Arity::Exactly(n) => count == *n,
            Arity::LessThan(n) => count < *n,
            Arity::MoreThan(n) => count > *n,
            Arity::Any => true,
        }
    }
}

impl fmt::Display for Arity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arity::Exactly(n) => write!(f, "={}", n),
            Arity::LessThan(n) => write!(f, "<{}", n),
            Arity::MoreThan(n) => write!(f, ">{}", n),
            Arity::Any => write!(f, "*"),
        }
    }
}

pub struct Builtin {
    pub name: &'static str,
    pub arity: Arity,
    pub run: BuiltinFn,
}

const fn entry(name: &'static str, arity: Arity, run: BuiltinFn) -> Builtin {
    Builtin { name, arity, run }
}

use Arity::{Any, Exactly, LessThan, MoreThan};

pub static TABLE: &[Builtin] = &[
    entry("append", Any, lists::append),
    entry("apply", Exactly(2), binding::apply),
    entry("atom", Exactly(1), predicates::atom),
    entry("boundp", Exactly(1), predicates::bound),
    entry("car", Exactly(1), lists::car_cdr),
    entry("cdr", Exactly(1), lists::car_cdr),
    entry("cond", Any, control::cond),
    entry("cons", Exactly(2), lists::cons),
    entry("defun", MoreThan(1), binding::defun),
    entry("defvar", MoreThan(0), binding::define_var),
    entry("defparameter", MoreThan(0), binding::define_var),
    entry("do", MoreThan(1), control::do_),
    entry("dolist", MoreThan(0), control::iterate),
    entry("dotimes", MoreThan(0), control::iterate),
    entry("do-symbols", MoreThan(0), control::iterate),
    entry("dumpm", Exactly(0), system::dumpm),
    entry("eq", Exactly(2), predicates::eq),
    entry("eql", Exactly(2), predicates::eq),
    entry("equal", Exactly(2), predicates::eq),
    entry("eval", Exactly(1), binding::eval_form),
    entry("fboundp", Exactly(1), predicates::bound),
    entry("funcall", MoreThan(0), binding::funcall),
    entry("gc", Exactly(0), system::gc),
    entry("if", MoreThan(1), control::if_),
    entry("length", Exactly(1), lists::length),
    entry("let", MoreThan(0), control::let_),
    entry("let*", MoreThan(0), control::let_),
    entry("list", MoreThan(0), lists::list),
    entry("load", Exactly(1), system::load),
    entry("loop", Any, control::loop_),
    entry("mapcar", MoreThan(1), lists::mapcar),
    entry("mod", Exactly(2), arithmetic::modulo),
    entry("not", Exactly(1), predicates::null),
    entry("nth", Exactly(2), lists::nth),
    entry("null", Exactly(1), predicates::null),
    entry("pop", Exactly(1), lists::pop),
    entry("print", Exactly(1), console::write),
    entry("prin1", Exactly(1), console::write),
    entry("progn", Any, control::progn),
    entry("push", Exactly(2), lists::push),
    entry("quote", Exactly(1), binding::quote),
    entry("read", Exactly(0), console::read),
    entry("return", LessThan(2), control::return_),
    entry("room", Exactly(0), system::room),
    entry("'", Exactly(1), binding::quote),
    entry("setf", Exactly(2), binding::setf),
    entry("setq", Exactly(2), binding::setq),
    entry("terpri", Exactly(0), console::terpri),
    entry("time", Exactly(1), system::time),
    entry("trace", Any, system::trace_toggle),
    entry("type-of", Exactly(1), predicates::type_of),
    entry("untrace", Any, system::trace_toggle),
    entry("+", MoreThan(0), arithmetic::fold),
    entry("-", MoreThan(0), arithmetic::fold),
    entry("*", MoreThan(0), arithmetic::fold),
    entry("/", MoreThan(0), arithmetic::fold),
    entry("=", Exactly(2), arithmetic::compare),
    entry(">", Exactly(2), arithmetic::compare),
    entry("<", Exactly(2), arithmetic::compare),
    entry("and", Any, control::and_or),
    entry("or", Any, control::and_or),
];

/// Case-insensitive table search; the index keys the per-entry trace flags.
pub fn lookup(name: &str) -> Option<(usize, &'static Builtin)> {
    TABLE
        .iter()
        .enumerate()
        .find(|(_, builtin)| builtin.name.eq_ignore_ascii_case(name))
}

//! Type and identity predicates: atom, null, not, boundp, fboundp, eq, eql,
//! equal, type-of
//!
//! `eq` and `eql` are true for the identical cell, for numbers of equal
//! value, for symbols with the same name, and for two NILs. `equal` extends
//! that to structurally identical conses and lists.

use crate::error::{EvalError, OutOfMemory};
use crate::eval::{try_value, Flow, Interp};
use crate::heap::{Addr, CellKind, Heap};

pub fn atom(ip: &mut Interp, sexpr: Addr, env: Addr, depth: usize) -> Result<Flow, OutOfMemory> {
    let value = try_value!(ip.eval(ip.heap.nth(sexpr, 1), env, depth)?);
    let is_atom = ip.heap.is_nil(value) || !ip.heap.is_cons(value);
    let result = if is_atom { ip.heap.t()? } else { ip.heap.nil()? };
    Ok(Flow::Value(result))
}

/// Shared handler for `null` and `not`; both test for NIL.
pub fn null(ip: &mut Interp, sexpr: Addr, env: Addr, depth: usize) -> Result<Flow, OutOfMemory> {
    let value = try_value!(ip.eval(ip.heap.nth(sexpr, 1), env, depth)?);
    let result = if ip.heap.is_nil(value) {
        ip.heap.t()?
    } else {
        ip.heap.nil()?
    };
    Ok(Flow::Value(result))
}

/// Shared handler for `boundp` (DEFVARS) and `fboundp` (DEFUNS).
pub fn bound(ip: &mut Interp, sexpr: Addr, env: Addr, depth: usize) -> Result<Flow, OutOfMemory> {
    let name = ip.heap.sym(ip.heap.car(sexpr)).unwrap_or_default().to_string();
    let value = try_value!(ip.eval(ip.heap.nth(sexpr, 1), env, depth)?);
    let Some(symbol) = ip.heap.sym(value).map(str::to_string) else {
        return ip.fail(EvalError::form(
            &name,
            format!("Bad symbol: {}", ip.heap.display(value)),
        ));
    };
    let found = if name.eq_ignore_ascii_case("boundp") {
        symbol.eq_ignore_ascii_case("t")
            || symbol.eq_ignore_ascii_case("nil")
            || ip.heap.assoc_get(ip.heap.defvars, &symbol).is_some()
    } else {
        ip.heap.assoc_get(ip.heap.defuns, &symbol).is_some()
    };
    let result = if found { ip.heap.t()? } else { ip.heap.nil()? };
    Ok(Flow::Value(result))
}

/// Shared handler for `eq`, `eql` and `equal`.
pub fn eq(ip: &mut Interp, sexpr: Addr, env: Addr, depth: usize) -> Result<Flow, OutOfMemory> {
    let name = ip.heap.sym(ip.heap.car(sexpr)).unwrap_or_default().to_string();
    let args = ip.heap.cdr(sexpr);
    let first = try_value!(ip.eval(ip.heap.nth(args, 0), env, depth)?);
    ip.heap.push(first, ip.heap.gcsafe)?;
    let flow = ip.eval(ip.heap.nth(args, 1), env, depth)?;
    ip.heap.pop(ip.heap.gcsafe);
    let second = try_value!(flow);
    let structural = name.eq_ignore_ascii_case("equal");
    let same = values_equal(&ip.heap, first, second, structural);
    let result = if same { ip.heap.t()? } else { ip.heap.nil()? };
    Ok(Flow::Value(result))
}

/// Identity comparison over already-evaluated values. With `structural`
/// false this is the `eq`/`eql` rule; with it true, conses recurse.
pub fn values_equal(heap: &Heap, a: Addr, b: Addr, structural: bool) -> bool {
    if a == b {
        return true;
    }
    match (heap.kind(a), heap.kind(b)) {
        (CellKind::Number(x), CellKind::Number(y)) => x == y,
        (CellKind::Symbol(x), CellKind::Symbol(y)) => x.eq_ignore_ascii_case(y),
        (CellKind::Cons(..), CellKind::Cons(..)) => match (heap.is_nil(a), heap.is_nil(b)) {
            (true, true) => true,
            (false, false) => {
                structural
                    && values_equal(heap, heap.car(a), heap.car(b), true)
                    && values_equal(heap, heap.cdr(a), heap.cdr(b), true)
            }
            _ => false,
        },
        _ => false,
    }
}

pub fn type_of(ip: &mut Interp, sexpr: Addr, env: Addr, depth: usize) -> Result<Flow, OutOfMemory> {
    let value = try_value!(ip.eval(ip.heap.nth(sexpr, 1), env, depth)?);
    let name = match ip.heap.kind(value) {
        CellKind::Cons(..) => {
            if ip.heap.is_nil(value) {
                "null"
            } else {
                "cons"
            }
        }
        CellKind::Number(_) => "integer",
        CellKind::Symbol(_) => "symbol",
    };
    Ok(Flow::Value(ip.heap.symbol(name)?))
}

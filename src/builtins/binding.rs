//! Definition and assignment: quote, ', defun, defvar, defparameter, setq,
//! setf, eval, apply, funcall
//!
//! `defvar` binds only when the name is unbound; `defparameter` always
//! rebinds. `setq` updates the innermost frame that already holds the
//! symbol, falling back to DEFVARS. `setf` supports a symbol place plus the
//! `(nth n list)`, `(car list)` and `(cdr list)` place forms.

use crate::error::{EvalError, OutOfMemory};
use crate::eval::{try_value, Flow, Interp};
use crate::heap::Addr;
use crate::lists::Cursor;

/// Shared handler for `quote` and its `'` alias.
pub fn quote(ip: &mut Interp, sexpr: Addr, _env: Addr, _depth: usize) -> Result<Flow, OutOfMemory> {
    Ok(Flow::Value(ip.heap.car(ip.heap.cdr(sexpr))))
}

pub fn defun(ip: &mut Interp, sexpr: Addr, _env: Addr, _depth: usize) -> Result<Flow, OutOfMemory> {
    let args = ip.heap.cdr(sexpr);
    let name_cell = ip.heap.nth(args, 0);
    let Some(name) = ip.heap.sym(name_cell).map(str::to_string) else {
        return ip.fail(EvalError::form(
            "defun",
            format!("Bad function name: {}", ip.heap.display(name_cell)),
        ));
    };
    let params = ip.heap.nth(args, 1);
    if !ip.heap.is_cons(params) {
        return ip.fail(EvalError::form(
            "defun",
            format!("Bad argument list: {}", ip.heap.display(params)),
        ));
    }
    let mut cursor = Cursor::Start;
    while let Some(node) = ip.heap.traverse(params, &mut cursor) {
        if ip.heap.sym(ip.heap.car(node)).is_none() {
            return ip.fail(EvalError::form(
                "defun",
                format!("Arguments must be symbols: {}", ip.heap.display(params)),
            ));
        }
    }
    // The stored definition is (params . body), the tail of the defun form.
    let definition = ip.heap.cdr(ip.heap.cdr(sexpr));
    ip.heap.assoc_set(ip.heap.defuns, &name, definition)?;
    Ok(Flow::Value(name_cell))
}

/// Shared handler for `defvar` and `defparameter`.
pub fn define_var(ip: &mut Interp, sexpr: Addr, env: Addr, depth: usize) -> Result<Flow, OutOfMemory> {
    let which = ip.heap.sym(ip.heap.car(sexpr)).unwrap_or_default().to_string();
    let args = ip.heap.cdr(sexpr);
    let name_cell = ip.heap.nth(args, 0);
    let Some(name) = ip.heap.sym(name_cell).map(str::to_string) else {
        return ip.fail(EvalError::form(
            &which,
            format!("Bad variable name: {}", ip.heap.display(name_cell)),
        ));
    };
    let value = try_value!(ip.eval(ip.heap.nth(args, 1), env, depth)?);
    let keep_existing = which.eq_ignore_ascii_case("defvar");
    if !keep_existing || ip.heap.assoc_get(ip.heap.defvars, &name).is_none() {
        ip.heap.assoc_set(ip.heap.defvars, &name, value)?;
    }
    Ok(Flow::Value(name_cell))
}

pub fn setq(ip: &mut Interp, sexpr: Addr, env: Addr, depth: usize) -> Result<Flow, OutOfMemory> {
    let args = ip.heap.cdr(sexpr);
    let symbol_cell = ip.heap.nth(args, 0);
    let Some(name) = ip.heap.sym(symbol_cell).map(str::to_string) else {
        return ip.fail(EvalError::form(
            "setq",
            format!("Expected symbol: {}", ip.heap.display(symbol_cell)),
        ));
    };
    let value = try_value!(ip.eval(ip.heap.nth(args, 1), env, depth)?);
    let mut cursor = Cursor::Start;
    let mut updated = false;
    while let Some(node) = ip.heap.traverse(env, &mut cursor) {
        let frame = ip.heap.car(node);
        if ip.heap.assoc_get(frame, &name).is_some() {
            ip.heap.assoc_set(frame, &name, value)?;
            updated = true;
            break;
        }
    }
    if !updated {
        ip.heap.assoc_set(ip.heap.defvars, &name, value)?;
    }
    Ok(Flow::Value(value))
}

pub fn setf(ip: &mut Interp, sexpr: Addr, env: Addr, depth: usize) -> Result<Flow, OutOfMemory> {
    let args = ip.heap.cdr(sexpr);
    let place = ip.heap.nth(args, 0);
    if ip.heap.num(place).is_some() {
        return ip.fail(EvalError::form(
            "setf",
            format!("Place can't be a number: {}", ip.heap.display(place)),
        ));
    }
    if ip.heap.sym(place).is_some() {
        return setq(ip, sexpr, env, depth);
    }
    let value = try_value!(ip.eval(ip.heap.nth(args, 1), env, depth)?);
    ip.heap.push(value, ip.heap.gcsafe)?;
    let flow = setf_place(ip, place, value, env, depth);
    ip.heap.pop(ip.heap.gcsafe);
    flow
}

fn setf_place(
    ip: &mut Interp,
    place: Addr,
    value: Addr,
    env: Addr,
    depth: usize,
) -> Result<Flow, OutOfMemory> {
    let accessor = ip.heap.sym(ip.heap.car(place)).unwrap_or_default().to_string();
    if accessor.eq_ignore_ascii_case("nth") {
        let index_cell = try_value!(ip.eval(ip.heap.nth(place, 1), env, depth)?);
        let Some(index) = ip.heap.num(index_cell) else {
            return ip.fail(EvalError::form(
                "setf",
                format!("Bad index {}", ip.heap.display(index_cell)),
            ));
        };
        if index < 0 {
            return ip.fail(EvalError::form("setf", format!("Negative index {}", index)));
        }
        let list = try_value!(ip.eval(ip.heap.nth(place, 2), env, depth)?);
        if !ip.heap.is_cons(list) {
            return ip.fail(EvalError::form(
                "setf",
                format!("Bad list {}", ip.heap.display(list)),
            ));
        }
        let len = ip.heap.length(list);
        if index as usize >= len {
            return ip.fail(EvalError::form(
                "setf",
                format!("List only has {} items: {}", len, ip.heap.display(list)),
            ));
        }
        let mut node = list;
        for _ in 0..index {
            node = ip.heap.cdr(node);
        }
        ip.heap.set_car(node, value);
        return Ok(Flow::Value(value));
    }
    if accessor.eq_ignore_ascii_case("car") || accessor.eq_ignore_ascii_case("cdr") {
        let list = try_value!(ip.eval(ip.heap.nth(place, 1), env, depth)?);
        if !ip.heap.is_cons(list) {
            return ip.fail(EvalError::form(
                "setf",
                format!("Bad list to {} place: {}", accessor, ip.heap.display(list)),
            ));
        }
        if accessor.eq_ignore_ascii_case("car") {
            ip.heap.set_car(list, value);
        } else {
            ip.heap.set_cdr(list, value);
        }
        return Ok(Flow::Value(value));
    }
    ip.fail(EvalError::form(
        "setf",
        format!("Unsupported place {}", ip.heap.display(place)),
    ))
}

/// `(eval form)`: evaluate the argument, then evaluate the result.
pub fn eval_form(ip: &mut Interp, sexpr: Addr, env: Addr, depth: usize) -> Result<Flow, OutOfMemory> {
    let form = ip.heap.car(ip.heap.cdr(sexpr));
    let produced = try_value!(ip.eval(form, env, depth + 1)?);
    ip.heap.push(produced, ip.heap.gcsafe)?;
    let flow = ip.eval(produced, env, depth);
    ip.heap.pop(ip.heap.gcsafe);
    flow
}

/// `(apply f arglist)`: splice the evaluated argument list into a call form.
pub fn apply(ip: &mut Interp, sexpr: Addr, env: Addr, depth: usize) -> Result<Flow, OutOfMemory> {
    let args = ip.heap.cdr(sexpr);
    let function = try_value!(ip.eval(ip.heap.nth(args, 0), env, depth)?);
    ip.heap.push(function, ip.heap.gcsafe)?;
    let flow = ip.eval(ip.heap.nth(args, 1), env, depth)?;
    ip.heap.pop(ip.heap.gcsafe);
    let call_args = try_value!(flow);
    if !ip.heap.is_cons(call_args) {
        return ip.fail(EvalError::form(
            "apply",
            format!("Bad arguments list: {}", ip.heap.display(call_args)),
        ));
    }
    let call = ip.heap.cons(function, call_args)?;
    ip.heap.push(call, ip.heap.gcsafe)?;
    let result = ip.eval(call, env, depth);
    ip.heap.pop(ip.heap.gcsafe);
    result
}

/// `(funcall f args...)`: call with the argument expressions as written.
pub fn funcall(ip: &mut Interp, sexpr: Addr, env: Addr, depth: usize) -> Result<Flow, OutOfMemory> {
    let args = ip.heap.cdr(sexpr);
    let function = try_value!(ip.eval(ip.heap.car(args), env, depth)?);
    let call = ip.heap.cons(function, ip.heap.cdr(args))?;
    ip.heap.push(call, ip.heap.gcsafe)?;
    let result = ip.eval(call, env, depth);
    ip.heap.pop(ip.heap.gcsafe);
    result
}

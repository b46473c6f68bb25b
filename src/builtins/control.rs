//! Control flow: if, cond, and, or, progn, let, let*, do, dolist, dotimes,
//! do-symbols, loop, return
//!
//! The looping forms establish an implicit NIL block: they push a
//! placeholder on the RETURNS stack before entering the body, watch sequence
//! evaluation for the return signal, and take the real result from the top
//! of RETURNS when it fires.

use crate::error::{EvalError, OutOfMemory};
use crate::eval::{try_value, Flow, Interp};
use crate::heap::Addr;
use crate::lists::Cursor;

pub fn if_(ip: &mut Interp, sexpr: Addr, env: Addr, depth: usize) -> Result<Flow, OutOfMemory> {
    let args = ip.heap.cdr(sexpr);
    let test = try_value!(ip.eval(ip.heap.nth(args, 0), env, depth)?);
    if !ip.heap.is_nil(test) {
        ip.eval(ip.heap.nth(args, 1), env, depth)
    } else {
        ip.eval(ip.heap.nth(args, 2), env, depth)
    }
}

pub fn cond(ip: &mut Interp, sexpr: Addr, env: Addr, depth: usize) -> Result<Flow, OutOfMemory> {
    let args = ip.heap.cdr(sexpr);
    let mut cursor = Cursor::Start;
    while let Some(node) = ip.heap.traverse(args, &mut cursor) {
        let clause = ip.heap.car(node);
        if ip.heap.is_nil(clause) {
            return ip.fail(EvalError::form(
                "cond",
                format!("clause should be non NIL: {}", ip.heap.display(clause)),
            ));
        }
        let test = try_value!(ip.eval(ip.heap.car(clause), env, depth)?);
        if !ip.heap.is_nil(test) {
            return ip.eval_sequence(ip.heap.cdr(clause), env, depth);
        }
    }
    Ok(Flow::Value(ip.heap.nil()?))
}

/// Short-circuit `and`/`or`. Success yields the symbol T, not the last or
/// first truthy value.
pub fn and_or(ip: &mut Interp, sexpr: Addr, env: Addr, depth: usize) -> Result<Flow, OutOfMemory> {
    let conjunction = ip
        .heap
        .sym(ip.heap.car(sexpr))
        .is_some_and(|name| name.eq_ignore_ascii_case("and"));
    let args = ip.heap.cdr(sexpr);
    let mut cursor = Cursor::Start;
    while let Some(node) = ip.heap.traverse(args, &mut cursor) {
        let value = try_value!(ip.eval(ip.heap.car(node), env, depth)?);
        if conjunction && ip.heap.is_nil(value) {
            return Ok(Flow::Value(ip.heap.nil()?));
        }
        if !conjunction && !ip.heap.is_nil(value) {
            return Ok(Flow::Value(ip.heap.t()?));
        }
    }
    let result = if conjunction {
        ip.heap.t()?
    } else {
        ip.heap.nil()?
    };
    Ok(Flow::Value(result))
}

pub fn progn(ip: &mut Interp, sexpr: Addr, env: Addr, depth: usize) -> Result<Flow, OutOfMemory> {
    ip.eval_sequence(ip.heap.cdr(sexpr), env, depth)
}

/// Shared handler for `let` and `let*`. For `let*` the frame under
/// construction joins the environment while each init form runs.
pub fn let_(ip: &mut Interp, sexpr: Addr, env: Addr, depth: usize) -> Result<Flow, OutOfMemory> {
    let name = ip.heap.sym(ip.heap.car(sexpr)).unwrap_or_default().to_string();
    let sequential = name.eq_ignore_ascii_case("let*");
    let args = ip.heap.cdr(sexpr);
    let specs = ip.heap.nth(args, 0);
    if !ip.heap.is_cons(specs) {
        return ip.fail(EvalError::form(
            &name,
            format!("Bad variable spec at {}", ip.heap.display(specs)),
        ));
    }
    let body = ip.heap.cdr(args);
    let frame = ip.heap.nil()?;
    ip.heap.push(frame, ip.heap.gcsafe)?;
    let mut bad_spec = false;
    let mut cursor = Cursor::Start;
    while let Some(node) = ip.heap.traverse(specs, &mut cursor) {
        let spec = ip.heap.car(node);
        let (symbol, value) = if let Some(var) = ip.heap.sym(spec).map(str::to_string) {
            let value = ip.heap.nil()?;
            (var, value)
        } else if ip.heap.is_cons(spec) {
            let Some(var) = ip.heap.sym(ip.heap.car(spec)).map(str::to_string) else {
                ip.report(&EvalError::form(
                    &name,
                    format!("Bad variable symbol at {}", ip.heap.display(spec)),
                ));
                bad_spec = true;
                break;
            };
            let init = ip.heap.cdr(spec);
            let value = if ip.heap.is_nil(init) {
                ip.heap.nil()?
            } else if !sequential {
                let flow = ip.eval(ip.heap.car(init), env, depth)?;
                match flow {
                    Flow::Value(addr) => addr,
                    Flow::Return => {
                        ip.heap.pop(ip.heap.gcsafe);
                        return Ok(Flow::Return);
                    }
                }
            } else {
                ip.heap.push(frame, env)?;
                let flow = ip.eval(ip.heap.car(init), env, depth)?;
                ip.heap.pop(env);
                match flow {
                    Flow::Value(addr) => addr,
                    Flow::Return => {
                        ip.heap.pop(ip.heap.gcsafe);
                        return Ok(Flow::Return);
                    }
                }
            };
            (var, value)
        } else {
            ip.report(&EvalError::form(
                &name,
                format!("Bad variable symbol at {}", ip.heap.display(spec)),
            ));
            bad_spec = true;
            break;
        };
        ip.heap.assoc_set(frame, &symbol, value)?;
    }
    ip.heap.pop(ip.heap.gcsafe);
    if bad_spec {
        return Ok(Flow::Value(ip.heap.nil()?));
    }
    if ip.heap.length(body) == 0 {
        return Ok(Flow::Value(ip.heap.nil()?));
    }
    ip.heap.push(frame, env)?;
    let result = ip.eval_sequence(body, env, depth)?;
    ip.heap.pop(env);
    Ok(result)
}

/// `(do ((var init step)...) (test [result]) body...)`. Variable values and
/// step forms live in twin assoc frames; step forms are all evaluated
/// against the old bindings, then re-bound together, so the variables update
/// in parallel.
pub fn do_(ip: &mut Interp, sexpr: Addr, env: Addr, depth: usize) -> Result<Flow, OutOfMemory> {
    let args = ip.heap.cdr(sexpr);
    let specs = ip.heap.car(args);
    let test = ip.heap.car(ip.heap.cdr(args));
    let body = ip.heap.cdr(ip.heap.cdr(args));
    if !ip.heap.is_cons(specs) {
        return ip.fail(EvalError::form(
            "do",
            format!("Bad variable list: {}", ip.heap.display(sexpr)),
        ));
    }
    let values = ip.heap.nil()?;
    let steps = ip.heap.nil()?;
    let staging = ip.heap.nil()?;
    ip.heap.push(values, ip.heap.gcsafe)?;
    ip.heap.push(steps, ip.heap.gcsafe)?;
    ip.heap.push(staging, ip.heap.gcsafe)?;
    let unpin = |ip: &mut Interp| {
        ip.heap.pop(ip.heap.gcsafe);
        ip.heap.pop(ip.heap.gcsafe);
        ip.heap.pop(ip.heap.gcsafe);
    };

    let mut bad_spec = false;
    let mut cursor = Cursor::Start;
    while let Some(node) = ip.heap.traverse(specs, &mut cursor) {
        let spec = ip.heap.car(node);
        if !ip.heap.is_cons(spec) || ip.heap.length(spec) != 3 {
            bad_spec = true;
            break;
        }
        let Some(var) = ip.heap.sym(ip.heap.nth(spec, 0)).map(str::to_string) else {
            bad_spec = true;
            break;
        };
        let flow = ip.eval(ip.heap.nth(spec, 1), env, depth)?;
        let init = match flow {
            Flow::Value(addr) => addr,
            Flow::Return => {
                unpin(ip);
                return Ok(Flow::Return);
            }
        };
        ip.heap.assoc_set(values, &var, init)?;
        let step = ip.heap.nth(spec, 2);
        ip.heap.assoc_set(steps, &var, step)?;
    }
    if bad_spec {
        unpin(ip);
        return ip.fail(EvalError::form(
            "do",
            format!("Bad variable spec: {}", ip.heap.display(specs)),
        ));
    }
    if !ip.heap.is_cons(test) {
        unpin(ip);
        return ip.fail(EvalError::form(
            "do",
            format!("Bad test spec: {}", ip.heap.display(test)),
        ));
    }

    ip.heap.push(values, env)?;
    let placeholder = ip.heap.nil()?;
    ip.heap.push(placeholder, ip.heap.returns)?;

    let outcome = 'iterate: loop {
        match ip.eval(ip.heap.nth(test, 0), env, depth)? {
            Flow::Return => break 'iterate Flow::Return,
            Flow::Value(done) => {
                if !ip.heap.is_nil(done) {
                    break 'iterate ip.eval(ip.heap.nth(test, 1), env, depth)?;
                }
            }
        }
        if let Flow::Return = ip.eval_sequence(body, env, depth)? {
            break 'iterate Flow::Return;
        }
        let mut cursor = Cursor::Start;
        while let Some(node) = ip.heap.traverse(steps, &mut cursor) {
            let pair = ip.heap.car(node);
            let var = ip.heap.sym(ip.heap.car(pair)).unwrap_or_default().to_string();
            match ip.eval(ip.heap.cdr(pair), env, depth)? {
                Flow::Return => break 'iterate Flow::Return,
                Flow::Value(updated) => ip.heap.assoc_set(staging, &var, updated)?,
            }
        }
        let mut cursor = Cursor::Start;
        while let Some(node) = ip.heap.traverse(staging, &mut cursor) {
            let pair = ip.heap.car(node);
            let var = ip.heap.sym(ip.heap.car(pair)).unwrap_or_default().to_string();
            ip.heap.assoc_set(values, &var, ip.heap.cdr(pair))?;
        }
    };

    let result = match outcome {
        Flow::Return => Flow::Value(ip.heap.car(ip.heap.returns)),
        value => value,
    };
    ip.heap.pop(ip.heap.returns);
    ip.heap.pop(env);
    unpin(ip);
    Ok(result)
}

/// Shared handler for `dolist`, `dotimes` and `do-symbols`. Each binds the
/// loop variable in a fresh frame per iteration, then binds its terminal
/// value and evaluates the optional result form in the extended environment.
pub fn iterate(ip: &mut Interp, sexpr: Addr, env: Addr, depth: usize) -> Result<Flow, OutOfMemory> {
    let name = ip
        .heap
        .sym(ip.heap.car(sexpr))
        .unwrap_or_default()
        .to_ascii_lowercase();
    let args = ip.heap.cdr(sexpr);
    let body = ip.heap.cdr(args);
    let spec = ip.heap.nth(args, 0);
    if !ip.heap.is_cons(spec) {
        return ip.fail(EvalError::form(
            &name,
            format!("Expected variable list: {}", ip.heap.display(spec)),
        ));
    }
    let spec_len = ip.heap.length(spec);
    let spec_ok = match name.as_str() {
        "do-symbols" => spec_len == 1 || spec_len == 2,
        _ => spec_len == 2 || spec_len == 3,
    };
    if !spec_ok {
        return ip.fail(EvalError::form(
            &name,
            format!("Bad variable spec: {}", ip.heap.display(spec)),
        ));
    }
    let Some(var) = ip.heap.sym(ip.heap.nth(spec, 0)).map(str::to_string) else {
        return ip.fail(EvalError::form(
            &name,
            format!("Bad variable name: {}", ip.heap.display(spec)),
        ));
    };

    let source = match name.as_str() {
        "dolist" => {
            let list = try_value!(ip.eval(ip.heap.nth(spec, 1), env, depth)?);
            if !ip.heap.is_cons(list) {
                return ip.fail(EvalError::form(
                    "dolist",
                    format!("Bad iteration list: {}", ip.heap.display(list)),
                ));
            }
            Some(list)
        }
        "dotimes" => {
            let count = try_value!(ip.eval(ip.heap.nth(spec, 1), env, depth)?);
            if ip.heap.num(count).is_none() {
                return ip.fail(EvalError::form(
                    "dotimes",
                    format!("Bad max iteration: {}", ip.heap.display(count)),
                ));
            }
            Some(count)
        }
        _ => None,
    };
    let result_form = if name == "do-symbols" {
        ip.heap.nth(spec, 1)
    } else {
        ip.heap.nth(spec, 2)
    };

    let frame = ip.heap.nil()?;
    ip.heap.push(frame, ip.heap.gcsafe)?;
    let placeholder = ip.heap.nil()?;
    ip.heap.push(placeholder, ip.heap.returns)?;
    let mut return_found = false;

    match name.as_str() {
        "dolist" => {
            let list = source.unwrap_or(0);
            ip.heap.push(list, ip.heap.gcsafe)?;
            let mut cursor = Cursor::Start;
            while let Some(node) = ip.heap.traverse(list, &mut cursor) {
                let item = ip.heap.car(node);
                ip.heap.assoc_set(frame, &var, item)?;
                ip.heap.push(frame, env)?;
                let flow = ip.eval_sequence(body, env, depth)?;
                ip.heap.pop(env);
                if let Flow::Return = flow {
                    return_found = true;
                    break;
                }
            }
            ip.heap.pop(ip.heap.gcsafe);
            let terminal = ip.heap.nil()?;
            ip.heap.assoc_set(frame, &var, terminal)?;
        }
        "dotimes" => {
            let limit = source.and_then(|cell| ip.heap.num(cell)).unwrap_or(0);
            let mut i: i64 = 0;
            while i < limit {
                let counter = ip.heap.number(i)?;
                ip.heap.assoc_set(frame, &var, counter)?;
                ip.heap.push(frame, env)?;
                let flow = ip.eval_sequence(body, env, depth)?;
                ip.heap.pop(env);
                if let Flow::Return = flow {
                    return_found = true;
                    break;
                }
                i += 1;
            }
            if !return_found {
                let terminal = ip.heap.number(i)?;
                ip.heap.assoc_set(frame, &var, terminal)?;
            }
        }
        _ => {
            // do-symbols walks the keys of DEFVARS then DEFUNS.
            'registers: for register in [ip.heap.defvars, ip.heap.defuns] {
                let mut cursor = Cursor::Start;
                while let Some(node) = ip.heap.traverse(register, &mut cursor) {
                    let key = ip.heap.car(ip.heap.car(node));
                    ip.heap.assoc_set(frame, &var, key)?;
                    ip.heap.push(frame, env)?;
                    let flow = ip.eval_sequence(body, env, depth)?;
                    ip.heap.pop(env);
                    if let Flow::Return = flow {
                        return_found = true;
                        break 'registers;
                    }
                }
            }
        }
    }

    if return_found {
        let result = ip.heap.car(ip.heap.returns);
        ip.heap.pop(ip.heap.returns);
        ip.heap.pop(ip.heap.gcsafe);
        return Ok(Flow::Value(result));
    }
    ip.heap.pop(ip.heap.returns);
    ip.heap.push(frame, env)?;
    let flow = ip.eval(result_form, env, depth)?;
    ip.heap.pop(env);
    ip.heap.pop(ip.heap.gcsafe);
    Ok(flow)
}

/// `loop` runs its body forever; only a `return` leaves it.
pub fn loop_(ip: &mut Interp, sexpr: Addr, env: Addr, depth: usize) -> Result<Flow, OutOfMemory> {
    let placeholder = ip.heap.nil()?;
    ip.heap.push(placeholder, ip.heap.returns)?;
    loop {
        if let Flow::Return = ip.eval_sequence(ip.heap.cdr(sexpr), env, depth)? {
            break;
        }
    }
    let result = ip.heap.car(ip.heap.returns);
    ip.heap.pop(ip.heap.returns);
    Ok(Flow::Value(result))
}

/// Evaluate the return value, swap it for the placeholder on RETURNS, and
/// signal the unwind.
pub fn return_(ip: &mut Interp, sexpr: Addr, env: Addr, depth: usize) -> Result<Flow, OutOfMemory> {
    if ip.heap.length(ip.heap.returns) == 0 {
        return ip.fail(EvalError::NoReturnPoint {
            form: ip.heap.display(sexpr),
        });
    }
    let value = try_value!(ip.eval(ip.heap.car(ip.heap.cdr(sexpr)), env, depth)?);
    ip.heap.pop(ip.heap.returns);
    ip.heap.push(value, ip.heap.returns)?;
    Ok(Flow::Return)
}

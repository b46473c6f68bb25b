//! List operations: car, cdr, cons, list, append, length, nth, push, pop, mapcar
//!
//! `push` and `pop` mutate the list head in place. `append` copies its
//! arguments. `mapcar` indexes its lists in lockstep and stops at the first
//! NIL element an index lookup delivers.

use crate::error::{EvalError, OutOfMemory};
use crate::eval::{try_value, Flow, Interp};
use crate::heap::Addr;
use crate::lists::Cursor;

/// Shared handler for `car` and `cdr`, keyed by the operator name.
pub fn car_cdr(ip: &mut Interp, sexpr: Addr, env: Addr, depth: usize) -> Result<Flow, OutOfMemory> {
    let name = ip.heap.sym(ip.heap.car(sexpr)).unwrap_or_default().to_string();
    let args = ip.heap.cdr(sexpr);
    let list = try_value!(ip.eval(ip.heap.nth(args, 0), env, depth)?);
    if !ip.heap.is_cons(list) {
        return ip.fail(EvalError::form(
            &name,
            format!("Bad list: {}", ip.heap.display(list)),
        ));
    }
    if ip.heap.is_nil(list) {
        return Ok(Flow::Value(ip.heap.nil()?));
    }
    let result = if name.eq_ignore_ascii_case("car") {
        ip.heap.car(list)
    } else {
        ip.heap.cdr(list)
    };
    Ok(Flow::Value(result))
}

pub fn cons(ip: &mut Interp, sexpr: Addr, env: Addr, depth: usize) -> Result<Flow, OutOfMemory> {
    let args = ip.heap.cdr(sexpr);
    let head = try_value!(ip.eval(ip.heap.nth(args, 0), env, depth)?);
    ip.heap.push(head, ip.heap.gcsafe)?;
    let flow = ip.eval(ip.heap.nth(args, 1), env, depth)?;
    ip.heap.pop(ip.heap.gcsafe);
    let tail = try_value!(flow);
    Ok(Flow::Value(ip.heap.cons(head, tail)?))
}

pub fn list(ip: &mut Interp, sexpr: Addr, env: Addr, depth: usize) -> Result<Flow, OutOfMemory> {
    let args = ip.heap.cdr(sexpr);
    let result = ip.heap.nil()?;
    ip.heap.push(result, ip.heap.gcsafe)?;
    let mut cursor = Cursor::Start;
    while let Some(node) = ip.heap.traverse(args, &mut cursor) {
        let flow = ip.eval(ip.heap.car(node), env, depth)?;
        let value = match flow {
            Flow::Value(addr) => addr,
            Flow::Return => {
                ip.heap.pop(ip.heap.gcsafe);
                return Ok(Flow::Return);
            }
        };
        ip.heap.extend(result, value)?;
    }
    ip.heap.pop(ip.heap.gcsafe);
    Ok(Flow::Value(result))
}

/// Concatenate copies of the argument lists. A non-list argument stops the
/// walk; whatever was assembled so far is the result.
pub fn append(ip: &mut Interp, sexpr: Addr, env: Addr, depth: usize) -> Result<Flow, OutOfMemory> {
    let args = ip.heap.cdr(sexpr);
    if ip.heap.is_nil(args) {
        return Ok(Flow::Value(ip.heap.nil()?));
    }
    let mut result: Option<Addr> = None;
    let mut tail = 0;
    let mut cursor = Cursor::Start;
    while let Some(node) = ip.heap.traverse(args, &mut cursor) {
        let flow = ip.eval(ip.heap.car(node), env, depth)?;
        let item = match flow {
            Flow::Value(addr) => addr,
            Flow::Return => {
                if result.is_some() {
                    ip.heap.pop(ip.heap.gcsafe);
                }
                return Ok(Flow::Return);
            }
        };
        if !ip.heap.is_cons(item) {
            ip.report(&EvalError::form(
                "append",
                format!("Bad list: {}", ip.heap.display(item)),
            ));
            break;
        }
        if ip.heap.is_nil(item) {
            continue;
        }
        let copied = ip.heap.copy(item)?;
        match result {
            None => {
                ip.heap.push(copied, ip.heap.gcsafe)?;
                result = Some(copied);
                tail = copied;
            }
            Some(_) => ip.heap.set_cdr(tail, copied),
        }
        while !ip.heap.is_nil(ip.heap.cdr(tail)) {
            tail = ip.heap.cdr(tail);
        }
    }
    match result {
        None => Ok(Flow::Value(ip.heap.nil()?)),
        Some(list) => {
            ip.heap.pop(ip.heap.gcsafe);
            Ok(Flow::Value(list))
        }
    }
}

pub fn length(ip: &mut Interp, sexpr: Addr, env: Addr, depth: usize) -> Result<Flow, OutOfMemory> {
    let list = try_value!(ip.eval(ip.heap.nth(sexpr, 1), env, depth)?);
    if !ip.heap.is_cons(list) {
        return ip.fail(EvalError::form(
            "length",
            format!("Bad list {}", ip.heap.display(list)),
        ));
    }
    let count = ip.heap.length(list) as i64;
    Ok(Flow::Value(ip.heap.number(count)?))
}

pub fn nth(ip: &mut Interp, sexpr: Addr, env: Addr, depth: usize) -> Result<Flow, OutOfMemory> {
    let args = ip.heap.cdr(sexpr);
    let index_cell = try_value!(ip.eval(ip.heap.nth(args, 0), env, depth)?);
    let Some(index) = ip.heap.num(index_cell) else {
        return ip.fail(EvalError::form(
            "nth",
            format!("Bad index {}", ip.heap.display(index_cell)),
        ));
    };
    if index < 0 {
        return ip.fail(EvalError::form("nth", format!("Negative index {}", index)));
    }
    let list = try_value!(ip.eval(ip.heap.nth(args, 1), env, depth)?);
    if !ip.heap.is_cons(list) {
        return ip.fail(EvalError::form(
            "nth",
            format!("Bad list {}", ip.heap.display(list)),
        ));
    }
    let len = ip.heap.length(list);
    if index as usize >= len {
        return ip.fail(EvalError::form(
            "nth",
            format!("List only has {} items: {}", len, ip.heap.display(list)),
        ));
    }
    Ok(Flow::Value(ip.heap.nth(list, index as usize)))
}

pub fn push(ip: &mut Interp, sexpr: Addr, env: Addr, depth: usize) -> Result<Flow, OutOfMemory> {
    let item = try_value!(ip.eval(ip.heap.nth(sexpr, 1), env, depth)?);
    ip.heap.push(item, ip.heap.gcsafe)?;
    let flow = ip.eval(ip.heap.nth(sexpr, 2), env, depth)?;
    ip.heap.pop(ip.heap.gcsafe);
    let place = try_value!(flow);
    if !ip.heap.is_cons(place) {
        return ip.fail(EvalError::form(
            "push",
            format!("Place must be a list: {}", ip.heap.display(place)),
        ));
    }
    ip.heap.push(item, place)?;
    Ok(Flow::Value(place))
}

pub fn pop(ip: &mut Interp, sexpr: Addr, env: Addr, depth: usize) -> Result<Flow, OutOfMemory> {
    let list = try_value!(ip.eval(ip.heap.nth(sexpr, 1), env, depth)?);
    if !ip.heap.is_cons(list) {
        return ip.fail(EvalError::form(
            "pop",
            format!("Bad list {}", ip.heap.display(list)),
        ));
    }
    if ip.heap.is_nil(list) {
        return Ok(Flow::Value(ip.heap.nil()?));
    }
    let first = ip.heap.car(list);
    ip.heap.pop(list);
    Ok(Flow::Value(first))
}

/// Apply a function to the elements of one or more lists, index by index.
/// Computed elements are spliced back quoted so the synthesized call can be
/// evaluated without re-running them.
pub fn mapcar(ip: &mut Interp, sexpr: Addr, env: Addr, depth: usize) -> Result<Flow, OutOfMemory> {
    let fexpr = ip.heap.nth(sexpr, 1);
    let is_inline_lambda = ip.heap.is_cons(fexpr)
        && ip
            .heap
            .sym(ip.heap.car(fexpr))
            .is_some_and(|name| name.eq_ignore_ascii_case("lambda"));
    let function = if is_inline_lambda {
        fexpr
    } else {
        try_value!(ip.eval(fexpr, env, depth)?)
    };
    let lists = ip.heap.cdr(ip.heap.cdr(sexpr));
    let result = ip.heap.nil()?;
    ip.heap.push(result, ip.heap.gcsafe)?;
    ip.heap.push(function, ip.heap.gcsafe)?;
    let mut index = 0usize;
    loop {
        let row = ip.heap.nil()?;
        ip.heap.push(row, ip.heap.gcsafe)?;
        let mut exhausted = false;
        let mut cursor = Cursor::Start;
        while let Some(node) = ip.heap.traverse(lists, &mut cursor) {
            let flow = ip.eval(ip.heap.car(node), env, depth)?;
            let list = match flow {
                Flow::Value(addr) => addr,
                Flow::Return => {
                    ip.heap.pop(ip.heap.gcsafe);
                    ip.heap.pop(ip.heap.gcsafe);
                    ip.heap.pop(ip.heap.gcsafe);
                    return Ok(Flow::Return);
                }
            };
            if !ip.heap.is_cons(list) {
                ip.report(&EvalError::form(
                    "mapcar",
                    format!("Bad list {}", ip.heap.display(list)),
                ));
                ip.heap.pop(ip.heap.gcsafe);
                ip.heap.pop(ip.heap.gcsafe);
                ip.heap.pop(ip.heap.gcsafe);
                return Ok(Flow::Value(ip.heap.nil()?));
            }
            let item = ip.heap.nth(list, index);
            if ip.heap.is_nil(item) {
                exhausted = true;
                break;
            }
            ip.heap.extend(row, item)?;
        }
        if exhausted {
            ip.heap.pop(ip.heap.gcsafe);
            break;
        }
        // Quote every collected element in place: item -> (' item).
        let mut cursor = Cursor::Start;
        loop {
            let Some(node) = ip.heap.traverse(row, &mut cursor) else {
                break;
            };
            let mark = ip.heap.symbol("'")?;
            let item = ip.heap.car(node);
            let end = ip.heap.nil()?;
            let inner = ip.heap.cons(item, end)?;
            let quoted = ip.heap.cons(mark, inner)?;
            ip.heap.set_car(node, quoted);
        }
        let call = ip.heap.cons(function, row)?;
        ip.heap.push(call, ip.heap.gcsafe)?;
        let flow = ip.eval(call, env, depth)?;
        ip.heap.pop(ip.heap.gcsafe);
        ip.heap.pop(ip.heap.gcsafe);
        let value = match flow {
            Flow::Value(addr) => addr,
            Flow::Return => {
                ip.heap.pop(ip.heap.gcsafe);
                ip.heap.pop(ip.heap.gcsafe);
                return Ok(Flow::Return);
            }
        };
        ip.heap.extend(result, value)?;
        index += 1;
    }
    ip.heap.pop(ip.heap.gcsafe);
    ip.heap.pop(ip.heap.gcsafe);
    Ok(Flow::Value(result))
}

#[cfg(test)]
mod tests {
    use crate::eval::Interp;
    use crate::reader::{Parsed, Reader};

    fn run(src: &str) -> String {
        let mut interp = Interp::new(65536, 80).unwrap();
        run_in(&mut interp, src)
    }

    fn run_in(interp: &mut Interp, src: &str) -> String {
        let mut reader = Reader::from_line(src);
        let mut last = String::from("NIL");
        while let Ok(Parsed::Expr(addr)) = reader.parse(&mut interp.heap) {
            if !reader.ok() {
                break;
            }
            let result = interp.eval_top(addr).unwrap();
            last = interp.heap.display(result);
        }
        last
    }

    #[test]
    fn test_car_cdr() {
        assert_eq!(run("(car '(1 2 3))"), "1");
        assert_eq!(run("(cdr '(1 2 3))"), "(2 3)");
        assert_eq!(run("(car '())"), "NIL");
        assert_eq!(run("(cdr '())"), "NIL");
        assert_eq!(run("(car 5)"), "NIL");
    }

    #[test]
    fn test_cons_builds_pairs_and_lists() {
        assert_eq!(run("(cons 1 '(2 3))"), "(1 2 3)");
        assert_eq!(run("(cons 1 2)"), "(1 . 2)");
    }

    #[test]
    fn test_list_evaluates_elements() {
        assert_eq!(run("(list 1 (+ 1 1) 3)"), "(1 2 3)");
        assert_eq!(run("(list)"), "NIL");
    }

    #[test]
    fn test_append_copies_inputs() {
        let mut interp = Interp::new(65536, 80).unwrap();
        run_in(&mut interp, "(defvar a '(1 2))");
        assert_eq!(run_in(&mut interp, "(append a '(3 4))"), "(1 2 3 4)");
        assert_eq!(run_in(&mut interp, "a"), "(1 2)");
        assert_eq!(run_in(&mut interp, "(append)"), "NIL");
        assert_eq!(run_in(&mut interp, "(append '() '(1))"), "(1)");
    }

    #[test]
    fn test_length() {
        assert_eq!(run("(length '(a b c))"), "3");
        assert_eq!(run("(length '())"), "0");
        assert_eq!(run("(length 5)"), "NIL");
    }

    #[test]
    fn test_nth_bounds() {
        assert_eq!(run("(nth 0 '(a b c))"), "a");
        assert_eq!(run("(nth 2 '(a b c))"), "c");
        assert_eq!(run("(nth 3 '(a b c))"), "NIL");
        assert_eq!(run("(nth -1 '(a b c))"), "NIL");
        assert_eq!(run("(nth 'x '(a b c))"), "NIL");
    }

    #[test]
    fn test_push_and_pop_mutate_a_variable() {
        let mut interp = Interp::new(65536, 80).unwrap();
        run_in(&mut interp, "(defvar stack '(2 3))");
        assert_eq!(run_in(&mut interp, "(push 1 stack)"), "(1 2 3)");
        assert_eq!(run_in(&mut interp, "stack"), "(1 2 3)");
        assert_eq!(run_in(&mut interp, "(pop stack)"), "1");
        assert_eq!(run_in(&mut interp, "stack"), "(2 3)");
    }

    #[test]
    fn test_mapcar_with_quoted_lambda() {
        assert_eq!(run("(mapcar '(lambda (x) (* x x)) '(1 2 3 4))"), "(1 4 9 16)");
    }

    #[test]
    fn test_mapcar_with_defuned_function() {
        let mut interp = Interp::new(65536, 80).unwrap();
        run_in(&mut interp, "(defun inc (n) (+ n 1))");
        assert_eq!(run_in(&mut interp, "(mapcar 'inc '(1 2 3))"), "(2 3 4)");
    }

    #[test]
    fn test_mapcar_over_two_lists() {
        assert_eq!(run("(mapcar '+ '(1 2 3) '(10 20 30))"), "(11 22 33)");
    }

    #[test]
    fn test_mapcar_stops_at_shortest_list() {
        assert_eq!(run("(mapcar '+ '(1 2 3) '(10 20))"), "(11 22)");
    }

    #[test]
    fn test_mapcar_stops_at_nil_element() {
        // An explicit NIL element ends the iteration early.
        assert_eq!(run("(mapcar 'null '(1 () 3))"), "(NIL)");
    }
}

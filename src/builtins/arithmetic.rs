//! Arithmetic and numeric comparison: +, -, *, /, mod, =, <, >
//!
//! All numbers are signed 64-bit integers; `/` truncates toward zero and
//! `mod` takes the sign of the dividend. Overflow wraps silently.

use crate::error::{EvalError, OutOfMemory};
use crate::eval::{try_value, Flow, Interp};
use crate::heap::Addr;
use crate::lists::Cursor;

/// Fold `+`, `-`, `*` or `/` left over one or more evaluated numbers. A
/// single argument returns its own value.
pub fn fold(ip: &mut Interp, sexpr: Addr, env: Addr, depth: usize) -> Result<Flow, OutOfMemory> {
    let name = ip.heap.sym(ip.heap.car(sexpr)).unwrap_or_default().to_string();
    let args = ip.heap.cdr(sexpr);
    let mut acc: Option<i64> = None;
    let mut cursor = Cursor::Start;
    while let Some(node) = ip.heap.traverse(args, &mut cursor) {
        let value = try_value!(ip.eval(ip.heap.car(node), env, depth)?);
        let Some(number) = ip.heap.num(value) else {
            return ip.fail(EvalError::form(
                &name,
                format!("Bad number {}", ip.heap.display(ip.heap.car(node))),
            ));
        };
        acc = Some(match acc {
            None => number,
            Some(total) => match name.as_str() {
                "+" => total.wrapping_add(number),
                "-" => total.wrapping_sub(number),
                "*" => total.wrapping_mul(number),
                _ => {
                    if number == 0 {
                        return ip.fail(EvalError::form(&name, "Division by zero"));
                    }
                    total.wrapping_div(number)
                }
            },
        });
    }
    let result = ip.heap.number(acc.unwrap_or(0))?;
    Ok(Flow::Value(result))
}

pub fn compare(ip: &mut Interp, sexpr: Addr, env: Addr, depth: usize) -> Result<Flow, OutOfMemory> {
    let name = ip.heap.sym(ip.heap.car(sexpr)).unwrap_or_default().to_string();
    let args = ip.heap.cdr(sexpr);
    let first = try_value!(ip.eval(ip.heap.nth(args, 0), env, depth)?);
    ip.heap.push(first, ip.heap.gcsafe)?;
    let flow = ip.eval(ip.heap.nth(args, 1), env, depth)?;
    ip.heap.pop(ip.heap.gcsafe);
    let second = try_value!(flow);
    let (Some(a), Some(b)) = (ip.heap.num(first), ip.heap.num(second)) else {
        return ip.fail(EvalError::form(
            &name,
            format!("Bad numbers {}", ip.heap.display(sexpr)),
        ));
    };
    let holds = match name.as_str() {
        "=" => a == b,
        ">" => a > b,
        _ => a < b,
    };
    let result = if holds { ip.heap.t()? } else { ip.heap.nil()? };
    Ok(Flow::Value(result))
}

pub fn modulo(ip: &mut Interp, sexpr: Addr, env: Addr, depth: usize) -> Result<Flow, OutOfMemory> {
    let first = try_value!(ip.eval(ip.heap.nth(sexpr, 1), env, depth)?);
    ip.heap.push(first, ip.heap.gcsafe)?;
    let flow = ip.eval(ip.heap.nth(sexpr, 2), env, depth)?;
    ip.heap.pop(ip.heap.gcsafe);
    let second = try_value!(flow);
    let (Some(a), Some(b)) = (ip.heap.num(first), ip.heap.num(second)) else {
        return ip.fail(EvalError::form("mod", "Arguments must be integers"));
    };
    if b == 0 {
        return ip.fail(EvalError::form("mod", "Division by zero"));
    }
    let result = ip.heap.number(a.wrapping_rem(b))?;
    Ok(Flow::Value(result))
}

#[cfg(test)]
mod tests {
    use crate::eval::Interp;
    use crate::reader::{Parsed, Reader};

    fn run(src: &str) -> String {
        let mut interp = Interp::new(65536, 80).unwrap();
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
    fn test_addition_folds_all_arguments() {
        assert_eq!(run("(+ 1 2 3)"), "6");
        assert_eq!(run("(+ 10)"), "10");
    }

    #[test]
    fn test_subtraction_and_single_argument() {
        assert_eq!(run("(- 10 3 2)"), "5");
        // One argument folds to itself, without negation.
        assert_eq!(run("(- 5)"), "5");
    }

    #[test]
    fn test_multiplication_and_division() {
        assert_eq!(run("(* 2 3 4)"), "24");
        assert_eq!(run("(/ 20 4)"), "5");
        assert_eq!(run("(/ 7 2)"), "3");
        assert_eq!(run("(/ -7 2)"), "-3");
    }

    #[test]
    fn test_division_by_zero_is_soft() {
        assert_eq!(run("(/ 1 0)"), "NIL");
        assert_eq!(run("(mod 1 0)"), "NIL");
    }

    #[test]
    fn test_mod_takes_sign_of_dividend() {
        assert_eq!(run("(mod 7 3)"), "1");
        assert_eq!(run("(mod -7 3)"), "-1");
        assert_eq!(run("(mod 7 -3)"), "1");
    }

    #[test]
    fn test_comparisons() {
        assert_eq!(run("(= 3 3)"), "T");
        assert_eq!(run("(= 3 4)"), "NIL");
        assert_eq!(run("(< 1 2)"), "T");
        assert_eq!(run("(> 1 2)"), "NIL");
    }

    #[test]
    fn test_non_number_argument_is_an_error() {
        assert_eq!(run("(+ 1 'a)"), "NIL");
        assert_eq!(run("(< 'a 2)"), "NIL");
    }

    #[test]
    fn test_nested_arithmetic() {
        assert_eq!(run("(* (+ 1 2) 3)"), "9");
    }
}

//! Console I/O: print, prin1, terpri, read
//!
//! `print` emits a newline before the value and a space after it; `prin1`
//! emits the bare value. `read` takes one line from standard input and
//! parses it.

use crate::error::OutOfMemory;
use crate::eval::{try_value, Flow, Interp};
use crate::heap::Addr;
use crate::reader::{Parsed, Reader};
use std::io::{self, BufRead, Write};

/// Shared handler for `print` and `prin1`; both return their argument.
pub fn write(ip: &mut Interp, sexpr: Addr, env: Addr, depth: usize) -> Result<Flow, OutOfMemory> {
    let fresh_line = ip
        .heap
        .sym(ip.heap.car(sexpr))
        .is_some_and(|name| name.eq_ignore_ascii_case("print"));
    let args = ip.heap.cdr(sexpr);
    let item = try_value!(ip.eval(ip.heap.nth(args, 0), env, depth)?);
    if fresh_line {
        println!();
    }
    print!("{}", ip.heap.display(item));
    if fresh_line {
        print!(" ");
    }
    let _ = io::stdout().flush();
    Ok(Flow::Value(item))
}

pub fn terpri(ip: &mut Interp, _sexpr: Addr, _env: Addr, _depth: usize) -> Result<Flow, OutOfMemory> {
    println!();
    Ok(Flow::Value(ip.heap.nil()?))
}

pub fn read(ip: &mut Interp, _sexpr: Addr, _env: Addr, _depth: usize) -> Result<Flow, OutOfMemory> {
    let mut line = String::new();
    if io::stdin().lock().read_line(&mut line).is_err() {
        return Ok(Flow::Value(ip.heap.nil()?));
    }
    let mut reader = Reader::from_line(line.trim_end_matches(['\r', '\n']));
    let parsed = reader.parse(&mut ip.heap)?;
    match parsed {
        Parsed::Expr(addr) if reader.ok() => Ok(Flow::Value(addr)),
        _ => Ok(Flow::Value(ip.heap.nil()?)),
    }
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
    fn test_print_returns_its_argument() {
        assert_eq!(run("(print 42)"), "42");
        assert_eq!(run("(prin1 '(1 2))"), "(1 2)");
    }

    #[test]
    fn test_terpri_returns_nil() {
        assert_eq!(run("(terpri)"), "NIL");
    }
}

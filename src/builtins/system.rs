//! Observability and environment hooks: gc, dumpm, room, time, load, trace,
//! untrace
//!
//! `room` and `time` emit fixed-label lines so their output stays parseable.
//! Tracing flips a flag on a builtin table entry or records a user function
//! in TRACEDFUNCS.

use crate::builtins;
use crate::error::{EvalError, OutOfMemory};
use crate::eval::{try_value, Flow, Interp};
use crate::heap::Addr;
use crate::lists::Cursor;
use std::time::Instant;

pub fn gc(ip: &mut Interp, _sexpr: Addr, _env: Addr, _depth: usize) -> Result<Flow, OutOfMemory> {
    ip.heap.gc("At gc");
    Ok(Flow::Value(ip.heap.t()?))
}

pub fn dumpm(ip: &mut Interp, _sexpr: Addr, _env: Addr, _depth: usize) -> Result<Flow, OutOfMemory> {
    ip.heap.dump();
    Ok(Flow::Value(ip.heap.t()?))
}

pub fn room(ip: &mut Interp, _sexpr: Addr, _env: Addr, _depth: usize) -> Result<Flow, OutOfMemory> {
    println!(
        "Number of garbage collections...: {}",
        ip.heap.gc_count()
    );
    if ip.heap.gc_count() > 0 {
        println!("Conses marked by GC (last)......: {}", ip.heap.gc_marked());
        println!("Conses freed by GC (total)......: {}", ip.heap.gc_freed());
        println!("Time spent in GC (total)........: {} ms", ip.heap.gc_millis());
    }
    println!("Number of conses................: {}", ip.heap.capacity());
    println!("Bytes per cons..................: {}", ip.heap.bytes_per_cell());
    println!("Conses currently in use.........: {}", ip.heap.used());
    Ok(Flow::Value(ip.heap.t()?))
}

pub fn time(ip: &mut Interp, sexpr: Addr, env: Addr, depth: usize) -> Result<Flow, OutOfMemory> {
    let start = Instant::now();
    let used_before = ip.heap.used();
    let gcs_before = ip.heap.gc_count();
    let flow = ip.eval(ip.heap.nth(sexpr, 1), env, depth)?;
    println!("Run time.........: {} ms", start.elapsed().as_millis());
    if ip.heap.gc_count() == gcs_before {
        println!(
            "Cells created....: {}",
            ip.heap.used().saturating_sub(used_before)
        );
    } else {
        println!("GCs..............: {}", ip.heap.gc_count() - gcs_before);
    }
    Ok(flow)
}

pub fn load(ip: &mut Interp, sexpr: Addr, env: Addr, depth: usize) -> Result<Flow, OutOfMemory> {
    let args = ip.heap.cdr(sexpr);
    let name_cell = try_value!(ip.eval(ip.heap.nth(args, 0), env, depth)?);
    let Some(path) = ip.heap.sym(name_cell).map(str::to_string) else {
        return ip.fail(EvalError::form(
            "load",
            format!("Expected symbol at {}", ip.heap.display(name_cell)),
        ));
    };
    if !ip.load_file(&path, env)? {
        return ip.fail(EvalError::form("load", format!("Bad file {}", path)));
    }
    Ok(Flow::Value(ip.heap.t()?))
}

/// Shared handler for `trace` and `untrace`. With no arguments, lists the
/// currently traced names; with arguments, toggles each named function.
pub fn trace_toggle(ip: &mut Interp, sexpr: Addr, _env: Addr, _depth: usize) -> Result<Flow, OutOfMemory> {
    let which = ip.heap.sym(ip.heap.car(sexpr)).unwrap_or_default().to_string();
    let enable = which.eq_ignore_ascii_case("trace");
    let names = ip.heap.cdr(sexpr);

    if ip.heap.is_nil(names) {
        let result = ip.heap.nil()?;
        for index in 0..builtins::TABLE.len() {
            if ip.traced[index] {
                let cell = ip.heap.symbol(builtins::TABLE[index].name)?;
                ip.heap.push(cell, result)?;
            }
        }
        let mut keys = Vec::new();
        let mut cursor = Cursor::Start;
        while let Some(node) = ip.heap.traverse(ip.heap.tracedfuncs, &mut cursor) {
            keys.push(ip.heap.car(ip.heap.car(node)));
        }
        for key in keys {
            ip.heap.push(key, result)?;
        }
        return Ok(Flow::Value(result));
    }

    let mut cursor = Cursor::Start;
    while let Some(node) = ip.heap.traverse(names, &mut cursor) {
        let name_cell = ip.heap.car(node);
        let Some(name) = ip.heap.sym(name_cell).map(str::to_string) else {
            ip.report(&EvalError::form(
                &which,
                format!("Bad function name {}", ip.heap.display(name_cell)),
            ));
            return Ok(Flow::Value(ip.heap.t()?));
        };
        if let Some((index, _)) = builtins::lookup(&name) {
            ip.traced[index] = enable;
        } else if ip.heap.assoc_get(ip.heap.defuns, &name).is_some() {
            if enable {
                let mark = ip.heap.nil()?;
                ip.heap.assoc_set(ip.heap.tracedfuncs, &name, mark)?;
            } else {
                ip.heap.assoc_del(ip.heap.tracedfuncs, &name);
            }
        } else {
            ip.report(&EvalError::form(
                &which,
                format!("Function does not exist: {}", ip.heap.display(name_cell)),
            ));
            return Ok(Flow::Value(ip.heap.t()?));
        }
    }
    Ok(Flow::Value(ip.heap.t()?))
}

#[cfg(test)]
mod tests {
    use crate::eval::Interp;
    use crate::reader::{Parsed, Reader};
    use std::io::Write;

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
    fn test_gc_builtin_runs_a_collection() {
        let mut interp = Interp::new(65536, 80).unwrap();
        assert_eq!(interp.heap.gc_count(), 0);
        assert_eq!(run_in(&mut interp, "(gc)"), "T");
        assert_eq!(interp.heap.gc_count(), 1);
    }

    #[test]
    fn test_room_and_dumpm_return_t() {
        let mut interp = Interp::new(65536, 80).unwrap();
        assert_eq!(run_in(&mut interp, "(room)"), "T");
        assert_eq!(run_in(&mut interp, "(dumpm)"), "T");
    }

    #[test]
    fn test_time_passes_the_result_through() {
        let mut interp = Interp::new(65536, 80).unwrap();
        assert_eq!(run_in(&mut interp, "(time (+ 1 2))"), "3");
    }

    #[test]
    fn test_trace_and_untrace_user_function() {
        let mut interp = Interp::new(65536, 80).unwrap();
        run_in(&mut interp, "(defun f (x) x)");
        assert_eq!(run_in(&mut interp, "(trace f)"), "T");
        let listed = run_in(&mut interp, "(trace)");
        assert!(listed.contains('f'));
        // A traced call still computes its value.
        assert_eq!(run_in(&mut interp, "(f 3)"), "3");
        assert_eq!(run_in(&mut interp, "(untrace f)"), "T");
        assert_eq!(run_in(&mut interp, "(trace)"), "NIL");
    }

    #[test]
    fn test_trace_builtin_flag() {
        let mut interp = Interp::new(65536, 80).unwrap();
        run_in(&mut interp, "(trace car)");
        assert_eq!(run_in(&mut interp, "(car '(9 8))"), "9");
        run_in(&mut interp, "(untrace car)");
        assert_eq!(run_in(&mut interp, "(trace)"), "NIL");
    }

    #[test]
    fn test_trace_unknown_name_is_an_error() {
        let mut interp = Interp::new(65536, 80).unwrap();
        assert_eq!(run_in(&mut interp, "(trace no-such)"), "T");
    }

    #[test]
    fn test_load_missing_file_is_soft() {
        let mut interp = Interp::new(65536, 80).unwrap();
        assert_eq!(run_in(&mut interp, "(load 'no-such-file.lisp)"), "NIL");
    }

    #[test]
    fn test_load_evaluates_a_file() {
        let dir = std::env::temp_dir().join("arena-lisp-load-test");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("defs.lisp");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "; definitions").unwrap();
        writeln!(file, "(defvar loaded-value 41)").unwrap();
        writeln!(file, "(defun loaded-inc (n) ; trailing comment").unwrap();
        writeln!(file, "  (+ n 1))").unwrap();
        drop(file);

        let mut interp = Interp::new(65536, 80).unwrap();
        let form = format!("(load '{})", path.display());
        assert_eq!(run_in(&mut interp, &form), "T");
        assert_eq!(run_in(&mut interp, "(loaded-inc loaded-value)"), "42");
        let _ = std::fs::remove_file(&path);
    }
}

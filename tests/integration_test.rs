// ABOUTME: End-to-end tests driving source text through the reader and evaluator

use arena_lisp::builtins::predicates::values_equal;
use arena_lisp::eval::Interp;
use arena_lisp::heap::Addr;
use arena_lisp::reader::{Parsed, Reader};

fn setup() -> Interp {
    Interp::new(65536, 80).expect("arena")
}

/// Parse and evaluate every form in `src`; the printed form of the last
/// result is returned.
fn run(interp: &mut Interp, src: &str) -> String {
    let mut reader = Reader::from_line(src);
    let mut last = String::from("NIL");
    loop {
        match reader.parse(&mut interp.heap).expect("memory") {
            Parsed::Expr(addr) if reader.ok() => {
                let result = interp.eval_top(addr).expect("memory");
                last = interp.heap.display(result);
            }
            _ => break,
        }
    }
    last
}

fn parse_one(interp: &mut Interp, src: &str) -> Addr {
    let mut reader = Reader::from_line(src);
    match reader.parse(&mut interp.heap).expect("memory") {
        Parsed::Expr(addr) => addr,
        other => panic!("expected expression, got {:?}", other),
    }
}

#[test]
fn test_addition_scenario() {
    let mut interp = setup();
    assert_eq!(run(&mut interp, "(+ 1 2 3)"), "6");
}

#[test]
fn test_factorial_scenario() {
    let mut interp = setup();
    run(
        &mut interp,
        "(defun fact (n) (if (< n 2) 1 (* n (fact (- n 1)))))",
    );
    assert_eq!(run(&mut interp, "(fact 5)"), "120");
    assert_eq!(run(&mut interp, "(fact 10)"), "3628800");
}

#[test]
fn test_let_scenarios() {
    let mut interp = setup();
    assert_eq!(run(&mut interp, "(let ((x 1) (y 2)) (+ x y))"), "3");
    assert_eq!(run(&mut interp, "(let* ((x 1) (y (+ x 1))) y)"), "2");
}

#[test]
fn test_mapcar_scenario() {
    let mut interp = setup();
    assert_eq!(
        run(&mut interp, "(mapcar '(lambda (x) (* x x)) '(1 2 3 4))"),
        "(1 4 9 16)"
    );
}

#[test]
fn test_do_scenario() {
    let mut interp = setup();
    assert_eq!(
        run(&mut interp, "(do ((i 0 (+ i 1)) (s 0 (+ s i))) ((= i 5) s))"),
        "10"
    );
}

#[test]
fn test_loop_return_scenario() {
    let mut interp = setup();
    assert_eq!(run(&mut interp, "(loop (return 42))"), "42");
}

#[test]
fn test_equality_scenarios() {
    let mut interp = setup();
    assert_eq!(run(&mut interp, "(equal '(1 (2 3)) '(1 (2 3)))"), "T");
    assert_eq!(run(&mut interp, "(eq '(1 2) '(1 2))"), "NIL");
}

#[test]
fn test_defvar_defparameter_interaction() {
    let mut interp = setup();
    run(&mut interp, "(defparameter a 1)");
    run(&mut interp, "(defparameter a 2)");
    assert_eq!(run(&mut interp, "a"), "2");
    run(&mut interp, "(defvar a 3)");
    assert_eq!(run(&mut interp, "a"), "2");
}

#[test]
fn test_fboundp_tracks_defun() {
    let mut interp = setup();
    assert_eq!(run(&mut interp, "(fboundp 'fib)"), "NIL");
    run(&mut interp, "(defun fib (n) n)");
    assert_eq!(run(&mut interp, "(fboundp 'fib)"), "T");
}

#[test]
fn test_print_parse_round_trip() {
    let mut interp = setup();
    for src in ["42", "foo", "(1 2 3)", "(a (b 2) (() c))", "(1 (2 (3 (4))))"] {
        let first = parse_one(&mut interp, src);
        let printed = interp.heap.render(first);
        let reparsed = parse_one(&mut interp, &printed);
        assert!(
            values_equal(&interp.heap, first, reparsed, true),
            "round trip changed {} -> {}",
            src,
            printed
        );
    }
}

#[test]
fn test_quote_preserves_structure() {
    let mut interp = setup();
    assert_eq!(run(&mut interp, "(quote (a b (c)))"), "(a b (c))");
    assert_eq!(run(&mut interp, "'(a b (c))"), "(a b (c))");
}

#[test]
fn test_eval_quote_is_identity() {
    let mut interp = setup();
    assert_eq!(run(&mut interp, "(eval (quote (+ 2 2)))"), "4");
    assert_eq!(
        run(&mut interp, "(+ 2 2)"),
        run(&mut interp, "(eval '(+ 2 2))")
    );
}

#[test]
fn test_nth_boundaries_yield_nil() {
    let mut interp = setup();
    assert_eq!(run(&mut interp, "(nth -1 '(a b))"), "NIL");
    assert_eq!(run(&mut interp, "(nth 2 '(a b))"), "NIL");
}

#[test]
fn test_lambda_arity_mismatch_yields_nil() {
    let mut interp = setup();
    run(&mut interp, "(defun two (a b) (+ a b))");
    assert_eq!(run(&mut interp, "(two 1)"), "NIL");
    assert_eq!(run(&mut interp, "(two 1 2 3)"), "NIL");
    assert_eq!(run(&mut interp, "(two 1 2)"), "3");
}

#[test]
fn test_return_outside_any_block_yields_nil() {
    let mut interp = setup();
    assert_eq!(run(&mut interp, "(return 1)"), "NIL");
    assert_eq!(run(&mut interp, "(progn (return 1))"), "NIL");
}

#[test]
fn test_soft_errors_do_not_stop_the_session() {
    let mut interp = setup();
    assert_eq!(run(&mut interp, "(car 5)"), "NIL");
    assert_eq!(run(&mut interp, "(+ 1 (car 5))"), "NIL");
    assert_eq!(run(&mut interp, "(+ 1 2)"), "3");
}

#[test]
fn test_funcall_and_apply_compose() {
    let mut interp = setup();
    run(&mut interp, "(defun add3 (a b c) (+ a b c))");
    assert_eq!(run(&mut interp, "(funcall 'add3 1 2 3)"), "6");
    assert_eq!(run(&mut interp, "(apply 'add3 '(1 2 3))"), "6");
}

#[test]
fn test_cond_with_sequence_bodies() {
    let mut interp = setup();
    run(&mut interp, "(defvar hits 0)");
    assert_eq!(
        run(
            &mut interp,
            "(cond ((= 1 2) 'no) ((= 3 3) (setq hits (+ hits 1)) 'yes))"
        ),
        "yes"
    );
    assert_eq!(run(&mut interp, "hits"), "1");
}

#[test]
fn test_setf_places_end_to_end() {
    let mut interp = setup();
    run(&mut interp, "(defvar lst '(1 2 3))");
    run(&mut interp, "(setf (nth 0 lst) 9)");
    run(&mut interp, "(setf (cdr lst) '(7))");
    assert_eq!(run(&mut interp, "lst"), "(9 7)");
    run(&mut interp, "(setf lst 'plain)");
    assert_eq!(run(&mut interp, "lst"), "plain");
}

#[test]
fn test_dotted_pair_printing() {
    let mut interp = setup();
    assert_eq!(run(&mut interp, "(cons 'a 'b)"), "(a . b)");
    assert_eq!(run(&mut interp, "(cons 1 (cons 2 3))"), "(1 2 . 3)");
}

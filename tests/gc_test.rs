// ABOUTME: Collection behavior under allocation pressure on small arenas

use arena_lisp::eval::Interp;
use arena_lisp::reader::{Parsed, Reader};

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

#[test]
fn test_allocation_heavy_loop_survives_on_a_small_arena() {
    let mut interp = Interp::new(5000, 80).expect("arena");
    run(&mut interp, "(dotimes (i 100000) (cons i i))");
    assert!(interp.heap.gc_count() >= 1, "expected at least one GC");
    assert!(interp.heap.used() <= interp.heap.capacity());
}

#[test]
fn test_loop_result_is_correct_across_collections() {
    let mut interp = Interp::new(4000, 80).expect("arena");
    run(&mut interp, "(defvar total 0)");
    assert_eq!(
        run(
            &mut interp,
            "(dotimes (i 1000 total) (setq total (+ total (car (cons i i)))))"
        ),
        "499500"
    );
    assert!(interp.heap.gc_count() >= 1);
}

#[test]
fn test_globals_survive_collections() {
    let mut interp = Interp::new(3000, 80).expect("arena");
    run(&mut interp, "(defvar keep '(1 2 3))");
    run(&mut interp, "(defun keeper (x) (cons x keep))");
    run(&mut interp, "(dotimes (i 5000) (list i i i))");
    assert!(interp.heap.gc_count() >= 1);
    assert_eq!(run(&mut interp, "keep"), "(1 2 3)");
    assert_eq!(run(&mut interp, "(keeper 0)"), "(0 1 2 3)");
}

#[test]
fn test_gc_builtin_reclaims_garbage() {
    let mut interp = Interp::new(10000, 80).expect("arena");
    run(&mut interp, "(dotimes (i 100) (list i i i i))");
    let used_before = interp.heap.used();
    run(&mut interp, "(gc)");
    assert!(interp.heap.used() < used_before);
    assert!(interp.heap.gc_freed() > 0);
}

#[test]
fn test_live_data_is_never_swept() {
    let mut interp = Interp::new(2000, 70).expect("arena");
    run(&mut interp, "(defvar acc '())");
    // Grow a rooted list while garbage churns; every element must survive.
    run(&mut interp, "(dotimes (i 50) (push (list i) acc))");
    assert_eq!(run(&mut interp, "(length acc)"), "50");
    assert_eq!(run(&mut interp, "(car (car acc))"), "49");
}

// ABOUTME: Configuration and constants for the interpreter
// Arena capacity and the GC trigger are overridable from the CLI; the token
// and line caps are build-time constants.

pub const VERSION: &str = "1.0.0";

/// Number of cells in the arena. The first usable address is 1; address 0 is
/// reserved for the canonical NIL cons.
pub const MEMORY_CELLS: usize = 1_000_000;

/// Used-memory percentage above which the evaluator and reader trigger a
/// collection before doing more work.
pub const GC_TRIGGER_PCT: u32 = 80;

/// Maximum length of a single token accepted by the reader.
pub const MAX_TOKEN_LEN: usize = 100;

/// Maximum length of one input line (REPL or file).
pub const MAX_LINE_LEN: usize = 180;

pub const HISTORY_FILE: &str = ".arena_lisp_history";

pub const REPL_HELP: &str = "   Toplevel REPL. Percentage before prompt shows used memory.
   Ctrl-C returns to OS.
   +<enter> repeats last command.
   sexpr<enter> evals s-expression.";

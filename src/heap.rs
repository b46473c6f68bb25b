// ABOUTME: The cell arena and its mark/sweep garbage collector

use crate::error::OutOfMemory;
use std::time::Instant;

/// Index into the arena. Address 0 names the canonical NIL cons and is never
/// handed out by the allocator.
pub type Addr = u32;

pub const NIL: Addr = 0;

/// Payload of a cell. Every heap object is one of these three shapes; lists
/// are right-nested conses ending in a `(0,0)` cons.
#[derive(Debug, Clone, PartialEq)]
pub enum CellKind {
    Number(i64),
    Symbol(String),
    Cons(Addr, Addr),
}

#[derive(Debug, Clone)]
struct Cell {
    available: bool,
    mark: bool,
    kind: CellKind,
}

/// Fixed-capacity arena of uniformly sized cells, plus the five root
/// registers the collector traces from.
///
/// Allocation scans forward from a cursor for the first available slot and
/// never triggers a collection by itself; the evaluator and reader call
/// [`Heap::gc`] at their own checkpoints when [`Heap::over_trigger`] reports
/// pressure. When the scan runs off the end of the arena the allocator fails
/// with [`OutOfMemory`], which is fatal.
pub struct Heap {
    cells: Vec<Cell>,
    next: usize,
    used: usize,
    trigger_pct: u32,

    /// Global variable bindings (an assoc list).
    pub defvars: Addr,
    /// Function definitions, name -> (params . body) (an assoc list).
    pub defuns: Addr,
    /// Stack of addresses that must survive a collection.
    pub gcsafe: Addr,
    /// Stack backing the non-local `return` protocol.
    pub returns: Addr,
    /// Assoc list of user functions currently traced (values unused).
    pub tracedfuncs: Addr,

    gc_count: u32,
    gc_millis: u128,
    gc_freed: u64,
    gc_marked: u64,
}

impl Heap {
    pub fn new(capacity: usize, trigger_pct: u32) -> Result<Self, OutOfMemory> {
        if capacity < 16 {
            return Err(OutOfMemory);
        }
        let mut heap = Heap {
            cells: vec![
                Cell {
                    available: true,
                    mark: false,
                    kind: CellKind::Cons(NIL, NIL),
                };
                capacity
            ],
            next: 1,
            used: 0,
            trigger_pct,
            defvars: NIL,
            defuns: NIL,
            gcsafe: NIL,
            returns: NIL,
            tracedfuncs: NIL,
            gc_count: 0,
            gc_millis: 0,
            gc_freed: 0,
            gc_marked: 0,
        };
        // Address 0 is claimed up front so it always reads as a NIL cons.
        heap.cells[0].available = false;
        heap.defvars = heap.nil()?;
        heap.defuns = heap.nil()?;
        heap.gcsafe = heap.nil()?;
        heap.returns = heap.nil()?;
        heap.tracedfuncs = heap.nil()?;
        Ok(heap)
    }

    // ========================================================================
    // Allocation
    // ========================================================================

    fn claim(&mut self) -> Result<Addr, OutOfMemory> {
        while self.next < self.cells.len() && !self.cells[self.next].available {
            self.next += 1;
        }
        if self.next == self.cells.len() {
            return Err(OutOfMemory);
        }
        let addr = self.next as Addr;
        self.cells[self.next].available = false;
        self.next += 1;
        self.used += 1;
        Ok(addr)
    }

    pub fn cons(&mut self, car: Addr, cdr: Addr) -> Result<Addr, OutOfMemory> {
        let addr = self.claim()?;
        self.cells[addr as usize].kind = CellKind::Cons(car, cdr);
        Ok(addr)
    }

    /// A fresh `(0,0)` cons. NIL is matched structurally, so any number of
    /// NIL cells may coexist.
    pub fn nil(&mut self) -> Result<Addr, OutOfMemory> {
        self.cons(NIL, NIL)
    }

    pub fn number(&mut self, value: i64) -> Result<Addr, OutOfMemory> {
        let addr = self.claim()?;
        self.cells[addr as usize].kind = CellKind::Number(value);
        Ok(addr)
    }

    /// The name is copied. A token that reads as an optionally signed decimal
    /// integer is stored as a Number instead.
    pub fn symbol(&mut self, name: &str) -> Result<Addr, OutOfMemory> {
        if let Some(value) = numeric_value(name) {
            return self.number(value);
        }
        let addr = self.claim()?;
        self.cells[addr as usize].kind = CellKind::Symbol(name.to_string());
        Ok(addr)
    }

    /// Canonical true: a fresh symbol cell spelled `"T"`.
    pub fn t(&mut self) -> Result<Addr, OutOfMemory> {
        self.symbol("T")
    }

    // ========================================================================
    // Typed access
    // ========================================================================

    pub fn kind(&self, addr: Addr) -> &CellKind {
        &self.cells[addr as usize].kind
    }

    pub fn is_nil(&self, addr: Addr) -> bool {
        matches!(self.cells[addr as usize].kind, CellKind::Cons(NIL, NIL))
    }

    pub fn is_cons(&self, addr: Addr) -> bool {
        matches!(self.cells[addr as usize].kind, CellKind::Cons(..))
    }

    pub fn num(&self, addr: Addr) -> Option<i64> {
        match self.cells[addr as usize].kind {
            CellKind::Number(value) => Some(value),
            _ => None,
        }
    }

    pub fn sym(&self, addr: Addr) -> Option<&str> {
        match &self.cells[addr as usize].kind {
            CellKind::Symbol(name) => Some(name),
            _ => None,
        }
    }

    /// `car` of a cons; NIL for any other kind.
    pub fn car(&self, addr: Addr) -> Addr {
        match self.cells[addr as usize].kind {
            CellKind::Cons(car, _) => car,
            _ => NIL,
        }
    }

    /// `cdr` of a cons; NIL for any other kind.
    pub fn cdr(&self, addr: Addr) -> Addr {
        match self.cells[addr as usize].kind {
            CellKind::Cons(_, cdr) => cdr,
            _ => NIL,
        }
    }

    /// Writes to address 0 are ignored: the canonical NIL cell is immutable.
    pub fn set_car(&mut self, addr: Addr, value: Addr) {
        if addr == NIL {
            return;
        }
        if let CellKind::Cons(car, _) = &mut self.cells[addr as usize].kind {
            *car = value;
        }
    }

    pub fn set_cdr(&mut self, addr: Addr, value: Addr) {
        if addr == NIL {
            return;
        }
        if let CellKind::Cons(_, cdr) = &mut self.cells[addr as usize].kind {
            *cdr = value;
        }
    }

    // ========================================================================
    // Statistics
    // ========================================================================

    pub fn capacity(&self) -> usize {
        self.cells.len()
    }

    pub fn used(&self) -> usize {
        self.used
    }

    pub fn used_pct(&self) -> u32 {
        ((self.used * 100) / self.cells.len()) as u32
    }

    pub fn over_trigger(&self) -> bool {
        self.used_pct() > self.trigger_pct
    }

    pub fn gc_count(&self) -> u32 {
        self.gc_count
    }

    pub fn gc_millis(&self) -> u128 {
        self.gc_millis
    }

    pub fn gc_freed(&self) -> u64 {
        self.gc_freed
    }

    pub fn gc_marked(&self) -> u64 {
        self.gc_marked
    }

    pub fn bytes_per_cell(&self) -> usize {
        std::mem::size_of::<Cell>()
    }

    // ========================================================================
    // Collection
    // ========================================================================

    /// Mark/sweep collection: clear marks, mark everything reachable from the
    /// five root registers, release unmarked claimed cells, reset the
    /// allocation cursor to the bottom of the arena.
    pub fn gc(&mut self, why: &str) {
        self.gc_count += 1;
        let mark_start = Instant::now();
        for cell in &mut self.cells {
            cell.mark = false;
        }
        self.gc_marked = 0;
        for root in [
            self.defvars,
            self.defuns,
            self.gcsafe,
            self.returns,
            self.tracedfuncs,
        ] {
            self.mark(root);
        }
        println!("[   gc] {} >> Used mem: {}%", why, self.used_pct());
        let mark_ms = mark_start.elapsed().as_millis();
        let sweep_start = Instant::now();
        self.sweep();
        let sweep_ms = sweep_start.elapsed().as_millis();
        self.gc_millis += mark_ms + sweep_ms;
        println!("[   gc]    Mark/Sweep {}/{} ms", mark_ms, sweep_ms);
        println!("[   gc] << Used mem: {}%", self.used_pct());
        self.next = 1;
    }

    fn mark(&mut self, root: Addr) {
        let mut pending = vec![root];
        while let Some(addr) = pending.pop() {
            let cell = &mut self.cells[addr as usize];
            if cell.mark {
                continue;
            }
            cell.mark = true;
            self.gc_marked += 1;
            if let CellKind::Cons(car, cdr) = cell.kind {
                if (car == NIL) != (cdr == NIL) {
                    println!("[   gc] Internal mem error at {}", addr);
                    continue;
                }
                if car == NIL && cdr == NIL {
                    continue;
                }
                pending.push(car);
                pending.push(cdr);
            }
        }
    }

    fn sweep(&mut self) {
        let mut freed = 0usize;
        for cell in self.cells.iter_mut().skip(1) {
            if !cell.mark && !cell.available {
                cell.kind = CellKind::Cons(NIL, NIL);
                cell.available = true;
                freed += 1;
            }
            cell.mark = false;
        }
        self.cells[0].mark = false;
        self.used -= freed;
        self.gc_freed += freed as u64;
    }

    // ========================================================================
    // Printing
    // ========================================================================

    /// User-facing rendering: a NIL value prints as `NIL`, everything else as
    /// its s-expression form.
    pub fn display(&self, sexpr: Addr) -> String {
        if self.is_nil(sexpr) {
            "NIL".to_string()
        } else {
            self.render(sexpr)
        }
    }

    /// Raw s-expression rendering; a NIL cons prints as `()`.
    pub fn render(&self, sexpr: Addr) -> String {
        let mut out = String::new();
        self.render_into(sexpr, &mut out);
        out
    }

    fn render_into(&self, sexpr: Addr, out: &mut String) {
        match &self.cells[sexpr as usize].kind {
            CellKind::Number(value) => out.push_str(&value.to_string()),
            CellKind::Symbol(name) => out.push_str(name),
            CellKind::Cons(car, cdr) => {
                if self.is_nil(sexpr) {
                    out.push_str("()");
                    return;
                }
                out.push('(');
                self.render_into(*car, out);
                let mut tail = *cdr;
                loop {
                    if self.is_nil(tail) {
                        break;
                    }
                    match self.cells[tail as usize].kind {
                        CellKind::Cons(car, cdr) => {
                            out.push(' ');
                            self.render_into(car, out);
                            tail = cdr;
                        }
                        _ => {
                            out.push_str(" . ");
                            self.render_into(tail, out);
                            break;
                        }
                    }
                }
                out.push(')');
            }
        }
    }

    /// Memory dump: one line per claimed cell, free runs elided, root
    /// registers annotated.
    pub fn dump(&self) {
        let mut upper = self.cells.len() - 1;
        while upper > 0 && self.cells[upper].available {
            upper -= 1;
        }
        println!("{}", "*".repeat(16));
        println!(
            "Used {}/{} ({}%)",
            self.used,
            self.cells.len(),
            self.used_pct()
        );
        let mut in_free_run = false;
        for addr in 0..=upper {
            if addr == 0 {
                println!("{:04} NIL", addr);
                continue;
            }
            if self.cells[addr].available {
                in_free_run = true;
                continue;
            }
            if in_free_run {
                println!("....");
                in_free_run = false;
            }
            match &self.cells[addr].kind {
                CellKind::Symbol(name) => println!("{:04} S {}", addr, name),
                CellKind::Number(value) => println!("{:04} N {}", addr, value),
                CellKind::Cons(car, cdr) => {
                    let label = match addr as Addr {
                        a if a == self.defvars => " DEFVARS",
                        a if a == self.defuns => " DEFUNS",
                        a if a == self.gcsafe => " GCSAFE",
                        a if a == self.returns => " RETURNS",
                        a if a == self.tracedfuncs => " TRACEDFUNCS",
                        _ => "",
                    };
                    println!("{:04} C {:04} {:04}{}", addr, car, cdr, label);
                }
            }
        }
        println!("{}", "*".repeat(16));
    }
}

/// Numeric classification of a token: an optionally signed, non-empty digit
/// string. A lone `+` or `-` is a symbol.
fn numeric_value(token: &str) -> Option<i64> {
    let digits = token.strip_prefix(['+', '-']).unwrap_or(token);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    token.parse::<i64>().ok()
}

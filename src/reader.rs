// ABOUTME: Tokenizer and s-expression reader feeding the cell arena
// Every cell the reader creates during one top-level parse is pushed onto
// GCSAFE the moment it is allocated, and the same number of entries is popped
// when the parse finishes. A collection in the middle of a parse therefore
// cannot reclaim the partially built tree.

use nom::{
    branch::alt,
    bytes::complete::take_while1,
    character::complete::{char, multispace0},
    combinator::{map, value},
    sequence::preceded,
    IResult, Parser,
};

use crate::config::{MAX_LINE_LEN, MAX_TOKEN_LEN};
use crate::error::OutOfMemory;
use crate::heap::{Addr, Heap};
use std::fs::File;
use std::io::{BufRead, BufReader};

/// Result of one top-level parse step. `ListEnd` and `EndOfInput` replace the
/// out-of-band sentinel addresses of a flat address encoding; neither carries
/// a dereferenceable cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Parsed {
    Expr(Addr),
    ListEnd,
    EndOfInput,
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Open,
    Close,
    Quote,
    Atom(String),
}

fn atom_char(c: char) -> bool {
    !c.is_whitespace() && c != '(' && c != ')' && c != '\''
}

fn lex_token(input: &str) -> IResult<&str, Token> {
    preceded(
        multispace0,
        alt((
            value(Token::Open, char('(')),
            value(Token::Close, char(')')),
            value(Token::Quote, char('\'')),
            map(take_while1(atom_char), |text: &str| {
                Token::Atom(text.to_string())
            }),
        )),
    )
    .parse(input)
}

/// Reads s-expressions from a single line buffer (REPL) or an open file
/// (`load`), materializing them as cells. File lines are fetched on demand;
/// `;` starts a comment; lines are capped at the build-time maximum.
pub struct Reader {
    buf: String,
    pos: usize,
    file: Option<BufReader<File>>,
    ok: bool,
    created: usize,
}

impl Reader {
    pub fn from_line(line: &str) -> Self {
        let mut buf = line.to_string();
        cap_line(&mut buf);
        Reader {
            buf,
            pos: 0,
            file: None,
            ok: true,
            created: 0,
        }
    }

    pub fn from_file(file: File) -> Self {
        Reader {
            buf: String::new(),
            pos: 0,
            file: Some(BufReader::new(file)),
            ok: true,
            created: 0,
        }
    }

    /// False after a parse error or, for file input, at end of stream.
    pub fn ok(&self) -> bool {
        self.ok
    }

    /// Parse one top-level s-expression. Balances GCSAFE on every exit path.
    pub fn parse(&mut self, heap: &mut Heap) -> Result<Parsed, OutOfMemory> {
        self.ok = true;
        self.created = 0;
        let result = self.parse_at(heap, 0);
        for _ in 0..self.created {
            heap.pop(heap.gcsafe);
        }
        result
    }

    fn parse_at(&mut self, heap: &mut Heap, level: usize) -> Result<Parsed, OutOfMemory> {
        if heap.over_trigger() {
            heap.gc("At read");
        }
        match self.next_token() {
            None => Ok(Parsed::EndOfInput),
            Some(Token::Open) => {
                let list = self.parse_list(heap, level + 1)?;
                Ok(Parsed::Expr(list))
            }
            Some(Token::Close) => {
                if level == 0 {
                    println!("[error] read: Unexpected )");
                    self.ok = false;
                }
                Ok(Parsed::ListEnd)
            }
            Some(Token::Quote) => self.parse_quote(heap, level + 1),
            Some(Token::Atom(text)) => {
                let cell = self.tracked_symbol(heap, &text)?;
                Ok(Parsed::Expr(cell))
            }
        }
    }

    fn parse_list(&mut self, heap: &mut Heap, level: usize) -> Result<Addr, OutOfMemory> {
        match self.parse_at(heap, level)? {
            Parsed::EndOfInput => {
                println!("[error] read: Bad list");
                self.ok = false;
                self.tracked_nil(heap)
            }
            Parsed::ListEnd => self.tracked_nil(heap),
            Parsed::Expr(item) => {
                let rest = self.parse_list(heap, level)?;
                self.tracked_cons(heap, item, rest)
            }
        }
    }

    /// `'x` elaborates to the two-element list `(' x)`.
    fn parse_quote(&mut self, heap: &mut Heap, level: usize) -> Result<Parsed, OutOfMemory> {
        match self.parse_at(heap, level)? {
            Parsed::Expr(quoted) => {
                let mark = self.tracked_symbol(heap, "'")?;
                let end = self.tracked_nil(heap)?;
                let tail = self.tracked_cons(heap, quoted, end)?;
                let cell = self.tracked_cons(heap, mark, tail)?;
                Ok(Parsed::Expr(cell))
            }
            _ => {
                println!("[error] read: Bad quote");
                self.ok = false;
                let cell = self.tracked_nil(heap)?;
                Ok(Parsed::Expr(cell))
            }
        }
    }

    // ========================================================================
    // Tracked allocation
    // ========================================================================

    fn tracked_symbol(&mut self, heap: &mut Heap, text: &str) -> Result<Addr, OutOfMemory> {
        let cell = heap.symbol(text)?;
        self.track(heap, cell)
    }

    fn tracked_nil(&mut self, heap: &mut Heap) -> Result<Addr, OutOfMemory> {
        let cell = heap.nil()?;
        self.track(heap, cell)
    }

    fn tracked_cons(&mut self, heap: &mut Heap, car: Addr, cdr: Addr) -> Result<Addr, OutOfMemory> {
        let cell = heap.cons(car, cdr)?;
        self.track(heap, cell)
    }

    fn track(&mut self, heap: &mut Heap, cell: Addr) -> Result<Addr, OutOfMemory> {
        heap.push(cell, heap.gcsafe)?;
        self.created += 1;
        Ok(cell)
    }

    // ========================================================================
    // Tokens and input lines
    // ========================================================================

    fn next_token(&mut self) -> Option<Token> {
        loop {
            match lex_token(&self.buf[self.pos..]) {
                Ok((rest, token)) => {
                    self.pos = self.buf.len() - rest.len();
                    if let Token::Atom(text) = &token {
                        if text.len() > MAX_TOKEN_LEN {
                            println!("[error] read: Token too long");
                            self.ok = false;
                            return None;
                        }
                    }
                    return Some(token);
                }
                Err(_) => {
                    // Only whitespace left on the current line.
                    if !self.refill() {
                        return None;
                    }
                }
            }
        }
    }

    fn refill(&mut self) -> bool {
        let Some(file) = self.file.as_mut() else {
            return false;
        };
        loop {
            let mut line = String::new();
            match file.read_line(&mut line) {
                Ok(0) | Err(_) => {
                    self.ok = false;
                    return false;
                }
                Ok(_) => {}
            }
            while line.ends_with(['\r', '\n']) {
                line.pop();
            }
            cap_line(&mut line);
            if let Some(ix) = line.find(';') {
                line.truncate(ix);
            }
            announce_load(&line);
            if line.trim().is_empty() {
                continue;
            }
            self.buf = line;
            self.pos = 0;
            return true;
        }
    }
}

fn cap_line(line: &mut String) {
    if line.len() > MAX_LINE_LEN {
        let mut end = MAX_LINE_LEN;
        while !line.is_char_boundary(end) {
            end -= 1;
        }
        line.truncate(end);
    }
}

/// Load verbosity: echo defining lines, flagging forms that continue past the
/// end of the line.
fn announce_load(line: &str) {
    if !(line.contains("defun") || line.contains("defvar") || line.contains("defparameter")) {
        return;
    }
    let opens = line.matches('(').count();
    let closes = line.matches(')').count();
    if opens != closes {
        println!("[ load] {} ...", line);
    } else {
        println!("[ load] {}", line);
    }
}

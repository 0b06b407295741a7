// (C) 2026 Brandon Lewis
//
// The Grok machine.
//
// A program is a grid of characters. A pointer walks the grid one
// cell per step, wrapping at the edges, and every cell it lands on is
// dispatched against a value stack, a one-slot register, and the
// pointer's own direction. Execution is strictly synchronous; the
// host drives the loop and owns all I/O.
//
// *Termination*
//
// The set of halting conditions is the Error enum in this file. The
// quit instruction is one of them: stopping on purpose travels the
// same path as stopping on a fault, which keeps the driving loop a
// single Result pipeline. A valid program is one which terminates
// with Error::Halt.
//
// *Modes*
//
// Two collection modes sit in front of normal dispatch. Insert
// gathers characters destined for the stack until a backtick ends
// it. Regin gathers a number, or a single character, for the
// register. Orthogonal to both, a one-shot skip flag suppresses
// dispatch of exactly one upcoming cell, whatever it is.
//
// *Values*
//
// Integers and floats, nothing else. The value module holds the
// normalization rule that keeps exact integers integer-typed on the
// way out of the stack.
//
// *Cancellation*
//
// The host may flip a shared flag at any time; the machine notices at
// the next step boundary. The interactive input path reports ^C
// through the same channel.

use std::convert::TryFrom;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use log::trace;

use crate::grid::Grid;
use crate::stack::Stack;
use crate::value::Value;

// Everything that can stop the machine, including stopping on
// purpose.
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum Error {
    #[error("execution finished")]
    Halt,
    #[error("interrupted")]
    Interrupted,
    #[error("invalid instruction {0:?}")]
    IllegalInstruction(char),
    #[error("invalid number literal {0:?}")]
    IllegalNumber(String),
    #[error("no character with code point {0}")]
    IllegalCodepoint(i64),
    #[error("cannot index the stack by {0}")]
    IllegalCount(f64),
    #[error("division by zero")]
    DivideByZero,
    #[error("arithmetic overflow")]
    Overflow,
    #[error("end of input")]
    EndOfInput,
    #[error("the program contains no instructions")]
    EmptyProgram,
    #[error("i/o failure: {0}")]
    Io(String),
}

// The result of any operation.
pub type Result<T> = std::result::Result<T, Error>;

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Error {
        Error::Io(e.to_string())
    }
}

// The four directions the pointer can travel, named for the vi keys
// that select them.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Direction {
    Left,
    Down,
    Up,
    Right,
}

impl Direction {
    pub fn delta(self) -> (i64, i64) {
        match self {
            Direction::Left => (-1, 0),
            Direction::Down => (0, 1),
            Direction::Up => (0, -1),
            Direction::Right => (1, 0),
        }
    }

    // `}` turns this way when it pops a zero.
    pub fn clockwise(self) -> Direction {
        match self {
            Direction::Right => Direction::Down,
            Direction::Down => Direction::Left,
            Direction::Left => Direction::Up,
            Direction::Up => Direction::Right,
        }
    }

    // `{` turns this way when it pops a zero.
    pub fn counter_clockwise(self) -> Direction {
        match self {
            Direction::Right => Direction::Up,
            Direction::Up => Direction::Left,
            Direction::Left => Direction::Down,
            Direction::Down => Direction::Right,
        }
    }
}

// The three mutually exclusive parsing modes.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Mode {
    Normal,
    Insert,
    Regin,
}

// What one call to step did, for the host's tick policy: skipped
// cells and blanks don't count as work.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Step {
    Executed(char),
    Skipped,
}

// One line of user input. End-of-input and interrupts surface as
// distinct errors so the `:` instruction fails differently for each.
pub trait Input {
    fn read_line(&mut self) -> Result<String>;
}

// Where program output goes. Implementations must make each write
// visible promptly.
pub trait Output {
    fn write(&mut self, text: &str) -> Result<()>;
}

// The entire machine state for one execution.
pub struct Vm {
    grid: Grid,
    stack: Stack,
    register: Value,
    col: i64,
    row: i64,
    direction: Direction,
    mode: Mode,
    insert: String,
    regin: String,
    num_entered: bool,
    skip: bool,
    newline: Option<bool>,
    cancel: Arc<AtomicBool>,
}

impl Vm {
    pub fn new(grid: Grid) -> Vm {
        Vm {
            grid,
            stack: Stack::new(),
            register: Value::Int(0),
            col: -1,
            row: 0,
            direction: Direction::Right,
            mode: Mode::Normal,
            insert: String::new(),
            regin: String::new(),
            num_entered: false,
            skip: false,
            newline: None,
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    // Seed the stack before the program starts (the -s/-v flags).
    pub fn preload(&mut self, v: Value) {
        self.stack.push(v);
    }

    // A shareable flag that stops the machine at the next step
    // boundary.
    pub fn cancel_handle(&self) -> Arc<AtomicBool> {
        self.cancel.clone()
    }

    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::Relaxed);
    }

    pub fn stack(&self) -> &Stack {
        &self.stack
    }

    pub fn register(&self) -> Value {
        self.register
    }

    pub fn position(&self) -> (i64, i64) {
        (self.col, self.row)
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    // True when the program produced output whose last character was
    // not a newline. Hosts use this to leave the console on a fresh
    // line.
    pub fn needs_newline(&self) -> bool {
        self.newline == Some(false)
    }

    // Run the program until it halts.
    pub fn run(&mut self, input: &mut impl Input, output: &mut impl Output) -> Result<()> {
        loop {
            match self.step(input, output) {
                Err(Error::Halt) => return Ok(()),
                Err(e) => return Err(e),
                Ok(_) => continue,
            }
        }
    }

    // Advance the pointer one cell and dispatch whatever it lands on.
    pub fn step(&mut self, input: &mut impl Input, output: &mut impl Output) -> Result<Step> {
        if self.cancel.load(Ordering::Relaxed) {
            return Err(Error::Interrupted);
        }
        if self.grid.is_empty() {
            return Err(Error::EmptyProgram);
        }

        let (dcol, drow) = self.direction.delta();
        self.col += dcol;
        self.row += drow;

        if self.row > self.grid.max_row() {
            self.row = 0;
        } else if self.row < 0 {
            self.row = self.grid.max_row();
        }

        // Columns wrap only on horizontal motion. A vertical move into
        // a shorter row leaves the column out past the end, where the
        // cells read as blanks.
        if dcol == 1 && self.col > self.grid.max_col(self.row) {
            self.col = 0;
        } else if self.col < 0 {
            self.col = self.grid.max_col(self.row);
        }

        if self.skip {
            self.skip = false;
            return Ok(Step::Skipped);
        }

        let cell = self.grid.cell(self.row, self.col);
        let instruction = if cell == 0 {
            ' '
        } else {
            char::from_u32(cell).ok_or(Error::IllegalCodepoint(i64::from(cell)))?
        };

        trace!(
            "({}, {}) {:?} {:?}",
            self.col,
            self.row,
            instruction,
            self.stack
        );

        self.dispatch(instruction, input, output)?;
        Ok(Step::Executed(instruction))
    }

    // Mode-sensitive prelude: the collection modes see the character
    // first and usually consume it.
    fn dispatch(
        &mut self,
        instruction: char,
        input: &mut impl Input,
        output: &mut impl Output,
    ) -> Result<()> {
        match self.mode {
            Mode::Insert if instruction != '`' => {
                self.insert.push(instruction);
                return Ok(());
            }
            Mode::Insert => {
                self.flush_insert()?;
                self.mode = Mode::Normal;
                return Ok(());
            }
            Mode::Regin if instruction.is_ascii_digit() => {
                self.regin.push(instruction);
                self.num_entered = true;
                return Ok(());
            }
            Mode::Regin if instruction != '`' => {
                self.mode = Mode::Normal;
                if self.num_entered {
                    // The digits end here and the ending character
                    // executes normally below.
                    self.register = self.finish_regin()?;
                } else {
                    // A lone character loads its code point and is
                    // consumed.
                    self.register = Value::Int(instruction as i64);
                    return Ok(());
                }
            }
            Mode::Regin => {
                if self.num_entered {
                    self.register = self.finish_regin()?;
                }
                self.skip = true;
                self.mode = Mode::Normal;
                return Ok(());
            }
            Mode::Normal if instruction == '`' => {
                self.skip = true;
                return Ok(());
            }
            Mode::Normal => {}
        }

        self.execute(instruction, input, output)
    }

    // Normal-mode dispatch table.
    fn execute(
        &mut self,
        instruction: char,
        input: &mut impl Input,
        output: &mut impl Output,
    ) -> Result<()> {
        match instruction {
            'h' => self.direction = Direction::Left,
            'j' => self.direction = Direction::Down,
            'k' => self.direction = Direction::Up,
            'l' => self.direction = Direction::Right,

            '0'..='9' => {
                let digit = instruction as i64 - '0' as i64;
                self.stack.push(Value::Int(digit));
            }

            '+' => {
                let a = self.stack.pop();
                let b = self.stack.pop();
                self.stack.push(b.add(a)?);
            }
            '-' => {
                let a = self.stack.pop();
                let b = self.stack.pop();
                self.stack.push(b.sub(a)?);
            }
            '*' => {
                let a = self.stack.pop();
                let b = self.stack.pop();
                self.stack.push(b.mul(a)?);
            }
            '%' => {
                let a = self.stack.pop();
                let b = self.stack.pop();
                self.stack.push(b.rem(a)?);
            }
            '/' => {
                let a = self.stack.pop();
                let b = self.stack.pop();
                self.stack.push(b.div(a)?);
            }

            '=' => {
                let a = self.stack.pop();
                let b = self.stack.pop();
                self.stack.push(Value::Int(if b.eq(a) { 1 } else { 0 }));
            }
            '>' => {
                let a = self.stack.pop();
                let b = self.stack.pop();
                self.stack.push(Value::Int(if b.gt(a) { 1 } else { 0 }));
            }
            '!' => {
                let a = self.stack.pop();
                self.stack.push(Value::Int(if a.is_zero() { 1 } else { 0 }));
            }

            'i' => self.mode = Mode::Insert,
            'I' => self.mode = Mode::Regin,

            // Copy the ath value from the top into the register.
            'y' => {
                let index = match self.stack.pop() {
                    Value::Int(n) => (self.stack.len() as i64 - 1).checked_sub(n).unwrap_or(-1),
                    Value::Float(f) => return Err(Error::IllegalCount(f)),
                };
                self.register = self.stack.peek(index);
            }
            'Y' => self.register = self.stack.top(),

            'p' => {
                self.stack.push(self.register);
                self.register = Value::Int(0);
            }
            'P' => self.stack.push(self.register),

            'x' => {
                self.stack.pop();
            }
            'X' => self.register = Value::Int(0),

            // Discard a values, or with a zero count pop into the
            // register instead.
            'd' => match self.stack.pop() {
                Value::Int(0) => self.register = self.stack.pop(),
                Value::Int(n) => {
                    // A negative count discards nothing; popping past
                    // the bottom would only read zeros, so stop there.
                    let count = usize::try_from(n).unwrap_or(0).min(self.stack.len());
                    for _ in 0..count {
                        self.stack.pop();
                    }
                }
                Value::Float(f) => return Err(Error::IllegalCount(f)),
            },

            '}' => {
                if self.stack.pop().is_zero() {
                    self.direction = self.direction.clockwise();
                }
            }
            '{' => {
                if self.stack.pop().is_zero() {
                    self.direction = self.direction.counter_clockwise();
                }
            }

            'w' => {
                let c = codepoint(self.stack.pop().truncate())?;
                self.emit(&c.to_string(), output)?;
            }
            'W' => {
                let c = codepoint(self.register.truncate())?;
                self.emit(&c.to_string(), output)?;
                self.register = Value::Int(0);
            }
            'z' => {
                let v = self.stack.pop();
                self.emit(&v.to_string(), output)?;
            }
            'Z' => {
                let v = self.register.normalize();
                self.emit(&v.to_string(), output)?;
                self.register = Value::Int(0);
            }

            ':' => {
                let line = input.read_line()?;
                if line.chars().all(|c| c.is_ascii_digit()) {
                    let n = line.parse::<i64>().map_err(|_| Error::IllegalNumber(line))?;
                    self.stack.push(Value::Int(n));
                } else {
                    for c in line.chars().rev() {
                        self.stack.push(Value::Int(c as i64));
                    }
                }
            }

            'q' => return Err(Error::Halt),

            ' ' => {}

            other => return Err(Error::IllegalInstruction(other)),
        }

        Ok(())
    }

    // Empty the insert buffer onto the stack. A run of digits becomes
    // a single number; anything else goes character by character,
    // reversed, so that popping reads back the original order.
    fn flush_insert(&mut self) -> Result<()> {
        let buffer = std::mem::take(&mut self.insert);
        if buffer.chars().all(|c| c.is_ascii_digit()) {
            let n = buffer
                .parse::<i64>()
                .map_err(|_| Error::IllegalNumber(buffer))?;
            self.stack.push(Value::Int(n));
        } else {
            for c in buffer.chars().rev() {
                self.stack.push(Value::Int(c as i64));
            }
        }
        Ok(())
    }

    // Parse the digits accumulated while in regin mode.
    fn finish_regin(&mut self) -> Result<Value> {
        self.num_entered = false;
        let digits = std::mem::take(&mut self.regin);
        let n = digits
            .parse::<i64>()
            .map_err(|_| Error::IllegalNumber(digits))?;
        Ok(Value::Int(n))
    }

    // All program output funnels through here so the trailing-newline
    // state stays accurate.
    fn emit(&mut self, text: &str, output: &mut impl Output) -> Result<()> {
        self.newline = Some(text.ends_with('\n'));
        output.write(text)
    }
}

fn codepoint(n: i64) -> Result<char> {
    u32::try_from(n)
        .ok()
        .and_then(char::from_u32)
        .ok_or(Error::IllegalCodepoint(n))
}

// These tests are written against the behavior of the machine: a
// program goes in, and the output, the stack, or the register comes
// out. Any conforming implementation should pass them.
#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value::*;

    impl Output for String {
        fn write(&mut self, text: &str) -> Result<()> {
            self.push_str(text);
            Ok(())
        }
    }

    // Canned input lines.
    struct Lines(Vec<&'static str>);

    impl Input for Lines {
        fn read_line(&mut self) -> Result<String> {
            if self.0.is_empty() {
                Err(Error::EndOfInput)
            } else {
                Ok(self.0.remove(0).to_string())
            }
        }
    }

    fn eval_with(source: &str, mut input: Lines) -> (Vm, String, Result<()>) {
        let mut vm = Vm::new(Grid::load(source));
        let mut out = String::new();
        let status = vm.run(&mut input, &mut out);
        (vm, out, status)
    }

    fn eval(source: &str) -> (Vm, String, Result<()>) {
        eval_with(source, Lines(vec![]))
    }

    // Assert that a program halts cleanly and prints `expected`.
    fn assert_prints(source: &str, expected: &str) {
        let (_, out, status) = eval(source);
        assert_eq!(status, Ok(()));
        assert_eq!(out, expected);
    }

    fn assert_fails(source: &str, expected: Error) {
        let (_, _, status) = eval(source);
        assert_eq!(status, Err(expected));
    }

    #[test]
    fn quit_terminates_immediately() {
        assert_prints("q", "");
    }

    #[test]
    fn digits_push_and_z_prints() {
        assert_prints("1z23zzq", "132");
    }

    #[test]
    fn empty_program_cannot_run() {
        assert_fails("", Error::EmptyProgram);
    }

    #[test]
    fn unknown_characters_are_fatal() {
        assert_fails("b", Error::IllegalInstruction('b'));
    }

    // Insert mode.

    #[test]
    fn insert_pushes_a_digit_run_as_one_number() {
        assert_prints("i123`zq", "123");
    }

    #[test]
    fn insert_pushes_text_reversed_for_reading_back() {
        assert_prints("ihi`wwq", "hi");
    }

    #[test]
    fn insert_buffers_blanks_too() {
        assert_prints("i a`wwq", " a");
    }

    #[test]
    fn insert_with_an_empty_buffer_is_fatal() {
        assert_fails("i`q", Error::IllegalNumber(String::new()));
    }

    // Regin mode.

    #[test]
    fn regin_accumulates_digits_into_the_register() {
        let (vm, _, status) = eval("I42Pzq");
        assert_eq!(status, Ok(()));
        assert_eq!(vm.register(), Int(42));
    }

    #[test]
    fn regin_finishes_on_a_non_digit_and_dispatches_it() {
        assert_prints("I42Pzq", "42");
    }

    #[test]
    fn regin_loads_a_lone_character_and_consumes_it() {
        assert_prints("IaPzq", "97");
    }

    #[test]
    fn regin_backtick_sets_skip() {
        // The skip eats the P, so z prints a popped zero.
        assert_prints("I5`Pzq", "0");
        // With a cell in between for the skip to consume, P lands.
        assert_prints("I5` Pzq", "5");
    }

    // Skip.

    #[test]
    fn backtick_skips_exactly_one_cell() {
        assert_prints("1`xzq", "1");
        assert_prints("`1zq", "0");
    }

    #[test]
    fn step_reports_skips_and_blanks() {
        let mut vm = Vm::new(Grid::load("` q"));
        let mut input = Lines(vec![]);
        let mut out = String::new();
        assert_eq!(vm.step(&mut input, &mut out), Ok(Step::Executed('`')));
        assert_eq!(vm.step(&mut input, &mut out), Ok(Step::Skipped));
        assert_eq!(vm.step(&mut input, &mut out), Err(Error::Halt));
    }

    // Arithmetic.

    #[test]
    fn arithmetic_works_on_the_top_two() {
        assert_prints("34+zq", "7");
        assert_prints("35-zq", "-2");
        assert_prints("34*zq", "12");
    }

    #[test]
    fn division_prints_clean_integers_without_the_point() {
        assert_prints("82/zq", "4");
        assert_prints("85/zq", "1.6");
    }

    #[test]
    fn division_by_zero_is_fatal() {
        assert_fails("10/q", Error::DivideByZero);
        assert_fails("50%q", Error::DivideByZero);
    }

    #[test]
    fn division_the_other_way_round_is_fine() {
        assert_prints("01/zq", "0");
    }

    #[test]
    fn modulo_is_floored() {
        // 0 - 5 = -5, then -5 % 3 = 1.
        assert_prints("05-3%zq", "1");
    }

    #[test]
    fn comparisons_push_one_or_zero() {
        assert_prints("23>zq", "0");
        assert_prints("32>zq", "1");
        assert_prints("33=zq", "1");
        assert_prints("34=zq", "0");
        assert_prints("0!zq", "1");
        assert_prints("5!zq", "0");
    }

    // Stack and register instructions.

    #[test]
    fn popping_an_empty_stack_reads_zero() {
        assert_prints("zq", "0");
        assert_prints("xq", "");
    }

    #[test]
    fn x_discards_the_top() {
        assert_prints("12xzq", "1");
    }

    #[test]
    fn y_copies_by_depth_into_the_register() {
        let (vm, _, status) = eval("4561yq");
        assert_eq!(status, Ok(()));
        assert_eq!(vm.register(), Int(5));
        assert_eq!(vm.stack().len(), 3);
    }

    #[test]
    fn upper_y_copies_the_top_into_the_register() {
        let (vm, _, status) = eval("45Yq");
        assert_eq!(status, Ok(()));
        assert_eq!(vm.register(), Int(5));
        assert_eq!(vm.stack().len(), 2);
    }

    #[test]
    fn p_moves_the_register_and_clears_it() {
        assert_prints("I7` pzZq", "70");
    }

    #[test]
    fn upper_x_clears_the_register() {
        assert_prints("I7` XPzq", "0");
    }

    #[test]
    fn upper_z_prints_and_clears() {
        assert_prints("I7` ZZq", "70");
    }

    #[test]
    fn upper_w_prints_the_register_as_a_character() {
        assert_prints("I65` Wq", "A");
    }

    #[test]
    fn d_with_a_count_discards_that_many() {
        let (vm, _, status) = eval("12342dq");
        assert_eq!(status, Ok(()));
        assert_eq!(vm.stack().len(), 2);
    }

    #[test]
    fn d_with_zero_pops_into_the_register() {
        let (vm, _, status) = eval("1230dq");
        assert_eq!(status, Ok(()));
        assert_eq!(vm.register(), Int(3));
        assert_eq!(vm.stack().len(), 2);
    }

    #[test]
    fn d_with_a_negative_count_discards_nothing() {
        let (vm, _, status) = eval("01-dq");
        assert_eq!(status, Ok(()));
        assert_eq!(vm.stack().len(), 0);
    }

    // Directions and wrapping.

    #[test]
    fn close_brace_turns_clockwise_on_zero() {
        // Right becomes down, landing on the q below.
        assert_prints("}\nq", "");
    }

    #[test]
    fn open_brace_turns_counter_clockwise_on_zero() {
        // Right becomes up, wrapping off the top onto the last row.
        assert_prints("{\nq", "");
    }

    #[test]
    fn braces_do_not_turn_on_a_nonzero_pop() {
        let (vm, _, status) = eval("1}q");
        assert_eq!(status, Ok(()));
        assert_eq!(vm.direction(), Direction::Right);
        assert!(vm.stack().is_empty());
    }

    #[test]
    fn moving_left_wraps_to_the_end_of_the_row() {
        let (vm, _, status) = eval("hzq1");
        assert_eq!(status, Ok(()));
        // h sends the pointer left off the edge onto the trailing 1,
        // which pushes; the pointer then halts on q before reaching z.
        assert_eq!(vm.stack().peek(0), Int(1));
        assert_eq!(vm.stack().len(), 1);
    }

    #[test]
    fn vertical_motion_preserves_the_column() {
        let mut vm = Vm::new(Grid::load("  j\nq"));
        let mut input = Lines(vec![]);
        let mut out = String::new();
        for _ in 0..3 {
            vm.step(&mut input, &mut out).unwrap();
        }
        assert_eq!(vm.position(), (2, 0));
        // Down into a one-cell row: the column stays out past the
        // end and the cell there reads as a blank.
        assert_eq!(vm.step(&mut input, &mut out), Ok(Step::Executed(' ')));
        assert_eq!(vm.position(), (2, 1));
        assert_eq!(vm.direction(), Direction::Down);
    }

    // Input.

    #[test]
    fn input_digits_arrive_as_one_number() {
        let (_, out, status) = eval_with(":zq", Lines(vec!["42"]));
        assert_eq!(status, Ok(()));
        assert_eq!(out, "42");
    }

    #[test]
    fn input_text_reads_back_in_order() {
        let (_, out, status) = eval_with(":wwq", Lines(vec!["ab"]));
        assert_eq!(status, Ok(()));
        assert_eq!(out, "ab");
    }

    #[test]
    fn input_at_end_of_input_is_fatal() {
        assert_fails(":q", Error::EndOfInput);
    }

    #[test]
    fn an_empty_input_line_is_fatal() {
        let (_, _, status) = eval_with(":q", Lines(vec![""]));
        assert_eq!(status, Err(Error::IllegalNumber(String::new())));
    }

    // Host concerns.

    #[test]
    fn cancellation_stops_the_next_step() {
        let mut vm = Vm::new(Grid::load("q"));
        vm.cancel_handle().store(true, Ordering::Relaxed);
        let mut input = Lines(vec![]);
        let mut out = String::new();
        assert_eq!(vm.step(&mut input, &mut out), Err(Error::Interrupted));
    }

    #[test]
    fn preloaded_floats_normalize_on_pop() {
        let mut vm = Vm::new(Grid::load("zq"));
        vm.preload(Float(97.0));
        let mut input = Lines(vec![]);
        let mut out = String::new();
        assert_eq!(vm.run(&mut input, &mut out), Ok(()));
        assert_eq!(out, "97");
    }

    #[test]
    fn newline_tracking_follows_the_last_emission() {
        let (vm, _, _) = eval("q");
        assert!(!vm.needs_newline());

        let (vm, _, _) = eval("1zq");
        assert!(vm.needs_newline());

        // 2 * 5 = 10 is a line feed.
        let (vm, out, _) = eval("25*wq");
        assert_eq!(out, "\n");
        assert!(!vm.needs_newline());
    }
}

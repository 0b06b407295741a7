// Grok: an interpreter for the Grok programming language.
//
// Copyright (C) 2026  Brandon Lewis
//
// This program is free software: you can redistribute it and/or
// modify it under the terms of the GNU Lesser General Public License
// as published by the Free Software Foundation, either version 3 of
// the License, or (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the GNU
// Lesser General Public License for more details.
//
// You should have received a copy of the GNU Lesser General Public
// License along with this program.  If not, see
// <https://www.gnu.org/licenses/>.

// Console adapters for the machine's Input and Output traits.
//
// Interactive input works the way the original console does: a `> `
// prompt, raw-mode reads with manual echo, LF or CR ending the line,
// and a raw ^C byte surfacing as an interrupt instead of killing the
// process mid-read. Prompt and echo go straight to the console and
// stay out of the interpreter's trailing-newline accounting.

use std::io::{self, IsTerminal, Read, Write};

use nix::sys::termios::{self, LocalFlags, SetArg, Termios};

use crate::vm::{Error, Input, Output, Result};

// Program input from stdin: interactive when stdin is a terminal,
// line-at-a-time when it is a pipe.
pub struct ReadSource {
    interactive: bool,
}

impl ReadSource {
    pub fn new() -> ReadSource {
        ReadSource {
            interactive: io::stdin().is_terminal(),
        }
    }
}

impl Input for ReadSource {
    fn read_line(&mut self) -> Result<String> {
        if self.interactive {
            read_console_line()
        } else {
            read_piped_line()
        }
    }
}

// One line from a pipe. A read of nothing means the input is
// exhausted, and so does an empty line.
fn read_piped_line() -> Result<String> {
    let mut line = String::new();
    let n = io::stdin().read_line(&mut line)?;
    if n == 0 {
        return Err(Error::EndOfInput);
    }
    while line.ends_with('\n') || line.ends_with('\r') {
        line.pop();
    }
    if line.is_empty() {
        Err(Error::EndOfInput)
    } else {
        Ok(line)
    }
}

fn read_console_line() -> Result<String> {
    let mut stdout = io::stdout();
    stdout.write_all(b"> ")?;
    stdout.flush()?;

    let _raw = RawMode::enter()?;
    let mut bytes = Vec::new();
    let mut buf = [0u8; 1];

    loop {
        io::stdin().read_exact(&mut buf)?;
        match buf[0] {
            // ^C arrives as a plain byte with ISIG off.
            3 => {
                stdout.write_all(b"^C")?;
                stdout.flush()?;
                return Err(Error::Interrupted);
            }
            b'\n' | b'\r' => break,
            byte => {
                bytes.push(byte);
                stdout.write_all(&[byte])?;
                stdout.flush()?;
            }
        }
    }

    stdout.write_all(b"\n")?;
    stdout.flush()?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

// Puts the terminal into raw mode for the duration of one read,
// restoring the previous state on every exit path.
struct RawMode {
    saved: Termios,
}

impl RawMode {
    fn enter() -> Result<RawMode> {
        let stdin = io::stdin();
        let saved = termios::tcgetattr(&stdin).map_err(nix_err)?;
        let mut raw = saved.clone();
        raw.local_flags &= !(LocalFlags::ICANON | LocalFlags::ECHO | LocalFlags::ISIG);
        termios::tcsetattr(&stdin, SetArg::TCSADRAIN, &raw).map_err(nix_err)?;
        Ok(RawMode { saved })
    }
}

impl Drop for RawMode {
    fn drop(&mut self) {
        let _ = termios::tcsetattr(&io::stdin(), SetArg::TCSADRAIN, &self.saved);
    }
}

fn nix_err(e: nix::Error) -> Error {
    Error::Io(e.to_string())
}

// Program output over any writer, flushed after every write so the
// host observes each emission promptly.
pub struct WriteSink<W: Write> {
    inner: W,
}

impl<W: Write> WriteSink<W> {
    pub fn new(inner: W) -> WriteSink<W> {
        WriteSink { inner }
    }
}

impl<W: Write> Output for WriteSink<W> {
    fn write(&mut self, text: &str) -> Result<()> {
        self.inner.write_all(text.as_bytes())?;
        self.inner.flush()?;
        Ok(())
    }
}

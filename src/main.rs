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

use std::fs;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::Context;
use clap::{value_parser, Arg, ArgAction, ArgGroup, ArgMatches, Command};
use nix::libc;
use nix::sys::signal::{self, SaFlags, SigAction, SigHandler, SigSet, Signal};

use grok::clock::Ticker;
use grok::grid::Grid;
use grok::io::{ReadSource, WriteSink};
use grok::value::Value;
use grok::vm::{Error, Vm};

// Set from the signal handler, drained into the machine's
// cancellation flag at the top of the run loop.
static INTERRUPTED: AtomicBool = AtomicBool::new(false);

extern "C" fn on_sigint(_: libc::c_int) {
    INTERRUPTED.store(true, Ordering::Relaxed);
}

fn cli() -> Command {
    Command::new("grok")
        .about("Execute a Grok script.")
        .arg(
            Arg::new("script")
                .value_name("FILE")
                .help(".grk file to execute"),
        )
        .arg(
            Arg::new("code")
                .short('c')
                .long("code")
                .value_name("CODE")
                .help("string of instructions to execute"),
        )
        .group(
            ArgGroup::new("program")
                .args(["script", "code"])
                .required(true),
        )
        .arg(
            Arg::new("string")
                .short('s')
                .long("string")
                .value_name("STRING")
                .action(ArgAction::Append)
                .help("push each character of STRING onto the stack before execution starts"),
        )
        .arg(
            Arg::new("value")
                .short('v')
                .long("value")
                .value_name("NUMBER")
                .num_args(1..)
                .action(ArgAction::Append)
                .allow_negative_numbers(true)
                .value_parser(value_parser!(f64))
                .help("push numbers onto the stack before execution starts"),
        )
        .arg(
            Arg::new("tick")
                .short('t')
                .long("tick")
                .value_name("SECONDS")
                .default_value("0")
                .value_parser(value_parser!(f64))
                .help("delay between the execution of each instruction"),
        )
        .arg(
            Arg::new("always-tick")
                .short('a')
                .long("always-tick")
                .action(ArgAction::SetTrue)
                .help("delay on every step, even whitespace and skipped instructions"),
        )
        .arg(
            Arg::new("show-errors")
                .short('e')
                .long("show-errors")
                .action(ArgAction::SetTrue)
                .help("show the true error message instead of \"You don't grok Grok.\""),
        )
}

// The -s and -v flags may interleave, and their combined stack effect
// preserves command-line order. Everything arrives as a float; values
// normalize when they leave the stack.
fn preloads(matches: &ArgMatches) -> Vec<Value> {
    let mut groups: Vec<(usize, Vec<Value>)> = Vec::new();

    if let Some(strings) = matches.get_many::<String>("string") {
        let indices = matches.indices_of("string").expect("indices for -s");
        for (index, string) in indices.zip(strings) {
            let values = string
                .chars()
                .map(|c| Value::Float(c as u32 as f64))
                .collect();
            groups.push((index, values));
        }
    }

    if let Some(numbers) = matches.get_many::<f64>("value") {
        let indices = matches.indices_of("value").expect("indices for -v");
        for (index, n) in indices.zip(numbers) {
            groups.push((index, vec![Value::Float(*n)]));
        }
    }

    groups.sort_by_key(|group| group.0);
    groups.into_iter().flat_map(|group| group.1).collect()
}

// Forward SIGINT into a flag the run loop polls, so a piped program
// stops at a step boundary the same way an interactive ^C does.
fn install_sigint_handler() {
    let action = SigAction::new(
        SigHandler::Handler(on_sigint),
        SaFlags::empty(),
        SigSet::empty(),
    );
    unsafe {
        let _ = signal::sigaction(Signal::SIGINT, &action);
    }
}

// Leave the console on a fresh line, but only if the program printed
// something that didn't end with one.
fn finish(vm: &Vm) {
    if vm.needs_newline() {
        eprintln!();
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let matches = cli().get_matches();

    let code = match matches.get_one::<String>("script") {
        Some(path) => {
            fs::read_to_string(path).with_context(|| format!("couldn't read {}", path))?
        }
        None => matches
            .get_one::<String>("code")
            .cloned()
            .unwrap_or_default(),
    };

    let mut vm = Vm::new(Grid::load(&code));
    for value in preloads(&matches) {
        vm.preload(value);
    }

    let ticker = Ticker::new(
        *matches.get_one::<f64>("tick").expect("tick has a default"),
        matches.get_flag("always-tick"),
    );
    let show_errors = matches.get_flag("show-errors");

    install_sigint_handler();

    let mut input = ReadSource::new();
    let mut output = WriteSink::new(io::stdout());

    loop {
        if INTERRUPTED.load(Ordering::Relaxed) {
            vm.cancel();
        }

        match vm.step(&mut input, &mut output) {
            Ok(step) => ticker.wait(step),
            Err(Error::Halt) => {
                finish(&vm);
                return Ok(());
            }
            Err(Error::Interrupted) => {
                eprintln!();
                return Ok(());
            }
            Err(error) => {
                if show_errors {
                    return Err(error.into());
                }
                finish(&vm);
                eprintln!("You don't grok Grok.");
                return Ok(());
            }
        }
    }
}

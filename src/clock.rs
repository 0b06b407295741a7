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

use std::thread;
use std::time::Duration;

use crate::vm::Step;

// The inter-instruction delay. By default only real work delays;
// `always` extends that to blanks and skipped cells.
pub struct Ticker {
    period: Duration,
    always: bool,
}

impl Ticker {
    pub fn new(seconds: f64, always: bool) -> Ticker {
        Ticker {
            period: Duration::from_secs_f64(seconds.max(0.0)),
            always,
        }
    }

    // Sleep off one step, if this kind of step warrants a delay.
    pub fn wait(&self, step: Step) {
        if self.period == Duration::ZERO {
            return;
        }
        let worked = match step {
            Step::Executed(c) => c != ' ',
            Step::Skipped => false,
        };
        if worked || self.always {
            thread::sleep(self.period);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_and_negative_delays_collapse_to_nothing() {
        let ticker = Ticker::new(-1.0, true);
        assert_eq!(ticker.period, Duration::ZERO);
    }
}

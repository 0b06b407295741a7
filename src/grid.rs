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

use log::debug;

// The wordbox: a program laid out as a grid of code points. Rows are
// ragged, a cell holds 0 for a space, and nothing mutates the grid
// after loading. Reads outside any row are 0.
#[derive(Clone, Debug)]
pub struct Grid {
    rows: Vec<Vec<u32>>,
}

impl Grid {
    // Load program text. A leading #! line is dropped. Trailing lines
    // with no characters at all never become rows.
    pub fn load(source: &str) -> Grid {
        let source = if source.starts_with("#!") {
            match source.split_once('\n') {
                Some((_, rest)) => rest,
                None => "",
            }
        } else {
            source
        };

        let mut rows: Vec<Vec<u32>> = source
            .split('\n')
            .map(|line| {
                line.chars()
                    .map(|c| if c == ' ' { 0 } else { c as u32 })
                    .collect()
            })
            .collect();

        while rows.last().map_or(false, |row| row.is_empty()) {
            rows.pop();
        }

        debug!(
            "loaded {} rows, widest {}",
            rows.len(),
            rows.iter().map(|row| row.len()).max().unwrap_or(0)
        );

        Grid { rows }
    }

    pub fn cell(&self, row: i64, col: i64) -> u32 {
        if row < 0 || col < 0 {
            return 0;
        }
        self.rows
            .get(row as usize)
            .and_then(|row| row.get(col as usize))
            .copied()
            .unwrap_or(0)
    }

    pub fn max_row(&self) -> i64 {
        self.rows.len().saturating_sub(1) as i64
    }

    // Per-row rightmost column. An empty row counts as one cell wide
    // so the pointer always has somewhere to wrap to.
    pub fn max_col(&self, row: i64) -> i64 {
        if row < 0 {
            return 0;
        }
        self.rows
            .get(row as usize)
            .map_or(0, |row| row.len().saturating_sub(1) as i64)
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cells_hold_code_points_and_spaces_hold_zero() {
        let grid = Grid::load("a b");
        assert_eq!(grid.cell(0, 0), 'a' as u32);
        assert_eq!(grid.cell(0, 1), 0);
        assert_eq!(grid.cell(0, 2), 'b' as u32);
    }

    #[test]
    fn reads_outside_the_grid_are_zero() {
        let grid = Grid::load("ab");
        assert_eq!(grid.cell(0, 99), 0);
        assert_eq!(grid.cell(5, 0), 0);
        assert_eq!(grid.cell(-1, -1), 0);
    }

    #[test]
    fn hashbang_line_is_dropped() {
        let grid = Grid::load("#!/usr/bin/grok\nq");
        assert_eq!(grid.max_row(), 0);
        assert_eq!(grid.cell(0, 0), 'q' as u32);
    }

    #[test]
    fn rows_stay_ragged() {
        let grid = Grid::load("abc\nz");
        assert_eq!(grid.max_col(0), 2);
        assert_eq!(grid.max_col(1), 0);
    }

    #[test]
    fn trailing_blank_lines_are_not_rows() {
        let grid = Grid::load("q\n\n");
        assert_eq!(grid.max_row(), 0);
    }

    #[test]
    fn interior_blank_lines_are_one_cell_wide() {
        let grid = Grid::load("abc\n\nxyz");
        assert_eq!(grid.max_row(), 2);
        assert_eq!(grid.max_col(1), 0);
        assert_eq!(grid.cell(1, 0), 0);
    }

    #[test]
    fn a_line_of_spaces_is_still_a_row() {
        let grid = Grid::load("q\n  ");
        assert_eq!(grid.max_row(), 1);
        assert_eq!(grid.max_col(1), 1);
    }

    #[test]
    fn empty_source_loads_an_empty_grid() {
        assert!(Grid::load("").is_empty());
        assert!(!Grid::load("q").is_empty());
    }
}

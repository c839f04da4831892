//! Match detection (runs of 3+ in rows and columns) and area-clear explosions for runs of 5+.

use crate::grid::{Cell, Fall, Grid, GridError, Token, recover};

/// Shortest run that counts as a match.
pub const MIN_RUN: usize = 3;
/// Runs at least this long also explode.
pub const EXPLOSION_RUN: usize = 5;
/// Chebyshev radius of an explosion (5x5 area).
pub const EXPLOSION_RADIUS: usize = 2;

/// Which cells sit in a run of MIN_RUN or more.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchScan {
    width: usize,
    mask: Vec<bool>,
}

impl MatchScan {
    fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            mask: vec![false; width * height],
        }
    }

    #[cfg(test)]
    pub fn is_matched(&self, col: usize, row: usize) -> bool {
        col < self.width && self.mask.get(row * self.width + col).copied().unwrap_or(false)
    }

    /// True iff at least one run of 3+ was found.
    pub fn found_any(&self) -> bool {
        self.mask.iter().any(|&m| m)
    }

    pub fn matched_count(&self) -> usize {
        self.mask.iter().filter(|&&m| m).count()
    }

    #[cfg(test)]
    pub fn matched_cells(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        let w = self.width;
        self.mask
            .iter()
            .enumerate()
            .filter(|(_, m)| **m)
            .map(move |(i, _)| (i % w, i / w))
    }

    fn flag(&mut self, col: usize, row: usize) {
        self.mask[row * self.width + col] = true;
    }
}

/// One explosion fired during [`detect`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Blast {
    pub center: (usize, usize),
    pub cleared: usize,
}

/// Outcome of [`detect`]: cells flagged when their run was found, and the blasts in firing order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Detection {
    pub scan: MatchScan,
    pub blasts: Vec<Blast>,
}

/// Flag runs in every row and column without touching the grid.
/// Equivalent to [`detect`] for `found_any`: the first run is always found before any blast.
pub fn scan(grid: &Grid) -> MatchScan {
    let (w, h) = (grid.width(), grid.height());
    let mut result = MatchScan::new(w, h);
    for row in 0..h {
        for (start, len) in runs(&row_kinds(grid, row)) {
            (start..start + len).for_each(|col| result.flag(col, row));
        }
    }
    for col in 0..w {
        for (start, len) in runs(&col_kinds(grid, col)) {
            (start..start + len).for_each(|row| result.flag(col, row));
        }
    }
    result
}

/// Rows top to bottom, then columns left to right. Each run found sets `matched` on its cells;
/// a run of EXPLOSION_RUN or more explodes at once around its middle cell, so every line read
/// afterwards sees the blasted cells as empty.
pub fn detect(grid: &mut Grid, radius: usize) -> Detection {
    let (w, h) = (grid.width(), grid.height());
    let fallback = Detection {
        scan: MatchScan::new(w, h),
        blasts: Vec::new(),
    };
    recover(try_detect(grid, radius), fallback)
}

fn try_detect(grid: &mut Grid, radius: usize) -> Result<Detection, GridError> {
    let (w, h) = (grid.width(), grid.height());
    let mut scan = MatchScan::new(w, h);
    let mut blasts = Vec::new();

    for row in 0..h {
        for (start, len) in runs(&row_kinds(grid, row)) {
            for col in start..start + len {
                scan.flag(col, row);
                set_matched(grid, col, row)?;
            }
            if len >= EXPLOSION_RUN {
                let center = (start + len / 2, row);
                let cleared = try_apply_explosion(grid, center, radius)?;
                blasts.push(Blast { center, cleared });
            }
        }
    }
    for col in 0..w {
        for (start, len) in runs(&col_kinds(grid, col)) {
            for row in start..start + len {
                scan.flag(col, row);
                set_matched(grid, col, row)?;
            }
            if len >= EXPLOSION_RUN {
                let center = (col, start + len / 2);
                let cleared = try_apply_explosion(grid, center, radius)?;
                blasts.push(Blast { center, cleared });
            }
        }
    }
    Ok(Detection { scan, blasts })
}

fn set_matched(grid: &mut Grid, col: usize, row: usize) -> Result<(), GridError> {
    let mut cell = grid.get(col, row)?;
    cell.matched = true;
    grid.set(col, row, cell)
}

fn row_kinds(grid: &Grid, row: usize) -> Vec<Option<u8>> {
    (0..grid.width()).map(|col| grid.kind(col, row)).collect()
}

fn col_kinds(grid: &Grid, col: usize) -> Vec<Option<u8>> {
    (0..grid.height()).map(|row| grid.kind(col, row)).collect()
}

/// Every run of MIN_RUN or more equal candies in `line`, as (start, length).
/// Scanning resumes right after each run.
fn runs(line: &[Option<u8>]) -> Vec<(usize, usize)> {
    let mut found = Vec::new();
    let mut i = 0;
    while i < line.len() {
        let Some(kind) = line[i] else {
            i += 1;
            continue;
        };
        let run = line[i..].iter().take_while(|&&k| k == Some(kind)).count();
        if run >= MIN_RUN {
            found.push((i, run));
        }
        i += run;
    }
    found
}

/// In-bounds cells within Chebyshev distance `radius` of `center`.
pub fn explosion_area(
    grid: &Grid,
    center: (usize, usize),
    radius: usize,
) -> impl Iterator<Item = (usize, usize)> {
    let (cx, cy) = center;
    let cols = cx.saturating_sub(radius)..=(cx + radius).min(grid.width().saturating_sub(1));
    let rows = cy.saturating_sub(radius)..=(cy + radius).min(grid.height().saturating_sub(1));
    rows.flat_map(move |row| cols.clone().map(move |col| (col, row)))
}

/// Empty every candy within `radius` of `center`; returns how many were cleared.
/// A matched candy keeps its flag so the resolver still scores it.
pub fn apply_explosion(grid: &mut Grid, center: (usize, usize), radius: usize) -> usize {
    recover(try_apply_explosion(grid, center, radius), 0)
}

fn try_apply_explosion(
    grid: &mut Grid,
    center: (usize, usize),
    radius: usize,
) -> Result<usize, GridError> {
    let area: Vec<_> = explosion_area(grid, center, radius).collect();
    let mut cleared = 0;
    for (col, row) in area {
        let cell = grid.get(col, row)?;
        if cell.is_empty() {
            continue;
        }
        grid.set(
            col,
            row,
            Cell {
                token: Token::Empty,
                fall: Fall::Resting,
                ..cell
            },
        )?;
        cleared += 1;
    }
    Ok(cleared)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    /// Reference check: flagged iff the cell sits in a maximal run of 3+ horizontally or vertically.
    fn in_long_run(grid: &Grid, col: usize, row: usize) -> bool {
        let Some(kind) = grid.kind(col, row) else {
            return false;
        };
        let same = |c: usize, r: usize| grid.kind(c, r) == Some(kind);
        let left = (0..col).rev().take_while(|&c| same(c, row)).count();
        let right = (col + 1..grid.width()).take_while(|&c| same(c, row)).count();
        let up = (0..row).rev().take_while(|&r| same(col, r)).count();
        let down = (row + 1..grid.height()).take_while(|&r| same(col, r)).count();
        left + right + 1 >= MIN_RUN || up + down + 1 >= MIN_RUN
    }

    fn arb_grid() -> impl Strategy<Value = Grid> {
        // Few kinds plus empties so long runs actually show up.
        proptest::collection::vec(proptest::option::weighted(0.85, 0u8..3), 7 * 6).prop_map(
            |cells| {
                let mut grid = Grid::new(7, 6);
                for (i, k) in cells.into_iter().enumerate() {
                    let cell = k.map_or(Cell::EMPTY, Cell::candy);
                    grid.set(i % 7, i / 7, cell).unwrap();
                }
                grid
            },
        )
    }

    #[test]
    fn test_three_in_a_row() {
        let grid = Grid::from_rows(&[
            "01010101",
            "10101010",
            "01010101",
            "10101010",
            "01022201",
            "10101010",
        ]);
        let scan = scan(&grid);
        assert!(scan.found_any());
        let cells: Vec<_> = scan.matched_cells().collect();
        assert_eq!(cells, vec![(3, 4), (4, 4), (5, 4)]);
    }

    #[test]
    fn test_two_is_not_a_match() {
        let grid = Grid::from_rows(&["001", "112", "220"]);
        assert!(!scan(&grid).found_any());
    }

    #[test]
    fn test_vertical_run() {
        let grid = Grid::from_rows(&["120", "103", "124", "135"]);
        let scan = scan(&grid);
        let cells: Vec<_> = scan.matched_cells().collect();
        assert_eq!(cells, vec![(0, 0), (0, 1), (0, 2), (0, 3)]);
    }

    #[test]
    fn test_empty_cells_break_runs() {
        let grid = Grid::from_rows(&["00.00", "....."]);
        assert!(!scan(&grid).found_any());
        let grid = Grid::from_rows(&["...", "...", "..."]);
        assert!(!scan(&grid).found_any());
    }

    #[test]
    fn test_five_run_explodes_at_middle() {
        let mut grid = Grid::from_rows(&["000001", "123412", "341234"]);
        let d = detect(&mut grid, EXPLOSION_RADIUS);
        assert_eq!(d.scan.matched_count(), 5);
        assert_eq!(d.blasts, vec![Blast { center: (2, 0), cleared: 15 }]);
    }

    #[test]
    fn test_six_run_center_uses_integer_division() {
        let mut grid = Grid::from_rows(&["1", "1", "1", "1", "1", "1"]);
        let d = detect(&mut grid, EXPLOSION_RADIUS);
        assert_eq!(d.blasts, vec![Blast { center: (0, 3), cleared: 5 }]);
    }

    #[test]
    fn test_blasted_run_is_not_flagged() {
        // the 333 in row 1 is inside the row 0 blast
        let mut grid = Grid::from_rows(&["0000012", "1333121", "2121212", "1212121", "2121212"]);
        assert_eq!(scan(&grid).matched_count(), 8);
        let d = detect(&mut grid, EXPLOSION_RADIUS);
        assert_eq!(d.scan.matched_count(), 5);
        assert!(!d.scan.is_matched(2, 1));
        assert!(!grid.get(2, 1).unwrap().matched);
        assert_eq!(grid.iter().filter(|(_, _, c)| c.matched).count(), 5);
    }

    #[test]
    fn test_crossing_five_runs_fire_once() {
        // column 2 is only two long once the row 0 blast has gone off
        let mut grid = Grid::from_rows(&["0000012", "1201212", "2102121", "1201212", "2102121"]);
        assert_eq!(scan(&grid).matched_count(), 9);
        let d = detect(&mut grid, EXPLOSION_RADIUS);
        assert_eq!(d.blasts.len(), 1);
        assert_eq!(d.blasts[0], Blast { center: (2, 0), cleared: 15 });
        assert_eq!(grid.kind(2, 3), Some(0));
        assert!(!grid.get(2, 3).unwrap().matched);
    }

    #[test]
    fn test_cross_shares_a_cell() {
        let grid = Grid::from_rows(&["121", "222", "323"]);
        let scan = scan(&grid);
        assert_eq!(scan.matched_count(), 5);
        assert!(scan.is_matched(1, 1));
    }

    #[test]
    fn test_detect_sets_flags_only_on_matched_candies() {
        let mut grid = Grid::from_rows(&["111", "234"]);
        let d = detect(&mut grid, EXPLOSION_RADIUS);
        assert!(d.blasts.is_empty());
        assert!((0..3).all(|c| grid.get(c, 0).unwrap().matched));
        assert!((0..3).all(|c| !grid.get(c, 1).unwrap().matched));
    }

    #[test]
    fn test_explosion_clears_5x5_and_counts() {
        let mut grid = Grid::from_rows(&[
            "0000012", "1231231", "2312312", "3123123", "1231231",
        ]);
        let cleared = apply_explosion(&mut grid, (2, 0), EXPLOSION_RADIUS);
        // rows 0..=2, cols 0..=4
        assert_eq!(cleared, 15);
        assert_eq!(
            grid.to_rows(),
            vec![".....12", ".....31", ".....12", "3123123", "1231231"]
        );
    }

    #[test]
    fn test_explosion_skips_empty_cells() {
        let mut grid = Grid::from_rows(&["...", ".1.", "..."]);
        assert_eq!(apply_explosion(&mut grid, (1, 1), EXPLOSION_RADIUS), 1);
        assert_eq!(grid.empty_count(), 9);
    }

    #[test]
    fn test_explosion_keeps_matched_flag() {
        let mut grid = Grid::from_rows(&["00000"]);
        detect(&mut grid, EXPLOSION_RADIUS);
        let cell = grid.get(0, 0).unwrap();
        assert!(cell.is_empty());
        assert!(cell.matched);
    }

    proptest! {
        #[test]
        fn scan_flags_exactly_long_runs(grid in arb_grid()) {
            let s = scan(&grid);
            for row in 0..grid.height() {
                for col in 0..grid.width() {
                    prop_assert_eq!(s.is_matched(col, row), in_long_run(&grid, col, row));
                }
            }
        }

        #[test]
        fn detect_agrees_with_scan_on_found_any(grid in arb_grid()) {
            let mut after = grid.clone();
            let d = detect(&mut after, EXPLOSION_RADIUS);
            prop_assert_eq!(d.scan.found_any(), scan(&grid).found_any());
            prop_assert!(d.scan.matched_count() <= scan(&grid).matched_count());
        }

        #[test]
        fn explosion_clears_exactly_radius(grid in arb_grid(), cx in 0usize..7, cy in 0usize..6) {
            let mut after = grid.clone();
            let cleared = apply_explosion(&mut after, (cx, cy), EXPLOSION_RADIUS);
            let mut expected = 0;
            for (col, row, cell) in grid.iter() {
                let inside = col.abs_diff(cx) <= EXPLOSION_RADIUS && row.abs_diff(cy) <= EXPLOSION_RADIUS;
                if inside {
                    prop_assert!(after.get(col, row).unwrap().is_empty());
                    if !cell.is_empty() {
                        expected += 1;
                    }
                } else {
                    prop_assert_eq!(after.get(col, row).unwrap(), *cell);
                }
            }
            prop_assert_eq!(cleared, expected);
        }
    }
}

//! Gravity: compacts columns downward one step at a time and animates falling candies,
//! plus the spawner that refills empty cells once everything has landed.

use crate::grid::{Cell, Fall, Grid, GridError, Token, recover};
use rand::Rng;

/// Row new candies start from: one full cell above the board.
pub const SPAWN_ROW: i32 = -1;

/// One gravity step. For each column, bottom to top, an empty cell pulls down the nearest candy
/// above it (keeping that candy's drawn position), and every falling candy moves one row closer to
/// its resting row. Returns true when nothing moved, i.e. the board has settled.
pub fn step(grid: &mut Grid) -> bool {
    recover(try_step(grid), true)
}

fn try_step(grid: &mut Grid) -> Result<bool, GridError> {
    let mut moved = false;
    for col in 0..grid.width() {
        for row in (0..grid.height()).rev() {
            if grid.get(col, row)?.is_empty() {
                if let Some(src) = (0..row).rev().find(|&r| grid.kind(col, r).is_some()) {
                    let from = grid.get(col, src)?;
                    grid.set(
                        col,
                        row,
                        Cell {
                            fall: Fall::Falling {
                                row: from.visual_row(src),
                            },
                            ..from
                        },
                    )?;
                    grid.set(col, src, Cell::EMPTY)?;
                    moved = true;
                }
            }

            let mut cell = grid.get(col, row)?;
            if let Fall::Falling { row: drawn } = cell.fall {
                let target = row as i32;
                if drawn < target {
                    let drawn = drawn + 1;
                    cell.fall = if drawn >= target {
                        Fall::Resting
                    } else {
                        Fall::Falling { row: drawn }
                    };
                    moved = true;
                } else {
                    cell.fall = Fall::Resting;
                }
                grid.set(col, row, cell)?;
            }
        }
    }
    Ok(!moved)
}

/// Give every empty cell a random candy that drops in from above the board.
/// Returns how many cells were filled.
pub fn fill<R: Rng>(grid: &mut Grid, rng: &mut R, kinds: u8) -> usize {
    recover(try_fill(grid, rng, kinds), 0)
}

fn try_fill<R: Rng>(grid: &mut Grid, rng: &mut R, kinds: u8) -> Result<usize, GridError> {
    let mut filled = 0;
    for row in 0..grid.height() {
        for col in 0..grid.width() {
            if !grid.get(col, row)?.is_empty() {
                continue;
            }
            grid.set(
                col,
                row,
                Cell {
                    token: Token::Candy(rng.random_range(0..kinds)),
                    matched: false,
                    fall: Fall::Falling { row: SPAWN_ROW },
                },
            )?;
            filled += 1;
        }
    }
    Ok(filled)
}

//! Game state: board, score/combo, swap handling and the per-frame tick that chains
//! match resolution, gravity and refills.

use crate::GameConfig;
use crate::gravity;
use crate::grid::{Cell, Grid, GridError, Token, recover};
use crate::matcher::{self, Blast, EXPLOSION_RADIUS};
use rand::SeedableRng;
use rand_pcg::Pcg32;
use std::time::Duration;

/// Points per candy cleared by an explosion, before the combo multiplier.
pub const EXPLOSION_POINTS: u32 = 25;

/// Outcome of one resolver call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Resolution {
    pub cleared: usize,
    pub combo_increased: bool,
    pub new_highscore: bool,
}

/// Score, persisted best, and the chain counter. The multiplier shown to the player is `combo + 1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Scoreboard {
    pub score: u32,
    pub highscore: u32,
    pub combo: u32,
    pub base_score: u32,
}

impl Scoreboard {
    pub fn new(highscore: u32, base_score: u32) -> Self {
        Self {
            score: 0,
            highscore,
            combo: 0,
            base_score,
        }
    }

    #[inline]
    pub fn multiplier(&self) -> u32 {
        self.combo + 1
    }

    /// Score `cleared` exploded candies at the current multiplier. Returns the points added.
    pub fn award_explosion(&mut self, cleared: usize) -> u32 {
        let points = EXPLOSION_POINTS
            .saturating_mul(self.multiplier())
            .saturating_mul(cleared as u32);
        self.score = self.score.saturating_add(points);
        points
    }

    /// Clear every matched cell, scoring `base_score × (combo + 1)` each. A call that clears
    /// anything bumps the combo. Finally raises the highscore if the score passed it.
    pub fn resolve(&mut self, grid: &mut Grid) -> Resolution {
        let mut result = recover(self.try_resolve(grid), Resolution::default());
        result.new_highscore = self.check_highscore();
        result
    }

    fn try_resolve(&mut self, grid: &mut Grid) -> Result<Resolution, GridError> {
        let per_cell = self.base_score.saturating_mul(self.multiplier());
        let mut cleared = 0;
        for row in 0..grid.height() {
            for col in 0..grid.width() {
                let cell = grid.get(col, row)?;
                if !cell.matched {
                    continue;
                }
                grid.set(
                    col,
                    row,
                    Cell {
                        token: Token::Empty,
                        matched: false,
                        ..cell
                    },
                )?;
                self.score = self.score.saturating_add(per_cell);
                cleared += 1;
            }
        }
        let combo_increased = cleared > 0;
        if combo_increased {
            self.combo += 1;
        }
        Ok(Resolution {
            cleared,
            combo_increased,
            new_highscore: false,
        })
    }

    fn check_highscore(&mut self) -> bool {
        if self.score > self.highscore {
            self.highscore = self.score;
            true
        } else {
            false
        }
    }

    pub fn reset_combo(&mut self) {
        self.combo = 0;
    }
}

/// True iff the two cells are orthogonal neighbours.
pub fn is_valid_swap(c1: usize, r1: usize, c2: usize, r2: usize) -> bool {
    c1.abs_diff(c2) + r1.abs_diff(r2) == 1
}

/// Would swapping `a` and `b` create a match? Works on a copy; `grid` is never touched.
pub fn trial(grid: &Grid, a: (usize, usize), b: (usize, usize)) -> bool {
    let mut swapped = grid.clone();
    match swapped.swap(a.0, a.1, b.0, b.1) {
        Ok(()) => matcher::scan(&swapped).found_any(),
        Err(_) => false,
    }
}

/// Things the front-end reacts to (sound, effects, persistence).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameEvent {
    /// A resolution pass cleared `cleared` cells; `combo` is the chain count afterwards.
    Pop { cleared: usize, combo: u32 },
    Exploded {
        center: (usize, usize),
        cleared: usize,
    },
    /// Score passed the stored best; the new value should be persisted.
    HighscoreBeaten(u32),
}

/// Player input, already translated to grid coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Select { col: usize, row: usize },
    MoveCursor { dx: i32, dy: i32 },
    SelectCursor,
}

/// What the renderer needs for one cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellView {
    pub col: usize,
    pub row: usize,
    pub kind: u8,
    /// Selected or still falling: drawn smaller.
    pub emphasized: bool,
    /// Row the candy is currently drawn at (may be -1).
    pub visual_row: i32,
}

impl CellView {
    /// Vertical draw position for cells `cell_height` units tall.
    #[inline]
    pub fn animated_y(&self, cell_height: i32) -> i32 {
        self.visual_row * cell_height
    }
}

#[derive(Debug)]
pub struct Game {
    pub grid: Grid,
    pub scores: Scoreboard,
    pub selected: Option<(usize, usize)>,
    pub cursor: (usize, usize),
    kinds: u8,
    /// A clear/fall/refill cycle is in flight; selections are ignored.
    dropping: bool,
    drop_timer: Duration,
    fall_interval: Duration,
    rng: Pcg32,
    events: Vec<GameEvent>,
}

impl Game {
    pub fn new(config: &GameConfig, highscore: u32) -> Self {
        let mut rng = Pcg32::seed_from_u64(config.seed);
        let grid = Grid::random(config.width, config.height, config.kinds, &mut rng);
        Self::with_grid(grid, rng, config, highscore)
    }

    pub fn with_grid(grid: Grid, rng: Pcg32, config: &GameConfig, highscore: u32) -> Self {
        Self {
            grid,
            scores: Scoreboard::new(highscore, config.base_score),
            selected: None,
            cursor: (0, 0),
            kinds: config.kinds,
            dropping: false,
            drop_timer: Duration::ZERO,
            fall_interval: config.fall_interval,
            rng,
            events: Vec::new(),
        }
    }

    /// Fresh board and score; the highscore and RNG stream carry over.
    pub fn restart(&mut self) {
        let (w, h) = (self.grid.width(), self.grid.height());
        self.grid = Grid::random(w, h, self.kinds, &mut self.rng);
        self.scores = Scoreboard::new(self.scores.highscore, self.scores.base_score);
        self.selected = None;
        self.dropping = false;
        self.drop_timer = Duration::ZERO;
        self.events.clear();
        log::info!("game restarted");
    }

    /// Configured number of candy kinds.
    #[inline]
    pub fn kinds(&self) -> u8 {
        self.kinds
    }

    #[inline]
    pub fn is_dropping(&self) -> bool {
        self.dropping
    }

    pub fn drain_events(&mut self) -> std::vec::Drain<'_, GameEvent> {
        self.events.drain(..)
    }

    /// One frame: player command, automatic matches, then gravity once per `fall_interval`.
    /// The combo is only ever reset from within a tick.
    pub fn tick(&mut self, dt: Duration, command: Option<Command>) {
        if let Some(command) = command {
            self.apply(command);
        }

        if !self.resolution_pass() && !self.dropping {
            self.scores.reset_combo();
        }

        self.drop_timer += dt;
        if self.drop_timer >= self.fall_interval {
            self.drop_timer = Duration::ZERO;
            self.gravity_step();
        }
    }

    fn apply(&mut self, command: Command) {
        match command {
            Command::MoveCursor { dx, dy } => {
                let max_c = self.grid.width().saturating_sub(1) as i32;
                let max_r = self.grid.height().saturating_sub(1) as i32;
                let c = (self.cursor.0 as i32 + dx).clamp(0, max_c);
                let r = (self.cursor.1 as i32 + dy).clamp(0, max_r);
                self.cursor = (c as usize, r as usize);
            }
            Command::Select { col, row } => {
                if col < self.grid.width() && row < self.grid.height() {
                    self.cursor = (col, row);
                    self.select(col, row);
                }
            }
            Command::SelectCursor => {
                let (col, row) = self.cursor;
                self.select(col, row);
            }
        }
    }

    /// First selection remembers the cell; the second attempts a swap and always deselects.
    /// A swap that would not match is rejected without touching the board or the combo.
    fn select(&mut self, col: usize, row: usize) {
        if self.dropping {
            return;
        }
        let Some((sc, sr)) = self.selected.take() else {
            self.selected = Some((col, row));
            return;
        };
        if !is_valid_swap(sc, sr, col, row) || !trial(&self.grid, (sc, sr), (col, row)) {
            log::trace!("swap ({sc},{sr})<->({col},{row}) rejected");
            return;
        }
        recover(self.grid.swap(sc, sr, col, row), ());
        self.resolution_pass();
        // a player move starts a new chain
        self.scores.reset_combo();
    }

    /// detect (runs flagged, explosions fired in scan order) → resolve.
    /// Returns false when nothing matched.
    fn resolution_pass(&mut self) -> bool {
        let detection = matcher::detect(&mut self.grid, EXPLOSION_RADIUS);
        let scan = detection.scan;
        if !scan.found_any() {
            return false;
        }
        for Blast { center, cleared } in detection.blasts {
            let points = self.scores.award_explosion(cleared);
            log::debug!("explosion at {center:?}: {cleared} cleared, +{points}");
            self.events.push(GameEvent::Exploded { center, cleared });
        }
        let resolution = self.scores.resolve(&mut self.grid);
        log::debug!(
            "pass: {} matched, {} cleared, combo {}",
            scan.matched_count(),
            resolution.cleared,
            self.scores.combo
        );
        if resolution.combo_increased {
            self.dropping = true;
        }
        self.events.push(GameEvent::Pop {
            cleared: resolution.cleared,
            combo: self.scores.combo,
        });
        if resolution.new_highscore {
            self.events
                .push(GameEvent::HighscoreBeaten(self.scores.highscore));
        }
        true
    }

    fn gravity_step(&mut self) {
        if gravity::step(&mut self.grid) {
            let filled = gravity::fill(&mut self.grid, &mut self.rng, self.kinds);
            self.dropping = filled > 0;
        } else {
            self.dropping = true;
        }
    }

    /// Per-cell render data for every candy on the board.
    pub fn cell_views(&self) -> impl Iterator<Item = CellView> + '_ {
        self.grid.iter().filter_map(move |(col, row, cell)| {
            let kind = cell.kind()?;
            Some(CellView {
                col,
                row,
                kind,
                emphasized: cell.is_falling() || self.selected == Some((col, row)),
                visual_row: cell.visual_row(row),
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn config() -> GameConfig {
        GameConfig {
            width: 8,
            height: 6,
            kinds: 5,
            seed: 42,
            fall_interval: Duration::from_millis(100),
            base_score: 1,
        }
    }

    fn game(rows: &[&str]) -> Game {
        let grid = Grid::from_rows(rows);
        let mut cfg = config();
        cfg.width = grid.width();
        cfg.height = grid.height();
        Game::with_grid(grid, Pcg32::seed_from_u64(1), &cfg, 0)
    }

    const THREE_RUN: [&str; 6] = [
        "01010101", "10101010", "01010101", "10101010", "01022201", "10101010",
    ];

    const FIVE_RUN: [&str; 5] = ["0000012", "1212121", "2121212", "1212121", "2121212"];

    #[test]
    fn test_resolve_three_run() {
        let mut grid = Grid::from_rows(&THREE_RUN);
        matcher::detect(&mut grid, EXPLOSION_RADIUS);
        let mut scores = Scoreboard::new(100, 1);
        let res = scores.resolve(&mut grid);
        assert_eq!(
            res,
            Resolution {
                cleared: 3,
                combo_increased: true,
                new_highscore: false
            }
        );
        assert_eq!(scores.score, 3);
        assert_eq!(scores.combo, 1);
        assert_eq!(grid.to_rows()[4], "010...01");
        assert!(grid.iter().all(|(_, _, c)| !c.matched));
    }

    #[test]
    fn test_resolve_twice_is_noop() {
        let mut grid = Grid::from_rows(&THREE_RUN);
        matcher::detect(&mut grid, EXPLOSION_RADIUS);
        let mut scores = Scoreboard::new(0, 1);
        scores.resolve(&mut grid);
        let (after_grid, after_scores) = (grid.clone(), scores);
        let res = scores.resolve(&mut grid);
        assert_eq!(res.cleared, 0);
        assert!(!res.combo_increased);
        assert_eq!(grid, after_grid);
        assert_eq!(scores, after_scores);
    }

    #[test]
    fn test_resolve_uses_combo_multiplier() {
        let mut grid = Grid::from_rows(&["111", "232"]);
        matcher::detect(&mut grid, EXPLOSION_RADIUS);
        let mut scores = Scoreboard::new(0, 2);
        scores.combo = 2;
        scores.resolve(&mut grid);
        assert_eq!(scores.score, 3 * 2 * 3);
        assert_eq!(scores.combo, 3);
    }

    #[test]
    fn test_resolve_reports_new_highscore() {
        let mut grid = Grid::from_rows(&["111", "232"]);
        matcher::detect(&mut grid, EXPLOSION_RADIUS);
        let mut scores = Scoreboard::new(2, 1);
        let res = scores.resolve(&mut grid);
        assert!(res.new_highscore);
        assert_eq!(scores.highscore, 3);
    }

    #[test]
    fn test_five_run_explosion_scoring() {
        let mut g = game(&FIVE_RUN);
        assert!(g.resolution_pass());
        // 15 candies in the 5x5 area clipped at the top edge, plus base score for the 5 flagged
        assert_eq!(g.scores.score, 15 * EXPLOSION_POINTS + 5);
        assert_eq!(g.scores.combo, 1);
        assert_eq!(
            g.grid.to_rows(),
            vec![".....12", ".....21", ".....12", "1212121", "2121212"]
        );
        let events: Vec<_> = g.drain_events().collect();
        assert_eq!(
            events,
            vec![
                GameEvent::Exploded {
                    center: (2, 0),
                    cleared: 15
                },
                GameEvent::Pop {
                    cleared: 5,
                    combo: 1
                },
                GameEvent::HighscoreBeaten(380),
            ]
        );
    }

    #[test]
    fn test_run_inside_blast_scores_nothing() {
        let mut g = game(&["0000012", "1333121", "2121212", "1212121", "2121212"]);
        assert!(g.resolution_pass());
        assert_eq!(g.scores.score, 15 * EXPLOSION_POINTS + 5);
        let events: Vec<_> = g.drain_events().collect();
        assert_eq!(
            events[..2],
            [
                GameEvent::Exploded {
                    center: (2, 0),
                    cleared: 15
                },
                GameEvent::Pop {
                    cleared: 5,
                    combo: 1
                },
            ]
        );
    }

    #[test]
    fn test_crossing_five_runs_explode_once() {
        let mut g = game(&["0000012", "1201212", "2102121", "1201212", "2102121"]);
        assert!(g.resolution_pass());
        let explosions = g
            .drain_events()
            .filter(|e| matches!(e, GameEvent::Exploded { .. }))
            .count();
        assert_eq!(explosions, 1);
        assert_eq!(g.scores.score, 15 * EXPLOSION_POINTS + 5);
        assert_eq!(g.grid.to_rows()[3], "1201212");
    }

    #[test]
    fn test_explosion_points_follow_combo() {
        let mut scores = Scoreboard::new(0, 1);
        scores.combo = 1;
        assert_eq!(scores.award_explosion(4), 4 * 25 * 2);
    }

    #[test]
    fn test_is_valid_swap() {
        assert!(is_valid_swap(3, 3, 4, 3));
        assert!(is_valid_swap(3, 3, 3, 2));
        assert!(!is_valid_swap(3, 3, 4, 4));
        assert!(!is_valid_swap(3, 3, 3, 3));
        assert!(!is_valid_swap(0, 0, 2, 0));
    }

    #[test]
    fn test_trial_does_not_mutate() {
        let grid = Grid::from_rows(&["0012", "2201"]);
        let before = grid.clone();
        assert!(trial(&grid, (2, 0), (2, 1)));
        assert_eq!(grid, before);
    }

    #[test]
    fn test_trial_detects_match() {
        let grid = Grid::from_rows(&["0012", "2201"]);
        assert!(trial(&grid, (2, 0), (2, 1)));
        assert!(!trial(&grid, (3, 0), (3, 1)));
        assert!(!trial(&grid, (0, 0), (9, 9)));
    }

    #[test]
    fn test_non_adjacent_swap_rejected_keeps_combo() {
        let mut g = game(&THREE_RUN);
        g.scores.combo = 2;
        let before = g.grid.clone();
        g.select(0, 0);
        g.select(2, 0);
        assert_eq!(g.grid, before);
        assert_eq!(g.scores.combo, 2);
        assert_eq!(g.selected, None);
    }

    #[test]
    fn test_non_matching_swap_is_rejected() {
        let mut g = game(&["0101", "1010", "2323"]);
        let before = g.grid.clone();
        g.select(0, 0);
        g.select(1, 0);
        assert_eq!(g.grid, before);
        assert!(g.drain_events().next().is_none());
    }

    #[test]
    fn test_matching_swap_resolves_and_resets_combo() {
        let mut g = game(&["0012", "2201", "1320"]);
        g.scores.combo = 4;
        g.select(2, 0);
        g.select(2, 1);
        assert_eq!(g.grid.to_rows()[0], "...2");
        assert_eq!(g.scores.score, 3 * 5);
        assert_eq!(g.scores.combo, 0);
        assert!(g.is_dropping());
        assert!(matches!(
            g.drain_events().next(),
            Some(GameEvent::Pop { cleared: 3, .. })
        ));
    }

    #[test]
    fn test_select_ignored_while_dropping() {
        let mut g = game(&["0012", "2201", "1320"]);
        g.dropping = true;
        g.tick(Duration::ZERO, Some(Command::Select { col: 2, row: 0 }));
        assert_eq!(g.selected, None);
    }

    #[test]
    fn test_out_of_grid_select_is_ignored() {
        let mut g = game(&["0101", "1010"]);
        g.tick(Duration::ZERO, Some(Command::Select { col: 9, row: 0 }));
        assert_eq!(g.selected, None);
    }

    #[test]
    fn test_cursor_clamps_to_board() {
        let mut g = game(&["0101", "1010"]);
        g.tick(Duration::ZERO, Some(Command::MoveCursor { dx: -1, dy: 5 }));
        assert_eq!(g.cursor, (0, 1));
        g.tick(Duration::ZERO, Some(Command::SelectCursor));
        assert_eq!(g.selected, Some((0, 1)));
    }

    #[test]
    fn test_gravity_is_throttled() {
        let mut g = game(&["0", "1", "2"]);
        g.grid.set(0, 2, Cell::EMPTY).unwrap();
        g.tick(Duration::from_millis(60), None);
        assert_eq!(g.grid.kind(0, 2), None);
        g.tick(Duration::from_millis(60), None);
        assert_eq!(g.grid.kind(0, 2), Some(1));
        assert!(g.is_dropping());
        // the step moved candies, so nothing spawns yet
        assert_eq!(g.grid.kind(0, 0), None);
    }

    #[test]
    fn test_refill_only_after_settled_step() {
        let mut g = game(&["0", "1", "2"]);
        g.grid.set(0, 2, Cell::EMPTY).unwrap();
        g.tick(Duration::from_millis(100), None);
        assert_eq!(g.grid.kind(0, 0), None);
        assert_eq!(g.grid.kind(0, 1), Some(0));
        g.tick(Duration::from_millis(100), None);
        let top = g.grid.get(0, 0).unwrap();
        assert!(top.kind().is_some());
        assert_eq!(top.fall, crate::grid::Fall::Falling { row: gravity::SPAWN_ROW });
        assert!(g.is_dropping());
    }

    #[test]
    fn test_combo_resets_when_board_is_quiet() {
        let mut g = game(&["0101", "1010"]);
        g.scores.combo = 3;
        g.tick(Duration::ZERO, None);
        assert_eq!(g.scores.combo, 0);
    }

    #[test]
    fn test_combo_survives_while_dropping() {
        let mut g = game(&["0101", "1010"]);
        g.scores.combo = 3;
        g.dropping = true;
        g.tick(Duration::ZERO, None);
        assert_eq!(g.scores.combo, 3);
    }

    #[test]
    fn test_cell_views_emphasize_selected_and_falling() {
        let mut g = game(&["01", "10"]);
        g.selected = Some((1, 0));
        let mut falling = Cell::candy(0);
        falling.fall = crate::grid::Fall::Falling { row: -1 };
        g.grid.set(0, 1, falling).unwrap();
        let views: Vec<_> = g.cell_views().collect();
        assert!(!views[0].emphasized);
        assert!(views[1].emphasized);
        assert!(views[2].emphasized);
        assert_eq!(views[2].visual_row, -1);
        assert_eq!(views[2].animated_y(50), -50);
    }

    #[test]
    fn test_kinds_is_configured_count_not_board_content() {
        let g = game(&["0101", "1010"]);
        assert_eq!(g.kinds(), 5);
    }

    #[test]
    fn test_restart_keeps_highscore() {
        let mut g = Game::new(&config(), 0);
        g.scores.score = 77;
        g.scores.highscore = 77;
        g.restart();
        assert_eq!(g.scores.score, 0);
        assert_eq!(g.scores.highscore, 77);
        assert_eq!(g.grid.empty_count(), 0);
    }

    proptest! {
        #[test]
        fn game_eventually_settles_full_and_quiet(seed in 0u64..500) {
            let mut cfg = config();
            cfg.seed = seed;
            let mut g = Game::new(&cfg, 0);
            for _ in 0..2000 {
                g.tick(Duration::from_millis(100), None);
                if !g.is_dropping() && !matcher::scan(&g.grid).found_any() && g.grid.empty_count() == 0 {
                    break;
                }
            }
            g.tick(Duration::ZERO, None);
            prop_assert!(!g.is_dropping());
            prop_assert_eq!(g.grid.empty_count(), 0);
            prop_assert!(!matcher::scan(&g.grid).found_any());
            prop_assert_eq!(g.scores.combo, 0);
            prop_assert!(g.grid.iter().all(|(_, _, c)| !c.matched && !c.is_falling()));
        }
    }
}

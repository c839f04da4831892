//! App: terminal init, main loop, input handling and game event reactions.

use crate::game::{Command, Game, GameEvent};
use crate::highscores;
use crate::input::{Action, key_to_action, pixel_to_cell};
use crate::matcher::{self, EXPLOSION_RADIUS};
use crate::theme::Theme;
use crate::ui::{self, CELL_HEIGHT, CELL_WIDTH, DrawState};
use crate::{Args, GameConfig};
use anyhow::Result;
use crossterm::event::{self, Event, KeyEventKind, MouseButton, MouseEvent, MouseEventKind};
use ratatui::DefaultTerminal;
use ratatui::layout::Rect;
use std::collections::HashSet;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tachyonfx::Effect;

pub struct App {
    args: Args,
    theme: Theme,
    game: Game,
    paused: bool,
    quit: bool,
    highscore_path: Option<PathBuf>,
    last_tick: Instant,
    /// Board area from the last frame, for mapping mouse clicks to cells.
    board: Rect,
    /// Input gathered since the last tick; only the first one is applied.
    pending: Option<Command>,
    exploded: HashSet<(usize, usize)>,
    /// TachyonFX fade for the explosion flash (created on first frame after a blast).
    explosion_effect: Option<Effect>,
    /// Last time we processed the explosion effect (for delta).
    explosion_effect_process_time: Option<Instant>,
}

impl App {
    pub fn new(
        args: Args,
        config: GameConfig,
        theme: Theme,
        highscore_path: Option<PathBuf>,
        highscore: u32,
    ) -> Self {
        let game = Game::new(&config, highscore);
        Self {
            args,
            theme,
            game,
            paused: false,
            quit: false,
            highscore_path,
            last_tick: Instant::now(),
            board: Rect::default(),
            pending: None,
            exploded: HashSet::new(),
            explosion_effect: None,
            explosion_effect_process_time: None,
        }
    }

    pub fn run(&mut self) -> Result<()> {
        use crossterm::{
            event::{DisableMouseCapture, EnableMouseCapture},
            execute,
            terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
        };

        enable_raw_mode()?;
        let mut stdout = std::io::stdout();
        execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
        let mut terminal = DefaultTerminal::new(ratatui::backend::CrosstermBackend::new(stdout))?;

        let result = self.run_loop(&mut terminal);

        // Restore
        execute!(std::io::stdout(), DisableMouseCapture, LeaveAlternateScreen)?;
        disable_raw_mode()?;
        log::info!("final score {}, highscore {}", self.game.scores.score, self.game.scores.highscore);

        result
    }

    fn run_loop(&mut self, terminal: &mut DefaultTerminal) -> Result<()> {
        let frame_duration = Duration::from_secs_f64(1.0 / self.args.frame_rate.max(1.0));
        self.last_tick = Instant::now();
        while !self.quit {
            let now = Instant::now();
            terminal.draw(|f| {
                self.board = ui::draw(
                    f,
                    &self.game,
                    DrawState {
                        theme: &self.theme,
                        paused: self.paused,
                        no_animation: self.args.no_animation,
                        exploded: &self.exploded,
                        explosion_effect: &mut self.explosion_effect,
                        explosion_process_time: &mut self.explosion_effect_process_time,
                        now,
                    },
                );
            })?;

            if self.board.is_empty() || self.explosion_effect.as_ref().is_some_and(|e| e.done()) {
                self.clear_explosions();
            }

            let timeout = frame_duration.saturating_sub(now.elapsed());
            if event::poll(timeout)? {
                while event::poll(Duration::ZERO)? {
                    match event::read()? {
                        Event::Key(key) if key.kind == KeyEventKind::Press => {
                            self.handle_action(key_to_action(key));
                        }
                        Event::Mouse(mouse) => self.handle_mouse(mouse),
                        _ => {}
                    }
                }
            }

            let now = Instant::now();
            let dt = now.duration_since(self.last_tick);
            self.last_tick = now;
            if !self.paused {
                self.game.tick(dt, self.pending.take());
                self.handle_events();
            }
            self.pending = None;
        }
        Ok(())
    }

    fn queue(&mut self, command: Command) {
        if self.pending.is_none() {
            self.pending = Some(command);
        }
    }

    fn handle_action(&mut self, action: Action) {
        match action {
            Action::Quit => self.quit = true,
            Action::Pause => {
                self.paused = !self.paused;
                log::debug!("paused: {}", self.paused);
            }
            Action::Restart => {
                self.game.restart();
                self.paused = false;
                self.pending = None;
                self.clear_explosions();
            }
            _ if self.paused => {}
            Action::Up => self.queue(Command::MoveCursor { dx: 0, dy: -1 }),
            Action::Down => self.queue(Command::MoveCursor { dx: 0, dy: 1 }),
            Action::Left => self.queue(Command::MoveCursor { dx: -1, dy: 0 }),
            Action::Right => self.queue(Command::MoveCursor { dx: 1, dy: 0 }),
            Action::Select => self.queue(Command::SelectCursor),
            Action::None => {}
        }
    }

    fn handle_mouse(&mut self, mouse: MouseEvent) {
        if self.paused
            || self.board.is_empty()
            || mouse.kind != MouseEventKind::Down(MouseButton::Left)
        {
            return;
        }
        let cell = pixel_to_cell(
            mouse.column as i32 - self.board.x as i32,
            mouse.row as i32 - self.board.y as i32,
            CELL_WIDTH as i32,
            CELL_HEIGHT as i32,
            self.game.grid.width(),
            self.game.grid.height(),
        );
        if let Some((col, row)) = cell {
            self.queue(Command::Select { col, row });
        }
    }

    /// React to what the last tick did: sound, explosion flash, highscore persistence.
    fn handle_events(&mut self) {
        let events: Vec<GameEvent> = self.game.drain_events().collect();
        for event in events {
            match event {
                GameEvent::Pop { cleared, combo } => {
                    log::trace!("pop: {cleared} cleared, combo {combo}");
                    if self.args.sound {
                        ring_bell();
                    }
                }
                GameEvent::Exploded { center, cleared } => {
                    log::trace!("flash {cleared} cells around {center:?}");
                    if !self.args.no_animation {
                        self.exploded
                            .extend(matcher::explosion_area(&self.game.grid, center, EXPLOSION_RADIUS));
                        // restart the fade so it covers every flashed cell
                        self.explosion_effect = None;
                    }
                }
                GameEvent::HighscoreBeaten(score) => self.save_highscore(score),
            }
        }
    }

    fn save_highscore(&self, score: u32) {
        let Some(path) = &self.highscore_path else {
            return;
        };
        if let Err(e) = highscores::save_highscore(path, score) {
            log::warn!("could not save highscore to {}: {e}", path.display());
        }
    }

    fn clear_explosions(&mut self) {
        self.exploded.clear();
        self.explosion_effect = None;
        self.explosion_effect_process_time = None;
    }
}

/// Terminal bell; failures are ignored.
fn ring_bell() {
    use std::io::Write;
    let mut out = std::io::stdout();
    let _ = out.write_all(b"\x07").and_then(|()| out.flush());
}

//! Candyboom: match-3 candy puzzle in the terminal.

mod app;
mod game;
mod gravity;
mod grid;
mod highscores;
mod input;
mod matcher;
mod theme;
mod ui;

use anyhow::{Context, Result};
use app::App;
use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use std::time::Duration;

/// Options derived from CLI that the simulation core needs.
#[derive(Debug, Clone)]
pub struct GameConfig {
    pub width: usize,
    pub height: usize,
    pub kinds: u8,
    pub seed: u64,
    pub fall_interval: Duration,
    pub base_score: u32,
}

impl GameConfig {
    fn from_args(args: &Args) -> Self {
        Self {
            width: args.width as usize,
            height: args.height as usize,
            kinds: args.kinds,
            seed: args.seed.unwrap_or_else(rand::random),
            fall_interval: Duration::from_millis(args.fall_interval_ms),
            base_score: args.base_score,
        }
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    if let Some(path) = &args.log_file {
        init_logging(path)?;
    }
    let theme = theme::Theme::load(args.theme.as_deref(), args.palette).unwrap_or_default();
    let config = GameConfig::from_args(&args);
    log::info!("starting {}x{} board, {} kinds, seed {}", config.width, config.height, config.kinds, config.seed);

    let highscore_path = match &args.highscore_file {
        Some(p) => Some(p.clone()),
        None => highscores::default_path()
            .inspect_err(|e| log::warn!("highscore will not be saved: {e}"))
            .ok(),
    };
    let highscore = highscore_path
        .as_deref()
        .map_or(0, highscores::load_highscore);

    let mut app = App::new(args, config, theme, highscore_path, highscore);
    app.run()?;
    Ok(())
}

/// Log to a file; the terminal itself is owned by the UI. Level comes from `RUST_LOG` (default info).
fn init_logging(path: &std::path::Path) -> Result<()> {
    let file = std::fs::File::create(path)
        .with_context(|| format!("cannot open log file {}", path.display()))?;
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Pipe(Box::new(file)))
        .init();
    Ok(())
}

/// Match-3 candy puzzle in the terminal.
#[derive(Debug, Parser)]
#[command(
    name = "candyboom",
    version,
    about = "Match-3 candy puzzle in the terminal. Swap neighbours to line up three or more.",
    long_about = "Candyboom is a terminal match-3 game.\n\n\
        Click a candy, then click a neighbour to swap them. A swap must line up three or more \
        candies of one colour in a row or column, otherwise it is undone. Cleared candies make \
        the ones above fall; new candies drop in from the top and can chain into combos \
        (each chain step raises the score multiplier). Lines of five or more explode and clear \
        the 5x5 area around their middle.\n\n\
        CONTROLS:\n  Mouse click     Select / swap\n  Arrows or hjkl  Move cursor    Space/Enter  Select under cursor\n  \
        P  Pause    R  Restart    Q / Esc  Quit"
)]
pub struct Args {
    /// Board width in cells.
    #[arg(long, default_value = "10", value_name = "COLS", value_parser = clap::value_parser!(u16).range(3..=40))]
    pub width: u16,

    /// Board height in cells.
    #[arg(long, default_value = "10", value_name = "ROWS", value_parser = clap::value_parser!(u16).range(3..=40))]
    pub height: u16,

    /// Number of candy kinds (colours).
    #[arg(short, long, default_value = "5", value_name = "N", value_parser = clap::value_parser!(u8).range(2..=6))]
    pub kinds: u8,

    /// RNG seed for the board and refills. Random if not set.
    #[arg(long, value_name = "SEED")]
    pub seed: Option<u64>,

    /// Time between gravity steps; each step moves falling candies down one cell.
    #[arg(long, default_value = "100", value_name = "MS")]
    pub fall_interval_ms: u64,

    /// Target render frames per second (one simulation tick per frame).
    #[arg(long, default_value = "60.0", value_name = "RATE")]
    pub frame_rate: f64,

    /// Points per matched candy, multiplied by the combo.
    #[arg(long, default_value = "1", value_name = "POINTS")]
    pub base_score: u32,

    /// Highscore file. Defaults to the config dir (XDG or ~/.config)/candyboom/highscore.
    #[arg(long, value_name = "FILE")]
    pub highscore_file: Option<PathBuf>,

    /// Path to theme file (btop-style theme[key]="value"). Uses One Dark if not set.
    #[arg(short, long, value_name = "FILE")]
    pub theme: Option<PathBuf>,

    /// Colour palette: normal (theme), high-contrast, or colorblind.
    #[arg(long, default_value = "normal")]
    pub palette: Palette,

    /// Disable the explosion flash.
    #[arg(long)]
    pub no_animation: bool,

    /// Ring the terminal bell when candies pop.
    #[arg(long)]
    pub sound: bool,

    /// Write logs to this file (level from RUST_LOG, default info).
    #[arg(long, value_name = "FILE")]
    pub log_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum Palette {
    #[default]
    Normal,

    #[value(alias = "highcontrast", alias = "contrast")]
    HighContrast,

    #[value(alias = "colourblind")]
    Colorblind,
}

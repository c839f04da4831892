//! Layout and drawing: board, candies, cursor, explosion flash, score sidebar, pause overlay.

use crate::game::Game;
use crate::theme::Theme;
use ratatui::Frame;
use ratatui::layout::{Alignment, Constraint, Direction, Layout, Position, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph, Widget};
use std::collections::HashSet;
use std::time::Instant;
use tachyonfx::{CellFilter, Duration as TfxDuration, Effect, EffectRenderer, Interpolation, fx, ref_count};

/// Terminal characters per board cell.
pub const CELL_WIDTH: u16 = 4;
pub const CELL_HEIGHT: u16 = 2;

const SIDEBAR_WIDTH: u16 = 24;

/// Duration of the explosion flash fade (TachyonFX).
const EXPLOSION_FADE_MS: u32 = 350;

/// Board size in terminal cells including its border.
fn board_outer_size(width: usize, height: usize) -> (u16, u16) {
    (
        width as u16 * CELL_WIDTH + 2,
        height as u16 * CELL_HEIGHT + 2,
    )
}

/// Split the screen into (board with border, sidebar), centred.
fn split(area: Rect, width: usize, height: usize) -> (Rect, Rect) {
    let (bw, bh) = board_outer_size(width, height);
    let horiz = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Fill(1),
            Constraint::Length(bw + SIDEBAR_WIDTH),
            Constraint::Fill(1),
        ])
        .split(area);
    let vert = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Fill(1), Constraint::Length(bh), Constraint::Fill(1)])
        .split(horiz[1]);
    let inner = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Length(bw), Constraint::Length(SIDEBAR_WIDTH)])
        .split(vert[1]);
    (inner[0], inner[1])
}

/// Board area without the border; candy (col, row) starts at
/// `(x + col * CELL_WIDTH, y + row * CELL_HEIGHT)`.
pub fn board_rect(area: Rect, width: usize, height: usize) -> Rect {
    let (outer, _) = split(area, width, height);
    Rect {
        x: outer.x + 1,
        y: outer.y + 1,
        width: outer.width.saturating_sub(2),
        height: outer.height.saturating_sub(2),
    }
}

/// Buffer positions covered by the given board cells.
fn cell_buffer_positions(board: Rect, cells: &HashSet<(usize, usize)>) -> HashSet<(u16, u16)> {
    let mut set = HashSet::new();
    for &(col, row) in cells {
        let x0 = board.x + col as u16 * CELL_WIDTH;
        let y0 = board.y + row as u16 * CELL_HEIGHT;
        for x in x0..(x0 + CELL_WIDTH).min(board.right()) {
            for y in y0..(y0 + CELL_HEIGHT).min(board.bottom()) {
                set.insert((x, y));
            }
        }
    }
    set
}

/// Everything the frame needs beyond the game itself.
pub struct DrawState<'a> {
    pub theme: &'a Theme,
    pub paused: bool,
    pub no_animation: bool,
    /// Board cells hit by the most recent explosions, flashed until the effect finishes.
    pub exploded: &'a HashSet<(usize, usize)>,
    pub explosion_effect: &'a mut Option<Effect>,
    pub explosion_process_time: &'a mut Option<Instant>,
    pub now: Instant,
}

/// Draw one frame. Returns the board rect so pointer input can be mapped back to cells;
/// empty when the terminal cannot fit the board.
pub fn draw(frame: &mut Frame, game: &Game, state: DrawState<'_>) -> Rect {
    let area = frame.area();
    let (w, h) = (game.grid.width(), game.grid.height());
    let (bw, bh) = board_outer_size(w, h);
    if area.width < bw + SIDEBAR_WIDTH || area.height < bh {
        draw_too_small(frame, state.theme, area, (bw + SIDEBAR_WIDTH, bh));
        return Rect::default();
    }
    let (board_outer, sidebar) = split(area, w, h);
    let board = board_rect(area, w, h);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(state.theme.div_line).bg(state.theme.bg))
        .title(Span::styled(
            " Candyboom ",
            Style::default().fg(state.theme.title).add_modifier(Modifier::BOLD),
        ));
    block.render(board_outer, frame.buffer_mut());

    draw_board(frame, game, state.theme, board);

    if !state.exploded.is_empty() && !state.no_animation {
        apply_explosion_effect(
            frame,
            board,
            state.theme,
            state.exploded,
            state.explosion_effect,
            state.explosion_process_time,
            state.now,
        );
    }

    draw_sidebar(frame, game, state.theme, sidebar);
    if state.paused {
        draw_pause_overlay(frame, state.theme, area);
    }
    board
}

fn draw_board(frame: &mut Frame, game: &Game, theme: &Theme, board: Rect) {
    let buf = frame.buffer_mut();
    for y in board.top()..board.bottom() {
        for x in board.left()..board.right() {
            buf[(x, y)].set_symbol(" ").set_style(Style::default().bg(theme.bg));
        }
    }

    for view in game.cell_views() {
        let x0 = board.x + view.col as u16 * CELL_WIDTH;
        let top = board.y as i32 + view.animated_y(CELL_HEIGHT as i32);
        let fill = theme.candy_color(view.kind);
        let rim = theme.candy_rim(view.kind);
        for dy in 0..CELL_HEIGHT as i32 {
            let y = top + dy;
            if y < board.y as i32 || y >= board.bottom() as i32 {
                continue;
            }
            for dx in 0..CELL_WIDTH {
                let x = x0 + dx;
                if x >= board.right() {
                    continue;
                }
                let edge = dx == 0 || dx == CELL_WIDTH - 1;
                // emphasized candies are drawn smaller: no rim
                let bg = match (edge, view.emphasized) {
                    (true, true) => theme.bg,
                    (true, false) => rim,
                    (false, _) => fill,
                };
                buf[(x, y as u16)].set_symbol(" ").set_style(Style::default().bg(bg));
            }
        }
    }

    let (cc, cr) = game.cursor;
    let x0 = board.x + cc as u16 * CELL_WIDTH;
    let y0 = board.y + cr as u16 * CELL_HEIGHT;
    if x0 >= board.right() {
        return;
    }
    let cursor_style = Style::default().fg(theme.cursor).add_modifier(Modifier::BOLD);
    for dy in 0..CELL_HEIGHT {
        let y = y0 + dy;
        if y >= board.bottom() {
            break;
        }
        buf[(x0, y)].set_symbol("[").set_style(cursor_style);
        let right = x0 + CELL_WIDTH - 1;
        if right < board.right() {
            buf[(right, y)].set_symbol("]").set_style(cursor_style);
        }
    }
}

/// Paint exploded cells and fade them back to the board background (TachyonFX).
fn apply_explosion_effect(
    frame: &mut Frame,
    board: Rect,
    theme: &Theme,
    exploded: &HashSet<(usize, usize)>,
    effect: &mut Option<Effect>,
    process_time: &mut Option<Instant>,
    now: Instant,
) {
    let positions = cell_buffer_positions(board, exploded);
    {
        let buf = frame.buffer_mut();
        for &(x, y) in &positions {
            buf[(x, y)].set_style(Style::default().bg(theme.explosion));
        }
    }

    let delta = process_time
        .map(|t| now.saturating_duration_since(t))
        .unwrap_or(std::time::Duration::ZERO);
    let delta_ms = delta.as_millis().min(u32::MAX as u128) as u32;
    *process_time = Some(now);

    if effect.is_none() {
        let filter = CellFilter::PositionFn(ref_count(move |pos: Position| {
            positions.contains(&(pos.x, pos.y))
        }));
        let bg = theme.bg;
        *effect = Some(
            fx::fade_to(bg, bg, (EXPLOSION_FADE_MS, Interpolation::Linear))
                .with_filter(filter)
                .with_area(board),
        );
    }
    if let Some(effect) = effect {
        frame.render_effect(effect, board, TfxDuration::from_millis(delta_ms));
    }
}

fn draw_sidebar(frame: &mut Frame, game: &Game, theme: &Theme, area: Rect) {
    let title_style = Style::default().fg(theme.title);
    let fg_style = Style::default().fg(theme.main_fg);
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(6), // score, high, combo, status
            Constraint::Length(1),
            Constraint::Length(3), // colours
            Constraint::Length(1),
            Constraint::Min(0), // help
        ])
        .split(area);

    let scores = &game.scores;
    let combo_style = if scores.combo > 0 {
        Style::default().fg(theme.explosion).add_modifier(Modifier::BOLD)
    } else {
        fg_style
    };
    let stats = vec![
        Line::from(vec![
            Span::styled("Score: ", title_style),
            Span::styled(scores.score.to_string(), fg_style),
        ]),
        Line::from(vec![
            Span::styled("High:  ", title_style),
            Span::styled(scores.highscore.to_string(), fg_style),
        ]),
        Line::from(vec![
            Span::styled("Combo: ", title_style),
            Span::styled(format!("x{}", scores.multiplier()), combo_style),
        ]),
        Line::from(Span::styled(
            if game.is_dropping() { "dropping..." } else { "your move" },
            title_style,
        )),
    ];
    Paragraph::new(stats)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(theme.div_line).bg(theme.bg)),
        )
        .render(chunks[0], frame.buffer_mut());

    let colours: Vec<Span> = (0..game.kinds())
        .map(|k| Span::styled("██ ", Style::default().fg(theme.candy_color(k))))
        .collect();
    Paragraph::new(Line::from(colours))
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(theme.div_line).bg(theme.bg)),
        )
        .render(chunks[2], frame.buffer_mut());

    let help = vec![
        Line::from(Span::styled("Click  select/swap", fg_style)),
        Line::from(Span::styled("hjkl   move cursor", fg_style)),
        Line::from(Span::styled("Space  select", fg_style)),
        Line::from(Span::styled("P pause  R restart", fg_style)),
        Line::from(Span::styled("Q quit", fg_style)),
    ];
    Paragraph::new(help).render(chunks[4], frame.buffer_mut());
}

fn draw_too_small(frame: &mut Frame, theme: &Theme, area: Rect, need: (u16, u16)) {
    let lines = vec![
        Line::from(Span::styled(
            "Terminal too small",
            Style::default().fg(theme.title).add_modifier(Modifier::BOLD),
        )),
        Line::from(Span::styled(
            format!("need {}x{}, have {}x{}", need.0, need.1, area.width, area.height),
            Style::default().fg(theme.main_fg),
        )),
    ];
    Paragraph::new(lines)
        .alignment(Alignment::Center)
        .render(area, frame.buffer_mut());
}

fn draw_pause_overlay(frame: &mut Frame, theme: &Theme, area: Rect) {
    let popup_w = 28u16;
    let popup_h = 5u16;
    let popup = Rect {
        x: area.x + area.width.saturating_sub(popup_w) / 2,
        y: area.y + area.height.saturating_sub(popup_h) / 2,
        width: popup_w.min(area.width),
        height: popup_h.min(area.height),
    };
    let lines = vec![
        Line::from(""),
        Line::from(Span::styled(
            " Paused ",
            Style::default().fg(Color::Black).bg(Color::Yellow),
        )),
        Line::from(""),
        Line::from(Span::styled(
            " P resume    Q quit ",
            Style::default().fg(theme.main_fg),
        )),
    ];
    Paragraph::new(lines)
        .alignment(Alignment::Center)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(theme.div_line).bg(theme.bg)),
        )
        .render(popup, frame.buffer_mut());
}

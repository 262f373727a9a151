//! Read-only snapshots of the boards and two renderers for them: plain text
//! and an RGBA pixel canvas.

use std::fmt::Write as _;
use std::io::{self, Write};

use crate::config::SimConfig;
use crate::grid::{Cell, Grid};
use crate::pos::Pos;
use crate::snake::Snake;

/// Snapshot of one board and the snake living on it.
#[derive(Clone, Debug)]
pub struct BoardView {
    /// Position in the row-major board layout
    pub slot: usize,
    pub width: usize,
    pub height: usize,
    pub cells: Vec<Cell>,
    pub body: Vec<Pos>,
    pub alive: bool,
}

impl BoardView {
    pub fn capture(slot: usize, grid: &Grid, snake: &Snake) -> Self {
        Self {
            slot,
            width: grid.width(),
            height: grid.height(),
            cells: grid.rows().flatten().copied().collect(),
            body: snake.body().iter().copied().collect(),
            alive: snake.alive(),
        }
    }

    pub fn cell(&self, row: usize, col: usize) -> Cell {
        self.cells[row * self.width + col]
    }

    pub fn head(&self) -> Option<Pos> {
        self.body.first().copied()
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Overlay {
    pub generation: u64,
    pub max_size: usize,
    pub best_size_ever: usize,
}

impl Overlay {
    pub fn lines(&self) -> [String; 3] {
        [
            format!("GEN: {}", self.generation),
            format!("MAX SIZE: {}", self.max_size),
            format!("MAX SIZE ALL: {}", self.best_size_ever),
        ]
    }
}

/// One character per cell: `#` wall, `*` fruit, `@` head, `o` body, `x` a dead
/// snake's body.
pub fn ascii(view: &BoardView) -> String {
    let mut out = String::with_capacity((view.width + 1) * view.height);
    for row in 0..view.height {
        for col in 0..view.width {
            let pos = Pos::new(row as i32, col as i32);
            let ch = if view.head() == Some(pos) {
                if view.alive { '@' } else { 'X' }
            } else {
                match view.cell(row, col) {
                    Cell::Wall => '#',
                    Cell::Fruit => '*',
                    Cell::Occupied if view.alive => 'o',
                    Cell::Occupied => 'x',
                    Cell::Empty => '.',
                }
            };
            out.push(ch);
        }
        out.push('\n');
    }
    out
}

/// Overlay header followed by each board.
pub fn ascii_frame(views: &[BoardView], overlay: &Overlay) -> String {
    let mut out = overlay.lines().join("  ");
    out.push('\n');
    for view in views {
        let _ = writeln!(out, "board {}", view.slot);
        out.push_str(&ascii(view));
    }
    out
}

type Rgba = (u8, u8, u8, u8);

const BACKGROUND: Rgba = (0, 0, 0, 255);
const WALL: Rgba = (90, 90, 110, 255);
const FRUIT: Rgba = (220, 50, 50, 255);
const HEAD: Rgba = (100, 255, 100, 255);
const BODY: Rgba = (50, 200, 50, 255);
const TEXT: Rgba = (255, 255, 255, 255);
/// Walls and fruit fill this share of their cell, snakes fill it whole.
const ITEM_FILL: f32 = 0.75;

/// Pixel geometry of the board layout.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Layout {
    pub frame_width: u32,
    pub frame_height: u32,
    pub cell_width: u32,
    pub cell_height: u32,
    pub cells_w: u32,
    pub cells_h: u32,
    pub boards_per_row: u32,
}

impl Layout {
    /// The requested frame is shrunk until it divides evenly into cells.
    /// A grid of cells wider or taller than the frame yields zero-sized cells.
    pub fn new(config: &SimConfig) -> Self {
        let clamp = |n: usize| u32::try_from(n.max(1)).unwrap_or(u32::MAX);
        let per_row = clamp(config.episodes_per_row);
        let rows = clamp(config.episode_rows());
        let cells_w = clamp(config.cells_per_board_w);
        let cells_h = clamp(config.cells_per_board_h);
        let span_w = cells_w.saturating_mul(per_row);
        let span_h = cells_h.saturating_mul(rows);
        let frame_width = config.board_width - config.board_width % span_w;
        let frame_height = config.board_height - config.board_height % span_h;
        Self {
            frame_width,
            frame_height,
            cell_width: frame_width / span_w,
            cell_height: frame_height / span_h,
            cells_w,
            cells_h,
            boards_per_row: per_row,
        }
    }

    /// Top-left pixel of board `slot`.
    pub fn origin(&self, slot: usize) -> (u32, u32) {
        let slot = u32::try_from(slot).unwrap_or(u32::MAX);
        let col = slot % self.boards_per_row;
        let row = slot / self.boards_per_row;
        (
            col.saturating_mul(self.cells_w).saturating_mul(self.cell_width),
            row.saturating_mul(self.cells_h).saturating_mul(self.cell_height),
        )
    }
}

/// RGBA8 frame buffer.
pub struct Canvas {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl Canvas {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: vec![0; width as usize * height as usize * 4],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let i = (y as usize * self.width as usize + x as usize) * 4;
        Some([self.pixels[i], self.pixels[i + 1], self.pixels[i + 2], self.pixels[i + 3]])
    }

    pub fn clear(&mut self, (r, g, b, a): Rgba) {
        for px in self.pixels.chunks_exact_mut(4) {
            px.copy_from_slice(&[r, g, b, a]);
        }
    }

    /// Alpha-blend one pixel; out-of-frame writes are dropped.
    pub fn blend_pixel(&mut self, x: u32, y: u32, (r, g, b, a): Rgba) {
        if x >= self.width || y >= self.height {
            return;
        }
        let i = (y as usize * self.width as usize + x as usize) * 4;
        let (a, ia) = (a as u16, 255 - a as u16);
        for (k, src) in [r, g, b].into_iter().enumerate() {
            let dst = self.pixels[i + k] as u16;
            self.pixels[i + k] = ((src as u16 * a + dst * ia) / 255) as u8;
        }
        self.pixels[i + 3] = 255;
    }

    pub fn fill_rect(&mut self, x: u32, y: u32, w: u32, h: u32, col: Rgba) {
        let x2 = x.saturating_add(w).min(self.width);
        let y2 = y.saturating_add(h).min(self.height);
        for py in y..y2 {
            for px in x..x2 {
                self.blend_pixel(px, py, col);
            }
        }
    }

    /// Returns the horizontal advance in pixels.
    pub fn draw_char(&mut self, ch: char, x: u32, y: u32, scale: u32, col: Rgba) -> u32 {
        if let Some(rows) = glyph_5x7(ch) {
            for (ry, row) in rows.iter().enumerate() {
                for rx in 0..5u32 {
                    if (row >> (4 - rx)) & 1 == 1 {
                        self.fill_rect(x + rx * scale, y + ry as u32 * scale, scale, scale, col);
                    }
                }
            }
        }
        6 * scale
    }

    pub fn draw_text(&mut self, text: &str, x: u32, y: u32, scale: u32, col: Rgba) {
        let mut cx = x;
        for ch in text.chars() {
            cx += self.draw_char(ch, cx, y, scale, col);
        }
    }

    /// Binary PPM (P6), alpha dropped.
    pub fn write_ppm<W: Write>(&self, mut out: W) -> io::Result<()> {
        write!(out, "P6\n{} {}\n255\n", self.width, self.height)?;
        let rgb: Vec<u8> = self.pixels.chunks_exact(4).flat_map(|px| [px[0], px[1], px[2]]).collect();
        out.write_all(&rgb)
    }
}

/// Draw every board, and the overlay if given, onto a fresh canvas.
pub fn rasterize(layout: &Layout, views: &[BoardView], overlay: Option<&Overlay>) -> Canvas {
    let mut canvas = Canvas::new(layout.frame_width, layout.frame_height);
    canvas.clear(BACKGROUND);

    let (cw, ch) = (layout.cell_width, layout.cell_height);
    let (iw, ih) = ((cw as f32 * ITEM_FILL) as u32, (ch as f32 * ITEM_FILL) as u32);
    let (ix, iy) = ((cw - iw) / 2, (ch - ih) / 2);

    for view in views {
        let (ox, oy) = layout.origin(view.slot);
        for row in 0..view.height {
            for col in 0..view.width {
                let color = match view.cell(row, col) {
                    Cell::Wall => WALL,
                    Cell::Fruit => FRUIT,
                    _ => continue,
                };
                let (x, y) = (ox + col as u32 * cw, oy + row as u32 * ch);
                canvas.fill_rect(x + ix, y + iy, iw, ih, color);
            }
        }
        // dead snakes are not drawn
        if !view.alive {
            continue;
        }
        for (i, p) in view.body.iter().enumerate() {
            let color = if i == 0 { HEAD } else { BODY };
            let (x, y) = (ox + p.col as u32 * cw, oy + p.row as u32 * ch);
            canvas.fill_rect(x, y, cw, ch, color);
        }
    }

    if let Some(overlay) = overlay {
        for (i, line) in overlay.lines().iter().enumerate() {
            canvas.draw_text(line, 12, 10 + i as u32 * 10, 1, TEXT);
        }
    }
    canvas
}

fn glyph_5x7(ch: char) -> Option<[u8; 7]> {
    Some(match ch.to_ascii_uppercase() {
        'A' => [0b01110, 0b10001, 0b10001, 0b11111, 0b10001, 0b10001, 0b10001],
        'E' => [0b11111, 0b10000, 0b11110, 0b10000, 0b10000, 0b10000, 0b11111],
        'G' => [0b01110, 0b10001, 0b10000, 0b10111, 0b10001, 0b10001, 0b01110],
        'I' => [0b11111, 0b00100, 0b00100, 0b00100, 0b00100, 0b00100, 0b11111],
        'L' => [0b10000, 0b10000, 0b10000, 0b10000, 0b10000, 0b10000, 0b11111],
        'M' => [0b10001, 0b11011, 0b10101, 0b10101, 0b10001, 0b10001, 0b10001],
        'N' => [0b10001, 0b11001, 0b10101, 0b10011, 0b10001, 0b10001, 0b10001],
        'S' => [0b01111, 0b10000, 0b10000, 0b01110, 0b00001, 0b00001, 0b11110],
        'X' => [0b10001, 0b10001, 0b01010, 0b00100, 0b01010, 0b10001, 0b10001],
        'Z' => [0b11111, 0b00001, 0b00010, 0b00100, 0b01000, 0b10000, 0b11111],
        '0' => [0b01110, 0b10001, 0b10011, 0b10101, 0b11001, 0b10001, 0b01110],
        '1' => [0b00100, 0b01100, 0b00100, 0b00100, 0b00100, 0b00100, 0b01110],
        '2' => [0b01110, 0b10001, 0b00001, 0b00010, 0b00100, 0b01000, 0b11111],
        '3' => [0b11110, 0b00001, 0b00001, 0b01110, 0b00001, 0b00001, 0b11110],
        '4' => [0b00010, 0b00110, 0b01010, 0b10010, 0b11111, 0b00010, 0b00010],
        '5' => [0b11111, 0b10000, 0b11110, 0b00001, 0b00001, 0b10001, 0b01110],
        '6' => [0b00110, 0b01000, 0b10000, 0b11110, 0b10001, 0b10001, 0b01110],
        '7' => [0b11111, 0b00001, 0b00010, 0b00100, 0b01000, 0b01000, 0b01000],
        '8' => [0b01110, 0b10001, 0b10001, 0b01110, 0b10001, 0b10001, 0b01110],
        '9' => [0b01110, 0b10001, 0b10001, 0b01111, 0b00001, 0b00010, 0b01100],
        ':' => [0b00000, 0b00100, 0b00000, 0b00000, 0b00100, 0b00000, 0b00000],
        ' ' => [0; 7],
        _ => return None,
    })
}

// Snake on a grid of 20 px cells.
// Visual: green snake, red food, score in the corner. w/a/s/d, arrows or swipes steer,
// `p` pauses, `r` restarts after a crash.

use std::collections::VecDeque;
use std::time::Duration;

use crate::compute::raster::{draw_text_5x7, Canvas, Rgba, BLACK, WHITE};
use crate::compute::rng::Rng32;
use crate::compute::{ComputeModule, FrameSink};
use crate::protocol::{InputEvent, SwipeDirection};
use crate::types::Size;

pub const CELL: i32 = 20;
const STEP_INTERVAL: Duration = Duration::from_millis(120);

const SNAKE_COLOR: Rgba = [60, 200, 90, 255];
const FOOD_COLOR: Rgba = [220, 60, 60, 255];

pub struct Snake {
    size: Size,
    cols: i32,
    rows: i32,
    body: VecDeque<(i32, i32)>,
    dir: SwipeDirection,
    next_dir: SwipeDirection,
    food: (i32, i32),
    score: u32,
    paused: bool,
    alive: bool,
    canvas: Canvas,
    rng: Rng32,
}

impl Snake {
    pub fn new() -> Self {
        Self {
            size: Size::default(),
            cols: 0,
            rows: 0,
            body: VecDeque::new(),
            dir: SwipeDirection::Right,
            next_dir: SwipeDirection::Right,
            food: (0, 0),
            score: 0,
            paused: false,
            alive: false,
            canvas: Canvas::new(Size::default(), BLACK),
            rng: Rng32::from_time(),
        }
    }

    fn restart(&mut self, size: Size) {
        self.size = size;
        self.cols = size.width as i32 / CELL;
        self.rows = size.height as i32 / CELL;
        self.canvas = Canvas::new(size, BLACK);
        self.body.clear();
        self.dir = SwipeDirection::Right;
        self.next_dir = SwipeDirection::Right;
        self.score = 0;
        self.paused = false;
        // needs room for a 3-cell snake plus food
        self.alive = self.cols >= 4 && self.rows >= 1;
        if self.alive {
            let row = self.rows / 2;
            for x in (0..3).rev() {
                self.body.push_back((x, row));
            }
            self.place_food();
        }
    }

    fn place_food(&mut self) {
        let free = (self.cols * self.rows) as usize - self.body.len();
        if free == 0 {
            self.alive = false;
            return;
        }
        let mut pick = self.rng.below(free as u32) as usize;
        for y in 0..self.rows {
            for x in 0..self.cols {
                if self.body.contains(&(x, y)) {
                    continue;
                }
                if pick == 0 {
                    self.food = (x, y);
                    return;
                }
                pick -= 1;
            }
        }
    }

    fn steer(&mut self, dir: SwipeDirection) {
        let (dx, dy) = dir.delta();
        let (cx, cy) = self.dir.delta();
        // no reversing into yourself
        if (dx + cx, dy + cy) != (0, 0) {
            self.next_dir = dir;
        }
    }

    fn advance(&mut self) {
        self.dir = self.next_dir;
        let (dx, dy) = self.dir.delta();
        let Some(&(hx, hy)) = self.body.front() else {
            return;
        };
        let head = (hx + dx, hy + dy);
        let out = head.0 < 0 || head.1 < 0 || head.0 >= self.cols || head.1 >= self.rows;
        if out || self.body.contains(&head) {
            self.alive = false;
            return;
        }
        self.body.push_front(head);
        if head == self.food {
            self.score += 1;
            self.place_food();
        } else {
            self.body.pop_back();
        }
    }

    fn render(&mut self, sink: &mut FrameSink) {
        self.canvas.fill(BLACK);
        let (fx, fy) = self.food;
        self.canvas.fill_rect(fx * CELL + 2, fy * CELL + 2, CELL - 4, CELL - 4, FOOD_COLOR);
        for &(x, y) in &self.body {
            self.canvas.fill_rect(x * CELL + 1, y * CELL + 1, CELL - 2, CELL - 2, SNAKE_COLOR);
        }
        let hud = format!("SCORE: {}", self.score);
        draw_text_5x7(&mut self.canvas, 8, 8, &hud, WHITE);
        if self.paused {
            draw_text_5x7(&mut self.canvas, 8, 18, "PAUSED", WHITE);
        } else if !self.alive {
            draw_text_5x7(&mut self.canvas, 8, 18, "GAME OVER", WHITE);
        }
        sink.full(self.canvas.pixels().to_vec(), self.size);
    }

    pub fn score(&self) -> u32 {
        self.score
    }

    pub fn is_alive(&self) -> bool {
        self.alive
    }
}

impl Default for Snake {
    fn default() -> Self {
        Self::new()
    }
}

fn direction_for_key(key: &str) -> Option<SwipeDirection> {
    match key.to_ascii_lowercase().as_str() {
        "w" | "arrowup" => Some(SwipeDirection::Up),
        "s" | "arrowdown" => Some(SwipeDirection::Down),
        "a" | "arrowleft" => Some(SwipeDirection::Left),
        "d" | "arrowright" => Some(SwipeDirection::Right),
        _ => None,
    }
}

impl ComputeModule for Snake {
    fn name(&self) -> &'static str {
        "snake"
    }

    fn start(&mut self, size: Size, sink: &mut FrameSink) {
        self.restart(size);
        self.render(sink);
    }

    fn resize(&mut self, size: Size, sink: &mut FrameSink) {
        if size == self.size || size.is_empty() {
            return;
        }
        self.restart(size);
        self.render(sink);
    }

    fn input(&mut self, event: &InputEvent, sink: &mut FrameSink) {
        match event {
            InputEvent::KeyDown { key } => match key.to_ascii_lowercase().as_str() {
                "p" => {
                    self.paused = !self.paused;
                    self.render(sink);
                }
                "r" => {
                    self.restart(self.size);
                    self.render(sink);
                }
                other => {
                    if let Some(dir) = direction_for_key(other) {
                        self.steer(dir);
                    }
                }
            },
            InputEvent::Swipe { direction } => self.steer(*direction),
            _ => {}
        }
    }

    fn tick(&mut self, sink: &mut FrameSink) {
        if self.paused || !self.alive {
            return;
        }
        self.advance();
        self.render(sink);
    }

    fn tick_interval(&self) -> Option<Duration> {
        Some(STEP_INTERVAL)
    }
}

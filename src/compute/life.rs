// Conway's game of life, one cell per pixel.
// Visual: white cells evolve on black every 100 ms. Click revives a cell; dragging draws a
// line of live cells and holds the population still until the drag ends.

use std::time::Duration;

use crate::compute::raster::{bounding_rect, line_points, Canvas, BLACK, WHITE};
use crate::compute::rng::Rng32;
use crate::compute::{ComputeModule, FrameSink};
use crate::protocol::InputEvent;
use crate::types::{Point, Rect, Size};

const STEP_INTERVAL: Duration = Duration::from_millis(100);
/// Roughly one cell in SEED_SPARSITY starts alive.
const SEED_SPARSITY: u32 = 8;

pub struct GameOfLife {
    size: Size,
    cells: Vec<bool>,
    scratch: Vec<bool>,
    canvas: Canvas,
    paused: bool,
    anchor: Option<Point>,
    rng: Rng32,
}

impl GameOfLife {
    pub fn new() -> Self {
        Self {
            size: Size::default(),
            cells: Vec::new(),
            scratch: Vec::new(),
            canvas: Canvas::new(Size::default(), BLACK),
            paused: false,
            anchor: None,
            rng: Rng32::from_time(),
        }
    }

    fn reset_board(&mut self, size: Size) {
        let n = size.width as usize * size.height as usize;
        self.size = size;
        self.cells = (0..n).map(|_| self.rng.one_in(SEED_SPARSITY)).collect();
        self.scratch = vec![false; n];
        self.canvas = Canvas::new(size, BLACK);
        self.anchor = None;
        self.paused = false;
    }

    fn idx(&self, x: i32, y: i32) -> Option<usize> {
        self.size
            .contains(Point::new(x, y))
            .then(|| y as usize * self.size.width as usize + x as usize)
    }

    fn live_neighbours(&self, x: i32, y: i32) -> u8 {
        let mut n = 0;
        for dy in -1..=1 {
            for dx in -1..=1 {
                if (dx, dy) == (0, 0) {
                    continue;
                }
                if let Some(i) = self.idx(x + dx, y + dy) {
                    n += self.cells[i] as u8;
                }
            }
        }
        n
    }

    /// One generation: survive on 2 or 3, born on 3. Edges are dead.
    pub fn step(&mut self) {
        let (w, h) = (self.size.width as i32, self.size.height as i32);
        for y in 0..h {
            for x in 0..w {
                let i = y as usize * w as usize + x as usize;
                let n = self.live_neighbours(x, y);
                self.scratch[i] = matches!((self.cells[i], n), (true, 2) | (_, 3));
            }
        }
        std::mem::swap(&mut self.cells, &mut self.scratch);
    }

    fn render(&mut self) {
        let w = self.size.width as i32;
        for (i, alive) in self.cells.iter().enumerate() {
            let (x, y) = (i as i32 % w, i as i32 / w);
            self.canvas.put_pixel(x, y, if *alive { WHITE } else { BLACK });
        }
    }

    fn revive(&mut self, p: Point) -> bool {
        match self.idx(p.x, p.y) {
            Some(i) => {
                self.cells[i] = true;
                self.canvas.put_pixel(p.x, p.y, WHITE);
                true
            }
            None => false,
        }
    }

    fn send_region(&mut self, rect: Rect, sink: &mut FrameSink) {
        let (pixels, rect) = self.canvas.region(rect);
        if rect.width > 0 && rect.height > 0 {
            sink.part(pixels, rect);
        }
    }

    fn send_full(&mut self, sink: &mut FrameSink) {
        sink.full(self.canvas.pixels().to_vec(), self.size);
    }

    pub fn is_alive(&self, p: Point) -> bool {
        self.idx(p.x, p.y).is_some_and(|i| self.cells[i])
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }
}

impl Default for GameOfLife {
    fn default() -> Self {
        Self::new()
    }
}

impl ComputeModule for GameOfLife {
    fn name(&self) -> &'static str {
        "game_of_life"
    }

    fn start(&mut self, size: Size, sink: &mut FrameSink) {
        self.reset_board(size);
        self.render();
        self.send_full(sink);
    }

    fn resize(&mut self, size: Size, sink: &mut FrameSink) {
        if size == self.size || size.is_empty() {
            return;
        }
        self.reset_board(size);
        self.render();
        self.send_full(sink);
    }

    fn input(&mut self, event: &InputEvent, sink: &mut FrameSink) {
        match *event {
            InputEvent::Click { x, y } => {
                let p = Point::new(x, y);
                if self.revive(p) {
                    self.send_region(Rect::new(x as u32, y as u32, 1, 1), sink);
                }
            }
            InputEvent::PointerDown { .. } => self.anchor = None,
            InputEvent::PointerMove { x, y } => {
                self.paused = true;
                // drags may leave the canvas; draw along the nearest edge instead
                let p = self.size.clamp(Point::new(x, y));
                let from = self.anchor.unwrap_or(p);
                for q in line_points(from, p) {
                    self.revive(q);
                }
                self.anchor = Some(p);
                self.send_region(bounding_rect(from, p), sink);
            }
            InputEvent::PointerUp { .. } => {
                self.anchor = None;
                self.paused = false;
            }
            InputEvent::Swipe { .. } | InputEvent::KeyDown { .. } => {}
        }
    }

    fn tick(&mut self, sink: &mut FrameSink) {
        if self.paused {
            return;
        }
        self.step();
        self.render();
        self.send_full(sink);
    }

    fn tick_interval(&self) -> Option<Duration> {
        Some(STEP_INTERVAL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::AtomicBool;

    fn sink() -> (FrameSink, flume::Receiver<crate::protocol::Outbound>) {
        let (tx, rx) = flume::unbounded();
        (FrameSink::new(0, tx, Arc::new(AtomicBool::new(false))), rx)
    }

    fn empty_board(size: Size) -> GameOfLife {
        let mut g = GameOfLife::new();
        g.reset_board(size);
        g.cells.iter_mut().for_each(|c| *c = false);
        g
    }

    #[test]
    fn blinker_oscillates() {
        let mut g = empty_board(Size::new(5, 5));
        for x in 1..=3 {
            g.revive(Point::new(x, 2));
        }
        g.step();
        assert!(g.is_alive(Point::new(2, 1)));
        assert!(g.is_alive(Point::new(2, 3)));
        assert!(!g.is_alive(Point::new(1, 2)));
        g.step();
        assert!(g.is_alive(Point::new(1, 2)));
    }

    #[test]
    fn drag_pauses_and_draws_partial_frames() {
        let (mut sink, rx) = sink();
        let mut g = empty_board(Size::new(10, 10));
        g.input(&InputEvent::PointerMove { x: 1, y: 1 }, &mut sink);
        g.input(&InputEvent::PointerMove { x: 4, y: 1 }, &mut sink);
        assert!(g.is_paused());
        assert!((1..=4).all(|x| g.is_alive(Point::new(x, 1))));

        let kinds: Vec<_> = rx
            .drain()
            .filter_map(|o| match o.event {
                crate::protocol::ComputeEvent::Frame(f) => Some(f.rect()),
                _ => None,
            })
            .collect();
        assert_eq!(kinds, vec![Rect::new(1, 1, 1, 1), Rect::new(1, 1, 4, 1)]);

        g.input(&InputEvent::PointerUp { x: 4, y: 1 }, &mut sink);
        assert!(!g.is_paused());
    }

    #[test]
    fn drag_far_off_canvas_stays_on_the_board() {
        let (mut sink, rx) = sink();
        let mut g = empty_board(Size::new(10, 10));
        g.input(&InputEvent::PointerMove { x: 0, y: 0 }, &mut sink);
        g.input(&InputEvent::PointerMove { x: i32::MAX, y: 0 }, &mut sink);
        g.input(&InputEvent::PointerMove { x: i32::MIN, y: i32::MIN }, &mut sink);
        g.input(&InputEvent::PointerMove { x: 3, y: i32::MAX }, &mut sink);

        assert!((0..10).all(|x| g.is_alive(Point::new(x, 0))));
        assert!(g.is_alive(Point::new(3, 9)));
        let rects: Vec<_> = rx
            .drain()
            .filter_map(|o| match o.event {
                crate::protocol::ComputeEvent::Frame(f) => Some(f.rect()),
                _ => None,
            })
            .collect();
        assert_eq!(
            rects,
            vec![
                Rect::new(0, 0, 1, 1),
                Rect::new(0, 0, 10, 1),
                Rect::new(0, 0, 10, 1),
                Rect::new(0, 0, 4, 10),
            ]
        );
    }
}

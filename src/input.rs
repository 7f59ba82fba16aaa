// Turns raw pointer / touch / key input into protocol `InputEvent`s.
// Visual: a short press-release shows up as a click, a press-move-release as a drag.

use crate::protocol::{InputEvent, SwipeDirection};
use crate::types::Point;

/// Pointer-up within this many pixels (exclusive, per axis) of pointer-down is a click.
pub const CLICK_THRESHOLD: i32 = 3;

/// Input as the host sees it, in canvas coordinates (touch also carries screen coordinates).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawInput {
    PointerDown(Point),
    PointerMove(Point),
    PointerUp(Point),
    TouchStart { canvas: Point, screen: Point },
    TouchEnd { canvas: Point, screen: Point },
    Key(String),
}

#[derive(Debug, Default)]
pub struct InputTranslator {
    down_at: Option<Point>,
    prev: Option<Point>,
    touch_start: Option<Point>,
}

impl InputTranslator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn translate(&mut self, raw: RawInput) -> Vec<InputEvent> {
        match raw {
            RawInput::PointerDown(p) => self.pointer_down(p),
            RawInput::PointerMove(p) => self.pointer_move(p),
            RawInput::PointerUp(p) => self.pointer_up(p),
            RawInput::TouchStart { canvas, screen } => {
                self.touch_start = Some(screen);
                self.pointer_down(canvas)
            }
            RawInput::TouchEnd { canvas, screen } => {
                let mut events = self.pointer_up(canvas);
                if let Some(start) = self.touch_start.take() {
                    events.push(InputEvent::Swipe { direction: classify_swipe(start, screen) });
                }
                events
            }
            RawInput::Key(key) => vec![InputEvent::KeyDown { key }],
        }
    }

    fn pointer_down(&mut self, p: Point) -> Vec<InputEvent> {
        self.down_at = Some(p);
        self.prev = Some(p);
        vec![InputEvent::PointerDown { x: p.x, y: p.y }]
    }

    // Two moves per motion: the previous point first so the consumer can release it,
    // then the new one.
    fn pointer_move(&mut self, p: Point) -> Vec<InputEvent> {
        let Some(prev) = self.prev else {
            return Vec::new();
        };
        self.prev = Some(p);
        vec![
            InputEvent::PointerMove { x: prev.x, y: prev.y },
            InputEvent::PointerMove { x: p.x, y: p.y },
        ]
    }

    fn pointer_up(&mut self, p: Point) -> Vec<InputEvent> {
        self.prev = None;
        let Some(down) = self.down_at.take() else {
            return Vec::new();
        };
        if is_click(down, p) {
            vec![InputEvent::Click { x: down.x, y: down.y }]
        } else {
            vec![InputEvent::PointerUp { x: p.x, y: p.y }]
        }
    }
}

pub fn is_click(down: Point, up: Point) -> bool {
    (up.x - down.x).abs() < CLICK_THRESHOLD && (up.y - down.y).abs() < CLICK_THRESHOLD
}

/// Horizontal when |dx| > |dy|, otherwise vertical; the sign picks the side.
pub fn classify_swipe(start: Point, end: Point) -> SwipeDirection {
    let dx = end.x - start.x;
    let dy = end.y - start.y;
    if dx.abs() > dy.abs() {
        if dx > 0 { SwipeDirection::Right } else { SwipeDirection::Left }
    } else if dy > 0 {
        SwipeDirection::Down
    } else {
        SwipeDirection::Up
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn move_without_press_is_ignored() {
        let mut t = InputTranslator::new();
        assert!(t.translate(RawInput::PointerMove(Point::new(4, 4))).is_empty());
        assert!(t.translate(RawInput::PointerUp(Point::new(4, 4))).is_empty());
    }

    #[test]
    fn threshold_is_exclusive() {
        assert!(is_click(Point::new(0, 0), Point::new(2, -2)));
        assert!(!is_click(Point::new(0, 0), Point::new(3, 0)));
        assert!(!is_click(Point::new(0, 0), Point::new(0, -3)));
    }

    #[test]
    fn swipe_ties_fall_to_vertical() {
        assert_eq!(classify_swipe(Point::new(0, 0), Point::new(5, 5)), SwipeDirection::Down);
        assert_eq!(classify_swipe(Point::new(0, 0), Point::new(-5, 5)), SwipeDirection::Down);
        assert_eq!(classify_swipe(Point::new(0, 0), Point::new(-9, 2)), SwipeDirection::Left);
        assert_eq!(classify_swipe(Point::new(0, 0), Point::new(1, -9)), SwipeDirection::Up);
    }

    #[test]
    fn touch_end_reports_release_then_swipe() {
        let mut t = InputTranslator::new();
        t.translate(RawInput::TouchStart { canvas: Point::new(1, 1), screen: Point::new(100, 100) });
        let events = t.translate(RawInput::TouchEnd { canvas: Point::new(1, 40), screen: Point::new(100, 139) });
        assert_eq!(
            events,
            vec![
                InputEvent::PointerUp { x: 1, y: 40 },
                InputEvent::Swipe { direction: SwipeDirection::Down },
            ]
        );
    }
}

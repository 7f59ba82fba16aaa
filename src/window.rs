// Native window: shows render snapshots and turns mouse / keyboard state into RawInput.
// Visual:
// 1) The window shows the newest snapshot the render unit presented.
// 2) Left mouse press / drag / release become pointer events in canvas coordinates.
// 3) Shift + arrow keys stand in for a touch swipe.

use image::RgbaImage;
use minifb::{Key, KeyRepeat, MouseButton, MouseMode, Window, WindowOptions};

use crate::error::{Error, Result};
use crate::input::RawInput;
use crate::types::{Point, Size};

/// How far a synthesized swipe travels, in pixels.
const SWIPE_DISTANCE: i32 = 64;

/// What one poll of the window produced.
#[derive(Debug, Default)]
pub struct Polled {
    pub inputs: Vec<RawInput>,
    pub reload: bool,
    /// Set when the window's client area changed size since the last poll.
    pub resized: Option<Size>,
}

pub struct WindowHost {
    window: Window,
    buffer: Vec<u32>, // 0x00RRGGBB, what you see on screen
    buffer_size: Size,
    window_size: Size,
    mouse_down: bool,
    last_mouse: Option<Point>,
}

impl WindowHost {
    /// Visual: a new black, resizable window with the given title.
    pub fn new(title: &str, size: Size) -> Result<Self> {
        let options = WindowOptions { resize: true, ..WindowOptions::default() };
        let mut window = Window::new(title, size.width as usize, size.height as usize, options)
            .map_err(|e| Error::WindowInit(e.to_string()))?;
        window.set_target_fps(60);
        Ok(Self {
            window,
            buffer: vec![0; size.width as usize * size.height as usize],
            buffer_size: size,
            window_size: size,
            mouse_down: false,
            last_mouse: None,
        })
    }

    /// Measured client-area size: the canvas starting dimensions.
    pub fn size(&self) -> Size {
        let (w, h) = self.window.get_size();
        Size::new(w as u32, h as u32)
    }

    pub fn is_open(&self) -> bool {
        self.window.is_open()
    }

    pub fn esc_pressed(&self) -> bool {
        self.window.is_key_down(Key::Escape)
    }

    /// Copy a snapshot into the screen buffer. Shown on the next `present`.
    pub fn show(&mut self, snapshot: &RgbaImage) {
        let size = Size::new(snapshot.width(), snapshot.height());
        if size != self.buffer_size {
            self.buffer = vec![0; size.width as usize * size.height as usize];
            self.buffer_size = size;
        }
        for (dst, px) in self.buffer.iter_mut().zip(snapshot.pixels()) {
            let [r, g, b, _] = px.0;
            *dst = (r as u32) << 16 | (g as u32) << 8 | b as u32;
        }
    }

    /// Push the screen buffer to the window. Also pumps window events.
    pub fn present(&mut self) -> Result<()> {
        if self.buffer_size.is_empty() {
            self.window.update();
            return Ok(());
        }
        self.window
            .update_with_buffer(
                &self.buffer,
                self.buffer_size.width as usize,
                self.buffer_size.height as usize,
            )
            .map_err(|e| Error::WindowUpdate(e.to_string()))
    }

    /// Read input state accumulated since the last `present`.
    pub fn poll(&mut self) -> Polled {
        let mut polled = Polled::default();

        let size = self.size();
        if size != self.window_size && !size.is_empty() {
            self.window_size = size;
            polled.resized = Some(size);
        }

        let mouse = self
            .window
            .get_mouse_pos(MouseMode::Pass)
            .map(|(x, y)| Point::new(x as i32, y as i32));
        let down = self.window.get_mouse_down(MouseButton::Left);
        match (self.mouse_down, down, mouse) {
            (false, true, Some(p)) => {
                polled.inputs.push(RawInput::PointerDown(p));
                self.mouse_down = true;
            }
            (true, true, Some(p)) if Some(p) != self.last_mouse => {
                polled.inputs.push(RawInput::PointerMove(p));
            }
            (true, false, p) => {
                // released outside the window: use the last position we saw
                if let Some(p) = p.or(self.last_mouse) {
                    polled.inputs.push(RawInput::PointerUp(p));
                }
                self.mouse_down = false;
            }
            _ => {}
        }
        if mouse.is_some() {
            self.last_mouse = mouse;
        }

        let shift = self.window.is_key_down(Key::LeftShift) || self.window.is_key_down(Key::RightShift);
        for key in self.window.get_keys_pressed(KeyRepeat::Yes) {
            if key == Key::F5 {
                polled.reload = true;
                continue;
            }
            if shift {
                if let Some((dx, dy)) = arrow_delta(key) {
                    polled.inputs.extend(self.synth_swipe(dx, dy));
                    continue;
                }
            }
            if let Some(name) = key_name(key, shift) {
                polled.inputs.push(RawInput::Key(name));
            }
        }
        polled
    }

    // touch start at the canvas center, touch end one swipe length away
    fn synth_swipe(&self, dx: i32, dy: i32) -> [RawInput; 2] {
        let center = Point::new(self.window_size.width as i32 / 2, self.window_size.height as i32 / 2);
        let end = Point::new(center.x + dx * SWIPE_DISTANCE, center.y + dy * SWIPE_DISTANCE);
        [
            RawInput::TouchStart { canvas: center, screen: center },
            RawInput::TouchEnd { canvas: end, screen: end },
        ]
    }
}

fn arrow_delta(key: Key) -> Option<(i32, i32)> {
    match key {
        Key::Up => Some((0, -1)),
        Key::Down => Some((0, 1)),
        Key::Left => Some((-1, 0)),
        Key::Right => Some((1, 0)),
        _ => None,
    }
}

/// Browser-style `KeyboardEvent.key` names for the keys modules care about.
fn key_name(key: Key, shift: bool) -> Option<String> {
    let named = match key {
        Key::Up => "ArrowUp",
        Key::Down => "ArrowDown",
        Key::Left => "ArrowLeft",
        Key::Right => "ArrowRight",
        Key::Space => " ",
        Key::Enter => "Enter",
        Key::Tab => "Tab",
        Key::Backspace => "Backspace",
        _ => return letter_or_digit(key, shift),
    };
    Some(named.to_string())
}

fn letter_or_digit(key: Key, shift: bool) -> Option<String> {
    const LETTERS: [Key; 26] = [
        Key::A, Key::B, Key::C, Key::D, Key::E, Key::F, Key::G, Key::H, Key::I, Key::J, Key::K,
        Key::L, Key::M, Key::N, Key::O, Key::P, Key::Q, Key::R, Key::S, Key::T, Key::U, Key::V,
        Key::W, Key::X, Key::Y, Key::Z,
    ];
    const DIGITS: [Key; 10] = [
        Key::Key0, Key::Key1, Key::Key2, Key::Key3, Key::Key4, Key::Key5, Key::Key6, Key::Key7,
        Key::Key8, Key::Key9,
    ];
    if let Some(i) = LETTERS.iter().position(|&k| k == key) {
        let c = (b'a' + i as u8) as char;
        return Some(if shift { c.to_ascii_uppercase() } else { c }.to_string());
    }
    DIGITS
        .iter()
        .position(|&k| k == key)
        .map(|i| ((b'0' + i as u8) as char).to_string())
}

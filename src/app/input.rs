use glam::Vec2;
use winit::event::MouseScrollDelta;

/// Radians of model rotation per pixel of pointer travel.
pub const ROTATION_SPEED: f32 = 0.005;
pub const PIXELS_PER_LINE: f32 = 100.0;

/// Left-button drag tracking for rotating the model.
#[derive(Default, Debug, Clone, Copy, PartialEq)]
pub struct DragState {
    active: bool,
    last: Vec2,
}

impl DragState {
    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn press(&mut self, position: Vec2) {
        self.active = true;
        self.last = position;
    }

    /// Rotation delta `(about Y, about X)` in radians while dragging.
    pub fn motion(&mut self, position: Vec2) -> Option<Vec2> {
        if !self.active {
            return None;
        }
        let delta = position - self.last;
        self.last = position;
        Some(delta * ROTATION_SPEED)
    }

    pub fn release(&mut self) {
        self.active = false;
    }
}

/// Vertical wheel delta in browser pixels, positive when scrolling down.
pub fn wheel_delta_pixels(delta: MouseScrollDelta) -> f32 {
    match delta {
        MouseScrollDelta::LineDelta(_, lines) => -lines * PIXELS_PER_LINE,
        MouseScrollDelta::PixelDelta(pixels) => -pixels.y as f32,
    }
}

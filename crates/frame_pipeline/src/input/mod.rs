//! Input translation
//!
//! Platform events arrive already decoded as [`InputEvent`]s. Pointer and
//! wheel events steer the orbit camera, keys move the selected render item
//! (re-arming its dirty counter), and resizes are handed back to the caller,
//! which owns the renderer.

use crate::foundation::math::Vec3;
use crate::render::primitives::OrbitCamera;
use crate::render::scene::RenderItemCatalog;

/// Keys the viewer reacts to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyCode {
    /// Left arrow
    Left,
    /// Right arrow
    Right,
    /// Up arrow
    Up,
    /// Down arrow
    Down,
    /// Page up
    PageUp,
    /// Page down
    PageDown,
    /// Q key
    Q,
    /// E key
    E,
    /// Tab key
    Tab,
    /// Escape key
    Escape,
    /// Any other key
    Other,
}

/// Decoded platform event
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InputEvent {
    /// Pointer moved to `(x, y)` pixels, with the orbit button held or not
    PointerMoved {
        /// Horizontal position
        x: f32,
        /// Vertical position
        y: f32,
        /// Orbit button held
        dragging: bool,
    },
    /// Wheel turned by `delta` notches
    Wheel {
        /// Notches, positive away from the user
        delta: f32,
    },
    /// Key changed state
    Key {
        /// Key
        code: KeyCode,
        /// Pressed or released
        pressed: bool,
    },
    /// Output surface changed size
    Resized {
        /// New width
        width: u32,
        /// New height
        height: u32,
    },
}

/// What the caller has to do after an event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputResponse {
    /// Nothing
    None,
    /// Resize the renderer
    Resize {
        /// New width
        width: u32,
        /// New height
        height: u32,
    },
    /// Leave the frame loop
    Quit,
}

/// Routes input events to the camera and the selected render item
#[derive(Debug, Clone)]
pub struct InputController {
    selected: usize,
    move_step: f32,
    rotate_step: f32,
}

impl Default for InputController {
    fn default() -> Self {
        Self::new(0.5, 15f32.to_radians())
    }
}

impl InputController {
    /// Controller moving items `move_step` units and `rotate_step` radians per key press
    pub fn new(move_step: f32, rotate_step: f32) -> Self {
        Self {
            selected: 0,
            move_step,
            rotate_step,
        }
    }

    /// Object slot of the selected item
    pub fn selected(&self) -> usize {
        self.selected
    }

    /// Apply `event`
    pub fn handle(&mut self, event: InputEvent, camera: &mut OrbitCamera, catalog: &mut RenderItemCatalog) -> InputResponse {
        match event {
            InputEvent::PointerMoved { x, y, dragging } => {
                camera.on_pointer_moved(x, y, dragging);
                InputResponse::None
            }
            InputEvent::Wheel { delta } => {
                camera.on_wheel(delta);
                InputResponse::None
            }
            InputEvent::Resized { width, height } => InputResponse::Resize { width, height },
            InputEvent::Key { pressed: false, .. } => InputResponse::None,
            InputEvent::Key { code, pressed: true } => self.handle_key(code, catalog),
        }
    }

    fn handle_key(&mut self, code: KeyCode, catalog: &mut RenderItemCatalog) -> InputResponse {
        let step = self.move_step;
        let offset = match code {
            KeyCode::Left => Some(Vec3::new(-step, 0.0, 0.0)),
            KeyCode::Right => Some(Vec3::new(step, 0.0, 0.0)),
            KeyCode::Up => Some(Vec3::new(0.0, 0.0, -step)),
            KeyCode::Down => Some(Vec3::new(0.0, 0.0, step)),
            KeyCode::PageUp => Some(Vec3::new(0.0, step, 0.0)),
            KeyCode::PageDown => Some(Vec3::new(0.0, -step, 0.0)),
            _ => None,
        };

        if let Some(offset) = offset {
            if let Some(item) = catalog.item_mut(self.selected) {
                item.update_transform(|transform| transform.translate(offset));
                log::debug!("Moved '{}' to {:?}", item.name(), item.transform().position);
            }
            return InputResponse::None;
        }

        match code {
            KeyCode::Q | KeyCode::E => {
                let angle = if code == KeyCode::Q { self.rotate_step } else { -self.rotate_step };
                if let Some(item) = catalog.item_mut(self.selected) {
                    item.update_transform(|transform| transform.rotate_y(angle));
                }
                InputResponse::None
            }
            KeyCode::Tab => {
                if catalog.item_count() > 0 {
                    self.selected = (self.selected + 1) % catalog.item_count();
                    if let Some(item) = catalog.item(self.selected) {
                        log::info!("Selected '{}'", item.name());
                    }
                }
                InputResponse::None
            }
            KeyCode::Escape => InputResponse::Quit,
            _ => InputResponse::None,
        }
    }
}

// src/engine_lib/controller.rs

use glam::{Quat, Vec2, Vec3};
use log::warn;
use winit::{
    event::{DeviceEvent, ElementState, MouseButton, WindowEvent},
    keyboard::{KeyCode, PhysicalKey},
    window::{CursorGrabMode, Window},
};

use crate::engine_lib::transform::Transform;

const PITCH_LIMIT: f32 = std::f32::consts::FRAC_PI_2 - 0.01;
const KEY_TURN_RATE: f32 = 1.5;
const DEFAULT_WALK_SPEED: f32 = 3.0;

/// Which portal of the demo pair a placement key asked for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PlacementRequest {
    First,
    Second,
}

#[derive(Clone, Copy, Debug, PartialEq)]
enum KeyAction {
    ToggleGrab,
    Place(PlacementRequest),
    Walk(Vec3),
    /// x is yaw, y is pitch.
    Turn(Vec2),
}

fn key_action(key: KeyCode) -> Option<KeyAction> {
    let action = match key {
        KeyCode::Escape => KeyAction::ToggleGrab,
        KeyCode::Digit1 => KeyAction::Place(PlacementRequest::First),
        KeyCode::Digit2 => KeyAction::Place(PlacementRequest::Second),
        KeyCode::KeyW => KeyAction::Walk(Vec3::NEG_Z),
        KeyCode::KeyS => KeyAction::Walk(Vec3::Z),
        KeyCode::KeyA => KeyAction::Walk(Vec3::NEG_X),
        KeyCode::KeyD => KeyAction::Walk(Vec3::X),
        KeyCode::Space => KeyAction::Walk(Vec3::Y),
        KeyCode::ShiftLeft | KeyCode::ControlLeft => KeyAction::Walk(Vec3::NEG_Y),
        KeyCode::ArrowLeft => KeyAction::Turn(Vec2::X),
        KeyCode::ArrowRight => KeyAction::Turn(Vec2::NEG_X),
        KeyCode::ArrowUp => KeyAction::Turn(Vec2::Y),
        KeyCode::ArrowDown => KeyAction::Turn(Vec2::NEG_Y),
        _ => return None,
    };
    Some(action)
}

/// Holds `direction` on the axes it touches while pressed, zeroes them on release.
fn hold(axes: &mut [f32], direction: &[f32], pressed: bool) {
    for (axis, step) in axes.iter_mut().zip(direction) {
        if *step != 0.0 {
            *axis = if pressed { *step } else { 0.0 };
        }
    }
}

/// First-person viewer input: WASD and mouse look, plus the portal placement keys.
pub struct ViewerController {
    walk: Vec3,
    key_turn: Vec2,
    pending_look: Vec2,
    yaw: f32,
    pitch: f32,
    pub look_sensitivity: f32,
    pub walk_speed: f32,
    cursor_grabbed: bool,
    pending_placement: Option<PlacementRequest>,
}

impl ViewerController {
    pub fn new(yaw: f32, pitch: f32, look_sensitivity: f32) -> Self {
        Self {
            walk: Vec3::ZERO,
            key_turn: Vec2::ZERO,
            pending_look: Vec2::ZERO,
            yaw,
            pitch: pitch.clamp(-PITCH_LIMIT, PITCH_LIMIT),
            look_sensitivity,
            walk_speed: DEFAULT_WALK_SPEED,
            cursor_grabbed: false,
            pending_placement: None,
        }
    }

    pub fn is_cursor_grabbed(&self) -> bool {
        self.cursor_grabbed
    }

    /// Returns true when the event was consumed.
    pub fn handle_window_event(&mut self, event: &WindowEvent, window: &Window) -> bool {
        match event {
            WindowEvent::KeyboardInput { event: key_event, .. } => {
                let PhysicalKey::Code(code) = key_event.physical_key else {
                    return false;
                };
                let pressed = key_event.state == ElementState::Pressed;
                match key_action(code) {
                    Some(KeyAction::ToggleGrab) => {
                        if pressed {
                            self.toggle_cursor_grab(window);
                        }
                        true
                    }
                    Some(action) => self.apply_key(action, pressed),
                    None => false,
                }
            }
            WindowEvent::MouseInput { state: ElementState::Pressed, button: MouseButton::Left, .. }
                if !self.cursor_grabbed =>
            {
                self.grab_cursor(window, true);
                true
            }
            WindowEvent::Focused(false) if self.cursor_grabbed => {
                self.grab_cursor(window, false);
                false
            }
            _ => false,
        }
    }

    fn apply_key(&mut self, action: KeyAction, pressed: bool) -> bool {
        match action {
            KeyAction::Place(request) => {
                if pressed {
                    self.pending_placement = Some(request);
                }
            }
            KeyAction::Walk(direction) => {
                let mut walk = self.walk.to_array();
                hold(&mut walk, &direction.to_array(), pressed);
                self.walk = Vec3::from_array(walk);
            }
            KeyAction::Turn(direction) => {
                let mut turn = self.key_turn.to_array();
                hold(&mut turn, &direction.to_array(), pressed);
                self.key_turn = Vec2::from_array(turn);
            }
            KeyAction::ToggleGrab => return false,
        }
        true
    }

    pub fn handle_device_event(&mut self, event: &DeviceEvent) {
        if !self.cursor_grabbed {
            self.pending_look = Vec2::ZERO;
            return;
        }
        if let DeviceEvent::MouseMotion { delta: (dx, dy) } = event {
            self.pending_look += Vec2::new(*dx as f32, *dy as f32);
        }
    }

    /// The placement key pressed since the last call, if any.
    pub fn take_placement_request(&mut self) -> Option<PlacementRequest> {
        self.pending_placement.take()
    }

    pub fn toggle_cursor_grab(&mut self, window: &Window) {
        self.grab_cursor(window, !self.cursor_grabbed);
    }

    fn grab_cursor(&mut self, window: &Window, grab: bool) {
        if grab == self.cursor_grabbed {
            return;
        }
        let mode = if grab { CursorGrabMode::Confined } else { CursorGrabMode::None };
        let result = window.set_cursor_grab(mode).or_else(|e| {
            // some platforms only support one of the two grab modes
            if grab { window.set_cursor_grab(CursorGrabMode::Locked) } else { Err(e) }
        });
        match result {
            Ok(()) => {
                window.set_cursor_visible(!grab);
                self.cursor_grabbed = grab;
                self.pending_look = Vec2::ZERO;
            }
            Err(e) => warn!("could not change cursor grab to {grab}: {e}"),
        }
    }

    /// Consumes accumulated input and moves `transform`. Called once per frame
    /// before any portal pass reads the viewer.
    pub fn apply_to_transform(&mut self, transform: &mut Transform, dt: f32) {
        let look = self.key_turn * KEY_TURN_RATE * dt - self.pending_look * self.look_sensitivity;
        self.pending_look = Vec2::ZERO;

        self.yaw += look.x;
        self.pitch = (self.pitch + look.y).clamp(-PITCH_LIMIT, PITCH_LIMIT);

        let rotation = Quat::from_rotation_y(self.yaw) * Quat::from_rotation_x(self.pitch);
        transform.rotation = rotation;
        transform.position += rotation * (self.walk * self.walk_speed * dt);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opposite_keys_share_an_axis() {
        let mut controller = ViewerController::new(0.0, 0.0, 0.002);
        controller.apply_key(KeyAction::Walk(Vec3::NEG_Z), true);
        controller.apply_key(KeyAction::Walk(Vec3::X), true);
        assert_eq!(controller.walk, Vec3::new(1.0, 0.0, -1.0));

        controller.apply_key(KeyAction::Walk(Vec3::Z), true);
        assert_eq!(controller.walk.z, 1.0);
        controller.apply_key(KeyAction::Walk(Vec3::Z), false);
        assert_eq!(controller.walk, Vec3::X);
    }

    #[test]
    fn walking_follows_yaw() {
        let mut controller = ViewerController::new(std::f32::consts::FRAC_PI_2, 0.0, 0.002);
        controller.apply_key(key_action(KeyCode::KeyW).unwrap(), true);
        let mut transform = Transform::IDENTITY;
        controller.apply_to_transform(&mut transform, 1.0);
        // facing -X after a quarter turn left
        assert!(transform.position.abs_diff_eq(Vec3::new(-DEFAULT_WALK_SPEED, 0.0, 0.0), 1e-4), "{:?}", transform.position);
    }

    #[test]
    fn pitch_is_clamped() {
        let mut controller = ViewerController::new(0.0, 0.0, 0.002);
        controller.apply_key(KeyAction::Turn(Vec2::Y), true);
        let mut transform = Transform::IDENTITY;
        controller.apply_to_transform(&mut transform, 10.0);
        assert_eq!(controller.pitch, PITCH_LIMIT);
        assert!(transform.rotation.is_normalized());
    }

    #[test]
    fn placement_keys_queue_one_request() {
        let mut controller = ViewerController::new(0.0, 0.0, 0.002);
        for key in [KeyCode::Digit1, KeyCode::Digit2] {
            if let Some(action) = key_action(key) {
                controller.apply_key(action, true);
                controller.apply_key(action, false);
            }
        }
        assert_eq!(controller.take_placement_request(), Some(PlacementRequest::Second));
        assert_eq!(controller.take_placement_request(), None);
    }
}

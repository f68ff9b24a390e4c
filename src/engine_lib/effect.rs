// src/engine_lib/effect.rs

use glam::Vec3;

use crate::engine_lib::portal::Portal;
use crate::engine_lib::transform::Transform;

pub const CENTER_POSITION: &str = "CenterPosition";
pub const CENTER_FORWARD: &str = "CenterForward";
pub const RADIUS: &str = "Radius";

/// Receiver of a portal's opening-effect parameters, usually a material or
/// uniform block.
pub trait VisualEffectSink {
    fn set_vector3(&mut self, name: &str, value: Vec3);
    fn set_float(&mut self, name: &str, value: f32);
}

/// Per-portal change tracking for effect parameters. Centre and forward are
/// pushed only when the transform moved since the last push; the radius goes
/// out every frame.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct PortalEffectBinding {
    last_pushed: Option<Transform>,
}

impl PortalEffectBinding {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true when the transform parameters were pushed.
    pub fn sync(&mut self, portal: &Portal, sink: &mut impl VisualEffectSink) -> bool {
        let transform = portal.transform();
        let moved = self.last_pushed != Some(transform);
        if moved {
            sink.set_vector3(CENTER_POSITION, transform.position);
            sink.set_vector3(CENTER_FORWARD, transform.forward());
            self.last_pushed = Some(transform);
        }
        sink.set_float(RADIUS, portal.growth_radius());
        moved
    }

    pub fn reset(&mut self) {
        self.last_pushed = None;
    }
}

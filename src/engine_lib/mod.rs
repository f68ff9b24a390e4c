// src/engine_lib/mod.rs
pub mod transform;
pub mod config;
pub mod portal;
pub mod registry;
pub mod solver;
pub mod projector;
pub mod frustum;
pub mod camera;
pub mod scheduler;
pub mod placement;
pub mod effect;
pub mod controller; // input handling for the demo viewer

pub use transform::{Transform, Plane, OrientedBox};
pub use config::{PortalConfig, ConfigError};
pub use portal::{Portal, PortalState, PlacementError, PlacementSurface, SurfaceContact, OutputBuffer};
pub use registry::{PortalHandle, PortalRegistry};
pub use camera::{ViewerState, VirtualCamera};
pub use frustum::Frustum;
pub use scheduler::{FrameReport, PortalRenderScheduler, SceneRenderer};
pub use placement::PortalPlacementController;
pub use effect::{PortalEffectBinding, VisualEffectSink};
pub use controller::{PlacementRequest, ViewerController};

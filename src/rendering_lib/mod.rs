// src/rendering_lib/mod.rs

pub mod renderer;
pub mod shader;
pub mod targets;
pub mod vertex;

pub use renderer::{surface_quad, GpuFrame, PortalRenderer, SurfaceDraw};
pub use targets::{PortalTargets, SurfaceParams, PORTAL_TARGET_FORMAT};
pub use vertex::{SceneVertex, SurfaceVertex};

// src/lib.rs

pub mod engine_lib;
pub mod rendering_lib;

pub use engine_lib::{
    FrameReport, PlacementError, Portal, PortalConfig, PortalHandle, PortalPlacementController, PortalRegistry,
    PortalRenderScheduler, PortalState, SceneRenderer, Transform, ViewerState, VirtualCamera,
};

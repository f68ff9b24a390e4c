// src/app.rs

use std::collections::HashMap;
use std::fmt;

use glam::UVec2;
use log::{info, warn};
use winit::{
    event::{DeviceEvent, WindowEvent},
    window::Window,
};

use magic_portal::engine_lib::controller::{PlacementRequest, ViewerController};
use magic_portal::engine_lib::effect::PortalEffectBinding;
use magic_portal::engine_lib::transform::Transform;
use magic_portal::rendering_lib::{surface_quad, PortalRenderer};
use magic_portal::{
    Portal, PortalConfig, PortalHandle, PortalPlacementController, PortalRegistry, PortalRenderScheduler,
    ViewerState,
};

use crate::demo_scene::{self, DemoRoom};
use crate::ui::{build_ui, PortalInfo};

#[derive(Debug)]
pub enum AppError {
    CreateSurface(wgpu::CreateSurfaceError),
    NoAdapter,
    RequestDevice(wgpu::RequestDeviceError),
    NoSurfaceFormat,
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CreateSurface(e) => write!(f, "failed to create window surface: {e}"),
            Self::NoAdapter => write!(f, "no compatible graphics adapter found"),
            Self::RequestDevice(e) => write!(f, "failed to open graphics device: {e}"),
            Self::NoSurfaceFormat => write!(f, "window surface reports no usable format"),
        }
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::CreateSurface(e) => Some(e),
            Self::RequestDevice(e) => Some(e),
            Self::NoAdapter | Self::NoSurfaceFormat => None,
        }
    }
}

pub struct PortalApp {
    surface: wgpu::Surface<'static>,
    device: wgpu::Device,
    queue: wgpu::Queue,
    config: wgpu::SurfaceConfiguration,
    size: winit::dpi::PhysicalSize<u32>,
    renderer: PortalRenderer,
    room: DemoRoom,
    registry: PortalRegistry,
    scheduler: PortalRenderScheduler,
    placement: PortalPlacementController,
    pair: [PortalHandle; 2],
    effect_bindings: HashMap<PortalHandle, PortalEffectBinding>,
    portal_config: PortalConfig,
    viewer: Transform,
    controller: ViewerController,
    egui_ctx: egui::Context,
    egui_state: egui_winit::State,
    egui_renderer: egui_wgpu::Renderer,
    is_focused: bool,
}

impl PortalApp {
    pub async fn new(window: std::sync::Arc<Window>, portal_config: PortalConfig) -> Result<Self, AppError> {
        let size = window.inner_size();
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor::default());
        let surface = instance.create_surface(window.clone()).map_err(AppError::CreateSurface)?;
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::default(),
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .ok_or(AppError::NoAdapter)?;
        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits::default(),
                    label: None,
                },
                None,
            )
            .await
            .map_err(AppError::RequestDevice)?;

        let surface_caps = surface.get_capabilities(&adapter);
        let surface_format = surface_caps
            .formats
            .iter()
            .copied()
            .find(|f| f.is_srgb())
            .or_else(|| surface_caps.formats.first().copied())
            .ok_or(AppError::NoSurfaceFormat)?;
        let alpha_mode = surface_caps.alpha_modes.first().copied().unwrap_or(wgpu::CompositeAlphaMode::Auto);

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: wgpu::PresentMode::Fifo,
            alpha_mode,
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);
        let viewport = UVec2::new(config.width, config.height);

        let room = demo_scene::create_demo_room();
        let renderer = PortalRenderer::new(&device, config.format, viewport, &room.vertices, &room.indices);

        let egui_ctx = egui::Context::default();
        let egui_state = egui_winit::State::new(
            egui_ctx.clone(), egui::ViewportId::ROOT, &window,
            Some(window.scale_factor() as f32),
            None,
        );
        let egui_renderer = egui_wgpu::Renderer::new(&device, config.format, None, 1);

        let mut registry = PortalRegistry::new();
        let placement = PortalPlacementController::new(portal_config.clone(), viewport);
        let (first, second) = placement.spawn_pair(&mut registry, ["blue", "orange"], demo_scene::PORTAL_COLORS);
        for (handle, contact) in [first, second].into_iter().zip(room.initial_contacts()) {
            if !placement.request_placement(&mut registry, handle, &contact, glam::Quat::IDENTITY) {
                warn!("initial portal placement failed");
            }
        }

        let viewer = Transform::new(
            demo_scene::INITIAL_VIEWER_POSITION,
            glam::Quat::from_rotation_y(demo_scene::INITIAL_VIEWER_YAW),
        );
        let mut controller = ViewerController::new(demo_scene::INITIAL_VIEWER_YAW, 0.0, 0.002);
        let initial_focus = window.has_focus();
        if initial_focus {
            controller.toggle_cursor_grab(&window);
        }

        Ok(Self {
            surface, device, queue, config, size,
            renderer, room, registry,
            scheduler: PortalRenderScheduler::new(portal_config.iterations),
            placement,
            pair: [first, second],
            effect_bindings: HashMap::new(),
            portal_config,
            viewer,
            controller,
            egui_ctx, egui_state, egui_renderer,
            is_focused: initial_focus,
        })
    }

    pub fn get_size(&self) -> winit::dpi::PhysicalSize<u32> { self.size }

    pub fn resize(&mut self, new_size: winit::dpi::PhysicalSize<u32>) {
        if new_size.width > 0 && new_size.height > 0 {
            self.size = new_size;
            self.config.width = new_size.width;
            self.config.height = new_size.height;
            self.surface.configure(&self.device, &self.config);
            let viewport = UVec2::new(new_size.width, new_size.height);
            self.renderer.resize(&self.device, viewport);
            self.placement.resize(viewport);
        }
    }

    pub fn set_focused(&mut self, focused: bool) {
        self.is_focused = focused;
    }

    /// Input, placement and growth. Runs once per frame before `render`.
    pub fn update(&mut self, dt: f32) {
        // growth keeps running in the background, input does not
        if !self.is_focused {
            self.placement.advance(&mut self.registry, dt);
            return;
        }
        self.controller.apply_to_transform(&mut self.viewer, dt);

        if let Some(request) = self.controller.take_placement_request() {
            let handle = match request {
                PlacementRequest::First => self.pair[0],
                PlacementRequest::Second => self.pair[1],
            };
            match self.room.pick(self.viewer.position, self.viewer.forward()) {
                Some(contact) => {
                    self.placement.request_placement(&mut self.registry, handle, &contact, self.viewer.rotation);
                }
                None => info!("no surface in view to place a portal on"),
            }
        }

        self.placement.advance(&mut self.registry, dt);
    }

    pub fn render(&mut self, window: &Window) -> Result<(), wgpu::SurfaceError> {
        let output_texture = self.surface.get_current_texture()?;
        let view = output_texture.texture.create_view(&wgpu::TextureViewDescriptor::default());
        let mut encoder = self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Main Command Encoder"),
        });

        let viewport = UVec2::new(self.config.width, self.config.height);
        let viewer = ViewerState::from_config(self.viewer, &self.portal_config, viewport);

        // effect parameters and surface quads of every placed portal
        let mut quads = Vec::new();
        for handle in self.registry.handles() {
            let Some(portal) = self.registry.get(handle) else { continue };
            if !portal.is_placed() {
                continue;
            }
            let target = self.renderer.targets.entry(&self.device, handle);
            target.params.set_shape(portal.color, portal.half_extents().to_array(), reveal_scale(&portal));
            self.effect_bindings.entry(handle).or_default().sync(&portal, &mut target.params);
            quads.push((handle, surface_quad(&portal)));
        }
        let surfaces = self.renderer.upload_surfaces(&self.device, &self.queue, &quads);
        self.renderer.reserve_passes(&self.device, self.scheduler.iterations() * quads.len() as u32);

        let report = {
            let mut frame = self.renderer.begin_frame(&self.device, &self.queue, &mut encoder, &surfaces);
            self.scheduler.render_all(&viewer, &mut self.registry, &mut frame)
        };

        for draw in &surfaces {
            let fresh = self
                .registry
                .get(draw.handle)
                .and_then(|portal| portal.output().map(|output| output.is_fresh(report.frame)))
                .unwrap_or(false);
            if let Some(target) = self.renderer.targets.get_mut(draw.handle) {
                target.params.set_fresh(fresh);
                target.write_params(&self.queue);
            }
        }

        self.renderer.render_main(&self.queue, &mut encoder, &view, viewer.view_projection(), viewport, &surfaces);

        let infos: Vec<PortalInfo> = self
            .registry
            .handles()
            .into_iter()
            .filter_map(|handle| {
                let portal = self.registry.get(handle)?;
                Some(PortalInfo {
                    name: portal.name.clone(),
                    state: portal.state(),
                    radius: portal.growth_radius(),
                    fresh: portal.output().is_some_and(|output| output.is_fresh(report.frame)),
                })
            })
            .collect();
        let mut iterations = self.scheduler.iterations();

        let raw_input = self.egui_state.take_egui_input(window);
        let full_output = self.egui_ctx.run(raw_input, |ctx| { build_ui(ctx, &mut iterations, &infos, &report); });
        self.egui_state.handle_platform_output(window, full_output.platform_output);
        let tris = self.egui_ctx.tessellate(full_output.shapes, self.egui_ctx.pixels_per_point());
        for (id, image_delta) in &full_output.textures_delta.set {
            self.egui_renderer.update_texture(&self.device, &self.queue, *id, image_delta);
        }
        let screen_descriptor = egui_wgpu::ScreenDescriptor {
            size_in_pixels: [self.config.width, self.config.height],
            pixels_per_point: window.scale_factor() as f32,
        };
        self.egui_renderer.update_buffers(&self.device, &self.queue, &mut encoder, &tris, &screen_descriptor);
        {
            let mut gui_render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("GUI Render Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view, resolve_target: None,
                    ops: wgpu::Operations { load: wgpu::LoadOp::Load, store: wgpu::StoreOp::Store },
                })],
                depth_stencil_attachment: None, occlusion_query_set: None, timestamp_writes: None,
            });
            self.egui_renderer.render(&mut gui_render_pass, &tris, &screen_descriptor);
        }
        for tex_id in &full_output.textures_delta.free { self.egui_renderer.free_texture(tex_id); }

        self.queue.submit(std::iter::once(encoder.finish()));
        output_texture.present();

        self.scheduler.set_iterations(iterations);
        self.renderer.targets.retain(|handle| self.registry.contains(handle));
        self.effect_bindings.retain(|handle, _| self.registry.contains(*handle));
        Ok(())
    }

    pub fn handle_window_event(&mut self, event: &WindowEvent, window: &Window) -> bool {
        if self.egui_state.on_window_event(window, event).consumed { return true; }
        if self.controller.handle_window_event(event, window) { return true; }
        match event {
            WindowEvent::Focused(focused) => { self.is_focused = *focused; false }
            _ => false,
        }
    }

    pub fn handle_device_event(&mut self, event: &DeviceEvent, _window: &Window) {
        self.controller.handle_device_event(event);
    }
}

/// Scale that lets the full growth radius uncover the portal's corners.
fn reveal_scale(portal: &Portal) -> f32 {
    let max_radius = portal.growth().max_radius();
    if max_radius <= f32::EPSILON {
        return 0.0;
    }
    portal.half_extents().length() / max_radius
}

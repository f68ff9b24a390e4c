// src/rendering_lib/renderer.rs

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, UVec2, Vec3};
use log::{debug, warn};
use wgpu::util::DeviceExt;

use super::shader::{PORTAL_SURFACE_SHADER_SOURCE, SCENE_SHADER_SOURCE};
use super::targets::{PortalTargets, DEPTH_FORMAT, PORTAL_TARGET_FORMAT};
use super::vertex::{SceneVertex, SurfaceVertex};

use crate::engine_lib::camera::VirtualCamera;
use crate::engine_lib::portal::{OutputBuffer, Portal};
use crate::engine_lib::registry::PortalHandle;
use crate::engine_lib::scheduler::SceneRenderer;

const SURFACE_VERTICES_PER_PORTAL: u32 = 6;
const INITIAL_SURFACE_CAPACITY: usize = 16;
const INITIAL_CAMERA_SLOTS: u32 = 64;

#[repr(C)]
#[derive(Debug, Copy, Clone, Pod, Zeroable)]
struct CameraUniform {
    view_proj: [[f32; 4]; 4],
    viewport: [f32; 4],
}

impl CameraUniform {
    fn new(view_proj: Mat4, viewport: UVec2) -> Self {
        Self {
            view_proj: view_proj.to_cols_array_2d(),
            viewport: [viewport.x as f32, viewport.y as f32, 0.0, 0.0],
        }
    }
}

/// One portal surface quad in this frame's surface vertex buffer.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SurfaceDraw {
    pub handle: PortalHandle,
    pub first_vertex: u32,
}

/// Triangle list for a portal's surface rectangle.
pub fn surface_quad(portal: &Portal) -> [SurfaceVertex; 6] {
    let transform = portal.transform();
    let half = portal.half_extents();
    let right = transform.right() * half.x * transform.scale.x;
    let up = transform.up() * half.y * transform.scale.y;
    let c = transform.position;
    let corner = |p: Vec3| SurfaceVertex { position: p.to_array() };
    let (bl, br, tr, tl) = (c - right - up, c + right - up, c + right + up, c - right + up);
    [corner(bl), corner(br), corner(tr), corner(bl), corner(tr), corner(tl)]
}

struct Pipelines {
    scene: wgpu::RenderPipeline,
    surface: wgpu::RenderPipeline,
}

/// wgpu backend: the world mesh, portal surfaces and every portal's targets.
pub struct PortalRenderer {
    main_pipelines: Pipelines,
    portal_pipelines: Pipelines,
    camera_layout: wgpu::BindGroupLayout,
    camera_buffer: wgpu::Buffer,
    camera_bind_group: wgpu::BindGroup,
    camera_stride: u32,
    camera_slots: u32,
    scene_vertex_buffer: wgpu::Buffer,
    scene_index_buffer: wgpu::Buffer,
    scene_index_count: u32,
    surface_vertex_buffer: wgpu::Buffer,
    surface_capacity: usize,
    depth_view: wgpu::TextureView,
    pub targets: PortalTargets,
    pub clear_color: wgpu::Color,
}

impl PortalRenderer {
    pub fn new(
        device: &wgpu::Device,
        surface_format: wgpu::TextureFormat,
        viewport: UVec2,
        scene_vertices: &[SceneVertex],
        scene_indices: &[u32],
    ) -> Self {
        let scene_module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Scene Shader Module"),
            source: wgpu::ShaderSource::Wgsl(SCENE_SHADER_SOURCE.into()),
        });
        let surface_module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Portal Surface Shader Module"),
            source: wgpu::ShaderSource::Wgsl(PORTAL_SURFACE_SHADER_SOURCE.into()),
        });

        let camera_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: true,
                    min_binding_size: wgpu::BufferSize::new(std::mem::size_of::<CameraUniform>() as u64),
                },
                count: None,
            }],
            label: Some("camera_bind_group_layout"),
        });

        let alignment = device.limits().min_uniform_buffer_offset_alignment;
        let camera_stride = (std::mem::size_of::<CameraUniform>() as u32).div_ceil(alignment) * alignment;
        let (camera_buffer, camera_bind_group) =
            create_camera_storage(device, &camera_layout, camera_stride, INITIAL_CAMERA_SLOTS);

        let targets = PortalTargets::new(device);

        let scene_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Scene Pipeline Layout"),
            bind_group_layouts: &[&camera_layout],
            push_constant_ranges: &[],
        });
        let surface_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Portal Surface Pipeline Layout"),
            bind_group_layouts: &[&camera_layout, targets.bind_group_layout()],
            push_constant_ranges: &[],
        });

        let build = |format: wgpu::TextureFormat| Pipelines {
            scene: create_pipeline(device, &scene_layout, &scene_module, SceneVertex::desc(), format, "Scene Pipeline"),
            surface: create_pipeline(
                device,
                &surface_layout,
                &surface_module,
                SurfaceVertex::desc(),
                format,
                "Portal Surface Pipeline",
            ),
        };
        let main_pipelines = build(surface_format);
        let portal_pipelines = build(PORTAL_TARGET_FORMAT);

        let scene_vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Scene Vertex Buffer"),
            contents: bytemuck::cast_slice(scene_vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let scene_index_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Scene Index Buffer"),
            contents: bytemuck::cast_slice(scene_indices),
            usage: wgpu::BufferUsages::INDEX,
        });

        let surface_vertex_buffer = create_surface_buffer(device, INITIAL_SURFACE_CAPACITY);

        Self {
            main_pipelines,
            portal_pipelines,
            camera_layout,
            camera_buffer,
            camera_bind_group,
            camera_stride,
            camera_slots: INITIAL_CAMERA_SLOTS,
            scene_vertex_buffer,
            scene_index_buffer,
            scene_index_count: scene_indices.len() as u32,
            surface_vertex_buffer,
            surface_capacity: INITIAL_SURFACE_CAPACITY,
            depth_view: create_depth_view(device, viewport, "Main Depth"),
            targets,
            clear_color: wgpu::Color { r: 0.05, g: 0.05, b: 0.1, a: 1.0 },
        }
    }

    pub fn resize(&mut self, device: &wgpu::Device, viewport: UVec2) {
        self.depth_view = create_depth_view(device, viewport, "Main Depth");
    }

    /// Makes room for `passes` portal passes plus the main view this frame.
    pub fn reserve_passes(&mut self, device: &wgpu::Device, passes: u32) {
        let needed = passes + 1;
        if needed <= self.camera_slots {
            return;
        }
        let slots = needed.next_power_of_two();
        let (buffer, bind_group) = create_camera_storage(device, &self.camera_layout, self.camera_stride, slots);
        self.camera_buffer = buffer;
        self.camera_bind_group = bind_group;
        self.camera_slots = slots;
        debug!("camera uniform grown to {slots} slots");
    }

    /// Uploads this frame's portal quads and returns where each one landed.
    pub fn upload_surfaces(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        quads: &[(PortalHandle, [SurfaceVertex; 6])],
    ) -> Vec<SurfaceDraw> {
        if quads.len() > self.surface_capacity {
            self.surface_capacity = quads.len().next_power_of_two();
            self.surface_vertex_buffer = create_surface_buffer(device, self.surface_capacity);
        }
        let vertices: Vec<SurfaceVertex> = quads.iter().flat_map(|(_, quad)| quad.iter().copied()).collect();
        if !vertices.is_empty() {
            queue.write_buffer(&self.surface_vertex_buffer, 0, bytemuck::cast_slice(&vertices));
        }
        quads
            .iter()
            .enumerate()
            .map(|(i, (handle, _))| SurfaceDraw { handle: *handle, first_vertex: i as u32 * SURFACE_VERTICES_PER_PORTAL })
            .collect()
    }

    fn write_camera(&self, queue: &wgpu::Queue, slot: u32, view_proj: Mat4, viewport: UVec2) {
        let uniform = CameraUniform::new(view_proj, viewport);
        queue.write_buffer(
            &self.camera_buffer,
            slot as u64 * self.camera_stride as u64,
            bytemuck::bytes_of(&uniform),
        );
    }

    fn draw_world<'p>(
        &'p self,
        pass: &mut wgpu::RenderPass<'p>,
        pipelines: &'p Pipelines,
        slot: u32,
        surfaces: &[SurfaceDraw],
        hidden: Option<PortalHandle>,
    ) {
        let offset = slot * self.camera_stride;

        pass.set_pipeline(&pipelines.scene);
        pass.set_bind_group(0, &self.camera_bind_group, &[offset]);
        pass.set_vertex_buffer(0, self.scene_vertex_buffer.slice(..));
        pass.set_index_buffer(self.scene_index_buffer.slice(..), wgpu::IndexFormat::Uint32);
        pass.draw_indexed(0..self.scene_index_count, 0, 0..1);

        if surfaces.is_empty() {
            return;
        }
        pass.set_pipeline(&pipelines.surface);
        pass.set_bind_group(0, &self.camera_bind_group, &[offset]);
        pass.set_vertex_buffer(0, self.surface_vertex_buffer.slice(..));
        for draw in surfaces {
            if Some(draw.handle) == hidden {
                continue;
            }
            let Some(target) = self.targets.get(draw.handle) else {
                continue;
            };
            pass.set_bind_group(1, target.front_bind_group(), &[]);
            pass.draw(draw.first_vertex..draw.first_vertex + SURFACE_VERTICES_PER_PORTAL, 0..1);
        }
    }

    /// Records the main view into `view`. Portal passes must already be recorded.
    pub fn render_main(
        &self,
        queue: &wgpu::Queue,
        encoder: &mut wgpu::CommandEncoder,
        view: &wgpu::TextureView,
        view_proj: Mat4,
        viewport: UVec2,
        surfaces: &[SurfaceDraw],
    ) {
        self.write_camera(queue, 0, view_proj, viewport);

        let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Main Render Pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view,
                resolve_target: None,
                ops: wgpu::Operations { load: wgpu::LoadOp::Clear(self.clear_color), store: wgpu::StoreOp::Store },
            })],
            depth_stencil_attachment: Some(depth_attachment(&self.depth_view)),
            occlusion_query_set: None,
            timestamp_writes: None,
        });
        self.draw_world(&mut render_pass, &self.main_pipelines, 0, surfaces, None);
    }

    fn render_portal_pass(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        target: PortalHandle,
        slot: u32,
        exit: Option<PortalHandle>,
        surfaces: &[SurfaceDraw],
    ) {
        let Some(portal_target) = self.targets.get(target) else {
            return;
        };
        let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Portal Render Pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: portal_target.back_view(),
                resolve_target: None,
                ops: wgpu::Operations { load: wgpu::LoadOp::Clear(self.clear_color), store: wgpu::StoreOp::Store },
            })],
            depth_stencil_attachment: Some(depth_attachment(portal_target.depth_view())),
            occlusion_query_set: None,
            timestamp_writes: None,
        });
        // the exit's own quad sits on the near plane
        self.draw_world(&mut render_pass, &self.portal_pipelines, slot, surfaces, exit);
    }

    /// Starts recording this frame's portal passes into `encoder`.
    pub fn begin_frame<'a>(
        &'a mut self,
        device: &'a wgpu::Device,
        queue: &'a wgpu::Queue,
        encoder: &'a mut wgpu::CommandEncoder,
        surfaces: &'a [SurfaceDraw],
    ) -> GpuFrame<'a> {
        GpuFrame { renderer: self, device, queue, encoder, surfaces, next_slot: 1 }
    }
}

/// `SceneRenderer` over one frame's command encoder. Slot 0 of the camera
/// uniform is the main view; portal passes take the following slots.
pub struct GpuFrame<'a> {
    renderer: &'a mut PortalRenderer,
    device: &'a wgpu::Device,
    queue: &'a wgpu::Queue,
    encoder: &'a mut wgpu::CommandEncoder,
    surfaces: &'a [SurfaceDraw],
    next_slot: u32,
}

impl GpuFrame<'_> {
    pub fn passes_recorded(&self) -> u32 {
        self.next_slot - 1
    }
}

impl SceneRenderer for GpuFrame<'_> {
    fn render_portal_view(&mut self, camera: &VirtualCamera, target: &OutputBuffer) {
        let Some(handle) = camera.target else {
            return;
        };
        if self.next_slot >= self.renderer.camera_slots {
            warn!("out of camera slots, dropping portal pass at depth {}", camera.depth);
            return;
        }
        let slot = self.next_slot;
        self.next_slot += 1;

        self.renderer.targets.sync_storage(self.device, handle, target);
        self.renderer.write_camera(self.queue, slot, camera.view_projection(), target.size);
        self.renderer.render_portal_pass(self.encoder, handle, slot, camera.exit, self.surfaces);
        if let Some(portal_target) = self.renderer.targets.get_mut(handle) {
            portal_target.swap();
        }
    }
}

fn create_pipeline(
    device: &wgpu::Device,
    layout: &wgpu::PipelineLayout,
    module: &wgpu::ShaderModule,
    vertex_layout: wgpu::VertexBufferLayout<'_>,
    format: wgpu::TextureFormat,
    label: &str,
) -> wgpu::RenderPipeline {
    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(label),
        layout: Some(layout),
        vertex: wgpu::VertexState {
            module,
            entry_point: "vs_main",
            buffers: &[vertex_layout],
        },
        fragment: Some(wgpu::FragmentState {
            module,
            entry_point: "fs_main",
            targets: &[Some(wgpu::ColorTargetState {
                format,
                blend: Some(wgpu::BlendState::REPLACE),
                write_mask: wgpu::ColorWrites::ALL,
            })],
        }),
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            strip_index_format: None,
            front_face: wgpu::FrontFace::Ccw,
            cull_mode: None,
            polygon_mode: wgpu::PolygonMode::Fill,
            unclipped_depth: false,
            conservative: false,
        },
        depth_stencil: Some(wgpu::DepthStencilState {
            format: DEPTH_FORMAT,
            depth_write_enabled: true,
            depth_compare: wgpu::CompareFunction::Less,
            stencil: wgpu::StencilState::default(),
            bias: wgpu::DepthBiasState::default(),
        }),
        multisample: wgpu::MultisampleState {
            count: 1,
            mask: !0,
            alpha_to_coverage_enabled: false,
        },
        multiview: None,
    })
}

fn create_camera_storage(
    device: &wgpu::Device,
    layout: &wgpu::BindGroupLayout,
    stride: u32,
    slots: u32,
) -> (wgpu::Buffer, wgpu::BindGroup) {
    let buffer = device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("Camera Uniform Buffer"),
        size: stride as u64 * slots as u64,
        usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    });
    let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
        layout,
        entries: &[wgpu::BindGroupEntry {
            binding: 0,
            resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                buffer: &buffer,
                offset: 0,
                size: wgpu::BufferSize::new(std::mem::size_of::<CameraUniform>() as u64),
            }),
        }],
        label: Some("camera_bind_group"),
    });
    (buffer, bind_group)
}

fn create_surface_buffer(device: &wgpu::Device, portals: usize) -> wgpu::Buffer {
    device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("Portal Surface Vertex Buffer"),
        size: (portals * SURFACE_VERTICES_PER_PORTAL as usize * std::mem::size_of::<SurfaceVertex>()) as u64,
        usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    })
}

fn create_depth_view(device: &wgpu::Device, viewport: UVec2, label: &str) -> wgpu::TextureView {
    let size = viewport.max(UVec2::ONE);
    device
        .create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: wgpu::Extent3d { width: size.x, height: size.y, depth_or_array_layers: 1 },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: DEPTH_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        })
        .create_view(&wgpu::TextureViewDescriptor::default())
}

fn depth_attachment(view: &wgpu::TextureView) -> wgpu::RenderPassDepthStencilAttachment<'_> {
    wgpu::RenderPassDepthStencilAttachment {
        view,
        depth_ops: Some(wgpu::Operations { load: wgpu::LoadOp::Clear(1.0), store: wgpu::StoreOp::Store }),
        stencil_ops: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine_lib::config::PortalConfig;
    use crate::engine_lib::portal::{PlacementSurface, SurfaceContact};
    use glam::{Quat, Vec2};

    #[test]
    fn surface_quad_matches_portal_rectangle() {
        let config = PortalConfig { half_width: 0.5, half_height: 1.0, ..PortalConfig::default() };
        let mut portal = Portal::new("blue", &config);
        let surface = PlacementSurface::new(Vec3::new(0.0, 1.5, -2.0), Vec3::Z, Vec3::Y, Vec2::new(2.0, 1.5));
        let contact = SurfaceContact { point: surface.center, surface };
        portal.place(&contact, Quat::IDENTITY, &[], UVec2::new(8, 8)).unwrap();

        let quad = surface_quad(&portal);
        let xs: Vec<f32> = quad.iter().map(|v| v.position[0]).collect();
        let ys: Vec<f32> = quad.iter().map(|v| v.position[1]).collect();
        assert!(xs.iter().all(|x| (x.abs() - 0.5).abs() < 1e-5));
        assert!(ys.iter().all(|y| ((y - 1.5).abs() - 1.0).abs() < 1e-5));
        assert!(quad.iter().all(|v| (v.position[2] + 1.999).abs() < 1e-5));
    }

    #[test]
    fn camera_uniform_is_uniform_aligned() {
        assert_eq!(std::mem::size_of::<CameraUniform>() % 16, 0);
    }
}

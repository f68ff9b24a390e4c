// src/rendering_lib/targets.rs
//
// GPU storage behind each portal's output buffer. Every portal owns two colour
// textures: passes render into the back one while the portal's surface samples
// the front one, and the two swap after each pass.

use std::collections::HashMap;

use bytemuck::{Pod, Zeroable};
use glam::{UVec2, Vec3};
use log::debug;

use crate::engine_lib::effect::{VisualEffectSink, CENTER_FORWARD, CENTER_POSITION, RADIUS};
use crate::engine_lib::portal::OutputBuffer;
use crate::engine_lib::registry::PortalHandle;

pub const PORTAL_TARGET_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8UnormSrgb;
pub const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

/// Per-portal uniform block read by the surface shader.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct SurfaceParams {
    pub color: [f32; 4],
    pub center_radius: [f32; 4],
    pub forward_fresh: [f32; 4],
    pub extents: [f32; 4],
}

impl SurfaceParams {
    pub fn set_fresh(&mut self, fresh: bool) {
        self.forward_fresh[3] = if fresh { 1.0 } else { 0.0 };
    }

    /// `reveal_scale` maps the growth radius onto the surface so that the
    /// maximum radius uncovers the corners.
    pub fn set_shape(&mut self, color: [f32; 4], half_extents: [f32; 2], reveal_scale: f32) {
        self.color = color;
        self.extents = [half_extents[0], half_extents[1], reveal_scale, 0.0];
    }
}

impl VisualEffectSink for SurfaceParams {
    fn set_vector3(&mut self, name: &str, value: Vec3) {
        match name {
            CENTER_POSITION => self.center_radius[..3].copy_from_slice(&value.to_array()),
            CENTER_FORWARD => self.forward_fresh[..3].copy_from_slice(&value.to_array()),
            _ => debug!("surface shader has no vector parameter {name}"),
        }
    }

    fn set_float(&mut self, name: &str, value: f32) {
        match name {
            RADIUS => self.center_radius[3] = value,
            _ => debug!("surface shader has no float parameter {name}"),
        }
    }
}

pub struct PortalTarget {
    generation: Option<u32>,
    size: UVec2,
    views: [wgpu::TextureView; 2],
    depth_view: wgpu::TextureView,
    bind_groups: [wgpu::BindGroup; 2],
    params_buffer: wgpu::Buffer,
    pub params: SurfaceParams,
    front: usize,
}

impl PortalTarget {
    pub fn size(&self) -> UVec2 {
        self.size
    }

    pub fn back_view(&self) -> &wgpu::TextureView {
        &self.views[1 - self.front]
    }

    pub fn depth_view(&self) -> &wgpu::TextureView {
        &self.depth_view
    }

    /// Bind group sampling the latest finished image.
    pub fn front_bind_group(&self) -> &wgpu::BindGroup {
        &self.bind_groups[self.front]
    }

    pub fn swap(&mut self) {
        self.front = 1 - self.front;
    }

    pub fn write_params(&self, queue: &wgpu::Queue) {
        queue.write_buffer(&self.params_buffer, 0, bytemuck::bytes_of(&self.params));
    }
}

/// All portal targets, keyed by portal handle.
pub struct PortalTargets {
    targets: HashMap<PortalHandle, PortalTarget>,
    layout: wgpu::BindGroupLayout,
    sampler: wgpu::Sampler,
}

impl PortalTargets {
    pub fn new(device: &wgpu::Device) -> Self {
        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        multisampled: false,
                        view_dimension: wgpu::TextureViewDimension::D2,
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: wgpu::BufferSize::new(std::mem::size_of::<SurfaceParams>() as u64),
                    },
                    count: None,
                },
            ],
            label: Some("portal_surface_bind_group_layout"),
        });

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Portal Target Sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        Self { targets: HashMap::new(), layout, sampler }
    }

    pub fn bind_group_layout(&self) -> &wgpu::BindGroupLayout {
        &self.layout
    }

    pub fn get(&self, handle: PortalHandle) -> Option<&PortalTarget> {
        self.targets.get(&handle)
    }

    pub fn get_mut(&mut self, handle: PortalHandle) -> Option<&mut PortalTarget> {
        self.targets.get_mut(&handle)
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    /// The target of `handle`, created with 1x1 placeholder storage if new.
    pub fn entry(&mut self, device: &wgpu::Device, handle: PortalHandle) -> &mut PortalTarget {
        let Self { targets, layout, sampler } = self;
        targets.entry(handle).or_insert_with(|| new_target(device, layout, sampler))
    }

    /// Recreates the textures of `handle` when `buffer` was reallocated.
    pub fn sync_storage(&mut self, device: &wgpu::Device, handle: PortalHandle, buffer: &OutputBuffer) -> &mut PortalTarget {
        let Self { targets, layout, sampler } = self;
        let target = targets.entry(handle).or_insert_with(|| new_target(device, layout, sampler));

        if target.generation != Some(buffer.generation) {
            let (views, depth_view, bind_groups) =
                create_storage(device, layout, sampler, &target.params_buffer, buffer.size);
            target.views = views;
            target.depth_view = depth_view;
            target.bind_groups = bind_groups;
            target.size = buffer.size;
            target.generation = Some(buffer.generation);
            target.front = 0;
            debug!("portal target {:?} recreated at {}x{}", handle, buffer.size.x, buffer.size.y);
        }
        target
    }

    /// Drops the storage of portals that no longer exist.
    pub fn retain(&mut self, mut alive: impl FnMut(PortalHandle) -> bool) {
        let before = self.targets.len();
        self.targets.retain(|handle, _| alive(*handle));
        if self.targets.len() != before {
            debug!("pruned {} portal targets", before - self.targets.len());
        }
    }
}

fn new_target(device: &wgpu::Device, layout: &wgpu::BindGroupLayout, sampler: &wgpu::Sampler) -> PortalTarget {
    let params_buffer = device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("Portal Surface Params"),
        size: std::mem::size_of::<SurfaceParams>() as u64,
        usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    });
    let (views, depth_view, bind_groups) = create_storage(device, layout, sampler, &params_buffer, UVec2::ONE);
    PortalTarget {
        generation: None,
        size: UVec2::ONE,
        views,
        depth_view,
        bind_groups,
        params_buffer,
        params: SurfaceParams::default(),
        front: 0,
    }
}

fn create_storage(
    device: &wgpu::Device,
    layout: &wgpu::BindGroupLayout,
    sampler: &wgpu::Sampler,
    params_buffer: &wgpu::Buffer,
    size: UVec2,
) -> ([wgpu::TextureView; 2], wgpu::TextureView, [wgpu::BindGroup; 2]) {
    let size = size.max(UVec2::ONE);
    let extent = wgpu::Extent3d { width: size.x, height: size.y, depth_or_array_layers: 1 };

    let color_view = |label: &str| {
        device
            .create_texture(&wgpu::TextureDescriptor {
                label: Some(label),
                size: extent,
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: PORTAL_TARGET_FORMAT,
                usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
                view_formats: &[],
            })
            .create_view(&wgpu::TextureViewDescriptor::default())
    };
    let views = [color_view("Portal Target A"), color_view("Portal Target B")];

    let depth_view = device
        .create_texture(&wgpu::TextureDescriptor {
            label: Some("Portal Target Depth"),
            size: extent,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: DEPTH_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        })
        .create_view(&wgpu::TextureViewDescriptor::default());

    let bind_group = |view: &wgpu::TextureView| {
        device.create_bind_group(&wgpu::BindGroupDescriptor {
            layout,
            entries: &[
                wgpu::BindGroupEntry { binding: 0, resource: wgpu::BindingResource::TextureView(view) },
                wgpu::BindGroupEntry { binding: 1, resource: wgpu::BindingResource::Sampler(sampler) },
                wgpu::BindGroupEntry { binding: 2, resource: params_buffer.as_entire_binding() },
            ],
            label: Some("portal_surface_bind_group"),
        })
    };
    let bind_groups = [bind_group(&views[0]), bind_group(&views[1])];

    (views, depth_view, bind_groups)
}

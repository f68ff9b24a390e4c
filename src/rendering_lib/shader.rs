// src/rendering_lib/shader.rs

pub const SCENE_SHADER_SOURCE: &str = r#"
struct Camera {
    view_proj: mat4x4<f32>,
    viewport: vec4<f32>,
}

@group(0) @binding(0)
var<uniform> camera: Camera;

struct VertexInput {
    @location(0) position: vec3<f32>,
    @location(1) color: vec4<f32>,
}

struct VertexOutput {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) color: vec4<f32>,
}

@vertex
fn vs_main(model: VertexInput) -> VertexOutput {
    var out: VertexOutput;
    out.color = model.color;
    out.clip_position = camera.view_proj * vec4<f32>(model.position, 1.0);
    return out;
}

@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    return in.color;
}
"#;

/// Portal surfaces sample their own target in screen space, so the image
/// lines up with the view that rendered it.
pub const PORTAL_SURFACE_SHADER_SOURCE: &str = r#"
struct Camera {
    view_proj: mat4x4<f32>,
    viewport: vec4<f32>,
}

struct SurfaceParams {
    color: vec4<f32>,
    // xyz: centre, w: growth radius
    center_radius: vec4<f32>,
    // xyz: forward (into the wall), w: 1 when written this frame
    forward_fresh: vec4<f32>,
    // xy: half extents, z: reveal scale
    extents: vec4<f32>,
}

@group(0) @binding(0)
var<uniform> camera: Camera;

@group(1) @binding(0)
var portal_texture: texture_2d<f32>;
@group(1) @binding(1)
var portal_sampler: sampler;
@group(1) @binding(2)
var<uniform> params: SurfaceParams;

struct VertexOutput {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) world_position: vec3<f32>,
}

@vertex
fn vs_main(@location(0) position: vec3<f32>) -> VertexOutput {
    var out: VertexOutput;
    out.world_position = position;
    out.clip_position = camera.view_proj * vec4<f32>(position, 1.0);
    return out;
}

@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    let forward = params.forward_fresh.xyz;
    let offset = in.world_position - params.center_radius.xyz;
    let in_plane = offset - forward * dot(offset, forward);
    let dist = length(in_plane);

    let edge = params.center_radius.w * params.extents.z;
    if dist > edge {
        discard;
    }

    let rim = smoothstep(edge - 0.06, edge, dist);
    if params.forward_fresh.w < 0.5 {
        return vec4<f32>(params.color.rgb * (0.35 + 0.65 * rim), 1.0);
    }

    let uv = in.clip_position.xy / camera.viewport.xy;
    let view = textureSampleLevel(portal_texture, portal_sampler, uv, 0.0);
    return vec4<f32>(mix(view.rgb, params.color.rgb, rim), 1.0);
}
"#;

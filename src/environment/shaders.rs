//! Compute shaders for environment preprocessing
//!
//! Cube faces follow the wgpu order +X, -X, +Y, -Y, +Z, -Z. Every shader runs
//! 8x8 workgroups with the face index in `global_invocation_id.z`.

/// Shared face-texel to direction mapping
const CUBE_DIRECTION: &str = r#"
fn cube_direction(face: u32, uv: vec2<f32>) -> vec3<f32> {
    let c = uv * 2.0 - 1.0;
    var dir: vec3<f32>;
    switch face {
        case 0u: { dir = vec3<f32>(1.0, -c.y, -c.x); }
        case 1u: { dir = vec3<f32>(-1.0, -c.y, c.x); }
        case 2u: { dir = vec3<f32>(c.x, 1.0, c.y); }
        case 3u: { dir = vec3<f32>(c.x, -1.0, -c.y); }
        case 4u: { dir = vec3<f32>(c.x, -c.y, 1.0); }
        default: { dir = vec3<f32>(-c.x, -c.y, -1.0); }
    }
    return normalize(dir);
}
"#;

/// Equirectangular 2D texture into the six faces of cube mip 0
pub const EQUIRECT_TO_CUBE_BODY: &str = r#"
const PI: f32 = 3.14159265359;

@group(0) @binding(0) var equirect: texture_2d<f32>;
@group(0) @binding(1) var equirect_sampler: sampler;
@group(0) @binding(2) var cube_faces: texture_storage_2d_array<rgba32float, write>;

@compute @workgroup_size(8, 8, 1)
fn cs_main(@builtin(global_invocation_id) id: vec3<u32>) {
    let size = textureDimensions(cube_faces);
    if (id.x >= size.x || id.y >= size.y) {
        return;
    }

    let uv = (vec2<f32>(id.xy) + 0.5) / vec2<f32>(size);
    let dir = cube_direction(id.z, uv);
    let equirect_uv = vec2<f32>(
        atan2(dir.z, dir.x) / (2.0 * PI) + 0.5,
        acos(clamp(dir.y, -1.0, 1.0)) / PI,
    );

    let color = textureSampleLevel(equirect, equirect_sampler, equirect_uv, 0.0);
    textureStore(cube_faces, id.xy, id.z, vec4<f32>(color.rgb, 1.0));
}
"#;

/// Box filter: each texel of mip m averages 2x2 texels of mip m-1
pub const DOWNSAMPLE_SHADER: &str = r#"
@group(0) @binding(0) var src_mip: texture_2d_array<f32>;
@group(0) @binding(1) var dst_mip: texture_storage_2d_array<rgba32float, write>;

@compute @workgroup_size(8, 8, 1)
fn cs_main(@builtin(global_invocation_id) id: vec3<u32>) {
    let size = textureDimensions(dst_mip);
    if (id.x >= size.x || id.y >= size.y) {
        return;
    }

    let src_max = textureDimensions(src_mip) - vec2<u32>(1u, 1u);
    let base = id.xy * 2u;
    var sum = vec4<f32>(0.0);
    for (var i = 0u; i < 4u; i = i + 1u) {
        let coord = min(base + vec2<u32>(i & 1u, i >> 1u), src_max);
        sum = sum + textureLoad(src_mip, coord, id.z, 0);
    }

    textureStore(dst_mip, id.xy, id.z, sum * 0.25);
}
"#;

/// GGX importance-sampled prefilter of one mip, reading the unfiltered chain
pub const PREFILTER_BODY: &str = r#"
const PI: f32 = 3.14159265359;

struct PrefilterParams {
    mip: u32,
    mip_count: u32,
    base_size: u32,
    sample_count: u32,
}

@group(0) @binding(0) var<uniform> params: PrefilterParams;
@group(0) @binding(1) var env_cube: texture_cube<f32>;
@group(0) @binding(2) var env_sampler: sampler;
@group(0) @binding(3) var dst_mip: texture_storage_2d_array<rgba32float, write>;

fn hammersley(i: u32, n: u32) -> vec2<f32> {
    return vec2<f32>(f32(i) / f32(n), f32(reverseBits(i)) * 2.3283064365386963e-10);
}

fn importance_sample_ggx(xi: vec2<f32>, n: vec3<f32>, roughness: f32) -> vec3<f32> {
    let a = roughness * roughness;
    let phi = 2.0 * PI * xi.x;
    let cos_theta = sqrt((1.0 - xi.y) / (1.0 + (a * a - 1.0) * xi.y));
    let sin_theta = sqrt(1.0 - cos_theta * cos_theta);
    let h = vec3<f32>(cos(phi) * sin_theta, sin(phi) * sin_theta, cos_theta);

    let up = select(vec3<f32>(1.0, 0.0, 0.0), vec3<f32>(0.0, 0.0, 1.0), abs(n.z) < 0.999);
    let tangent = normalize(cross(up, n));
    let bitangent = cross(n, tangent);
    return normalize(tangent * h.x + bitangent * h.y + n * h.z);
}

fn distribution_ggx(n_dot_h: f32, roughness: f32) -> f32 {
    let a = roughness * roughness;
    let a2 = a * a;
    let d = n_dot_h * n_dot_h * (a2 - 1.0) + 1.0;
    return a2 / (PI * d * d);
}

@compute @workgroup_size(8, 8, 1)
fn cs_main(@builtin(global_invocation_id) id: vec3<u32>) {
    let size = textureDimensions(dst_mip);
    if (id.x >= size.x || id.y >= size.y) {
        return;
    }

    let uv = (vec2<f32>(id.xy) + 0.5) / vec2<f32>(size);
    let n = cube_direction(id.z, uv);
    let v = n;

    let max_lod = f32(params.mip_count - 1u);
    let roughness = f32(params.mip) / max(max_lod, 1.0);
    let base = f32(params.base_size);
    let texel_solid_angle = 4.0 * PI / (6.0 * base * base);

    var color = vec3<f32>(0.0);
    var weight = 0.0;
    for (var i = 0u; i < params.sample_count; i = i + 1u) {
        let h = importance_sample_ggx(hammersley(i, params.sample_count), n, roughness);
        let l = normalize(2.0 * dot(v, h) * h - v);
        let n_dot_l = dot(n, l);
        if (n_dot_l > 0.0) {
            let n_dot_h = max(dot(n, h), 0.0);
            let h_dot_v = max(dot(h, v), 0.0);
            let pdf = distribution_ggx(n_dot_h, roughness) * n_dot_h / (4.0 * h_dot_v) + 0.0001;
            let sample_solid_angle = 1.0 / (f32(params.sample_count) * pdf + 0.0001);
            let lod = clamp(0.5 * log2(sample_solid_angle / texel_solid_angle), 0.0, max_lod);

            color = color + textureSampleLevel(env_cube, env_sampler, l, lod).rgb * n_dot_l;
            weight = weight + n_dot_l;
        }
    }

    textureStore(dst_mip, id.xy, id.z, vec4<f32>(color / max(weight, 0.0001), 1.0));
}
"#;

/// Full equirect-to-cube module
pub fn equirect_to_cube_shader() -> String {
    format!("{CUBE_DIRECTION}{EQUIRECT_TO_CUBE_BODY}")
}

/// Full prefilter module
pub fn prefilter_shader() -> String {
    format!("{CUBE_DIRECTION}{PREFILTER_BODY}")
}

// WGSL sources for every blur program. The storage texture format cannot be
// an `override`, so each template carries a `{{STORAGE_FORMAT}}` token that
// is substituted once per target format; workgroup shape and items-per-step
// are injected as pipeline constants.

use crate::pixel_format::PixelFormat;

const STORAGE_FORMAT_TOKEN: &str = "{{STORAGE_FORMAT}}";

pub const SINGLE_PASS_ENTRY: &str = "box_blur_single_pass";
pub const DOUBLE_PASS_H_ENTRY: &str = "box_blur_double_pass_h";
pub const DOUBLE_PASS_V_ENTRY: &str = "box_blur_double_pass_v";
pub const HBOX_ENTRY: &str = "hbox_blur";
pub const HBOX_EDGE_ENTRY: &str = "hbox_blur_edge";
pub const VBOX_ENTRY: &str = "vbox_blur";
pub const VBOX_EDGE_ENTRY: &str = "vbox_blur_edge";
pub const IMAGE_BOX_ENTRY: &str = "image_box";

/// Size of the per-thread fetch arrays in the separable kernels.
pub const MAX_ITEMS: u32 = 32;

/// Substitute the storage format token for `target`.
pub fn specialize(template: &str, target: PixelFormat) -> String {
    template.replace(STORAGE_FORMAT_TOKEN, target.wgsl_storage_format())
}

// Full KernelSize × KernelSize window per output pixel, read straight from
// the source. Intentionally the O(r²) baseline.
pub const SINGLE_PASS_SHADER_SRC: &str = r#"
struct BlurParams {
    radius: i32,
    kernel_size: i32,
    _pad0: i32,
    _pad1: i32,
};

override WORKGROUP_X: u32 = 32u;
override WORKGROUP_Y: u32 = 8u;

@group(0) @binding(0)
var src_tex: texture_2d<f32>;
@group(0) @binding(1)
var dst_tex: texture_storage_2d<{{STORAGE_FORMAT}}, write>;
@group(0) @binding(2)
var<uniform> params: BlurParams;

@compute @workgroup_size(WORKGROUP_X, WORKGROUP_Y, 1)
fn box_blur_single_pass(@builtin(global_invocation_id) gid: vec3<u32>) {
    let dims = vec2<i32>(textureDimensions(src_tex));
    let x = i32(gid.x);
    let y = i32(gid.y);
    if (x >= dims.x || y >= dims.y) {
        return;
    }

    let r = params.radius;
    var acc = vec4<f32>(0.0);
    for (var dy = -r; dy <= r; dy = dy + 1) {
        let sy = clamp(y + dy, 0, dims.y - 1);
        for (var dx = -r; dx <= r; dx = dx + 1) {
            let sx = clamp(x + dx, 0, dims.x - 1);
            acc = acc + textureLoad(src_tex, vec2<i32>(sx, sy), 0);
        }
    }
    let area = f32(params.kernel_size * params.kernel_size);
    textureStore(dst_tex, vec2<i32>(x, y), acc / area);
}
"#;

// One thread per output pixel, 1-D window along a single axis.
pub const DOUBLE_PASS_SHADER_SRC: &str = r#"
struct BlurParams {
    radius: i32,
    kernel_size: i32,
    _pad0: i32,
    _pad1: i32,
};

override WORKGROUP_X: u32 = 32u;
override WORKGROUP_Y: u32 = 8u;

@group(0) @binding(0)
var src_tex: texture_2d<f32>;
@group(0) @binding(1)
var dst_tex: texture_storage_2d<{{STORAGE_FORMAT}}, write>;
@group(0) @binding(2)
var<uniform> params: BlurParams;

@compute @workgroup_size(WORKGROUP_X, WORKGROUP_Y, 1)
fn box_blur_double_pass_h(@builtin(global_invocation_id) gid: vec3<u32>) {
    let dims = vec2<i32>(textureDimensions(src_tex));
    let x = i32(gid.x);
    let y = i32(gid.y);
    if (x >= dims.x || y >= dims.y) {
        return;
    }

    let r = params.radius;
    var acc = vec4<f32>(0.0);
    for (var dx = -r; dx <= r; dx = dx + 1) {
        let sx = clamp(x + dx, 0, dims.x - 1);
        acc = acc + textureLoad(src_tex, vec2<i32>(sx, y), 0);
    }
    textureStore(dst_tex, vec2<i32>(x, y), acc / f32(params.kernel_size));
}

@compute @workgroup_size(WORKGROUP_X, WORKGROUP_Y, 1)
fn box_blur_double_pass_v(@builtin(global_invocation_id) gid: vec3<u32>) {
    let dims = vec2<i32>(textureDimensions(src_tex));
    let x = i32(gid.x);
    let y = i32(gid.y);
    if (x >= dims.x || y >= dims.y) {
        return;
    }

    let r = params.radius;
    var acc = vec4<f32>(0.0);
    for (var dy = -r; dy <= r; dy = dy + 1) {
        let sy = clamp(y + dy, 0, dims.y - 1);
        acc = acc + textureLoad(src_tex, vec2<i32>(x, sy), 0);
    }
    textureStore(dst_tex, vec2<i32>(x, y), acc / f32(params.kernel_size));
}
"#;

// One thread walks a whole row (hbox) or column (vbox) with a running sum.
// Each outer step first fetches the ITEMS texels entering and leaving the
// window into private arrays, then slides the window over them. The plain
// variants clamp every fetch; the edge variants seed the window with the
// replicated border pixel and only clamp batches that overlap an edge.
pub const SEPARABLE_SHADER_SRC: &str = r#"
struct BlurParams {
    radius: i32,
    kernel_size: i32,
    _pad0: i32,
    _pad1: i32,
};

override WORKGROUP_X: u32 = 32u;
override WORKGROUP_Y: u32 = 1u;
override ITEMS: u32 = 1u;

const MAX_ITEMS: u32 = 32u;

@group(0) @binding(0)
var src_tex: texture_2d<f32>;
@group(0) @binding(1)
var dst_tex: texture_storage_2d<{{STORAGE_FORMAT}}, write>;
@group(0) @binding(2)
var<uniform> params: BlurParams;

fn load_clamped(x: i32, y: i32, dims: vec2<i32>) -> vec4<f32> {
    let c = clamp(vec2<i32>(x, y), vec2<i32>(0, 0), dims - vec2<i32>(1, 1));
    return textureLoad(src_tex, c, 0);
}

fn load_texel(x: i32, y: i32, dims: vec2<i32>, interior: bool) -> vec4<f32> {
    if (interior) {
        return textureLoad(src_tex, vec2<i32>(x, y), 0);
    }
    return load_clamped(x, y, dims);
}

fn batch_items() -> i32 {
    return i32(min(ITEMS, MAX_ITEMS));
}

@compute @workgroup_size(WORKGROUP_X, WORKGROUP_Y, 1)
fn hbox_blur(@builtin(global_invocation_id) gid: vec3<u32>) {
    let dims = vec2<i32>(textureDimensions(src_tex));
    let y = i32(gid.x);
    if (y >= dims.y) {
        return;
    }

    let w = dims.x;
    let r = params.radius;
    let scale = 1.0 / f32(params.kernel_size);
    var acc = vec4<f32>(0.0);
    for (var k = -r; k <= r; k = k + 1) {
        acc = acc + load_clamped(k, y, dims);
    }

    let items = batch_items();
    var incoming: array<vec4<f32>, MAX_ITEMS>;
    var outgoing: array<vec4<f32>, MAX_ITEMS>;
    for (var base = 0; base < w; base = base + items) {
        let n = min(items, w - base);
        for (var i = 0; i < n; i = i + 1) {
            incoming[i] = load_clamped(base + i + r + 1, y, dims);
            outgoing[i] = load_clamped(base + i - r, y, dims);
        }
        for (var i = 0; i < n; i = i + 1) {
            textureStore(dst_tex, vec2<i32>(base + i, y), acc * scale);
            acc = acc + incoming[i] - outgoing[i];
        }
    }
}

@compute @workgroup_size(WORKGROUP_X, WORKGROUP_Y, 1)
fn hbox_blur_edge(@builtin(global_invocation_id) gid: vec3<u32>) {
    let dims = vec2<i32>(textureDimensions(src_tex));
    let y = i32(gid.x);
    if (y >= dims.y) {
        return;
    }

    let w = dims.x;
    let r = params.radius;
    let scale = 1.0 / f32(params.kernel_size);
    var acc = textureLoad(src_tex, vec2<i32>(0, y), 0) * f32(r + 1);
    for (var k = 1; k <= r; k = k + 1) {
        acc = acc + load_clamped(k, y, dims);
    }

    let items = batch_items();
    var incoming: array<vec4<f32>, MAX_ITEMS>;
    var outgoing: array<vec4<f32>, MAX_ITEMS>;
    for (var base = 0; base < w; base = base + items) {
        let n = min(items, w - base);
        // last incoming texel is base + n + r
        let interior = base - r >= 0 && base + n + r < w;
        for (var i = 0; i < n; i = i + 1) {
            incoming[i] = load_texel(base + i + r + 1, y, dims, interior);
            outgoing[i] = load_texel(base + i - r, y, dims, interior);
        }
        for (var i = 0; i < n; i = i + 1) {
            textureStore(dst_tex, vec2<i32>(base + i, y), acc * scale);
            acc = acc + incoming[i] - outgoing[i];
        }
    }
}

@compute @workgroup_size(WORKGROUP_X, WORKGROUP_Y, 1)
fn vbox_blur(@builtin(global_invocation_id) gid: vec3<u32>) {
    let dims = vec2<i32>(textureDimensions(src_tex));
    let x = i32(gid.x);
    if (x >= dims.x) {
        return;
    }

    let h = dims.y;
    let r = params.radius;
    let scale = 1.0 / f32(params.kernel_size);
    var acc = vec4<f32>(0.0);
    for (var k = -r; k <= r; k = k + 1) {
        acc = acc + load_clamped(x, k, dims);
    }

    let items = batch_items();
    var incoming: array<vec4<f32>, MAX_ITEMS>;
    var outgoing: array<vec4<f32>, MAX_ITEMS>;
    for (var base = 0; base < h; base = base + items) {
        let n = min(items, h - base);
        for (var i = 0; i < n; i = i + 1) {
            incoming[i] = load_clamped(x, base + i + r + 1, dims);
            outgoing[i] = load_clamped(x, base + i - r, dims);
        }
        for (var i = 0; i < n; i = i + 1) {
            textureStore(dst_tex, vec2<i32>(x, base + i), acc * scale);
            acc = acc + incoming[i] - outgoing[i];
        }
    }
}

@compute @workgroup_size(WORKGROUP_X, WORKGROUP_Y, 1)
fn vbox_blur_edge(@builtin(global_invocation_id) gid: vec3<u32>) {
    let dims = vec2<i32>(textureDimensions(src_tex));
    let x = i32(gid.x);
    if (x >= dims.x) {
        return;
    }

    let h = dims.y;
    let r = params.radius;
    let scale = 1.0 / f32(params.kernel_size);
    var acc = textureLoad(src_tex, vec2<i32>(x, 0), 0) * f32(r + 1);
    for (var k = 1; k <= r; k = k + 1) {
        acc = acc + load_clamped(x, k, dims);
    }

    let items = batch_items();
    var incoming: array<vec4<f32>, MAX_ITEMS>;
    var outgoing: array<vec4<f32>, MAX_ITEMS>;
    for (var base = 0; base < h; base = base + items) {
        let n = min(items, h - base);
        let interior = base - r >= 0 && base + n + r < h;
        for (var i = 0; i < n; i = i + 1) {
            incoming[i] = load_texel(x, base + i + r + 1, dims, interior);
            outgoing[i] = load_texel(x, base + i - r, dims, interior);
        }
        for (var i = 0; i < n; i = i + 1) {
            textureStore(dst_tex, vec2<i32>(x, base + i), acc * scale);
            acc = acc + incoming[i] - outgoing[i];
        }
    }
}
"#;

// Rectangular box with a configurable edge policy. Kernel extents are fixed
// at pipeline creation.
pub const IMAGE_BOX_SHADER_SRC: &str = r#"
override WORKGROUP_X: u32 = 32u;
override WORKGROUP_Y: u32 = 8u;
override KERNEL_WIDTH: i32 = 3;
override KERNEL_HEIGHT: i32 = 3;
override EDGE_ZERO: bool = false;

@group(0) @binding(0)
var src_tex: texture_2d<f32>;
@group(0) @binding(1)
var dst_tex: texture_storage_2d<{{STORAGE_FORMAT}}, write>;

fn sample_edge(x: i32, y: i32, dims: vec2<i32>) -> vec4<f32> {
    let inside = x >= 0 && x < dims.x && y >= 0 && y < dims.y;
    if (EDGE_ZERO && !inside) {
        return vec4<f32>(0.0);
    }
    let c = clamp(vec2<i32>(x, y), vec2<i32>(0, 0), dims - vec2<i32>(1, 1));
    return textureLoad(src_tex, c, 0);
}

@compute @workgroup_size(WORKGROUP_X, WORKGROUP_Y, 1)
fn image_box(@builtin(global_invocation_id) gid: vec3<u32>) {
    let dims = vec2<i32>(textureDimensions(src_tex));
    let x = i32(gid.x);
    let y = i32(gid.y);
    if (x >= dims.x || y >= dims.y) {
        return;
    }

    let rx = KERNEL_WIDTH / 2;
    let ry = KERNEL_HEIGHT / 2;
    var acc = vec4<f32>(0.0);
    for (var dy = -ry; dy <= ry; dy = dy + 1) {
        for (var dx = -rx; dx <= rx; dx = dx + 1) {
            acc = acc + sample_edge(x + dx, y + dy, dims);
        }
    }
    textureStore(dst_tex, vec2<i32>(x, y), acc / (f32(KERNEL_WIDTH) * f32(KERNEL_HEIGHT)));
}
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vectorization::VectorizationFactor;

    const TEMPLATES: [&str; 4] = [
        SINGLE_PASS_SHADER_SRC,
        DOUBLE_PASS_SHADER_SRC,
        SEPARABLE_SHADER_SRC,
        IMAGE_BOX_SHADER_SRC,
    ];

    #[test]
    fn specialize_replaces_every_token() {
        for template in TEMPLATES {
            for format in PixelFormat::ALL {
                let src = specialize(template, format);
                assert!(!src.contains(STORAGE_FORMAT_TOKEN));
                assert!(src.contains(&format!(
                    "texture_storage_2d<{}, write>",
                    format.wgsl_storage_format()
                )));
            }
        }
    }

    #[test]
    fn entry_points_are_declared() {
        let declared = |src: &str, entry: &str| src.contains(&format!("fn {entry}("));
        assert!(declared(SINGLE_PASS_SHADER_SRC, SINGLE_PASS_ENTRY));
        assert!(declared(DOUBLE_PASS_SHADER_SRC, DOUBLE_PASS_H_ENTRY));
        assert!(declared(DOUBLE_PASS_SHADER_SRC, DOUBLE_PASS_V_ENTRY));
        for entry in [HBOX_ENTRY, HBOX_EDGE_ENTRY, VBOX_ENTRY, VBOX_EDGE_ENTRY] {
            assert!(declared(SEPARABLE_SHADER_SRC, entry), "{entry} missing");
        }
        assert!(declared(IMAGE_BOX_SHADER_SRC, IMAGE_BOX_ENTRY));
    }

    #[test]
    fn fetch_arrays_hold_every_factor() {
        assert!(SEPARABLE_SHADER_SRC.contains(&format!("const MAX_ITEMS: u32 = {MAX_ITEMS}u;")));
        for factor in VectorizationFactor::ALL {
            assert!(factor.items() <= MAX_ITEMS, "{factor} exceeds fetch arrays");
        }
        // four kernels, each with an incoming and an outgoing batch
        assert_eq!(
            SEPARABLE_SHADER_SRC
                .matches("array<vec4<f32>, MAX_ITEMS>")
                .count(),
            8
        );
    }
}

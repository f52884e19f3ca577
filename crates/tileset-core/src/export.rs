use serde_json::{Value, json};

use crate::model::Packing;

/// Builds the JSON hash descriptor for a packed atlas.
///
/// Shape: `{ frames: { name: { frame, rotated, trimmed, spriteSourceSize, sourceSize } }, meta }`.
/// `frame.w/h` are the unrotated frame size, as Pixi and TexturePacker expect.
pub fn to_descriptor(packing: &Packing, image: &str) -> Value {
    let mut frames = serde_json::Map::new();
    for placed in &packing.placements {
        let f = &placed.frame;
        let frame = json!({"x": placed.x, "y": placed.y, "w": f.width, "h": f.height});
        let (sprite_source_size, source_size) = match f.trim {
            Some(t) => (
                json!({"x": t.x, "y": t.y, "w": f.width, "h": f.height}),
                json!({"w": t.source_width, "h": t.source_height}),
            ),
            None => (
                json!({"x": 0, "y": 0, "w": f.width, "h": f.height}),
                json!({"w": f.width, "h": f.height}),
            ),
        };
        frames.insert(
            f.name.clone(),
            json!({
                "frame": frame,
                "rotated": placed.rotated,
                "trimmed": f.trim.is_some(),
                "spriteSourceSize": sprite_source_size,
                "sourceSize": source_size,
            }),
        );
    }
    json!({
        "frames": frames,
        "meta": {
            "app": "tileset-packer",
            "version": env!("CARGO_PKG_VERSION"),
            "image": image,
            "format": "RGBA8888",
            "size": {"w": packing.canvas.width, "h": packing.canvas.height},
            "scale": "1",
        }
    })
}

/// Points `meta.image` at `image_url`; with `json_url`, also sets `meta.json`.
/// Returns false when `descriptor` is not a JSON object.
pub fn rewrite_image_reference(descriptor: &mut Value, image_url: &str, json_url: Option<&str>) -> bool {
    let Some(root) = descriptor.as_object_mut() else {
        return false;
    };
    let meta = root.entry("meta").or_insert_with(|| json!({}));
    if !meta.is_object() {
        *meta = json!({});
    }
    meta["image"] = json!(image_url);
    if let Some(url) = json_url {
        meta["json"] = json!(url);
    }
    true
}

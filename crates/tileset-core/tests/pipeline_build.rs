use image::{Rgba, RgbaImage};
use std::fs;
use std::path::{Path, PathBuf};
use tileset_core::error::TilesetError;
use tileset_core::prelude::*;

const MISSING_TOOL: &str = "/nonexistent/tileset-test/pngquant";

fn solid(path: &Path, w: u32, h: u32, rgba: [u8; 4]) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("mkdir");
    }
    RgbaImage::from_pixel(w, h, Rgba(rgba)).save(path).expect("save");
}

/// Project with three frames under `frames/` and a `hero.yml` listing them.
fn project(extra: &str) -> (tempfile::TempDir, PathBuf) {
    let dir = tempfile::tempdir().expect("tempdir");
    solid(&dir.path().join("frames/a.png"), 10, 10, [255, 0, 0, 255]);
    solid(&dir.path().join("frames/b.png"), 20, 10, [0, 255, 0, 255]);
    solid(&dir.path().join("frames/c.png"), 6, 14, [0, 0, 255, 255]);
    let config = dir.path().join("hero.yml");
    fs::write(&config, format!("files:\n  \"frames/*.png\": {{}}\n{extra}")).expect("config");
    (dir, config)
}

fn options(dir: &Path) -> BuildOptions {
    BuildOptions {
        output: dir.join("out"),
        ..BuildOptions::default()
    }
}

fn descriptor(out: &BuildOutput) -> serde_json::Value {
    serde_json::from_slice(&fs::read(&out.descriptor_path).expect("read")).expect("json")
}

#[test]
fn build_writes_atlas_and_descriptor() {
    let (dir, config) = project("");
    let opts = options(dir.path());
    let mut cache = CacheStore::open(&opts.output);
    let out = build_tileset(&config, &opts, &mut cache).expect("build");

    assert_eq!(out.name, "hero");
    assert!(out.rebuilt);
    assert_eq!(out.cache, CacheStatus::Miss);
    assert!(out.warnings.is_empty());
    assert_eq!(out.image_path, dir.path().join("out/hero.png"));

    let d = descriptor(&out);
    let (w, h) = image::image_dimensions(&out.image_path).expect("dims");
    assert_eq!(d["meta"]["size"]["w"], w);
    assert_eq!(d["meta"]["size"]["h"], h);
    assert_eq!(d["meta"]["image"], "hero.png");
    for name in ["a", "b", "c"] {
        assert!(d["frames"][name].is_object(), "frame {name} missing");
    }

    // each frame's pixels land where the descriptor says
    let atlas = image::open(&out.image_path).expect("open").to_rgba8();
    let b = &d["frames"]["b"]["frame"];
    let (x, y) = (b["x"].as_u64().unwrap() as u32, b["y"].as_u64().unwrap() as u32);
    assert_eq!(atlas.get_pixel(x, y), &Rgba([0, 255, 0, 255]));

    match out.content {
        LoaderOutput::Json(v) => {
            assert_eq!(v["meta"]["image"], "hero.png");
            assert_eq!(v["meta"]["json"], "hero.json");
        }
        other => panic!("expected json loader output, got {other:?}"),
    }
}

#[test]
fn unchanged_inputs_hit_the_cache() {
    let (dir, config) = project("");
    let opts = options(dir.path());
    let mut cache = CacheStore::open(&opts.output);
    build_tileset(&config, &opts, &mut cache).expect("first");
    let before = fs::read(dir.path().join("out/hero.png")).expect("png");

    let mut fresh = CacheStore::open(&opts.output);
    let second = build_tileset(&config, &opts, &mut fresh).expect("second");
    assert_eq!(second.cache, CacheStatus::Hit);
    assert!(!second.rebuilt);
    assert_eq!(fs::read(&second.image_path).expect("png"), before);

    solid(&dir.path().join("frames/a.png"), 10, 10, [255, 255, 0, 255]);
    let third = build_tileset(&config, &opts, &mut fresh).expect("third");
    assert_eq!(third.cache, CacheStatus::Miss);
    assert!(third.rebuilt);
}

#[test]
fn disabled_cache_always_rebuilds() {
    let (dir, config) = project("");
    let opts = BuildOptions {
        cache: false,
        ..options(dir.path())
    };
    let mut cache = CacheStore::open(&opts.output);
    build_tileset(&config, &opts, &mut cache).expect("first");
    let second = build_tileset(&config, &opts, &mut cache).expect("second");
    assert!(second.rebuilt);
    assert!(!dir.path().join("out").join(tileset_core::cache::CACHE_FILENAME).exists());
}

#[test]
fn no_process_without_artifacts_fails_and_writes_nothing() {
    let (dir, config) = project("");
    let opts = BuildOptions {
        process: false,
        ..options(dir.path())
    };
    let mut cache = CacheStore::open(&opts.output);
    let err = build_tileset(&config, &opts, &mut cache).expect_err("nothing to serve");
    assert!(matches!(err, TilesetError::MissingArtifact { .. }));
    assert!(!dir.path().join("out").exists());
}

#[test]
fn no_process_serves_existing_artifacts_with_warning() {
    let (dir, config) = project("");
    let opts = options(dir.path());
    let mut cache = CacheStore::open(&opts.output);
    build_tileset(&config, &opts, &mut cache).expect("build");

    let skip = BuildOptions {
        process: false,
        ..opts
    };
    let out = build_tileset(&config, &skip, &mut cache).expect("serve");
    assert!(!out.rebuilt);
    assert_eq!(out.warnings.len(), 1);
    assert!(matches!(out.content, LoaderOutput::Json(_)));
}

#[test]
fn tool_failure_without_previous_output_is_an_error() {
    let (dir, config) = project("colors: 64\n");
    let opts = BuildOptions {
        pngquant: PathBuf::from(MISSING_TOOL),
        ..options(dir.path())
    };
    let mut cache = CacheStore::open(&opts.output);
    let err = build_tileset(&config, &opts, &mut cache).expect_err("pngquant is missing");
    assert!(err.is_recoverable());
    assert!(matches!(err, TilesetError::ExternalTool { .. }));
    assert!(!dir.path().join("out/hero.png").exists());
    assert!(!dir.path().join("out/hero.json").exists());
}

#[test]
fn tool_failure_falls_back_to_previous_output() {
    let (dir, config) = project("");
    let opts = options(dir.path());
    let mut cache = CacheStore::open(&opts.output);
    build_tileset(&config, &opts, &mut cache).expect("lossless build");
    let png_before = fs::read(dir.path().join("out/hero.png")).expect("png");
    let json_before = fs::read(dir.path().join("out/hero.json")).expect("json");
    let entry_before = cache.entries().get("/hero").cloned();

    let quantized = dir.path().join("hero.yml");
    fs::write(&quantized, "files:\n  \"frames/*.png\": {}\ncolors: 16\n").expect("config");
    let failing = BuildOptions {
        pngquant: PathBuf::from(MISSING_TOOL),
        ..opts
    };
    let out = build_tileset(&quantized, &failing, &mut cache).expect("fallback");
    assert!(!out.rebuilt);
    assert_eq!(out.cache, CacheStatus::Miss);
    assert_eq!(out.warnings.len(), 1);
    assert!(out.warnings[0].contains("pngquant"));

    // previous artifacts and cache entry are untouched
    assert_eq!(fs::read(dir.path().join("out/hero.png")).expect("png"), png_before);
    assert_eq!(fs::read(dir.path().join("out/hero.json")).expect("json"), json_before);
    assert_eq!(cache.entries().get("/hero").cloned(), entry_before);
}

#[test]
fn packing_errors_are_not_recovered() {
    let (dir, config) = project("max_size: 8\n");
    let opts = options(dir.path());
    let mut cache = CacheStore::open(&opts.output);
    let err = build_tileset(&config, &opts, &mut cache).expect_err("frames exceed 8px");
    assert!(err.is_packing());
    assert!(!err.is_recoverable());
}

#[test]
fn url_loader_inlines_small_descriptors() {
    let (dir, config) = project("");
    let opts = BuildOptions {
        loader: LoaderMode::Url,
        inline_limit: Some(1 << 20),
        ..options(dir.path())
    };
    let mut cache = CacheStore::open(&opts.output);
    let out = build_tileset(&config, &opts, &mut cache).expect("build");
    match out.content {
        LoaderOutput::Url(url) => assert!(url.starts_with("data:application/json;base64,")),
        other => panic!("expected url, got {other:?}"),
    }
}

#[test]
fn public_path_prefixes_asset_urls() {
    let (dir, config) = project("");
    let opts = BuildOptions {
        public_path: "/static/".into(),
        ..options(dir.path())
    };
    let mut cache = CacheStore::open(&opts.output);
    let out = build_tileset(&config, &opts, &mut cache).expect("build");
    let LoaderOutput::Json(v) = out.content else {
        panic!("expected json loader output");
    };
    assert_eq!(v["meta"]["image"], "/static/hero.png");
    assert_eq!(v["meta"]["json"], "/static/hero.json");

    let url_opts = BuildOptions {
        loader: LoaderMode::Url,
        ..opts
    };
    let out = build_tileset(&config, &url_opts, &mut cache).expect("cached");
    assert_eq!(out.content, LoaderOutput::Url("/static/hero.json".into()));

    let none = BuildOptions {
        loader: LoaderMode::None,
        ..url_opts
    };
    let out = build_tileset(&config, &none, &mut cache).expect("cached");
    assert_eq!(out.content, LoaderOutput::None);
}

#[test]
fn output_key_names_the_artifacts() {
    let (dir, config) = project("output: sprites\n");
    let opts = options(dir.path());
    let mut cache = CacheStore::open(&opts.output);
    let out = build_tileset(&config, &opts, &mut cache).expect("build");
    assert_eq!(out.name, "sprites");
    assert!(dir.path().join("out/sprites.png").is_file());
    assert!(dir.path().join("out/sprites.json").is_file());
}

#[test]
fn layout_applies_scale_and_trim() {
    let dir = tempfile::tempdir().expect("tempdir");
    solid(&dir.path().join("wide.png"), 20, 10, [9, 9, 9, 255]);
    let mut sprite = RgbaImage::new(8, 8);
    for y in 2..6 {
        for x in 3..5 {
            sprite.put_pixel(x, y, Rgba([200, 0, 0, 255]));
        }
    }
    sprite.save(dir.path().join("sprite.png")).expect("save");
    let blank = RgbaImage::new(5, 5);
    blank.save(dir.path().join("blank.png")).expect("save");

    let yaml = "files:\n  wide.png: { scale: 0.5 }\n  sprite.png: { trim: true }\n  blank.png: { trim: true }\n";
    let packing = tileset_core::layout_from_str(yaml, dir.path()).expect("layout");
    let by_name = |n: &str| {
        packing
            .placements
            .iter()
            .find(|p| p.frame.name == n)
            .expect("frame")
            .frame
            .clone()
    };

    let wide = by_name("wide");
    assert_eq!((wide.width, wide.height), (10, 5));
    assert!(wide.trim.is_none());

    let sprite = by_name("sprite");
    assert_eq!((sprite.width, sprite.height), (2, 4));
    let trim = sprite.trim.expect("trimmed");
    assert_eq!((trim.x, trim.y), (3, 2));
    assert_eq!((trim.source_width, trim.source_height), (8, 8));

    let blank = by_name("blank");
    assert_eq!((blank.width, blank.height), (5, 5));
    assert!(blank.trim.is_none());
}

#[test]
fn root_glob_ignores_output_under_config_dir() {
    let dir = tempfile::tempdir().expect("tempdir");
    solid(&dir.path().join("a.png"), 8, 8, [255, 0, 0, 255]);
    solid(&dir.path().join("b.png"), 12, 4, [0, 255, 0, 255]);
    let config = dir.path().join("hero.yml");
    fs::write(&config, "files:\n  \"*.png\": {}\n").expect("config");
    let opts = options(dir.path());

    let mut cache = CacheStore::open(&opts.output);
    let first = build_tileset(&config, &opts, &mut cache).expect("first");
    assert!(first.rebuilt);

    let mut fresh = CacheStore::open(&opts.output);
    let second = build_tileset(&config, &opts, &mut fresh).expect("second");
    assert_eq!(second.cache, CacheStatus::Hit);
    assert!(!second.rebuilt);

    let d = descriptor(&second);
    let mut names: Vec<&str> = d["frames"]
        .as_object()
        .expect("frames")
        .keys()
        .map(String::as_str)
        .collect();
    names.sort();
    assert_eq!(names, ["a", "b"]);
}

#[test]
fn output_equal_to_config_dir_skips_previous_atlas() {
    let dir = tempfile::tempdir().expect("tempdir");
    solid(&dir.path().join("a.png"), 8, 8, [255, 0, 0, 255]);
    let config = dir.path().join("hero.yml");
    fs::write(&config, "files:\n  \"*.png\": {}\n").expect("config");
    let opts = BuildOptions {
        output: dir.path().to_path_buf(),
        ..BuildOptions::default()
    };
    let mut cache = CacheStore::open(&opts.output);
    build_tileset(&config, &opts, &mut cache).expect("first");
    let second = build_tileset(&config, &opts, &mut cache).expect("second");
    assert!(second.cache.is_hit());
    assert_eq!(descriptor(&second)["frames"].as_object().expect("frames").len(), 1);
}

#[test]
fn cache_store_must_match_output_dir() {
    let (dir, config) = project("");
    let opts = options(dir.path());
    let mut elsewhere = CacheStore::open(dir.path().join("other"));
    let err = build_tileset(&config, &opts, &mut elsewhere).expect_err("mismatched store");
    assert!(matches!(err, TilesetError::Config(_)));
    assert!(!dir.path().join("out").exists());

    let uncached = BuildOptions {
        cache: false,
        ..opts
    };
    build_tileset(&config, &uncached, &mut elsewhere).expect("store unused without cache");
}

#[test]
fn huge_padding_fails_without_panicking() {
    let (dir, _config) = project("");
    let yaml = "files:\n  \"frames/*.png\": {}\npadding: 4294967295\n";
    let err = tileset_core::layout_from_str(yaml, dir.path()).expect_err("padding overflows");
    assert!(err.is_packing());
}

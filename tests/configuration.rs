//! WorkspaceConfig, GifOptions, and Workspace layout tests.

use std::path::Path;

use gifnetor::{
    GifOptions, OutputNaming, RequestId, TranscodeOptions, Workspace, WorkspaceConfig,
};

// ── GifOptions builder ───────────────────────────────────────────

#[test]
fn gif_defaults() {
    let options = GifOptions::new();
    assert_eq!(options.downscale_factor, 4);
    assert_eq!(options.quality, 50);
    assert!(options.optimize);
    assert_eq!(options.repeat, None);
    assert_eq!(options.frame_delay, 0);
}

#[test]
fn downscale_factor_clamps_zero() {
    let options = GifOptions::new().with_downscale_factor(0);
    // Clamped to 1.
    assert_eq!(options.downscale_factor, 1);
    assert_eq!(options.downscaled_dimensions(7, 5), (7, 5));
}

#[test]
fn quality_is_clamped() {
    assert_eq!(GifOptions::new().with_quality(0).quality, 1);
    assert_eq!(GifOptions::new().with_quality(250).quality, 100);
}

#[test]
fn downscaling_uses_integer_division() {
    let options = GifOptions::new();
    assert_eq!(options.downscaled_dimensions(1920, 1080), (480, 270));
    assert_eq!(options.downscaled_dimensions(1921, 1081), (480, 270));
    assert_eq!(options.downscaled_dimensions(3, 3), (0, 0));
}

// ── TranscodeOptions ─────────────────────────────────────────────

#[test]
fn transcode_defaults() {
    let options = TranscodeOptions::new();
    assert_eq!(options.program, Path::new("ffmpeg"));
    assert_eq!(options.fps, Some(10));
    assert_eq!(options.width, Some(320));
    assert_eq!(
        options.video_filter().as_deref(),
        Some("fps=10,scale=320:-1:flags=lanczos")
    );
}

#[test]
fn zero_fps_is_treated_as_unset() {
    let options = TranscodeOptions::new().with_fps(Some(0));
    assert_eq!(options.fps, None);
    assert_eq!(
        options.video_filter().as_deref(),
        Some("scale=320:-1:flags=lanczos")
    );
}

// ── Workspace layout ─────────────────────────────────────────────

#[test]
fn workspace_defaults_to_uploads() {
    let config = WorkspaceConfig::default();
    assert_eq!(config.directory, Path::new("uploads"));
    assert_eq!(config.output_file_name, "output.gif");
    assert_eq!(config.output_naming, OutputNaming::PerRequest);
}

#[test]
fn per_request_output_is_named_after_the_id() {
    let workspace = Workspace::new(WorkspaceConfig::new("scratch"));
    let id = RequestId::new();

    let path = workspace.output_path(&id);
    assert_eq!(path, Path::new("scratch").join(format!("{id}.gif")));
    assert_ne!(workspace.output_path(&RequestId::new()), path);
}

#[test]
fn per_request_output_keeps_configured_extension() {
    let config = WorkspaceConfig::new("scratch").with_output_file_name("result.webp");
    let workspace = Workspace::new(config);
    let id = RequestId::new();
    assert_eq!(
        workspace.output_path(&id),
        Path::new("scratch").join(format!("{id}.webp"))
    );
}

#[test]
fn fixed_output_is_a_single_slot() {
    let config = WorkspaceConfig::new("scratch").with_output_naming(OutputNaming::Fixed);
    let workspace = Workspace::new(config);
    assert_eq!(
        workspace.output_path(&RequestId::new()),
        workspace.output_path(&RequestId::new())
    );
    assert_eq!(
        workspace.output_path(&RequestId::new()),
        Path::new("scratch/output.gif")
    );
}

#[test]
fn request_ids_display_without_hyphens() {
    let id = RequestId::new();
    let text = id.to_string();
    assert_eq!(text.len(), 32);
    assert!(!text.contains('-'));
    assert_eq!(id.as_uuid().get_version_num(), 4);
}

#[test]
fn workspace_is_created_on_demand_and_removal_is_idempotent() {
    let temporary_directory = tempfile::tempdir().expect("Failed to create temp dir");
    let root = temporary_directory.path().join("nested/uploads");
    let workspace = Workspace::new(WorkspaceConfig::new(&root));

    assert!(!root.exists());
    let stored = workspace.store("clip.mp4", b"abc").unwrap();
    assert!(root.is_dir());
    assert_eq!(stored, root.join("clip.mp4"));

    assert!(workspace.remove(&stored).unwrap());
    assert!(!workspace.remove(&stored).unwrap());
}

#[test]
fn failed_store_keeps_existing_content_and_leaves_no_staging_files() {
    let temporary_directory = tempfile::tempdir().expect("Failed to create temp dir");
    let root = temporary_directory.path().join("uploads");
    let workspace = Workspace::new(WorkspaceConfig::new(&root));

    // Something already occupies the name and cannot be replaced by a file.
    let occupied = root.join("clip.mp4");
    std::fs::create_dir_all(&occupied).unwrap();
    std::fs::write(occupied.join("keep"), b"existing").unwrap();

    let error = workspace.store("clip.mp4", b"new payload").unwrap_err();
    assert_eq!(error.kind(), gifnetor::FailureKind::StorageFailure);
    assert_eq!(std::fs::read(occupied.join("keep")).unwrap(), b"existing");

    let entries: Vec<_> = std::fs::read_dir(&root)
        .unwrap()
        .filter_map(Result::ok)
        .map(|entry| entry.file_name())
        .collect();
    assert_eq!(entries, vec![std::ffi::OsString::from("clip.mp4")]);
}

#[test]
fn store_replaces_an_existing_file() {
    let temporary_directory = tempfile::tempdir().expect("Failed to create temp dir");
    let workspace = Workspace::new(WorkspaceConfig::new(temporary_directory.path()));

    workspace.store("clip.mp4", b"old").unwrap();
    let path = workspace.store("clip.mp4", b"new").unwrap();

    assert_eq!(std::fs::read(&path).unwrap(), b"new");
    assert_eq!(std::fs::read_dir(temporary_directory.path()).unwrap().count(), 1);
}

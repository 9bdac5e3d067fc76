//! Workflow lifecycle integration tests.
//!
//! These use stand-in engines so they run without FFmpeg fixtures.

use std::{
    fs,
    path::{Path, PathBuf},
};

use gifnetor::{
    CleanupOutcome, ConversionWorkflow, ConvertError, FailureKind, OutputNaming, TransformEngine,
    TransformOutput, Upload, WorkflowState, WorkspaceConfig,
};

/// Writes a fixed payload to the output path.
struct StubEngine {
    calls: usize,
}

impl StubEngine {
    fn new() -> Self {
        Self { calls: 0 }
    }
}

impl TransformEngine for StubEngine {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn transform(&mut self, input: &Path, output: &Path) -> Result<TransformOutput, ConvertError> {
        self.calls += 1;
        let bytes = fs::read(input).expect("input should exist while converting");
        fs::write(output, b"GIF89a").expect("write stub output");
        Ok(TransformOutput {
            output_path: output.to_path_buf(),
            frame_count: Some(bytes.len() as u64),
            frame_size: Some((480, 270)),
        })
    }
}

/// Leaves a partial file behind and then fails.
struct FailingEngine;

impl TransformEngine for FailingEngine {
    fn name(&self) -> &'static str {
        "failing"
    }

    fn transform(&mut self, input: &Path, output: &Path) -> Result<TransformOutput, ConvertError> {
        fs::write(output, b"partial").expect("write partial output");
        Err(ConvertError::EmptyMedia {
            path: input.to_path_buf(),
        })
    }
}

/// Reports success without frame information, like the delegated transcoder.
struct OpaqueEngine;

impl TransformEngine for OpaqueEngine {
    fn name(&self) -> &'static str {
        "opaque"
    }

    fn transform(&mut self, _input: &Path, output: &Path) -> Result<TransformOutput, ConvertError> {
        fs::write(output, b"GIF89a").expect("write opaque output");
        Ok(TransformOutput::opaque(output))
    }
}

fn workspace_in(directory: &Path) -> (WorkspaceConfig, PathBuf) {
    let root = directory.join("uploads");
    (WorkspaceConfig::new(&root), root)
}

#[test]
fn starts_idle_and_creates_workspace_lazily() {
    let temporary_directory = tempfile::tempdir().expect("Failed to create temp dir");
    let (config, root) = workspace_in(temporary_directory.path());

    let mut workflow = ConversionWorkflow::new(config, StubEngine::new());
    assert_eq!(workflow.state(), WorkflowState::Idle);
    assert!(!root.exists(), "workspace must not exist before the first write");

    workflow
        .intake(Some(Upload::new("clip.mp4", vec![1, 2, 3])))
        .expect("intake should succeed");
    assert!(root.is_dir());
    assert_eq!(workflow.state(), WorkflowState::Uploaded);
}

#[test]
fn intake_stores_bytes_verbatim_under_original_name() {
    let temporary_directory = tempfile::tempdir().expect("Failed to create temp dir");
    let (config, root) = workspace_in(temporary_directory.path());
    let mut workflow = ConversionWorkflow::new(config, StubEngine::new());

    let payload: Vec<u8> = (0..=255).collect();
    let request = workflow
        .intake(Some(Upload::new("clip.mov", payload.clone())))
        .expect("intake should succeed");

    assert_eq!(request.original_name(), "clip.mov");
    assert_eq!(request.media_type(), "video/quicktime");
    assert_eq!(request.storage_path(), &root.join("clip.mov"));
    assert_eq!(fs::read(root.join("clip.mov")).unwrap(), payload);
}

#[test]
fn intake_keeps_only_the_final_path_component() {
    let temporary_directory = tempfile::tempdir().expect("Failed to create temp dir");
    let (config, root) = workspace_in(temporary_directory.path());
    let mut workflow = ConversionWorkflow::new(config, StubEngine::new());

    let request = workflow
        .intake(Some(Upload::new("../../escape.mp4", vec![0])))
        .expect("intake should succeed");
    assert_eq!(request.storage_path(), &root.join("escape.mp4"));
    assert!(!temporary_directory.path().join("escape.mp4").exists());
}

#[test]
fn missing_upload_is_no_file_provided() {
    let temporary_directory = tempfile::tempdir().expect("Failed to create temp dir");
    let (config, _) = workspace_in(temporary_directory.path());
    let mut workflow = ConversionWorkflow::new(config, StubEngine::new());

    let error = workflow.intake(None).unwrap_err();
    assert_eq!(error.kind(), FailureKind::NoFileProvided);

    let error = workflow.intake(Some(Upload::new("", vec![1]))).unwrap_err();
    assert_eq!(error.kind(), FailureKind::NoFileProvided);
    assert_eq!(workflow.state(), WorkflowState::Idle);
}

#[test]
fn storage_failure_leaves_state_untouched() {
    let temporary_directory = tempfile::tempdir().expect("Failed to create temp dir");
    // A regular file where the workspace directory should be.
    let blocker = temporary_directory.path().join("uploads");
    fs::write(&blocker, b"not a directory").unwrap();

    let mut workflow = ConversionWorkflow::new(WorkspaceConfig::new(&blocker), StubEngine::new());
    let error = workflow
        .intake(Some(Upload::new("clip.mp4", vec![1])))
        .unwrap_err();

    assert_eq!(error.kind(), FailureKind::StorageFailure);
    assert_eq!(workflow.state(), WorkflowState::Idle);
    assert!(workflow.request().is_none());
}

#[test]
fn convert_requires_an_explicit_upload() {
    let temporary_directory = tempfile::tempdir().expect("Failed to create temp dir");
    let (config, _) = workspace_in(temporary_directory.path());
    let mut workflow = ConversionWorkflow::new(config, StubEngine::new());

    let error = workflow.convert().unwrap_err();
    assert!(matches!(
        error,
        ConvertError::InvalidState {
            state: WorkflowState::Idle,
            ..
        }
    ));
    assert_eq!(workflow.engine().calls, 0);
}

#[test]
fn upload_does_not_start_conversion() {
    let temporary_directory = tempfile::tempdir().expect("Failed to create temp dir");
    let (config, _) = workspace_in(temporary_directory.path());
    let mut workflow = ConversionWorkflow::new(config, StubEngine::new());

    workflow
        .intake(Some(Upload::new("clip.mp4", vec![1])))
        .unwrap();
    assert_eq!(workflow.engine().calls, 0);
    assert!(workflow.result().is_none());
}

#[test]
fn convert_deliver_cleanup_lifecycle() {
    let temporary_directory = tempfile::tempdir().expect("Failed to create temp dir");
    let (config, _) = workspace_in(temporary_directory.path());
    let mut workflow = ConversionWorkflow::new(config, StubEngine::new());

    let input = workflow
        .intake(Some(Upload::new("clip.mp4", vec![9; 10])))
        .unwrap()
        .storage_path()
        .clone();

    let result = workflow.convert().expect("conversion should succeed").clone();
    assert_eq!(workflow.state(), WorkflowState::Converted);
    assert_eq!(result.frame_count, Some(10));
    assert_eq!(result.frame_size, Some((480, 270)));
    assert!(result.output_path.exists());

    let delivery = workflow.deliver().expect("delivery should succeed");
    assert_eq!(delivery.file_name, "output.gif");
    assert_eq!(delivery.mime_type, "image/gif");
    assert_eq!(delivery.bytes, b"GIF89a");
    assert!(delivery.data_uri().starts_with("data:image/gif;base64,R0lGODlh"));
    assert_eq!(
        delivery.content_disposition(),
        "attachment; filename=\"output.gif\""
    );

    let outcome = workflow.cleanup().expect("cleanup should succeed");
    assert_eq!(
        outcome,
        CleanupOutcome::Removed(vec![input.clone(), result.output_path.clone()])
    );
    assert!(!input.exists());
    assert!(!result.output_path.exists());
    assert_eq!(workflow.state(), WorkflowState::Cleaned);

    let second = workflow.cleanup().expect("second cleanup should succeed");
    assert_eq!(second, CleanupOutcome::NothingToRemove);
}

#[test]
fn cleanup_removes_whichever_files_exist() {
    let temporary_directory = tempfile::tempdir().expect("Failed to create temp dir");
    let (config, _) = workspace_in(temporary_directory.path());
    let mut workflow = ConversionWorkflow::new(config, StubEngine::new());

    let input = workflow
        .intake(Some(Upload::new("clip.mp4", vec![1])))
        .unwrap()
        .storage_path()
        .clone();

    // Only the input exists; no conversion was attempted.
    let outcome = workflow.cleanup().unwrap();
    assert_eq!(outcome, CleanupOutcome::Removed(vec![input.clone()]));
    assert!(!input.exists());
}

#[test]
fn cleanup_with_nothing_known_is_not_an_error() {
    let temporary_directory = tempfile::tempdir().expect("Failed to create temp dir");
    let (config, _) = workspace_in(temporary_directory.path());
    let mut workflow = ConversionWorkflow::new(config, StubEngine::new());

    assert_eq!(workflow.cleanup().unwrap(), CleanupOutcome::NothingToRemove);
    assert_eq!(workflow.state(), WorkflowState::Idle);
}

#[test]
fn cleanup_reports_nothing_when_files_already_vanished() {
    let temporary_directory = tempfile::tempdir().expect("Failed to create temp dir");
    let (config, _) = workspace_in(temporary_directory.path());
    let mut workflow = ConversionWorkflow::new(config, StubEngine::new());

    let input = workflow
        .intake(Some(Upload::new("clip.mp4", vec![1])))
        .unwrap()
        .storage_path()
        .clone();
    fs::remove_file(&input).unwrap();

    let outcome = workflow.cleanup().unwrap();
    assert!(!outcome.removed_anything());
    assert_eq!(workflow.state(), WorkflowState::Cleaned);
}

#[test]
fn cleanup_failure_keeps_paths_for_a_retry() {
    let temporary_directory = tempfile::tempdir().expect("Failed to create temp dir");
    let (config, _) = workspace_in(temporary_directory.path());
    let mut workflow = ConversionWorkflow::new(config, StubEngine::new());

    workflow
        .intake(Some(Upload::new("clip.mp4", vec![1])))
        .unwrap();
    let output = workflow.convert().unwrap().output_path.clone();

    // A non-empty directory where the artifact should be cannot be removed
    // as a file.
    fs::remove_file(&output).unwrap();
    fs::create_dir(&output).unwrap();
    fs::write(output.join("obstacle"), b"x").unwrap();

    let error = workflow.cleanup().unwrap_err();
    assert_eq!(error.kind(), FailureKind::StorageFailure);
    assert_eq!(workflow.state(), WorkflowState::Converted);
    assert!(workflow.request().is_some());
    assert_eq!(
        workflow.result().map(|result| result.output_path.clone()),
        Some(output.clone())
    );

    fs::remove_dir_all(&output).unwrap();
    workflow.cleanup().expect("cleanup should succeed once unblocked");
    assert_eq!(workflow.state(), WorkflowState::Cleaned);
    assert!(workflow.request().is_none());
    assert_eq!(workflow.cleanup().unwrap(), CleanupOutcome::NothingToRemove);
}

#[test]
fn failed_conversion_leaves_no_artifact_and_records_reason() {
    let temporary_directory = tempfile::tempdir().expect("Failed to create temp dir");
    let (config, root) = workspace_in(temporary_directory.path());
    let mut workflow = ConversionWorkflow::new(config, FailingEngine);

    workflow
        .intake(Some(Upload::new("broken.mp4", Vec::new())))
        .unwrap();
    let error = workflow.convert().unwrap_err();

    assert_eq!(error.kind(), FailureKind::EmptyMedia);
    assert_eq!(
        workflow.state(),
        WorkflowState::Failed(FailureKind::EmptyMedia)
    );
    assert!(workflow.result().is_none());

    let gifs: Vec<_> = fs::read_dir(&root)
        .unwrap()
        .filter_map(Result::ok)
        .filter(|entry| entry.path().extension().is_some_and(|ext| ext == "gif"))
        .collect();
    assert!(gifs.is_empty(), "no output artifact should remain");

    let delivery_error = workflow.deliver().unwrap_err();
    assert!(matches!(
        delivery_error,
        ConvertError::NothingToDeliver {
            state: WorkflowState::Failed(FailureKind::EmptyMedia)
        }
    ));
}

#[test]
fn failed_conversion_can_be_retried() {
    let temporary_directory = tempfile::tempdir().expect("Failed to create temp dir");
    let (config, _) = workspace_in(temporary_directory.path());
    let mut workflow = ConversionWorkflow::new(config, FailingEngine);

    workflow
        .intake(Some(Upload::new("broken.mp4", Vec::new())))
        .unwrap();
    assert!(workflow.convert().is_err());
    // Same operation again: allowed, fails the same way.
    let error = workflow.convert().unwrap_err();
    assert_eq!(error.kind(), FailureKind::EmptyMedia);
}

#[test]
fn delivery_before_conversion_is_refused() {
    let temporary_directory = tempfile::tempdir().expect("Failed to create temp dir");
    let (config, _) = workspace_in(temporary_directory.path());
    let mut workflow = ConversionWorkflow::new(config, StubEngine::new());

    workflow
        .intake(Some(Upload::new("clip.mp4", vec![1])))
        .unwrap();
    let error = workflow.deliver().unwrap_err();
    assert_eq!(error.kind(), FailureKind::NothingToDeliver);
}

#[test]
fn opaque_engine_result_has_no_frame_count() {
    let temporary_directory = tempfile::tempdir().expect("Failed to create temp dir");
    let (config, _) = workspace_in(temporary_directory.path());
    let mut workflow = ConversionWorkflow::new(config, OpaqueEngine);

    workflow
        .intake(Some(Upload::new("clip.mkv", vec![1])))
        .unwrap();
    let result = workflow.convert().unwrap();
    assert_eq!(result.frame_count, None);
    assert_eq!(result.frame_size, None);
    assert!(workflow.deliver().is_ok());
}

#[test]
fn per_request_outputs_do_not_collide() {
    let temporary_directory = tempfile::tempdir().expect("Failed to create temp dir");
    let (config, _) = workspace_in(temporary_directory.path());

    let mut first = ConversionWorkflow::new(config.clone(), StubEngine::new());
    let mut second = ConversionWorkflow::new(config, StubEngine::new());

    first.intake(Some(Upload::new("a.mp4", vec![1]))).unwrap();
    second.intake(Some(Upload::new("b.mp4", vec![2, 2]))).unwrap();

    let first_output = first.convert().unwrap().output_path.clone();
    let second_output = second.convert().unwrap().output_path.clone();
    assert_ne!(first_output, second_output);

    first.cleanup().unwrap();
    assert!(second_output.exists(), "cleanup must not touch other requests");
}

#[test]
fn fixed_output_uses_the_single_slot() {
    let temporary_directory = tempfile::tempdir().expect("Failed to create temp dir");
    let (config, root) = workspace_in(temporary_directory.path());
    let config = config.with_output_naming(OutputNaming::Fixed);
    let mut workflow = ConversionWorkflow::new(config, StubEngine::new());

    workflow
        .intake(Some(Upload::new("clip.mp4", vec![1])))
        .unwrap();
    let result = workflow.convert().unwrap();
    assert_eq!(result.output_path, root.join("output.gif"));
}

#[test]
fn new_upload_replaces_previous_request() {
    let temporary_directory = tempfile::tempdir().expect("Failed to create temp dir");
    let (config, _) = workspace_in(temporary_directory.path());
    let mut workflow = ConversionWorkflow::new(config, StubEngine::new());

    let old_input = workflow
        .intake(Some(Upload::new("old.mp4", vec![1])))
        .unwrap()
        .storage_path()
        .clone();
    let old_output = workflow.convert().unwrap().output_path.clone();

    let new_request = workflow
        .intake(Some(Upload::new("new.mp4", vec![2])))
        .unwrap()
        .clone();

    assert_eq!(workflow.state(), WorkflowState::Uploaded);
    assert!(workflow.result().is_none());
    assert!(!old_input.exists());
    assert!(!old_output.exists());
    assert!(new_request.storage_path().exists());
}

#[test]
fn reuploading_the_same_name_keeps_the_new_file() {
    let temporary_directory = tempfile::tempdir().expect("Failed to create temp dir");
    let (config, _) = workspace_in(temporary_directory.path());
    let mut workflow = ConversionWorkflow::new(config, StubEngine::new());

    workflow
        .intake(Some(Upload::new("clip.mp4", vec![1])))
        .unwrap();
    let path = workflow
        .intake(Some(Upload::new("clip.mp4", vec![7, 7])))
        .unwrap()
        .storage_path()
        .clone();

    assert_eq!(fs::read(path).unwrap(), vec![7, 7]);
}

#[test]
fn errors_carry_user_facing_messages() {
    let error = ConvertError::UnopenableMedia {
        path: PathBuf::from("/srv/secret/clip.mp4"),
        reason: "Invalid data found when processing input".to_string(),
    };
    assert!(error.to_string().contains("Failed to open media file"));
    assert!(!error.user_message().contains("/srv/secret"));
}

//! End-to-end pipeline runs against in-memory collaborators.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use ontask_gemini::{InferenceClient, InferenceError, InferenceResult, RemoteFile, RemoteFileState};
use ontask_media::{MediaError, MediaResult, MediaTransformer};
use ontask_models::{ActivityLabel, AnnotationInterval};
use ontask_worker::{AnalysisOutcome, Pipeline, PipelineConfig, PipelineError, RecordingClock};

/// Writes placeholder files instead of running FFmpeg.
struct FakeTransformer {
    duration: Option<f64>,
    fail_transform: bool,
    /// Offsets whose extracted file is too small to keep
    tiny_offsets: Vec<f64>,
    extracted: Mutex<Vec<(f64, f64)>>,
}

impl FakeTransformer {
    fn with_duration(secs: f64) -> Self {
        Self {
            duration: Some(secs),
            fail_transform: false,
            tiny_offsets: Vec::new(),
            extracted: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl MediaTransformer for FakeTransformer {
    async fn transform(&self, _input: &Path, output: &Path, scale_filter: &str) -> MediaResult<()> {
        assert_eq!(scale_filter, "scale=-2:480");
        if self.fail_transform {
            return Err(MediaError::ffmpeg_failed("encoder crashed", None, Some(1)));
        }
        tokio::fs::write(output, vec![0u8; 4096]).await?;
        Ok(())
    }

    async fn extract_segment(&self, _input: &Path, output: &Path, start: f64, duration: f64) -> MediaResult<()> {
        self.extracted.lock().unwrap().push((start, duration));
        let size = if self.tiny_offsets.contains(&start) { 100 } else { 2048 };
        tokio::fs::write(output, vec![0u8; size]).await?;
        Ok(())
    }

    async fn probe_duration(&self, input: &Path) -> MediaResult<f64> {
        self.duration
            .ok_or_else(|| MediaError::invalid_duration(input, "N/A"))
    }
}

#[derive(Clone, Copy)]
enum Reply {
    /// Two intervals stamped by chunk
    Plain,
    /// Same as `Plain` wrapped in a ```json fence
    Fenced,
    Malformed,
    RateLimited,
}

/// Names remote files after the uploaded chunk.
struct FakeClient {
    reply: Reply,
    failed_chunks: HashSet<String>,
    uploads: Mutex<Vec<String>>,
    deletes: Mutex<Vec<String>>,
    infer_calls: Mutex<u32>,
}

impl FakeClient {
    fn new(reply: Reply) -> Self {
        Self {
            reply,
            failed_chunks: HashSet::new(),
            uploads: Mutex::new(Vec::new()),
            deletes: Mutex::new(Vec::new()),
            infer_calls: Mutex::new(0),
        }
    }

    fn failing(mut self, chunk_file: &str) -> Self {
        self.failed_chunks.insert(chunk_file.to_string());
        self
    }

    /// Intervals stamped with a minute derived from the chunk number.
    fn plain_reply(name: &str) -> String {
        let minute = match name {
            "temp_chunk_000.mp4" => "00:00",
            "temp_chunk_001.mp4" => "00:05",
            "temp_chunk_002.mp4" => "00:10",
            _ => "00:59",
        };
        format!(
            r#"[{{"start_time": "{0}:01", "end_time": "{0}:05", "label": "Task"}},
               {{"start_time": "{0}:05", "end_time": "{0}:06", "label": "Off Task"}}]"#,
            minute
        )
    }
}

#[async_trait]
impl InferenceClient for FakeClient {
    async fn upload(&self, path: &Path) -> InferenceResult<RemoteFile> {
        assert!(path.exists(), "chunk file must exist while uploading");
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        self.uploads.lock().unwrap().push(name.clone());
        Ok(RemoteFile {
            uri: format!("https://files.example/{}", name),
            name,
            mime_type: "video/mp4".to_string(),
        })
    }

    async fn get_state(&self, file: &RemoteFile) -> InferenceResult<RemoteFileState> {
        if self.failed_chunks.contains(&file.name) {
            Ok(RemoteFileState::Failed)
        } else {
            Ok(RemoteFileState::Ready)
        }
    }

    async fn delete(&self, file: &RemoteFile) -> InferenceResult<()> {
        self.deletes.lock().unwrap().push(file.name.clone());
        Ok(())
    }

    async fn infer(&self, file: &RemoteFile, prompt: &str) -> InferenceResult<String> {
        assert!(prompt.contains("Off Task"));
        *self.infer_calls.lock().unwrap() += 1;
        match self.reply {
            Reply::Plain => Ok(Self::plain_reply(&file.name)),
            Reply::Fenced => Ok(format!("```json\n{}\n```", Self::plain_reply(&file.name))),
            Reply::Malformed => Ok("I could not find any clock in this clip.".to_string()),
            Reply::RateLimited => Err(InferenceError::api(429, "Resource has been exhausted (e.g. check quota).")),
        }
    }
}

struct Harness {
    dir: tempfile::TempDir,
    input: PathBuf,
    config: PipelineConfig,
    clock: Arc<RecordingClock>,
}

impl Harness {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("P7.mp4");
        std::fs::write(&input, b"source video").unwrap();
        let config = PipelineConfig {
            work_dir: dir.path().join("work"),
            ..Default::default()
        };
        Self {
            dir,
            input,
            config,
            clock: Arc::new(RecordingClock::new()),
        }
    }

    fn work_dir(&self) -> &Path {
        &self.config.work_dir
    }

    fn output_path(&self) -> PathBuf {
        self.dir.path().join("P7_FINAL_ANNOTATIONS.json")
    }

    fn pipeline(&self, transformer: Arc<FakeTransformer>, client: Arc<FakeClient>) -> Pipeline {
        Pipeline::new(self.config.clone(), transformer, client, self.clock.clone())
    }

    fn leftover_files(&self) -> Vec<String> {
        match std::fs::read_dir(self.work_dir()) {
            Ok(entries) => entries
                .filter_map(|e| e.ok())
                .map(|e| e.file_name().to_string_lossy().to_string())
                .collect(),
            Err(_) => Vec::new(),
        }
    }

    fn read_output(&self) -> Vec<serde_json::Value> {
        let text = std::fs::read_to_string(self.output_path()).unwrap();
        serde_json::from_str(&text).unwrap()
    }
}

#[tokio::test]
async fn test_twelve_minutes_with_remote_failure() {
    let harness = Harness::new();
    let transformer = Arc::new(FakeTransformer::with_duration(720.0));
    let client = Arc::new(FakeClient::new(Reply::Plain).failing("temp_chunk_001.mp4"));

    let summary = harness
        .pipeline(transformer.clone(), client.clone())
        .run(&harness.input)
        .await
        .unwrap();

    assert_eq!(
        *transformer.extracted.lock().unwrap(),
        vec![(0.0, 300.0), (300.0, 300.0), (600.0, 300.0)]
    );
    assert_eq!(summary.chunks_processed, 3);
    assert_eq!(summary.chunks_skipped, 0);
    assert_eq!(summary.annotations, 4);
    assert_eq!(summary.failed_chunks.len(), 1);
    assert_eq!(summary.failed_chunks[0].chunk_index, 1);
    assert_eq!(summary.failed_chunks[0].outcome, AnalysisOutcome::RemoteFailed);
    assert_eq!(summary.output_path, harness.output_path());

    let intervals: Vec<AnnotationInterval> =
        serde_json::from_str(&std::fs::read_to_string(harness.output_path()).unwrap()).unwrap();
    assert_eq!(intervals.len(), 4);
    assert_eq!(intervals[0].label, ActivityLabel::Task);
    assert_eq!(intervals[1].label, ActivityLabel::OffTask);
    let starts: Vec<_> = intervals.iter().map(|i| i.start_time.as_str()).collect();
    assert_eq!(starts, vec!["00:00:01", "00:00:05", "00:10:01", "00:10:05"]);

    assert_eq!(
        *client.uploads.lock().unwrap(),
        vec!["temp_chunk_000.mp4", "temp_chunk_001.mp4", "temp_chunk_002.mp4"]
    );
    assert_eq!(client.deletes.lock().unwrap().len(), 3);
    assert_eq!(*client.infer_calls.lock().unwrap(), 2);

    assert!(harness.leftover_files().is_empty(), "left behind: {:?}", harness.leftover_files());
    assert_eq!(
        harness.clock.sleeps(),
        vec![Duration::from_secs(5), Duration::from_secs(5)]
    );
}

#[tokio::test]
async fn test_order_follows_chunk_index() {
    let harness = Harness::new();
    let transformer = Arc::new(FakeTransformer::with_duration(900.0));
    let client = Arc::new(FakeClient::new(Reply::Plain));

    harness
        .pipeline(transformer, client.clone())
        .run(&harness.input)
        .await
        .unwrap();

    let uploads = client.uploads.lock().unwrap().clone();
    assert_eq!(uploads, vec!["temp_chunk_000.mp4", "temp_chunk_001.mp4", "temp_chunk_002.mp4"]);

    let output = harness.read_output();
    let starts: Vec<_> = output
        .iter()
        .map(|v| v["start_time"].as_str().unwrap_or_default().to_string())
        .collect();
    assert_eq!(
        starts,
        vec!["00:00:01", "00:00:05", "00:05:01", "00:05:05", "00:10:01", "00:10:05"]
    );
    assert_eq!(output[1]["label"], "Off Task");
}

#[tokio::test]
async fn test_rate_limit_bound() {
    let harness = Harness::new();
    let transformer = Arc::new(FakeTransformer::with_duration(200.0));
    let client = Arc::new(FakeClient::new(Reply::RateLimited));

    let summary = harness
        .pipeline(transformer, client.clone())
        .run(&harness.input)
        .await
        .unwrap();

    assert_eq!(*client.infer_calls.lock().unwrap(), 3);
    assert_eq!(
        harness.clock.sleeps(),
        vec![Duration::from_secs(60), Duration::from_secs(120)]
    );
    assert_eq!(
        summary.failed_chunks[0].outcome,
        AnalysisOutcome::RateLimitExhausted { attempts: 3 }
    );
    assert!(harness.read_output().is_empty());
    assert_eq!(client.deletes.lock().unwrap().len(), 1);
    assert!(harness.leftover_files().is_empty());
}

#[tokio::test]
async fn test_malformed_response_yields_no_annotations() {
    let harness = Harness::new();
    let transformer = Arc::new(FakeTransformer::with_duration(600.0));
    let client = Arc::new(FakeClient::new(Reply::Malformed));

    let summary = harness
        .pipeline(transformer, client.clone())
        .run(&harness.input)
        .await
        .unwrap();

    assert_eq!(summary.chunks_processed, 2);
    assert_eq!(summary.annotations, 0);
    assert!(summary
        .failed_chunks
        .iter()
        .all(|f| matches!(f.outcome, AnalysisOutcome::Unparseable { .. })));
    assert!(harness.read_output().is_empty());
    assert_eq!(*client.infer_calls.lock().unwrap(), 2);
}

#[tokio::test]
async fn test_fenced_response_matches_plain() {
    let plain = Harness::new();
    plain
        .pipeline(
            Arc::new(FakeTransformer::with_duration(300.0)),
            Arc::new(FakeClient::new(Reply::Plain)),
        )
        .run(&plain.input)
        .await
        .unwrap();

    let fenced = Harness::new();
    fenced
        .pipeline(
            Arc::new(FakeTransformer::with_duration(300.0)),
            Arc::new(FakeClient::new(Reply::Fenced)),
        )
        .run(&fenced.input)
        .await
        .unwrap();

    assert_eq!(
        std::fs::read_to_string(plain.output_path()).unwrap(),
        std::fs::read_to_string(fenced.output_path()).unwrap()
    );
    assert_eq!(fenced.read_output().len(), 2);
}

#[tokio::test]
async fn test_missing_input_aborts_before_work() {
    let harness = Harness::new();
    let transformer = Arc::new(FakeTransformer::with_duration(600.0));
    let client = Arc::new(FakeClient::new(Reply::Plain));
    let missing = harness.dir.path().join("P8.mp4");

    let err = harness
        .pipeline(transformer.clone(), client.clone())
        .run(&missing)
        .await
        .unwrap_err();

    assert!(matches!(err, PipelineError::InputNotFound(ref p) if *p == missing));
    assert!(err.is_input_error());
    assert!(transformer.extracted.lock().unwrap().is_empty());
    assert!(client.uploads.lock().unwrap().is_empty());
    assert!(!harness.work_dir().exists());
}

#[tokio::test]
async fn test_input_named_like_temp_file_is_rejected() {
    let harness = Harness::new();
    let transformer = Arc::new(FakeTransformer::with_duration(600.0));
    let client = Arc::new(FakeClient::new(Reply::Plain));
    std::fs::create_dir_all(harness.work_dir()).unwrap();

    for name in ["temp_compressed.mp4", "temp_chunk_000.mp4"] {
        let input = harness.work_dir().join(name);
        std::fs::write(&input, b"original trial footage").unwrap();

        let err = harness
            .pipeline(transformer.clone(), client.clone())
            .run(&input)
            .await
            .unwrap_err();

        assert!(matches!(err, PipelineError::InputConflict(ref p) if *p == input));
        assert!(err.is_input_error());
        assert_eq!(std::fs::read(&input).unwrap(), b"original trial footage");
    }
    assert!(transformer.extracted.lock().unwrap().is_empty());
    assert!(client.uploads.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_temp_name_outside_work_dir_is_accepted() {
    let harness = Harness::new();
    let transformer = Arc::new(FakeTransformer::with_duration(300.0));
    let client = Arc::new(FakeClient::new(Reply::Plain));
    let input = harness.dir.path().join("temp_compressed.mp4");
    std::fs::write(&input, b"source video").unwrap();

    let summary = harness
        .pipeline(transformer, client)
        .run(&input)
        .await
        .unwrap();

    assert_eq!(summary.chunks_processed, 1);
    assert!(input.exists());
}

#[tokio::test]
async fn test_small_segments_are_skipped() {
    let harness = Harness::new();
    let mut transformer = FakeTransformer::with_duration(720.0);
    transformer.tiny_offsets = vec![300.0];
    let client = Arc::new(FakeClient::new(Reply::Plain));

    let summary = harness
        .pipeline(Arc::new(transformer), client.clone())
        .run(&harness.input)
        .await
        .unwrap();

    assert_eq!(summary.chunks_processed, 2);
    assert_eq!(summary.chunks_skipped, 1);
    assert!(!summary.is_complete());
    assert_eq!(
        *client.uploads.lock().unwrap(),
        vec!["temp_chunk_000.mp4", "temp_chunk_001.mp4"]
    );
    assert!(harness.leftover_files().is_empty());
}

#[tokio::test]
async fn test_unknown_duration_uses_fallback() {
    let mut harness = Harness::new();
    harness.config.fallback_duration_secs = 900.0;
    let transformer = Arc::new(FakeTransformer {
        duration: None,
        ..FakeTransformer::with_duration(0.0)
    });
    let client = Arc::new(FakeClient::new(Reply::Plain));

    let summary = harness
        .pipeline(transformer.clone(), client)
        .run(&harness.input)
        .await
        .unwrap();

    assert_eq!(transformer.extracted.lock().unwrap().len(), 3);
    assert_eq!(summary.chunks_processed, 3);
}

#[tokio::test]
async fn test_transform_failure_writes_empty_timeline() {
    let harness = Harness::new();
    let transformer = Arc::new(FakeTransformer {
        fail_transform: true,
        ..FakeTransformer::with_duration(600.0)
    });
    let client = Arc::new(FakeClient::new(Reply::Plain));

    let summary = harness
        .pipeline(transformer.clone(), client.clone())
        .run(&harness.input)
        .await
        .unwrap();

    assert_eq!(summary.chunks_processed, 0);
    assert!(transformer.extracted.lock().unwrap().is_empty());
    assert!(client.uploads.lock().unwrap().is_empty());
    assert!(harness.read_output().is_empty());
    assert!(harness.clock.sleeps().is_empty());
}

#[tokio::test]
async fn test_cleanup_when_persist_fails() {
    let mut harness = Harness::new();
    let blocker = harness.dir.path().join("not_a_dir");
    std::fs::write(&blocker, b"file").unwrap();
    harness.config.output_dir = Some(blocker.join("results"));

    let err = harness
        .pipeline(
            Arc::new(FakeTransformer::with_duration(600.0)),
            Arc::new(FakeClient::new(Reply::Plain)),
        )
        .run(&harness.input)
        .await
        .unwrap_err();

    assert!(matches!(err, PipelineError::PersistFailed { .. }));
    assert!(harness.leftover_files().is_empty());
}

#[tokio::test]
async fn test_second_run_reuses_clean_work_dir() {
    let harness = Harness::new();

    for _ in 0..2 {
        harness
            .pipeline(
                Arc::new(FakeTransformer::with_duration(400.0)),
                Arc::new(FakeClient::new(Reply::Plain).failing("temp_chunk_000.mp4")),
            )
            .run(&harness.input)
            .await
            .unwrap();
        assert!(harness.leftover_files().is_empty());
    }

    assert_eq!(harness.read_output().len(), 2);
}

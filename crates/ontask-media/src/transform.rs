//! Media transform collaborator.
//!
//! Every encode drops the audio stream: audio never leaves the local
//! machine.

use std::path::Path;

use async_trait::async_trait;
use tracing::info;

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};
use crate::probe;

/// Default scale filter: 480p height, width kept divisible by 2.
pub const DEFAULT_SCALE_FILTER: &str = "scale=-2:480";

/// Default constant rate factor for size-optimized H.264.
pub const DEFAULT_CRF: u8 = 28;

/// Compresses, cuts and probes video files.
#[async_trait]
pub trait MediaTransformer: Send + Sync {
    /// Re-encode `input` to H.264 at `scale_filter` without audio.
    async fn transform(&self, input: &Path, output: &Path, scale_filter: &str) -> MediaResult<()>;

    /// Encode `[start_secs, start_secs + duration_secs)` of `input` without audio.
    ///
    /// Clipping a window that runs past the end of the input is the
    /// implementation's job.
    async fn extract_segment(
        &self,
        input: &Path,
        output: &Path,
        start_secs: f64,
        duration_secs: f64,
    ) -> MediaResult<()>;

    /// Container duration in seconds.
    async fn probe_duration(&self, input: &Path) -> MediaResult<f64>;
}

/// Encoder settings for [`FfmpegTransformer`].
#[derive(Debug, Clone)]
pub struct EncodeSettings {
    /// Constant rate factor for libx264
    pub crf: u8,
    /// Preset for the whole-file privacy transform
    pub transform_preset: String,
    /// Preset for chunk extraction
    pub segment_preset: String,
    /// Per-invocation FFmpeg timeout
    pub timeout_secs: Option<u64>,
}

impl Default for EncodeSettings {
    fn default() -> Self {
        Self {
            crf: DEFAULT_CRF,
            transform_preset: "faster".to_string(),
            segment_preset: "fast".to_string(),
            timeout_secs: None,
        }
    }
}

/// [`MediaTransformer`] backed by the FFmpeg and FFprobe CLIs.
#[derive(Debug, Clone, Default)]
pub struct FfmpegTransformer {
    settings: EncodeSettings,
    runner: FfmpegRunner,
}

impl FfmpegTransformer {
    pub fn new(settings: EncodeSettings) -> Self {
        let runner = match settings.timeout_secs {
            Some(secs) => FfmpegRunner::new().with_timeout(secs),
            None => FfmpegRunner::new(),
        };
        Self { settings, runner }
    }

    pub fn settings(&self) -> &EncodeSettings {
        &self.settings
    }

    /// Build the compress-and-strip-audio command.
    pub fn transform_command(&self, input: &Path, output: &Path, scale_filter: &str) -> FfmpegCommand {
        FfmpegCommand::new(input, output)
            .video_filter(scale_filter)
            .strip_audio()
            .video_codec("libx264")
            .crf(self.settings.crf)
            .preset(self.settings.transform_preset.clone())
    }

    /// Build the chunk extraction command.
    pub fn segment_command(
        &self,
        input: &Path,
        output: &Path,
        start_secs: f64,
        duration_secs: f64,
    ) -> FfmpegCommand {
        FfmpegCommand::new(input, output)
            .seek(start_secs)
            .duration(duration_secs)
            .video_codec("libx264")
            .preset(self.settings.segment_preset.clone())
            .crf(self.settings.crf)
            .strip_audio()
    }
}

#[async_trait]
impl MediaTransformer for FfmpegTransformer {
    async fn transform(&self, input: &Path, output: &Path, scale_filter: &str) -> MediaResult<()> {
        if !input.exists() {
            return Err(MediaError::FileNotFound(input.to_path_buf()));
        }

        info!(
            "Compressing and removing audio: {} -> {} ({})",
            input.display(),
            output.display(),
            scale_filter
        );

        let cmd = self.transform_command(input, output, scale_filter);
        self.runner.run(&cmd).await?;

        info!("Privacy scrubbing and compression complete: {}", output.display());
        Ok(())
    }

    async fn extract_segment(
        &self,
        input: &Path,
        output: &Path,
        start_secs: f64,
        duration_secs: f64,
    ) -> MediaResult<()> {
        tracing::debug!(
            "Extracting segment: {} -> {} (start: {:.2}s, duration: {:.2}s)",
            input.display(),
            output.display(),
            start_secs,
            duration_secs
        );

        let cmd = self.segment_command(input, output, start_secs, duration_secs);
        self.runner.run(&cmd).await
    }

    async fn probe_duration(&self, input: &Path) -> MediaResult<f64> {
        probe::probe_duration(input).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transform_command_strips_audio() {
        let transformer = FfmpegTransformer::default();
        let args = transformer
            .transform_command(Path::new("P7.mp4"), Path::new("temp_compressed.mp4"), DEFAULT_SCALE_FILTER)
            .build_args();

        let vf = args.iter().position(|a| a == "-vf").unwrap();
        assert_eq!(args[vf + 1], "scale=-2:480");
        assert!(args.contains(&"-an".to_string()));
        assert!(args.contains(&"libx264".to_string()));
        assert!(args.contains(&"28".to_string()));
        assert!(args.contains(&"faster".to_string()));
    }

    #[test]
    fn test_segment_command_window() {
        let transformer = FfmpegTransformer::new(EncodeSettings {
            crf: 30,
            ..Default::default()
        });
        let args = transformer
            .segment_command(Path::new("in.mp4"), Path::new("temp_chunk_001.mp4"), 300.0, 300.0)
            .build_args();

        let ss = args.iter().position(|a| a == "-ss").unwrap();
        assert_eq!(args[ss + 1], "300.000");
        let t = args.iter().position(|a| a == "-t").unwrap();
        assert_eq!(args[t + 1], "300.000");
        assert!(args.contains(&"-an".to_string()));
        assert!(args.contains(&"30".to_string()));
        assert!(args.contains(&"fast".to_string()));
    }

    #[tokio::test]
    async fn test_transform_missing_input() {
        let transformer = FfmpegTransformer::default();
        let result = transformer
            .transform(Path::new("/nonexistent/in.mp4"), Path::new("/tmp/out.mp4"), DEFAULT_SCALE_FILTER)
            .await;
        assert!(matches!(result, Err(MediaError::FileNotFound(_))));
    }
}

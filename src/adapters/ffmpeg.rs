//! Audio transcoding with an ffmpeg child process.

use crate::config::TranscodeSettings;
use crate::pipeline::Transcoder;
use async_trait::async_trait;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use thiserror::Error;
use tokio::process::Command;
use tracing::debug;

#[derive(Debug, Error)]
pub enum TranscodeError {
    #[error("ffmpeg failed ({status}): {stderr}")]
    Failed { status: String, stderr: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub struct FfmpegTranscoder {
    settings: TranscodeSettings,
}

impl FfmpegTranscoder {
    pub fn new(settings: TranscodeSettings) -> Self {
        Self { settings }
    }

    /// Output path for a given stem: `<stem>.<extension>`.
    pub fn output_path(&self, output_stem: &Path) -> PathBuf {
        let mut path = output_stem.as_os_str().to_owned();
        path.push(".");
        path.push(&self.settings.extension);
        PathBuf::from(path)
    }

    fn build_args(&self, input: &Path, output: &Path) -> Vec<OsString> {
        let s = &self.settings;
        vec![
            "-y".into(),
            "-loglevel".into(),
            "error".into(),
            "-i".into(),
            input.as_os_str().to_owned(),
            "-vn".into(),
            "-acodec".into(),
            s.codec.clone().into(),
            "-b:a".into(),
            s.bitrate.clone().into(),
            "-f".into(),
            s.format.clone().into(),
            output.as_os_str().to_owned(),
        ]
    }

    pub async fn convert(&self, input: &Path, output_stem: &Path) -> Result<PathBuf, TranscodeError> {
        let output = self.output_path(output_stem);
        debug!("Transcoding {:?} -> {:?}", input, output);

        let result = Command::new(&self.settings.ffmpeg_path)
            .args(self.build_args(input, &output))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .await?;

        if !result.status.success() {
            // Don't leave a truncated file behind.
            let _ = tokio::fs::remove_file(&output).await;
            return Err(TranscodeError::Failed {
                status: result.status.to_string(),
                stderr: String::from_utf8_lossy(&result.stderr).trim().to_string(),
            });
        }
        Ok(output)
    }
}

#[async_trait]
impl Transcoder for FfmpegTranscoder {
    async fn transcode(&self, input: &Path, output_stem: &Path) -> anyhow::Result<PathBuf> {
        Ok(self.convert(input, output_stem).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(ffmpeg_path: &str) -> TranscodeSettings {
        TranscodeSettings {
            ffmpeg_path: ffmpeg_path.to_string(),
            codec: "aac".to_string(),
            bitrate: "192k".to_string(),
            format: "ipod".to_string(),
            extension: "m4a".to_string(),
        }
    }

    #[test]
    fn test_output_path_appends_extension() {
        let transcoder = FfmpegTranscoder::new(settings("ffmpeg"));
        assert_eq!(
            transcoder.output_path(Path::new("/tmp/stage/abc.def")),
            PathBuf::from("/tmp/stage/abc.def.m4a")
        );
    }

    #[test]
    fn test_args_carry_profile() {
        let transcoder = FfmpegTranscoder::new(settings("ffmpeg"));
        let args: Vec<String> = transcoder
            .build_args(Path::new("in.temp"), Path::new("out.m4a"))
            .into_iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();
        let joined = args.join(" ");
        assert!(joined.contains("-i in.temp"));
        assert!(joined.contains("-acodec aac -b:a 192k -f ipod"));
        assert_eq!(args.last().map(String::as_str), Some("out.m4a"));
    }

    #[tokio::test]
    async fn test_missing_binary_is_io_error() {
        let transcoder = FfmpegTranscoder::new(settings("/nonexistent/ffmpeg-binary"));
        let err = transcoder
            .convert(Path::new("in.temp"), Path::new("out"))
            .await
            .unwrap_err();
        assert!(matches!(err, TranscodeError::Io(_)));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_nonzero_exit_is_failure() {
        let dir = tempfile::tempdir().unwrap();
        // `false` ignores its arguments and exits 1
        let transcoder = FfmpegTranscoder::new(settings("false"));
        let err = transcoder
            .convert(&dir.path().join("in.temp"), &dir.path().join("out"))
            .await
            .unwrap_err();
        assert!(matches!(err, TranscodeError::Failed { .. }));
        assert!(!dir.path().join("out.m4a").exists());
    }
}

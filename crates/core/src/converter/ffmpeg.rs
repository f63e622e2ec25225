//! FFmpeg-based converter implementation.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::Instant;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, BufReader};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tokio::sync::mpsc;
use tokio::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, warn, Instrument};

use super::config::ConverterConfig;
use super::error::ConverterError;
use super::progress::ProgressParser;
use super::traits::Converter;
use super::types::{ConversionRequest, ConversionState, ProgressSnapshot};
use crate::metrics;

/// Size of each read from ffmpeg's stdout.
const READ_BUFFER_SIZE: usize = 1024;

/// How the wait on the child process ended.
enum WaitOutcome {
    Exited(std::io::Result<ExitStatus>),
    Cancelled,
    TimedOut(u64),
}

/// FFmpeg-based converter implementation.
///
/// The ffmpeg binary is resolved once in [`FfmpegConverter::new`] and shared by
/// every conversion started through this instance.
#[derive(Debug, Clone)]
pub struct FfmpegConverter {
    ffmpeg_path: PathBuf,
    config: ConverterConfig,
}

impl FfmpegConverter {
    /// Creates a converter, resolving the ffmpeg executable.
    ///
    /// Fails with [`ConverterError::ToolNotFound`] when ffmpeg cannot be located.
    pub fn new(config: ConverterConfig) -> Result<Self, ConverterError> {
        let ffmpeg_path = resolve_ffmpeg(&config)?;
        info!("Using ffmpeg at {:?}", ffmpeg_path);
        Ok(Self {
            ffmpeg_path,
            config,
        })
    }

    /// Creates a converter with default configuration.
    pub fn with_defaults() -> Result<Self, ConverterError> {
        Self::new(ConverterConfig::default())
    }

    /// Resolved path to the ffmpeg binary.
    pub fn ffmpeg_path(&self) -> &Path {
        &self.ffmpeg_path
    }

    pub fn config(&self) -> &ConverterConfig {
        &self.config
    }

    /// Builds ffmpeg arguments for a conversion. The output path is always last.
    ///
    /// Paths are passed through as `OsString`s so non-UTF-8 names reach ffmpeg intact.
    pub fn build_args(&self, request: &ConversionRequest, output_path: &Path) -> Vec<OsString> {
        let mut args: Vec<OsString> = Vec::new();

        if self.config.overwrite {
            args.push("-y".into());
        }

        args.push("-i".into());
        args.push(request.input_path().as_os_str().to_owned());

        // Video codec and quality
        args.extend([
            OsString::from("-c:v"),
            OsString::from(&self.config.video_codec),
            OsString::from("-preset"),
            OsString::from(&self.config.preset),
            OsString::from("-crf"),
            OsString::from(request.quality().to_string()),
        ]);

        // Progress output for parsing
        args.extend([OsString::from("-progress"), OsString::from("pipe:1")]);

        // Container specific codecs
        args.extend(
            request
                .format()
                .codec_overrides()
                .iter()
                .map(OsString::from),
        );

        // Extra args
        args.extend(self.config.extra_ffmpeg_args.iter().map(OsString::from));

        // Output
        args.push(output_path.as_os_str().to_owned());

        args
    }

    /// Runs one conversion from spawn to outcome.
    async fn run_conversion(
        &self,
        request: &ConversionRequest,
        updates: mpsc::Sender<ProgressSnapshot>,
        cancel: &CancellationToken,
    ) -> Result<PathBuf, ConverterError> {
        let output_path = request.output_path();
        let args = self.build_args(request, &output_path);
        debug!(state = ConversionState::Starting.as_str(), ?args, "Starting ffmpeg");

        let mut child = Command::new(&self.ffmpeg_path)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                ConverterError::process_start(
                    format!("could not launch {}", self.ffmpeg_path.display()),
                    Some(e),
                )
            })?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| ConverterError::process_start("stdout was not captured", None))?;

        debug!(
            state = ConversionState::Running.as_str(),
            pid = child.id(),
            "ffmpeg started"
        );

        // Cancelled only when the child is killed, so a clean exit always drains the stream.
        let reader_cancel = CancellationToken::new();
        let reader = tokio::spawn(
            read_progress(stdout, updates, reader_cancel.clone()).in_current_span(),
        );
        let stderr_task = child.stderr.take().map(|stderr| {
            tokio::spawn(collect_stderr_tail(stderr, self.config.stderr_tail_lines))
        });

        let wait = self.wait_for_exit(&mut child, cancel).await;

        if !matches!(wait, WaitOutcome::Exited(_)) {
            if let Err(e) = child.kill().await {
                warn!("Failed to kill ffmpeg: {}", e);
            }
            reader_cancel.cancel();
        }

        // The sink closes when the reader task ends; join it before reporting the outcome.
        let read_result = reader.await;

        let failed_exit = matches!(&wait, WaitOutcome::Exited(Ok(status)) if !status.success());
        let stderr = match stderr_task {
            Some(task) => finish_stderr(task, failed_exit).await,
            None => None,
        };

        match wait {
            WaitOutcome::Cancelled => Err(ConverterError::Cancelled),
            WaitOutcome::TimedOut(timeout_secs) => Err(ConverterError::Timeout { timeout_secs }),
            WaitOutcome::Exited(Err(e)) => Err(ConverterError::conversion_failed(format!(
                "failed to wait for ffmpeg: {}",
                e
            ))),
            WaitOutcome::Exited(Ok(status)) if !status.success() => {
                Err(ConverterError::exited(status.code(), stderr))
            }
            WaitOutcome::Exited(Ok(_)) => match read_result {
                Ok(Ok(count)) => {
                    debug!(snapshots = count, "Progress stream finished");
                    Ok(output_path)
                }
                Ok(Err(e)) => Err(ConverterError::conversion_failed(format!(
                    "progress stream read failed: {}",
                    e
                ))),
                Err(e) => Err(ConverterError::conversion_failed(format!(
                    "progress reader task failed: {}",
                    e
                ))),
            },
        }
    }

    async fn wait_for_exit(&self, child: &mut Child, cancel: &CancellationToken) -> WaitOutcome {
        let timeout_secs = self.config.timeout_secs;
        let deadline = async {
            match timeout_secs {
                Some(secs) => tokio::time::sleep(Duration::from_secs(secs)).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            status = child.wait() => WaitOutcome::Exited(status),
            _ = cancel.cancelled() => WaitOutcome::Cancelled,
            _ = deadline => WaitOutcome::TimedOut(timeout_secs.unwrap_or_default()),
        }
    }
}

#[async_trait]
impl Converter for FfmpegConverter {
    fn name(&self) -> &str {
        "ffmpeg"
    }

    async fn convert_with_cancel(
        &self,
        request: ConversionRequest,
        updates: mpsc::Sender<ProgressSnapshot>,
        cancel: CancellationToken,
    ) -> Result<PathBuf, ConverterError> {
        let conversion_id = uuid::Uuid::new_v4();
        let span = info_span!(
            "conversion",
            id = %conversion_id,
            input = %request.input_path().display(),
            format = %request.format(),
        );

        async move {
            let start = Instant::now();
            metrics::CONVERSIONS_STARTED.inc();
            info!(quality = request.quality(), "Conversion started");

            let result = self.run_conversion(&request, updates, &cancel).await;
            let elapsed = start.elapsed().as_secs_f64();

            let state = ConversionState::from_outcome(&result);
            match &result {
                Ok(output) => {
                    metrics::record_finished("success", elapsed);
                    info!(
                        state = state.as_str(),
                        output = %output.display(),
                        "Conversion finished in {:.1}s",
                        elapsed
                    );
                }
                Err(e) => {
                    metrics::record_finished(e.kind(), elapsed);
                    if matches!(e, ConverterError::Cancelled) {
                        info!(state = state.as_str(), "Conversion cancelled");
                    } else {
                        error!(state = state.as_str(), "Conversion failed: {}", e);
                    }
                }
            }

            result
        }
        .instrument(span)
        .await
    }
}

/// Locates the ffmpeg executable from the explicit path or the `PATH` lookup name.
fn resolve_ffmpeg(config: &ConverterConfig) -> Result<PathBuf, ConverterError> {
    let target: &OsStr = match &config.ffmpeg_path {
        Some(path) => path.as_os_str(),
        None => OsStr::new(&config.ffmpeg_name),
    };

    which::which(target).map_err(|e| {
        ConverterError::tool_not_found(target.to_string_lossy().to_string(), e.to_string())
    })
}

/// Reads ffmpeg's progress stream, forwarding parsed snapshots to `updates` in order.
///
/// `updates` is dropped when this returns, which closes the channel.
async fn read_progress<R>(
    mut stream: R,
    updates: mpsc::Sender<ProgressSnapshot>,
    cancel: CancellationToken,
) -> std::io::Result<u64>
where
    R: AsyncRead + Unpin,
{
    let mut parser = ProgressParser::new();
    let mut buf = vec![0u8; READ_BUFFER_SIZE];
    let mut forwarding = true;
    let mut emitted = 0u64;

    loop {
        let n = tokio::select! {
            _ = cancel.cancelled() => return Ok(emitted),
            read = stream.read(&mut buf) => match read {
                Ok(n) => n,
                Err(e) => {
                    warn!("Progress stream read failed: {}", e);
                    return Err(e);
                }
            },
        };

        if n == 0 {
            break;
        }

        for snapshot in parser.feed(&buf[..n]) {
            emitted += 1;
            if !forward(&updates, snapshot, &mut forwarding, &cancel).await {
                return Ok(emitted);
            }
        }
    }

    if let Some(snapshot) = parser.finish() {
        emitted += 1;
        forward(&updates, snapshot, &mut forwarding, &cancel).await;
    }

    Ok(emitted)
}

/// Sends one snapshot. Returns false if cancellation interrupted the send.
async fn forward(
    updates: &mpsc::Sender<ProgressSnapshot>,
    snapshot: ProgressSnapshot,
    forwarding: &mut bool,
    cancel: &CancellationToken,
) -> bool {
    metrics::PROGRESS_SNAPSHOTS.inc();
    if !*forwarding {
        return true;
    }

    tokio::select! {
        _ = cancel.cancelled() => false,
        sent = updates.send(snapshot) => {
            if sent.is_err() {
                warn!("Progress receiver dropped, continuing without updates");
                *forwarding = false;
            }
            true
        }
    }
}

/// Collects the stderr tail when `keep` is set, otherwise stops the collector.
///
/// Either way the task has ended when this returns.
async fn finish_stderr(task: JoinHandle<Option<String>>, keep: bool) -> Option<String> {
    if keep {
        return task.await.ok().flatten();
    }
    task.abort();
    let _ = task.await;
    None
}

/// Drains stderr, keeping the last `max_lines` lines for error reports.
async fn collect_stderr_tail<R>(stream: R, max_lines: usize) -> Option<String>
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(stream);
    let mut tail = VecDeque::with_capacity(max_lines);
    let mut line = Vec::new();

    loop {
        line.clear();
        match reader.read_until(b'\n', &mut line).await {
            Ok(0) | Err(_) => break,
            Ok(_) => {
                if max_lines == 0 {
                    continue;
                }
                if tail.len() == max_lines {
                    tail.pop_front();
                }
                tail.push_back(String::from_utf8_lossy(&line).trim_end().to_string());
            }
        }
    }

    if tail.is_empty() {
        None
    } else {
        Some(Vec::from(tail).join("\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::converter::OutputFormat;

    fn test_converter(config: ConverterConfig) -> FfmpegConverter {
        FfmpegConverter {
            ffmpeg_path: PathBuf::from("/usr/bin/ffmpeg"),
            config,
        }
    }

    fn args_for(format: OutputFormat, quality: u8) -> Vec<OsString> {
        let converter = test_converter(ConverterConfig::default());
        let request = ConversionRequest::new("clip.h265", format, quality).unwrap();
        converter.build_args(&request, &request.output_path())
    }

    fn contains_sequence(args: &[OsString], seq: &[&str]) -> bool {
        args.windows(seq.len())
            .any(|w| w.iter().zip(seq).all(|(a, b)| a == b))
    }

    #[test]
    fn test_build_args_mp4() {
        let args = args_for(OutputFormat::Mp4, 23);

        assert_eq!(args[0], "-i");
        assert_eq!(args[1], "clip.h265");
        assert!(contains_sequence(
            &args,
            &["-c:v", "libx264", "-preset", "medium", "-crf", "23"]
        ));
        assert!(contains_sequence(&args, &["-progress", "pipe:1"]));
        assert!(contains_sequence(&args, &["-c:a", "aac"]));
        assert_eq!(args.last().unwrap(), "clip.mp4");
        assert!(!args.iter().any(|a| a == "-y"));
    }

    #[test]
    fn test_build_args_avi() {
        let args = args_for(OutputFormat::Avi, 18);
        assert!(contains_sequence(&args, &["-crf", "18"]));
        assert!(contains_sequence(&args, &["-c:a", "mp3"]));
        assert_eq!(args.last().unwrap(), "clip.avi");
    }

    #[test]
    fn test_build_args_mkv() {
        let args = args_for(OutputFormat::Mkv, 30);
        assert!(contains_sequence(&args, &["-c:a", "aac"]));
        assert_eq!(args.last().unwrap(), "clip.mkv");
    }

    #[test]
    fn test_build_args_webm() {
        let args = args_for(OutputFormat::Webm, 35);
        assert!(contains_sequence(
            &args,
            &["-c:v", "libvpx-vp9", "-c:a", "libopus"]
        ));
        // The VP9 override comes after the default codec so it wins.
        let x264 = args.iter().position(|a| a == "libx264").unwrap();
        let vp9 = args.iter().position(|a| a == "libvpx-vp9").unwrap();
        assert!(vp9 > x264);
        assert_eq!(args.last().unwrap(), "clip.webm");
    }

    #[test]
    fn test_build_args_overwrite_and_extras() {
        let mut config = ConverterConfig::default().with_overwrite(true);
        config.extra_ffmpeg_args = vec!["-threads".to_string(), "2".to_string()];
        let converter = test_converter(config);
        let request = ConversionRequest::new("in/clip.h265", OutputFormat::Mp4, 23).unwrap();

        let args = converter.build_args(&request, &request.output_path());
        assert_eq!(args[0], "-y");
        assert!(contains_sequence(&args, &["-threads", "2", "in/clip.mp4"]));
    }

    #[test]
    fn test_resolve_missing_explicit_path() {
        let config = ConverterConfig::with_ffmpeg_path("/nonexistent/dir/ffmpeg");
        let err = FfmpegConverter::new(config).unwrap_err();
        assert!(matches!(err, ConverterError::ToolNotFound { .. }));
    }

    #[test]
    fn test_resolve_missing_name() {
        let config = ConverterConfig {
            ffmpeg_name: "vidconv-no-such-tool-4f1c".to_string(),
            ..Default::default()
        };
        match FfmpegConverter::new(config) {
            Err(ConverterError::ToolNotFound { name, .. }) => {
                assert_eq!(name, "vidconv-no-such-tool-4f1c");
            }
            other => panic!("expected ToolNotFound, got {:?}", other.map(|_| ())),
        }
    }

    #[tokio::test]
    async fn test_read_progress_forwards_in_order_and_closes() {
        let input: &[u8] = b"frame=1\nout_time_ms=100000\nframe=2\nout_time_ms=200000\nframe=3\nout_time_ms=300000";
        let (tx, mut rx) = mpsc::channel(8);

        let count = read_progress(input, tx, CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(count, 3);

        let mut frames = Vec::new();
        while let Some(snapshot) = rx.recv().await {
            frames.push(snapshot.frame);
        }
        assert_eq!(frames, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_read_progress_survives_dropped_receiver() {
        let input: &[u8] = b"out_time_ms=1\nout_time_ms=2\nout_time_ms=3\n";
        let (tx, rx) = mpsc::channel(1);
        drop(rx);

        let count = read_progress(input, tx, CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(count, 3);
    }

    #[tokio::test]
    async fn test_read_progress_stops_on_cancel() {
        let (_writer, reader) = tokio::io::duplex(64);
        let (tx, mut rx) = mpsc::channel(8);
        let cancel = CancellationToken::new();

        let task = tokio::spawn(read_progress(reader, tx, cancel.clone()));
        cancel.cancel();

        let count = task.await.unwrap().unwrap();
        assert_eq!(count, 0);
        assert!(rx.recv().await.is_none());
    }

    /// Yields one chunk, then fails every read.
    struct FailingReader {
        chunk: Option<&'static [u8]>,
    }

    impl AsyncRead for FailingReader {
        fn poll_read(
            mut self: std::pin::Pin<&mut Self>,
            _cx: &mut std::task::Context<'_>,
            buf: &mut tokio::io::ReadBuf<'_>,
        ) -> std::task::Poll<std::io::Result<()>> {
            match self.chunk.take() {
                Some(chunk) => {
                    buf.put_slice(chunk);
                    std::task::Poll::Ready(Ok(()))
                }
                None => std::task::Poll::Ready(Err(std::io::Error::new(
                    std::io::ErrorKind::BrokenPipe,
                    "pipe broke",
                ))),
            }
        }
    }

    #[tokio::test]
    async fn test_read_progress_returns_read_error_after_delivering() {
        let reader = FailingReader {
            chunk: Some(b"frame=7\nout_time_ms=700000\n"),
        };
        let (tx, mut rx) = mpsc::channel(8);

        let result = read_progress(reader, tx, CancellationToken::new()).await;
        let err = result.unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::BrokenPipe);

        let first = rx.recv().await.expect("snapshot before the error is delivered");
        assert_eq!(first.frame, 7);
        assert!((first.progress - 0.7).abs() < f64::EPSILON);
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_finish_stderr_stops_collector_when_not_kept() {
        let (mut writer, reader) = tokio::io::duplex(64);
        let task = tokio::spawn(collect_stderr_tail(reader, 5));

        let tail = tokio::time::timeout(Duration::from_secs(5), finish_stderr(task, false))
            .await
            .expect("collector should stop without EOF");
        assert!(tail.is_none());

        // The collector's end of the pipe is gone.
        use tokio::io::AsyncWriteExt;
        assert!(writer.write_all(b"late\n").await.is_err());
    }

    #[tokio::test]
    async fn test_finish_stderr_returns_tail_when_kept() {
        let input: &[u8] = b"first\nInvalid data\n";
        let task = tokio::spawn(collect_stderr_tail(input, 5));
        assert_eq!(
            finish_stderr(task, true).await.as_deref(),
            Some("first\nInvalid data")
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_build_args_keeps_non_utf8_paths() {
        use std::os::unix::ffi::OsStrExt;

        let converter = test_converter(ConverterConfig::default());
        let input = PathBuf::from(OsStr::from_bytes(b"dir/clip\xff.h265"));
        let request = ConversionRequest::new(&input, OutputFormat::Mkv, 23).unwrap();
        let output = request.output_path();

        let args = converter.build_args(&request, &output);
        assert_eq!(args[1].as_os_str(), input.as_os_str());
        assert_eq!(args.last().unwrap().as_bytes(), b"dir/clip\xff.mkv");
    }

    #[test]
    fn test_accessors() {
        let converter = test_converter(ConverterConfig::default().with_timeout(30));
        assert_eq!(converter.ffmpeg_path(), Path::new("/usr/bin/ffmpeg"));
        assert_eq!(converter.config().timeout_secs, Some(30));
        assert_eq!(converter.name(), "ffmpeg");
    }

    #[tokio::test]
    async fn test_collect_stderr_tail_keeps_last_lines() {
        let input: &[u8] = b"one\ntwo\nthree\nfour\n";
        let tail = collect_stderr_tail(input, 2).await;
        assert_eq!(tail.as_deref(), Some("three\nfour"));

        let empty: &[u8] = b"";
        assert!(collect_stderr_tail(empty, 5).await.is_none());
    }
}

//! Grayscale frame decoding.
//!
//! Detection works on 8-bit luma frames. FFmpeg decodes and downscales the
//! source to raw `gray` pixels on stdout; each frame is exactly
//! `width * height` bytes.

use std::io::{ErrorKind, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdout, Command, Stdio};
use std::sync::Arc;
use std::thread::JoinHandle;

use image::GrayImage;
use tracing::debug;

use crate::command::check_ffmpeg;
use crate::error::{MediaError, MediaResult};
use crate::probe::{probe_video, VideoInfo};

/// A forward-only stream of decoded frames at a fixed rate.
pub trait FrameSource: Send {
    /// Frames per second of the stream.
    fn fps(&self) -> f64;

    /// The next frame, or `None` at end of stream.
    fn next_frame(&mut self) -> MediaResult<Option<GrayImage>>;
}

/// Something that can be scanned repeatedly from the start.
pub trait FrameProvider: Send + Sync {
    fn open(&self) -> MediaResult<Box<dyn FrameSource>>;

    /// Human-readable description for logs.
    fn describe(&self) -> String;
}

/// Frames held in memory.
#[derive(Debug, Clone)]
pub struct InMemoryFrames {
    frames: Arc<Vec<GrayImage>>,
    fps: f64,
}

impl InMemoryFrames {
    pub fn new(frames: Vec<GrayImage>, fps: f64) -> Self {
        Self {
            frames: Arc::new(frames),
            fps,
        }
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Stream duration implied by frame count and rate.
    pub fn duration(&self) -> f64 {
        if self.fps > 0.0 {
            self.frames.len() as f64 / self.fps
        } else {
            0.0
        }
    }
}

struct InMemorySource {
    frames: Arc<Vec<GrayImage>>,
    position: usize,
    fps: f64,
}

impl FrameSource for InMemorySource {
    fn fps(&self) -> f64 {
        self.fps
    }

    fn next_frame(&mut self) -> MediaResult<Option<GrayImage>> {
        let frame = self.frames.get(self.position).cloned();
        self.position += 1;
        Ok(frame)
    }
}

impl FrameProvider for InMemoryFrames {
    fn open(&self) -> MediaResult<Box<dyn FrameSource>> {
        Ok(Box::new(InMemorySource {
            frames: Arc::clone(&self.frames),
            position: 0,
            fps: self.fps,
        }))
    }

    fn describe(&self) -> String {
        format!("{} in-memory frames @ {:.2}fps", self.frames.len(), self.fps)
    }
}

/// A video file decoded through FFmpeg on every `open`.
#[derive(Debug, Clone)]
pub struct FfmpegFrames {
    path: PathBuf,
    info: VideoInfo,
    width: u32,
    height: u32,
}

impl FfmpegFrames {
    /// Probe `path` and decode at `analysis_width` pixels wide (aspect preserved).
    pub async fn probe(path: impl AsRef<Path>, analysis_width: Option<u32>) -> MediaResult<Self> {
        let path = path.as_ref();
        let info = probe_video(path).await?;
        Self::from_info(path, info, analysis_width)
    }

    pub fn from_info(
        path: impl AsRef<Path>,
        info: VideoInfo,
        analysis_width: Option<u32>,
    ) -> MediaResult<Self> {
        if info.width == 0 || info.height == 0 {
            return Err(MediaError::InvalidVideo(format!(
                "{} reports no frame size",
                path.as_ref().display()
            )));
        }
        let (width, height) = scaled_dimensions(info.width, info.height, analysis_width);
        Ok(Self {
            path: path.as_ref().to_path_buf(),
            info,
            width,
            height,
        })
    }

    pub fn info(&self) -> &VideoInfo {
        &self.info
    }

    /// Decoded frame size.
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Decode the whole file once into memory.
    pub fn preload(&self) -> MediaResult<InMemoryFrames> {
        let mut source = self.open()?;
        let mut frames = Vec::new();
        while let Some(frame) = source.next_frame()? {
            frames.push(frame);
        }
        debug!(frames = frames.len(), path = %self.path.display(), "Preloaded frames");
        Ok(InMemoryFrames::new(frames, self.info.fps))
    }

    fn ffmpeg_args(&self) -> Vec<String> {
        let mut args: Vec<String> = ["-nostdin", "-hide_banner", "-v", "error", "-i"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        args.push(self.path.to_string_lossy().to_string());
        args.extend(["-an", "-sn"].iter().map(|s| s.to_string()));
        if (self.width, self.height) != (self.info.width, self.info.height) {
            args.push("-vf".to_string());
            args.push(format!("scale={}:{}", self.width, self.height));
        }
        args.extend(
            ["-f", "rawvideo", "-pix_fmt", "gray", "-"]
                .iter()
                .map(|s| s.to_string()),
        );
        args
    }
}

impl FrameProvider for FfmpegFrames {
    fn open(&self) -> MediaResult<Box<dyn FrameSource>> {
        check_ffmpeg()?;
        let reader = FfmpegFrameReader::spawn(
            &self.ffmpeg_args(),
            self.width,
            self.height,
            self.info.fps,
            self.path.display().to_string(),
        )?;
        Ok(Box::new(reader))
    }

    fn describe(&self) -> String {
        format!(
            "{} ({}x{} @ {:.2}fps)",
            self.path.display(),
            self.width,
            self.height,
            self.info.fps
        )
    }
}

/// Target size for analysis; height is kept even and at least 2.
fn scaled_dimensions(width: u32, height: u32, target_width: Option<u32>) -> (u32, u32) {
    match target_width {
        Some(target) if target > 0 && target < width => {
            let scaled = (height as f64 * target as f64 / width as f64).round() as u32;
            let even = (scaled / 2 * 2).max(2);
            (target, even)
        }
        _ => (width, height),
    }
}

/// Reads raw gray frames from an FFmpeg child process.
struct FfmpegFrameReader {
    child: Child,
    stdout: ChildStdout,
    stderr_drain: Option<JoinHandle<String>>,
    width: u32,
    height: u32,
    fps: f64,
    label: String,
    finished: bool,
}

impl FfmpegFrameReader {
    fn spawn(args: &[String], width: u32, height: u32, fps: f64, label: String) -> MediaResult<Self> {
        debug!("Decoding frames: ffmpeg {}", args.join(" "));
        let mut child = Command::new("ffmpeg")
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| MediaError::internal("FFmpeg stdout was not captured"))?;
        // Drained on a thread so a chatty decoder cannot block on a full pipe.
        let stderr_drain = child.stderr.take().map(|mut stderr| {
            std::thread::spawn(move || {
                let mut buf = String::new();
                let _ = stderr.read_to_string(&mut buf);
                buf
            })
        });

        Ok(Self {
            child,
            stdout,
            stderr_drain,
            width,
            height,
            fps,
            label,
            finished: false,
        })
    }

    fn frame_len(&self) -> usize {
        self.width as usize * self.height as usize
    }

    fn finish(&mut self) -> MediaResult<()> {
        self.finished = true;
        let status = self.child.wait()?;
        let stderr = self
            .stderr_drain
            .take()
            .and_then(|h| h.join().ok())
            .unwrap_or_default();
        if status.success() {
            Ok(())
        } else {
            Err(MediaError::frame_decode(format!(
                "{}: {}",
                self.label,
                stderr.lines().last().unwrap_or("decoder exited with an error")
            )))
        }
    }
}

/// Fill `buf` as far as possible; returns the number of bytes read.
fn read_full(reader: &mut impl Read, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

impl FrameSource for FfmpegFrameReader {
    fn fps(&self) -> f64 {
        self.fps
    }

    fn next_frame(&mut self) -> MediaResult<Option<GrayImage>> {
        if self.finished {
            return Ok(None);
        }

        let mut buf = vec![0u8; self.frame_len()];
        let read = read_full(&mut self.stdout, &mut buf)?;
        if read == 0 {
            self.finish()?;
            return Ok(None);
        }
        if read < buf.len() {
            let _ = self.child.kill();
            self.finish().ok();
            return Err(MediaError::frame_decode(format!(
                "{}: truncated frame ({} of {} bytes)",
                self.label,
                read,
                buf.len()
            )));
        }

        GrayImage::from_raw(self.width, self.height, buf)
            .map(Some)
            .ok_or_else(|| MediaError::frame_decode("frame buffer size mismatch"))
    }
}

impl Drop for FfmpegFrameReader {
    fn drop(&mut self) {
        if !self.finished {
            let _ = self.child.kill();
            let _ = self.child.wait();
        }
    }
}

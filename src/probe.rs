//! ffprobe-backed stream inspection.
//!
//! Shells out to `ffprobe -v error -show_entries stream=... -of json <url>`
//! and maps the JSON output into a [`StreamProbeResult`]. Provider streams
//! routinely hang, die mid-handshake or emit garbage, so the child process
//! runs under a hard timeout and the output is parsed defensively.

use std::io::Read;
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use serde::Deserialize;
use tracing::debug;

/// Technical attributes of a live stream.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StreamProbeResult {
    pub video_codec: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub frame_rate: Option<u32>,
    pub audio_codec: Option<String>,
    pub audio_channels: Option<u32>,
    pub sample_rate: Option<String>,
}

impl StreamProbeResult {
    /// `WIDTHxHEIGHT`, or `?` when either dimension is unknown.
    pub fn resolution(&self) -> String {
        match (self.width, self.height) {
            (Some(w), Some(h)) => format!("{w}x{h}"),
            _ => "?".to_string(),
        }
    }
}

/// Capability to inspect a live stream. Faked in tests.
pub trait StreamProber {
    fn probe(&self, url: &str) -> Result<StreamProbeResult, String>;
}

/// A prober backed by the `ffprobe` CLI.
pub struct FfprobeProber {
    ffprobe_path: PathBuf,
    timeout: Duration,
}

impl FfprobeProber {
    pub fn new(ffprobe_path: PathBuf, timeout: Duration) -> Self {
        Self {
            ffprobe_path,
            timeout,
        }
    }

    // Spawn ffprobe with piped stdout, drain it on a helper thread, and
    // kill the child once the timeout elapses.
    fn run_ffprobe(&self, url: &str) -> Result<String, String> {
        debug!("probing {url}");
        let mut child = Command::new(&self.ffprobe_path)
            .args([
                "-v",
                "error",
                "-show_entries",
                "stream=codec_name,width,height,avg_frame_rate,channels,sample_rate",
                "-of",
                "json",
            ])
            .arg(url)
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| format!("failed to spawn ffprobe: {e}"))?;

        let mut stdout = child
            .stdout
            .take()
            .ok_or_else(|| "ffprobe stdout unavailable".to_string())?;
        let drain = thread::spawn(move || {
            let mut buf = String::new();
            let _ = stdout.read_to_string(&mut buf);
            buf
        });

        let deadline = Instant::now() + self.timeout;
        let status = loop {
            match child.try_wait() {
                Ok(Some(status)) => break status,
                Ok(None) => {
                    if Instant::now() >= deadline {
                        let _ = child.kill();
                        let _ = child.wait();
                        let _ = drain.join();
                        return Err(format!(
                            "ffprobe timed out after {}s",
                            self.timeout.as_secs()
                        ));
                    }
                    thread::sleep(Duration::from_millis(50));
                }
                Err(e) => return Err(format!("ffprobe wait failed: {e}")),
            }
        };

        let output = drain.join().unwrap_or_default();
        if !status.success() {
            return Err(format!("ffprobe exited with {status}"));
        }
        Ok(output)
    }
}

impl StreamProber for FfprobeProber {
    fn probe(&self, url: &str) -> Result<StreamProbeResult, String> {
        let output = self.run_ffprobe(url)?;
        parse_ffprobe_output(&output)
    }
}

/// Verify that ffprobe is installed and runnable, returning its path.
pub fn check_ffprobe() -> Result<PathBuf, String> {
    let path = which::which("ffprobe").map_err(|_| {
        "ffprobe not found in PATH; install ffmpeg before using --check".to_string()
    })?;
    let status = Command::new(&path)
        .arg("-version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map_err(|e| format!("ffprobe failed to run: {e}"))?;
    if !status.success() {
        return Err(format!("ffprobe -version exited with {status}"));
    }
    Ok(path)
}

// JSON structures. ffprobe output is untrusted: everything is optional.

#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    #[serde(default)]
    streams: Vec<FfprobeStream>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    codec_name: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    avg_frame_rate: Option<String>,
    channels: Option<u32>,
    sample_rate: Option<String>,
}

/// First stream is taken as video, second (if any) as audio, matching the
/// `-show_entries` selection order for live transport streams.
fn parse_ffprobe_output(raw: &str) -> Result<StreamProbeResult, String> {
    let output: FfprobeOutput =
        serde_json::from_str(raw).map_err(|e| format!("unparseable ffprobe output: {e}"))?;

    let mut streams = output.streams.into_iter();
    let video = streams.next().ok_or_else(|| "no streams reported".to_string())?;
    let audio = streams.next();

    Ok(StreamProbeResult {
        video_codec: video.codec_name,
        width: video.width,
        height: video.height,
        frame_rate: video.avg_frame_rate.as_deref().and_then(parse_frame_rate),
        audio_codec: audio.as_ref().and_then(|a| a.codec_name.clone()),
        audio_channels: audio.as_ref().and_then(|a| a.channels),
        sample_rate: audio.and_then(|a| a.sample_rate),
    })
}

/// Reduce an ffprobe `num/den` rate to a rounded integer.
fn parse_frame_rate(rate: &str) -> Option<u32> {
    if let Some((num, den)) = rate.split_once('/') {
        let num: f64 = num.trim().parse().ok()?;
        let den: f64 = den.trim().parse().ok()?;
        if den == 0.0 {
            return None;
        }
        return Some((num / den).round() as u32);
    }
    rate.trim().parse::<f64>().ok().map(|r| r.round() as u32)
}

use std::{
    ffi::OsStr,
    io::prelude::*,
    path::{Path, PathBuf},
    process::{Child, Command, ExitStatus, Stdio},
    time::{Duration, Instant},
};

#[cfg(target_family = "windows")]
use std::os::windows::process::CommandExt;

use image::GrayImage;
use wait_timeout::ChildExt;
use FfmpegCommandName::*;
use FfmpegError::*;

use crate::*;

const FFPROBE_TIMEOUT: Duration = Duration::from_secs(60);
const FFMPEG_EXIT_TIMEOUT: Duration = Duration::from_secs(10);

/// Every frame of a video in presentation order, converted to 8-bit luma by ffmpeg.
///
/// Created by [`GrayFrameReader::spawn`]. The ffmpeg child process is killed and reaped
/// when the iterator finishes or is dropped. Once the iterator has returned `None`,
/// [`GrayFrames::exit_error`] tells a clean end of stream from a failed one.
#[derive(Debug)]
pub struct GrayFrames {
    width: u32,
    height: u32,
    child: Child,
    deadline: Option<Instant>,
    frames_read: u32,
    finished: bool,
    exit_error: Option<FfmpegError>,
}

impl GrayFrames {
    fn new(child: Child, width: u32, height: u32, deadline: Option<Instant>) -> Self {
        Self {
            width,
            height,
            child,
            deadline,
            frames_read: 0,
            finished: false,
            exit_error: None,
        }
    }

    /// (width, height) of every frame this iterator yields.
    pub fn resolution(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn frames_read(&self) -> u32 {
        self.frames_read
    }

    /// Why the stream stopped early: ffmpeg exited with an error, the output ended
    /// partway through a frame, or the deadline passed. `None` while frames are still
    /// being read and after a clean end of stream.
    pub fn exit_error(&self) -> Option<&FfmpegError> {
        self.exit_error.as_ref()
    }

    // ffmpeg closed its stdout, so it has exited or is about to.
    fn reap(&mut self, partial_frame: bool) -> Result<(), FfmpegError> {
        let status = wait_with_timeout(&mut self.child, FFMPEG_EXIT_TIMEOUT)?;
        if !status.success() {
            return Err(FfmpegInternal(format!("ffmpeg exited with {status}")));
        }
        if partial_frame {
            return Err(TruncatedFrame(self.frames_read));
        }
        Ok(())
    }

    fn finish(&mut self, outcome: Result<(), FfmpegError>) {
        self.finished = true;
        self.exit_error = outcome.err();
        let _kill_error = self.child.kill();
        let _wait_error = self.child.wait();
    }
}

impl Iterator for GrayFrames {
    type Item = GrayImage;

    fn next(&mut self) -> Option<GrayImage> {
        if self.finished {
            return None;
        }

        let frame_len = usize::try_from(self.width)
            .ok()?
            .checked_mul(usize::try_from(self.height).ok()?)?;
        let mut raw_buf = vec![0u8; frame_len];

        let Some(stdout) = self.child.stdout.as_mut() else {
            self.finish(Err(Io("stdout not captured".to_string())));
            return None;
        };

        let mut buf_head = 0;
        let mut failure = None;
        while buf_head < raw_buf.len() {
            if self.deadline.is_some_and(|deadline| Instant::now() > deadline) {
                failure = Some(TimedOut);
                break;
            }

            match stdout.read(&mut raw_buf[buf_head..]) {
                Ok(0) => break,
                Ok(bytes_read) => buf_head += bytes_read,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => {}
                Err(e) => {
                    failure = Some(Io(format!("{:?}", e.kind())));
                    break;
                }
            }
        }

        if buf_head == raw_buf.len() {
            self.frames_read += 1;
            return GrayImage::from_raw(self.width, self.height, raw_buf);
        }

        // A short read at the end of the stream is a truncated frame and is discarded.
        let outcome = match failure {
            Some(e) => Err(e),
            None => self.reap(buf_head > 0),
        };
        self.finish(outcome);
        None
    }
}

// to prevent accumulation of zombie processes, reap the return code of
// ffmpeg subcommands (if nothing else has done so already) here
impl Drop for GrayFrames {
    fn drop(&mut self) {
        let _kill_error = self.child.kill();
        let _wait_error = self.child.wait();
    }
}

/// Configures and starts an ffmpeg process that decodes every frame of a video to raw
/// grayscale.
#[derive(Clone, Debug)]
pub struct GrayFrameReader {
    src_path: PathBuf,
    multithreaded: bool,
    timeout_secs: Option<u64>,
}

impl GrayFrameReader {
    pub fn new(src_path: impl AsRef<Path>) -> Self {
        Self {
            src_path: src_path.as_ref().to_path_buf(),
            multithreaded: false,
            timeout_secs: None,
        }
    }

    pub fn src_path(&self) -> &Path {
        &self.src_path
    }

    /// Let ffmpeg use as many decoding threads as it likes. Off by default, because callers
    /// usually decode several videos at once.
    pub fn multithreaded(&mut self, val: bool) -> &mut Self {
        self.multithreaded = val;
        self
    }

    /// Stop yielding frames once this much time has passed since [`Self::spawn`].
    pub fn timeout_secs(&mut self, timeout_secs: u64) -> &mut Self {
        self.timeout_secs = Some(timeout_secs);
        self
    }

    pub fn spawn(&self) -> Result<GrayFrames, FfmpegError> {
        //the resolution is needed to split stdout into frames.
        let info = VideoInfo::new(&self.src_path)?;
        let (width, height) = info.resolution();
        if width == 0 || height == 0 {
            return Err(InvalidResolution);
        }

        #[rustfmt::skip]
        let mut args = vec![
            OsStr::new("-hide_banner"),
            OsStr::new("-loglevel"), OsStr::new("warning"),
            OsStr::new("-nostats"),
        ];

        if !self.multithreaded {
            args.extend([OsStr::new("-threads"), OsStr::new("1")]);
        }

        // passthrough: one output frame per decoded frame, no duplication or dropping.
        #[rustfmt::skip]
        args.extend([
            OsStr::new("-i"),        OsStr::new(&self.src_path),
            OsStr::new("-vsync"),    OsStr::new("passthrough"),
            OsStr::new("-pix_fmt"),  OsStr::new("gray"),
            OsStr::new("-c:v"),      OsStr::new("rawvideo"),
            OsStr::new("-f"),        OsStr::new("image2pipe"),
            OsStr::new("-"),
        ]);

        let child = spawn_ffmpeg_command(Ffmpeg, &args, Stdio::null())?;

        let deadline = self
            .timeout_secs
            .map(|secs| Instant::now() + Duration::from_secs(secs));

        Ok(GrayFrames::new(child, width, height, deadline))
    }
}

pub(crate) fn get_video_stats<P: AsRef<Path>>(src_path: P) -> Result<String, FfmpegError> {
    #[rustfmt::skip]
    let args = &[
        OsStr::new("-v"),            OsStr::new("quiet"),
        OsStr::new("-show_format"),
        OsStr::new("-show_streams"),
        OsStr::new("-print_format"), OsStr::new("json"),
        OsStr::new(src_path.as_ref()),
    ];

    let stdout = run_ffmpeg_command(Ffprobe, args)?;

    String::from_utf8(stdout).map_err(|_| Utf8Conversion)
}

pub fn ffmpeg_and_ffprobe_are_callable() -> bool {
    [Ffprobe, Ffmpeg]
        .into_iter()
        .all(|name| run_ffmpeg_command(name, &[OsStr::new("-version")]).is_ok())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FfmpegCommandName {
    Ffprobe,
    Ffmpeg,
}

impl FfmpegCommandName {
    pub fn as_os_str(&self) -> &'static OsStr {
        match self {
            Self::Ffprobe => OsStr::new("ffprobe"),
            Self::Ffmpeg => OsStr::new("ffmpeg"),
        }
    }
}

fn spawn_ffmpeg_command(
    name: FfmpegCommandName,
    args: &[&OsStr],
    stderr_cfg: Stdio,
) -> Result<Child, FfmpegError> {
    let mut command = Command::new(name.as_os_str());
    command
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(stderr_cfg);

    //do not spawn a command window on windows when when in a gui application
    #[cfg(target_family = "windows")]
    command.creation_flags(winapi::um::winbase::CREATE_NO_WINDOW);

    command.spawn().map_err(|e| match e.kind() {
        //by far the most likely cause is that ffmpeg is not installed.
        std::io::ErrorKind::NotFound => FfmpegNotFound,
        _ => Io(format!("{:?}", e.kind())),
    })
}

fn run_ffmpeg_command(name: FfmpegCommandName, args: &[&OsStr]) -> Result<Vec<u8>, FfmpegError> {
    //sometimes ffmpeg creates very long error messages. Limit them to the first 500 characters
    fn truncate_ffmpeg_err_msg(stderr: &[u8]) -> FfmpegError {
        match std::str::from_utf8(stderr) {
            Ok(error_text) => FfmpegInternal(error_text.chars().take(500).collect::<String>()),
            Err(_) => Utf8Conversion,
        }
    }

    let mut child = spawn_ffmpeg_command(name, args, Stdio::piped())?;

    let mut stdout = child
        .stdout
        .take()
        .ok_or_else(|| Io("stdout not captured".to_string()))?;
    let mut stderr = child
        .stderr
        .take()
        .ok_or_else(|| Io("stderr not captured".to_string()))?;

    // stderr is drained on its own thread so that a full stderr pipe cannot stall the
    // child while stdout is being read.
    let stderr_thread = std::thread::spawn(move || {
        let mut stderr_acc = vec![];
        let _read_error = stderr.read_to_end(&mut stderr_acc);
        stderr_acc
    });

    let mut stdout_acc = vec![];
    if let Err(e) = stdout.read_to_end(&mut stdout_acc) {
        let _kill_error = child.kill();
        let _wait_error = child.wait();
        return Err(Io(format!("{:?}", e.kind())));
    }

    let exit_status = wait_with_timeout(&mut child, FFPROBE_TIMEOUT);
    let stderr_acc = stderr_thread.join().unwrap_or_default();

    match exit_status {
        Err(e) => Err(e),
        Ok(status) if status.success() => Ok(stdout_acc),
        //The shell successfully executed it, but it returned an error code
        Ok(_) => Err(truncate_ffmpeg_err_msg(&stderr_acc)),
    }
}

fn wait_with_timeout(child: &mut Child, timeout: Duration) -> Result<ExitStatus, FfmpegError> {
    match child.wait_timeout(timeout) {
        Ok(Some(status)) => Ok(status),
        Ok(None) => {
            let _kill_error = child.kill();
            let _wait_error = child.wait();
            Err(Io(format!("{:?}", std::io::ErrorKind::TimedOut)))
        }
        Err(e) => Err(Io(format!("{:?}", e.kind()))),
    }
}

// sequence.rs: 把一个目录下的图片序列当作视频源解码（后台线程）

use sphere_view::error::ViewerError;
use sphere_view::media::{PlaybackControl, VideoEvent};

use std::io;
use std::path::{Path, PathBuf};
use std::sync::mpsc::Sender;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

const FRAME_EXTENSIONS: [&str; 4] = ["jpg", "jpeg", "png", "bmp"];

/// 暂停时的轮询间隔
const PAUSE_POLL: Duration = Duration::from_millis(10);

pub fn list_frames(dir: &Path) -> Result<Vec<PathBuf>, ViewerError> {
    let mut frames: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| {
            p.extension()
                .and_then(|e| e.to_str())
                .map(|e| FRAME_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
                .unwrap_or(false)
        })
        .collect();
    frames.sort();

    if frames.is_empty() {
        return Err(ViewerError::Io(io::Error::new(
            io::ErrorKind::NotFound,
            format!("no image frames in {}", dir.display()),
        )));
    }
    Ok(frames)
}

/// Start decoding `dir` at `fps`. The thread exits when `control` is stopped or
/// the receiving side goes away.
pub fn spawn(
    dir: &Path,
    fps: f64,
    tx: Sender<VideoEvent>,
    control: Arc<PlaybackControl>,
) -> Result<(), ViewerError> {
    let frames = list_frames(dir)?;
    let fps = if fps.is_finite() && fps > 0.0 { fps } else { 30.0 };
    log::info!("frame sequence {}: {} frames @ {} fps", dir.display(), frames.len(), fps);

    thread::Builder::new()
        .name("frame-sequence".into())
        .spawn(move || run_sequence(frames, fps, tx, control))?;
    Ok(())
}

fn run_sequence(frames: Vec<PathBuf>, fps: f64, tx: Sender<VideoEvent>, control: Arc<PlaybackControl>) {
    let interval = Duration::from_secs_f64(1.0 / fps);
    let duration_s = frames.len() as f64 / fps;
    if tx.send(VideoEvent::Metadata { duration_s }).is_err() {
        return;
    }

    let mut index = 0;
    let mut announced = false;
    loop {
        if control.is_stopped() {
            return;
        }
        // 首帧先解码作为封面，之后等待播放
        if announced && !control.is_playing() {
            thread::sleep(PAUSE_POLL);
            continue;
        }

        let started = Instant::now();
        match image::open(&frames[index]) {
            Ok(img) => {
                if tx.send(VideoEvent::Frame(img.to_rgba8())).is_err() {
                    return;
                }
            }
            Err(e) => log::warn!("skipping frame {}: {}", frames[index].display(), e),
        }

        if !announced {
            // 本地文件整段可用
            let _ = tx.send(VideoEvent::Progress {
                buffered_end_s: duration_s,
            });
            if tx.send(VideoEvent::CanPlayThrough).is_err() {
                return;
            }
            announced = true;
        }

        index += 1;
        if index == frames.len() {
            if control.is_looping() {
                index = 0;
            } else {
                let _ = tx.send(VideoEvent::Ended);
                return;
            }
        }

        thread::sleep(interval.saturating_sub(started.elapsed()));
    }
}

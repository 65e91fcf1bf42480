// media.rs: 照片 / 视频纹理源

use crate::viewport::CanvasRect;
use image::{GenericImage, Rgba, RgbaImage};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{Receiver, TryRecvError};
use std::sync::Arc;

/// Thin interface to whatever feeds the sphere texture.
pub trait MediaTextureAdapter {
    fn is_video(&self) -> bool;
    /// Request a texture upload of the current frame on the next render.
    fn mark_dirty(&mut self);
    fn is_video_buffered_enough(&self) -> bool;
    fn current_size_in_bounding_box(&self) -> CanvasRect;
    fn set_bounding_box(&mut self, rect: CanvasRect);
    /// Pixels to upload, if an upload is pending.
    fn take_texture_update(&mut self) -> Option<RgbaImage>;
    /// 从解码端拉取新消息，每帧开始时调用
    fn poll(&mut self) {}
    /// 销毁时释放资源（停止视频等）
    fn release(&mut self) {}
}

// ---------------------------------------------------------------------------
// Photo

#[derive(Debug, Default)]
pub struct PhotoSource {
    pending: Option<RgbaImage>,
    canvas: CanvasRect,
}

impl PhotoSource {
    /// 尚未加载图片，渲染器显示占位纹理
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn new(image: RgbaImage) -> Self {
        Self {
            pending: Some(image),
            canvas: CanvasRect::default(),
        }
    }

    pub fn load_photo(&mut self, image: RgbaImage) {
        self.pending = Some(image);
    }
}

impl MediaTextureAdapter for PhotoSource {
    fn is_video(&self) -> bool {
        false
    }

    // 照片像素不会变化，加载后只上传一次
    fn mark_dirty(&mut self) {}

    fn is_video_buffered_enough(&self) -> bool {
        false
    }

    fn current_size_in_bounding_box(&self) -> CanvasRect {
        self.canvas
    }

    fn set_bounding_box(&mut self, rect: CanvasRect) {
        self.canvas = rect;
    }

    fn take_texture_update(&mut self) -> Option<RgbaImage> {
        self.pending.take()
    }
}

// ---------------------------------------------------------------------------
// Video

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ReadyState {
    HaveNothing,
    HaveMetadata,
    HaveCurrentData,
    HaveFutureData,
    HaveEnoughData,
}

/// Messages from a decoder thread to the video surface.
#[derive(Debug)]
pub enum VideoEvent {
    Metadata { duration_s: f64 },
    Progress { buffered_end_s: f64 },
    ByteProgress { buffered_bytes: u64, total_bytes: u64 },
    Frame(RgbaImage),
    CanPlayThrough,
    Ended,
}

/// 主线程与解码线程共享的播放控制
#[derive(Debug, Default)]
pub struct PlaybackControl {
    playing: AtomicBool,
    looping: AtomicBool,
    stopped: AtomicBool,
}

impl PlaybackControl {
    pub fn is_playing(&self) -> bool {
        self.playing.load(Ordering::Acquire)
    }

    pub fn is_looping(&self) -> bool {
        self.looping.load(Ordering::Acquire)
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }

    fn set_playing(&self, v: bool) {
        self.playing.store(v, Ordering::Release);
    }

    fn set_looping(&self, v: bool) {
        self.looping.store(v, Ordering::Release);
    }

    fn stop(&self) {
        self.playing.store(false, Ordering::Release);
        self.stopped.store(true, Ordering::Release);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VideoOptions {
    pub muted: bool,
    pub looping: bool,
    pub autoplay: bool,
}

impl Default for VideoOptions {
    fn default() -> Self {
        Self {
            muted: true,
            looping: true,
            autoplay: true,
        }
    }
}

pub struct VideoSource {
    src: Option<String>,
    events: Option<Receiver<VideoEvent>>,
    control: Arc<PlaybackControl>,
    options: VideoOptions,
    ready_state: ReadyState,
    duration_s: Option<f64>,
    buffered_end_s: Option<f64>,
    byte_progress: Option<(u64, u64)>,
    latest: Option<RgbaImage>,
    dirty: bool,
    canvas: CanvasRect,
}

impl VideoSource {
    pub fn new(options: VideoOptions) -> Self {
        let control = Arc::new(PlaybackControl::default());
        control.set_looping(options.looping);
        Self {
            src: None,
            events: None,
            control,
            options,
            ready_state: ReadyState::HaveNothing,
            duration_s: None,
            buffered_end_s: None,
            byte_progress: None,
            latest: None,
            dirty: false,
            canvas: CanvasRect::default(),
        }
    }

    /// Attach a decoder feed. Returns the control handle the decoder must honour.
    pub fn load(&mut self, src: impl Into<String>, events: Receiver<VideoEvent>) -> Arc<PlaybackControl> {
        self.unload();
        let control = Arc::new(PlaybackControl::default());
        control.set_looping(self.options.looping);
        self.control = control.clone();
        self.src = Some(src.into());
        self.events = Some(events);
        log::info!("video source loading {:?}", self.src);
        control
    }

    /// 暂停并清空源
    pub fn unload(&mut self) {
        self.pause();
        self.control.stop();
        self.src = None;
        self.events = None;
        self.ready_state = ReadyState::HaveNothing;
        self.duration_s = None;
        self.buffered_end_s = None;
        self.byte_progress = None;
        self.latest = None;
        self.dirty = false;
    }

    pub fn src(&self) -> Option<&str> {
        self.src.as_deref()
    }

    pub fn play(&mut self) {
        if self.src.is_some() {
            self.control.set_playing(true);
        }
    }

    pub fn pause(&mut self) {
        self.control.set_playing(false);
    }

    pub fn is_playing(&self) -> bool {
        self.control.is_playing()
    }

    pub fn set_muted(&mut self, muted: bool) {
        self.options.muted = muted;
    }

    pub fn is_muted(&self) -> bool {
        self.options.muted
    }

    pub fn set_looping(&mut self, looping: bool) {
        self.options.looping = looping;
        self.control.set_looping(looping);
    }

    pub fn ready_state(&self) -> ReadyState {
        self.ready_state
    }

    /// 缓冲进度 [0, 1]：优先按时间，其次按字节
    pub fn buffered_fraction(&self) -> Option<f64> {
        if let (Some(end), Some(duration)) = (self.buffered_end_s, self.duration_s) {
            if duration > 0.0 {
                return Some((end / duration).clamp(0.0, 1.0));
            }
        }
        match self.byte_progress {
            Some((buffered, total)) if total > 0 => Some((buffered as f64 / total as f64).min(1.0)),
            _ => None,
        }
    }

    pub fn on_can_play_through(&mut self) {
        self.ready_state = ReadyState::HaveEnoughData;
        if self.options.autoplay {
            self.play();
        }
    }

    fn handle_event(&mut self, event: VideoEvent) {
        match event {
            VideoEvent::Metadata { duration_s } => {
                self.duration_s = Some(duration_s);
                self.ready_state = self.ready_state.max(ReadyState::HaveMetadata);
            }
            VideoEvent::Progress { buffered_end_s } => {
                self.buffered_end_s = Some(buffered_end_s);
            }
            VideoEvent::ByteProgress {
                buffered_bytes,
                total_bytes,
            } => {
                self.byte_progress = Some((buffered_bytes, total_bytes));
            }
            VideoEvent::Frame(frame) => {
                self.latest = Some(frame);
                self.ready_state = self.ready_state.max(ReadyState::HaveCurrentData);
            }
            VideoEvent::CanPlayThrough => self.on_can_play_through(),
            VideoEvent::Ended => {
                if !self.options.looping {
                    self.pause();
                }
            }
        }
    }
}

impl MediaTextureAdapter for VideoSource {
    fn is_video(&self) -> bool {
        true
    }

    fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    fn is_video_buffered_enough(&self) -> bool {
        self.ready_state == ReadyState::HaveEnoughData
    }

    fn current_size_in_bounding_box(&self) -> CanvasRect {
        self.canvas
    }

    fn set_bounding_box(&mut self, rect: CanvasRect) {
        self.canvas = rect;
    }

    fn take_texture_update(&mut self) -> Option<RgbaImage> {
        if !self.dirty {
            return None;
        }
        self.dirty = false;
        self.latest.take()
    }

    fn poll(&mut self) {
        loop {
            let Some(rx) = self.events.as_ref() else {
                return;
            };
            match rx.try_recv() {
                Ok(event) => self.handle_event(event),
                Err(TryRecvError::Empty) => return,
                Err(TryRecvError::Disconnected) => {
                    log::debug!("video decoder for {:?} disconnected", self.src);
                    self.events = None;
                    return;
                }
            }
        }
    }

    fn release(&mut self) {
        self.unload();
    }
}

// ---------------------------------------------------------------------------

/// 宿主持有的单一媒体源：照片或视频，可在运行时互相替换
pub enum PanoramaSource {
    Photo(PhotoSource),
    Video(VideoSource),
}

impl PanoramaSource {
    pub fn load_photo(&mut self, image: RgbaImage) {
        match self {
            PanoramaSource::Photo(photo) => photo.load_photo(image),
            PanoramaSource::Video(video) => {
                let canvas = video.current_size_in_bounding_box();
                video.release();
                let mut photo = PhotoSource::new(image);
                photo.set_bounding_box(canvas);
                *self = PanoramaSource::Photo(photo);
            }
        }
    }

    pub fn as_video(&self) -> Option<&VideoSource> {
        match self {
            PanoramaSource::Video(v) => Some(v),
            PanoramaSource::Photo(_) => None,
        }
    }

    pub fn as_video_mut(&mut self) -> Option<&mut VideoSource> {
        match self {
            PanoramaSource::Video(v) => Some(v),
            PanoramaSource::Photo(_) => None,
        }
    }

    fn inner(&self) -> &dyn MediaTextureAdapter {
        match self {
            PanoramaSource::Photo(p) => p,
            PanoramaSource::Video(v) => v,
        }
    }

    fn inner_mut(&mut self) -> &mut dyn MediaTextureAdapter {
        match self {
            PanoramaSource::Photo(p) => p,
            PanoramaSource::Video(v) => v,
        }
    }
}

impl MediaTextureAdapter for PanoramaSource {
    fn is_video(&self) -> bool {
        self.inner().is_video()
    }

    fn mark_dirty(&mut self) {
        self.inner_mut().mark_dirty()
    }

    fn is_video_buffered_enough(&self) -> bool {
        self.inner().is_video_buffered_enough()
    }

    fn current_size_in_bounding_box(&self) -> CanvasRect {
        self.inner().current_size_in_bounding_box()
    }

    fn set_bounding_box(&mut self, rect: CanvasRect) {
        self.inner_mut().set_bounding_box(rect)
    }

    fn take_texture_update(&mut self) -> Option<RgbaImage> {
        self.inner_mut().take_texture_update()
    }

    fn poll(&mut self) {
        self.inner_mut().poll()
    }

    fn release(&mut self) {
        self.inner_mut().release()
    }
}

/// Fit a frame into a GPU-uploadable equirectangular texture.
///
/// Frames larger than `max_dimension` are scaled down. Frames shorter than
/// 2:1 are padded with black at the top so the image sits at the bottom.
pub fn prepare_equirect(img: RgbaImage, max_dimension: u32) -> RgbaImage {
    let (src_w, src_h) = img.dimensions();

    let img = if src_w > max_dimension || src_h > max_dimension {
        let scale = (max_dimension as f32 / src_w.max(src_h) as f32).min(1.0);
        let new_w = ((src_w as f32 * scale) as u32).max(1);
        let new_h = ((src_h as f32 * scale) as u32).max(1);
        log::warn!(
            "panorama {}x{} exceeds GPU limit {}, scaled to {}x{}",
            src_w,
            src_h,
            max_dimension,
            new_w,
            new_h
        );
        image::imageops::resize(&img, new_w, new_h, image::imageops::FilterType::Lanczos3)
    } else {
        img
    };

    let (src_w, src_h) = img.dimensions();
    let target_h = src_w / 2;
    if target_h > 0 && src_h < target_h {
        let mut canvas = RgbaImage::from_pixel(src_w, target_h, Rgba([0, 0, 0, 255]));
        // y_offset 保证不越界
        let _ = canvas.copy_from(&img, 0, target_h - src_h);
        canvas
    } else {
        img
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc::channel;

    fn frame(v: u8) -> RgbaImage {
        RgbaImage::from_pixel(4, 2, Rgba([v, v, v, 255]))
    }

    #[test]
    fn photo_uploads_once() {
        let mut p = PhotoSource::new(frame(1));
        p.mark_dirty();
        assert!(p.take_texture_update().is_some());
        p.mark_dirty();
        assert!(p.take_texture_update().is_none());
        assert!(!p.is_video_buffered_enough());
    }

    #[test]
    fn video_becomes_ready_and_autoplays() {
        let (tx, rx) = channel();
        let mut v = VideoSource::new(VideoOptions::default());
        let control = v.load("clip", rx);
        tx.send(VideoEvent::Metadata { duration_s: 2.0 }).unwrap();
        tx.send(VideoEvent::Frame(frame(9))).unwrap();
        v.poll();
        assert_eq!(v.ready_state(), ReadyState::HaveCurrentData);
        assert!(!v.is_video_buffered_enough());

        tx.send(VideoEvent::CanPlayThrough).unwrap();
        v.poll();
        assert!(v.is_video_buffered_enough());
        assert!(control.is_playing());
    }

    #[test]
    fn video_without_autoplay_waits_for_play() {
        let (tx, rx) = channel();
        let mut v = VideoSource::new(VideoOptions {
            autoplay: false,
            ..Default::default()
        });
        let control = v.load("clip", rx);
        tx.send(VideoEvent::CanPlayThrough).unwrap();
        v.poll();
        assert!(!control.is_playing());
        v.play();
        assert!(control.is_playing());
        v.pause();
        assert!(!v.is_playing());
    }

    #[test]
    fn video_frame_only_taken_when_dirty() {
        let (tx, rx) = channel();
        let mut v = VideoSource::new(VideoOptions::default());
        v.load("clip", rx);
        tx.send(VideoEvent::Frame(frame(1))).unwrap();
        tx.send(VideoEvent::Frame(frame(2))).unwrap();
        v.poll();

        assert!(v.take_texture_update().is_none());
        v.mark_dirty();
        let latest = v.take_texture_update().unwrap();
        assert_eq!(latest.get_pixel(0, 0), &Rgba([2, 2, 2, 255]));
        assert!(v.take_texture_update().is_none());
    }

    #[test]
    fn buffered_fraction_prefers_time_then_bytes() {
        let (tx, rx) = channel();
        let mut v = VideoSource::new(VideoOptions::default());
        v.load("clip", rx);
        assert_eq!(v.buffered_fraction(), None);

        tx.send(VideoEvent::ByteProgress {
            buffered_bytes: 25,
            total_bytes: 100,
        })
        .unwrap();
        v.poll();
        assert_eq!(v.buffered_fraction(), Some(0.25));

        tx.send(VideoEvent::Metadata { duration_s: 4.0 }).unwrap();
        tx.send(VideoEvent::Progress { buffered_end_s: 2.0 }).unwrap();
        v.poll();
        assert_eq!(v.buffered_fraction(), Some(0.5));
    }

    #[test]
    fn unload_stops_decoder_and_clears_state() {
        let (tx, rx) = channel();
        let mut v = VideoSource::new(VideoOptions::default());
        let control = v.load("clip", rx);
        tx.send(VideoEvent::CanPlayThrough).unwrap();
        v.poll();
        v.unload();
        assert!(control.is_stopped());
        assert!(!control.is_playing());
        assert_eq!(v.src(), None);
        assert_eq!(v.ready_state(), ReadyState::HaveNothing);
    }

    #[test]
    fn ended_pauses_unless_looping() {
        let (tx, rx) = channel();
        let mut v = VideoSource::new(VideoOptions {
            looping: false,
            ..Default::default()
        });
        let control = v.load("clip", rx);
        tx.send(VideoEvent::CanPlayThrough).unwrap();
        tx.send(VideoEvent::Ended).unwrap();
        v.poll();
        assert!(!control.is_playing());
    }

    #[test]
    fn loading_photo_replaces_video() {
        let (_tx, rx) = channel();
        let mut video = VideoSource::new(VideoOptions::default());
        let control = video.load("clip", rx);
        let mut source = PanoramaSource::Video(video);
        source.set_bounding_box(CanvasRect {
            left: 0.0,
            top: 0.0,
            width: 10.0,
            height: 5.0,
        });

        source.load_photo(frame(3));
        assert!(!source.is_video());
        assert!(control.is_stopped());
        assert_eq!(source.current_size_in_bounding_box().width, 10.0);
        assert!(source.take_texture_update().is_some());
    }

    #[test]
    fn short_frames_are_padded_to_two_to_one() {
        let img = RgbaImage::from_pixel(8, 2, Rgba([200, 0, 0, 255]));
        let out = prepare_equirect(img, 4096);
        assert_eq!(out.dimensions(), (8, 4));
        assert_eq!(out.get_pixel(0, 0), &Rgba([0, 0, 0, 255]));
        assert_eq!(out.get_pixel(0, 3), &Rgba([200, 0, 0, 255]));
    }

    #[test]
    fn oversized_frames_are_scaled_down() {
        let img = RgbaImage::from_pixel(64, 32, Rgba([1, 2, 3, 255]));
        let out = prepare_equirect(img, 16);
        assert_eq!(out.dimensions(), (16, 8));
    }
}

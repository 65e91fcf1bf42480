// render_loop.rs: 每帧循环：视频纹理节流刷新 -> 投影 -> 绘制 -> 预约下一帧

use crate::media::MediaTextureAdapter;
use crate::orientation::OrientationState;
use crate::projection::{camera_pose, CameraPose, ProjectionMode};
use crate::scene::SceneRenderer;
use std::time::{Duration, Instant};

/// 视频纹理上传的最小间隔，与显示帧率无关
pub const TEXTURE_REFRESH_INTERVAL: Duration = Duration::from_millis(30);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameHandle(pub u64);

/// Host mechanism that fires the next frame callback.
pub trait FrameScheduler {
    fn request_frame(&mut self) -> FrameHandle;
    fn cancel_frame(&mut self, handle: FrameHandle);
}

/// Scheduler that only records the latest request; the host polls `take_request`
/// and turns it into a redraw.
#[derive(Debug, Default)]
pub struct PendingFrameScheduler {
    next_id: u64,
    pending: Option<FrameHandle>,
}

impl PendingFrameScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pending(&self) -> Option<FrameHandle> {
        self.pending
    }

    /// Consume the outstanding request, if any.
    pub fn take_request(&mut self) -> Option<FrameHandle> {
        self.pending.take()
    }
}

impl FrameScheduler for PendingFrameScheduler {
    fn request_frame(&mut self) -> FrameHandle {
        let handle = FrameHandle(self.next_id);
        self.next_id = self.next_id.wrapping_add(1);
        self.pending = Some(handle);
        handle
    }

    fn cancel_frame(&mut self, handle: FrameHandle) {
        if self.pending == Some(handle) {
            self.pending = None;
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TickOutcome {
    Rendered {
        texture_refreshed: bool,
        pose: CameraPose,
    },
    /// 已 teardown，不再绘制也不再预约
    Stopped,
}

#[derive(Debug)]
pub struct RenderLoop {
    last_texture_refresh: Instant,
    refresh_interval: Duration,
    pending: Option<FrameHandle>,
    cancelled: bool,
}

impl RenderLoop {
    pub fn new(now: Instant) -> Self {
        Self::with_refresh_interval(now, TEXTURE_REFRESH_INTERVAL)
    }

    pub fn with_refresh_interval(now: Instant, refresh_interval: Duration) -> Self {
        Self {
            last_texture_refresh: now,
            refresh_interval,
            pending: None,
            cancelled: false,
        }
    }

    pub fn is_running(&self) -> bool {
        !self.cancelled
    }

    pub fn pending_frame(&self) -> Option<FrameHandle> {
        self.pending
    }

    pub fn start<S: FrameScheduler>(&mut self, scheduler: &mut S) {
        if self.cancelled || self.pending.is_some() {
            return;
        }
        self.pending = Some(scheduler.request_frame());
    }

    /// Marks the video texture dirty when the source is buffered and the
    /// refresh interval has elapsed.
    pub fn refresh_texture_if_due<M: MediaTextureAdapter>(&mut self, now: Instant, media: &mut M) -> bool {
        if !media.is_video() || !media.is_video_buffered_enough() {
            return false;
        }
        if now.saturating_duration_since(self.last_texture_refresh) < self.refresh_interval {
            return false;
        }
        media.mark_dirty();
        self.last_texture_refresh = now;
        true
    }

    /// One frame. The next frame is scheduled even when drawing fails, so a
    /// transient surface error does not stop the loop.
    pub fn tick<R, M, S>(
        &mut self,
        now: Instant,
        orientation: &mut OrientationState,
        mode: ProjectionMode,
        media: &mut M,
        renderer: &mut R,
        scheduler: &mut S,
    ) -> Result<TickOutcome, R::Error>
    where
        R: SceneRenderer,
        M: MediaTextureAdapter,
        S: FrameScheduler,
    {
        if self.cancelled {
            return Ok(TickOutcome::Stopped);
        }
        self.pending = None;

        let texture_refreshed = self.refresh_texture_if_due(now, media);
        let drawn = render_view(orientation, mode, media, renderer);
        self.pending = Some(scheduler.request_frame());

        drawn.map(|pose| TickOutcome::Rendered {
            texture_refreshed,
            pose,
        })
    }

    /// Cancel the pending frame. Safe to call repeatedly; returns `true` only
    /// the first time.
    pub fn cancel<S: FrameScheduler>(&mut self, scheduler: &mut S) -> bool {
        if self.cancelled {
            return false;
        }
        self.cancelled = true;
        if let Some(handle) = self.pending.take() {
            scheduler.cancel_frame(handle);
        }
        true
    }
}

/// 投影并交给渲染器绘制
pub fn render_view<R, M>(
    orientation: &mut OrientationState,
    mode: ProjectionMode,
    media: &mut M,
    renderer: &mut R,
) -> Result<CameraPose, R::Error>
where
    R: SceneRenderer,
    M: MediaTextureAdapter,
{
    let pose = camera_pose(orientation, mode);
    if let Some(frame) = media.take_texture_update() {
        log::trace!("uploading texture {}x{}", frame.width(), frame.height());
        renderer.upload_texture(frame);
    }
    renderer.set_camera_position(pose.position);
    renderer.set_camera_look_at(pose.target);
    renderer.draw_frame()?;
    Ok(pose)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::viewport::CanvasRect;
    use glam::Vec3;
    use image::RgbaImage;
    use std::convert::Infallible;

    #[derive(Default)]
    struct CountingRenderer {
        draws: usize,
        uploads: usize,
        position: Vec3,
        target: Vec3,
    }

    impl SceneRenderer for CountingRenderer {
        type Error = Infallible;

        fn set_size(&mut self, _width: u32, _height: u32) {}
        fn set_camera_aspect(&mut self, _aspect: f32) {}
        fn set_camera_fov(&mut self, _fov_deg: f32) {}
        fn recompute_projection(&mut self) {}
        fn set_camera_position(&mut self, position: Vec3) {
            self.position = position;
        }
        fn set_camera_look_at(&mut self, target: Vec3) {
            self.target = target;
        }
        fn upload_texture(&mut self, _frame: RgbaImage) {
            self.uploads += 1;
        }
        fn draw_frame(&mut self) -> Result<(), Infallible> {
            self.draws += 1;
            Ok(())
        }
    }

    struct BufferedVideo {
        ready: bool,
        dirty_marks: usize,
        dirty: bool,
    }

    impl MediaTextureAdapter for BufferedVideo {
        fn is_video(&self) -> bool {
            true
        }
        fn mark_dirty(&mut self) {
            self.dirty_marks += 1;
            self.dirty = true;
        }
        fn is_video_buffered_enough(&self) -> bool {
            self.ready
        }
        fn current_size_in_bounding_box(&self) -> CanvasRect {
            CanvasRect::default()
        }
        fn set_bounding_box(&mut self, _rect: CanvasRect) {}
        fn take_texture_update(&mut self) -> Option<RgbaImage> {
            std::mem::take(&mut self.dirty).then(|| RgbaImage::new(2, 1))
        }
    }

    fn video(ready: bool) -> BufferedVideo {
        BufferedVideo {
            ready,
            dirty_marks: 0,
            dirty: false,
        }
    }

    fn orientation() -> OrientationState {
        OrientationState::new(0.0, 0.0, 35.0, 3.0, 100.0)
    }

    #[test]
    fn refresh_is_throttled_to_interval() {
        let t0 = Instant::now();
        let mut rl = RenderLoop::new(t0);
        let mut media = video(true);

        let a = rl.refresh_texture_if_due(t0 + Duration::from_millis(40), &mut media);
        let b = rl.refresh_texture_if_due(t0 + Duration::from_millis(50), &mut media);
        assert!(a);
        assert!(!b);

        let c = rl.refresh_texture_if_due(t0 + Duration::from_millis(90), &mut media);
        assert!(c);
        assert_eq!(media.dirty_marks, 2);
    }

    #[test]
    fn ticks_40ms_apart_both_refresh() {
        let t0 = Instant::now();
        let mut rl = RenderLoop::new(t0);
        let (mut o, mut media, mut r, mut s) = (
            orientation(),
            video(true),
            CountingRenderer::default(),
            PendingFrameScheduler::new(),
        );

        for ms in [40, 80] {
            let out = rl
                .tick(t0 + Duration::from_millis(ms), &mut o, ProjectionMode::Spherical, &mut media, &mut r, &mut s)
                .unwrap();
            assert!(matches!(out, TickOutcome::Rendered { texture_refreshed: true, .. }));
        }
        assert_eq!(r.uploads, 2);
        assert_eq!(r.draws, 2);
    }

    #[test]
    fn unbuffered_video_is_not_refreshed_but_still_drawn() {
        let t0 = Instant::now();
        let mut rl = RenderLoop::new(t0);
        let (mut o, mut media, mut r, mut s) = (
            orientation(),
            video(false),
            CountingRenderer::default(),
            PendingFrameScheduler::new(),
        );
        rl.tick(t0 + Duration::from_secs(1), &mut o, ProjectionMode::Flat, &mut media, &mut r, &mut s)
            .unwrap();
        assert_eq!(media.dirty_marks, 0);
        assert_eq!(r.draws, 1);
        assert_eq!(r.position, Vec3::ZERO);
    }

    #[test]
    fn tick_reschedules_itself() {
        let t0 = Instant::now();
        let mut rl = RenderLoop::new(t0);
        let (mut o, mut media, mut r, mut s) = (
            orientation(),
            video(false),
            CountingRenderer::default(),
            PendingFrameScheduler::new(),
        );
        rl.start(&mut s);
        let first = s.take_request().unwrap();

        rl.tick(t0, &mut o, ProjectionMode::Spherical, &mut media, &mut r, &mut s)
            .unwrap();
        let second = s.pending().unwrap();
        assert_ne!(first, second);
        assert_eq!(rl.pending_frame(), Some(second));
    }

    #[test]
    fn cancel_is_idempotent_and_stops_ticks() {
        let t0 = Instant::now();
        let mut rl = RenderLoop::new(t0);
        let (mut o, mut media, mut r, mut s) = (
            orientation(),
            video(true),
            CountingRenderer::default(),
            PendingFrameScheduler::new(),
        );
        rl.start(&mut s);

        assert!(rl.cancel(&mut s));
        assert!(!rl.cancel(&mut s));
        assert_eq!(s.pending(), None);

        let out = rl
            .tick(t0 + Duration::from_secs(1), &mut o, ProjectionMode::Spherical, &mut media, &mut r, &mut s)
            .unwrap();
        assert_eq!(out, TickOutcome::Stopped);
        assert_eq!(r.draws, 0);
        assert_eq!(s.pending(), None);
    }

    #[test]
    fn scheduler_ignores_stale_cancel() {
        let mut s = PendingFrameScheduler::new();
        let old = s.request_frame();
        let new = s.request_frame();
        s.cancel_frame(old);
        assert_eq!(s.pending(), Some(new));
    }
}

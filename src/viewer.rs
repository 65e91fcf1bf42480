// viewer.rs: 宿主入口：初始化、输入事件、每帧、全屏与销毁

use crate::config::ViewerConfig;
use crate::error::ViewerError;
use crate::input::{EventResponse, PointerEvent, WheelEvent};
use crate::media::MediaTextureAdapter;
use crate::orientation::{OrientationState, PointerInteraction};
use crate::projection::ProjectionMode;
use crate::render_loop::{FrameScheduler, RenderLoop, TickOutcome};
use crate::scene::SceneRenderer;
use crate::viewport::{CanvasRect, ViewportController, ViewportSize};
use std::time::Instant;

/// One panorama viewer instance. All state lives here and is touched from a
/// single thread (the host's event loop).
pub struct Viewer<R, M, S> {
    config: ViewerConfig,
    orientation: OrientationState,
    interaction: PointerInteraction,
    projection: ProjectionMode,
    viewport: ViewportController,
    render_loop: RenderLoop,
    renderer: R,
    media: M,
    scheduler: S,
    torn_down: bool,
}

impl<R, M, S> Viewer<R, M, S>
where
    R: SceneRenderer,
    M: MediaTextureAdapter,
    S: FrameScheduler,
{
    pub fn initialize(
        config: ViewerConfig,
        viewport: ViewportSize,
        mut media: M,
        mut renderer: R,
        mut scheduler: S,
        now: Instant,
    ) -> Result<Self, ViewerError> {
        config.validate()?;

        let orientation =
            OrientationState::new(config.lon, config.lat, config.fov, config.fov_min, config.fov_max);
        let mut controller = ViewportController::new(viewport);

        renderer.set_camera_fov(orientation.fov());
        controller.resize(&mut renderer, viewport);
        media.set_bounding_box(CanvasRect::at_origin(viewport));

        let mut render_loop = RenderLoop::new(now);
        render_loop.start(&mut scheduler);

        log::info!(
            "viewer initialized {}x{} lon={} lat={} fov={} mode={:?} input={:?}",
            viewport.width,
            viewport.height,
            orientation.longitude,
            orientation.latitude,
            orientation.fov(),
            config.projection_mode(),
            config.interaction_mode()
        );

        Ok(Self {
            interaction: PointerInteraction::new(config.interaction_mode()),
            projection: config.projection_mode(),
            config,
            orientation,
            viewport: controller,
            render_loop,
            renderer,
            media,
            scheduler,
            torn_down: false,
        })
    }

    pub fn on_pointer_down(&mut self, event: &PointerEvent) -> EventResponse {
        if self.torn_down {
            return EventResponse::IGNORED;
        }
        let Some(point) = event.page_point() else {
            return EventResponse::IGNORED;
        };
        self.interaction.pointer_down(point, &self.orientation);
        EventResponse::CONSUMED
    }

    pub fn on_pointer_move(&mut self, event: &PointerEvent) -> EventResponse {
        if self.torn_down {
            return EventResponse::IGNORED;
        }
        let Some(point) = event.page_point() else {
            return EventResponse::IGNORED;
        };
        let canvas = self.media.current_size_in_bounding_box();
        EventResponse {
            consumed: self.interaction.pointer_move(point, &mut self.orientation, canvas),
        }
    }

    pub fn on_pointer_up(&mut self, _event: &PointerEvent) -> EventResponse {
        EventResponse {
            consumed: self.interaction.pointer_up().is_some(),
        }
    }

    /// Always consumed: the host must suppress its default scroll handling.
    pub fn on_wheel(&mut self, event: &WheelEvent) -> EventResponse {
        if self.torn_down {
            return EventResponse::IGNORED;
        }
        let fov = self.orientation.zoom(event.normalize());
        self.renderer.set_camera_fov(fov);
        self.renderer.recompute_projection();
        EventResponse::CONSUMED
    }

    pub fn on_resize(&mut self, width: u32, height: u32) {
        let size = ViewportSize::new(width, height);
        if self.viewport.resize(&mut self.renderer, size) {
            self.media.set_bounding_box(CanvasRect::at_origin(size));
        }
    }

    /// `fullscreen_active` is the platform's current fullscreen state, not a toggle.
    pub fn on_fullscreen_change(&mut self, fullscreen_active: bool, screen: ViewportSize) -> bool {
        let changed = self
            .viewport
            .on_fullscreen_change(&mut self.renderer, fullscreen_active, screen);
        self.media
            .set_bounding_box(CanvasRect::at_origin(self.viewport.current()));
        changed
    }

    /// Run one render-loop tick.
    pub fn frame(&mut self, now: Instant) -> Result<TickOutcome, R::Error> {
        if self.torn_down {
            return Ok(TickOutcome::Stopped);
        }
        self.media.poll();
        self.render_loop.tick(
            now,
            &mut self.orientation,
            self.projection,
            &mut self.media,
            &mut self.renderer,
            &mut self.scheduler,
        )
    }

    /// Cancel the pending frame and release the media. Further calls are no-ops.
    pub fn teardown(&mut self) {
        if self.torn_down {
            return;
        }
        self.torn_down = true;
        self.render_loop.cancel(&mut self.scheduler);
        self.interaction.pointer_up();
        self.media.release();
        log::info!("viewer torn down");
    }

    pub fn reset_view(&mut self) {
        self.orientation
            .reset(self.config.lon, self.config.lat, self.config.fov);
        self.renderer.set_camera_fov(self.orientation.fov());
        self.renderer.recompute_projection();
    }

    pub fn is_running(&self) -> bool {
        !self.torn_down && self.render_loop.is_running()
    }

    pub fn config(&self) -> &ViewerConfig {
        &self.config
    }

    pub fn orientation(&self) -> &OrientationState {
        &self.orientation
    }

    pub fn projection_mode(&self) -> ProjectionMode {
        self.projection
    }

    pub fn viewport(&self) -> &ViewportController {
        &self.viewport
    }

    pub fn is_fullscreen(&self) -> bool {
        self.viewport.is_fullscreen()
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    pub fn renderer_mut(&mut self) -> &mut R {
        &mut self.renderer
    }

    pub fn media(&self) -> &M {
        &self.media
    }

    pub fn media_mut(&mut self) -> &mut M {
        &mut self.media
    }

    pub fn scheduler(&self) -> &S {
        &self.scheduler
    }

    pub fn scheduler_mut(&mut self) -> &mut S {
        &mut self.scheduler
    }
}

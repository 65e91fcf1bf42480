// viewport.rs: 窗口尺寸、全屏切换与相机宽高比

use crate::scene::SceneRenderer;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViewportSize {
    pub width: u32,
    pub height: u32,
}

impl ViewportSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn aspect(&self) -> Option<f32> {
        (!self.is_empty()).then(|| self.width as f32 / self.height as f32)
    }
}

impl From<winit::dpi::PhysicalSize<u32>> for ViewportSize {
    fn from(size: winit::dpi::PhysicalSize<u32>) -> Self {
        Self::new(size.width, size.height)
    }
}

/// 画布在页面中的包围盒（悬停模式映射用）
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CanvasRect {
    pub left: f32,
    pub top: f32,
    pub width: f32,
    pub height: f32,
}

impl CanvasRect {
    pub fn at_origin(size: ViewportSize) -> Self {
        Self {
            left: 0.0,
            top: 0.0,
            width: size.width as f32,
            height: size.height as f32,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ViewportController {
    current: ViewportSize,
    /// 第一次非空尺寸时记录，退出全屏时恢复
    original: ViewportSize,
    fullscreen: bool,
}

impl ViewportController {
    pub fn new(original: ViewportSize) -> Self {
        Self {
            current: original,
            original,
            fullscreen: false,
        }
    }

    pub fn current(&self) -> ViewportSize {
        self.current
    }

    pub fn original(&self) -> ViewportSize {
        self.original
    }

    pub fn is_fullscreen(&self) -> bool {
        self.fullscreen
    }

    /// Size, then aspect, then projection refresh. A zero-sized viewport is
    /// skipped (the window is minimized) and `false` is returned.
    pub fn resize<R: SceneRenderer>(&mut self, renderer: &mut R, size: ViewportSize) -> bool {
        let Some(aspect) = size.aspect() else {
            log::warn!("ignoring resize to empty viewport {}x{}", size.width, size.height);
            return false;
        };
        log::debug!("viewport resize {}x{}", size.width, size.height);
        if self.original.is_empty() && !self.fullscreen {
            self.original = size;
        }
        self.current = size;
        renderer.set_size(size.width, size.height);
        renderer.set_camera_aspect(aspect);
        renderer.recompute_projection();
        true
    }

    /// Driven by whether the platform currently shows us fullscreen, so it is
    /// safe to call on every change notification. Returns `true` on a transition.
    pub fn on_fullscreen_change<R: SceneRenderer>(
        &mut self,
        renderer: &mut R,
        fullscreen_active: bool,
        screen: ViewportSize,
    ) -> bool {
        let was = self.fullscreen;
        self.fullscreen = fullscreen_active;
        if fullscreen_active {
            self.resize(renderer, screen);
        } else if was {
            self.resize(renderer, self.original);
        }

        if was != fullscreen_active {
            log::info!(
                "{} fullscreen ({}x{})",
                if fullscreen_active { "entered" } else { "left" },
                self.current.width,
                self.current.height
            );
        }
        was != fullscreen_active
    }
}

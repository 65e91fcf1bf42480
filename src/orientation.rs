// orientation.rs: 视角状态（经度 / 纬度 / fov）与拖拽、悬停两种交互模式

use crate::input::{PagePoint, ScrollDelta};
use crate::viewport::CanvasRect;

/// 渲染前纬度被夹取到 [-LATITUDE_LIMIT, LATITUDE_LIMIT]，避开极点奇异。
pub const LATITUDE_LIMIT: f32 = 85.0;

/// 悬停模式下经度的映射跨度与偏移
const ABSOLUTE_LON_SPAN: f32 = 430.0;
const ABSOLUTE_LON_OFFSET: f32 = -225.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InteractionMode {
    #[default]
    ClickAndDrag,
    /// 指针在画布中的位置直接决定视角，无需按下
    Absolute,
}

impl InteractionMode {
    pub fn from_click_and_drag(click_and_drag: bool) -> Self {
        if click_and_drag {
            InteractionMode::ClickAndDrag
        } else {
            InteractionMode::Absolute
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrientationState {
    pub longitude: f32,
    /// 允许在两帧之间暂时越界，渲染时才夹取
    pub latitude: f32,
    fov: f32,
    fov_min: f32,
    fov_max: f32,
}

impl OrientationState {
    pub fn new(longitude: f32, latitude: f32, fov: f32, fov_min: f32, fov_max: f32) -> Self {
        debug_assert!(fov_min <= fov_max);
        Self {
            longitude,
            latitude,
            fov: clamp_range(fov, fov_min, fov_max),
            fov_min,
            fov_max,
        }
    }

    pub fn fov(&self) -> f32 {
        self.fov
    }

    pub fn fov_range(&self) -> (f32, f32) {
        (self.fov_min, self.fov_max)
    }

    /// Incremental drag: `longitude += dx`, `latitude -= dy`.
    pub fn apply_drag_delta(&mut self, dx: f32, dy: f32) {
        self.longitude += dx;
        self.latitude -= dy;
    }

    /// Maps a pointer position relative to the canvas straight to an orientation.
    /// Returns `false` (and leaves the state alone) for a zero-sized canvas.
    pub fn apply_absolute(&mut self, relative: PagePoint, width: f32, height: f32) -> bool {
        match absolute_orientation(relative, width, height) {
            Some((lon, lat)) => {
                self.longitude = lon;
                self.latitude = lat;
                true
            }
            None => false,
        }
    }

    /// 滚轮缩放，立即夹取到 [fov_min, fov_max]
    pub fn zoom(&mut self, delta: ScrollDelta) -> f32 {
        self.fov = clamp_range(self.fov + delta.0, self.fov_min, self.fov_max);
        self.fov
    }

    /// 渲染前调用：把纬度写回夹取后的值
    pub fn clamp_latitude(&mut self) -> f32 {
        self.latitude = clamp_range(self.latitude, -LATITUDE_LIMIT, LATITUDE_LIMIT);
        self.latitude
    }

    pub fn reset(&mut self, longitude: f32, latitude: f32, fov: f32) {
        self.longitude = longitude;
        self.latitude = latitude;
        self.fov = clamp_range(fov, self.fov_min, self.fov_max);
    }
}

// f32::clamp 在 min > max 或 NaN 边界时会 panic，这里只做比较
fn clamp_range(v: f32, min: f32, max: f32) -> f32 {
    v.max(min).min(max)
}

/// `longitude = x / w * 430 - 225`, `latitude = y / h * -180 + 90`.
pub fn absolute_orientation(relative: PagePoint, width: f32, height: f32) -> Option<(f32, f32)> {
    if !(width > 0.0 && height > 0.0) {
        return None;
    }
    let lon = (relative.x / width) * ABSOLUTE_LON_SPAN + ABSOLUTE_LON_OFFSET;
    let lat = (relative.y / height) * -180.0 + 90.0;
    Some((lon, lat))
}

/// Transient state of an active drag gesture.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DragSession {
    pub anchor_x: f32,
    pub anchor_y: f32,
    pub origin_longitude: f32,
    pub origin_latitude: f32,
}

/// 指针交互：持有模式与（拖拽模式下的）当前拖拽会话。
#[derive(Debug, Clone, Default)]
pub struct PointerInteraction {
    mode: InteractionMode,
    drag: Option<DragSession>,
}

impl PointerInteraction {
    pub fn new(mode: InteractionMode) -> Self {
        Self { mode, drag: None }
    }

    pub fn mode(&self) -> InteractionMode {
        self.mode
    }

    pub fn drag_session(&self) -> Option<&DragSession> {
        self.drag.as_ref()
    }

    pub fn pointer_down(&mut self, point: PagePoint, orientation: &OrientationState) {
        self.drag = Some(DragSession {
            anchor_x: point.x,
            anchor_y: point.y,
            origin_longitude: orientation.longitude,
            origin_latitude: orientation.latitude,
        });
    }

    /// Returns `true` when the orientation changed.
    pub fn pointer_move(
        &mut self,
        point: PagePoint,
        orientation: &mut OrientationState,
        canvas: CanvasRect,
    ) -> bool {
        match self.mode {
            InteractionMode::ClickAndDrag => {
                let Some(session) = self.drag.as_mut() else {
                    return false;
                };
                let dx = point.x - session.anchor_x;
                let dy = point.y - session.anchor_y;
                // 增量以上一次移动为基准，而非拖拽起点
                session.anchor_x = point.x;
                session.anchor_y = point.y;
                orientation.apply_drag_delta(dx, dy);
                true
            }
            InteractionMode::Absolute => {
                let relative = PagePoint::new(point.x - canvas.left, point.y - canvas.top);
                let applied = orientation.apply_absolute(relative, canvas.width, canvas.height);
                if !applied {
                    log::warn!("absolute mapping skipped: empty canvas {:?}", canvas);
                }
                applied
            }
        }
    }

    pub fn pointer_up(&mut self) -> Option<DragSession> {
        self.drag.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state() -> OrientationState {
        OrientationState::new(0.0, 0.0, 35.0, 3.0, 100.0)
    }

    fn canvas(width: f32, height: f32) -> CanvasRect {
        CanvasRect {
            left: 0.0,
            top: 0.0,
            width,
            height,
        }
    }

    #[test]
    fn drag_applies_incremental_deltas() {
        let mut o = state();
        let mut p = PointerInteraction::new(InteractionMode::ClickAndDrag);

        p.pointer_down(PagePoint::new(100.0, 100.0), &o);
        assert!(p.pointer_move(PagePoint::new(110.0, 95.0), &mut o, canvas(200.0, 100.0)));
        assert_eq!(o.longitude, 10.0);
        assert_eq!(o.latitude, 5.0);

        // 第二次移动以 (110, 95) 为锚点
        p.pointer_move(PagePoint::new(112.0, 95.0), &mut o, canvas(200.0, 100.0));
        assert_eq!(o.longitude, 12.0);
        assert_eq!(o.latitude, 5.0);
    }

    #[test]
    fn move_without_session_is_ignored_in_drag_mode() {
        let mut o = state();
        let mut p = PointerInteraction::new(InteractionMode::ClickAndDrag);
        assert!(!p.pointer_move(PagePoint::new(50.0, 50.0), &mut o, canvas(200.0, 100.0)));
        assert_eq!(o, state());
    }

    #[test]
    fn pointer_up_ends_session_without_inertia() {
        let mut o = state();
        let mut p = PointerInteraction::new(InteractionMode::ClickAndDrag);
        p.pointer_down(PagePoint::new(0.0, 0.0), &o);
        let session = p.pointer_up().unwrap();
        assert_eq!(session.origin_longitude, 0.0);
        assert!(p.drag_session().is_none());

        p.pointer_move(PagePoint::new(30.0, 30.0), &mut o, canvas(200.0, 100.0));
        assert_eq!(o.longitude, 0.0);
    }

    #[test]
    fn absolute_center_maps_to_fixed_orientation() {
        let mut o = state();
        let mut p = PointerInteraction::new(InteractionMode::Absolute);
        assert!(p.pointer_move(PagePoint::new(100.0, 50.0), &mut o, canvas(200.0, 100.0)));
        assert_eq!(o.longitude, -10.0);
        assert_eq!(o.latitude, 0.0);
    }

    #[test]
    fn absolute_mapping_accounts_for_canvas_offset() {
        let mut o = state();
        let mut p = PointerInteraction::new(InteractionMode::Absolute);
        let rect = CanvasRect {
            left: 20.0,
            top: 10.0,
            width: 200.0,
            height: 100.0,
        };
        p.pointer_move(PagePoint::new(20.0, 10.0), &mut o, rect);
        assert_eq!(o.longitude, -225.0);
        assert_eq!(o.latitude, 90.0);
    }

    #[test]
    fn absolute_mapping_skips_empty_canvas() {
        let mut o = state();
        let mut p = PointerInteraction::new(InteractionMode::Absolute);
        assert!(!p.pointer_move(PagePoint::new(10.0, 10.0), &mut o, canvas(0.0, 100.0)));
        assert!(o.longitude.is_finite());
        assert_eq!(o, state());
    }

    #[test]
    fn zoom_clamps_to_range() {
        let mut o = state();
        for _ in 0..50 {
            o.zoom(ScrollDelta(-5.0));
        }
        assert_eq!(o.fov(), 3.0);
        for _ in 0..50 {
            o.zoom(ScrollDelta(5.0));
        }
        assert_eq!(o.fov(), 100.0);
    }

    #[test]
    fn latitude_clamps_lazily() {
        let mut o = state();
        o.apply_drag_delta(0.0, -200.0);
        // 变更时不夹取
        assert_eq!(o.latitude, 200.0);
        assert_eq!(o.clamp_latitude(), 85.0);
        o.latitude = -1000.0;
        assert_eq!(o.clamp_latitude(), -85.0);
    }

    #[test]
    fn initial_fov_is_clamped() {
        let o = OrientationState::new(0.0, 0.0, 500.0, 3.0, 100.0);
        assert_eq!(o.fov(), 100.0);
    }
}

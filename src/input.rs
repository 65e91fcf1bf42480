// input.rs: 指针 / 触摸 / 滚轮事件归一化

use winit::event::{MouseScrollDelta, TouchPhase};

/// 页面坐标系下的一个点（像素）。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PagePoint {
    pub x: f32,
    pub y: f32,
}

impl PagePoint {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// 宿主传入的原始指针事件：鼠标或单指触摸。
#[derive(Debug, Clone, PartialEq)]
pub enum PointerEvent {
    Mouse { page_x: f32, page_y: f32 },
    Touch { touches: Vec<PagePoint> },
}

impl PointerEvent {
    pub fn mouse(page_x: f32, page_y: f32) -> Self {
        PointerEvent::Mouse { page_x, page_y }
    }

    pub fn touch(point: PagePoint) -> Self {
        PointerEvent::Touch {
            touches: vec![point],
        }
    }

    /// Page coordinates of the event. Touch events use their first touch point;
    /// a touch event without any touch points yields `None`.
    pub fn page_point(&self) -> Option<PagePoint> {
        match self {
            PointerEvent::Mouse { page_x, page_y } => Some(PagePoint::new(*page_x, *page_y)),
            PointerEvent::Touch { touches } => touches.first().copied(),
        }
    }
}

/// 滚轮速度：wheelDelta 单位 -> fov 度数
pub const WHEEL_SPEED: f32 = -0.01;

/// 一格滚轮对应的 wheelDelta（WebKit 约定）
pub const WHEEL_DELTA_PER_LINE: f32 = 120.0;

/// 原始滚轮事件。三个字段按优先级互斥：wheel_delta_y > wheel_delta > detail。
/// 值为 0 视同缺失。
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct WheelEvent {
    pub wheel_delta_y: Option<f32>,
    pub wheel_delta: Option<f32>,
    pub detail: Option<f32>,
}

/// 归一化后的滚动量，直接作用于 fov（度）。
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ScrollDelta(pub f32);

fn present(field: Option<f32>) -> Option<f32> {
    field.filter(|v| *v != 0.0 && v.is_finite())
}

impl WheelEvent {
    pub fn from_wheel_delta_y(delta: f32) -> Self {
        Self {
            wheel_delta_y: Some(delta),
            ..Default::default()
        }
    }

    pub fn from_detail(detail: f32) -> Self {
        Self {
            detail: Some(detail),
            ..Default::default()
        }
    }

    pub fn normalize(&self) -> ScrollDelta {
        if let Some(d) = present(self.wheel_delta_y) {
            ScrollDelta(-d * WHEEL_SPEED)
        } else if let Some(d) = present(self.wheel_delta) {
            ScrollDelta(-d * WHEEL_SPEED)
        } else if let Some(d) = present(self.detail) {
            // detail 不做缩放
            ScrollDelta(d)
        } else {
            ScrollDelta(0.0)
        }
    }
}

impl From<&MouseScrollDelta> for WheelEvent {
    fn from(delta: &MouseScrollDelta) -> Self {
        match delta {
            MouseScrollDelta::LineDelta(_, y) => Self::from_wheel_delta_y(y * WHEEL_DELTA_PER_LINE),
            MouseScrollDelta::PixelDelta(pos) => Self::from_wheel_delta_y(pos.y as f32),
        }
    }
}

/// 多点触控时只跟随第一根按下的手指，其余触点全部忽略，直到它抬起。
#[derive(Debug, Clone, Copy, Default)]
pub struct PrimaryTouch {
    id: Option<u64>,
}

impl PrimaryTouch {
    /// Whether a touch event with this id and phase should reach the viewer.
    pub fn accept(&mut self, id: u64, phase: TouchPhase) -> bool {
        match phase {
            TouchPhase::Started => {
                if self.id.is_some() {
                    return false;
                }
                self.id = Some(id);
                true
            }
            TouchPhase::Moved => self.id == Some(id),
            TouchPhase::Ended | TouchPhase::Cancelled => {
                if self.id != Some(id) {
                    return false;
                }
                self.id = None;
                true
            }
        }
    }

    pub fn active(&self) -> Option<u64> {
        self.id
    }
}

/// 事件是否被引擎消费；consumed 时宿主应当屏蔽默认行为（页面滚动等）。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EventResponse {
    pub consumed: bool,
}

impl EventResponse {
    pub const CONSUMED: Self = Self { consumed: true };
    pub const IGNORED: Self = Self { consumed: false };
}

#[cfg(test)]
mod tests {
    use super::*;
    use winit::dpi::PhysicalPosition;

    #[test]
    fn mouse_uses_own_coordinates() {
        let e = PointerEvent::mouse(12.0, 34.0);
        assert_eq!(e.page_point(), Some(PagePoint::new(12.0, 34.0)));
    }

    #[test]
    fn touch_uses_first_point() {
        let e = PointerEvent::Touch {
            touches: vec![PagePoint::new(1.0, 2.0), PagePoint::new(50.0, 60.0)],
        };
        assert_eq!(e.page_point(), Some(PagePoint::new(1.0, 2.0)));
    }

    #[test]
    fn touch_without_points_is_ignored() {
        let e = PointerEvent::Touch { touches: vec![] };
        assert_eq!(e.page_point(), None);
    }

    #[test]
    fn second_finger_is_ignored_until_first_lifts() {
        let mut t = PrimaryTouch::default();
        assert!(t.accept(1, TouchPhase::Started));
        assert!(!t.accept(2, TouchPhase::Started));
        assert!(!t.accept(2, TouchPhase::Moved));
        assert!(t.accept(1, TouchPhase::Moved));
        assert!(!t.accept(2, TouchPhase::Ended));
        assert_eq!(t.active(), Some(1));

        assert!(t.accept(1, TouchPhase::Cancelled));
        assert_eq!(t.active(), None);
        assert!(t.accept(2, TouchPhase::Started));
        assert_eq!(t.active(), Some(2));
    }

    #[test]
    fn wheel_delta_y_wins_over_other_fields() {
        let e = WheelEvent {
            wheel_delta_y: Some(120.0),
            wheel_delta: Some(-999.0),
            detail: Some(7.0),
        };
        assert!((e.normalize().0 - 1.2).abs() < 1e-6);
    }

    #[test]
    fn falls_back_to_wheel_delta_then_detail() {
        let e = WheelEvent {
            wheel_delta_y: Some(0.0),
            wheel_delta: Some(-240.0),
            detail: Some(7.0),
        };
        assert!((e.normalize().0 + 2.4).abs() < 1e-6);

        let e = WheelEvent::from_detail(3.0);
        assert_eq!(e.normalize(), ScrollDelta(3.0));
    }

    #[test]
    fn missing_fields_mean_no_change() {
        assert_eq!(WheelEvent::default().normalize(), ScrollDelta(0.0));
    }

    #[test]
    fn winit_deltas_map_to_wheel_delta_y() {
        let line = WheelEvent::from(&MouseScrollDelta::LineDelta(0.0, 1.0));
        assert_eq!(line.wheel_delta_y, Some(120.0));

        let px = WheelEvent::from(&MouseScrollDelta::PixelDelta(PhysicalPosition::new(0.0, -30.0)));
        assert_eq!(px.wheel_delta_y, Some(-30.0));
    }
}

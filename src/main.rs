// main.rs: 窗口、事件循环与查看器的连接

#![cfg_attr(not(debug_assertions), windows_subsystem = "windows")] // 在 Release 模式下隐藏控制台窗口

mod controls;
mod renderer;
mod sequence;

use controls::{ControlAction, ControlsStatus};
use renderer::GpuRenderer;

use sphere_view::error::ViewerError;
use sphere_view::input::{PagePoint, PointerEvent, PrimaryTouch, WheelEvent};
use sphere_view::media::{MediaTextureAdapter, PanoramaSource, PhotoSource, VideoSource};
use sphere_view::render_loop::PendingFrameScheduler;
use sphere_view::viewport::ViewportSize;
use sphere_view::{Viewer, ViewerConfig};

use winit::{
    dpi::{LogicalSize, PhysicalPosition},
    event::*,
    event_loop::{ControlFlow, EventLoop},
    window::{Fullscreen, Window, WindowBuilder},
};

use image::io::Reader as ImageReader;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::Arc;
use std::thread;
use std::time::Instant;

type AppViewer = Viewer<GpuRenderer, PanoramaSource, PendingFrameScheduler>;
type LoadResult = Result<image::RgbaImage, ViewerError>;

const IMAGE_EXTENSIONS: [&str; 4] = ["jpg", "jpeg", "png", "bmp"];

/// 命令行参数：--config <file> --photo <image> --frames <dir> --fps <n>
#[derive(Debug, Default, PartialEq)]
struct LaunchArgs {
    config: Option<PathBuf>,
    photo: Option<PathBuf>,
    frames: Option<PathBuf>,
    fps: Option<f64>,
}

impl LaunchArgs {
    fn parse(args: impl IntoIterator<Item = String>) -> Self {
        let mut out = LaunchArgs::default();
        let mut it = args.into_iter();
        while let Some(a) = it.next() {
            match a.as_str() {
                "--config" => out.config = it.next().map(PathBuf::from),
                "--photo" => out.photo = it.next().map(PathBuf::from),
                "--frames" => out.frames = it.next().map(PathBuf::from),
                "--fps" => out.fps = it.next().and_then(|v| v.parse().ok()),
                other => log::warn!("ignoring unknown argument {other:?}"),
            }
        }
        out
    }

    /// CLI 优先，其次环境变量 SPHERE_VIEW_CONFIG
    fn config_path(&self) -> Option<PathBuf> {
        self.config.clone().or_else(|| {
            std::env::var("SPHERE_VIEW_CONFIG")
                .ok()
                .filter(|v| !v.trim().is_empty())
                .map(PathBuf::from)
        })
    }
}

fn main() {
    let args = LaunchArgs::parse(std::env::args().skip(1));
    let config = args.config_path().map(|p| ViewerConfig::load(&p)).transpose();

    let level = match &config {
        Ok(Some(c)) => c.default_log_level(),
        _ => "info",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let config = match config {
        Ok(c) => c.unwrap_or_default(),
        Err(e) => {
            log::error!("{e}");
            std::process::exit(1);
        }
    };

    if let Err(e) = run(args, config) {
        log::error!("{e}");
        std::process::exit(1);
    }
}

fn run(args: LaunchArgs, config: ViewerConfig) -> Result<(), ViewerError> {
    let event_loop = EventLoop::new();
    let window = Arc::new(
        WindowBuilder::new()
            .with_title("Sphere View")
            .with_inner_size(LogicalSize::new(1280, 720))
            .build(&event_loop)
            .map_err(|e| ViewerError::Io(std::io::Error::new(std::io::ErrorKind::Other, e.to_string())))?,
    );

    let gpu = pollster::block_on(GpuRenderer::new(window.clone(), config.fov))?;

    // 照片异步加载通道
    let (tx, rx): (Sender<LoadResult>, Receiver<LoadResult>) = channel();
    let mut is_loading = false;

    let media = match (&args.frames, &args.photo) {
        (Some(dir), _) => {
            let (video_tx, video_rx) = channel();
            let mut video = VideoSource::new(config.video_options());
            let control = video.load(dir.display().to_string(), video_rx);
            sequence::spawn(dir, args.fps.unwrap_or(30.0), video_tx, control)?;
            PanoramaSource::Video(video)
        }
        (None, Some(path)) => {
            is_loading = true;
            start_load_image(path.clone(), tx.clone());
            PanoramaSource::Photo(PhotoSource::empty())
        }
        (None, None) => PanoramaSource::Photo(PhotoSource::empty()),
    };

    let hide_controls = config.hide_controls;
    let mut viewer: AppViewer = Viewer::initialize(
        config,
        ViewportSize::from(window.inner_size()),
        media,
        gpu,
        PendingFrameScheduler::new(),
        Instant::now(),
    )?;

    let mut cursor = PhysicalPosition::new(0.0f64, 0.0f64);
    let mut primary_touch = PrimaryTouch::default();

    event_loop.run(move |event, _, control_flow| {
        *control_flow = ControlFlow::Poll;

        if let Ok(loaded) = rx.try_recv() {
            match loaded {
                Ok(rgba) => viewer.media_mut().load_photo(rgba),
                Err(e) => log::error!("{e}"),
            }
            is_loading = false;
        }

        match event {
            Event::WindowEvent { event, .. } => {
                // 先让 egui 处理事件
                let response = {
                    let r = viewer.renderer_mut();
                    r.egui_state.on_event(&r.egui_ctx, &event)
                };
                if response.consumed {
                    return;
                }

                match event {
                    WindowEvent::CloseRequested => {
                        viewer.teardown();
                        *control_flow = ControlFlow::Exit;
                    }

                    WindowEvent::Resized(new_size) => {
                        let fullscreen_now = window.fullscreen().is_some();
                        if fullscreen_now != viewer.is_fullscreen() {
                            sync_fullscreen(&mut viewer, &window, fullscreen_now);
                        } else {
                            viewer.on_resize(new_size.width, new_size.height);
                        }
                    }

                    WindowEvent::ScaleFactorChanged { new_inner_size, .. } => {
                        viewer.on_resize(new_inner_size.width, new_inner_size.height);
                    }

                    WindowEvent::KeyboardInput { input, .. } => {
                        if input.state == ElementState::Pressed {
                            let action = match input.virtual_keycode {
                                Some(VirtualKeyCode::F11) => Some(ControlAction::ToggleFullscreen),
                                Some(VirtualKeyCode::Space) => Some(ControlAction::TogglePlay),
                                Some(VirtualKeyCode::M) => Some(ControlAction::ToggleMute),
                                Some(VirtualKeyCode::O) => Some(ControlAction::OpenPhoto),
                                Some(VirtualKeyCode::R) => Some(ControlAction::ResetView),
                                _ => None,
                            };
                            if let Some(action) = action {
                                apply_action(action, &mut viewer, &window, &tx, &mut is_loading);
                            }
                        }
                    }

                    WindowEvent::MouseInput { state, button, .. } => {
                        if button == MouseButton::Left {
                            let e = PointerEvent::mouse(cursor.x as f32, cursor.y as f32);
                            match state {
                                ElementState::Pressed => viewer.on_pointer_down(&e),
                                ElementState::Released => viewer.on_pointer_up(&e),
                            };
                        }
                    }

                    WindowEvent::CursorMoved { position, .. } => {
                        cursor = position;
                        viewer.on_pointer_move(&PointerEvent::mouse(position.x as f32, position.y as f32));
                    }

                    WindowEvent::Touch(touch) => {
                        if !primary_touch.accept(touch.id, touch.phase) {
                            return;
                        }
                        let e = PointerEvent::touch(PagePoint::new(
                            touch.location.x as f32,
                            touch.location.y as f32,
                        ));
                        match touch.phase {
                            TouchPhase::Started => viewer.on_pointer_down(&e),
                            TouchPhase::Moved => viewer.on_pointer_move(&e),
                            TouchPhase::Ended | TouchPhase::Cancelled => viewer.on_pointer_up(&e),
                        };
                    }

                    WindowEvent::MouseWheel { delta, .. } => {
                        // 窗口内没有默认滚动行为，consumed 无需再处理
                        viewer.on_wheel(&WheelEvent::from(&delta));
                    }

                    WindowEvent::DroppedFile(path) => {
                        is_loading = true;
                        start_load_image(path, tx.clone());
                    }

                    _ => {}
                }
            }

            Event::RedrawRequested(_) => {
                let status = controls_status(&viewer, is_loading);
                let mut actions = Vec::new();
                if !hide_controls {
                    viewer
                        .renderer_mut()
                        .run_ui(|ctx| controls::draw_controls(ctx, &status, &mut actions));
                }

                match viewer.frame(Instant::now()) {
                    Ok(_) => {}
                    Err(wgpu::SurfaceError::Lost) => viewer.renderer_mut().reconfigure(),
                    Err(wgpu::SurfaceError::OutOfMemory) => {
                        log::error!("GPU out of memory");
                        viewer.teardown();
                        *control_flow = ControlFlow::Exit;
                    }
                    Err(e) => log::warn!("render error: {e:?}"),
                }

                for action in actions {
                    apply_action(action, &mut viewer, &window, &tx, &mut is_loading);
                }
            }

            Event::MainEventsCleared => {
                if viewer.scheduler_mut().take_request().is_some() {
                    window.request_redraw();
                }
            }

            _ => {}
        }
    });
}

fn screen_size(window: &Window) -> ViewportSize {
    window
        .current_monitor()
        .map(|m| ViewportSize::from(m.size()))
        .unwrap_or_else(|| ViewportSize::from(window.inner_size()))
}

fn sync_fullscreen(viewer: &mut AppViewer, window: &Window, fullscreen_now: bool) {
    viewer.on_fullscreen_change(fullscreen_now, screen_size(window));
    let original = viewer.viewport().original();
    if !fullscreen_now && !original.is_empty() {
        // 窗口也回到初始尺寸
        window.set_inner_size(winit::dpi::PhysicalSize::new(original.width, original.height));
    }
}

fn controls_status(viewer: &AppViewer, loading: bool) -> ControlsStatus {
    let video = viewer.media().as_video();
    ControlsStatus {
        is_video: viewer.media().is_video(),
        playing: video.map(|v| v.is_playing()).unwrap_or(false),
        muted: video.map(|v| v.is_muted()).unwrap_or(true),
        fullscreen: viewer.is_fullscreen(),
        loading,
        buffered: video.and_then(|v| v.buffered_fraction()),
        longitude: viewer.orientation().longitude,
        latitude: viewer.orientation().latitude,
        fov: viewer.orientation().fov(),
    }
}

fn apply_action(
    action: ControlAction,
    viewer: &mut AppViewer,
    window: &Window,
    tx: &Sender<LoadResult>,
    is_loading: &mut bool,
) {
    match action {
        ControlAction::TogglePlay => {
            if let Some(video) = viewer.media_mut().as_video_mut() {
                if video.is_playing() {
                    video.pause();
                } else {
                    video.play();
                }
            }
        }
        ControlAction::ToggleMute => {
            if let Some(video) = viewer.media_mut().as_video_mut() {
                let muted = video.is_muted();
                video.set_muted(!muted);
            }
        }
        ControlAction::ToggleFullscreen => {
            // 只发请求；状态由随后的 Resized 同步
            if window.fullscreen().is_some() {
                window.set_fullscreen(None);
            } else {
                window.set_fullscreen(Some(Fullscreen::Borderless(None)));
            }
        }
        ControlAction::OpenPhoto => {
            if let Some(path) = rfd::FileDialog::new()
                .add_filter("Images", &IMAGE_EXTENSIONS)
                .pick_file()
            {
                *is_loading = true;
                start_load_image(path, tx.clone());
            }
        }
        ControlAction::ResetView => viewer.reset_view(),
    }
}

fn start_load_image(path: PathBuf, tx: Sender<LoadResult>) {
    thread::spawn(move || {
        log::info!("loading image {:?} in background", path);
        let result = load_image(&path);
        if let Ok(img) = &result {
            log::info!("image loaded: {}x{}", img.width(), img.height());
        }
        if tx.send(result).is_err() {
            log::error!("failed to hand decoded image to the main thread");
        }
    });
}

fn load_image(path: &Path) -> LoadResult {
    let reader = BufReader::new(File::open(path)?);
    let mut reader = ImageReader::new(reader).with_guessed_format()?;
    reader.no_limits();
    Ok(reader.decode()?.to_rgba8())
}

#[cfg(test)]
mod tests {
    use super::LaunchArgs;
    use std::path::PathBuf;

    fn args(list: &[&str]) -> LaunchArgs {
        LaunchArgs::parse(list.iter().map(|s| s.to_string()))
    }

    #[test]
    fn parses_flags_with_values() {
        let a = args(&["--photo", "pano.jpg", "--fps", "24", "--config", "v.json"]);
        assert_eq!(a.photo, Some(PathBuf::from("pano.jpg")));
        assert_eq!(a.fps, Some(24.0));
        assert_eq!(a.config_path(), Some(PathBuf::from("v.json")));
    }

    #[test]
    fn bad_fps_is_dropped() {
        let a = args(&["--frames", "clip", "--fps", "fast"]);
        assert_eq!(a.frames, Some(PathBuf::from("clip")));
        assert_eq!(a.fps, None);
    }
}

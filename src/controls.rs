// controls.rs: 底部控制栏：播放 / 静音 / 全屏 / 打开图片 + 视角状态

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlAction {
    TogglePlay,
    ToggleMute,
    ToggleFullscreen,
    OpenPhoto,
    ResetView,
}

/// Snapshot of the viewer taken before the UI pass.
#[derive(Debug, Clone, Copy, Default)]
pub struct ControlsStatus {
    pub is_video: bool,
    pub playing: bool,
    pub muted: bool,
    pub fullscreen: bool,
    pub loading: bool,
    pub buffered: Option<f64>,
    pub longitude: f32,
    pub latitude: f32,
    pub fov: f32,
}

pub fn draw_controls(ctx: &egui::Context, status: &ControlsStatus, actions: &mut Vec<ControlAction>) {
    egui::TopBottomPanel::bottom("controls").show(ctx, |ui| {
        ui.horizontal(|ui| {
            if status.is_video {
                let play_label = if status.playing { "⏸ Pause" } else { "▶ Play" };
                if ui.button(play_label).clicked() {
                    actions.push(ControlAction::TogglePlay);
                }
                let mute_label = if status.muted { "🔇 Unmute" } else { "🔊 Mute" };
                if ui.button(mute_label).clicked() {
                    actions.push(ControlAction::ToggleMute);
                }
            }

            let fullscreen_label = if status.fullscreen {
                "Exit fullscreen"
            } else {
                "Fullscreen"
            };
            if ui.button(fullscreen_label).clicked() {
                actions.push(ControlAction::ToggleFullscreen);
            }
            if ui.button("Open image…").clicked() {
                actions.push(ControlAction::OpenPhoto);
            }
            if ui.button("Reset view").clicked() {
                actions.push(ControlAction::ResetView);
            }

            ui.separator();

            if status.loading {
                ui.label(egui::RichText::new("Loading…").color(egui::Color32::YELLOW));
                ui.label("|");
            }
            if let Some(fraction) = status.buffered {
                ui.label(format!("Buffered: {:.0}%", fraction * 100.0));
                ui.label("|");
            }
            ui.label(format!("Lon: {:.1}°", status.longitude));
            ui.label("|");
            ui.label(format!("Lat: {:.1}°", status.latitude));
            ui.label("|");
            ui.label(format!("FOV: {:.1}°", status.fov));
        });
    });
}

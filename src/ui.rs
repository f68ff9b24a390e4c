// src/ui.rs
use egui;

use magic_portal::engine_lib::config::{MAX_ITERATIONS, MIN_ITERATIONS};
use magic_portal::{FrameReport, PortalState};

pub struct PortalInfo {
    pub name: String,
    pub state: PortalState,
    pub radius: f32,
    pub fresh: bool,
}

pub fn build_ui(ctx: &egui::Context, iterations: &mut u32, portals: &[PortalInfo], report: &FrameReport) {
    egui::Window::new("Controls & Info")
        .anchor(egui::Align2::LEFT_TOP, egui::vec2(10.0, 10.0))
        .resizable(false)
        .show(ctx, |ui| {
            ui.vertical(|ui| {
                ui.label("Portal Rendering Demo");
                ui.separator();

                ui.add(egui::Slider::new(iterations, MIN_ITERATIONS..=MAX_ITERATIONS).text("Recursion depth"));
                ui.label(format!(
                    "Frame {}: {} portals, {} passes",
                    report.frame, report.portals_rendered, report.passes
                ));
                if report.skipped_invisible + report.skipped_unplaced + report.skipped_stale + report.skipped_unlinked > 0 {
                    ui.label(format!(
                        "Skipped: {} out of view, {} unplaced, {} unlinked, {} stale",
                        report.skipped_invisible, report.skipped_unplaced, report.skipped_unlinked, report.skipped_stale
                    ));
                }
                ui.separator();

                for portal in portals {
                    let state = match portal.state {
                        PortalState::Placed if portal.fresh => "live",
                        PortalState::Placed => "placed",
                        PortalState::Unplaced => "unplaced",
                    };
                    ui.label(format!("{}: {} (radius {:.2})", portal.name, state, portal.radius));
                }
                ui.separator();

                ui.label("🎮 Keyboard Controls:");
                ui.label("   W/A/S/D: Move Camera");
                ui.label("   Space: Move Up");
                ui.label("   L-Shift/L-Ctrl: Move Down");
                ui.label("   Arrow Keys: Look Up/Down/Left/Right");
                ui.label("   Mouse (when grabbed): Look");
                ui.label("   1 / 2: Place first / second portal where you look");
                ui.label("   Escape: Grab/Ungrab Mouse Cursor");
            });
        });
}

//! Native curve viewer built on egui.
//!
//! Draws one or more [`Curve`]s on shared axes. Drag to pan, scroll to zoom,
//! and toggle the derivative curves from the top bar.

use crate::curve::Curve;
use eframe::egui;

const PALETTE: [egui::Color32; 6] = [
    egui::Color32::from_rgb(102, 194, 165),
    egui::Color32::from_rgb(252, 141, 98),
    egui::Color32::from_rgb(141, 160, 203),
    egui::Color32::from_rgb(231, 138, 195),
    egui::Color32::from_rgb(166, 216, 84),
    egui::Color32::from_rgb(255, 217, 47),
];
const MARGIN: f32 = 40.0;

pub struct CurveViewerApp {
    curves: Vec<Curve>,
    show_derivative: bool,
    pan_offset: egui::Vec2,
    zoom: f32,
}

impl CurveViewerApp {
    pub fn new(cc: &eframe::CreationContext<'_>, curves: Vec<Curve>) -> Self {
        cc.egui_ctx.set_visuals(egui::Visuals::dark());
        Self { curves, show_derivative: false, pan_offset: egui::Vec2::ZERO, zoom: 1.0 }
    }

    /// Data-space bounds of everything currently drawn.
    fn bounds(&self) -> Option<egui::Rect> {
        let mut x = (f32::INFINITY, f32::NEG_INFINITY);
        let mut y = (f32::INFINITY, f32::NEG_INFINITY);
        for curve in &self.curves {
            if let (Some(&first), Some(&last)) = (curve.xs.first(), curve.xs.last()) {
                x = (x.0.min(first), x.1.max(last));
            }
            if let Some((lo, hi)) = curve.value_range(self.show_derivative) {
                y = (y.0.min(lo), y.1.max(hi));
            }
        }
        if !(x.0 < x.1) || !y.0.is_finite() {
            return None;
        }
        if y.0 == y.1 {
            y = (y.0 - 1.0, y.1 + 1.0);
        }
        Some(egui::Rect::from_min_max(egui::pos2(x.0, y.0), egui::pos2(x.1, y.1)))
    }
}

/// Maps data coordinates into the plot area; y grows upwards.
struct Transform {
    data: egui::Rect,
    screen: egui::Rect,
}

impl Transform {
    fn to_screen(&self, x: f32, y: f32) -> egui::Pos2 {
        let tx = (x - self.data.min.x) / self.data.width();
        let ty = (y - self.data.min.y) / self.data.height();
        egui::pos2(
            self.screen.min.x + tx * self.screen.width(),
            self.screen.max.y - ty * self.screen.height(),
        )
    }
}

impl eframe::App for CurveViewerApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        egui::TopBottomPanel::top("controls").show(ctx, |ui| {
            ui.horizontal(|ui| {
                ui.checkbox(&mut self.show_derivative, "derivative");
                if ui.button("reset view").clicked() {
                    self.pan_offset = egui::Vec2::ZERO;
                    self.zoom = 1.0;
                }
            });
        });

        egui::CentralPanel::default().show(ctx, |ui| {
            let (response, painter) = ui.allocate_painter(ui.available_size(), egui::Sense::drag());
            if response.dragged() {
                self.pan_offset += response.drag_delta();
            }
            if response.hovered() {
                let scroll = ui.input(|i| i.smooth_scroll_delta.y);
                self.zoom = (self.zoom * (1.0 + scroll * 0.002)).clamp(0.1, 50.0);
            }

            let Some(data) = self.bounds() else {
                ui.label("Nothing to plot.");
                return;
            };
            let plot = response.rect.shrink(MARGIN);
            let screen = egui::Rect::from_center_size(plot.center() + self.pan_offset, plot.size() * self.zoom);
            let t = Transform { data, screen };

            let axis = egui::Stroke::new(1.0, egui::Color32::DARK_GRAY);
            if data.min.y <= 0.0 && data.max.y >= 0.0 {
                painter.line_segment([t.to_screen(data.min.x, 0.0), t.to_screen(data.max.x, 0.0)], axis);
            }
            if data.min.x <= 0.0 && data.max.x >= 0.0 {
                painter.line_segment([t.to_screen(0.0, data.min.y), t.to_screen(0.0, data.max.y)], axis);
            }

            for (i, curve) in self.curves.iter().enumerate() {
                let color = PALETTE[i % PALETTE.len()];
                let line = |ys: &[f32]| -> Vec<egui::Pos2> {
                    curve
                        .xs
                        .iter()
                        .zip(ys)
                        .filter(|(_, y)| y.is_finite())
                        .map(|(&x, &y)| t.to_screen(x, y))
                        .collect()
                };
                painter.add(egui::Shape::line(line(&curve.ys), egui::Stroke::new(2.0, color)));
                if self.show_derivative {
                    painter.add(egui::Shape::dashed_line(&line(&curve.dys), egui::Stroke::new(1.0, color), 6.0, 4.0));
                }
                painter.text(
                    response.rect.left_top() + egui::vec2(12.0, 12.0 + 18.0 * i as f32),
                    egui::Align2::LEFT_TOP,
                    curve.kind.display_name(),
                    egui::FontId::proportional(14.0),
                    color,
                );
            }

            painter.text(
                response.rect.left_bottom() + egui::vec2(12.0, -12.0),
                egui::Align2::LEFT_BOTTOM,
                format!("x: [{:.2}, {:.2}]  y: [{:.2}, {:.2}]", data.min.x, data.max.x, data.min.y, data.max.y),
                egui::FontId::monospace(12.0),
                egui::Color32::GRAY,
            );
        });
    }
}

/// Opens a window plotting `curves` and blocks until it is closed.
pub fn show(curves: Vec<Curve>) -> eframe::Result<()> {
    let options = eframe::NativeOptions::default();
    eframe::run_native(
        "actix curves",
        options,
        Box::new(|cc| Ok(Box::new(CurveViewerApp::new(cc, curves)))),
    )
}

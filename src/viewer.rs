//! Interactive scatter plot of the point table.
//!
//! Documents are drawn as markers coloured by extension; anchors are drawn
//! only as centred text. A click opens the nearest document, `q`/`Escape`
//! closes the window.

use crate::error::{BrwsError, Result};
use crate::opener::open_path;
use crate::points::{ColorMap, PointTable, Rgb};
use eframe::egui::{self, Align2, Color32, Key, RichText, ViewportCommand};
use egui_plot::{Legend, Plot, PlotPoint, PlotPoints, Points, Text};
use std::cell::RefCell;
use std::path::PathBuf;
use std::rc::Rc;
use std::sync::Arc;

const WINDOW_SIZE: [f32; 2] = [1000.0, 750.0];
const MARKER_RADIUS: f32 = 4.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAction {
    Quit,
    Report,
}

/// `q` (either case) and `Escape` quit; every other key is just reported.
pub fn classify_key(key: Key) -> KeyAction {
    match key {
        Key::Q | Key::Escape => KeyAction::Quit,
        _ => KeyAction::Report,
    }
}

fn legend_name(extension: &str) -> &str {
    if extension.is_empty() {
        "(no extension)"
    } else {
        extension
    }
}

fn to_color32([r, g, b]: Rgb) -> Color32 {
    Color32::from_rgb(r, g, b)
}

pub struct Viewer {
    table: PointTable,
    anchors: Vec<String>,
    folder: PathBuf,
}

impl Viewer {
    pub fn new(table: PointTable, anchors: Vec<String>, folder: PathBuf) -> Result<Self> {
        if table.anchors().len() != anchors.len() {
            return Err(BrwsError::Viewer(format!(
                "{} anchor labels for {} anchor rows",
                anchors.len(),
                table.anchors().len()
            )));
        }
        Ok(Self {
            table,
            anchors,
            folder,
        })
    }

    /// Blocks until the window is closed or a quit key is pressed.
    pub fn run(self) -> Result<()> {
        let fatal = Rc::new(RefCell::new(None));
        let title = format!("brws - {}", self.folder.display());
        let app = ViewerApp::new(self, Rc::clone(&fatal));
        let options = eframe::NativeOptions {
            viewport: egui::ViewportBuilder::default()
                .with_title(title)
                .with_inner_size(WINDOW_SIZE),
            ..Default::default()
        };

        eframe::run_native("brws", options, Box::new(move |_cc| Ok(Box::new(app))))
            .map_err(|e| BrwsError::Viewer(e.to_string()))?;

        let fatal = fatal.borrow_mut().take();
        match fatal {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

struct ViewerApp {
    table: Arc<PointTable>,
    anchors: Vec<String>,
    colors: ColorMap,
    folder: PathBuf,
    fatal: Rc<RefCell<Option<BrwsError>>>,
}

impl ViewerApp {
    fn new(viewer: Viewer, fatal: Rc<RefCell<Option<BrwsError>>>) -> Self {
        let colors = ColorMap::from_table(&viewer.table);
        Self {
            table: Arc::new(viewer.table),
            anchors: viewer.anchors,
            colors,
            folder: viewer.folder,
            fatal,
        }
    }

    fn handle_keys(&self, ctx: &egui::Context) {
        let events = ctx.input(|i| i.events.clone());
        for event in events {
            if let egui::Event::Key {
                key,
                pressed: true,
                repeat: false,
                ..
            } = event
            {
                match classify_key(key) {
                    KeyAction::Quit => {
                        log::info!("Quit key pressed");
                        ctx.send_viewport_cmd(ViewportCommand::Close);
                    }
                    KeyAction::Report => println!("{}", key.name()),
                }
            }
        }
    }

    fn open_nearest(&self, ctx: &egui::Context, at: PlotPoint) {
        let Some(filename) = self
            .table
            .nearest_document(at.x, at.y)
            .and_then(|p| p.filename.as_deref())
        else {
            return;
        };
        println!("{}", filename);

        match open_path(&self.folder.join(filename)) {
            Ok(()) => {}
            Err(err @ BrwsError::UnsupportedPlatform(_)) => {
                log::error!("{}", err);
                *self.fatal.borrow_mut() = Some(err);
                ctx.send_viewport_cmd(ViewportCommand::Close);
            }
            Err(err) => log::error!("Failed to open {}: {}", filename, err),
        }
    }
}

impl eframe::App for ViewerApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.handle_keys(ctx);

        egui::CentralPanel::default().show(ctx, |ui| {
            let anchor_color = ui.visuals().strong_text_color();
            let hover_table = Arc::clone(&self.table);

            let response = Plot::new("brws-plot")
                .legend(Legend::default())
                .data_aspect(1.0)
                .label_formatter(move |_name, value| {
                    hover_table
                        .nearest_document(value.x, value.y)
                        .and_then(|p| p.filename.clone())
                        .unwrap_or_default()
                })
                .show(ui, |plot_ui| {
                    for (extension, rgb) in self.colors.iter() {
                        let positions: Vec<[f64; 2]> = self
                            .table
                            .documents()
                            .iter()
                            .filter(|p| p.extension.as_deref() == Some(extension))
                            .map(|p| p.position())
                            .collect();
                        plot_ui.points(
                            Points::new(PlotPoints::new(positions))
                                .color(to_color32(rgb))
                                .radius(MARKER_RADIUS)
                                .filled(true)
                                .name(legend_name(extension)),
                        );
                    }

                    for (point, label) in self.table.anchors().iter().zip(&self.anchors) {
                        plot_ui.text(
                            Text::new(PlotPoint::new(point.x, point.y), RichText::new(label).strong())
                                .anchor(Align2::CENTER_CENTER)
                                .color(anchor_color),
                        );
                    }
                });

            if response.response.clicked() {
                if let Some(pos) = response.response.interact_pointer_pos() {
                    let at = response.transform.value_from_position(pos);
                    self.open_nearest(ctx, at);
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::Document;
    use ndarray::Array2;

    #[test]
    fn quit_keys() {
        assert_eq!(classify_key(Key::Q), KeyAction::Quit);
        assert_eq!(classify_key(Key::Escape), KeyAction::Quit);
        assert_eq!(classify_key(Key::W), KeyAction::Report);
        assert_eq!(classify_key(Key::Enter), KeyAction::Report);
    }

    #[test]
    fn legend_names_extensionless_files() {
        assert_eq!(legend_name(""), "(no extension)");
        assert_eq!(legend_name(".pdf"), ".pdf");
    }

    #[test]
    fn anchor_labels_must_match_anchor_rows() {
        let docs = vec![Document::new("/d/a.txt")];
        let table = PointTable::assemble(1, &docs, &Array2::zeros((2, 2))).unwrap();
        assert!(matches!(
            Viewer::new(table.clone(), vec![], PathBuf::from("/d")),
            Err(BrwsError::Viewer(_))
        ));
        assert!(Viewer::new(table, vec!["alpha".to_string()], PathBuf::from("/d")).is_ok());
    }

    #[test]
    fn palette_colours_convert() {
        assert_eq!(to_color32([1, 2, 3]), Color32::from_rgb(1, 2, 3));
    }
}

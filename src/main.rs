//! matview - interactive material viewer
//!
//! Opens a window showing a single glTF model on a shadow-catching ground
//! plane. Two egui panels edit the model's physically-based material and
//! its base color; the left mouse button rotates the model and the wheel
//! zooms the camera.
//!
//! Configuration is read from `matview.json` in the working directory (or
//! the file named by `MATVIEW_CONFIG`); `MATVIEW_MODEL` overrides the model
//! path. Logging follows `RUST_LOG`.

mod app;
mod assets;
mod config;
mod material;
mod render;
mod scene;
mod ui;

fn main() {
    if let Err(err) = app::run() {
        log::error!("{err}");
        std::process::exit(1);
    }
}

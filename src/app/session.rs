use crate::app::input::DragState;
use crate::assets::{AssetError, AssetLoader, LoadEvent, LoadHandle, LoadSink, LoadedModel};
use crate::material::{MaterialProperties, PhysicalMaterial, Rgb};
use crate::render::camera::PerspectiveCamera;
use crate::scene::{fallback_cube, MaterialSlot, Scene, SceneNode, Traverse, Transform};
use glam::{Mat4, Quat, Vec2, Vec3};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

pub const STATUS_INITIALIZING: &str = "Initializing...";
pub const STATUS_LOADING: &str = "Loading 3D model...";
pub const STATUS_LOADED: &str = "Model loaded successfully!";
pub const STATUS_FAILED: &str = "Error loading model. Using fallback cube...";

const MODEL_GROUP: &str = "model";
/// Imported models are authored Z-up.
const IMPORT_ROTATION_X: f32 = -std::f32::consts::FRAC_PI_2;

#[derive(Debug, Clone, PartialEq)]
pub enum LoadStatus {
    Initializing,
    /// Percent of bytes read, when the total is known.
    Loading(Option<u8>),
    Loaded,
    Error(String),
}

impl LoadStatus {
    pub fn is_loading(&self) -> bool {
        matches!(self, LoadStatus::Initializing | LoadStatus::Loading(_))
    }
}

impl fmt::Display for LoadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadStatus::Initializing => f.write_str(STATUS_INITIALIZING),
            LoadStatus::Loading(None) => f.write_str(STATUS_LOADING),
            LoadStatus::Loading(Some(percent)) => write!(f, "Loading: {percent}%"),
            LoadStatus::Loaded => f.write_str(STATUS_LOADED),
            LoadStatus::Error(message) => f.write_str(message),
        }
    }
}

/// `round(loaded / total * 100)`, or `None` when the total is unknown.
pub fn progress_percent(loaded: u64, total: u64) -> Option<u8> {
    if total == 0 {
        return None;
    }
    let percent = (loaded as f64 / total as f64 * 100.0).round();
    Some(percent.clamp(0.0, 100.0) as u8)
}

/// Everything the viewport owns between window creation and teardown:
/// scene, camera, shared material, drag state and the model load.
pub struct ViewportSession {
    scene: Scene,
    camera: PerspectiveCamera,
    drag: DragState,
    /// Euler angles (X, Y) of the model group.
    model_rotation: Vec2,
    material: Option<PhysicalMaterial>,
    properties: MaterialProperties,
    color: Rgb,
    status: LoadStatus,
    loader: Option<LoadHandle>,
    disposed: bool,
}

impl ViewportSession {
    pub fn new(
        scene: Scene,
        aspect: f32,
        color: Rgb,
        properties: MaterialProperties,
    ) -> Self {
        Self {
            scene,
            camera: PerspectiveCamera::new(aspect),
            drag: DragState::default(),
            model_rotation: Vec2::ZERO,
            material: None,
            properties: properties.clamped(),
            color,
            status: LoadStatus::Initializing,
            loader: None,
            disposed: false,
        }
    }

    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    pub fn camera(&self) -> &PerspectiveCamera {
        &self.camera
    }

    pub fn material(&self) -> Option<&PhysicalMaterial> {
        self.material.as_ref()
    }

    pub fn properties(&self) -> MaterialProperties {
        self.properties
    }

    pub fn color_hex(&self) -> String {
        self.color.to_hex()
    }

    pub fn status(&self) -> &LoadStatus {
        &self.status
    }

    pub fn is_loading(&self) -> bool {
        !self.disposed && self.status.is_loading()
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    pub fn is_dragging(&self) -> bool {
        self.drag.is_active()
    }

    /// Accumulated drag rotation as (about X, about Y).
    #[cfg(test)]
    pub fn model_rotation(&self) -> Vec2 {
        self.model_rotation
    }

    /// Starts the background load; events must be fed back through
    /// [`ViewportSession::handle_load_event`].
    pub fn begin_load(&mut self, path: PathBuf, sink: impl LoadSink) {
        if self.disposed {
            return;
        }
        if let Some(previous) = self.loader.take() {
            previous.cancel();
        }
        log::info!("loading model {}", path.display());
        self.status = LoadStatus::Loading(None);
        match AssetLoader::spawn(path, sink) {
            Ok(handle) => self.loader = Some(handle),
            Err(err) => self.on_load_failure(&err),
        }
    }

    /// Returns whether the event changed anything. Events after a terminal
    /// event or after disposal are dropped.
    pub fn handle_load_event(&mut self, event: LoadEvent) -> bool {
        if self.disposed || !self.status.is_loading() {
            log::debug!("ignoring late load event");
            return false;
        }
        let terminal = event.is_terminal();
        match event {
            LoadEvent::Progress { loaded, total } => self.on_load_progress(loaded, total),
            LoadEvent::Loaded(model) => self.on_load_success(model),
            LoadEvent::Failed(err) => self.on_load_failure(&err),
        }
        // The worker exits right after its terminal event.
        if terminal {
            if let Some(loader) = self.loader.take() {
                loader.join();
            }
        }
        true
    }

    fn on_load_progress(&mut self, loaded: u64, total: u64) {
        let percent = progress_percent(loaded, total);
        log::debug!("model load progress {loaded}/{total}");
        self.status = LoadStatus::Loading(percent);
    }

    fn on_load_success(&mut self, model: LoadedModel) {
        let LoadedModel { path, mut root } = model;
        let material = PhysicalMaterial::new(self.color, self.properties);
        let transparent = material.transparent;
        root.for_each_mesh_mut(&mut |mesh| {
            Arc::make_mut(&mut mesh.mesh).compute_vertex_normals();
            mesh.material = MaterialSlot::Shared;
            mesh.cast_shadow = true;
            mesh.receive_shadow = true;
            mesh.render_order = render_order_for(transparent);
        });

        root.transform.rotation = Quat::from_rotation_x(IMPORT_ROTATION_X) * root.transform.rotation;
        let bounds = root.bounds(Mat4::IDENTITY);
        root.transform.translation -= bounds.center();
        self.material = Some(material);
        self.install_model(root);
        self.camera.frame_size(bounds.size().length());
        self.status = LoadStatus::Loaded;
        log::info!(
            "loaded {} ({} meshes, size {:.3})",
            path.display(),
            self.scene.model().map_or(0, SceneNode::mesh_count),
            bounds.size().length()
        );
    }

    fn on_load_failure(&mut self, err: &AssetError) {
        log::error!("model load failed: {}", error_chain(err));
        self.install_model(fallback_cube());
        self.status = LoadStatus::Error(STATUS_FAILED.to_string());
    }

    fn install_model(&mut self, content: SceneNode) {
        self.model_rotation = Vec2::ZERO;
        self.drag.release();
        self.scene
            .set_model(SceneNode::group(MODEL_GROUP).with_child(content));
    }

    /// Records `hex` and pushes it to the live material when there is one.
    pub fn apply_color(&mut self, hex: &str) {
        if self.disposed {
            return;
        }
        let color = match Rgb::from_hex(hex) {
            Ok(color) => color,
            Err(err) => {
                log::warn!("ignoring color update: {err}");
                return;
            }
        };
        self.color = color;
        if let Some(material) = self.material.as_mut() {
            material.set_color(color);
        }
    }

    /// Records the clamped record and, once a material exists, copies it over
    /// and re-sorts the model for transparency.
    pub fn apply_material_properties(&mut self, properties: MaterialProperties) {
        if self.disposed {
            return;
        }
        self.properties = properties.clamped();
        let Some(material) = self.material.as_mut() else {
            return;
        };
        let transparent = material.apply_properties(self.properties);
        if let Some(model) = self.scene.model_mut() {
            let order = render_order_for(transparent);
            model.for_each_mesh_mut(&mut |mesh| mesh.render_order = order);
        }
    }

    pub fn pointer_down(&mut self, position: Vec2) {
        if !self.disposed {
            self.drag.press(position);
        }
    }

    pub fn pointer_move(&mut self, position: Vec2) {
        if self.disposed {
            return;
        }
        let Some(delta) = self.drag.motion(position) else {
            return;
        };
        self.model_rotation += Vec2::new(delta.y, delta.x);
        let rotation = Transform::from_euler_xyz(self.model_rotation.x, self.model_rotation.y, 0.0);
        if let Some(model) = self.scene.model_mut() {
            model.transform.rotation = rotation.rotation;
        }
    }

    pub fn pointer_up(&mut self) {
        self.drag.release();
    }

    /// `delta_y` in browser pixels, positive when scrolling down.
    pub fn wheel(&mut self, delta_y: f32) {
        if !self.disposed {
            self.camera.zoom_by(delta_y);
        }
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        if !self.disposed {
            self.camera.set_viewport(width, height);
        }
    }

    /// Cancels the load and drops the scene. Returns `false` when already
    /// disposed.
    pub fn dispose(&mut self) -> bool {
        if self.disposed {
            return false;
        }
        if let Some(loader) = self.loader.take() {
            loader.cancel();
        }
        self.disposed = true;
        self.drag.release();
        self.scene.clear();
        self.material = None;
        true
    }

    #[cfg(test)]
    pub fn camera_position(&self) -> Vec3 {
        self.camera.position
    }
}

fn render_order_for(transparent: bool) -> i32 {
    if transparent {
        1
    } else {
        0
    }
}

fn error_chain(err: &dyn std::error::Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::tests::{temp_path, TRIANGLE_GLTF};
    use crate::material::{MaterialField, DEFAULT_COLOR, PRESETS};
    use crate::scene::{MeshData, MeshNode, FALLBACK_CUBE_COLOR};
    use std::sync::mpsc;
    use std::time::Duration;

    fn session() -> ViewportSession {
        ViewportSession::new(
            Scene::new(Rgb::WHITE, 1024),
            1.5,
            Rgb::from_hex(DEFAULT_COLOR).unwrap(),
            MaterialProperties::default(),
        )
    }

    fn loaded_event() -> LoadEvent {
        let content = SceneNode::group("box")
            .with_child(SceneNode::mesh(
                "a",
                MeshNode::new(MeshData::cuboid(2.0), MaterialSlot::Lambert(Rgb::BLACK)),
            ))
            .with_child(
                SceneNode::mesh("b", MeshNode::new(MeshData::cuboid(1.0), MaterialSlot::Shared))
                    .with_transform(Transform {
                        translation: Vec3::new(0.0, 0.0, 3.0),
                        ..Transform::IDENTITY
                    }),
            );
        LoadEvent::Loaded(LoadedModel {
            path: PathBuf::from("box.gltf"),
            root: content,
        })
    }

    fn failure() -> LoadEvent {
        LoadEvent::Failed(AssetError::NoGeometry {
            path: "broken.gltf".to_string(),
        })
    }

    fn model_orders(session: &ViewportSession) -> Vec<i32> {
        let mut orders = Vec::new();
        session
            .scene()
            .model()
            .unwrap()
            .for_each_mesh(Mat4::IDENTITY, &mut |_, mesh| orders.push(mesh.render_order));
        orders
    }

    #[test]
    fn status_text_follows_progress() {
        let mut session = session();
        assert_eq!(session.status().to_string(), STATUS_INITIALIZING);
        assert!(session.is_loading());
        session.handle_load_event(LoadEvent::Progress { loaded: 10, total: 0 });
        assert_eq!(session.status().to_string(), STATUS_LOADING);
        session.handle_load_event(LoadEvent::Progress { loaded: 1, total: 3 });
        assert_eq!(session.status().to_string(), "Loading: 33%");
        session.handle_load_event(LoadEvent::Progress { loaded: 2, total: 3 });
        assert_eq!(session.status().to_string(), "Loading: 67%");
    }

    #[test]
    fn progress_percent_rounds_and_saturates() {
        assert_eq!(progress_percent(0, 0), None);
        assert_eq!(progress_percent(5, 1000), Some(1));
        assert_eq!(progress_percent(1000, 1000), Some(100));
        assert_eq!(progress_percent(2000, 1000), Some(100));
    }

    #[test]
    fn success_installs_shared_material_and_frames_camera() {
        let mut session = session();
        assert!(session.handle_load_event(loaded_event()));
        assert_eq!(session.status(), &LoadStatus::Loaded);
        assert!(!session.is_loading());

        let material = session.material().unwrap();
        assert_eq!(material.color, Rgb::from_hex(DEFAULT_COLOR).unwrap());
        assert_eq!(material.properties, MaterialProperties::default());

        let model = session.scene().model().unwrap();
        let mut meshes = 0;
        model.for_each_mesh(Mat4::IDENTITY, &mut |_, mesh| {
            meshes += 1;
            assert_eq!(mesh.material, MaterialSlot::Shared);
            assert!(mesh.cast_shadow && mesh.receive_shadow);
            assert!(mesh.mesh.normals.iter().all(|n| Vec3::from(*n).length() > 0.99));
        });
        assert_eq!(meshes, 2);

        let bounds = model.bounds(Mat4::IDENTITY);
        assert!(bounds.center().length() < 1e-4);
        // The +Z offset child ends up along +Y after the import rotation.
        assert!(bounds.size().y > bounds.size().z);
        let expected = bounds.size().length() * 2.0;
        assert!((session.camera_position() - Vec3::new(0.0, 0.0, expected)).length() < 1e-4);
    }

    #[test]
    fn failure_shows_fallback_cube() {
        let mut session = session();
        assert!(session.handle_load_event(failure()));
        assert_eq!(session.status().to_string(), STATUS_FAILED);
        assert!(!session.is_loading());
        assert!(session.material().is_none());
        let model = session.scene().model().unwrap();
        let mut materials = Vec::new();
        model.for_each_mesh(Mat4::IDENTITY, &mut |_, mesh| materials.push(mesh.material));
        assert_eq!(materials, vec![MaterialSlot::Lambert(FALLBACK_CUBE_COLOR)]);
    }

    #[test]
    fn missing_model_file_falls_back_end_to_end() {
        let mut session = session();
        let (tx, rx) = mpsc::channel();
        session.begin_load(temp_path("absent.gltf"), tx);
        assert_eq!(session.status(), &LoadStatus::Loading(None));
        while session.is_loading() {
            let event = rx.recv_timeout(Duration::from_secs(10)).unwrap();
            session.handle_load_event(event);
        }
        assert_eq!(session.status(), &LoadStatus::Error(STATUS_FAILED.to_string()));
        assert!(session.scene().model().is_some());
        assert!(session.loader.is_none());
    }

    #[test]
    fn loader_is_reaped_after_success() {
        let path = temp_path("reaped.gltf");
        std::fs::write(&path, TRIANGLE_GLTF).unwrap();
        let mut session = session();
        let (tx, rx) = mpsc::channel();
        session.begin_load(path.clone(), tx);
        while session.is_loading() {
            let event = rx.recv_timeout(Duration::from_secs(10)).unwrap();
            session.handle_load_event(event);
        }
        let _ = std::fs::remove_file(&path);
        assert_eq!(session.status(), &LoadStatus::Loaded);
        assert!(session.loader.is_none());
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn events_after_terminal_are_ignored() {
        let mut session = session();
        session.handle_load_event(failure());
        assert!(!session.handle_load_event(LoadEvent::Progress { loaded: 1, total: 2 }));
        assert!(!session.handle_load_event(loaded_event()));
        assert_eq!(session.status().to_string(), STATUS_FAILED);
        assert!(session.material().is_none());
    }

    #[test]
    fn updates_before_load_apply_on_creation() {
        let mut session = session();
        session.apply_color("#e74c3c");
        session.apply_material_properties(PRESETS[2].properties);
        assert!(session.material().is_none());
        session.handle_load_event(loaded_event());
        let material = session.material().unwrap();
        assert_eq!(material.color, Rgb::from_u32(0xe74c3c));
        assert_eq!(material.properties, PRESETS[2].properties);
        assert!(material.transparent && !material.depth_write);
        assert_eq!(model_orders(&session), vec![1, 1]);
    }

    #[test]
    fn transparency_drives_render_order() {
        let mut session = session();
        session.handle_load_event(loaded_event());
        assert_eq!(model_orders(&session), vec![0, 0]);
        let see_through = MaterialProperties::default().with(MaterialField::Transmission, 0.5);
        session.apply_material_properties(see_through);
        assert_eq!(model_orders(&session), vec![1, 1]);
        assert!(!session.material().unwrap().depth_write);
        session.apply_material_properties(PRESETS[0].properties);
        assert_eq!(model_orders(&session), vec![0, 0]);
        assert!(session.material().unwrap().depth_write);
    }

    #[test]
    fn presets_replace_the_whole_record() {
        let mut session = session();
        session.handle_load_event(loaded_event());
        session.apply_material_properties(
            MaterialProperties::default().with(MaterialField::Thickness, 4.0),
        );
        for preset in PRESETS {
            session.apply_material_properties(preset.properties);
            assert_eq!(session.properties(), preset.properties);
            assert_eq!(session.material().unwrap().properties, preset.properties);
        }
    }

    #[test]
    fn out_of_range_records_are_clamped() {
        let mut session = session();
        let mut wild = MaterialProperties::default();
        wild.ior = 9.0;
        wild.opacity = f32::NAN;
        session.apply_material_properties(wild);
        assert_eq!(session.properties().ior, 3.0);
        assert_eq!(session.properties().opacity, 0.0);
    }

    #[test]
    fn invalid_color_is_ignored() {
        let mut session = session();
        session.apply_color("not a color");
        assert_eq!(session.color_hex(), DEFAULT_COLOR);
        session.apply_color("#2ECC71");
        assert_eq!(session.color_hex(), "#2ecc71");
    }

    #[test]
    fn drag_rotates_model_by_pointer_delta() {
        let mut session = session();
        session.handle_load_event(loaded_event());
        session.pointer_down(Vec2::new(100.0, 100.0));
        session.pointer_move(Vec2::new(140.0, 80.0));
        let rotation = session.model_rotation();
        assert!((rotation.y - 40.0 * 0.005).abs() < 1e-6);
        assert!((rotation.x + 20.0 * 0.005).abs() < 1e-6);

        session.pointer_up();
        session.pointer_move(Vec2::new(500.0, 500.0));
        assert_eq!(session.model_rotation(), rotation);

        session.pointer_down(Vec2::new(0.0, 0.0));
        session.pointer_move(Vec2::new(10.0, 0.0));
        assert!((session.model_rotation().y - rotation.y - 0.05).abs() < 1e-6);

        let expected =
            Transform::from_euler_xyz(session.model_rotation().x, session.model_rotation().y, 0.0);
        let model = session.scene().model().unwrap();
        assert!(model.transform.rotation.abs_diff_eq(expected.rotation, 1e-6));
    }

    #[test]
    fn fallback_cube_can_be_dragged() {
        let mut session = session();
        session.handle_load_event(failure());
        session.pointer_down(Vec2::ZERO);
        session.pointer_move(Vec2::new(0.0, 100.0));
        assert!((session.model_rotation().x - 0.5).abs() < 1e-6);
    }

    #[test]
    fn wheel_zoom_moves_and_saturates() {
        let mut session = session();
        session.wheel(1000.0);
        assert!((session.camera_position().z - 5.1).abs() < 1e-5);
        for _ in 0..50 {
            session.wheel(100_000.0);
        }
        assert_eq!(session.camera_position().z, 50.0);
        for _ in 0..50 {
            session.wheel(-100_000.0);
        }
        assert_eq!(session.camera_position().z, 0.001);
    }

    #[test]
    fn dispose_is_idempotent_and_silences_events() {
        let mut session = session();
        session.pointer_down(Vec2::ZERO);
        assert!(session.dispose());
        assert!(!session.dispose());
        assert!(session.is_disposed());
        assert!(!session.is_dragging());
        assert!(session.scene().is_empty());

        let z = session.camera_position().z;
        session.wheel(1000.0);
        session.pointer_down(Vec2::ZERO);
        assert!(!session.handle_load_event(loaded_event()));
        assert_eq!(session.camera_position().z, z);
        assert!(!session.is_dragging());
        assert!(session.scene().model().is_none());
        assert!(!session.is_loading());
    }

    #[test]
    fn error_chain_includes_sources() {
        let err = AssetError::Read {
            path: "a.gltf".to_string(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
        };
        assert!(error_chain(&err).ends_with(": gone"));
    }
}

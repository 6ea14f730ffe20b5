mod egui_host;
mod input;
pub mod session;

pub use egui_host::EguiFrame;

use crate::assets::{resolve_model_path, LoadEvent, LoadSink};
use crate::config::{ConfigError, ViewerConfig};
use crate::material::Rgb;
use crate::render::{RenderContext, RenderError};
use crate::scene::Scene;
use crate::ui::{PanelView, UiAction, UiState};
use egui_host::EguiHost;
use input::wheel_delta_pixels;
use session::ViewportSession;

use glam::Vec2;
use std::sync::Arc;
use std::time::{Duration, Instant};
use winit::application::ApplicationHandler;
use winit::dpi::PhysicalSize;
use winit::event::{ElementState, MouseButton, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop, EventLoopProxy};
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::window::{CursorIcon, Window, WindowAttributes, WindowId};

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("event loop error: {0}")]
    EventLoop(#[from] winit::error::EventLoopError),
    #[error("failed to create window: {0}")]
    Window(#[from] winit::error::OsError),
    #[error(transparent)]
    Render(#[from] RenderError),
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Events posted to the winit loop from other threads.
#[derive(Debug)]
pub enum UserEvent {
    Load(LoadEvent),
}

impl LoadSink for EventLoopProxy<UserEvent> {
    fn deliver(&self, event: LoadEvent) -> bool {
        self.send_event(UserEvent::Load(event)).is_ok()
    }
}

pub struct App {
    config: ViewerConfig,
    proxy: EventLoopProxy<UserEvent>,
    window: Option<Arc<Window>>,
    render: Option<RenderContext>,
    egui: Option<EguiHost>,
    session: Option<ViewportSession>,
    ui: UiState,
    cursor: Vec2,
    target_frame_duration: Duration,
    next_frame_time: Instant,
    failure: Option<AppError>,
}

impl App {
    fn new(config: ViewerConfig, proxy: EventLoopProxy<UserEvent>) -> Self {
        Self {
            config,
            proxy,
            window: None,
            render: None,
            egui: None,
            session: None,
            ui: UiState::new(),
            cursor: Vec2::ZERO,
            target_frame_duration: Duration::from_millis(16),
            next_frame_time: Instant::now(),
            failure: None,
        }
    }

    fn init_viewer(&mut self, event_loop: &ActiveEventLoop) -> Result<(), AppError> {
        let [width, height] = self.config.window_size;
        let window_attrs = WindowAttributes::default()
            .with_title(self.config.window_title.clone())
            .with_inner_size(PhysicalSize::new(width, height))
            .with_resizable(true);
        let window = Arc::new(event_loop.create_window(window_attrs)?);

        let render = RenderContext::new(Arc::clone(&window), self.config.shadow_map_size)?;
        let egui = EguiHost::new(&window);

        let size = window.inner_size();
        let aspect = size.width.max(1) as f32 / size.height.max(1) as f32;
        let scene = Scene::new(self.config.background(), self.config.shadow_map_size);
        let color = Rgb::from_hex(&self.config.initial_color_hex()).unwrap_or_default();
        let mut session =
            ViewportSession::new(scene, aspect, color, self.config.initial_material);
        session.begin_load(
            resolve_model_path(&self.config.model_path),
            self.proxy.clone(),
        );

        self.update_target_frame_duration(&window);
        self.render = Some(render);
        self.egui = Some(egui);
        self.session = Some(session);
        self.window = Some(window);
        Ok(())
    }

    fn update_target_frame_duration(&mut self, window: &Window) {
        let mut target = Duration::from_millis(16);
        if let Some(millihz) = window
            .current_monitor()
            .and_then(|monitor| monitor.refresh_rate_millihertz())
        {
            let hz = millihz as f32 / 1000.0;
            if hz > 1.0 {
                target = Duration::from_secs_f32(1.0 / hz);
            }
        }
        self.target_frame_duration = target;
        self.next_frame_time = Instant::now() + self.target_frame_duration;
    }

    fn handle_resize(&mut self, new_size: PhysicalSize<u32>) {
        if let Some(session) = &mut self.session {
            session.resize(new_size.width, new_size.height);
        }
        if let Some(render) = &mut self.render {
            render.resize(new_size);
        }
    }

    fn handle_mouse_button(&mut self, button: MouseButton, state: ElementState) {
        if button != MouseButton::Left {
            return;
        }
        let over_ui = self.egui.as_ref().is_some_and(EguiHost::wants_pointer);
        let Some(session) = &mut self.session else {
            return;
        };
        match state {
            ElementState::Pressed if !over_ui => session.pointer_down(self.cursor),
            ElementState::Pressed => {}
            ElementState::Released => session.pointer_up(),
        }
        self.sync_cursor_icon();
    }

    fn sync_cursor_icon(&self) {
        let (Some(window), Some(session)) = (self.window.as_ref(), self.session.as_ref()) else {
            return;
        };
        let icon = if session.is_dragging() {
            CursorIcon::Grabbing
        } else {
            CursorIcon::Default
        };
        window.set_cursor(icon);
    }

    fn redraw(&mut self, event_loop: &ActiveEventLoop) {
        let (Some(window), Some(egui), Some(session)) =
            (self.window.as_ref(), self.egui.as_mut(), self.session.as_mut())
        else {
            return;
        };
        if session.is_disposed() {
            return;
        }

        let color_hex = session.color_hex();
        let status = session.status().to_string();
        let view = PanelView {
            properties: session.properties(),
            color_hex: &color_hex,
            status: &status,
            loading: session.is_loading(),
        };
        let ui = &mut self.ui;
        let mut actions = Vec::new();
        let frame = egui.run(window, |ctx| actions = ui.show(ctx, view));
        for action in actions {
            match action {
                UiAction::SetColor(hex) => session.apply_color(&hex),
                UiAction::SetMaterial(properties) => session.apply_material_properties(properties),
            }
        }

        let Some(render) = &mut self.render else {
            return;
        };
        if let Err(err) = render.render(session, &frame) {
            log::error!("Rendering failed: {err}");
            self.failure = Some(err.into());
            self.teardown();
            event_loop.exit();
        }
    }

    /// Cancels loading and releases GPU and UI resources. Safe to call twice.
    fn teardown(&mut self) {
        if let Some(session) = &mut self.session {
            if session.dispose() {
                log::info!("Viewer disposed");
            }
        }
        self.egui = None;
        self.render = None;
    }
}

impl ApplicationHandler<UserEvent> for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }
        if let Err(err) = self.init_viewer(event_loop) {
            log::error!("Failed to start viewer: {err}");
            self.failure = Some(err);
            self.teardown();
            event_loop.exit();
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        if let (Some(window), Some(egui)) = (self.window.as_ref(), self.egui.as_mut()) {
            egui.on_window_event(window, &event);
        }

        match event {
            WindowEvent::CloseRequested => {
                self.teardown();
                event_loop.exit();
            }
            WindowEvent::KeyboardInput { event, .. } => {
                if event.state == ElementState::Pressed
                    && event.physical_key == PhysicalKey::Code(KeyCode::Escape)
                {
                    self.teardown();
                    event_loop.exit();
                }
            }
            WindowEvent::Focused(false) => {
                if let Some(session) = &mut self.session {
                    session.pointer_up();
                }
                self.sync_cursor_icon();
            }
            WindowEvent::Resized(new_size) => {
                self.handle_resize(new_size);
                if let Some(window) = self.window.clone() {
                    self.update_target_frame_duration(&window);
                }
            }
            WindowEvent::Moved(_) => {
                if let Some(window) = self.window.clone() {
                    self.update_target_frame_duration(&window);
                }
            }
            WindowEvent::CursorMoved { position, .. } => {
                self.cursor = Vec2::new(position.x as f32, position.y as f32);
                if let Some(session) = &mut self.session {
                    session.pointer_move(self.cursor);
                }
            }
            WindowEvent::MouseInput { state, button, .. } => {
                self.handle_mouse_button(button, state);
            }
            WindowEvent::MouseWheel { delta, .. } => {
                let over_ui = self.egui.as_ref().is_some_and(EguiHost::wants_pointer);
                if let Some(session) = self.session.as_mut().filter(|_| !over_ui) {
                    session.wheel(wheel_delta_pixels(delta));
                }
            }
            WindowEvent::RedrawRequested => {
                self.redraw(event_loop);
            }
            _ => {}
        }
    }

    fn user_event(&mut self, _event_loop: &ActiveEventLoop, event: UserEvent) {
        match event {
            UserEvent::Load(event) => {
                let Some(session) = &mut self.session else {
                    return;
                };
                if session.handle_load_event(event) {
                    if let Some(window) = &self.window {
                        window.request_redraw();
                    }
                }
            }
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        let now = Instant::now();
        if now >= self.next_frame_time {
            if let Some(window) = &self.window {
                window.request_redraw();
            }
            self.next_frame_time = now + self.target_frame_duration;
        }
        event_loop.set_control_flow(ControlFlow::WaitUntil(self.next_frame_time));
    }

    fn exiting(&mut self, _event_loop: &ActiveEventLoop) {
        self.teardown();
    }
}

pub fn run() -> Result<(), AppError> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let config = ViewerConfig::resolve()?;
    log::info!("{} - model {}", config.window_title, config.model_path.display());
    log::info!("   Drag to rotate, scroll to zoom, ESC to exit");

    let event_loop = EventLoop::<UserEvent>::with_user_event().build()?;
    event_loop.set_control_flow(ControlFlow::Wait);

    let mut app = App::new(config, event_loop.create_proxy());
    event_loop.run_app(&mut app)?;

    log::info!("Goodbye!");
    match app.failure.take() {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

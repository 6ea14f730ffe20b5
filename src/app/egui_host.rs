use winit::event::WindowEvent;
use winit::window::Window;

/// Tessellated panels ready for the GPU.
pub struct EguiFrame {
    pub primitives: Vec<egui::ClippedPrimitive>,
    pub textures_delta: egui::TexturesDelta,
    pub pixels_per_point: f32,
}

/// egui context plus its winit adapter.
pub struct EguiHost {
    context: egui::Context,
    winit_state: egui_winit::State,
}

impl EguiHost {
    pub fn new(window: &Window) -> Self {
        let context = egui::Context::default();
        let winit_state = egui_winit::State::new(
            context.clone(),
            egui::ViewportId::ROOT,
            window,
            Some(window.scale_factor() as f32),
            None,
            None,
        );
        Self {
            context,
            winit_state,
        }
    }

    /// Returns whether egui consumed the event.
    pub fn on_window_event(&mut self, window: &Window, event: &WindowEvent) -> bool {
        self.winit_state.on_window_event(window, event).consumed
    }

    /// True while the pointer is over a panel or dragging one of its widgets.
    pub fn wants_pointer(&self) -> bool {
        self.context.is_pointer_over_area() || self.context.wants_pointer_input()
    }

    pub fn run<F>(&mut self, window: &Window, build: F) -> EguiFrame
    where
        F: FnMut(&egui::Context),
    {
        let raw_input = self.winit_state.take_egui_input(window);
        let output = self.context.run(raw_input, build);
        self.winit_state
            .handle_platform_output(window, output.platform_output);
        let pixels_per_point = output.pixels_per_point;
        EguiFrame {
            primitives: self.context.tessellate(output.shapes, pixels_per_point),
            textures_delta: output.textures_delta,
            pixels_per_point,
        }
    }
}

use crate::app::EguiFrame;

/// Draws the tessellated panels on top of the 3D pass.
pub struct EguiOverlay {
    renderer: egui_wgpu::Renderer,
}

impl EguiOverlay {
    pub fn new(device: &wgpu::Device, format: wgpu::TextureFormat) -> Self {
        Self {
            renderer: egui_wgpu::Renderer::new(device, format, None, 1, false),
        }
    }

    /// Uploads texture deltas and vertex data. Returns extra command buffers
    /// from paint callbacks, which must be submitted before the frame.
    pub fn prepare(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        encoder: &mut wgpu::CommandEncoder,
        frame: &EguiFrame,
        size_in_pixels: [u32; 2],
    ) -> Vec<wgpu::CommandBuffer> {
        for (id, delta) in &frame.textures_delta.set {
            self.renderer.update_texture(device, queue, *id, delta);
        }
        self.renderer.update_buffers(
            device,
            queue,
            encoder,
            &frame.primitives,
            &screen_descriptor(frame, size_in_pixels),
        )
    }

    pub fn paint(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        target: &wgpu::TextureView,
        frame: &EguiFrame,
        size_in_pixels: [u32; 2],
    ) {
        let pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("egui pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: target,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Load,
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
        });
        self.renderer.render(
            &mut pass.forget_lifetime(),
            &frame.primitives,
            &screen_descriptor(frame, size_in_pixels),
        );
    }

    /// Releases textures egui no longer references. Call after submit.
    pub fn finish(&mut self, frame: &EguiFrame) {
        for id in &frame.textures_delta.free {
            self.renderer.free_texture(id);
        }
    }
}

fn screen_descriptor(frame: &EguiFrame, size_in_pixels: [u32; 2]) -> egui_wgpu::ScreenDescriptor {
    egui_wgpu::ScreenDescriptor {
        size_in_pixels,
        pixels_per_point: frame.pixels_per_point,
    }
}

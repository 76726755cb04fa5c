use crate::app_state::State;
use crate::layers::FALLBACK_BACKGROUND;

impl State {
    pub fn render(&mut self) -> Result<(), wgpu::SurfaceError> {
        let output = self.gpu.surface.get_current_texture()?;
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let mut encoder = self
            .gpu
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Render Encoder"),
            });

        let clear = |c: u8| c as f64 / 255.0;
        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Canvas Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color {
                            r: clear(FALLBACK_BACKGROUND.r),
                            g: clear(FALLBACK_BACKGROUND.g),
                            b: clear(FALLBACK_BACKGROUND.b),
                            a: 1.0,
                        }),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                occlusion_query_set: None,
                timestamp_writes: None,
            });

            render_pass.set_pipeline(&self.gpu.blit_pipeline);
            render_pass.set_bind_group(0, &self.canvas_texture.bind_group, &[]);
            render_pass.set_vertex_buffer(0, self.quad.vertex.slice(..));
            render_pass.set_index_buffer(self.quad.index.slice(..), wgpu::IndexFormat::Uint16);
            render_pass.draw_indexed(0..self.quad.count, 0, 0..1);
        }

        self.gpu.queue.submit(std::iter::once(encoder.finish()));
        output.present();

        Ok(())
    }
}

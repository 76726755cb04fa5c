use wgpu::{BindGroupLayout, Buffer, Device, Queue, RenderPipeline, Surface, SurfaceConfiguration};
use winit::keyboard::ModifiersState;

use crate::raster::Point;

pub struct GpuContext<'a> {
    pub surface: Surface<'a>,
    pub device: Device,
    pub queue: Queue,
    pub config: SurfaceConfiguration,
    pub blit_pipeline: RenderPipeline,
    pub texture_layout: BindGroupLayout,
}

pub struct QuadBuffers {
    pub vertex: Buffer,
    pub index: Buffer,
    pub count: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerSource {
    Mouse,
    Touch(u64),
}

#[derive(Debug, Default)]
pub struct InputState {
    /// Last pointer position in logical pixels.
    pub pointer: Point,
    pub modifiers: ModifiersState,
    /// Device holding the active stroke, if any.
    pub active: Option<PointerSource>,
}

//! 构建一个典型的 deferred 帧（G-Buffer、光照、后处理、UI、呈现），输出 RDG 的执行计划
//!
//! 物理资源都是假的句柄，命令录制到 `RdgCommandLog` 中，不需要 GPU。
//!
//! 用法：`rdg_plan [config.toml]`

use std::cell::Cell;
use std::rc::Rc;

use anyhow::{Context, Result};
use ash::vk::{self, Handle};
use truvis_crate_tools::init_log::init_log;
use truvis_rdg::{
    RdgAccessState, RdgBuffer, RdgCommandLog, RdgConfig, RdgImage, RdgPass, RdgPhysicalResource, RdgPipelineBinding,
    RdgResourceFlags, RenderDependencyGraph,
};

const FRAMES: usize = 3;

/// 一帧需要的所有物理资源
struct FakeFrameResources {
    albedo: Rc<RdgImage>,
    normal: Rc<RdgImage>,
    depth: Rc<RdgImage>,
    hdr: Rc<RdgImage>,
    swapchain: Vec<Rc<RdgImage>>,

    camera: Rc<RdgBuffer>,
    lights: Rc<RdgBuffer>,
    ui_vertices: Rc<RdgBuffer>,
}

impl FakeFrameResources {
    fn new() -> Self {
        let image = |raw: u64, format: vk::Format| Rc::new(RdgImage::new(vk::Image::from_raw(raw), format));
        let buffer = |raw: u64, size: vk::DeviceSize| Rc::new(RdgBuffer::new(vk::Buffer::from_raw(raw), size));

        Self {
            albedo: image(0x10, vk::Format::R8G8B8A8_UNORM),
            normal: image(0x11, vk::Format::R16G16B16A16_SFLOAT),
            depth: image(0x12, vk::Format::D32_SFLOAT),
            hdr: image(0x13, vk::Format::R16G16B16A16_SFLOAT),
            swapchain: (0..FRAMES as u64).map(|i| image(0x100 + i, vk::Format::B8G8R8A8_UNORM)).collect(),

            camera: buffer(0x20, 256),
            lights: buffer(0x21, 64 * 1024),
            ui_vertices: buffer(0x22, vk::WHOLE_SIZE),
        }
    }
}

fn image_resolver(image: &Rc<RdgImage>) -> impl Fn() -> Option<RdgPhysicalResource> + use<> {
    let image = image.clone();
    move || Some(RdgPhysicalResource::Image(image.clone()))
}

fn buffer_resolver(buffer: &Rc<RdgBuffer>) -> impl Fn() -> Option<RdgPhysicalResource> + use<> {
    let buffer = buffer.clone();
    move || Some(RdgPhysicalResource::Buffer(buffer.clone()))
}

fn load_config() -> Result<RdgConfig> {
    match std::env::args().nth(1) {
        Some(path) => RdgConfig::from_file(&path).with_context(|| format!("loading rdg config from {path}")),
        None => Ok(RdgConfig { print_plan_on_bake: true, ..Default::default() }),
    }
}

fn main() -> Result<()> {
    init_log();

    #[cfg(feature = "profiling")]
    tracy_client::Client::start();

    let config = load_config()?;
    log::info!("rdg config: {:?}", config);

    let res = FakeFrameResources::new();
    let swapchain_index = Cell::new(0usize);

    let mut graph = RenderDependencyGraph::with_config(config);

    let albedo = graph.make_named_resource("gbuffer-albedo", image_resolver(&res.albedo), RdgResourceFlags::empty());
    let normal = graph.make_named_resource("gbuffer-normal", image_resolver(&res.normal), RdgResourceFlags::empty());
    let depth = graph.make_named_resource("depth", image_resolver(&res.depth), RdgResourceFlags::empty());
    let hdr = graph.make_named_resource("hdr", image_resolver(&res.hdr), RdgResourceFlags::empty());
    let camera = graph.make_named_resource("camera-ubo", buffer_resolver(&res.camera), RdgResourceFlags::empty());
    let lights = graph.make_named_resource("light-list", buffer_resolver(&res.lights), RdgResourceFlags::empty());
    let ui_vertices =
        graph.make_named_resource("ui-vertices", buffer_resolver(&res.ui_vertices), RdgResourceFlags::empty());
    let swapchain = graph.make_named_resource(
        "swapchain",
        || Some(RdgPhysicalResource::Image(res.swapchain[swapchain_index.get()].clone())),
        RdgResourceFlags::PER_FRAME,
    );

    let gbuffer_pipeline = RdgPipelineBinding::graphics(vk::Pipeline::from_raw(0x1000));
    let culling_pipeline = RdgPipelineBinding::compute(vk::Pipeline::from_raw(0x1001));
    let lighting_pipeline = RdgPipelineBinding::compute(vk::Pipeline::from_raw(0x1002));
    let tonemap_pipeline = RdgPipelineBinding::compute(vk::Pipeline::from_raw(0x1003));
    let ui_pipeline = RdgPipelineBinding::graphics(vk::Pipeline::from_raw(0x1004));

    let camera_vertex_read =
        RdgAccessState::buffer(vk::PipelineStageFlags2::VERTEX_SHADER, vk::AccessFlags2::UNIFORM_READ);

    graph.add_pass(RdgPass::new("gpu-timestamp", |encoder| encoder.insert_label("write timestamp")));
    graph.add_pass(
        RdgPass::new("upload-camera", |encoder| encoder.insert_label("copy camera"))
            .write(camera, RdgAccessState::TRANSFER_DST_BUFFER),
    );
    graph.add_pass(
        RdgPass::new("gbuffer", |encoder| encoder.insert_label("draw scene"))
            .read(camera, camera_vertex_read)
            .write_discard(albedo, RdgAccessState::COLOR_ATTACHMENT_WRITE)
            .write_discard(normal, RdgAccessState::COLOR_ATTACHMENT_WRITE)
            .write_discard(depth, RdgAccessState::DEPTH_ATTACHMENT_WRITE)
            .with_pipeline(gbuffer_pipeline),
    );
    graph.add_pass(
        RdgPass::new("light-culling", |encoder| encoder.insert_label("dispatch tiles"))
            .read(depth, RdgAccessState::SHADER_READ_COMPUTE)
            .read(camera, RdgAccessState::UNIFORM_COMPUTE)
            .write(lights, RdgAccessState::STORAGE_BUFFER_WRITE_COMPUTE)
            .with_pipeline(culling_pipeline),
    );
    graph.add_pass(
        RdgPass::new("lighting", |encoder| encoder.insert_label("dispatch lighting"))
            .read(albedo, RdgAccessState::SHADER_READ_COMPUTE)
            .read(normal, RdgAccessState::SHADER_READ_COMPUTE)
            .read(depth, RdgAccessState::SHADER_READ_COMPUTE)
            .read(lights, RdgAccessState::STORAGE_BUFFER_READ_COMPUTE)
            .write_discard(hdr, RdgAccessState::STORAGE_WRITE_COMPUTE)
            .with_pipeline(lighting_pipeline),
    );
    graph.add_pass(
        RdgPass::new("tonemap", |encoder| encoder.insert_label("dispatch tonemap"))
            .read(hdr, RdgAccessState::SHADER_READ_COMPUTE)
            .write_discard(swapchain, RdgAccessState::STORAGE_WRITE_COMPUTE)
            .with_pipeline(tonemap_pipeline),
    );
    graph.add_pass(
        RdgPass::new("ui", |encoder| encoder.insert_label("draw imgui"))
            .read(ui_vertices, RdgAccessState::VERTEX_BUFFER)
            .read_write(swapchain, RdgAccessState::COLOR_ATTACHMENT_READ_WRITE)
            .with_pipeline(ui_pipeline),
    );
    graph.add_pass(RdgPass::new("present", |_| {}).read(swapchain, RdgAccessState::PRESENT));

    for frame in 0..FRAMES {
        swapchain_index.set(frame % res.swapchain.len());

        let stats = graph.bake();
        if frame == 0 {
            // 只在第一帧输出计划，之后的帧结构相同
            graph.set_config(RdgConfig { print_plan_on_bake: false, ..graph.config().clone() });
        }

        let mut recorded = RdgCommandLog::new();
        graph.try_render(&mut recorded).with_context(|| format!("rendering frame {frame}"))?;

        log::info!(
            "frame {}: swapchain image #{} -> {} stages, {} barriers ({} patched), {} commands recorded",
            frame,
            swapchain_index.get(),
            stats.stages,
            stats.buffer_barriers + stats.image_barriers,
            stats.patched_barriers,
            recorded.commands().len()
        );

        #[cfg(feature = "profiling")]
        tracy_client::frame_mark();
    }

    log::info!("final swapchain layout: {:?}", res.swapchain[swapchain_index.get()].current_layout());
    Ok(())
}

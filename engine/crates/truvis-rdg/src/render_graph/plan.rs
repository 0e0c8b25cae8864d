//! 执行计划的调试输出

use ash::vk;
use itertools::Itertools;

use super::access::RdgAccessState;
use super::pass::RdgPass;
use super::resource_registry::RdgResourceRegistry;
use super::scheduler::RdgStage;

const STAGE_NAMES: &[(vk::PipelineStageFlags2, &str)] = &[
    (vk::PipelineStageFlags2::TOP_OF_PIPE, "TOP_OF_PIPE"),
    (vk::PipelineStageFlags2::DRAW_INDIRECT, "DRAW_INDIRECT"),
    (vk::PipelineStageFlags2::VERTEX_INPUT, "VERTEX_INPUT"),
    (vk::PipelineStageFlags2::INDEX_INPUT, "INDEX_INPUT"),
    (vk::PipelineStageFlags2::VERTEX_SHADER, "VERTEX_SHADER"),
    (vk::PipelineStageFlags2::EARLY_FRAGMENT_TESTS, "EARLY_FRAGMENT_TESTS"),
    (vk::PipelineStageFlags2::FRAGMENT_SHADER, "FRAGMENT_SHADER"),
    (vk::PipelineStageFlags2::LATE_FRAGMENT_TESTS, "LATE_FRAGMENT_TESTS"),
    (vk::PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT, "COLOR_ATTACHMENT_OUTPUT"),
    (vk::PipelineStageFlags2::COMPUTE_SHADER, "COMPUTE_SHADER"),
    (vk::PipelineStageFlags2::TRANSFER, "TRANSFER"),
    (vk::PipelineStageFlags2::RAY_TRACING_SHADER_KHR, "RAY_TRACING_SHADER"),
    (vk::PipelineStageFlags2::ACCELERATION_STRUCTURE_BUILD_KHR, "ACCEL_STRUCT_BUILD"),
    (vk::PipelineStageFlags2::BOTTOM_OF_PIPE, "BOTTOM_OF_PIPE"),
    (vk::PipelineStageFlags2::ALL_GRAPHICS, "ALL_GRAPHICS"),
    (vk::PipelineStageFlags2::ALL_COMMANDS, "ALL_COMMANDS"),
];

const ACCESS_NAMES: &[(vk::AccessFlags2, &str)] = &[
    (vk::AccessFlags2::INDIRECT_COMMAND_READ, "INDIRECT_CMD_READ"),
    (vk::AccessFlags2::INDEX_READ, "INDEX_READ"),
    (vk::AccessFlags2::VERTEX_ATTRIBUTE_READ, "VERTEX_ATTR_READ"),
    (vk::AccessFlags2::UNIFORM_READ, "UNIFORM_READ"),
    (vk::AccessFlags2::SHADER_SAMPLED_READ, "SHADER_SAMPLED_READ"),
    (vk::AccessFlags2::SHADER_STORAGE_READ, "STORAGE_READ"),
    (vk::AccessFlags2::SHADER_STORAGE_WRITE, "STORAGE_WRITE"),
    (vk::AccessFlags2::COLOR_ATTACHMENT_READ, "COLOR_ATTACH_READ"),
    (vk::AccessFlags2::COLOR_ATTACHMENT_WRITE, "COLOR_ATTACH_WRITE"),
    (vk::AccessFlags2::DEPTH_STENCIL_ATTACHMENT_READ, "DEPTH_ATTACH_READ"),
    (vk::AccessFlags2::DEPTH_STENCIL_ATTACHMENT_WRITE, "DEPTH_ATTACH_WRITE"),
    (vk::AccessFlags2::TRANSFER_READ, "TRANSFER_READ"),
    (vk::AccessFlags2::TRANSFER_WRITE, "TRANSFER_WRITE"),
    (vk::AccessFlags2::MEMORY_READ, "MEMORY_READ"),
    (vk::AccessFlags2::MEMORY_WRITE, "MEMORY_WRITE"),
];

/// 格式化 PipelineStageFlags2 为可读字符串
pub(crate) fn format_pipeline_stage(stage: vk::PipelineStageFlags2) -> String {
    let names = STAGE_NAMES.iter().filter(|(flag, _)| stage.contains(*flag)).map(|(_, name)| *name).collect_vec();
    if names.is_empty() { format!("{:?}", stage) } else { names.join(" | ") }
}

/// 格式化 AccessFlags2 为可读字符串
pub(crate) fn format_access_flags(access: vk::AccessFlags2) -> String {
    if access == vk::AccessFlags2::NONE {
        return "NONE".to_string();
    }
    let names = ACCESS_NAMES.iter().filter(|(flag, _)| access.contains(*flag)).map(|(_, name)| *name).collect_vec();
    if names.is_empty() { format!("{:?}", access) } else { names.join(" | ") }
}

fn format_transition(src: &RdgAccessState, dst: &RdgAccessState, with_layout: bool) -> Vec<String> {
    let mut lines = Vec::with_capacity(3);
    if with_layout {
        if src.layout != dst.layout {
            lines.push(format!("│       Layout: {:?} → {:?}", src.layout, dst.layout));
        } else {
            lines.push(format!("│       Layout: {:?} (no layout change)", src.layout));
        }
    }
    lines.push(format!("│       Stage:  {} → {}", format_pipeline_stage(src.stage), format_pipeline_stage(dst.stage)));
    lines.push(format!("│       Access: {} → {}", format_access_flags(src.access), format_access_flags(dst.access)));
    lines
}

/// 生成执行计划的每一行
pub(crate) fn plan_lines(stages: &[RdgStage], passes: &[RdgPass<'_>], registry: &RdgResourceRegistry<'_>) -> Vec<String> {
    let mut lines = Vec::new();

    lines.push("╔══════════════════════════════════════════════════════════════════╗".to_string());
    lines.push("║              Render Dependency Graph Plan                        ║".to_string());
    lines.push("╠══════════════════════════════════════════════════════════════════╣".to_string());
    lines.push(format!(
        "║ Resources: {}  |  Passes: {}  |  Stages: {}",
        registry.len(),
        passes.len(),
        stages.len()
    ));
    lines.push("╚══════════════════════════════════════════════════════════════════╝".to_string());

    for (stage_idx, stage) in stages.iter().enumerate() {
        lines.push(String::new());
        lines.push("┌─────────────────────────────────────────────────────────────────┐".to_string());
        lines.push(format!(
            "│ Stage {}: [{}]",
            stage_idx,
            stage.passes.iter().map(|&p| passes[p].name.as_str()).join(", ")
        ));
        lines.push("├─────────────────────────────────────────────────────────────────┤".to_string());

        if stage.has_barriers() {
            lines.push(format!(
                "│ Barriers: {} image, {} buffer",
                stage.image_barriers.len(),
                stage.buffer_barriers.len()
            ));
            for barrier in &stage.image_barriers {
                lines.push(format!(
                    "│   🔒 Image \"{}\" (pass \"{}\" #{})",
                    registry.name_of(barrier.resource),
                    passes[barrier.origin.pass].name,
                    barrier.origin.access
                ));
                lines.extend(format_transition(&barrier.src, &barrier.dst, true));
            }
            for barrier in &stage.buffer_barriers {
                lines.push(format!(
                    "│   🔒 Buffer \"{}\" (pass \"{}\" #{})",
                    registry.name_of(barrier.resource),
                    passes[barrier.origin.pass].name,
                    barrier.origin.access
                ));
                lines.extend(format_transition(&barrier.src, &barrier.dst, false));
            }
        } else {
            lines.push("│ No barriers required".to_string());
        }

        for &pass_idx in &stage.passes {
            let pass = &passes[pass_idx];
            lines.push("├─────────────────────────────────────────────────────────────────┤".to_string());
            lines.push(format!("│ Pass #{}: \"{}\"", pass_idx, pass.name));
            for access in &pass.accesses {
                let icon = if access.is_pure_read() { "📖" } else { "✏️ " };
                lines.push(format!(
                    "│   {} \"{}\" @ {:?} (stage: {}, access: {}, flags: {:?})",
                    icon,
                    registry.name_of(access.resource),
                    access.state.layout,
                    format_pipeline_stage(access.state.stage),
                    format_access_flags(access.state.access),
                    access.flags
                ));
            }
        }

        lines.push("└─────────────────────────────────────────────────────────────────┘".to_string());
    }

    lines.push(String::new());
    lines.push("═══════════════════════ End of Execution Plan ═══════════════════════".to_string());
    lines
}

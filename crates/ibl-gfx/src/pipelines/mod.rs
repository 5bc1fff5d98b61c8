pub mod graphics_pipeline;
pub mod pipeline_cache;
pub mod render_pass;
pub mod shader;

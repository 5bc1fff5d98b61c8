pub mod descriptor_pool;
pub mod descriptor_set_info;
pub mod sampler;

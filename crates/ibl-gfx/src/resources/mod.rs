pub mod handles;
pub mod image_state;
pub mod manager;
pub mod resource_data;

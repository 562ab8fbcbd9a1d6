pub mod camera_frame_source;
pub mod file_device_catalog;
pub mod image_sequence_device;

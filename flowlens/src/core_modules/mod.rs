pub mod colour_filters;
pub mod face_region;
pub mod filter;
pub mod flow_tracker;
pub mod frame;
pub mod frame_diff;
pub mod kernel;
pub mod optical_flow;
pub mod pixel;
pub mod spatial_filters;

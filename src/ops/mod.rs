pub mod remove_bg;
pub mod shapes;
pub mod transform;

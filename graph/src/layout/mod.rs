pub mod engine;

pub use engine::{LayoutConfig, LayoutEngine};

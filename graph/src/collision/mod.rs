pub mod resolver;

pub use resolver::{CollisionConfig, CollisionResolver, NodeBox};

pub mod collect;
pub mod health;

pub use collect::{handle_collect, metric_types};
pub use health::health;

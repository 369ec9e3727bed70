pub mod json;

pub use json::{CollectionJson, JsonFormatter};

pub mod generator;
pub mod http;
pub mod parse;
pub mod prompt;

pub mod mock;

pub use generator::{GenerateOptions, Generator};
pub use http::HttpGenerator;
pub use mock::MockGenerator;

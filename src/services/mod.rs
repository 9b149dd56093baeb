pub mod calculations;
pub mod loader;
pub mod matcher;
pub mod pipeline;
pub mod ranker;

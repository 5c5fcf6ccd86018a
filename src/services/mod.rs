pub mod engine;
pub mod grammar;
pub mod inference;
pub mod preprocess;
pub mod processor;
pub mod queue;
pub mod traits;

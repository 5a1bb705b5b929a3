pub mod dispatch;
pub mod mapper;
pub mod planner;
pub mod processor;
pub mod query;

pub use dispatch::JobDispatcher;
pub use processor::JobProcessor;

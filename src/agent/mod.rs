pub mod orchestrator;
pub mod system_prompt;

pub use orchestrator::StoreAgent;

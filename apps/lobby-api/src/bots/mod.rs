pub mod completions;
pub mod orchestrator;

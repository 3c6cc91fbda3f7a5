pub mod encoder;
pub mod llm;
pub mod narration;
pub mod publisher;
pub mod resources;
pub mod script;
pub mod workflow;

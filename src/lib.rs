pub mod activity;
pub mod agents;
pub mod config;
pub mod evaluation;
pub mod llm;
pub mod logging;
pub mod prompt;
pub mod storage;
pub mod story;
pub mod workflow;

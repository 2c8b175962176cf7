use anyhow::Result;
use novelist::activity::LogSink;
use novelist::agents::create_agents;
use novelist::config::Config;
use novelist::llm::create_llm;
use novelist::logging;
use novelist::storage::{DraftStore, NativeStorage};
use novelist::story::StorySeed;
use novelist::workflow::{WorkflowManager, WorkflowStatus};
use std::path::Path;
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Config and story seed must both be valid before any agent runs.
    let config = match Config::load() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Error loading config: {:#}", e);
            eprintln!("Please ensure 'config.yml' exists with valid LLM settings.");
            return Err(e);
        }
    };
    config.ensure_directories()?;
    let log_path = logging::init(&config.output_folder)?;
    log::info!("Logging to {}", log_path.display());
    let seed = StorySeed::load(Path::new(&config.story_seed))?;

    // 2. Agents share one LLM client.
    let llm = create_llm(&config.llm)?;
    let store = DraftStore::new(config.output_folder.clone(), Arc::new(NativeStorage::new()));
    let mut manager = WorkflowManager::new(config.workflow.clone(), store, Arc::new(LogSink));
    for (role, agent) in create_agents(&config.agents, llm) {
        manager.register_agent(role, agent);
    }
    manager.set_story_seed(seed);

    // 3. Run
    let report = manager.run().await?;
    let path = report.output_path.as_deref().unwrap_or("-");
    match report.status {
        WorkflowStatus::Accepted => {
            println!(
                "Story accepted (score {:.1}), saved to {}",
                report.last_score.unwrap_or_default(),
                path
            );
        }
        WorkflowStatus::Exhausted => {
            println!(
                "Revision budget spent after {} cycles, last draft saved to {}",
                report.revision_count, path
            );
        }
        WorkflowStatus::Failed => {
            anyhow::bail!(
                "Workflow produced no draft to save ({} restarts, {} revisions)",
                report.restart_count,
                report.revision_count
            );
        }
    }
    Ok(())
}

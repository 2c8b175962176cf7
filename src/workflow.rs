use crate::activity::{Activity, ActivitySink, Level};
use crate::agents::{Agent, AgentRole, AgentTask};
use crate::config::WorkflowConfig;
use crate::evaluation::Evaluation;
use crate::prompt;
use crate::storage::DraftStore;
use crate::story::{Outline, StorySeed};
use anyhow::{Context, Result};
use std::collections::HashMap;
use std::sync::Arc;

const EMPTY_INPUT_RATIONALE: &str = "内容或大纲为空，无法评估";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkflowStatus {
    /// A draft reached the acceptance threshold.
    Accepted,
    /// The revision budget ran out; the last draft was saved as is.
    Exhausted,
    /// Nothing worth saving came out of the run.
    Failed,
}

#[derive(Debug, Clone)]
pub struct WorkflowReport {
    pub status: WorkflowStatus,
    pub final_draft: Option<String>,
    pub output_path: Option<String>,
    pub last_score: Option<f64>,
    pub revision_count: usize,
    pub restart_count: usize,
}

enum EditingOutcome {
    Accepted(Evaluation),
    Restart(Evaluation),
    Exhausted(Option<Evaluation>),
}

/// Drives creator → writer → (editor → supervisor)* with bounded revision
/// and editing cycles.
///
/// `current_draft == None` means the next pass has to start over from a new
/// outline. The first outline of a run is kept as the baseline every later
/// evaluation is measured against, restarts included.
pub struct WorkflowManager {
    config: WorkflowConfig,
    agents: HashMap<AgentRole, Arc<dyn Agent>>,
    store: DraftStore,
    activity: Arc<dyn ActivitySink>,
    story_seed: Option<StorySeed>,
    current_draft: Option<String>,
    original_outline: Option<Outline>,
    revision_count: usize,
    editing_count: usize,
    restart_count: usize,
}

impl WorkflowManager {
    pub fn new(config: WorkflowConfig, store: DraftStore, activity: Arc<dyn ActivitySink>) -> Self {
        Self {
            config,
            agents: HashMap::new(),
            store,
            activity,
            story_seed: None,
            current_draft: None,
            original_outline: None,
            revision_count: 0,
            editing_count: 0,
            restart_count: 0,
        }
    }

    pub fn register_agent(&mut self, role: AgentRole, agent: Arc<dyn Agent>) {
        self.log(Level::Info, "workflow", "register", format!("{} -> {}", role, agent.name()));
        self.agents.insert(role, agent);
    }

    pub fn set_story_seed(&mut self, seed: StorySeed) {
        self.story_seed = Some(seed);
    }

    pub fn current_draft(&self) -> Option<&str> {
        self.current_draft.as_deref()
    }

    pub fn original_outline(&self) -> Option<&Outline> {
        self.original_outline.as_ref()
    }

    pub fn revision_count(&self) -> usize {
        self.revision_count
    }

    pub fn editing_count(&self) -> usize {
        self.editing_count
    }

    pub fn restart_count(&self) -> usize {
        self.restart_count
    }

    fn log(&self, level: Level, source: &str, action: &str, message: impl Into<String>) {
        self.activity.record(Activity {
            level,
            source: source.to_string(),
            action: action.to_string(),
            message: message.into(),
        });
    }

    fn agent(&self, role: AgentRole) -> Result<Arc<dyn Agent>> {
        self.agents
            .get(&role)
            .cloned()
            .with_context(|| format!("Agent not registered: {}", role))
    }

    async fn call(&self, role: AgentRole, prompt: String) -> Result<String> {
        let agent = self.agent(role)?;
        self.log(Level::Info, role.as_str(), "start", format!("{} working", agent.name()));
        let result = agent.execute(&AgentTask::new(prompt)).await?;
        let detail = result
            .metadata
            .as_ref()
            .map(|meta| {
                let mut pairs: Vec<String> =
                    meta.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
                pairs.sort();
                format!(" [{}]", pairs.join(", "))
            })
            .unwrap_or_default();
        self.log(
            Level::Info,
            role.as_str(),
            "done",
            format!(
                "{} returned {} chars{}",
                agent.name(),
                result.content.chars().count(),
                detail
            ),
        );
        Ok(result.content)
    }

    /// Best effort: a failed write is logged and the run goes on.
    async fn keep_intermediate(&self, role: AgentRole, content: &str) {
        if content.trim().is_empty() {
            return;
        }
        match self.store.save_intermediate(content).await {
            Ok(path) => self.log(Level::Info, role.as_str(), "draft", format!("Draft saved to {}", path)),
            Err(e) => self.log(Level::Warn, role.as_str(), "draft", format!("Failed to save draft: {:#}", e)),
        }
    }

    /// Scores `content` against `outline` through the supervisor. Missing
    /// input scores 0 without an agent call.
    pub async fn evaluate_content(
        &self,
        outline: Option<&Outline>,
        content: Option<&str>,
    ) -> Result<Evaluation> {
        let (outline, content) = match (outline, content) {
            (Some(o), Some(c)) if !c.trim().is_empty() => (o, c),
            _ => {
                self.log(Level::Warn, "supervisor", "evaluate", EMPTY_INPUT_RATIONALE);
                return Ok(Evaluation::rejected(EMPTY_INPUT_RATIONALE));
            }
        };

        let reply = self
            .call(AgentRole::Supervisor, prompt::evaluation_prompt(outline, content))
            .await?;
        let evaluation = Evaluation::parse(&reply);
        if !evaluation.readable {
            self.log(
                Level::Warn,
                "supervisor",
                "evaluate",
                "No readable score in evaluation, treating as 0",
            );
        }
        self.log(
            Level::Info,
            "supervisor",
            "evaluate",
            format!("score {:.1}", evaluation.score),
        );
        Ok(evaluation)
    }

    pub async fn run(&mut self) -> Result<WorkflowReport> {
        self.log(Level::Info, "workflow", "start", "Starting workflow");
        self.config.validate()?;

        let missing: Vec<&str> = AgentRole::ALL
            .iter()
            .filter(|role| !self.agents.contains_key(*role))
            .map(|role| role.as_str())
            .collect();
        if !missing.is_empty() {
            anyhow::bail!("Missing required agents: {}", missing.join(", "));
        }
        let seed = self.story_seed.clone().context("Story seed not found")?;

        self.current_draft = None;
        self.original_outline = None;
        self.revision_count = 0;
        self.editing_count = 0;
        self.restart_count = 0;

        let max_revisions = self.config.max_revision_cycles;
        let mut last_score = None;

        while self.revision_count < max_revisions {
            if self.current_draft.is_none() {
                self.create_first_draft(&seed).await?;
            }

            match self.editing_loop().await? {
                EditingOutcome::Accepted(evaluation) => {
                    return self.finish_accepted(&seed, evaluation).await;
                }
                EditingOutcome::Restart(evaluation) => {
                    last_score = Some(evaluation.score);
                    self.restart_count += 1;
                    if self.restart_count > self.config.max_restarts {
                        self.log(
                            Level::Error,
                            "workflow",
                            "restart",
                            format!("Restart budget of {} spent", self.config.max_restarts),
                        );
                        return Ok(self.report(WorkflowStatus::Failed, None, last_score));
                    }
                    self.log(
                        Level::Warn,
                        "workflow",
                        "restart",
                        format!(
                            "Draft is off-brief, regenerating outline ({}/{})",
                            self.restart_count, self.config.max_restarts
                        ),
                    );
                    continue;
                }
                EditingOutcome::Exhausted(evaluation) => {
                    if let Some(evaluation) = evaluation {
                        last_score = Some(evaluation.score);
                    }
                }
            }

            self.revision_count += 1;
            self.log(
                Level::Info,
                "workflow",
                "revision",
                format!("Revision cycle {}/{} finished", self.revision_count, max_revisions),
            );
            if self.revision_count < max_revisions {
                self.revise().await?;
            }
        }

        self.finish_exhausted(&seed, last_score).await
    }

    async fn create_first_draft(&mut self, seed: &StorySeed) -> Result<()> {
        let synopsis = self
            .call(AgentRole::Creator, prompt::outline_prompt(seed))
            .await?;
        let outline = Outline::from_seed(seed, synopsis);

        match self.store.save_outline(&outline).await {
            Ok(path) => self.log(Level::Info, "creator", "outline", format!("Outline saved to {}", path)),
            Err(e) => self.log(Level::Warn, "creator", "outline", format!("Failed to save outline: {:#}", e)),
        }

        let draft = self
            .call(AgentRole::Writer, prompt::draft_prompt(&outline))
            .await?;
        self.keep_intermediate(AgentRole::Writer, &draft).await;
        if self.original_outline.is_none() {
            self.original_outline = Some(outline);
        }
        self.current_draft = Some(draft);
        Ok(())
    }

    async fn editing_loop(&mut self) -> Result<EditingOutcome> {
        self.editing_count = 0;
        let mut last = None;

        while self.editing_count < self.config.max_editing_cycles {
            let draft = self.current_draft.clone().unwrap_or_default();
            let polished = self
                .call(AgentRole::Editor, prompt::polish_prompt(&draft))
                .await?;
            self.keep_intermediate(AgentRole::Editor, &polished).await;
            self.current_draft = Some(polished);

            let evaluation = self
                .evaluate_content(self.original_outline.as_ref(), self.current_draft.as_deref())
                .await?;

            if evaluation.is_off_brief() {
                self.current_draft = None;
                return Ok(EditingOutcome::Restart(evaluation));
            }
            if evaluation.score >= self.config.revision_threshold {
                return Ok(EditingOutcome::Accepted(evaluation));
            }

            self.editing_count += 1;
            self.log(
                Level::Info,
                "workflow",
                "editing",
                format!(
                    "Score {:.1} below {:.1}, editing pass {}/{}",
                    evaluation.score,
                    self.config.revision_threshold,
                    self.editing_count,
                    self.config.max_editing_cycles
                ),
            );
            last = Some(evaluation);
        }
        Ok(EditingOutcome::Exhausted(last))
    }

    /// Rewrites the draft from fresh supervisor feedback and the original
    /// outline. An empty rewrite keeps the previous draft.
    async fn revise(&mut self) -> Result<()> {
        let outline = self
            .original_outline
            .clone()
            .context("Original outline missing during revision")?;
        let evaluation = self
            .evaluate_content(Some(&outline), self.current_draft.as_deref())
            .await?;

        let rewritten = self
            .call(
                AgentRole::Writer,
                prompt::revision_prompt(&outline, &evaluation.rationale),
            )
            .await?;

        if rewritten.trim().is_empty() {
            self.log(
                Level::Warn,
                "writer",
                "anomaly",
                "Writer returned no content, keeping previous draft",
            );
        } else {
            self.keep_intermediate(AgentRole::Writer, &rewritten).await;
            self.current_draft = Some(rewritten);
        }
        Ok(())
    }

    async fn finish_accepted(
        &self,
        seed: &StorySeed,
        evaluation: Evaluation,
    ) -> Result<WorkflowReport> {
        let draft = self.current_draft.clone().unwrap_or_default();
        let path = self.store.save_draft(&seed.title, &draft).await?;
        self.log(
            Level::Info,
            "workflow",
            "accept",
            format!("Accepted with score {:.1}, saved to {}", evaluation.score, path),
        );
        Ok(self.report(WorkflowStatus::Accepted, Some(path), Some(evaluation.score)))
    }

    async fn finish_exhausted(
        &self,
        seed: &StorySeed,
        last_score: Option<f64>,
    ) -> Result<WorkflowReport> {
        match self.current_draft.clone() {
            Some(draft) if !draft.trim().is_empty() => {
                let path = self.store.save_draft(&seed.title, &draft).await?;
                self.log(
                    Level::Warn,
                    "workflow",
                    "exhausted",
                    format!("Revision budget spent, saved last draft to {}", path),
                );
                Ok(self.report(WorkflowStatus::Exhausted, Some(path), last_score))
            }
            _ => {
                self.log(
                    Level::Error,
                    "workflow",
                    "exhausted",
                    "Revision budget spent with no draft to save",
                );
                Ok(self.report(WorkflowStatus::Failed, None, last_score))
            }
        }
    }

    fn report(
        &self,
        status: WorkflowStatus,
        output_path: Option<String>,
        last_score: Option<f64>,
    ) -> WorkflowReport {
        let final_draft = match status {
            WorkflowStatus::Failed => None,
            _ => self.current_draft.clone(),
        };
        WorkflowReport {
            status,
            final_draft,
            output_path,
            last_score,
            revision_count: self.revision_count,
            restart_count: self.restart_count,
        }
    }
}

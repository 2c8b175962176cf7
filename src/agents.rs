use crate::config::{AgentConfig, AgentsConfig};
use crate::llm::LlmClient;
use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AgentRole {
    Creator,
    Writer,
    Supervisor,
    Editor,
}

impl AgentRole {
    pub const ALL: [AgentRole; 4] = [
        AgentRole::Creator,
        AgentRole::Writer,
        AgentRole::Supervisor,
        AgentRole::Editor,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AgentRole::Creator => "creator",
            AgentRole::Writer => "writer",
            AgentRole::Supervisor => "supervisor",
            AgentRole::Editor => "editor",
        }
    }

    fn default_name(&self) -> &'static str {
        match self {
            AgentRole::Creator => "创意生成者",
            AgentRole::Writer => "写作者",
            AgentRole::Supervisor => "审核者",
            AgentRole::Editor => "编辑",
        }
    }

    fn default_role_prompt(&self) -> &'static str {
        match self {
            AgentRole::Creator => {
                "你是一位富有想象力的故事策划。你根据给定的故事要素构思完整的故事大纲，\
                包括主要情节走向、人物关系和章节安排。"
            }
            AgentRole::Writer => {
                "你是一位专业的小说作者。你严格依照大纲写作，注重人物刻画与场景描写，\
                并根据审核意见修改作品。"
            }
            AgentRole::Supervisor => {
                "你是一位严格的故事监制。你对照大纲审查作品的情节、人物、结构和风格，\
                给出0到100的评分和具体修改建议。内容严重偏离大纲时评分为0。"
            }
            AgentRole::Editor => {
                "你是一位资深文字编辑。你负责润色文字、改进句式和段落，\
                提升作品的流畅度，但不改变情节与人物。"
            }
        }
    }

    fn overrides<'a>(&self, config: &'a AgentsConfig) -> Option<&'a AgentConfig> {
        match self {
            AgentRole::Creator => config.creator.as_ref(),
            AgentRole::Writer => config.writer.as_ref(),
            AgentRole::Supervisor => config.supervisor.as_ref(),
            AgentRole::Editor => config.editor.as_ref(),
        }
    }
}

impl fmt::Display for AgentRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AgentTask {
    pub prompt: String,
}

impl AgentTask {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self { prompt: prompt.into() }
    }
}

/// What an agent hands back. A reply without text is an empty `content`,
/// never an error.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AgentResult {
    pub content: String,
    pub metadata: Option<HashMap<String, String>>,
}

#[async_trait]
pub trait Agent: Send + Sync {
    fn name(&self) -> &str;
    async fn execute(&self, task: &AgentTask) -> Result<AgentResult>;
}

/// The one agent implementation: a role's system prompt in front of an LLM.
#[derive(Debug)]
pub struct RoleAgent {
    role: AgentRole,
    name: String,
    system_prompt: String,
    llm: Arc<dyn LlmClient>,
}

impl RoleAgent {
    pub fn new(role: AgentRole, llm: Arc<dyn LlmClient>) -> Self {
        Self {
            role,
            name: role.default_name().to_string(),
            system_prompt: role.default_role_prompt().to_string(),
            llm,
        }
    }

    pub fn from_config(role: AgentRole, config: &AgentsConfig, llm: Arc<dyn LlmClient>) -> Self {
        let mut agent = Self::new(role, llm);
        if let Some(cfg) = role.overrides(config) {
            if let Some(name) = &cfg.name {
                agent.name = name.clone();
            }
            if let Some(prompt) = &cfg.role_prompt {
                agent.system_prompt = prompt.clone();
            }
        }
        agent
    }
}

#[async_trait]
impl Agent for RoleAgent {
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(&self, task: &AgentTask) -> Result<AgentResult> {
        let content = self.llm.chat(&self.system_prompt, &task.prompt).await?;
        let mut metadata = HashMap::new();
        metadata.insert("role".to_string(), self.role.as_str().to_string());
        metadata.insert("chars".to_string(), content.chars().count().to_string());
        Ok(AgentResult {
            content,
            metadata: Some(metadata),
        })
    }
}

/// Builds all four role agents over a shared LLM client.
pub fn create_agents(
    config: &AgentsConfig,
    llm: Arc<dyn LlmClient>,
) -> Vec<(AgentRole, Arc<dyn Agent>)> {
    AgentRole::ALL
        .iter()
        .map(|&role| {
            let agent: Arc<dyn Agent> = Arc::new(RoleAgent::from_config(role, config, llm.clone()));
            (role, agent)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Debug, Default)]
    struct EchoLlm {
        calls: Mutex<Vec<(String, String)>>,
    }

    #[async_trait]
    impl LlmClient for EchoLlm {
        async fn chat(&self, system: &str, user: &str) -> Result<String> {
            self.calls.lock().unwrap().push((system.to_string(), user.to_string()));
            Ok(format!("回复：{}", user))
        }
    }

    #[derive(Debug)]
    struct FailingLlm;

    #[async_trait]
    impl LlmClient for FailingLlm {
        async fn chat(&self, _system: &str, _user: &str) -> Result<String> {
            Err(anyhow::anyhow!("connection reset"))
        }
    }

    #[tokio::test]
    async fn test_role_agent_uses_system_prompt() -> Result<()> {
        let llm = Arc::new(EchoLlm::default());
        let agent = RoleAgent::new(AgentRole::Editor, llm.clone());

        let result = agent.execute(&AgentTask::new("润色这段文字")).await?;

        assert_eq!(result.content, "回复：润色这段文字");
        let metadata = result.metadata.unwrap();
        assert_eq!(metadata["role"], "editor");
        assert_eq!(metadata["chars"], "9");

        let calls = llm.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert!(calls[0].0.contains("文字编辑"));
        Ok(())
    }

    #[tokio::test]
    async fn test_role_agent_propagates_llm_error() {
        let agent = RoleAgent::new(AgentRole::Writer, Arc::new(FailingLlm));
        let err = agent.execute(&AgentTask::new("写作")).await.unwrap_err();
        assert!(err.to_string().contains("connection reset"));
    }

    #[test]
    fn test_config_overrides() {
        let config = AgentsConfig {
            supervisor: Some(AgentConfig {
                name: Some("监制".to_string()),
                role_prompt: Some("只给分数".to_string()),
            }),
            ..Default::default()
        };
        let llm: Arc<dyn LlmClient> = Arc::new(EchoLlm::default());

        let supervisor = RoleAgent::from_config(AgentRole::Supervisor, &config, llm.clone());
        assert_eq!(supervisor.name(), "监制");
        assert_eq!(supervisor.system_prompt, "只给分数");

        let creator = RoleAgent::from_config(AgentRole::Creator, &config, llm);
        assert_eq!(creator.name(), "创意生成者");
        assert_eq!(creator.role, AgentRole::Creator);
    }

    #[test]
    fn test_create_agents_covers_every_role() {
        let agents = create_agents(&AgentsConfig::default(), Arc::new(EchoLlm::default()));
        let roles: Vec<AgentRole> = agents.iter().map(|(r, _)| *r).collect();
        assert_eq!(roles, AgentRole::ALL.to_vec());
    }
}

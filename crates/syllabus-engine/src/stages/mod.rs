//! The four pipeline stages.
//!
//! Stages are plain async functions over a [`StageContext`]; status
//! transitions, checkpoints and logging belong to the orchestrator.

pub(crate) mod analysis;
pub(crate) mod content;
pub(crate) mod framework;
pub(crate) mod validation;

use tokio_util::sync::CancellationToken;

use crate::progress::ProgressSink;
use crate::settings::EngineSettings;
use syllabus_llm::{LlmInvocation, Message, ModelClient};

/// Everything a stage needs from the run.
#[derive(Clone, Copy)]
pub(crate) struct StageContext<'a> {
    pub subject: &'a str,
    pub client: &'a ModelClient,
    pub settings: &'a EngineSettings,
    pub cancel: &'a CancellationToken,
    pub sink: &'a dyn ProgressSink,
}

impl StageContext<'_> {
    /// Invocation for `label` with the run's model and timeout applied.
    pub fn invocation(
        &self,
        label: &str,
        system_prompt: &str,
        prompt: String,
        max_tokens: u32,
    ) -> LlmInvocation {
        LlmInvocation::new(
            self.subject,
            label,
            self.settings.timeout,
            vec![Message::user(prompt)],
        )
        .with_model(self.settings.model.clone())
        .with_system_prompt(system_prompt)
        .with_max_tokens(max_tokens)
    }
}

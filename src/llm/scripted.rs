//! Scripted completion client for tests.

use std::collections::VecDeque;
use std::sync::Mutex;

use futures::stream;

use crate::conversation::Message;

use super::error::{LlmError, LlmResult};
use super::{CompletionClient, CompletionFuture, FragmentStream};

enum Step {
    Reply(Vec<String>),
    Fail(String),
    Stall,
}

/// Plays back queued outcomes and records every message history it receives.
/// An exhausted script answers with an empty reply.
#[derive(Default)]
pub struct ScriptedClient {
    steps: Mutex<VecDeque<Step>>,
    requests: Mutex<Vec<Vec<Message>>>,
}

impl ScriptedClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a successful reply streamed as the given fragments.
    pub fn reply(self, fragments: &[&str]) -> Self {
        self.push(Step::Reply(fragments.iter().map(|f| (*f).to_string()).collect()))
    }

    /// Queue a failure carrying `message`.
    pub fn fail(self, message: &str) -> Self {
        self.push(Step::Fail(message.to_string()))
    }

    /// Queue a call that never completes.
    pub fn stall(self) -> Self {
        self.push(Step::Stall)
    }

    /// Message histories received so far, one per call.
    pub fn requests(&self) -> Vec<Vec<Message>> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }

    fn push(self, step: Step) -> Self {
        if let Ok(mut steps) = self.steps.lock() {
            steps.push_back(step);
        }
        self
    }
}

impl CompletionClient for ScriptedClient {
    fn stream_completion<'a>(
        &'a self,
        messages: &'a [Message],
    ) -> CompletionFuture<'a, LlmResult<FragmentStream>> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(messages.to_vec());
        }
        let step = self.steps.lock().ok().and_then(|mut steps| steps.pop_front());

        Box::pin(async move {
            tokio::task::yield_now().await;
            match step {
                Some(Step::Reply(fragments)) => {
                    let fragments: FragmentStream =
                        Box::pin(stream::iter(fragments.into_iter().map(Ok)));
                    Ok(fragments)
                }
                Some(Step::Fail(message)) => Err(LlmError::Api(message)),
                Some(Step::Stall) => futures::future::pending().await,
                None => {
                    let fragments: FragmentStream = Box::pin(stream::empty());
                    Ok(fragments)
                }
            }
        })
    }
}

//! Mock oracle for testing.

use std::collections::VecDeque;
use std::sync::Mutex;

use crate::error::{CardcheckError, Result};

use super::provider::TextOracle;

type Responder = Box<dyn Fn(&str) -> Result<String> + Send + Sync>;

enum Mode {
    /// Canned replies handed out in call order.
    Scripted(Mutex<VecDeque<Result<String>>>),
    /// Reply computed from the prompt.
    Responder(Responder),
}

/// Mock oracle that returns predictable replies and records every prompt.
pub struct MockOracle {
    mode: Mode,
    prompts: Mutex<Vec<String>>,
}

impl MockOracle {
    /// Replay `replies` in order. Once exhausted, every call fails.
    pub fn scripted<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let queue = replies.into_iter().map(|r| Ok(r.into())).collect();
        Self::with_mode(Mode::Scripted(Mutex::new(queue)))
    }

    /// Replay a mix of replies and transport failures in order.
    pub fn scripted_results(replies: Vec<Result<String>>) -> Self {
        Self::with_mode(Mode::Scripted(Mutex::new(replies.into())))
    }

    /// Compute each reply from the prompt.
    pub fn responder(f: impl Fn(&str) -> Result<String> + Send + Sync + 'static) -> Self {
        Self::with_mode(Mode::Responder(Box::new(f)))
    }

    /// Fail every call with the given message.
    pub fn failing(message: impl Into<String>) -> Self {
        let message = message.into();
        Self::responder(move |_| Err(CardcheckError::Oracle(message.clone())))
    }

    fn with_mode(mode: Mode) -> Self {
        Self {
            mode,
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Prompts received so far, in call order.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Number of calls made.
    pub fn calls(&self) -> usize {
        self.prompts
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }
}

impl TextOracle for MockOracle {
    fn complete(&self, prompt: &str) -> Result<String> {
        self.prompts
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(prompt.to_string());

        match &self.mode {
            Mode::Scripted(queue) => queue
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .pop_front()
                .unwrap_or_else(|| {
                    Err(CardcheckError::Oracle("mock script exhausted".to_string()))
                }),
            Mode::Responder(f) => f(prompt),
        }
    }

    fn name(&self) -> &str {
        "mock"
    }
}

//! Scripted translator for exercising batching and recovery without a network.
//!
//! Replies are consumed in call order. Once the script runs out, every call
//! either echoes a tagged translation of each item or fails, depending on how
//! the translator was built.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;

use crate::error::{Result, SubtransError};
use super::Translator;

/// One scripted reply
#[derive(Debug)]
pub enum Reply {
    /// Translate every item
    Echo,
    /// Translate only the first `n` items
    EchoFirst(usize),
    /// Return exactly these strings
    Items(Vec<String>),
    /// Return this error
    Error(SubtransError),
}

/// A recorded call
#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    pub items: Vec<String>,
    pub batch_label: Option<String>,
}

#[derive(Debug, Default)]
pub struct ScriptedTranslator {
    script: Mutex<VecDeque<Reply>>,
    calls: Mutex<Vec<Call>>,
    fail_when_exhausted: bool,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl ScriptedTranslator {
    /// Translator that echoes translations once its script is exhausted
    pub fn new() -> Self {
        Self::default()
    }

    /// Translator that fails with a network error once its script is exhausted
    pub fn failing() -> Self {
        Self {
            fail_when_exhausted: true,
            ..Self::default()
        }
    }

    /// The text produced for `source` by echo replies
    pub fn translated(source: &str) -> String {
        format!("[translated] {}", source)
    }

    pub fn then(self, reply: Reply) -> Self {
        lock(&self.script).push_back(reply);
        self
    }

    pub fn reply_echo(self) -> Self {
        self.then(Reply::Echo)
    }

    pub fn reply_partial(self, n: usize) -> Self {
        self.then(Reply::EchoFirst(n))
    }

    pub fn reply_with(self, items: Vec<&str>) -> Self {
        self.then(Reply::Items(items.into_iter().map(String::from).collect()))
    }

    pub fn fail_with(self, error: SubtransError) -> Self {
        self.then(Reply::Error(error))
    }

    pub fn calls(&self) -> Vec<Call> {
        lock(&self.calls).clone()
    }

    pub fn call_count(&self) -> usize {
        lock(&self.calls).len()
    }
}

#[async_trait]
impl Translator for ScriptedTranslator {
    async fn translate(&self, items: &[String], batch_label: Option<&str>) -> Result<Vec<String>> {
        lock(&self.calls).push(Call {
            items: items.to_vec(),
            batch_label: batch_label.map(String::from),
        });

        let reply = lock(&self.script).pop_front();
        let reply = match reply {
            Some(reply) => reply,
            None if self.fail_when_exhausted => {
                Reply::Error(SubtransError::Network("scripted network failure".to_string()))
            }
            None => Reply::Echo,
        };

        match reply {
            Reply::Echo => Ok(items.iter().map(|s| Self::translated(s)).collect()),
            Reply::EchoFirst(n) => Ok(items.iter().take(n).map(|s| Self::translated(s)).collect()),
            Reply::Items(translations) => Ok(translations),
            Reply::Error(e) => Err(e),
        }
    }
}

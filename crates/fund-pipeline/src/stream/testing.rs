//! Scripted transport for tests

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use super::transport::{Connector, Transport};
use crate::error::{PipelineError, Result};

/// Observes what a scripted transport was asked to do
#[derive(Debug, Clone, Default)]
pub struct Probe {
    sent: Arc<Mutex<Vec<String>>>,
    urls: Arc<Mutex<Vec<String>>>,
    closes: Arc<AtomicUsize>,
}

impl Probe {
    pub fn sent(&self) -> Vec<String> {
        self.sent.lock().unwrap().clone()
    }

    pub fn urls(&self) -> Vec<String> {
        self.urls.lock().unwrap().clone()
    }

    pub fn close_calls(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

/// Frames replayed in order, then either a remote close or silence
#[derive(Debug)]
pub struct Script {
    frames: VecDeque<Result<String>>,
    hang_when_empty: bool,
    probe: Probe,
}

impl Script {
    pub fn frames<I, S>(frames: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            frames: frames.into_iter().map(|f| Ok(f.into())).collect(),
            hang_when_empty: false,
            probe: Probe::default(),
        }
    }

    pub fn then_error(mut self, reason: &str) -> Self {
        self.frames.push_back(Err(PipelineError::transport(reason)));
        self
    }

    /// Never report a remote close once the frames run out
    pub fn hang_when_empty(mut self) -> Self {
        self.hang_when_empty = true;
        self
    }

    pub fn probe(&self) -> Probe {
        self.probe.clone()
    }
}

#[async_trait]
impl Transport for Script {
    async fn send(&mut self, text: String) -> Result<()> {
        self.probe.sent.lock().unwrap().push(text);
        Ok(())
    }

    async fn next_frame(&mut self) -> Option<Result<String>> {
        match self.frames.pop_front() {
            Some(frame) => Some(frame),
            None if self.hang_when_empty => std::future::pending().await,
            None => None,
        }
    }

    async fn close(&mut self) -> Result<()> {
        self.probe.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Hands out one queued script per connect
#[derive(Debug, Default)]
pub struct ScriptedConnector {
    scripts: Mutex<VecDeque<Script>>,
}

impl ScriptedConnector {
    pub fn new(script: Script) -> Self {
        Self::queue([script])
    }

    pub fn queue<I: IntoIterator<Item = Script>>(scripts: I) -> Self {
        Self {
            scripts: Mutex::new(scripts.into_iter().collect()),
        }
    }
}

#[async_trait]
impl Connector for ScriptedConnector {
    async fn connect(&self, url: &str) -> Result<Box<dyn Transport>> {
        let script = self
            .scripts
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| PipelineError::transport(format!("no script left for {url}")))?;
        script.probe.urls.lock().unwrap().push(url.to_string());
        Ok(Box::new(script))
    }
}

//! Test doubles for the collaborators around the core loops

use std::{
    collections::VecDeque,
    sync::{
        atomic::{AtomicI64, AtomicUsize, Ordering},
        Arc, Mutex,
    },
};

use async_trait::async_trait;

use crate::{
    error::PollError,
    services::{AudioSink, ChainSnapshot, ChainSource, PlayRequest, SleepInhibitor},
    utils::Clock,
};

/// Clock that only moves when told to
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicI64,
}

impl ManualClock {
    pub fn at(now: i64) -> Arc<Self> {
        Arc::new(Self {
            now: AtomicI64::new(now),
        })
    }

    pub fn advance(&self, secs: i64) {
        self.now.fetch_add(secs, Ordering::SeqCst);
    }

    pub fn set(&self, now: i64) {
        self.now.store(now, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_epoch(&self) -> i64 {
        self.now.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum AudioCommand {
    Play(PlayRequest),
    Stop,
}

impl AudioCommand {
    /// A looped play of `sound` at `volume`
    pub fn play(sound: &str, volume: f32) -> Self {
        Self::Play(PlayRequest {
            sound: sound.to_string(),
            volume,
            looped: true,
        })
    }
}

/// Audio sink that records commands; clones share the log
#[derive(Debug, Clone, Default)]
pub struct RecordingAudio {
    log: Arc<Mutex<Vec<AudioCommand>>>,
}

impl RecordingAudio {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn commands(&self) -> Vec<AudioCommand> {
        self.log.lock().unwrap().clone()
    }

    pub fn plays(&self) -> usize {
        self.commands()
            .iter()
            .filter(|c| matches!(c, AudioCommand::Play(_)))
            .count()
    }

    pub fn stops(&self) -> usize {
        self.commands()
            .iter()
            .filter(|c| matches!(c, AudioCommand::Stop))
            .count()
    }
}

impl AudioSink for RecordingAudio {
    fn play(&mut self, request: PlayRequest) {
        self.log.lock().unwrap().push(AudioCommand::Play(request));
    }

    fn stop(&mut self) {
        self.log.lock().unwrap().push(AudioCommand::Stop);
    }
}

/// Records every inhibition level it is given
#[derive(Debug, Default)]
pub struct RecordingInhibitor {
    levels: Mutex<Vec<bool>>,
}

impl RecordingInhibitor {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn levels(&self) -> Vec<bool> {
        self.levels.lock().unwrap().clone()
    }
}

impl SleepInhibitor for RecordingInhibitor {
    fn set_inhibited(&self, inhibit: bool) {
        self.levels.lock().unwrap().push(inhibit);
    }
}

/// Chain source that replays a script, then fails with a network error
#[derive(Debug, Default)]
pub struct ScriptedSource {
    script: Mutex<VecDeque<Result<ChainSnapshot, PollError>>>,
    calls: AtomicUsize,
    tokens: Mutex<Vec<String>>,
}

impl ScriptedSource {
    pub fn new(script: Vec<Result<ChainSnapshot, PollError>>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            ..Self::default()
        })
    }

    /// Successful snapshot ending at `end` (before the end offset)
    pub fn ok(end: i64, timeout: Option<u64>) -> Result<ChainSnapshot, PollError> {
        Ok(ChainSnapshot { end, timeout })
    }

    pub fn push(&self, next: Result<ChainSnapshot, PollError>) {
        self.script.lock().unwrap().push_back(next);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn tokens(&self) -> Vec<String> {
        self.tokens.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChainSource for ScriptedSource {
    async fn fetch(&self, access_token: &str) -> Result<ChainSnapshot, PollError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.tokens.lock().unwrap().push(access_token.to_string());
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(PollError::Network("script exhausted".to_string())))
    }
}

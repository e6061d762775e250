//! Audio playback through an external player process

use std::path::Path;

use tokio::{process::Command, task::JoinHandle};
use tracing::{debug, info, warn};

/// One start command for the audio device
#[derive(Debug, Clone, PartialEq)]
pub struct PlayRequest {
    pub sound: String,
    pub volume: f32,
    pub looped: bool,
}

/// Single-voice audio device.
///
/// Starting a new sound replaces whatever was playing.
pub trait AudioSink: Send {
    fn play(&mut self, request: PlayRequest);
    fn stop(&mut self);
}

/// Which command line conventions the player follows
#[derive(Debug, Clone, PartialEq, Eq)]
enum PlayerKind {
    Paplay,
    Ffplay,
    Other,
}

impl PlayerKind {
    fn detect(program: &str) -> Self {
        let name = Path::new(program)
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or(program);
        match name {
            "paplay" => Self::Paplay,
            "ffplay" => Self::Ffplay,
            _ => Self::Other,
        }
    }
}

/// Plays sounds by running a player program, re-running it to loop
pub struct CommandAudioSink {
    program: String,
    kind: PlayerKind,
    current: Option<JoinHandle<()>>,
}

impl CommandAudioSink {
    pub fn new(program: impl Into<String>) -> Self {
        let program = program.into();
        let kind = PlayerKind::detect(&program);
        Self {
            program,
            kind,
            current: None,
        }
    }
}

fn player_command(program: &str, kind: &PlayerKind, request: &PlayRequest) -> Command {
    let mut command = Command::new(program);
    match kind {
        PlayerKind::Paplay => {
            // paplay volume is linear, 65536 = 100%
            let volume = (request.volume.clamp(0.0, 1.0) * 65536.0) as u32;
            command.arg(format!("--volume={}", volume));
        }
        PlayerKind::Ffplay => {
            let volume = (request.volume.clamp(0.0, 1.0) * 100.0) as u32;
            command.args(["-nodisp", "-autoexit", "-loglevel", "quiet", "-volume"]);
            command.arg(volume.to_string());
        }
        PlayerKind::Other => {}
    }
    command.arg(&request.sound).kill_on_drop(true);
    command
}

impl AudioSink for CommandAudioSink {
    fn play(&mut self, request: PlayRequest) {
        self.stop();

        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!("No async runtime available, cannot play {}", request.sound);
            return;
        };

        info!("Playing {} (volume {:.2}, loop={})", request.sound, request.volume, request.looped);
        let program = self.program.clone();
        let kind = self.kind.clone();

        self.current = Some(runtime.spawn(async move {
            loop {
                let mut next = player_command(&program, &kind, &request);
                match next.status().await {
                    Ok(status) if !status.success() => {
                        warn!("Player exited with {} for {}", status, request.sound);
                        break;
                    }
                    Ok(_) => debug!("Finished one pass of {}", request.sound),
                    Err(e) => {
                        warn!("Failed to run audio player: {}", e);
                        break;
                    }
                }
                if !request.looped {
                    break;
                }
            }
        }));
    }

    fn stop(&mut self) {
        if let Some(handle) = self.current.take() {
            // Dropping the in-flight status future kills the child
            handle.abort();
            debug!("Stopped audio playback");
        }
    }
}

impl Drop for CommandAudioSink {
    fn drop(&mut self) {
        self.stop();
    }
}

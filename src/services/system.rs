//! System sleep inhibition through systemd

use std::sync::Mutex;

use tokio::process::{Child, Command};
use tracing::{debug, info, warn};

/// Level-triggered "keep the machine awake" switch
pub trait SleepInhibitor: Send + Sync {
    fn set_inhibited(&self, inhibit: bool);
}

/// Holds a `systemd-inhibit` child process while sleep is inhibited
#[derive(Debug, Default)]
pub struct SystemdInhibitor {
    child: Mutex<Option<Child>>,
}

impl SystemdInhibitor {
    pub fn new() -> Self {
        Self::default()
    }

    fn spawn_lock() -> Result<Child, String> {
        Command::new("systemd-inhibit")
            .args([
                "--what=sleep:idle",
                "--who=chain-watch",
                "--why=Watching chain timer",
                "--mode=block",
                "sleep",
                "infinity",
            ])
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| format!("Failed to execute systemd-inhibit: {}", e))
    }
}

impl SleepInhibitor for SystemdInhibitor {
    fn set_inhibited(&self, inhibit: bool) {
        let mut child = match self.child.lock() {
            Ok(child) => child,
            Err(e) => {
                warn!("Failed to lock inhibitor state: {}", e);
                return;
            }
        };

        // A lock that died on its own is treated as released
        let exited = child
            .as_mut()
            .and_then(|running| running.try_wait().ok().flatten());
        if let Some(status) = exited {
            warn!("systemd-inhibit exited unexpectedly: {}", status);
            *child = None;
        }

        match (inhibit, child.is_some()) {
            (true, false) => match Self::spawn_lock() {
                Ok(spawned) => {
                    info!("System sleep inhibited");
                    *child = Some(spawned);
                }
                Err(e) => warn!("{}", e),
            },
            (false, true) => {
                if let Some(mut running) = child.take() {
                    if let Err(e) = running.start_kill() {
                        warn!("Failed to release sleep inhibition: {}", e);
                    }
                    info!("System sleep allowed again");
                }
            }
            _ => debug!("Sleep inhibition already {}", if inhibit { "held" } else { "released" }),
        }
    }
}

/// Check if systemd-inhibit is available on the system
pub async fn check_systemd_inhibit_available() -> Result<(), String> {
    Command::new("systemd-inhibit")
        .arg("--version")
        .output()
        .await
        .map_err(|_| {
            "systemd-inhibit is not available; prevent_sleep will have no effect".to_string()
        })?;

    info!("systemd-inhibit is available");
    Ok(())
}

//! Player process launcher
//!
//! Validates launch arguments, spawns the player executable and
//! watches for its exit. The alternate mode drives the Gideros toolkit
//! on a dedicated blocking thread instead of spawning the player
//! directly.

use crate::constants::{error_codes, events, output_categories, EXIT_POLL_INTERVAL_MS};
use crate::frontend::FrontendChannel;
use crate::protocol::{ErrorMessage, Event, LaunchArguments, ProtocolMessage};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::process::{Child, Command};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// The session's handle to the spawned player process.
///
/// At most one live handle per session; the inner option becomes
/// `None` after a kill or a natural exit. Shared with the exit watcher
/// task, which takes the child out through the same mutex.
#[derive(Clone, Debug)]
pub struct ProcessHandle {
    child: Arc<Mutex<Option<Child>>>,
}

impl ProcessHandle {
    /// Best-effort kill. A process that already exited is not an
    /// error; calling with the child already gone is a no-op.
    pub async fn kill(&self) {
        let mut child = self.child.lock().await;
        if let Some(mut proc) = child.take() {
            match proc.kill().await {
                Ok(()) => debug!("Player process killed"),
                Err(e) => debug!("Player process kill skipped: {}", e),
            }
        }
    }

    pub async fn is_running(&self) -> bool {
        let mut child = self.child.lock().await;
        match child.as_mut() {
            Some(proc) => proc.try_wait().unwrap_or(None).is_none(),
            None => false,
        }
    }
}

/// Check the `workingDirectory` argument (shared by launch and attach)
pub fn validate_working_directory(working_directory: &str) -> Result<(), ErrorMessage> {
    if working_directory.is_empty() {
        return Err(ErrorMessage::new(
            error_codes::EMPTY_WORKING_DIRECTORY,
            "working directory not specified",
        ));
    }
    if !Path::new(working_directory).is_dir() {
        return Err(ErrorMessage::new(
            error_codes::MISSING_WORKING_DIRECTORY,
            "working directory does not exist: {path}",
        )
        .variable("path", working_directory));
    }
    Ok(())
}

/// Field validation for a direct launch, in the fixed order:
/// executable presence, executable existence, working directory
/// presence, working directory existence.
pub fn validate_spawn_arguments(args: &LaunchArguments) -> Result<(), ErrorMessage> {
    validate_executable(&args.executable)?;
    validate_working_directory(&args.attach.working_directory)
}

fn validate_executable(executable: &str) -> Result<(), ErrorMessage> {
    if executable.is_empty() {
        return Err(ErrorMessage::new(
            error_codes::EMPTY_EXECUTABLE,
            "executable not specified",
        ));
    }
    if !Path::new(executable).is_file() {
        return Err(ErrorMessage::new(
            error_codes::MISSING_EXECUTABLE,
            "executable does not exist: {path}",
        )
        .variable("path", executable));
    }
    Ok(())
}

/// Validate and spawn the player executable.
///
/// On success the composed command line is echoed to the frontend
/// console before the process starts, and an exit watcher is
/// registered that reports the player's termination.
pub async fn spawn_player(
    args: &LaunchArguments,
    frontend: Arc<FrontendChannel>,
) -> Result<ProcessHandle, ErrorMessage> {
    validate_spawn_arguments(args)?;

    let arg_list: Vec<&str> = args.arguments.split_ascii_whitespace().collect();
    let command_line = if arg_list.is_empty() {
        args.executable.clone()
    } else {
        format!("{} {}", args.executable, arg_list.join(" "))
    };
    info!(command = %command_line, "Starting player");
    let _ = frontend
        .send_output(
            output_categories::CONSOLE,
            format!("starting: {}\n", command_line),
        )
        .await;

    let child = Command::new(&args.executable)
        .args(&arg_list)
        .current_dir(&args.attach.working_directory)
        .spawn()
        .map_err(|e| {
            ErrorMessage::new(
                error_codes::PROCESS_START_FAILED,
                "failed to start process: {reason}",
            )
            .variable("reason", e.to_string())
        })?;

    let handle = ProcessHandle {
        child: Arc::new(Mutex::new(Some(child))),
    };
    spawn_exit_watcher(handle.clone(), frontend);
    Ok(handle)
}

/// Report the player's exit as a termination event.
///
/// Polls `try_wait` through the shared handle so `disconnect` can
/// still kill the process concurrently; the watcher ends when the
/// child slot is emptied by either side.
fn spawn_exit_watcher(handle: ProcessHandle, frontend: Arc<FrontendChannel>) {
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(Duration::from_millis(EXIT_POLL_INTERVAL_MS)).await;

            let status = {
                let mut child = handle.child.lock().await;
                match child.as_mut() {
                    Some(proc) => match proc.try_wait() {
                        Ok(Some(status)) => {
                            child.take();
                            Some(status)
                        }
                        Ok(None) => None,
                        Err(e) => {
                            warn!("Exit watcher failed to poll player: {}", e);
                            child.take();
                            None
                        }
                    },
                    // Killed or already reported
                    None => break,
                }
            };

            if let Some(status) = status {
                info!(status = %status, "Player process exited");
                let _ = frontend
                    .send_output(
                        output_categories::CONSOLE,
                        format!("player exited with {}\n", status),
                    )
                    .await;
                let event = Event::new(frontend.next_seq(), events::TERMINATED);
                let _ = frontend.send_message(ProtocolMessage::Event(event)).await;
                break;
            }
        }
    });
}

/// Start the Gideros toolkit on its own blocking thread.
///
/// Failures inside the thread are reported as stderr output events,
/// never propagated to the dispatcher.
pub fn launch_toolkit(gideros_path: String, gproj_path: String, frontend: Arc<FrontendChannel>) {
    info!(toolkit = %gideros_path, project = %gproj_path, "Starting Gideros toolkit");
    tokio::task::spawn_blocking(move || {
        let result = std::process::Command::new(&gideros_path)
            .arg(&gproj_path)
            .status();
        match result {
            Ok(status) if status.success() => {
                debug!("Gideros toolkit finished");
            }
            Ok(status) => {
                report_toolkit_error(&frontend, format!("gideros toolkit exited with {}", status));
            }
            Err(e) => {
                report_toolkit_error(
                    &frontend,
                    format!("failed to start gideros toolkit '{}': {}", gideros_path, e),
                );
            }
        }
    });
}

fn report_toolkit_error(frontend: &Arc<FrontendChannel>, message: String) {
    warn!("{}", message);
    let frontend = frontend.clone();
    tokio::spawn(async move {
        let _ = frontend
            .send_output(output_categories::STDERR, format!("{}\n", message))
            .await;
    });
}

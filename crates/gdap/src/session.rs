//! Session controller
//!
//! The dispatcher: owns the session state, the player process handle
//! and the active debuggee channel, and routes every frontend command
//! to a local handler or to verbatim pass-through. All outcomes are
//! side effects on the frontend channel; the only value `handle`
//! returns is the fatal path, which the top-level loop turns into
//! process exit.

use crate::constants::{error_codes, events, requests, PASS_THROUGH, UNSUPPORTED};
use crate::debuggee::DebuggeeChannel;
use crate::error::{Error, Result};
use crate::frontend::FrontendChannel;
use crate::launcher::{self, ProcessHandle};
use crate::listener::Listener;
use crate::protocol::{
    AttachArguments, Capabilities, ErrorMessage, Event, LaunchArguments, ProtocolMessage,
    RawRequest, Response,
};
use serde::de::DeserializeOwned;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{watch, Mutex};
use tracing::{debug, error, info, warn};

/// Lifecycle of one debug session. Terminated is absorbing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Created,
    Initialized,
    Launching,
    Attaching,
    Connected,
    Terminated,
}

/// Exactly-once end-of-session signal.
///
/// Fired by the debuggee read loop on connection loss and by
/// `disconnect`; whichever comes first emits the `terminated` event,
/// the other is silent. The atomic guard makes the signal safe from
/// any task.
#[derive(Clone)]
pub struct TerminationSignal {
    fired: Arc<AtomicBool>,
    frontend: Arc<FrontendChannel>,
    state: Arc<Mutex<SessionState>>,
}

impl TerminationSignal {
    pub fn new(frontend: Arc<FrontendChannel>, state: Arc<Mutex<SessionState>>) -> Self {
        Self {
            fired: Arc::new(AtomicBool::new(false)),
            frontend,
            state,
        }
    }

    /// Mark the session terminated and tell the frontend, once.
    pub async fn fire(&self) {
        if self.fired.swap(true, Ordering::SeqCst) {
            return;
        }
        info!("Session terminated");
        {
            let mut state = self.state.lock().await;
            *state = SessionState::Terminated;
        }
        let event = Event::new(self.frontend.next_seq(), events::TERMINATED);
        let _ = self.frontend.send_message(ProtocolMessage::Event(event)).await;
    }
}

pub struct SessionController {
    frontend: Arc<FrontendChannel>,
    state: Arc<Mutex<SessionState>>,
    process: Mutex<Option<ProcessHandle>>,
    /// Shared with the accept task, which installs the channel once
    /// the player connects
    debuggee: Arc<Mutex<Option<DebuggeeChannel>>>,
    termination: TerminationSignal,
    shutdown_tx: watch::Sender<bool>,
}

impl SessionController {
    pub fn new(frontend: Arc<FrontendChannel>) -> Self {
        let state = Arc::new(Mutex::new(SessionState::Created));
        let termination = TerminationSignal::new(frontend.clone(), state.clone());
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            frontend,
            state,
            process: Mutex::new(None),
            debuggee: Arc::new(Mutex::new(None)),
            termination,
            shutdown_tx,
        }
    }

    pub async fn state(&self) -> SessionState {
        *self.state.lock().await
    }

    /// Cancel a pending accept and stop the frontend channel.
    ///
    /// Called by the wire loop when the frontend goes away (stdin EOF).
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
        self.frontend.stop();
    }

    /// Process one frontend request.
    ///
    /// Every request gets exactly one response (pass-through commands
    /// get theirs from the player). `Err` means the 1104 response has
    /// been sent and the process must terminate.
    pub async fn handle(&self, req: RawRequest) -> Result<()> {
        let command = req.request.command.to_ascii_lowercase();
        debug!(command = %req.request.command, seq = req.request.seq, "Dispatching request");

        match self.dispatch(&command, &req).await {
            Ok(()) => Ok(()),
            Err(e) => {
                error!(command = %req.request.command, "Internal error: {}", e);
                let reason = e.to_string();
                let msg = ErrorMessage::new(
                    error_codes::INTERNAL_ERROR,
                    "error while processing request '{_request}' (exception: {_exception})",
                )
                .variable("_request", &req.request.command)
                .variable("_exception", &reason)
                .telemetry();
                let _ = self.respond_error(&req, msg).await;

                let mut state = self.state.lock().await;
                *state = SessionState::Terminated;
                Err(Error::Fatal {
                    command: req.request.command,
                    reason,
                })
            }
        }
    }

    async fn dispatch(&self, command: &str, req: &RawRequest) -> Result<()> {
        match command {
            requests::INITIALIZE => self.handle_initialize(req).await,
            requests::LAUNCH => self.handle_launch(req).await,
            requests::ATTACH => self.handle_attach(req).await,
            requests::DISCONNECT => self.handle_disconnect(req).await,
            cmd if PASS_THROUGH.contains(&cmd) => self.forward(req).await,
            cmd if UNSUPPORTED.contains(&cmd) => {
                let msg = ErrorMessage::new(
                    error_codes::NOT_SUPPORTED,
                    "command not supported: '{_request}'",
                )
                .variable("_request", &req.request.command);
                self.respond_error(req, msg).await
            }
            _ => {
                warn!(command = %req.request.command, "Unrecognized request");
                let msg = ErrorMessage::new(
                    error_codes::UNRECOGNIZED_REQUEST,
                    "unrecognized request: '{_request}'",
                )
                .variable("_request", &req.request.command);
                self.respond_error(req, msg).await
            }
        }
    }

    async fn handle_initialize(&self, req: &RawRequest) -> Result<()> {
        self.set_state(SessionState::Initialized).await;
        let body = serde_json::to_value(Capabilities::default())?;
        self.respond_success(req, Some(body)).await
    }

    async fn handle_launch(&self, req: &RawRequest) -> Result<()> {
        let args: LaunchArguments = decode_arguments(req)?;
        self.set_state(SessionState::Launching).await;

        // Field validation first, so an empty or missing executable /
        // working directory gets its specific recoverable code before
        // the listener port requirement can fail the request
        let validation = if args.uses_toolkit() {
            launcher::validate_working_directory(&args.attach.working_directory)
        } else {
            launcher::validate_spawn_arguments(&args)
        };
        if let Err(msg) = validation {
            return self.respond_error(req, msg).await;
        }
        let port = require_listen_port(req, &args.attach)?;

        if args.uses_toolkit() {
            // uses_toolkit() guarantees both paths are present
            let gideros = args.gideros_path.clone().unwrap_or_default();
            let gproj = args.gproj_path.clone().unwrap_or_default();
            launcher::launch_toolkit(gideros, gproj, self.frontend.clone());
        } else {
            match launcher::spawn_player(&args, self.frontend.clone()).await {
                Ok(handle) => {
                    let mut process = self.process.lock().await;
                    *process = Some(handle);
                }
                // Launch failed: session stays alive, attach is not attempted
                Err(msg) => return self.respond_error(req, msg).await,
            }
        }

        // Launch reuses the attach flow with the same arguments
        self.accept_and_connect(req, &args.attach, port).await
    }

    async fn handle_attach(&self, req: &RawRequest) -> Result<()> {
        let args: AttachArguments = decode_arguments(req)?;
        if let Err(msg) = launcher::validate_working_directory(&args.working_directory) {
            return self.respond_error(req, msg).await;
        }
        let port = require_listen_port(req, &args)?;
        self.set_state(SessionState::Attaching).await;
        self.accept_and_connect(req, &args, port).await
    }

    /// Bind the listener, then hand the wait for the single player
    /// connection to its own task so the dispatch path stays free. The
    /// task finishes the handshake, starts the read loop and confirms
    /// to the frontend; a `disconnect` issued meanwhile cancels the
    /// pending accept through the shutdown signal.
    async fn accept_and_connect(
        &self,
        req: &RawRequest,
        args: &AttachArguments,
        port: u16,
    ) -> Result<()> {
        let listener = Listener::bind(args.listen_publicly, port).await?;
        let shutdown = self.shutdown_tx.subscribe();

        let req = req.clone();
        let working_directory = args.working_directory.clone();
        let frontend = self.frontend.clone();
        let state = self.state.clone();
        let debuggee = self.debuggee.clone();
        let termination = self.termination.clone();

        tokio::spawn(async move {
            let stream = match listener.accept_one(shutdown).await {
                Ok(stream) => stream,
                Err(e) => {
                    // Cancelled by disconnect/shutdown, or the accept
                    // itself failed. The frontend channel is stopped
                    // on the cancel path, so no response goes out;
                    // the termination signal covers the failure case.
                    debug!("Accept ended without a connection: {}", e);
                    termination.fire().await;
                    return;
                }
            };

            match DebuggeeChannel::start(
                stream,
                &working_directory,
                frontend.clone(),
                termination.clone(),
            )
            .await
            {
                Ok(channel) => {
                    {
                        let mut debuggee = debuggee.lock().await;
                        *debuggee = Some(channel);
                    }
                    transition(&state, SessionState::Connected).await;

                    let response = Response::success(
                        frontend.next_seq(),
                        req.request.seq,
                        &req.request.command,
                    );
                    let _ = frontend
                        .send_message(ProtocolMessage::Response(response))
                        .await;
                    let event = Event::new(frontend.next_seq(), events::INITIALIZED);
                    let _ = frontend.send_message(ProtocolMessage::Event(event)).await;
                }
                Err(e) => {
                    error!("Player handshake failed: {}", e);
                    termination.fire().await;
                }
            }
        });

        Ok(())
    }

    /// Best-effort teardown: safe with no process and no connection,
    /// safe to repeat. The `terminated` event goes out between the
    /// empty response and the channel stop.
    async fn handle_disconnect(&self, req: &RawRequest) -> Result<()> {
        info!("Disconnecting session");

        if let Some(handle) = self.process.lock().await.take() {
            handle.kill().await;
        }
        {
            let mut debuggee = self.debuggee.lock().await;
            debuggee.take();
        }

        self.respond_success(req, None).await?;
        // Marks the signal fired, so the dropped read loop cannot emit
        // a second terminated event
        self.termination.fire().await;

        let _ = self.shutdown_tx.send(true);
        self.frontend.stop();
        Ok(())
    }

    /// Forward the original request text to the player, untouched.
    /// The response, if any, arrives through the relayed player
    /// traffic.
    async fn forward(&self, req: &RawRequest) -> Result<()> {
        let debuggee = self.debuggee.lock().await;
        let channel = debuggee.as_ref().ok_or_else(|| {
            Error::Protocol(format!(
                "no player connection for '{}'",
                req.request.command
            ))
        })?;
        channel.send(&req.raw).await
    }

    async fn respond_success(
        &self,
        req: &RawRequest,
        body: Option<serde_json::Value>,
    ) -> Result<()> {
        let mut response =
            Response::success(self.frontend.next_seq(), req.request.seq, &req.request.command);
        if let Some(body) = body {
            response = response.with_body(body);
        }
        self.frontend
            .send_message(ProtocolMessage::Response(response))
            .await
    }

    async fn respond_error(&self, req: &RawRequest, msg: ErrorMessage) -> Result<()> {
        warn!(
            code = msg.id,
            command = %req.request.command,
            "Request failed: {}",
            msg.rendered()
        );
        let response = Response::error(
            self.frontend.next_seq(),
            req.request.seq,
            &req.request.command,
            &msg,
        );
        self.frontend
            .send_message(ProtocolMessage::Response(response))
            .await
    }

    async fn set_state(&self, next: SessionState) {
        transition(&self.state, next).await;
    }
}

/// Transition guard: Terminated is absorbing
async fn transition(state: &Arc<Mutex<SessionState>>, next: SessionState) {
    let mut state = state.lock().await;
    if *state != SessionState::Terminated {
        *state = next;
    }
}

/// Schema requirement checked after field validation, so it only
/// fires for requests whose paths already checked out
fn require_listen_port(req: &RawRequest, args: &AttachArguments) -> Result<u16> {
    args.listen_port.ok_or_else(|| {
        Error::Protocol(format!("'{}' requires listenPort", req.request.command))
    })
}

fn decode_arguments<T: DeserializeOwned>(req: &RawRequest) -> Result<T> {
    let value = req
        .request
        .arguments
        .clone()
        .ok_or_else(|| Error::Protocol(format!("'{}' requires arguments", req.request.command)))?;
    Ok(serde_json::from_value(value)?)
}

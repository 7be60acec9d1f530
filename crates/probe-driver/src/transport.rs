//! Raw CDP pipe used by the probe session.
//!
//! `chromiumoxide`'s `Connection` is driven directly as a message
//! transport: commands funnel through an mpsc channel into a pump task that
//! owns the websocket, replies are matched back by call id, and protocol
//! events fan out on a second channel. A `NoopTransport` stands in when no
//! browser is available so the rest of the driver can still be wired up in
//! tests.

use std::collections::HashMap;
use std::fs;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::async_process::Child;
use chromiumoxide::browser::BrowserConfig;
use chromiumoxide::cdp::browser_protocol::target::SessionId as CdpSessionId;
use chromiumoxide::cdp::events::CdpEventMessage;
use chromiumoxide::conn::Connection;
use chromiumoxide::error::CdpError;
use chromiumoxide_types::{CallId, CdpJsonEventMessage, Message, MethodId};
use futures::io::{AsyncBufReadExt, BufReader};
use futures::{future::BoxFuture, StreamExt};
use serde_json::{json, Value};
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::config::TransportConfig;
use crate::ProbeError;

/// One decoded CDP event.
#[derive(Clone, Debug)]
pub struct TransportEvent {
    pub method: String,
    pub params: Value,
    pub session_id: Option<String>,
}

/// Whether a command goes to the browser endpoint or a page session.
#[derive(Clone, Debug)]
pub enum CommandTarget {
    Browser,
    Session(String),
}

#[async_trait]
pub trait ProbeTransport: Send + Sync {
    async fn start(&self) -> Result<(), ProbeError>;
    async fn next_event(&self) -> Option<TransportEvent>;
    async fn send_command(
        &self,
        target: CommandTarget,
        method: &str,
        params: Value,
    ) -> Result<Value, ProbeError>;
}

/// Transport that answers nothing; used when no browser is reachable.
#[derive(Default)]
pub struct NoopTransport;

#[async_trait]
impl ProbeTransport for NoopTransport {
    async fn start(&self) -> Result<(), ProbeError> {
        Ok(())
    }

    async fn next_event(&self) -> Option<TransportEvent> {
        None
    }

    async fn send_command(
        &self,
        _target: CommandTarget,
        method: &str,
        _params: Value,
    ) -> Result<Value, ProbeError> {
        Err(ProbeError::CdpIo(format!(
            "transport not available for method {method}"
        )))
    }
}

type Reply = oneshot::Sender<Result<Value, ProbeError>>;

struct PendingCommand {
    target: CommandTarget,
    method: String,
    params: Value,
    reply: Reply,
}

type PipeFactory = Arc<
    dyn Fn(TransportConfig) -> BoxFuture<'static, Result<Arc<Pipe>, ProbeError>> + Send + Sync,
>;

/// Real transport backed by a launched (or attached) Chromium instance.
/// The pipe is built lazily and relaunched if its pump ever stops.
pub struct ChromiumTransport {
    cfg: TransportConfig,
    pipe: Mutex<Option<Arc<Pipe>>>,
    factory: PipeFactory,
}

impl ChromiumTransport {
    pub fn new(cfg: TransportConfig) -> Self {
        Self::with_factory(
            cfg,
            Arc::new(|cfg| Box::pin(async move { Pipe::bring_up(cfg).await.map(Arc::new) })),
        )
    }

    fn with_factory(cfg: TransportConfig, factory: PipeFactory) -> Self {
        Self {
            cfg,
            pipe: Mutex::new(None),
            factory,
        }
    }

    async fn pipe(&self) -> Result<Arc<Pipe>, ProbeError> {
        let mut guard = self.pipe.lock().await;
        if let Some(pipe) = guard.as_ref() {
            if pipe.is_alive() {
                return Ok(pipe.clone());
            }
            warn!(target: "probe-transport", "cdp pipe died, relaunching");
        }
        let pipe = (self.factory)(self.cfg.clone()).await?;
        *guard = Some(pipe.clone());
        Ok(pipe)
    }
}

#[async_trait]
impl ProbeTransport for ChromiumTransport {
    async fn start(&self) -> Result<(), ProbeError> {
        let pipe = self.pipe().await?;
        pipe.call(
            CommandTarget::Browser,
            "Target.setDiscoverTargets",
            json!({ "discover": true }),
        )
        .await?;
        pipe.call(
            CommandTarget::Browser,
            "Target.setAutoAttach",
            json!({
                "autoAttach": true,
                "waitForDebuggerOnStart": false,
                "flatten": true,
            }),
        )
        .await?;
        Ok(())
    }

    async fn next_event(&self) -> Option<TransportEvent> {
        match self.pipe().await {
            Ok(pipe) => pipe.next_event().await,
            Err(err) => {
                warn!(target: "probe-transport", %err, "no transport for event stream");
                None
            }
        }
    }

    async fn send_command(
        &self,
        target: CommandTarget,
        method: &str,
        params: Value,
    ) -> Result<Value, ProbeError> {
        self.pipe().await?.call(target, method, params).await
    }
}

/// A live connection to one Chromium instance: pump task, optional
/// heartbeat, and the child process when we launched it ourselves.
struct Pipe {
    commands: mpsc::Sender<PendingCommand>,
    events: Mutex<mpsc::Receiver<TransportEvent>>,
    tasks: Vec<JoinHandle<()>>,
    child: std::sync::Mutex<Option<Child>>,
    alive: Arc<AtomicBool>,
    deadline: Duration,
}

impl Pipe {
    async fn bring_up(cfg: TransportConfig) -> Result<Self, ProbeError> {
        let (child, ws_url) = match cfg.websocket_url.clone() {
            Some(url) => (None, url),
            None => {
                let config = browser_config(&cfg)?;
                let mut child = config.launch().map_err(|err| {
                    ProbeError::Internal(format!("failed to launch chromium: {err}"))
                })?;
                let url = devtools_url(&mut child).await?;
                (Some(child), url)
            }
        };

        let conn = Connection::<CdpEventMessage>::connect(&ws_url)
            .await
            .map_err(|err| ProbeError::CdpIo(err.to_string()))?;
        info!(target: "probe-transport", url = %ws_url, "attached to chromium devtools endpoint");

        let (command_tx, command_rx) = mpsc::channel(64);
        let (event_tx, event_rx) = mpsc::channel(256);
        let alive = Arc::new(AtomicBool::new(true));

        let pump_alive = alive.clone();
        let mut tasks = vec![tokio::spawn(async move {
            if let Err(err) = pump(conn, command_rx, event_tx).await {
                error!(target: "probe-transport", %err, "cdp pump stopped");
            }
            pump_alive.store(false, Ordering::Relaxed);
        })];
        if let Some(task) = spawn_heartbeat(
            command_tx.clone(),
            alive.clone(),
            Duration::from_millis(cfg.heartbeat_interval_ms),
        ) {
            tasks.push(task);
        }

        Ok(Self {
            commands: command_tx,
            events: Mutex::new(event_rx),
            tasks,
            child: std::sync::Mutex::new(child),
            alive,
            deadline: Duration::from_millis(cfg.default_deadline_ms),
        })
    }

    #[cfg(test)]
    fn stub() -> (Arc<Self>, Arc<AtomicBool>) {
        let (command_tx, mut command_rx) = mpsc::channel::<PendingCommand>(1);
        let (_event_tx, event_rx) = mpsc::channel(1);
        let alive = Arc::new(AtomicBool::new(true));
        let task = tokio::spawn(async move { while command_rx.recv().await.is_some() {} });
        (
            Arc::new(Self {
                commands: command_tx,
                events: Mutex::new(event_rx),
                tasks: vec![task],
                child: std::sync::Mutex::new(None),
                alive: alive.clone(),
                deadline: Duration::from_millis(100),
            }),
            alive,
        )
    }

    fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Relaxed)
    }

    async fn call(
        &self,
        target: CommandTarget,
        method: &str,
        params: Value,
    ) -> Result<Value, ProbeError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.commands
            .send(PendingCommand {
                target,
                method: method.to_string(),
                params,
                reply: reply_tx,
            })
            .await
            .map_err(|_| ProbeError::CdpIo("transport pump is gone".into()))?;

        match tokio::time::timeout(self.deadline, reply_rx).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(_)) => Err(ProbeError::CdpIo("command reply dropped".into())),
            Err(_) => Err(ProbeError::NavTimeout),
        }
    }

    async fn next_event(&self) -> Option<TransportEvent> {
        self.events.lock().await.recv().await
    }
}

impl Drop for Pipe {
    fn drop(&mut self) {
        self.alive.store(false, Ordering::Relaxed);
        for task in &self.tasks {
            task.abort();
        }
        let child = self.child.lock().ok().and_then(|mut guard| guard.take());
        if let Some(mut child) = child {
            match tokio::runtime::Handle::try_current() {
                Ok(handle) => {
                    handle.spawn(async move {
                        if let Err(err) = child.kill().await {
                            warn!(target: "probe-transport", ?err, "chromium child refused to die");
                        }
                    });
                }
                Err(_) => {
                    debug!(target: "probe-transport", "no runtime left to reap chromium child")
                }
            }
        }
    }
}

/// Owns the websocket: submits queued commands, routes replies by call id,
/// forwards events. Returning means the pipe is dead either way.
async fn pump(
    mut conn: Connection<CdpEventMessage>,
    mut commands: mpsc::Receiver<PendingCommand>,
    events: mpsc::Sender<TransportEvent>,
) -> Result<(), ProbeError> {
    let mut waiting: HashMap<CallId, Reply> = HashMap::new();

    loop {
        tokio::select! {
            cmd = commands.recv() => {
                let Some(cmd) = cmd else { return Ok(()) };
                let session = match cmd.target {
                    CommandTarget::Browser => None,
                    CommandTarget::Session(id) => Some(CdpSessionId::from(id)),
                };
                match conn.submit_command(MethodId::from(cmd.method), session, cmd.params) {
                    Ok(call_id) => {
                        waiting.insert(call_id, cmd.reply);
                    }
                    Err(err) => {
                        // A rejected submission fails that one command, not
                        // the whole pipe.
                        let _ = cmd.reply.send(Err(ProbeError::CdpIo(err.to_string())));
                    }
                }
            }
            message = conn.next() => match message {
                Some(Ok(Message::Response(resp))) => {
                    if let Some(reply) = waiting.remove(&resp.id) {
                        let outcome = match (resp.result, resp.error) {
                            (Some(value), _) => Ok(value),
                            (None, Some(err)) => Err(ProbeError::CdpIo(format!(
                                "cdp error {}: {}",
                                err.code, err.message
                            ))),
                            (None, None) => Ok(Value::Null),
                        };
                        let _ = reply.send(outcome);
                    }
                }
                Some(Ok(Message::Event(event))) => {
                    match TryInto::<CdpJsonEventMessage>::try_into(event) {
                        Ok(raw) => {
                            let _ = events
                                .send(TransportEvent {
                                    method: raw.method.into_owned(),
                                    params: raw.params,
                                    session_id: raw.session_id,
                                })
                                .await;
                        }
                        Err(err) => {
                            debug!(target: "probe-transport", ?err, "undecodable cdp event");
                        }
                    }
                }
                Some(Err(err)) => {
                    let failure = match err {
                        CdpError::Timeout => ProbeError::NavTimeout,
                        other => ProbeError::CdpIo(other.to_string()),
                    };
                    for (_, reply) in waiting.drain() {
                        let _ = reply.send(Err(failure.clone()));
                    }
                    return Err(failure);
                }
                None => {
                    for (_, reply) in waiting.drain() {
                        let _ = reply.send(Err(ProbeError::CdpIo("cdp connection closed".into())));
                    }
                    return Ok(());
                }
            }
        }
    }
}

/// Periodic `Browser.getVersion` ping. A missed pong marks the pipe dead
/// so the next command relaunches instead of hanging.
fn spawn_heartbeat(
    commands: mpsc::Sender<PendingCommand>,
    alive: Arc<AtomicBool>,
    every: Duration,
) -> Option<JoinHandle<()>> {
    if every.is_zero() {
        return None;
    }
    Some(tokio::spawn(async move {
        loop {
            tokio::time::sleep(every).await;
            if !alive.load(Ordering::Relaxed) {
                break;
            }
            let (reply_tx, reply_rx) = oneshot::channel();
            let ping = PendingCommand {
                target: CommandTarget::Browser,
                method: "Browser.getVersion".to_string(),
                params: json!({}),
                reply: reply_tx,
            };
            if commands.send(ping).await.is_err() {
                break;
            }
            match tokio::time::timeout(Duration::from_secs(5), reply_rx).await {
                Ok(Ok(Ok(_))) => {}
                _ => {
                    warn!(target: "probe-transport", "browser heartbeat failed");
                    break;
                }
            }
        }
    }))
}

fn browser_config(cfg: &TransportConfig) -> Result<BrowserConfig, ProbeError> {
    if !cfg.executable.as_os_str().is_empty() && !cfg.executable.exists() {
        return Err(ProbeError::CdpIo(format!(
            "chrome executable not found at {} (set SCAN_CHROME)",
            cfg.executable.display()
        )));
    }

    // join() keeps absolute profile paths as-is.
    let profile = std::env::current_dir()
        .map(|cwd| cwd.join(&cfg.user_data_dir))
        .unwrap_or_else(|_| cfg.user_data_dir.clone());
    fs::create_dir_all(&profile)
        .map_err(|err| ProbeError::Internal(format!("cannot create profile dir: {err}")))?;

    // Timer throttling and renderer backgrounding would corrupt tick counts
    // measured in a tab that Chromium considers idle.
    let mut flags = vec![
        "--no-first-run",
        "--no-default-browser-check",
        "--disable-extensions",
        "--disable-sync",
        "--disable-background-networking",
        "--disable-background-timer-throttling",
        "--disable-renderer-backgrounding",
        "--autoplay-policy=no-user-gesture-required",
        "--remote-allow-origins=*",
    ];
    if cfg.headless {
        flags.extend(["--headless=new", "--mute-audio", "--hide-scrollbars"]);
    }

    let mut builder = BrowserConfig::builder()
        .request_timeout(Duration::from_millis(cfg.default_deadline_ms))
        .launch_timeout(Duration::from_secs(20))
        .user_data_dir(profile)
        .args(flags);
    if !cfg.headless {
        builder = builder.with_head();
    }
    if sandbox_disabled() {
        builder = builder.no_sandbox();
    }
    if !cfg.executable.as_os_str().is_empty() {
        builder = builder.chrome_executable(cfg.executable.clone());
    }

    builder
        .build()
        .map_err(|err| ProbeError::Internal(format!("browser config: {err}")))
}

fn sandbox_disabled() -> bool {
    std::env::var("SCAN_DISABLE_SANDBOX")
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

/// Chromium prints its DevTools endpoint on stderr shortly after launch.
async fn devtools_url(child: &mut Child) -> Result<String, ProbeError> {
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| ProbeError::Internal("launched chromium has no stderr handle".into()))?;
    let mut lines = BufReader::new(stderr).lines();

    let scan = async {
        while let Some(line) = lines.next().await {
            let line = line.map_err(|err| ProbeError::CdpIo(err.to_string()))?;
            if let Some(pos) = line.find("ws://") {
                let url = line[pos..].trim();
                if url.contains("/devtools/browser/") {
                    return Ok(url.to_string());
                }
            }
        }
        Err(ProbeError::CdpIo(
            "chromium exited before printing a devtools endpoint".into(),
        ))
    };

    tokio::time::timeout(Duration::from_secs(20), scan)
        .await
        .map_err(|_| ProbeError::CdpIo("no devtools endpoint within 20s of launch".into()))?
}

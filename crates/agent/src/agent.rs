//! Agent assembly: injection, readiness triggers and control handling.

use std::cell::RefCell;
use std::rc::Rc;

use arcadescan_bridge::{Control, ErrorPayload, HighscoresPayload, PauseStatePayload, Telemetry};
use tracing::debug;

use crate::context::{AgentContext, Tuning};
use crate::interceptor::{ConsoleInterceptor, ErrorHook, FrameInterceptor};
use crate::platform::{
    ConsoleSlot, DocumentHost, ErrorSlot, InjectionMarker, SchedulerSlot, TelemetrySink,
};

/// One injected agent instance for one embedded document lifetime.
pub struct Agent {
    ctx: Rc<RefCell<AgentContext>>,
    host: Rc<dyn DocumentHost>,
    sink: Rc<dyn TelemetrySink>,
    frames: FrameInterceptor,
    console: ConsoleInterceptor,
    errors: ErrorHook,
}

impl Agent {
    /// Inject the agent into a document. Returns `None` when the injection
    /// marker is already present; re-injection is a no-op by contract.
    pub fn inject(
        host: Rc<dyn DocumentHost>,
        sink: Rc<dyn TelemetrySink>,
        marker: &dyn InjectionMarker,
        scheduler: &dyn SchedulerSlot,
        console_slot: &dyn ConsoleSlot,
        error_slot: &dyn ErrorSlot,
    ) -> Option<Self> {
        if marker.is_set() {
            debug!(target: "agent", "injection marker present, skipping re-injection");
            return None;
        }
        marker.set();

        let ctx = Rc::new(RefCell::new(AgentContext::new(Tuning::default())));
        let mut agent = Self {
            ctx: ctx.clone(),
            host,
            sink,
            frames: FrameInterceptor::default(),
            console: ConsoleInterceptor::default(),
            errors: ErrorHook::default(),
        };
        agent.frames.install(
            scheduler,
            ctx.clone(),
            agent.host.clone(),
            agent.sink.clone(),
        );
        agent.console.install(console_slot, agent.sink.clone());
        agent.errors.install(error_slot, ctx, agent.sink.clone());
        Some(agent)
    }

    pub fn context(&self) -> Rc<RefCell<AgentContext>> {
        self.ctx.clone()
    }

    /// Readiness trigger: document mutation observed.
    pub fn on_mutation(&self) {
        self.try_ready();
    }

    /// Readiness trigger: document/window load event.
    pub fn on_load(&self) {
        self.try_ready();
    }

    /// Readiness trigger: zero-delay fallback timer.
    pub fn on_fallback_timer(&self) {
        self.try_ready();
    }

    fn try_ready(&self) {
        self.ctx
            .borrow_mut()
            .try_emit_ready(self.host.as_ref(), self.sink.as_ref());
    }

    /// Handle one decoded control message from the host.
    pub fn handle_control(&self, control: Control) {
        match control {
            Control::Focus | Control::Resume => {
                self.redispatch(control.channel());
                self.ctx.borrow_mut().set_paused(false);
                self.echo_pause_state();
            }
            Control::Blur | Control::Pause => {
                self.redispatch(control.channel());
                self.ctx.borrow_mut().set_paused(true);
                self.echo_pause_state();
            }
            Control::ToggleHelp => {
                // No forced echo for help: the host learns nothing it did
                // not already know.
                self.redispatch(control.channel());
            }
            Control::RequestHighscores => match self.host.storage_entries() {
                Ok(entries) => {
                    self.sink
                        .emit(Telemetry::Highscores(HighscoresPayload { entries }));
                }
                Err(err) => {
                    self.ctx.borrow_mut().record_error();
                    self.sink.emit(Telemetry::Error(ErrorPayload {
                        message: err.to_string(),
                        source: None,
                        line: None,
                        column: None,
                        stack: None,
                    }));
                }
            },
        }
    }

    fn redispatch(&self, name: &str) {
        // The embedded program may or may not listen; a dispatch failure
        // must not stop the pause-state echo below.
        if let Err(err) = self.host.dispatch_custom_event(name) {
            debug!(target: "agent", %err, event = name, "custom event dispatch failed");
        }
    }

    /// The host always learns the applied state, even if the embedded
    /// program ignored the event entirely.
    fn echo_pause_state(&self) {
        let paused = self.ctx.borrow().is_paused();
        self.sink
            .emit(Telemetry::PauseState(PauseStatePayload { paused }));
    }

    /// Tear the agent down, restoring every original binding.
    pub fn restore(
        mut self,
        scheduler: &dyn SchedulerSlot,
        console_slot: &dyn ConsoleSlot,
        error_slot: &dyn ErrorSlot,
    ) {
        self.frames.restore(scheduler);
        self.console.restore(console_slot);
        self.errors.restore(error_slot);
    }
}

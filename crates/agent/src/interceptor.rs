//! Interceptors for the document's global primitives.
//!
//! Each interceptor owns an install/restore lifecycle: install is
//! idempotent, the original binding is preserved and always delegated to
//! after the agent has recorded what it needs (delegate-after-record), and
//! `restore` puts the original binding back.

use std::cell::RefCell;
use std::rc::Rc;

use arcadescan_bridge::{ConsoleLevel, ConsolePayload, ErrorPayload, Telemetry};
use serde_json::Value;

use crate::context::AgentContext;
use crate::platform::{
    ConsoleSlot, ConsoleWriteFn, DocumentHost, ErrorHandlerFn, ErrorSlot, FrameCallback,
    ScheduleFn, SchedulerSlot, TelemetrySink, UncaughtError,
};

/// Wraps the per-frame scheduling primitive so every callback the embedded
/// program schedules first records a frame timestamp, then attempts the
/// one-time readiness emission, then runs unmodified.
#[derive(Default)]
pub struct FrameInterceptor {
    original: Option<ScheduleFn>,
}

impl FrameInterceptor {
    pub fn is_installed(&self) -> bool {
        self.original.is_some()
    }

    pub fn install(
        &mut self,
        slot: &dyn SchedulerSlot,
        ctx: Rc<RefCell<AgentContext>>,
        host: Rc<dyn DocumentHost>,
        sink: Rc<dyn TelemetrySink>,
    ) {
        if self.is_installed() {
            return;
        }
        let original = slot.get();
        self.original = Some(original.clone());

        let wrapper: ScheduleFn = Rc::new(move |callback: FrameCallback| {
            let ctx = ctx.clone();
            let host = host.clone();
            let sink = sink.clone();
            let mut callback = callback;
            original(Box::new(move |ts| {
                ctx.borrow_mut().on_frame(ts, host.as_ref(), sink.as_ref());
                callback(ts);
            }));
        });
        slot.set(wrapper);
    }

    pub fn restore(&mut self, slot: &dyn SchedulerSlot) {
        if let Some(original) = self.original.take() {
            slot.set(original);
        }
    }
}

/// Wraps the four standard logging severities to forward `{level, args}`
/// over the bridge without suppressing the original output.
#[derive(Default)]
pub struct ConsoleInterceptor {
    originals: Vec<(ConsoleLevel, ConsoleWriteFn)>,
}

impl ConsoleInterceptor {
    pub const LEVELS: [ConsoleLevel; 4] = [
        ConsoleLevel::Log,
        ConsoleLevel::Info,
        ConsoleLevel::Warn,
        ConsoleLevel::Error,
    ];

    pub fn is_installed(&self) -> bool {
        !self.originals.is_empty()
    }

    pub fn install(&mut self, slot: &dyn ConsoleSlot, sink: Rc<dyn TelemetrySink>) {
        if self.is_installed() {
            return;
        }
        for level in Self::LEVELS {
            let original = slot.get(level);
            self.originals.push((level, original.clone()));
            let sink = sink.clone();
            let wrapper: ConsoleWriteFn = Rc::new(move |args: &[Value]| {
                sink.emit(Telemetry::Console(ConsolePayload {
                    level,
                    args: args.to_vec(),
                }));
                original(args);
            });
            slot.set(level, wrapper);
        }
    }

    pub fn restore(&mut self, slot: &dyn ConsoleSlot) {
        for (level, original) in self.originals.drain(..) {
            slot.set(level, original);
        }
    }
}

/// Installs the global uncaught-error handler, forwarding the error over
/// the bridge and delegating to any previously installed handler.
#[derive(Default)]
pub struct ErrorHook {
    installed: bool,
    previous: Option<ErrorHandlerFn>,
}

impl ErrorHook {
    pub fn is_installed(&self) -> bool {
        self.installed
    }

    pub fn install(
        &mut self,
        slot: &dyn ErrorSlot,
        ctx: Rc<RefCell<AgentContext>>,
        sink: Rc<dyn TelemetrySink>,
    ) {
        if self.installed {
            return;
        }
        let previous = slot.get();
        self.previous = previous.clone();

        let handler: ErrorHandlerFn = Rc::new(move |err: &UncaughtError| {
            ctx.borrow_mut().record_error();
            sink.emit(Telemetry::Error(ErrorPayload {
                message: err.message.clone(),
                source: err.source.clone(),
                line: err.line,
                column: err.column,
                stack: err.stack.clone(),
            }));
            if let Some(prev) = &previous {
                prev(err);
            }
        });
        slot.set(Some(handler));
        self.installed = true;
    }

    pub fn restore(&mut self, slot: &dyn ErrorSlot) {
        if self.installed {
            slot.set(self.previous.take());
            self.installed = false;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Tuning;
    use crate::platform::fakes::{CollectingSink, FakeConsole, FakeErrorSlot, FakeHost, FakeScheduler};
    use serde_json::json;

    fn wired() -> (
        Rc<RefCell<AgentContext>>,
        Rc<crate::platform::fakes::FakeHost>,
        Rc<CollectingSink>,
    ) {
        (
            Rc::new(RefCell::new(AgentContext::new(Tuning::default()))),
            FakeHost::with_surface(320, 240),
            Rc::new(CollectingSink::default()),
        )
    }

    #[test]
    fn double_install_intercepts_each_frame_once() {
        let (ctx, host, sink) = wired();
        let scheduler = FakeScheduler::new();
        let mut interceptor = FrameInterceptor::default();

        interceptor.install(&scheduler, ctx.clone(), host.clone(), sink.clone());
        interceptor.install(&scheduler, ctx.clone(), host.clone(), sink.clone());

        scheduler.pump(16.0);
        scheduler.pump(32.0);

        assert_eq!(ctx.borrow().frame_samples(), 2, "frames double-counted");
    }

    #[test]
    fn frame_wrapper_delegates_to_program_callback() {
        let (ctx, host, sink) = wired();
        let scheduler = FakeScheduler::new();
        let mut interceptor = FrameInterceptor::default();
        interceptor.install(&scheduler, ctx.clone(), host, sink);

        let seen = Rc::new(RefCell::new(Vec::new()));
        let seen2 = seen.clone();
        scheduler.schedule(Box::new(move |ts| seen2.borrow_mut().push(ts)));
        scheduler.run_next(16.7);

        assert_eq!(*seen.borrow(), vec![16.7]);
        assert_eq!(ctx.borrow().frame_samples(), 1);
    }

    #[test]
    fn restore_puts_original_scheduler_back() {
        let (ctx, host, sink) = wired();
        let scheduler = FakeScheduler::new();
        let mut interceptor = FrameInterceptor::default();
        interceptor.install(&scheduler, ctx.clone(), host, sink);
        interceptor.restore(&scheduler);

        scheduler.pump(16.0);
        assert_eq!(ctx.borrow().frame_samples(), 0);
    }

    #[test]
    fn console_forwarding_preserves_original_output() {
        let sink = Rc::new(CollectingSink::default());
        let console = FakeConsole::new();
        let mut interceptor = ConsoleInterceptor::default();
        interceptor.install(&console, sink.clone());

        let warn = console.get(ConsoleLevel::Warn);
        warn(&[json!("low fuel"), json!(3)]);

        // Original write still happened.
        assert_eq!(console.written.borrow().len(), 1);
        assert_eq!(console.written.borrow()[0].0, ConsoleLevel::Warn);
        // And a console telemetry message was emitted.
        let messages = sink.messages.borrow();
        match &messages[0] {
            Telemetry::Console(payload) => {
                assert_eq!(payload.level, ConsoleLevel::Warn);
                assert_eq!(payload.args, vec![json!("low fuel"), json!(3)]);
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn error_hook_forwards_and_counts() {
        let ctx = Rc::new(RefCell::new(AgentContext::new(Tuning::default())));
        let sink = Rc::new(CollectingSink::default());
        let slot = FakeErrorSlot::default();
        let mut hook = ErrorHook::default();
        hook.install(&slot, ctx.clone(), sink.clone());

        let handler = slot.get().unwrap();
        handler(&UncaughtError {
            message: "boom".into(),
            source: Some("game.js".into()),
            line: Some(10),
            column: Some(2),
            stack: None,
        });

        assert_eq!(ctx.borrow().errors_reported(), 1);
        match &sink.messages.borrow()[0] {
            Telemetry::Error(payload) => assert_eq!(payload.message, "boom"),
            other => panic!("unexpected: {other:?}"),
        };
    }
}

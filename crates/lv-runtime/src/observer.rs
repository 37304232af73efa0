//! The operator channel.

use lv_capability::{CompileError, InvocationError};
use lv_compose::DeferredTask;
use lv_core::{BehaviorKind, InstanceId};
use lv_distribution::{DistributionError, SessionKey};
use lv_registry::LoadReport;
use tracing::{info, warn};

/// Callbacks invoked while a world handles messages.
///
/// All methods have default no-op implementations so implementors only need
/// to override what they care about.  `tier` says which world raised the
/// report.
///
/// # Example — counting failures
///
/// ```rust,ignore
/// #[derive(Default)]
/// struct Failures(usize);
///
/// impl RuntimeObserver for Failures {
///     fn on_invocation_error(&mut self, _: BehaviorKind, _: InstanceId, _: &InvocationError) {
///         self.0 += 1;
///     }
/// }
/// ```
pub trait RuntimeObserver {
    /// A behavior's source failed to compile.  Its previous code stays in
    /// effect.
    fn on_compile_error(&mut self, _tier: BehaviorKind, _error: &CompileError) {}

    /// A capability method failed.  Handling of the triggering message
    /// continued.
    fn on_invocation_error(&mut self, _tier: BehaviorKind, _instance: InstanceId, _error: &InvocationError) {}

    /// A deferred task whose instance or behavior no longer exists.
    fn on_orphaned_task(&mut self, _tier: BehaviorKind, _task: &DeferredTask) {}

    /// A load completed.
    fn on_load(&mut self, _report: &LoadReport) {}

    /// A distribution round was applied; the module set should be persisted.
    fn on_persist_requested(&mut self, _session: SessionKey) {}

    /// A distribution payload was rejected before reaching the registry.
    fn on_rejected_payload(&mut self, _error: &DistributionError) {}

    /// A `log` from capability code.
    fn on_log(&mut self, _tier: BehaviorKind, _instance: InstanceId, _message: &str) {}
}

/// A [`RuntimeObserver`] that does nothing.
pub struct NoopObserver;

impl RuntimeObserver for NoopObserver {}

/// A [`RuntimeObserver`] that reports everything through `tracing`.
pub struct TracingObserver;

impl RuntimeObserver for TracingObserver {
    fn on_compile_error(&mut self, tier: BehaviorKind, error: &CompileError) {
        warn!(%tier, %error, "compile error");
    }

    fn on_invocation_error(&mut self, tier: BehaviorKind, instance: InstanceId, error: &InvocationError) {
        warn!(%tier, %instance, %error, "invocation error");
    }

    fn on_orphaned_task(&mut self, tier: BehaviorKind, task: &DeferredTask) {
        warn!(%tier, instance = %task.instance, task = %task.describe(), "orphaned deferred task dropped");
    }

    fn on_load(&mut self, report: &LoadReport) {
        info!(
            modules = report.names.len(),
            changed = report.changed.len(),
            removed = report.removed.len(),
            failures = report.failures.len(),
            "modules loaded"
        );
    }

    fn on_persist_requested(&mut self, session: SessionKey) {
        info!(%session, "persist requested");
    }

    fn on_rejected_payload(&mut self, error: &DistributionError) {
        warn!(%error, "distribution payload rejected");
    }

    fn on_log(&mut self, tier: BehaviorKind, instance: InstanceId, message: &str) {
        info!(%tier, %instance, "{message}");
    }
}

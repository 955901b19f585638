//! Queue error types.

use gatehouse_core::TargetId;

/// Why an admitted (or refused) request did not resolve.
///
/// `E` is the executor's own error type; the engine carries it through
/// without inspecting it.
#[derive(Debug, thiserror::Error)]
pub enum QueueError<E> {
    /// The target's waiting list was full at admission.
    #[error("queue full for target '{0}'")]
    Full(TargetId),

    /// The deadline elapsed, either while waiting or mid-upstream.
    #[error("deadline exceeded for target '{0}'")]
    Timeout(TargetId),

    /// The executor failed; the inner error is the executor's.
    #[error("upstream executor failed")]
    Executor(E),

    /// The executor task died without delivering a result.
    #[error("executor task crashed")]
    Crashed,

    /// The engine was shut down before or while this item was pending.
    #[error("queue engine shut down")]
    Shutdown,
}

/// Result type for queue operations.
pub type QueueResult<T, E> = Result<T, QueueError<E>>;

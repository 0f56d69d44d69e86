//! Request-scoped "current channel" binding (spec section 4.5/5): resource
//! callbacks reach the channel bound to the operation they're running
//! inside of, without it being passed down through every call. Backed by
//! `tokio::task_local!`, which is per-task rather than per-thread, so
//! concurrently-running plans never observe each other's channel.

use std::future::Future;
use std::sync::Arc;

use crate::channel::ExecutionChannel;

tokio::task_local! {
    static CURRENT_CHANNEL: Arc<ExecutionChannel>;
}

/// Run `f` with `channel` bound as the current channel for its duration,
/// including when `f` returns an error or panics.
pub async fn with_channel<F, T>(channel: Arc<ExecutionChannel>, f: F) -> T
where
    F: Future<Output = T>,
{
    CURRENT_CHANNEL.scope(channel, f).await
}

/// The channel bound by the innermost enclosing `with_channel` call.
///
/// # Panics
/// Panics if called outside of `with_channel` — every `ResourceController`
/// or `StatefulParameter` callback the plugin host invokes runs inside one.
pub fn current_channel() -> Arc<ExecutionChannel> {
    CURRENT_CHANNEL.with(|c| c.clone())
}

pub fn try_current_channel() -> Option<Arc<ExecutionChannel>> {
    CURRENT_CHANNEL.try_with(|c| c.clone()).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn current_channel_is_visible_inside_scope() {
        let channel = Arc::new(ExecutionChannel::spawn_shell().unwrap());
        let id = channel.id();

        with_channel(channel.clone(), async {
            assert_eq!(current_channel().id(), id);
        })
        .await;

        channel.kill().await;
    }

    #[tokio::test]
    async fn current_channel_is_absent_outside_scope() {
        assert!(try_current_channel().is_none());
    }
}

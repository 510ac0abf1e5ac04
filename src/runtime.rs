//! where generation futures run.
//!
//! on native we drive requests on a tokio runtime so neither the main thread
//! nor bevy's task pools block on network io; on wasm we use bevy's async
//! compute pool, which yields to the browser event loop.

use std::future::Future;

use bevy::prelude::*;

/// detaches fire-and-forget futures onto the platform executor.
#[derive(Clone, Debug)]
pub struct Dispatcher {
    #[cfg(not(target_arch = "wasm32"))]
    handle: tokio::runtime::Handle,
}

impl Dispatcher {
    #[cfg(not(target_arch = "wasm32"))]
    pub fn new(handle: tokio::runtime::Handle) -> Self {
        Self { handle }
    }

    /// dispatcher for the tokio runtime the caller is running inside.
    #[cfg(not(target_arch = "wasm32"))]
    pub fn current() -> Result<Self, tokio::runtime::TryCurrentError> {
        tokio::runtime::Handle::try_current().map(Self::new)
    }

    #[cfg(target_arch = "wasm32")]
    pub fn new() -> Self {
        Self {}
    }

    pub fn spawn<F>(&self, fut: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        #[cfg(not(target_arch = "wasm32"))]
        {
            self.handle.spawn(fut);
        }
        #[cfg(target_arch = "wasm32")]
        {
            bevy::tasks::AsyncComputeTaskPool::get().spawn(fut).detach();
        }
    }
}

/// tokio runtime owned by the app on native targets.
#[cfg(not(target_arch = "wasm32"))]
#[derive(Resource, Clone)]
pub struct TokioRt(pub std::sync::Arc<tokio::runtime::Runtime>);

#[cfg(not(target_arch = "wasm32"))]
impl TokioRt {
    pub fn dispatcher(&self) -> Dispatcher {
        Dispatcher::new(self.0.handle().clone())
    }
}

#[cfg(not(target_arch = "wasm32"))]
impl Default for TokioRt {
    fn default() -> Self {
        info!(target: "bevy_chat_pipeline", "initializing tokio multi-thread runtime (native)");
        let rt = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .enable_all()
            .build()
            .expect("tokio runtime");
        Self(std::sync::Arc::new(rt))
    }
}

#[cfg(all(test, not(target_arch = "wasm32")))]
mod tests {
    use super::*;

    #[test]
    fn dispatcher_requires_a_runtime_context() {
        assert!(Dispatcher::current().is_err());
    }

    #[test]
    fn owned_runtime_runs_detached_work() {
        let rt = TokioRt::default();
        let (tx, rx) = flume::bounded(1);
        rt.dispatcher().spawn(async move {
            let _ = tx.send(42);
        });
        assert_eq!(rx.recv_timeout(std::time::Duration::from_secs(5)), Ok(42));
    }
}

//! A backend whose `test` operation allows three concurrent callers.
//!
//! Each call hands back a deferred result right away; the permit is held
//! until the action behind it finishes. Six callers race for three permits,
//! so three run and three are rejected.

use bulkhead_guard::{Bulkhead, BulkheadError, ExecutionOutcome};
use std::time::Duration;
use tokio::task::JoinHandle;

struct Backend {
    bulkhead: Bulkhead,
}

impl Backend {
    fn new() -> Self {
        Self {
            bulkhead: Bulkhead::builder()
                .max_concurrent_calls(3)
                .name("backend")
                .on_call_rejected(|reason| println!("  rejected ({})", reason.as_str()))
                .build(),
        }
    }

    /// Starts `action` and returns its deferred result.
    async fn test<F>(&self, action: F) -> Result<JoinHandle<Result<String, String>>, BulkheadError>
    where
        F: FnOnce() -> Result<String, String> + Send + 'static,
    {
        self.bulkhead
            .spawn(|| async move {
                tokio::time::sleep(Duration::from_millis(200)).await;
                action()
            })
            .await
    }
}

#[tokio::main]
async fn main() {
    let backend = Backend::new();
    let mut running = Vec::new();

    for i in 0..6 {
        match backend.test(move || Ok(format!("action {} done", i))).await {
            Ok(handle) => {
                println!("call {} admitted", i);
                running.push(handle);
            }
            Err(err) => println!("call {}: {}", i, err),
        }
    }

    for handle in running {
        match handle.await {
            Ok(Ok(value)) => println!("  {}", value),
            Ok(Err(err)) => println!("  failed: {}", err),
            Err(join_err) => println!("  task aborted: {}", join_err),
        }
    }

    // The permits are back once every deferred result has resolved.
    let outcome: ExecutionOutcome<&str, ()> = backend.bulkhead.run(|| async { Ok("after") }).await;
    println!("follow-up call: {:?}", outcome);
    println!("{:?}", backend.bulkhead.snapshot());
}

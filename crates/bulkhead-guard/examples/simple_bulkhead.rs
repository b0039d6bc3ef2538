use std::time::Duration;
use bulkhead_guard::{Bulkhead, BulkheadError};
use tower::{Service, ServiceBuilder, ServiceExt};

#[tokio::main]
async fn main() {
    println!("Simple Bulkhead Example\n");

    // Allow 5 concurrent calls and let 10 more wait up to a second
    let bulkhead = Bulkhead::builder()
        .max_concurrent_calls(5)
        .max_queued_calls(Some(10))
        .max_wait_duration(Some(Duration::from_secs(1)))
        .name("api-bulkhead")
        .build();

    let service = tower::service_fn(|req: String| async move {
        println!("Processing: {}", req);
        tokio::time::sleep(Duration::from_millis(100)).await;
        Ok::<_, BulkheadError>(format!("Response to: {}", req))
    });

    let mut bulkhead_service = ServiceBuilder::new()
        .layer(bulkhead.layer())
        .service(service);

    for i in 1..=3 {
        match bulkhead_service.ready().await {
            Ok(svc) => match svc.call(format!("Request {}", i)).await {
                Ok(response) => println!("{}", response),
                Err(e) => println!("Error: {}", e),
            },
            Err(e) => println!("Error: {}", e),
        }
    }

    println!("\n{:?}", bulkhead.snapshot());
}

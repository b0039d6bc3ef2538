//! Tower layer implementation for the bulkhead.

use crate::bulkhead::Bulkhead;
use crate::service::BulkheadService;
use tower::Layer;

/// Layer that runs every request of the wrapped service under a bulkhead
/// permit.
///
/// All services produced by one layer share its bulkhead, so the capacity
/// bounds the combined concurrency of every clone and every wrapped service.
#[derive(Clone, Debug)]
pub struct BulkheadLayer {
    bulkhead: Bulkhead,
}

impl BulkheadLayer {
    /// Creates a layer around an existing bulkhead.
    pub fn new(bulkhead: Bulkhead) -> Self {
        Self { bulkhead }
    }

    /// The bulkhead shared by services from this layer.
    pub fn bulkhead(&self) -> &Bulkhead {
        &self.bulkhead
    }
}

impl From<Bulkhead> for BulkheadLayer {
    fn from(bulkhead: Bulkhead) -> Self {
        Self::new(bulkhead)
    }
}

impl<S> Layer<S> for BulkheadLayer {
    type Service = BulkheadService<S>;

    fn layer(&self, service: S) -> Self::Service {
        BulkheadService::new(service, self.bulkhead.clone())
    }
}

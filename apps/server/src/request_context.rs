//! Per-request context injected by middleware.

#[derive(Debug, Clone)]
pub struct RequestContext {
    /// Server-assigned id, returned as `x-request-id`.
    pub request_id: String,
    /// Id the client sent in `x-request-id`, if any.
    pub correlation_id: Option<String>,
}

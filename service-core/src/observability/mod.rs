pub mod logging;
pub mod trace_context;

pub use logging::init_tracing;
pub use trace_context::{
    REQUEST_ID_HEADER, TRACEPARENT_HEADER, TracedClientExt, TracedRequest, current_request_id,
    extract_request_id, inject_trace_context, inject_trace_headers, with_request_id,
};

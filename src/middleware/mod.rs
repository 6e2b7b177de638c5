mod client_ctx;

pub use client_ctx::{extract_token, ClientCtx, ClientCtxInner};

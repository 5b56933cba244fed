//! HTTP middleware

pub mod request_id;
pub mod timing;

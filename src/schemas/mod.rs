use std::collections::HashMap;

use serde::Serialize;

pub(crate) mod tryout;

#[derive(Debug, Serialize)]
pub(crate) struct HealthResponse {
    pub(crate) service: String,
    pub(crate) status: String,
    pub(crate) components: HashMap<String, String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct RootResponse {
    pub(crate) message: String,
    pub(crate) version: String,
    pub(crate) api_prefix: String,
}

/// Uniform success body.
#[derive(Debug, Serialize)]
pub(crate) struct Envelope<T> {
    pub(crate) code: u16,
    pub(crate) message: String,
    pub(crate) data: T,
}

impl<T> Envelope<T> {
    pub(crate) fn ok(data: T) -> Self {
        Self::with_message(200, "OK", data)
    }

    pub(crate) fn created(data: T) -> Self {
        Self::with_message(201, "Created", data)
    }

    pub(crate) fn with_message(code: u16, message: &str, data: T) -> Self {
        Self { code, message: message.to_string(), data }
    }
}

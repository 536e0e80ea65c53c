//! Shared response envelope types for API handlers.
//!
//! All API responses use a `{ "data": ... }` envelope.

use serde::Serialize;

use journey_core::progression::Effect;

/// Standard `{ "data": T }` response envelope.
#[derive(Debug, Serialize)]
pub struct DataResponse<T: Serialize> {
    pub data: T,
}

/// A transition result: the payload plus the effects that were applied.
#[derive(Debug, Serialize)]
pub struct TransitionResponse<T: Serialize> {
    pub data: T,
    pub effects: Vec<Effect>,
}

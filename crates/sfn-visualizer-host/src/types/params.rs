//! Request parameter types for the visualizer methods.

use serde::{Deserialize, Serialize};

use sfn_visualizer::Document;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VisualizeParams {
    /// The active document; absent when nothing is open.
    #[serde(default)]
    pub document: Option<Document>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UriParams {
    pub uri: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetLogLevelParams {
    pub level: String,
}

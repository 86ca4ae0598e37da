//! API Models
//!
//! Response bodies for the REST endpoints, annotated for OpenAPI
//! documentation with `utoipa`.

use serde::Serialize;
use titia_core::tool::ToolConfig;
use utoipa::ToSchema;

#[derive(Serialize, ToSchema, Debug, Clone, PartialEq, Eq)]
pub struct ToolSummary {
    #[schema(example = "FIGMA")]
    pub id: String,
    #[schema(example = "Figma Mastery")]
    pub name: String,
    #[schema(example = "figma")]
    pub icon: String,
    pub description: String,
    /// Gradient stops for the tool card.
    #[schema(example = json!(["#FF7262", "#A259FF"]))]
    pub accent: Vec<String>,
}

impl From<&ToolConfig> for ToolSummary {
    fn from(tool: &ToolConfig) -> Self {
        Self {
            id: tool.id.to_string(),
            name: tool.name.to_string(),
            icon: tool.icon.to_string(),
            description: tool.description.to_string(),
            accent: tool.accent.iter().map(|c| c.to_string()).collect(),
        }
    }
}

#[derive(Serialize, ToSchema, Debug)]
pub struct HealthResponse {
    #[schema(example = "ok")]
    pub status: String,
    #[schema(example = "gemini")]
    pub provider: String,
}

#[derive(Serialize, ToSchema)]
pub struct ErrorResponse {
    pub message: String,
}

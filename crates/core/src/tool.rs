use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// The mocked tools a session can be run against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ToolKind {
    Figma,
    Blender,
    CProg,
    Crypto,
}

impl ToolKind {
    pub const ALL: [ToolKind; 4] = [
        ToolKind::Figma,
        ToolKind::Blender,
        ToolKind::CProg,
        ToolKind::Crypto,
    ];

    /// Wire identifier, matching the serde representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            ToolKind::Figma => "FIGMA",
            ToolKind::Blender => "BLENDER",
            ToolKind::CProg => "C_PROG",
            ToolKind::Crypto => "CRYPTO",
        }
    }
}

impl fmt::Display for ToolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown tool: '{0}'")]
pub struct UnknownTool(pub String);

impl FromStr for ToolKind {
    type Err = UnknownTool;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ToolKind::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| UnknownTool(s.to_string()))
    }
}

/// Display metadata for a selectable tool.
///
/// A session picks exactly one of these at start and keeps it until the
/// session is torn down.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToolConfig {
    pub id: ToolKind,
    pub name: &'static str,
    pub icon: &'static str,
    pub description: &'static str,
    /// Gradient stops used by clients to tint the tool card.
    pub accent: [&'static str; 2],
}

impl ToolConfig {
    pub fn for_kind(kind: ToolKind) -> Self {
        match kind {
            ToolKind::Figma => Self {
                id: kind,
                name: "Figma Mastery",
                icon: "figma",
                description: "Cloud-native Design Engine.",
                accent: ["#FF7262", "#A259FF"],
            },
            ToolKind::Blender => Self {
                id: kind,
                name: "Blender 3D",
                icon: "blender",
                description: "Remote GPU Neural Render.",
                accent: ["#EA7600", "#27A1E1"],
            },
            ToolKind::CProg => Self {
                id: kind,
                name: "System Kernel",
                icon: "code",
                description: "Virtual Runtime Lab.",
                accent: ["#00599C", "#004482"],
            },
            ToolKind::Crypto => Self {
                id: kind,
                name: "Quant Flow",
                icon: "trending",
                description: "High-freq cloud harmonics.",
                accent: ["#00FFA3", "#0052FF"],
            },
        }
    }
}

/// The full tool catalog, in display order.
pub fn catalog() -> Vec<ToolConfig> {
    ToolKind::ALL.into_iter().map(ToolConfig::for_kind).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tool_kind_wire_names() {
        assert_eq!(serde_json::to_string(&ToolKind::CProg).unwrap(), "\"C_PROG\"");
        let parsed: ToolKind = serde_json::from_str("\"BLENDER\"").unwrap();
        assert_eq!(parsed, ToolKind::Blender);
    }

    #[test]
    fn test_tool_kind_from_str_is_case_insensitive() {
        assert_eq!("figma".parse::<ToolKind>(), Ok(ToolKind::Figma));
        assert_eq!("c_prog".parse::<ToolKind>(), Ok(ToolKind::CProg));
        assert_eq!(
            "photoshop".parse::<ToolKind>(),
            Err(UnknownTool("photoshop".to_string()))
        );
    }

    #[test]
    fn test_catalog_covers_every_tool_once() {
        let tools = catalog();
        assert_eq!(tools.len(), ToolKind::ALL.len());
        for (tool, kind) in tools.iter().zip(ToolKind::ALL) {
            assert_eq!(tool.id, kind);
            assert!(!tool.name.is_empty());
        }
        assert_eq!(ToolConfig::for_kind(ToolKind::Crypto).name, "Quant Flow");
    }
}

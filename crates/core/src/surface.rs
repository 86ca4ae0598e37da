//! Read-only descriptions of the mocked tool surfaces.
//!
//! Every mock exposes the same three regions (`toolbar`, `layers`, `canvas`)
//! under tool-specific labels. Clients draw the surface from a [`SurfaceView`]
//! and emphasize whichever region is flagged; nothing flows back.

use crate::tool::ToolKind;
use serde::Serialize;

pub const REGION_IDS: [&str; 3] = ["toolbar", "layers", "canvas"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegionView {
    pub id: &'static str,
    pub label: &'static str,
    pub highlighted: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SurfaceView {
    pub tool: ToolKind,
    pub title: &'static str,
    pub regions: Vec<RegionView>,
}

impl SurfaceView {
    pub fn highlighted(&self) -> Option<&RegionView> {
        self.regions.iter().find(|r| r.highlighted)
    }
}

fn labels(kind: ToolKind) -> (&'static str, [&'static str; 3]) {
    match kind {
        ToolKind::Figma => ("Figma", ["Toolbar", "Layers", "Canvas"]),
        ToolKind::Blender => ("Blender", ["Tool Shelf", "Scene Collection", "Viewport"]),
        ToolKind::CProg => ("System Kernel", ["Activity Bar", "Explorer", "Editor"]),
        ToolKind::Crypto => ("Market Flow", ["Asset Rail", "Order Flow", "Price Chart"]),
    }
}

/// Renders the surface for `kind`, flagging the region named by `highlight`.
/// Unknown region ids flag nothing.
pub fn render_surface(kind: ToolKind, highlight: Option<&str>) -> SurfaceView {
    let (title, region_labels) = labels(kind);
    let regions = REGION_IDS
        .into_iter()
        .zip(region_labels)
        .map(|(id, label)| RegionView {
            id,
            label,
            highlighted: highlight == Some(id),
        })
        .collect();
    SurfaceView {
        tool: kind,
        title,
        regions,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exactly_the_requested_region_is_highlighted() {
        for kind in ToolKind::ALL {
            for id in REGION_IDS {
                let view = render_surface(kind, Some(id));
                assert_eq!(view.regions.len(), 3);
                assert_eq!(view.regions.iter().filter(|r| r.highlighted).count(), 1);
                assert_eq!(view.highlighted().map(|r| r.id), Some(id));
            }
        }
    }

    #[test]
    fn test_no_or_unknown_highlight_flags_nothing() {
        assert!(render_surface(ToolKind::Blender, None).highlighted().is_none());
        assert!(
            render_surface(ToolKind::Blender, Some("timeline"))
                .highlighted()
                .is_none()
        );
    }

    #[test]
    fn test_labels_are_tool_specific() {
        let view = render_surface(ToolKind::Blender, Some("canvas"));
        assert_eq!(view.highlighted().map(|r| r.label), Some("Viewport"));
    }
}

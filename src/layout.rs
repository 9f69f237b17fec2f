//! Graph layout: node descriptors -> positioned nodes.
//!
//! Resource nodes sit on one horizontal row centered on x = 0, the focal node
//! sits at a fixed anchor below that row. Positions depend only on the input
//! order and the focal/resource partition, so the same input always produces
//! the same layout.

use serde::{Deserialize, Serialize};

use crate::model::NodeDescriptor;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LayoutConfig {
    /// Horizontal distance between neighbouring resource nodes
    pub pitch: f64,
    pub resource_row_y: f64,
    pub focal_anchor: (f64, f64),
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            pitch: 350.0,
            resource_row_y: 0.0,
            focal_anchor: (0.0, 300.0),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionedNode {
    pub node: NodeDescriptor,
    pub x: f64,
    pub y: f64,
    pub focused: bool,
    pub hidden: bool,
}

/// Lay out `nodes`, preserving their order.
pub fn layout(nodes: &[NodeDescriptor], cfg: &LayoutConfig) -> Vec<PositionedNode> {
    let count = nodes.iter().filter(|n| n.is_resource()).count();
    // count = 0 means there is no resource row at all
    let start_x = if count > 0 {
        -((count - 1) as f64 * cfg.pitch) / 2.0
    } else {
        0.0
    };

    let mut slot = 0usize;
    nodes
        .iter()
        .map(|node| {
            if node.is_focal() {
                PositionedNode {
                    node: node.clone(),
                    x: cfg.focal_anchor.0,
                    y: cfg.focal_anchor.1,
                    focused: false,
                    hidden: false,
                }
            } else {
                let x = start_x + slot as f64 * cfg.pitch;
                slot += 1;
                PositionedNode {
                    node: node.clone(),
                    x,
                    y: cfg.resource_row_y,
                    focused: true,
                    hidden: false,
                }
            }
        })
        .collect()
}

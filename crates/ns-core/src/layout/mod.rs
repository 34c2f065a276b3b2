//! Breakpoint-driven view composition
//!
//! Layout is a pure function of the breakpoint. It decides which views are
//! visible at once, never what data they hold, so crossing a breakpoint never
//! refetches anything.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::query::ViewKind;

/// Discrete viewport-size classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Breakpoint {
    ExtraSmall,
    Small,
    Medium,
    Large,
    #[default]
    ExtraLarge,
    Infinity,
}

impl Breakpoint {
    /// Classify a viewport width in pixels
    pub fn from_width(width: u32) -> Self {
        match width {
            0..=479 => Breakpoint::ExtraSmall,
            480..=767 => Breakpoint::Small,
            768..=991 => Breakpoint::Medium,
            992..=1199 => Breakpoint::Large,
            1200..=1439 => Breakpoint::ExtraLarge,
            _ => Breakpoint::Infinity,
        }
    }
}

impl fmt::Display for Breakpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Breakpoint::ExtraSmall => "extraSmall",
            Breakpoint::Small => "small",
            Breakpoint::Medium => "medium",
            Breakpoint::Large => "large",
            Breakpoint::ExtraLarge => "extraLarge",
            Breakpoint::Infinity => "infinity",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    /// Smallest breakpoint that gets the two-column layout
    pub two_column_from: Breakpoint,
    /// Fixed width of the table column in two-column layouts
    pub table_width: u32,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            two_column_from: Breakpoint::ExtraLarge,
            table_width: 1024,
        }
    }
}

/// Which views are shown and how they are arranged
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LayoutPlan {
    /// Tabbed navigation; every view stays subscribed, one is shown
    OneColumn { tabs: Vec<ViewKind> },
    /// Fixed-width table on the left, the other views stacked on the right
    TwoColumn {
        table_width: u32,
        right_column: Vec<ViewKind>,
    },
}

impl LayoutPlan {
    pub fn is_two_column(&self) -> bool {
        matches!(self, LayoutPlan::TwoColumn { .. })
    }

    /// Views shown simultaneously when `active` is the selected tab
    pub fn visible(&self, active: ViewKind) -> Vec<ViewKind> {
        match self {
            LayoutPlan::OneColumn { tabs } => tabs.iter().copied().filter(|kind| *kind == active).collect(),
            LayoutPlan::TwoColumn { right_column, .. } => {
                let mut visible = vec![ViewKind::Table];
                visible.extend(right_column.iter().copied());
                visible
            }
        }
    }

    /// Every view that is mounted and kept current
    pub fn mounted(&self) -> Vec<ViewKind> {
        match self {
            LayoutPlan::OneColumn { tabs } => tabs.clone(),
            LayoutPlan::TwoColumn { right_column, .. } => {
                let mut mounted = vec![ViewKind::Table];
                mounted.extend(right_column.iter().copied());
                mounted
            }
        }
    }
}

/// Map a breakpoint to a layout plan
pub fn compose_layout(breakpoint: Breakpoint, config: &LayoutConfig) -> LayoutPlan {
    if breakpoint >= config.two_column_from {
        LayoutPlan::TwoColumn {
            table_width: config.table_width,
            right_column: vec![ViewKind::Map, ViewKind::Chart],
        }
    } else {
        LayoutPlan::OneColumn {
            tabs: ViewKind::ALL.to_vec(),
        }
    }
}

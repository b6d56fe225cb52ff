//! Engine configuration.

use corkboard_geometry::{AnchorConvention, AnchorReconciler, CoordinateTransformer, LogicalSpace, SizeTable};
use serde::{Deserialize, Serialize};

use crate::error::Result;

fn default_notice_capacity() -> usize {
    64
}

/// Settings shared by every controller of a board session.
///
/// Every field has a default, so a partial JSON document is enough:
///
/// ```
/// use corkboard_sync::SyncConfig;
///
/// let config = SyncConfig::from_json(r#"{"anchor": "top_left"}"#).unwrap();
/// assert_eq!(config.space, Default::default());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Logical coordinate space: origin, span and clamp bounds.
    #[serde(default)]
    pub space: LogicalSpace,
    /// Rendered card sizes per collapse state.
    #[serde(default)]
    pub sizes: SizeTable,
    /// Which point of a card its stored coordinates denote.
    #[serde(default)]
    pub anchor: AnchorConvention,
    /// Buffered notices per subscriber before the oldest are dropped.
    #[serde(default = "default_notice_capacity")]
    pub notice_capacity: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            space: LogicalSpace::default(),
            sizes: SizeTable::default(),
            anchor: AnchorConvention::default(),
            notice_capacity: default_notice_capacity(),
        }
    }
}

impl SyncConfig {
    /// Parse and validate a JSON document.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.space.validate()?;
        Ok(())
    }

    #[must_use]
    pub fn with_space(mut self, space: LogicalSpace) -> Self {
        self.space = space;
        self
    }

    #[must_use]
    pub fn with_sizes(mut self, sizes: SizeTable) -> Self {
        self.sizes = sizes;
        self
    }

    #[must_use]
    pub fn with_anchor(mut self, anchor: AnchorConvention) -> Self {
        self.anchor = anchor;
        self
    }

    #[must_use]
    pub fn with_notice_capacity(mut self, capacity: usize) -> Self {
        self.notice_capacity = capacity;
        self
    }

    pub fn transformer(&self) -> Result<CoordinateTransformer> {
        Ok(CoordinateTransformer::new(self.space)?)
    }

    pub fn reconciler(&self) -> AnchorReconciler {
        AnchorReconciler::new(self.anchor, self.sizes)
    }
}

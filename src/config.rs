//! Bridge configuration.
//!
//! Every field has a default, so a JSON document only needs the keys it
//! changes:
//!
//! ```
//! use mesh_adapt_bridge::config::BridgeConfig;
//!
//! let cfg = BridgeConfig::from_json_str(
//!     r#"{ "precedence": "node_sets_last",
//!          "level_set": { "width": 0.1, "inner_size": 0.02, "outer_size": 0.3 } }"#,
//! ).unwrap();
//! assert!(cfg.level_set.is_some());
//! assert_eq!(cfg.adaptation.max_passes, 1000);
//! ```

use crate::algs::adapt::AdaptationRequest;
use crate::algs::classify::{ClassifyOptions, ClassifyWith, SetPrecedence, SideSetResolution};
use crate::io::flat::IdBase;
use crate::mesh_error::MeshBridgeError;
use serde::{Deserialize, Serialize};

pub use crate::algs::metric::{LevelSetMetricConfig, MetricEncoding};

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    pub classify_with: ClassifyWith,
    pub precedence: SetPrecedence,
    pub side_set_resolution: SideSetResolution,
    /// Base of node/element ids written by the serializer.
    pub id_base: IdBase,
    /// Generate a size metric from the level-set field when set.
    pub level_set: Option<LevelSetMetricConfig>,
    pub adaptation: AdaptationRequest,
}

impl BridgeConfig {
    /// Parse and validate a JSON document.
    pub fn from_json_str(json: &str) -> Result<Self, MeshBridgeError> {
        let cfg: Self = serde_json::from_str(json)
            .map_err(|e| MeshBridgeError::InvalidConfig(format!("bridge config: {e}")))?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn to_json_string(&self) -> Result<String, MeshBridgeError> {
        serde_json::to_string_pretty(self)
            .map_err(|e| MeshBridgeError::InvalidConfig(format!("bridge config: {e}")))
    }

    pub fn validate(&self) -> Result<(), MeshBridgeError> {
        if let Some(ls) = &self.level_set {
            ls.validate()?;
        }
        self.adaptation.validate()?;
        if !self.classify_with.side_sets && !self.classify_with.node_sets {
            log::warn!("neither side sets nor node sets classify; only exposure ids will be set");
        }
        Ok(())
    }

    pub fn classify_options(&self) -> ClassifyOptions {
        ClassifyOptions {
            classify_with: self.classify_with,
            precedence: self.precedence,
            side_set_resolution: self.side_set_resolution,
        }
    }
}

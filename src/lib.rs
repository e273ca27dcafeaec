//! # looptile - a small loop-nest compiler middle-end
//!
//! Represents dense array kernels as an IR tree, tiles two-level loop nests
//! into four-level blocked nests, and emits C or C++.
//!
//! ## Architecture
//!
//! ```text
//! Input → Frontend → Lowering → IR → Tiling → CodeGen → Output
//! ```
//!
//! ## Example
//!
//! ```rust
//! use looptile::prelude::*;
//!
//! let source = r#"
//!     LOOPS: i=0:N:1, j=0:M:1
//!     BODY: C[i, j] = A[i, j] + B[i, j]
//! "#;
//!
//! let kernel = looptile::parse_kernel(source, &TensorTable::with_defaults())?;
//! let tiled = looptile::tile_kernel(&kernel, &TileConfig::default())?;
//! let code = looptile::codegen::generate(&tiled, &EmitConfig::default().with_tile_size(32))?;
//! assert!(code.contains("std::min((II + T), N)"));
//! # Ok::<(), anyhow::Error>(())
//! ```

#![warn(clippy::all)]

pub mod frontend;
pub mod ir;
pub mod transform;
pub mod codegen;
pub mod utils;

// Re-export commonly used types
pub mod prelude {
    //! Convenient re-exports of commonly used types and traits.

    pub use crate::frontend::{parse, ParseError, TensorTable};
    pub use crate::ir::{
        deep_copy, Access, Assign, DType, Literal, Loop, Node, NodeKind, NodeVisitor, Tensor,
        TensorRef,
    };
    pub use crate::transform::{tile, Tiling, Transform};
    pub use crate::codegen::{EmitConfig, Target};
    pub use crate::utils::errors::*;
    pub use crate::utils::pretty::PrettyPrint;
    pub use crate::TileConfig;
}

use anyhow::Result;
use log::info;
use transform::{Tiling, Transform};
use utils::errors::TransformError;

/// Parse a kernel description and lower it to an IR tree.
pub fn parse_kernel(source: &str, tensors: &frontend::TensorTable) -> Result<ir::Node> {
    let kernel = frontend::parse(source)?;
    ir::lower_kernel(&kernel, tensors)
}

/// Configuration for the tiling stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TileConfig {
    /// Enable loop tiling
    pub enable_tiling: bool,
    /// Names used for the synthesized loops and tile size
    pub tiling: Tiling,
}

impl Default for TileConfig {
    fn default() -> Self {
        Self {
            enable_tiling: true,
            tiling: Tiling::default(),
        }
    }
}

impl TileConfig {
    pub fn with_tiling(mut self, enable: bool) -> Self {
        self.enable_tiling = enable;
        self
    }

    pub fn with_tile_symbol(mut self, symbol: impl Into<String>) -> Self {
        self.tiling = self.tiling.with_tile_symbol(symbol);
        self
    }
}

/// Run the tiling stage on a lowered kernel. The input is left untouched;
/// with tiling disabled the result is a copy of it.
pub fn tile_kernel(
    root: &ir::Node,
    config: &TileConfig,
) -> std::result::Result<ir::Node, TransformError> {
    if !config.enable_tiling {
        info!("tiling disabled");
        return Ok(ir::deep_copy(root));
    }
    info!("running {} pass", config.tiling.name());
    let tiled = config.tiling.apply(root)?;
    info!("tiled nest has {} nodes", tiled.size());
    Ok(tiled)
}

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

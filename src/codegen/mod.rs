//! Code generation from the IR.

pub mod c;

pub use c::CCodeGen;

use crate::ir::Node;
use crate::utils::errors::{CodegenError, CodegenErrorKind};
use crate::utils::pretty::CodeFormatter;
use log::{debug, info};

/// Target for code generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Target {
    /// C99, `min` through a macro
    C,
    /// C++, `min` through `std::min`
    #[default]
    Cpp,
}

/// Settings for emitting a kernel function.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmitConfig {
    pub target: Target,
    /// Function name
    pub name: String,
    /// Name of the tile-size variable
    pub tile_symbol: String,
    /// Concrete tile size; when set, the tile symbol becomes a local constant
    /// instead of a parameter
    pub tile_size: Option<i64>,
    /// Indent unit
    pub indent: String,
}

impl Default for EmitConfig {
    fn default() -> Self {
        Self {
            target: Target::default(),
            name: "kernel".to_string(),
            tile_symbol: "T".to_string(),
            tile_size: None,
            indent: "    ".to_string(),
        }
    }
}

impl EmitConfig {
    pub fn with_target(mut self, target: Target) -> Self {
        self.target = target;
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_tile_symbol(mut self, symbol: impl Into<String>) -> Self {
        self.tile_symbol = symbol.into();
        self
    }

    pub fn with_tile_size(mut self, size: i64) -> Self {
        self.tile_size = Some(size);
        self
    }

    fn validate(&self) -> Result<(), CodegenError> {
        if self.name.is_empty() {
            return Err(CodegenError {
                message: "kernel name must not be empty".to_string(),
                kind: CodegenErrorKind::InvalidConfig,
            });
        }
        if let Some(size) = self.tile_size {
            if size <= 0 {
                return Err(CodegenError {
                    message: format!("tile size must be positive, got {}", size),
                    kind: CodegenErrorKind::InvalidConfig,
                });
            }
        }
        Ok(())
    }
}

/// Render `root` as a complete kernel function named `config.name`.
pub fn generate(root: &Node, config: &EmitConfig) -> Result<String, CodegenError> {
    config.validate()?;
    info!("generating {:?} kernel '{}'", config.target, config.name);

    let codegen = CCodeGen::new(config);
    let mut f = CodeFormatter::new(&config.indent);
    codegen.emit_prelude(&mut f, &[root]);
    codegen.emit_function(&mut f, &config.name, root)?;
    Ok(f.finish())
}

/// Render the untiled and tiled versions of a kernel side by side, as
/// `untiled_<name>` and `tiled_<name>`.
pub fn generate_pair(
    untiled: &Node,
    tiled: &Node,
    config: &EmitConfig,
) -> Result<String, CodegenError> {
    config.validate()?;
    info!("generating {:?} kernel pair '{}'", config.target, config.name);

    let codegen = CCodeGen::new(config);
    let mut f = CodeFormatter::new(&config.indent);
    codegen.emit_prelude(&mut f, &[untiled, tiled]);

    let untiled_name = format!("untiled_{}", config.name);
    debug!("emitting {}", untiled_name);
    codegen.emit_function(&mut f, &untiled_name, untiled)?;
    f.newline();

    let tiled_name = format!("tiled_{}", config.name);
    debug!("emitting {}", tiled_name);
    codegen.emit_function(&mut f, &tiled_name, tiled)?;
    Ok(f.finish())
}

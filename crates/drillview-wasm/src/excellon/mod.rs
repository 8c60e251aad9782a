//! Excellon drill file parsing and the document model built from it.

pub mod classify;
pub mod context;
pub mod decode;
pub mod parser;
pub mod registry;
pub mod transform;
pub mod types;

use log::Level;

use crate::config::ExcellonConfig;
use crate::error::ExcellonError;
use crate::geometry::mesh::triangulate;
use crate::geometry::solid::{build_geometry, SolidGeometry};
use crate::geometry::types::LayerGeometry;

use self::context::{LogContext, ParseContext};
use self::registry::ToolRegistry;
use self::types::{DocumentState, Units};

/// A parsed drill file: document state, tools and derived geometry.
#[derive(Debug, Clone, PartialEq)]
pub struct ExcellonDocument {
    /// Units, zeros, formats and parser phase.
    pub state: DocumentState,
    /// Tools with their drills and slots.
    pub tools: ToolRegistry,
    /// Host defaults this document was created with.
    pub config: ExcellonConfig,
    /// Non-fatal diagnostics, in the order they were raised.
    pub warnings: Vec<String>,
    solid: Option<SolidGeometry>,
}

impl ExcellonDocument {
    /// Creates an empty document.
    pub fn new(config: ExcellonConfig) -> Self {
        Self {
            state: DocumentState::from_config(&config),
            tools: ToolRegistry::new(),
            config,
            warnings: Vec::new(),
            solid: None,
        }
    }

    /// Parses raw file bytes into this document, replacing its contents.
    ///
    /// Geometry is not built; call [`Self::build_geometry`] afterwards.
    ///
    /// Caveat: when a line is malformed or the file turns out to be G-code,
    /// the error is returned but the tools and state produced by earlier
    /// lines stay in the document.
    ///
    /// # Errors
    ///
    /// [`ExcellonError::EmptyInput`], [`ExcellonError::InvalidUtf8`],
    /// [`ExcellonError::WrongFormat`], [`ExcellonError::Malformed`] or
    /// [`ExcellonError::Cancelled`].
    pub fn parse(&mut self, data: &[u8], ctx: &mut dyn ParseContext) -> Result<(), ExcellonError> {
        if data.is_empty() {
            return Err(ExcellonError::EmptyInput);
        }
        let content = std::str::from_utf8(data)
            .map_err(|err| ExcellonError::InvalidUtf8(err.to_string()))?;
        self.parse_lines(content.lines(), ctx)
    }

    /// Parses already-split lines into this document, replacing its contents.
    ///
    /// Same semantics and caveat as [`Self::parse`].
    ///
    /// # Errors
    ///
    /// [`ExcellonError::WrongFormat`], [`ExcellonError::Malformed`] or
    /// [`ExcellonError::Cancelled`].
    pub fn parse_lines<'l, I>(
        &mut self,
        lines: I,
        ctx: &mut dyn ParseContext,
    ) -> Result<(), ExcellonError>
    where
        I: IntoIterator<Item = &'l str>,
    {
        self.state = DocumentState::from_config(&self.config);
        self.tools = ToolRegistry::new();
        self.warnings.clear();
        self.solid = None;

        let cursor = parser::parse_lines(self, lines, ctx)?;
        ctx.log(
            Level::Debug,
            &format!(
                "parsed {} tools, {} holes, {} generated diameters, units {}",
                self.tools.len(),
                self.tools.hit_count(),
                cursor.synthesized_diameters,
                self.state.units
            ),
        );
        Ok(())
    }

    /// Rebuilds every tool's polygons and the document geometry, logging
    /// skipped tools to the `log` facade.
    pub fn build_geometry(&mut self) {
        self.rebuild_geometry(&mut LogContext);
    }

    /// Same as [`Self::build_geometry`], reporting skipped tools to `ctx`.
    pub fn rebuild_geometry(&mut self, ctx: &mut dyn ParseContext) {
        let solid = build_geometry(
            &mut self.tools,
            &self.config.tool_defaults,
            self.config.quadrant_segments(),
        );
        for warning in &solid.warnings {
            ctx.log(Level::Warn, warning);
        }
        self.solid = Some(solid);
    }

    /// Drops the derived geometry; [`Self::bounds`] reports empty until the
    /// next build.
    pub fn invalidate_geometry(&mut self) {
        self.solid = None;
    }

    /// Geometry from the last build, if it is still current.
    pub const fn solid_geometry(&self) -> Option<&SolidGeometry> {
        self.solid.as_ref()
    }

    /// `(min_x, min_y, max_x, max_y)` of the solid geometry.
    ///
    /// `(0, 0, 0, 0)` when there are no tools, no geometry has been built,
    /// or nothing finite was produced.
    pub fn bounds(&self) -> (f64, f64, f64, f64) {
        if self.tools.is_empty() {
            return (0.0, 0.0, 0.0, 0.0);
        }
        self.solid
            .as_ref()
            .map_or((0.0, 0.0, 0.0, 0.0), |solid| solid.tree.bounds().as_tuple())
    }

    /// Triangle mesh of the solid geometry for a renderer.
    pub fn mesh(&self) -> LayerGeometry {
        let polygons = self
            .solid
            .as_ref()
            .map_or(&[][..], |solid| solid.polygons.as_slice());
        let mut geometry = triangulate(polygons);
        if let Some(solid) = &self.solid {
            geometry.warnings.extend(solid.warnings.iter().cloned());
        }
        geometry
    }

    /// Converts every coordinate and diameter to `units`, then rebuilds the
    /// geometry if it had been built.
    pub fn convert_units(&mut self, units: Units) {
        if self.state.units == units {
            return;
        }
        let factor = self.state.units.factor_to(units);
        self.tools.convert_units(factor);
        self.state.units = units;
        if self.solid.is_some() {
            self.build_geometry();
        }
    }
}

/// Parses `data` with `config` and builds its geometry.
///
/// Diagnostics go to the `log` facade; the parse cannot be cancelled.
///
/// # Errors
///
/// See [`ExcellonDocument::parse`].
pub fn parse(data: &[u8], config: &ExcellonConfig) -> Result<ExcellonDocument, ExcellonError> {
    let mut document = ExcellonDocument::new(config.clone());
    document.parse(data, &mut LogContext)?;
    document.build_geometry();
    Ok(document)
}

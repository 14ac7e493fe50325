//! Chemistry toolkit port: record parsing, chirality detection, rendering.

use gate_common::GateError;

/// How a molecule is drawn for a challenge
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderRequest {
    /// Longest image edge in pixels
    pub size: u32,
    pub grid_columns: u8,
    pub grid_rows: u8,
    pub draw_grid: bool,
    /// Atoms to mark in the drawing (hint mode)
    pub highlighted_atoms: Vec<u32>,
}

/// Encoded challenge image
#[derive(Debug, Clone)]
pub struct RenderedImage {
    pub png: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

/// Parsed molecule
pub trait Molecule: Send + Sync {
    /// Atom indices of the stereocentres
    fn chiral_centers(&self) -> Result<Vec<u32>, GateError>;

    fn render(&self, request: &RenderRequest) -> Result<RenderedImage, GateError>;

    /// Pixel position of `atom` in the image produced for `request`
    fn atom_coordinate(&self, request: &RenderRequest, atom: u32) -> Result<(f32, f32), GateError>;
}

/// Entry point of the chemistry collaborator
pub trait ChemistryToolkit: Send + Sync {
    /// Parse the raw record text of one compound
    fn parse(&self, record: &str) -> Result<Box<dyn Molecule>, GateError>;
}

//! Wavefront OBJ output for interface meshes.
//!
//! Faces can be grouped into materials through a caller-supplied map from
//! ball pair to RGB color; the matching MTL library is written separately.

use std::collections::BTreeMap;
use std::io::{self, Write};

use crate::interface_mesh::InterfaceMesh;
use crate::tuple::Pair;

/// RGB color with components in `[0, 1]`
pub type Color = [f64; 3];

/// Writes one [`InterfaceMesh`] as OBJ text.
pub struct ObjWriter<'a> {
    mesh: &'a InterfaceMesh,
    colors: Option<&'a BTreeMap<Pair, Color>>,
}

impl<'a> ObjWriter<'a> {
    #[must_use]
    pub const fn new(mesh: &'a InterfaceMesh) -> Self {
        Self { mesh, colors: None }
    }

    /// Group faces into one material per distinct color
    #[must_use]
    pub const fn with_colors(mut self, colors: &'a BTreeMap<Pair, Color>) -> Self {
        self.colors = Some(colors);
        self
    }

    /// Write vertices and faces. With colors, `mtllib <object_name>.mtl` is
    /// referenced and faces of uncolored pairs come first, without a material.
    ///
    /// # Errors
    /// Returns an error if writing to the output fails.
    pub fn write_obj<W: Write>(&self, mut writer: W, object_name: &str) -> io::Result<()> {
        if self.colors.is_some() {
            writeln!(writer, "mtllib {object_name}.mtl")?;
        }
        writeln!(writer, "o {object_name}")?;
        for v in &self.mesh.vertices {
            writeln!(writer, "v {:.6} {:.6} {:.6}", v.point.x, v.point.y, v.point.z)?;
        }

        let mut groups: BTreeMap<Option<String>, Vec<[usize; 3]>> = BTreeMap::new();
        for face in &self.mesh.faces {
            let material = self
                .colors
                .and_then(|colors| colors.get(&face.pair))
                .map(material_name);
            groups.entry(material).or_default().push(face.vertices);
        }
        for (material, faces) in groups {
            if let Some(name) = material {
                writeln!(writer, "usemtl {name}")?;
            }
            for [a, b, c] in faces {
                // OBJ indices are 1-based
                writeln!(writer, "f {} {} {}", a + 1, b + 1, c + 1)?;
            }
        }
        Ok(())
    }

    /// Write one material per distinct color used by the mesh.
    ///
    /// # Errors
    /// Returns an error if writing to the output fails.
    pub fn write_mtl<W: Write>(&self, mut writer: W) -> io::Result<()> {
        let Some(colors) = self.colors else {
            return Ok(());
        };
        let mut used: BTreeMap<String, Color> = BTreeMap::new();
        for face in &self.mesh.faces {
            if let Some(color) = colors.get(&face.pair) {
                used.insert(material_name(color), *color);
            }
        }
        for (name, [r, g, b]) in used {
            writeln!(writer, "newmtl {name}")?;
            writeln!(writer, "Kd {r:.4} {g:.4} {b:.4}")?;
            writeln!(writer)?;
        }
        Ok(())
    }
}

/// Material name from a color, e.g. `color_ff8000`
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn material_name(color: &Color) -> String {
    let [r, g, b] = color.map(|c| (c.clamp(0.0, 1.0) * 255.0).round() as u8);
    format!("color_{r:02x}{g:02x}{b:02x}")
}

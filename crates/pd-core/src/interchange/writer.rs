//! STEP text generation
//!
//! Writes an ISO 10303-21 exchange structure. Every record becomes a
//! `PRODUCT` with its definition chain; leaves carry a
//! `MANIFOLD_SOLID_BREP` over a `PD_ANALYTIC_SOLID` holding the analytic
//! solid, groups link their children with `NEXT_ASSEMBLY_USAGE_OCCURRENCE`.

use std::fmt::Write;

use pd_cad::{EdgeCurve, Solid};

use super::ExportOptions;
use super::naming::ShapeNode;
use crate::constants::{INTERCHANGE_CONTEXT, INTERCHANGE_SCHEMA};

/// Entity ids of the shared context entities
struct Contexts {
    product: usize,
    definition: usize,
    geometry: usize,
}

struct StepWriter {
    data: String,
    next_id: usize,
    occurrences: usize,
}

impl StepWriter {
    fn new() -> Self {
        Self {
            data: String::new(),
            next_id: 1,
            occurrences: 0,
        }
    }

    fn entity(&mut self, body: impl AsRef<str>) -> usize {
        let id = self.next_id;
        self.next_id += 1;
        let _ = writeln!(self.data, "#{}={};", id, body.as_ref());
        id
    }

    fn contexts(&mut self) -> Contexts {
        let application = self.entity(format!(
            "APPLICATION_CONTEXT({})",
            step_string(INTERCHANGE_CONTEXT)
        ));
        let product = self.entity(format!("PRODUCT_CONTEXT('',#{application},'mechanical')"));
        let definition = self.entity(format!(
            "PRODUCT_DEFINITION_CONTEXT('part definition',#{application},'design')"
        ));
        let geometry = self.entity("GEOMETRIC_REPRESENTATION_CONTEXT(3)");
        Contexts {
            product,
            definition,
            geometry,
        }
    }

    /// Write the product chain of one record
    ///
    /// Returns the ids of its PRODUCT_DEFINITION and PRODUCT_DEFINITION_SHAPE.
    fn product(&mut self, label: &str, contexts: &Contexts) -> (usize, usize) {
        let name = step_string(label);
        let product = self.entity(format!(
            "PRODUCT({name},{name},'',(#{}))",
            contexts.product
        ));
        let formation = self.entity(format!("PRODUCT_DEFINITION_FORMATION('','',#{product})"));
        let definition = self.entity(format!(
            "PRODUCT_DEFINITION('design','',#{formation},#{})",
            contexts.definition
        ));
        let shape = self.entity(format!("PRODUCT_DEFINITION_SHAPE('','',#{definition})"));
        (definition, shape)
    }

    fn node(&mut self, node: &ShapeNode, contexts: &Contexts) -> usize {
        match node {
            ShapeNode::Shape { label, solid } => {
                let (definition, shape) = self.product(label, contexts);
                let name = step_string(label);
                let analytic = self.entity(analytic_solid(&name, solid));
                let brep = self.entity(format!("MANIFOLD_SOLID_BREP({name},#{analytic})"));
                let representation = self.entity(format!(
                    "SHAPE_REPRESENTATION({name},(#{brep}),#{})",
                    contexts.geometry
                ));
                self.entity(format!(
                    "SHAPE_DEFINITION_REPRESENTATION(#{shape},#{representation})"
                ));
                definition
            }
            ShapeNode::Group { label, children } => {
                let (definition, shape) = self.product(label, contexts);
                let representation = self.entity(format!(
                    "SHAPE_REPRESENTATION({},(),#{})",
                    step_string(label),
                    contexts.geometry
                ));
                self.entity(format!(
                    "SHAPE_DEFINITION_REPRESENTATION(#{shape},#{representation})"
                ));
                for child in children {
                    let child_definition = self.node(child, contexts);
                    self.occurrences += 1;
                    self.entity(format!(
                        "NEXT_ASSEMBLY_USAGE_OCCURRENCE('NAUO{}','','',#{definition},#{child_definition},$)",
                        self.occurrences
                    ));
                }
                definition
            }
        }
    }
}

fn analytic_solid(name: &str, solid: &Solid) -> String {
    let faces = solid
        .faces
        .iter()
        .map(|f| format!(".{}.", f.kind.keyword()))
        .collect::<Vec<_>>()
        .join(",");
    let edges = solid
        .edges
        .iter()
        .map(|e| {
            let (kind, size) = match e.curve {
                EdgeCurve::Line { length } => ("LINE", length),
                EdgeCurve::Circle { radius } => ("CIRCLE", radius),
            };
            format!(
                "(.{}.,{},{},{})",
                kind,
                real(size),
                real(e.dihedral),
                logical(e.blended)
            )
        })
        .collect::<Vec<_>>()
        .join(",");
    let min = solid.bounds.min;
    let max = solid.bounds.max;
    format!(
        "PD_ANALYTIC_SOLID({},{},({}),({}),({},{},{}),({},{},{}),{})",
        name,
        real(solid.volume),
        faces,
        edges,
        real(min.x),
        real(min.y),
        real(min.z),
        real(max.x),
        real(max.y),
        real(max.z),
        logical(solid.prismatic)
    )
}

/// Write the records as a complete STEP file
pub fn write_step(nodes: &[ShapeNode], file_name: &str, options: &ExportOptions) -> String {
    let mut writer = StepWriter::new();
    let contexts = writer.contexts();
    for node in nodes {
        writer.node(node, &contexts);
    }

    let mut out = String::new();
    out.push_str("ISO-10303-21;\nHEADER;\n");
    let _ = writeln!(
        out,
        "FILE_DESCRIPTION(({}),'2;1');",
        step_string(&options.description)
    );
    let _ = writeln!(
        out,
        "FILE_NAME({},{},({}),({}),'pd-core {}','pd-core','');",
        step_string(file_name),
        step_string(&options.timestamp),
        step_string(&options.author),
        step_string(&options.organization),
        env!("CARGO_PKG_VERSION")
    );
    let _ = writeln!(out, "FILE_SCHEMA(({}));", step_string(INTERCHANGE_SCHEMA));
    out.push_str("ENDSEC;\nDATA;\n");
    out.push_str(&writer.data);
    out.push_str("ENDSEC;\nEND-ISO-10303-21;\n");
    out
}

/// Quote a string, doubling apostrophes and encoding non-ASCII characters
pub fn step_string(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('\'');
    for c in s.chars() {
        match c {
            '\'' => out.push_str("''"),
            '\\' => out.push_str("\\\\"),
            ' '..='~' => out.push(c),
            _ => {
                out.push_str("\\X2\\");
                let mut units = [0u16; 2];
                for unit in c.encode_utf16(&mut units) {
                    let _ = write!(out, "{:04X}", unit);
                }
                out.push_str("\\X0\\");
            }
        }
    }
    out.push('\'');
    out
}

/// Format a real so that it always reads back as one (`1.0`, not `1`)
fn real(value: f64) -> String {
    format!("{value:?}")
}

fn logical(value: bool) -> &'static str {
    if value { ".T." } else { ".F." }
}

//! STEP text parsing
//!
//! Reads the DATA section of an ISO 10303-21 file into typed parameter
//! values, then rebuilds the record tree: products linked by
//! `NEXT_ASSEMBLY_USAGE_OCCURRENCE` become groups, products whose shape
//! representation holds a readable solid become shapes.

use std::collections::{BTreeMap, HashSet};

use glam::DVec3;

use pd_cad::{Aabb, EdgeCurve, Solid, SurfaceKind};

use super::naming::ShapeNode;
use super::{InterchangeError, InterchangeResult};

/// A parameter value
#[derive(Debug, Clone, PartialEq)]
enum Value {
    Str(String),
    Ref(usize),
    Real(f64),
    Enum(String),
    List(Vec<Value>),
    Null,
}

impl Value {
    fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    fn as_id(&self) -> Option<usize> {
        match self {
            Value::Ref(id) => Some(*id),
            _ => None,
        }
    }

    fn as_real(&self) -> Option<f64> {
        match self {
            Value::Real(v) => Some(*v),
            _ => None,
        }
    }

    fn as_enum(&self) -> Option<&str> {
        match self {
            Value::Enum(e) => Some(e),
            _ => None,
        }
    }

    fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
struct Entity {
    kind: String,
    args: Vec<Value>,
}

impl Entity {
    fn arg(&self, index: usize) -> Option<&Value> {
        self.args.get(index)
    }
}

fn parse_error(message: impl Into<String>) -> InterchangeError {
    InterchangeError::Parse(message.into())
}

// ============== Lexing ==============

/// Split text into `;`-terminated statements, ignoring `;` inside strings
fn statements(content: &str) -> Vec<&str> {
    let mut result = Vec::new();
    let mut start = 0;
    let mut in_string = false;
    for (i, c) in content.char_indices() {
        match c {
            '\'' => in_string = !in_string,
            ';' if !in_string => {
                result.push(content[start..i].trim());
                start = i + 1;
            }
            _ => {}
        }
    }
    result
}

struct ValueParser<'a> {
    chars: Vec<char>,
    pos: usize,
    source: &'a str,
}

impl<'a> ValueParser<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            chars: source.chars().collect(),
            pos: 0,
            source,
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.pos += 1;
        }
    }

    fn expect(&mut self, expected: char) -> InterchangeResult<()> {
        self.skip_whitespace();
        if self.peek() == Some(expected) {
            self.pos += 1;
            Ok(())
        } else {
            Err(parse_error(format!("expected '{expected}' in {}", self.source)))
        }
    }

    fn take_while(&mut self, pred: impl Fn(char) -> bool) -> String {
        let start = self.pos;
        while self.peek().is_some_and(&pred) {
            self.pos += 1;
        }
        self.chars[start..self.pos].iter().collect()
    }

    /// Parse `( value, value, ... )`
    fn list(&mut self) -> InterchangeResult<Vec<Value>> {
        self.expect('(')?;
        let mut items = Vec::new();
        self.skip_whitespace();
        if self.peek() == Some(')') {
            self.pos += 1;
            return Ok(items);
        }
        loop {
            items.push(self.value()?);
            self.skip_whitespace();
            match self.peek() {
                Some(',') => self.pos += 1,
                Some(')') => {
                    self.pos += 1;
                    return Ok(items);
                }
                _ => return Err(parse_error(format!("unterminated list in {}", self.source))),
            }
        }
    }

    fn value(&mut self) -> InterchangeResult<Value> {
        self.skip_whitespace();
        match self.peek() {
            Some('\'') => self.string().map(Value::Str),
            Some('#') => {
                self.pos += 1;
                let digits = self.take_while(|c| c.is_ascii_digit());
                digits
                    .parse()
                    .map(Value::Ref)
                    .map_err(|_| parse_error(format!("bad reference in {}", self.source)))
            }
            Some('.') => {
                self.pos += 1;
                let name = self.take_while(|c| c != '.');
                self.expect('.')?;
                Ok(Value::Enum(name))
            }
            Some('(') => self.list().map(Value::List),
            Some('$') | Some('*') => {
                self.pos += 1;
                Ok(Value::Null)
            }
            Some(c) if c.is_ascii_digit() || c == '-' || c == '+' => {
                let text = self.take_while(|c| c.is_ascii_digit() || "+-.eE".contains(c));
                text.parse()
                    .map(Value::Real)
                    .map_err(|_| parse_error(format!("bad number {text}")))
            }
            Some(c) if c.is_ascii_alphabetic() => {
                // Typed parameter such as LENGTH_MEASURE(2.5)
                self.take_while(|c| c.is_ascii_alphanumeric() || c == '_');
                let mut inner = self.list()?;
                Ok(if inner.len() == 1 {
                    inner.remove(0)
                } else {
                    Value::List(inner)
                })
            }
            _ => Err(parse_error(format!("unexpected input in {}", self.source))),
        }
    }

    fn string(&mut self) -> InterchangeResult<String> {
        self.expect('\'')?;
        let mut raw = String::new();
        loop {
            match self.peek() {
                Some('\'') => {
                    self.pos += 1;
                    if self.peek() == Some('\'') {
                        raw.push('\'');
                        self.pos += 1;
                    } else {
                        return Ok(decode_string(&raw));
                    }
                }
                Some(c) => {
                    raw.push(c);
                    self.pos += 1;
                }
                None => {
                    return Err(parse_error(format!(
                        "unterminated string in {}",
                        self.source
                    )));
                }
            }
        }
    }
}

/// Resolve `\\`, `\X\hh` and `\X2\hhhh...\X0\` escapes
fn decode_string(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;
    while let Some(i) = rest.find('\\') {
        out.push_str(&rest[..i]);
        rest = &rest[i..];
        if let Some(tail) = rest.strip_prefix("\\\\") {
            out.push('\\');
            rest = tail;
        } else if let Some(tail) = rest.strip_prefix("\\X2\\")
            && let Some(end) = tail.find("\\X0\\")
        {
            let units: Vec<u16> = tail[..end]
                .as_bytes()
                .chunks(4)
                .filter_map(|chunk| {
                    std::str::from_utf8(chunk)
                        .ok()
                        .and_then(|hex| u16::from_str_radix(hex, 16).ok())
                })
                .collect();
            out.extend(char::decode_utf16(units).map(|c| c.unwrap_or('\u{FFFD}')));
            rest = &tail[end + 4..];
        } else if let Some(tail) = rest.strip_prefix("\\X\\")
            && let Some(byte) = tail.get(..2).and_then(|h| u8::from_str_radix(h, 16).ok())
        {
            out.push(char::from(byte));
            rest = &tail[2..];
        } else {
            out.push('\\');
            rest = &rest[1..];
        }
    }
    out.push_str(rest);
    out
}

/// Parse the DATA section into entities keyed by id
fn parse_entities(content: &str) -> InterchangeResult<BTreeMap<usize, Entity>> {
    let statements = statements(content);
    if statements.first() != Some(&"ISO-10303-21") {
        return Err(parse_error("missing ISO-10303-21 header"));
    }

    let mut entities = BTreeMap::new();
    let mut in_data = false;
    for statement in statements {
        match statement {
            "DATA" => in_data = true,
            "ENDSEC" => in_data = false,
            _ if in_data => {
                let (id, body) = statement
                    .split_once('=')
                    .ok_or_else(|| parse_error(format!("malformed entity {statement}")))?;
                let id: usize = id
                    .trim()
                    .strip_prefix('#')
                    .and_then(|s| s.parse().ok())
                    .ok_or_else(|| parse_error(format!("invalid entity id {id}")))?;
                let body = body.trim();
                if body.starts_with('(') {
                    tracing::debug!("Skipping complex entity #{}", id);
                    continue;
                }

                let mut parser = ValueParser::new(body);
                let kind = parser.take_while(|c| c.is_ascii_alphanumeric() || c == '_');
                let args = parser.list()?;
                entities.insert(
                    id,
                    Entity {
                        kind: kind.to_ascii_uppercase(),
                        args,
                    },
                );
            }
            _ => {}
        }
    }

    if entities.is_empty() {
        return Err(parse_error("no DATA section"));
    }
    Ok(entities)
}

// ============== Record tree ==============

struct RecordGraph {
    entities: BTreeMap<usize, Entity>,
    /// (parent definition, child definition) in file order
    occurrences: Vec<(usize, usize)>,
}

impl RecordGraph {
    fn entity(&self, id: usize, kind: &str) -> Option<&Entity> {
        self.entities.get(&id).filter(|e| e.kind == kind)
    }

    fn referring(&self, kind: &str, index: usize, target: usize) -> Option<&Entity> {
        self.entities
            .values()
            .find(|e| e.kind == kind && e.arg(index).and_then(Value::as_id) == Some(target))
    }

    fn product_name(&self, definition: usize) -> Option<&str> {
        let formation = self
            .entity(definition, "PRODUCT_DEFINITION")?
            .arg(2)?
            .as_id()?;
        let product = self
            .entity(formation, "PRODUCT_DEFINITION_FORMATION")?
            .arg(2)?
            .as_id()?;
        let product = self.entity(product, "PRODUCT")?;
        [1, 0]
            .into_iter()
            .filter_map(|i| product.arg(i)?.as_str())
            .find(|name| !name.trim().is_empty())
    }

    fn representation(&self, definition: usize) -> Option<&Entity> {
        let shape = self
            .entities
            .iter()
            .find(|(_, e)| {
                e.kind == "PRODUCT_DEFINITION_SHAPE"
                    && e.arg(2).and_then(Value::as_id) == Some(definition)
            })
            .map(|(id, _)| *id)?;
        let link = self.referring("SHAPE_DEFINITION_REPRESENTATION", 0, shape)?;
        self.entity(link.arg(1)?.as_id()?, "SHAPE_REPRESENTATION")
    }

    fn brep(&self, representation: &Entity) -> Option<&Entity> {
        representation
            .arg(1)?
            .as_list()?
            .iter()
            .filter_map(Value::as_id)
            .find_map(|id| self.entity(id, "MANIFOLD_SOLID_BREP"))
    }

    fn node(
        &self,
        definition: usize,
        visiting: &mut HashSet<usize>,
    ) -> InterchangeResult<Option<ShapeNode>> {
        if !visiting.insert(definition) {
            return Err(parse_error(format!("assembly cycle through #{definition}")));
        }

        let representation = self.representation(definition);
        let brep = representation.and_then(|r| self.brep(r));
        let label = self
            .product_name(definition)
            .or_else(|| representation?.arg(0)?.as_str())
            .or_else(|| brep?.arg(0)?.as_str())
            .unwrap_or_default()
            .to_string();

        let children: Vec<usize> = self
            .occurrences
            .iter()
            .filter(|(parent, _)| *parent == definition)
            .map(|(_, child)| *child)
            .collect();

        let node = if !children.is_empty() {
            let mut nodes = Vec::new();
            for child in children {
                nodes.extend(self.node(child, visiting)?);
            }
            Some(ShapeNode::Group {
                label,
                children: nodes,
            })
        } else {
            let solid = brep
                .and_then(|b| b.arg(1)?.as_id())
                .and_then(|id| self.entity(id, "PD_ANALYTIC_SOLID"));
            match solid {
                Some(entity) => Some(ShapeNode::Shape {
                    solid: analytic_solid(entity)?,
                    label,
                }),
                None => {
                    tracing::warn!("Record {} has no readable geometry, skipped", label);
                    None
                }
            }
        };

        visiting.remove(&definition);
        Ok(node)
    }
}

fn vec3(value: Option<&Value>) -> Option<DVec3> {
    let items = value?.as_list()?;
    match items {
        [x, y, z] => Some(DVec3::new(x.as_real()?, y.as_real()?, z.as_real()?)),
        _ => None,
    }
}

fn analytic_solid(entity: &Entity) -> InterchangeResult<Solid> {
    let bad = || parse_error(format!("malformed PD_ANALYTIC_SOLID {:?}", entity.args));

    let volume = entity.arg(1).and_then(Value::as_real).ok_or_else(bad)?;
    let min = vec3(entity.arg(4)).ok_or_else(bad)?;
    let max = vec3(entity.arg(5)).ok_or_else(bad)?;
    let mut solid = Solid::new(volume, Aabb::new(min, max));
    solid.prismatic = entity.arg(6).and_then(Value::as_enum) == Some("T");

    for face in entity.arg(2).and_then(Value::as_list).ok_or_else(bad)? {
        let kind = face
            .as_enum()
            .and_then(SurfaceKind::from_keyword)
            .ok_or_else(bad)?;
        solid.push_face(kind);
    }

    for edge in entity.arg(3).and_then(Value::as_list).ok_or_else(bad)? {
        let [kind, size, dihedral, blended] = edge.as_list().ok_or_else(bad)? else {
            return Err(bad());
        };
        let size = size.as_real().ok_or_else(bad)?;
        let curve = match kind.as_enum() {
            Some("LINE") => EdgeCurve::Line { length: size },
            Some("CIRCLE") => EdgeCurve::Circle { radius: size },
            _ => return Err(bad()),
        };
        solid.push_edge(curve, dihedral.as_real().ok_or_else(bad)?);
        if let Some(last) = solid.edges.last_mut() {
            last.blended = blended.as_enum() == Some("T");
        }
    }
    Ok(solid)
}

/// Parse a STEP file into its top-level records
pub fn read_step(content: &str) -> InterchangeResult<Vec<ShapeNode>> {
    let entities = parse_entities(content)?;
    let occurrences = entities
        .values()
        .filter(|e| e.kind == "NEXT_ASSEMBLY_USAGE_OCCURRENCE")
        .filter_map(|e| Some((e.arg(3)?.as_id()?, e.arg(4)?.as_id()?)))
        .collect();
    let graph = RecordGraph {
        entities,
        occurrences,
    };

    let children: HashSet<usize> = graph.occurrences.iter().map(|(_, c)| *c).collect();
    let roots: Vec<usize> = graph
        .entities
        .iter()
        .filter(|(id, e)| e.kind == "PRODUCT_DEFINITION" && !children.contains(*id))
        .map(|(id, _)| *id)
        .collect();

    let mut nodes = Vec::new();
    let mut visiting = HashSet::new();
    for root in roots {
        nodes.extend(graph.node(root, &mut visiting)?);
    }
    if nodes.is_empty() {
        return Err(parse_error("no shape records"));
    }
    Ok(nodes)
}

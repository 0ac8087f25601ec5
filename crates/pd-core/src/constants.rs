//! Global constants for pd-core

/// Current document file format version
pub const FILE_FORMAT_VERSION: u32 = 1;

/// File extension of saved documents
pub const DOCUMENT_EXTENSION: &str = "pdoc";

/// Extension appended to the previous file when a backup is kept
pub const BACKUP_EXTENSION: &str = "bak";

/// Number of digits in the numeric suffix of uniquified names (`Body001`)
pub const NAME_SUFFIX_DIGITS: usize = 3;

/// Name used when a label yields no usable identifier characters
pub const FALLBACK_NAME: &str = "Unnamed";

/// Application context string written into interchange files
pub const INTERCHANGE_CONTEXT: &str = "core data for automotive mechanical design processes";

/// Schema written into interchange file headers
pub const INTERCHANGE_SCHEMA: &str = "AUTOMOTIVE_DESIGN";

// ============== Type identifiers ==============

pub const TYPE_DOCUMENT_OBJECT: &str = "App::DocumentObject";
pub const TYPE_GEO_FEATURE: &str = "App::GeoFeature";
pub const TYPE_CONTAINER: &str = "App::Part";
pub const TYPE_PART_FEATURE: &str = "Part::Feature";
pub const TYPE_PRIMITIVE: &str = "Part::Primitive";
pub const TYPE_BOX: &str = "Part::Box";
pub const TYPE_SPHERE: &str = "Part::Sphere";
pub const TYPE_CYLINDER: &str = "Part::Cylinder";
pub const TYPE_BODY_BASE: &str = "Part::BodyBase";
pub const TYPE_BODY: &str = "PartDesign::Body";
pub const TYPE_SKETCH: &str = "Sketcher::SketchObject";

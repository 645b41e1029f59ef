//! Generation graph: data model, template, builder and integrity checks

pub mod builder;
pub mod template;
pub mod types;
pub mod validate;

pub use builder::build_graph;
pub use template::{TemplateSettings, TEMPLATE_VERSION};
pub use types::{Graph, InputValue, Literal, Node, NodeId, PortRef};
pub use validate::GraphIntegrityError;

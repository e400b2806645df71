//! Tool composition for the gateway: builds the `toolgroups` argument
//! and MCP provider-data header for a turn (§4.G), and classifies the
//! upstream's shield list into input/output lists (§4.H). Never talks
//! to an MCP server directly — header resolution only; the upstream is
//! the one that actually speaks MCP.

pub mod compose;
pub mod shield;

pub use compose::{rag_toolgroups, ComposedTools, ToolComposer};
pub use shield::{classify_shields, ShieldClassification};

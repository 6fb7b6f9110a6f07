//! Profile output: schema, JSON writer, and text rendering.

pub mod json;
pub mod schema;
pub mod svg;
pub mod text;

// Re-export main types
pub use json::{read_profile, write_profile};
pub use schema::{to_profile, truncate_statement, Profile, ProfileNode};
pub use svg::write_svg;
pub use text::render_profile;

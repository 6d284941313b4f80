//! Default configuration values

/// Build tools every recipe can assume
pub const REQUIRED_BUILD_TOOLS: &[&str] = &["sh", "make"];

/// Build tools recipes commonly use but may be absent
pub const OPTIONAL_BUILD_TOOLS: &[&str] = &["cmake", "ninja", "gfortran"];

/// Recipe file extension
pub const RECIPE_EXTENSION: &str = "toml";

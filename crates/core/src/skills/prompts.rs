//! Default prompt templates bundled at compile time.

/// Context analysis - what must be built
pub const ANALYSIS: &str = include_str!("defaults/analysis.md");

/// Architecture - stack, hosting and data model
pub const ARCHITECTURE: &str = include_str!("defaults/architecture.md");

/// Component library
pub const COMPONENTS: &str = include_str!("defaults/components.md");

/// Pages and routes
pub const PAGES: &str = include_str!("defaults/pages.md");

/// Third-party integrations
pub const INTEGRATIONS: &str = include_str!("defaults/integrations.md");

/// Final assembly manifest
pub const ASSEMBLY: &str = include_str!("defaults/assembly.md");

/// Style preamble for page mockups
pub const MOCKUP: &str = include_str!("defaults/mockup.md");

/// All default prompts with their slugs
#[cfg(test)]
fn all_defaults() -> Vec<(&'static str, &'static str)> {
    vec![
        ("analysis", ANALYSIS),
        ("architecture", ARCHITECTURE),
        ("components", COMPONENTS),
        ("pages", PAGES),
        ("integrations", INTEGRATIONS),
        ("assembly", ASSEMBLY),
        ("mockup", MOCKUP),
    ]
}

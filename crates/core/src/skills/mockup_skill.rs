//! # Mockup Skill
//!
//! Renders one UI mockup per page through the image port. Sits beside the
//! pipeline: a failed image never affects a run.

use super::prompts;
use super::PageSet;
use crate::generation::ImageGenerator;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Mockup outcome for one page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mockup {
    pub route: String,
    pub title: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

pub struct MockupSkill {
    images: Arc<dyn ImageGenerator>,
}

impl MockupSkill {
    pub fn new(images: Arc<dyn ImageGenerator>) -> Self {
        Self { images }
    }

    fn prompt(project: &str, page: &super::PageSpec) -> String {
        format!(
            "{}\nApp: {}\nScreen: {} ({})\nShows: {}\nComponents: {}",
            prompts::MOCKUP.trim(),
            project,
            page.title,
            page.route,
            page.purpose,
            page.components.join(", ")
        )
    }

    /// One mockup per page, in page order
    pub async fn generate(&self, project: &str, pages: &PageSet) -> Vec<Mockup> {
        let mut mockups = Vec::with_capacity(pages.pages.len());
        for page in &pages.pages {
            let result = self.images.generate_image(&Self::prompt(project, page)).await;
            let (url, error) = match result {
                Ok(url) => (Some(url), None),
                Err(e) => {
                    tracing::warn!(route = %page.route, "Mockup failed: {}", e);
                    (None, Some(e.to_string()))
                }
            };
            mockups.push(Mockup {
                route: page.route.clone(),
                title: page.title.clone(),
                url,
                error,
            });
        }
        mockups
    }
}

//! HTML page rendering with the Handlebars template engine

use chrono::{DateTime, Utc};
use handlebars::{Handlebars, RenderError, TemplateError};
use serde::Serialize;

use crate::models::Selection;

const INDEX_TEMPLATE: &str = include_str!("../../templates/index.hbs");
const UNAVAILABLE_TEMPLATE: &str = include_str!("../../templates/unavailable.hbs");

/// Observation dates are shown as e.g. "January 2, 2017"
const PAGE_DATE_FORMAT: &str = "%B %-d, %Y";

/// Template data for the index page
#[derive(Debug, Clone, Serialize)]
pub struct IndexPageData {
    pub symbol: String,
    pub source: String,
    pub description: String,
    pub percent_increase: String,
    pub old_time: String,
    pub new_time: String,
    pub selected_at: String,
}

impl From<&Selection> for IndexPageData {
    fn from(selection: &Selection) -> Self {
        let outcome = &selection.outcome;
        let percent = 100.0 * (outcome.new_value - outcome.old_value) / outcome.old_value;

        Self {
            symbol: selection.candidate.key.clone(),
            source: selection.candidate.source.clone(),
            description: selection.candidate.description.clone(),
            percent_increase: format!("{percent:.0}"),
            old_time: format_date(outcome.old_time),
            new_time: format_date(outcome.new_time),
            selected_at: selection.selected_at.format("%Y-%m-%d %H:%M UTC").to_string(),
        }
    }
}

fn format_date(t: DateTime<Utc>) -> String {
    t.format(PAGE_DATE_FORMAT).to_string()
}

/// Renders the reader-facing pages
pub struct PageRenderer {
    handlebars: Handlebars<'static>,
}

impl PageRenderer {
    /// Create a renderer with the built-in templates
    pub fn new() -> Result<Self, TemplateError> {
        let mut handlebars = Handlebars::new();
        handlebars.set_strict_mode(true);
        handlebars.register_template_string("index", INDEX_TEMPLATE)?;
        handlebars.register_template_string("unavailable", UNAVAILABLE_TEMPLATE)?;

        Ok(Self { handlebars })
    }

    pub fn render_selection(&self, selection: &Selection) -> Result<String, RenderError> {
        self.handlebars
            .render("index", &IndexPageData::from(selection))
    }

    /// Page shown before the first selection is published
    pub fn render_unavailable(&self) -> Result<String, RenderError> {
        self.handlebars.render("unavailable", &serde_json::json!({}))
    }
}

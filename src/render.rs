//! Plain-text rendering of a [`SessionView`].
//!
//! The page is split into the parts a reader (or a test) cares about:
//! result rows, namespace chips, a placeholder for the idle/empty/loading
//! states, an error banner, and a pagination line.

use std::fmt;

use crate::session::{Phase, SessionView};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RenderedPage {
    pub rows: Vec<String>,
    pub chips: Vec<String>,
    pub placeholder: Option<String>,
    pub banner: Option<String>,
    pub pagination: Option<String>,
}

pub fn render(view: &SessionView) -> RenderedPage {
    let mut page = RenderedPage::default();

    if let Some(error) = &view.error {
        page.banner = Some(format!("Search failed ({}). Try again.", error));
    }

    let showing = match view.display {
        Phase::Results => view.results.as_ref(),
        Phase::NoResults => {
            page.placeholder = Some(format!("No results found for \"{}\".", view.query));
            None
        }
        _ => {
            page.placeholder = Some("Try searching for something.".to_string());
            None
        }
    };

    if view.phase == Phase::Searching {
        page.placeholder = Some("Searching...".to_string());
    }

    let Some(results) = showing else {
        return page;
    };

    page.chips = results
        .namespace_hits
        .iter()
        .map(|ns| format!("[{}]", ns))
        .collect();

    page.rows = results
        .results
        .iter()
        .enumerate()
        .map(|(i, hit)| {
            let mut row = format!(
                "{:>3}. {}  (score {:.3})",
                results.offset.saturating_add(i as u64 + 1),
                hit.registry_path(),
                hit.score
            );
            if let Some(description) = hit.payload.description.as_deref() {
                let description = description.trim();
                if !description.is_empty() {
                    row.push_str(" - ");
                    row.push_str(description);
                }
            }
            row
        })
        .collect();

    if !page.rows.is_empty() {
        let first = results.offset.saturating_add(1);
        let last = results.offset.saturating_add(page.rows.len() as u64);
        page.pagination = Some(format!("showing {}-{}", first, last));
    }

    page
}

impl fmt::Display for RenderedPage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(banner) = &self.banner {
            writeln!(f, "! {}", banner)?;
        }
        if !self.chips.is_empty() {
            writeln!(f, "Namespaces: {}", self.chips.join(" "))?;
        }
        for row in &self.rows {
            writeln!(f, "{}", row)?;
        }
        if let Some(pagination) = &self.pagination {
            writeln!(f, "{}", pagination)?;
        }
        if let Some(placeholder) = &self.placeholder {
            writeln!(f, "{}", placeholder)?;
        }
        Ok(())
    }
}

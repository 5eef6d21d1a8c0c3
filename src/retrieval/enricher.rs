// file: src/retrieval/enricher.rs
// description: appends the caller's location to the retrieval query

use crate::models::Location;

pub struct QueryEnricher;

impl QueryEnricher {
    /// Returns `"{query} in {city} {state} {country}"` when a location with a
    /// non-empty state is known, otherwise the query unchanged.
    ///
    /// Only `state` gates enrichment: a location with a city and country but
    /// no state leaves the query untouched. Unknown city or country render as
    /// empty strings so the output shape stays fixed.
    pub fn enrich(query: &str, location: Option<&Location>) -> String {
        match location {
            Some(location) if !location.state().is_empty() => format!(
                "{} in {} {} {}",
                query,
                location.city(),
                location.state(),
                location.country()
            ),
            _ => query.to_string(),
        }
    }
}

//! Mutable search configuration.

use geo_types::Geometry;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::geometry::{Epsg4326, Projection, geometry_type_name, vertex_count};

/// Plain-data view of a [`SearchRequest`] at one point in time.
#[derive(Debug, Clone)]
pub struct RequestState {
    /// Projection of `geometry`.
    pub projection: Arc<dyn Projection>,
    pub filter_expression: String,
    pub regex_filter: String,
    pub geometry: Option<Geometry<f64>>,
    /// Search radius in meters.
    pub search_radius: f32,
}

/// A search request. All accessors lock briefly, so a request may be edited
/// while matchers compiled from earlier snapshots keep running.
#[derive(Debug)]
pub struct SearchRequest {
    state: Mutex<RequestState>,
}

impl SearchRequest {
    pub fn new(projection: Arc<dyn Projection>) -> Self {
        Self {
            state: Mutex::new(RequestState {
                projection,
                filter_expression: String::new(),
                regex_filter: String::new(),
                geometry: None,
                search_radius: 0.0,
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, RequestState> {
        // The state is plain data; a panic mid-update cannot leave it inconsistent.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn projection(&self) -> Arc<dyn Projection> {
        self.state().projection.clone()
    }

    pub fn set_projection(&self, projection: Arc<dyn Projection>) {
        self.state().projection = projection;
    }

    pub fn filter_expression(&self) -> String {
        self.state().filter_expression.clone()
    }

    pub fn set_filter_expression(&self, expression: impl Into<String>) {
        self.state().filter_expression = expression.into();
    }

    pub fn regex_filter(&self) -> String {
        self.state().regex_filter.clone()
    }

    pub fn set_regex_filter(&self, regex: impl Into<String>) {
        self.state().regex_filter = regex.into();
    }

    pub fn geometry(&self) -> Option<Geometry<f64>> {
        self.state().geometry.clone()
    }

    pub fn set_geometry(&self, geometry: Option<Geometry<f64>>) {
        self.state().geometry = geometry;
    }

    pub fn search_radius(&self) -> f32 {
        self.state().search_radius
    }

    pub fn set_search_radius(&self, radius: f32) {
        self.state().search_radius = radius;
    }

    /// Copy of the current configuration.
    pub fn snapshot(&self) -> RequestState {
        self.state().clone()
    }
}

impl Default for SearchRequest {
    fn default() -> Self {
        Self::new(Arc::new(Epsg4326))
    }
}

impl Clone for SearchRequest {
    fn clone(&self) -> Self {
        Self {
            state: Mutex::new(self.snapshot()),
        }
    }
}

impl fmt::Display for RequestState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SearchRequest [projection={}", self.projection.name())?;
        if !self.filter_expression.is_empty() {
            write!(f, ", filter='{}'", self.filter_expression)?;
        }
        if !self.regex_filter.is_empty() {
            write!(f, ", regex='{}'", self.regex_filter)?;
        }
        if let Some(geometry) = &self.geometry {
            write!(
                f,
                ", geometry={}({} vertices), radius={}",
                geometry_type_name(geometry),
                vertex_count(geometry),
                self.search_radius
            )?;
        }
        write!(f, "]")
    }
}

impl fmt::Display for SearchRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.snapshot().fmt(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Epsg3857;
    use geo_types::Point;

    #[test]
    fn setters_round_trip() {
        let request = SearchRequest::default();
        request.set_filter_expression("type = 'road'");
        request.set_regex_filter("caf.*");
        request.set_search_radius(150.0);
        request.set_geometry(Some(Geometry::Point(Point::new(1.0, 2.0))));
        request.set_projection(Arc::new(Epsg3857));

        assert_eq!(request.filter_expression(), "type = 'road'");
        assert_eq!(request.regex_filter(), "caf.*");
        assert_eq!(request.search_radius(), 150.0);
        assert!(request.geometry().is_some());
        assert_eq!(request.projection().name(), "EPSG:3857");
    }

    #[test]
    fn snapshot_is_detached() {
        let request = SearchRequest::default();
        request.set_filter_expression("a = 1");
        let snapshot = request.snapshot();
        request.set_filter_expression("a = 2");
        assert_eq!(snapshot.filter_expression, "a = 1");
    }

    #[test]
    fn display_lists_configured_parts() {
        let request = SearchRequest::default();
        assert_eq!(request.to_string(), "SearchRequest [projection=EPSG:4326]");

        request.set_filter_expression("a = 1");
        request.set_geometry(Some(Geometry::Point(Point::new(1.0, 2.0))));
        request.set_search_radius(10.0);
        assert_eq!(
            request.to_string(),
            "SearchRequest [projection=EPSG:4326, filter='a = 1', geometry=point(1 vertices), radius=10]"
        );
    }

    #[test]
    fn shared_across_threads() {
        let request = Arc::new(SearchRequest::default());
        let handles: Vec<_> = (0..4)
            .map(|i| {
                let request = Arc::clone(&request);
                std::thread::spawn(move || request.set_search_radius(i as f32))
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert!(request.search_radius() < 4.0);
    }
}

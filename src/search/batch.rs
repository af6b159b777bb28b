//! Searching feature collections with a compiled matcher.

use geo_types::{Geometry, Rect};
use rayon::prelude::*;

use super::matcher::SearchMatcher;
use crate::error::{GeometryError, SearchError};
use crate::geometry::Projection;
use crate::value::Value;

/// A map feature: geometry plus a property value (normally an object).
#[derive(Debug, Clone, PartialEq)]
pub struct Feature {
    pub geometry: Geometry<f64>,
    pub properties: Value,
    /// Name of the layer the feature came from, if the source has layers.
    pub layer: Option<String>,
}

impl Feature {
    pub fn new(geometry: Geometry<f64>, properties: Value) -> Self {
        Self {
            geometry,
            properties,
            layer: None,
        }
    }

    pub fn with_layer(mut self, layer: impl Into<String>) -> Self {
        self.layer = Some(layer.into());
        self
    }
}

/// What a batch does with a feature whose geometry cannot be measured.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OnUnsupported {
    /// Abort the batch with the error.
    #[default]
    Fail,
    /// Leave the feature out and log a warning.
    Skip,
}

impl SearchMatcher {
    /// [`SearchMatcher::accepts`] for a [`Feature`], using its own layer name.
    pub fn accepts_feature(
        &self,
        feature: &Feature,
        projection: &dyn Projection,
    ) -> Result<bool, GeometryError> {
        self.accepts(
            &feature.geometry,
            projection,
            feature.layer.as_deref(),
            &feature.properties,
        )
    }

    fn accepts_with(
        &self,
        feature: &Feature,
        projection: &dyn Projection,
        on_unsupported: OnUnsupported,
    ) -> Result<bool, SearchError> {
        match self.accepts_feature(feature, projection) {
            Ok(accepted) => Ok(accepted),
            Err(e) if on_unsupported == OnUnsupported::Skip => {
                tracing::warn!("Skipping feature: {}", e);
                Ok(false)
            }
            Err(e) => Err(e.into()),
        }
    }
}

/// Accepted features in input order. Fails on the first unsupported geometry.
pub fn search(
    features: &[Feature],
    matcher: &SearchMatcher,
    projection: &dyn Projection,
) -> Result<Vec<Feature>, SearchError> {
    Ok(search_refs(features, matcher, projection)?
        .into_iter()
        .cloned()
        .collect())
}

/// Like [`search`], borrowing the accepted features.
pub fn search_refs<'a>(
    features: &'a [Feature],
    matcher: &SearchMatcher,
    projection: &dyn Projection,
) -> Result<Vec<&'a Feature>, SearchError> {
    let mut accepted = Vec::new();
    for feature in features {
        if matcher.accepts_feature(feature, projection)? {
            accepted.push(feature);
        }
    }
    Ok(accepted)
}

/// Parallel [`search`] over the current rayon pool. Output order matches input order.
pub fn par_search(
    features: &[Feature],
    matcher: &SearchMatcher,
    projection: &dyn Projection,
    on_unsupported: OnUnsupported,
) -> Result<Vec<Feature>, SearchError> {
    let kept = features
        .par_iter()
        .map(|feature| {
            matcher
                .accepts_with(feature, projection, on_unsupported)
                .map(|accepted| accepted.then(|| feature.clone()))
        })
        .collect::<Result<Vec<Option<Feature>>, SearchError>>()?;
    Ok(kept.into_iter().flatten().collect())
}

/// Search a stream of blocks, each a set of features with bounds (in
/// `projection`) that contain them all. Blocks the matcher can rule out
/// wholesale are skipped without looking at their features.
pub fn search_bounded<I>(
    blocks: I,
    matcher: &SearchMatcher,
    projection: &dyn Projection,
) -> Result<Vec<Feature>, SearchError>
where
    I: IntoIterator<Item = (Rect<f64>, Vec<Feature>)>,
{
    let mut accepted = Vec::new();
    for (bounds, features) in blocks {
        if matcher.rejects_bounds(bounds, projection) {
            tracing::trace!("Skipping block {:?}", bounds);
            continue;
        }
        for feature in features {
            if matcher.accepts_feature(&feature, projection)? {
                accepted.push(feature);
            }
        }
    }
    Ok(accepted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Epsg4326;
    use crate::search::SearchRequest;
    use geo_types::Point;
    use std::sync::Arc;

    fn feature(lon: f64, lat: f64, json: &str) -> Feature {
        Feature::new(
            Geometry::Point(Point::new(lon, lat)),
            Value::from_json_str(json).unwrap(),
        )
    }

    fn roads() -> Vec<Feature> {
        vec![
            feature(0.0, 0.0, r#"{"id": "A", "type": "road", "maxspeed": 80}"#),
            feature(0.0, 0.0, r#"{"id": "B", "type": "road", "maxspeed": 30}"#),
            feature(0.0, 0.0, r#"{"id": "C", "type": "path"}"#),
            feature(0.0, 0.0, r#"{"id": "D", "type": "road", "maxspeed": 120}"#),
        ]
    }

    fn ids(features: &[Feature]) -> Vec<String> {
        features
            .iter()
            .filter_map(|f| f.properties.get("id")?.as_text().map(|s| s.into_owned()))
            .collect()
    }

    fn road_matcher() -> SearchMatcher {
        let request = SearchRequest::default();
        request.set_filter_expression("type = 'road' AND maxspeed > 50");
        SearchMatcher::compile(&request).unwrap()
    }

    #[test]
    fn search_keeps_input_order() {
        let features = roads();
        let found = search(&features, &road_matcher(), &Epsg4326).unwrap();
        assert_eq!(ids(&found), vec!["A", "D"]);
        // Input untouched
        assert_eq!(features.len(), 4);
    }

    #[test]
    fn search_refs_borrows_input() {
        let features = roads();
        let found = search_refs(&features, &road_matcher(), &Epsg4326).unwrap();
        assert!(std::ptr::eq(found[0], &features[0]));
        assert!(std::ptr::eq(found[1], &features[3]));
    }

    #[test]
    fn par_search_matches_sequential() {
        let features: Vec<Feature> = (0..500)
            .map(|i| {
                feature(
                    0.0,
                    0.0,
                    &format!(r#"{{"id": "{i}", "type": "road", "maxspeed": {}}}"#, i % 100),
                )
            })
            .collect();
        let matcher = road_matcher();
        let sequential = search(&features, &matcher, &Epsg4326).unwrap();
        let parallel = par_search(&features, &matcher, &Epsg4326, OnUnsupported::Fail).unwrap();
        assert_eq!(ids(&sequential), ids(&parallel));
    }

    #[test]
    fn unsupported_geometry_fails_or_skips() {
        let mut features = roads();
        features.insert(
            1,
            Feature::new(
                Geometry::Rect(Rect::new((0.0, 0.0), (1.0, 1.0))),
                Value::from_json_str(r#"{"id": "R", "type": "road", "maxspeed": 90}"#).unwrap(),
            ),
        );

        let request = SearchRequest::new(Arc::new(Epsg4326));
        request.set_geometry(Some(Geometry::Point(Point::new(0.0, 0.0))));
        request.set_search_radius(10.0);
        let matcher = SearchMatcher::compile(&request).unwrap();

        let err = search(&features, &matcher, &Epsg4326).unwrap_err();
        assert!(matches!(err, SearchError::Geometry(_)));
        let err = par_search(&features, &matcher, &Epsg4326, OnUnsupported::Fail).unwrap_err();
        assert!(matches!(err, SearchError::Geometry(_)));

        let found = par_search(&features, &matcher, &Epsg4326, OnUnsupported::Skip).unwrap();
        assert_eq!(ids(&found), vec!["A", "B", "C", "D"]);
    }

    #[test]
    fn bounded_search_skips_far_blocks() {
        let request = SearchRequest::new(Arc::new(Epsg4326));
        request.set_geometry(Some(Geometry::Point(Point::new(0.0, 0.0))));
        request.set_search_radius(1000.0);
        let matcher = SearchMatcher::compile(&request).unwrap();

        // The far block lies about its bounds; it must be skipped without being read.
        let blocks = vec![
            (
                Rect::new((5.0, 5.0), (6.0, 6.0)),
                vec![feature(0.0, 0.0, r#"{"id": "hidden"}"#)],
            ),
            (
                Rect::new((-0.1, -0.1), (0.1, 0.1)),
                vec![
                    feature(0.001, 0.0, r#"{"id": "near"}"#),
                    feature(0.09, 0.0, r#"{"id": "far"}"#),
                ],
            ),
        ];
        let found = search_bounded(blocks, &matcher, &Epsg4326).unwrap();
        assert_eq!(ids(&found), vec!["near"]);
    }
}

//! Search over tiled data sources.
//!
//! Tiles follow the usual web map grid over the working projection: zoom `z`
//! splits the world into `2^z x 2^z` tiles, with `y = 0` at the top.

use anyhow::Result;
use geo_types::{Rect, coord};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use super::batch::Feature;
use super::matcher::SearchMatcher;
use super::request::SearchRequest;
use crate::error::SearchError;
use crate::geometry::{Epsg3857, Projection};

/// Deepest zoom level the tile grid supports.
pub const MAX_ZOOM: u8 = 24;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TileId {
    pub zoom: u8,
    pub x: u32,
    pub y: u32,
}

impl TileId {
    /// Zoom levels past [`MAX_ZOOM`] are clamped to it.
    pub fn new(zoom: u8, x: u32, y: u32) -> Self {
        Self {
            zoom: zoom.min(MAX_ZOOM),
            x,
            y,
        }
    }

    fn tile_size(zoom: u8) -> f64 {
        Epsg3857.bounds().width() / f64::from(1u32 << zoom.min(MAX_ZOOM))
    }

    /// Tile bounds in the working projection.
    pub fn bounds(&self) -> Rect<f64> {
        let world = Epsg3857.bounds();
        let size = Self::tile_size(self.zoom);
        let min_x = world.min().x + f64::from(self.x) * size;
        let max_y = world.max().y - f64::from(self.y) * size;
        Rect::new(
            coord! { x: min_x, y: max_y - size },
            coord! { x: min_x + size, y: max_y },
        )
    }

    /// All tiles of `zoom` intersecting `bounds` (working projection), row by row.
    pub fn covering(bounds: Rect<f64>, zoom: u8) -> impl Iterator<Item = TileId> {
        let zoom = zoom.min(MAX_ZOOM);
        let world = Epsg3857.bounds();
        let size = Self::tile_size(zoom);
        let last = (1u32 << zoom) - 1;
        let index = |offset: f64| (offset / size).floor().clamp(0.0, f64::from(last)) as u32;

        let (x0, x1) = (
            index(bounds.min().x - world.min().x),
            index(bounds.max().x - world.min().x),
        );
        let (y0, y1) = (
            index(world.max().y - bounds.max().y),
            index(world.max().y - bounds.min().y),
        );
        (y0..=y1).flat_map(move |y| (x0..=x1).map(move |x| TileId::new(zoom, x, y)))
    }
}

impl fmt::Display for TileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.zoom, self.x, self.y)
    }
}

/// A source of tiled features.
pub trait TileSource: Send + Sync {
    /// Projection of the feature geometries and of [`TileSource::data_extent`].
    fn projection(&self) -> Arc<dyn Projection>;

    fn min_zoom(&self) -> u8;

    fn max_zoom(&self) -> u8;

    /// Bounds of all data the source holds.
    fn data_extent(&self) -> Rect<f64>;

    /// Features of one tile, `None` if the tile has no data.
    fn load_tile(&self, tile: TileId) -> Result<Option<Vec<Feature>>>;
}

/// Runs search requests against a [`TileSource`].
pub struct TileSearchService {
    source: Arc<dyn TileSource>,
    zoom_range: Mutex<(u8, u8)>,
}

impl TileSearchService {
    pub fn new(source: Arc<dyn TileSource>) -> Self {
        Self {
            source,
            zoom_range: Mutex::new((0, MAX_ZOOM)),
        }
    }

    pub fn source(&self) -> &Arc<dyn TileSource> {
        &self.source
    }

    fn zoom_range(&self) -> (u8, u8) {
        *self.zoom_range.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn min_zoom(&self) -> u8 {
        self.zoom_range().0
    }

    pub fn set_min_zoom(&self, zoom: u8) {
        self.zoom_range.lock().unwrap_or_else(PoisonError::into_inner).0 = zoom;
    }

    pub fn max_zoom(&self) -> u8 {
        self.zoom_range().1
    }

    pub fn set_max_zoom(&self, zoom: u8) {
        self.zoom_range.lock().unwrap_or_else(PoisonError::into_inner).1 = zoom;
    }

    /// Accepted features of every tile in the searched zoom range, tile by tile.
    ///
    /// Features repeated across tiles or zoom levels are reported once per tile.
    pub fn find_features(&self, request: &SearchRequest) -> Result<Vec<Feature>, SearchError> {
        let projection = self.source.projection();
        let matcher =
            SearchMatcher::compile_within(request, self.source.data_extent(), projection.as_ref())?;

        let (min_zoom, max_zoom) = self.zoom_range();
        let min_zoom = min_zoom.max(self.source.min_zoom());
        let max_zoom = max_zoom.min(self.source.max_zoom()).min(MAX_ZOOM);

        let mut found = Vec::new();
        for zoom in min_zoom..=max_zoom {
            for tile in TileId::covering(matcher.search_bounds(), zoom) {
                if matcher.rejects_bounds(tile.bounds(), &Epsg3857) {
                    tracing::trace!("Skipping tile {}", tile);
                    continue;
                }
                let features = self
                    .source
                    .load_tile(tile)
                    .map_err(|source| SearchError::TileLoad {
                        tile: tile.to_string(),
                        source,
                    })?;
                for feature in features.into_iter().flatten() {
                    if matcher.accepts_feature(&feature, projection.as_ref())? {
                        found.push(feature);
                    }
                }
            }
        }
        tracing::debug!("Tile search found {} features", found.len());
        Ok(found)
    }
}

/// Tile source backed by an in-memory map.
#[derive(Debug)]
pub struct MemoryTileSource {
    projection: Arc<dyn Projection>,
    extent: Rect<f64>,
    tiles: BTreeMap<TileId, Vec<Feature>>,
}

impl MemoryTileSource {
    pub fn new(projection: Arc<dyn Projection>, extent: Rect<f64>) -> Self {
        Self {
            projection,
            extent,
            tiles: BTreeMap::new(),
        }
    }

    pub fn insert(&mut self, tile: TileId, features: Vec<Feature>) {
        self.tiles.entry(tile).or_default().extend(features);
    }
}

impl TileSource for MemoryTileSource {
    fn projection(&self) -> Arc<dyn Projection> {
        self.projection.clone()
    }

    fn min_zoom(&self) -> u8 {
        self.tiles.keys().map(|tile| tile.zoom).min().unwrap_or(0)
    }

    fn max_zoom(&self) -> u8 {
        self.tiles.keys().map(|tile| tile.zoom).max().unwrap_or(0)
    }

    fn data_extent(&self) -> Rect<f64> {
        self.extent
    }

    fn load_tile(&self, tile: TileId) -> Result<Option<Vec<Feature>>> {
        Ok(self.tiles.get(&tile).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{Epsg4326, coord_to_working};
    use crate::value::Value;
    use geo_types::{Geometry, Point};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn poi(lon: f64, lat: f64, name: &str) -> Feature {
        let properties: Value = [("name", name)].into_iter().collect();
        Feature::new(Geometry::Point(Point::new(lon, lat)), properties).with_layer("poi")
    }

    fn tile_of(lon: f64, lat: f64, zoom: u8) -> TileId {
        let pos = coord_to_working(coord! { x: lon, y: lat }, &Epsg4326);
        TileId::covering(Rect::new(pos, pos), zoom)
            .next()
            .unwrap()
    }

    fn source() -> MemoryTileSource {
        let mut source = MemoryTileSource::new(
            Arc::new(Epsg4326),
            Rect::new((-10.0, -10.0), (30.0, 70.0)),
        );
        for zoom in [10, 12] {
            source.insert(tile_of(24.75, 59.43, zoom), vec![poi(24.75, 59.43, "Tallinn")]);
            source.insert(tile_of(0.0, 0.0, zoom), vec![poi(0.0, 0.0, "Null Island")]);
        }
        source
    }

    #[test]
    fn tile_grid() {
        assert_eq!(TileId::new(0, 0, 0).bounds(), Epsg3857.bounds());
        let tiles: Vec<_> = TileId::covering(Epsg3857.bounds(), 1).collect();
        assert_eq!(
            tiles,
            vec![
                TileId::new(1, 0, 0),
                TileId::new(1, 1, 0),
                TileId::new(1, 0, 1),
                TileId::new(1, 1, 1),
            ]
        );
        // North-west quadrant is tile 0/0 at zoom 1
        let nw = coord_to_working(coord! { x: -90.0, y: 45.0 }, &Epsg4326);
        assert_eq!(
            TileId::covering(Rect::new(nw, nw), 1).collect::<Vec<_>>(),
            vec![TileId::new(1, 0, 0)]
        );
        assert_eq!(TileId::new(12, 2330, 1185).to_string(), "12/2330/1185");
    }

    #[test]
    fn deep_zoom_is_clamped() {
        let tile = TileId::new(40, 3, 5);
        assert_eq!(tile.zoom, MAX_ZOOM);
        assert_eq!(tile.bounds(), TileId::new(MAX_ZOOM, 3, 5).bounds());

        let literal = TileId { zoom: 255, x: 0, y: 0 };
        assert!(literal.bounds().width() > 0.0);
    }

    #[test]
    fn finds_features_near_search_point() {
        let service = TileSearchService::new(Arc::new(source()));
        let request = SearchRequest::new(Arc::new(Epsg4326));
        request.set_geometry(Some(Geometry::Point(Point::new(24.7501, 59.4301))));
        request.set_search_radius(100.0);
        request.set_filter_expression("layer::name = 'poi'");

        let found = service.find_features(&request).unwrap();
        // One hit per zoom level holding the feature
        assert_eq!(found.len(), 2);
        assert!(found.iter().all(|f| f.properties.get("name") == Some(&Value::from("Tallinn"))));
    }

    #[test]
    fn zoom_range_is_intersected() {
        let service = TileSearchService::new(Arc::new(source()));
        service.set_min_zoom(11);
        assert_eq!(service.min_zoom(), 11);
        assert_eq!(service.max_zoom(), MAX_ZOOM);

        let request = SearchRequest::new(Arc::new(Epsg4326));
        request.set_geometry(Some(Geometry::Point(Point::new(0.0, 0.0))));
        request.set_search_radius(10.0);
        let found = service.find_features(&request).unwrap();
        assert_eq!(found.len(), 1);

        service.set_max_zoom(11);
        assert!(service.find_features(&request).unwrap().is_empty());
    }

    struct CountingSource {
        inner: MemoryTileSource,
        loads: AtomicUsize,
    }

    impl TileSource for CountingSource {
        fn projection(&self) -> Arc<dyn Projection> {
            self.inner.projection()
        }
        fn min_zoom(&self) -> u8 {
            self.inner.min_zoom()
        }
        fn max_zoom(&self) -> u8 {
            self.inner.max_zoom()
        }
        fn data_extent(&self) -> Rect<f64> {
            self.inner.data_extent()
        }
        fn load_tile(&self, tile: TileId) -> Result<Option<Vec<Feature>>> {
            self.loads.fetch_add(1, Ordering::SeqCst);
            if tile.zoom == 12 {
                anyhow::bail!("corrupt tile");
            }
            self.inner.load_tile(tile)
        }
    }

    #[test]
    fn prunes_tiles_and_reports_load_failures() {
        let counting = Arc::new(CountingSource {
            inner: source(),
            loads: AtomicUsize::new(0),
        });
        let service = TileSearchService::new(counting.clone());
        service.set_max_zoom(10);

        let request = SearchRequest::new(Arc::new(Epsg4326));
        request.set_geometry(Some(Geometry::Point(Point::new(0.0, 0.0))));
        request.set_search_radius(10.0);
        let found = service.find_features(&request).unwrap();
        assert_eq!(found.len(), 1);
        // A 10 m search touches very few tiles at zoom 10
        assert!(counting.loads.load(Ordering::SeqCst) <= 4);

        service.set_max_zoom(12);
        let err = service.find_features(&request).unwrap_err();
        assert!(matches!(err, SearchError::TileLoad { ref tile, .. } if tile.starts_with("12/")));
    }
}

//! Feature search: a [`SearchRequest`] compiles into an immutable
//! [`SearchMatcher`], which is then applied to feature collections, bounded
//! feature blocks or tiled sources.

mod batch;
mod matcher;
mod request;
mod tiles;

pub use batch::{Feature, OnUnsupported, par_search, search, search_bounded, search_refs};
pub use matcher::SearchMatcher;
pub use request::{RequestState, SearchRequest};
pub use tiles::{MAX_ZOOM, MemoryTileSource, TileId, TileSearchService, TileSource};

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, trace};

use crate::engine::PixelBuffer;
use crate::geometry::NormalizedRect;

/// A rasterized crop of one page.
#[derive(Debug, Clone)]
pub struct Tile {
    pub pagination: usize,
    pub crop: NormalizedRect,
    pub bitmap: Arc<PixelBuffer>,
    pub thumbnail: bool,
    pub best_quality: bool,
    /// Higher values were requested more recently and are evicted last.
    pub cache_order: u64,
    pub generation: u64,
}

impl Tile {
    pub fn key(&self) -> TileKey {
        TileKey::new(
            self.pagination,
            &self.crop,
            self.bitmap.width,
            self.bitmap.height,
            self.thumbnail,
        )
    }
}

#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq)]
pub struct TileKey {
    pagination: usize,
    crop: [u32; 4],
    width: u32,
    height: u32,
    thumbnail: bool,
}

impl TileKey {
    pub fn new(
        pagination: usize,
        crop: &NormalizedRect,
        width: u32,
        height: u32,
        thumbnail: bool,
    ) -> Self {
        Self {
            pagination,
            crop: crop.key(),
            width,
            height,
            thumbnail,
        }
    }

    pub fn pagination(&self) -> usize {
        self.pagination
    }
}

/// Two-bucket tile store. The current bucket only ever holds tiles of the
/// current generation; thumbnails are keyed by pagination index and outlive
/// generation changes.
#[derive(Debug)]
pub struct TileCache {
    generation: u64,
    current: HashMap<TileKey, Tile>,
    thumbnails: HashMap<TileKey, Tile>,
    capacity: usize,
    thumbnail_capacity: usize,
}

impl TileCache {
    pub fn new(capacity: usize, thumbnail_capacity: usize) -> Self {
        Self {
            generation: 0,
            current: HashMap::new(),
            thumbnails: HashMap::new(),
            capacity: capacity.max(1),
            thumbnail_capacity: thumbnail_capacity.max(1),
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn len(&self) -> usize {
        self.current.len() + self.thumbnails.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Starts a new generation with an empty current bucket.
    pub fn invalidate(&mut self) -> u64 {
        self.generation += 1;
        let dropped = std::mem::take(&mut self.current).len();
        debug!(generation = self.generation, dropped, "tile cache invalidated");
        self.generation
    }

    /// Drops every tile, thumbnails included.
    pub fn clear(&mut self) -> u64 {
        self.thumbnails.clear();
        self.invalidate()
    }

    /// Stores a finished tile. Tiles from another generation are discarded.
    pub fn insert(&mut self, tile: Tile) -> bool {
        if tile.generation != self.generation {
            trace!(
                pagination = tile.pagination,
                tile_generation = tile.generation,
                generation = self.generation,
                "discarding stale tile"
            );
            return false;
        }
        let (bucket, capacity) = if tile.thumbnail {
            (&mut self.thumbnails, self.thumbnail_capacity)
        } else {
            (&mut self.current, self.capacity)
        };
        bucket.insert(tile.key(), tile);
        while bucket.len() > capacity {
            let Some(oldest) = bucket
                .iter()
                .min_by_key(|(_, tile)| tile.cache_order)
                .map(|(key, _)| *key)
            else {
                break;
            };
            bucket.remove(&oldest);
        }
        true
    }

    pub fn contains(&self, key: &TileKey) -> bool {
        self.bucket(key).contains_key(key)
    }

    /// Refreshes the eviction priority of a cached tile. Returns whether the
    /// tile was present.
    pub fn touch(&mut self, key: &TileKey, cache_order: u64) -> bool {
        let bucket = if key.thumbnail {
            &mut self.thumbnails
        } else {
            &mut self.current
        };
        match bucket.get_mut(key) {
            Some(tile) => {
                tile.cache_order = cache_order;
                true
            }
            None => false,
        }
    }

    fn bucket(&self, key: &TileKey) -> &HashMap<TileKey, Tile> {
        if key.thumbnail {
            &self.thumbnails
        } else {
            &self.current
        }
    }

    pub fn thumbnail(&self, pagination: usize) -> Option<&Tile> {
        self.thumbnails
            .values()
            .filter(|tile| tile.pagination == pagination)
            .max_by_key(|tile| tile.cache_order)
    }

    /// Full-quality tiles of a page, oldest first so newer ones draw on top.
    pub fn tiles_for_page(&self, pagination: usize) -> Vec<&Tile> {
        let mut tiles: Vec<&Tile> = self
            .current
            .values()
            .filter(|tile| tile.pagination == pagination)
            .collect();
        tiles.sort_by_key(|tile| tile.cache_order);
        tiles
    }
}

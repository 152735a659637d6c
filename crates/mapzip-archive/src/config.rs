//! Options controlling how archives are opened.

use crate::pool::PoolConfig;

/// Default upper bound for a local header's extra field.
///
/// Not a format limit. Real producers stay far below it, so anything larger
/// is treated as corruption.
pub const DEFAULT_MAX_EXTRA_FIELD_LENGTH: u16 = 128;

/// How the archive bytes are brought into memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum MapMode {
    /// Memory-map the file, reading it into the heap if mapping fails.
    #[default]
    Auto,
    /// Always read the whole file into the heap.
    Buffered,
}

/// Options for [`Archive::open_with_options`](crate::Archive::open_with_options).
///
/// # Example
///
/// ```
/// use mapzip_archive::{LoadOptions, MapMode};
///
/// let options = LoadOptions::default()
///     .with_map_mode(MapMode::Buffered)
///     .with_max_extra_field_length(256);
/// assert!(options.use_fast_index);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct LoadOptions {
    /// How to bring the file into memory.
    pub map_mode: MapMode,
    /// Use the embedded fast index when the archive has one.
    pub use_fast_index: bool,
    /// Parse the central directory when the fast index is unusable,
    /// instead of failing the open.
    pub fallback_on_bad_index: bool,
    /// Largest local-header extra field accepted when locating payloads.
    pub max_extra_field_length: u16,
    /// Buffers reused for inflated payloads.
    pub pool: PoolConfig,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            map_mode: MapMode::Auto,
            use_fast_index: true,
            fallback_on_bad_index: true,
            max_extra_field_length: DEFAULT_MAX_EXTRA_FIELD_LENGTH,
            pool: PoolConfig::default(),
        }
    }
}

impl LoadOptions {
    /// Set the map mode.
    pub fn with_map_mode(mut self, map_mode: MapMode) -> Self {
        self.map_mode = map_mode;
        self
    }

    /// Enable or disable the embedded fast index.
    pub fn with_fast_index(mut self, enabled: bool) -> Self {
        self.use_fast_index = enabled;
        self
    }

    /// Enable or disable the central-directory fallback.
    pub fn with_fallback_on_bad_index(mut self, enabled: bool) -> Self {
        self.fallback_on_bad_index = enabled;
        self
    }

    /// Set the extra-field length limit.
    pub fn with_max_extra_field_length(mut self, limit: u16) -> Self {
        self.max_extra_field_length = limit;
        self
    }

    /// Set the buffer pool configuration.
    pub fn with_pool_config(mut self, pool: PoolConfig) -> Self {
        self.pool = pool;
        self
    }
}

//! Table operations, one module per table family.

pub mod album_table;
pub mod artist_table;
pub mod expected_tables;
pub mod file_index_table;
pub mod legacy_tables;
pub mod override_table;
pub mod scan_table;
pub mod settings_table;
pub mod track_table;
pub mod wishlist_table;

pub use album_table::{AlbumTable, AlbumUpsert};
pub use artist_table::ArtistTable;
pub use expected_tables::{
    ExpectedAlbumTable, ExpectedAlbumUpsert, ExpectedArtistTable, ExpectedIgnoredTable,
    ExpectedSettingsTable,
};
pub use file_index_table::{FileIndexEntry, FileIndexTable};
pub use legacy_tables::{AlbumAliasTable, WantedAlbumTable};
pub use override_table::OverrideTable;
pub use scan_table::{ScanSkippedTable, ScanStateTable};
pub use settings_table::SettingsTable;
pub use track_table::{TrackTable, TrackUpsert};
pub use wishlist_table::WishlistTable;

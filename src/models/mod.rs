//! Domain models shared between the store, the services, and the API.

pub mod album;
pub mod artist;
pub mod expected;
pub mod scan;
pub mod settings;
pub mod summary;
pub mod track;

pub use album::Album;
pub use artist::Artist;
pub use expected::{
    AlbumAlias, AlbumMatchOverride, ExpectedAlbum, ExpectedArtist, ExpectedArtistSettings,
    WantedAlbum, WishlistAlbum,
};
pub use scan::{ScanSkip, ScanSnapshot, ScanStatusKind};
pub use settings::Settings;
pub use summary::ArtistSummary;
pub use track::Track;

pub mod gateway;
pub mod playlist;

pub use gateway::{Credentials, HostIdentity};
pub use playlist::{Playlist, PlaylistEntry};

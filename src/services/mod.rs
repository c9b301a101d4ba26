pub mod address;
pub mod auth;
pub mod cache;
pub mod catalog;
pub mod facade;
pub mod forwarder;
pub mod hls;
pub mod m3u;
pub mod playlist;
pub mod rewriter;
pub mod xtream;

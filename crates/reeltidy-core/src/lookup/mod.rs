//! Network-backed providers: TMDB for metadata, TrailerAddict and YouTube for
//! trailers. All of them share one [`HttpClient`].

pub mod http;
pub mod tmdb;
pub mod traileraddict;
pub mod youtube;

pub use http::HttpClient;
pub use tmdb::TmdbSource;
pub use traileraddict::TrailerAddict;
pub use youtube::YouTube;

pub mod track;

pub use track::track_middleware;

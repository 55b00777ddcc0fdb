//! Embedded photo metadata: tag reading and the GPS / capture-time decoders.

pub mod coords;
pub mod tags;
pub mod timestamp;

pub use coords::{geolocation, Coordinates, Hemisphere, RationalTriple};
pub use tags::{read_tags, TagTable};
pub use timestamp::{capture_time, parse_capture_time};

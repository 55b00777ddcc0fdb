use std::fmt;
use std::str::FromStr;

use exif::{Rational, Tag, Value};
use serde::{Deserialize, Serialize};

use super::tags::TagTable;
use crate::error::CoordinateError;

/// Which side of the equator or prime meridian a coordinate lies on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Hemisphere {
    North,
    South,
    East,
    West,
}

impl Hemisphere {
    pub fn sign(self) -> f64 {
        match self {
            Hemisphere::North | Hemisphere::East => 1.0,
            Hemisphere::South | Hemisphere::West => -1.0,
        }
    }
}

impl FromStr for Hemisphere {
    type Err = CoordinateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "N" => Ok(Hemisphere::North),
            "S" => Ok(Hemisphere::South),
            "E" => Ok(Hemisphere::East),
            "W" => Ok(Hemisphere::West),
            other => Err(CoordinateError::InvalidHemisphere(other.to_string())),
        }
    }
}

/// Degrees, minutes and seconds of one axis as stored in GPS tags.
#[derive(Debug, Clone, Copy)]
pub struct RationalTriple {
    pub degrees: Rational,
    pub minutes: Rational,
    pub seconds: Rational,
}

impl RationalTriple {
    pub fn new(degrees: (u32, u32), minutes: (u32, u32), seconds: (u32, u32)) -> Self {
        Self {
            degrees: Rational::from(degrees),
            minutes: Rational::from(minutes),
            seconds: Rational::from(seconds),
        }
    }

    /// Decimal degrees, signed by `hemisphere`. Zero denominators are rejected.
    pub fn decode(&self, hemisphere: Hemisphere) -> Result<f64, CoordinateError> {
        let degrees = ratio(self.degrees, "degrees")?;
        let minutes = ratio(self.minutes, "minutes")?;
        let seconds = ratio(self.seconds, "seconds")?;
        Ok(hemisphere.sign() * (degrees + minutes / 60.0 + seconds / 3600.0))
    }
}

impl TryFrom<&Value> for RationalTriple {
    type Error = CoordinateError;

    fn try_from(value: &Value) -> Result<Self, Self::Error> {
        match value {
            Value::Rational(parts) if parts.len() == 3 => Ok(Self {
                degrees: parts[0],
                minutes: parts[1],
                seconds: parts[2],
            }),
            Value::Rational(parts) => Err(CoordinateError::ComponentCount(parts.len())),
            _ => Err(CoordinateError::UnexpectedType("GPS coordinate")),
        }
    }
}

fn ratio(r: Rational, component: &'static str) -> Result<f64, CoordinateError> {
    if r.denom == 0 {
        return Err(CoordinateError::ZeroDenominator { component });
    }
    Ok(r.num as f64 / r.denom as f64)
}

/// A decoded latitude/longitude pair in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lon: f64,
}

impl fmt::Display for Coordinates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.6}, {:.6}", self.lat, self.lon)
    }
}

/// Decode the file's geolocation.
///
/// Returns `None` unless all four GPS tags (latitude, latitude reference,
/// longitude, longitude reference) are present. A partial coordinate is
/// never produced.
pub fn geolocation(tags: &TagTable) -> Option<Result<Coordinates, CoordinateError>> {
    let lat = tags.get(Tag::GPSLatitude)?;
    let lat_ref = tags.ascii(Tag::GPSLatitudeRef)?;
    let lon = tags.get(Tag::GPSLongitude)?;
    let lon_ref = tags.ascii(Tag::GPSLongitudeRef)?;

    Some(decode_pair(lat, &lat_ref, lon, &lon_ref))
}

fn decode_pair(
    lat: &Value,
    lat_ref: &str,
    lon: &Value,
    lon_ref: &str,
) -> Result<Coordinates, CoordinateError> {
    let lat_hemi = lat_ref.parse::<Hemisphere>()?;
    let lon_hemi = lon_ref.parse::<Hemisphere>()?;
    if !matches!(lat_hemi, Hemisphere::North | Hemisphere::South) {
        return Err(CoordinateError::InvalidHemisphere(lat_ref.to_string()));
    }
    if !matches!(lon_hemi, Hemisphere::East | Hemisphere::West) {
        return Err(CoordinateError::InvalidHemisphere(lon_ref.to_string()));
    }

    Ok(Coordinates {
        lat: RationalTriple::try_from(lat)?.decode(lat_hemi)?,
        lon: RationalTriple::try_from(lon)?.decode(lon_hemi)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn triple_value(parts: [(u32, u32); 3]) -> Value {
        Value::Rational(parts.iter().map(|&p| Rational::from(p)).collect())
    }

    fn full_table(lat_ref: &str, lon_ref: &str) -> TagTable {
        let mut table = TagTable::default();
        table.insert(Tag::GPSLatitude, triple_value([(48, 1), (51, 1), (2934, 100)]));
        table.insert(Tag::GPSLatitudeRef, Value::Ascii(vec![lat_ref.as_bytes().to_vec()]));
        table.insert(Tag::GPSLongitude, triple_value([(2, 1), (17, 1), (4020, 100)]));
        table.insert(Tag::GPSLongitudeRef, Value::Ascii(vec![lon_ref.as_bytes().to_vec()]));
        table
    }

    #[test]
    fn test_decode_ten_and_a_half() {
        let triple = RationalTriple::new((10, 1), (30, 1), (0, 1));
        assert_eq!(triple.decode(Hemisphere::North).unwrap(), 10.5);
        assert_eq!(triple.decode(Hemisphere::South).unwrap(), -10.5);
    }

    #[test]
    fn test_southern_and_western_flip_sign() {
        let triple = RationalTriple::new((35, 1), (41, 1), (2244, 100));
        let north = triple.decode(Hemisphere::North).unwrap();
        let south = triple.decode(Hemisphere::South).unwrap();
        let east = triple.decode(Hemisphere::East).unwrap();
        let west = triple.decode(Hemisphere::West).unwrap();

        assert!(north > 0.0 && east > 0.0);
        assert_eq!(south, -north);
        assert_eq!(west, -east);
    }

    #[test]
    fn test_zero_denominator_is_rejected() {
        let triple = RationalTriple::new((10, 1), (30, 0), (0, 1));
        assert_eq!(
            triple.decode(Hemisphere::North),
            Err(CoordinateError::ZeroDenominator { component: "minutes" })
        );
    }

    #[test]
    fn test_hemisphere_parse() {
        assert_eq!("W".parse::<Hemisphere>().unwrap(), Hemisphere::West);
        assert!(matches!(
            "X".parse::<Hemisphere>(),
            Err(CoordinateError::InvalidHemisphere(_))
        ));
    }

    #[test]
    fn test_geolocation_full() {
        let coords = geolocation(&full_table("N", "E")).unwrap().unwrap();
        assert!((coords.lat - 48.858150).abs() < 1e-6);
        assert!((coords.lon - 2.294500).abs() < 1e-6);

        let coords = geolocation(&full_table("S", "W")).unwrap().unwrap();
        assert!(coords.lat < 0.0 && coords.lon < 0.0);
    }

    #[test]
    fn test_geolocation_requires_all_four_tags() {
        for missing in [
            Tag::GPSLatitude,
            Tag::GPSLatitudeRef,
            Tag::GPSLongitude,
            Tag::GPSLongitudeRef,
        ] {
            let full = full_table("N", "E");
            let mut partial = TagTable::default();
            for tag in [
                Tag::GPSLatitude,
                Tag::GPSLatitudeRef,
                Tag::GPSLongitude,
                Tag::GPSLongitudeRef,
            ] {
                if tag != missing {
                    partial.insert(tag, full.get(tag).unwrap().clone());
                }
            }
            assert!(geolocation(&partial).is_none(), "missing {}", missing);
        }
    }

    #[test]
    fn test_geolocation_rejects_swapped_references() {
        let result = geolocation(&full_table("E", "N")).unwrap();
        assert!(matches!(result, Err(CoordinateError::InvalidHemisphere(_))));
    }

    #[test]
    fn test_geolocation_wrong_component_count() {
        let mut table = full_table("N", "E");
        table.insert(
            Tag::GPSLatitude,
            Value::Rational(vec![Rational::from((10, 1)), Rational::from((30, 1))]),
        );
        assert_eq!(
            geolocation(&table).unwrap(),
            Err(CoordinateError::ComponentCount(2))
        );
    }
}

//! Degrees/minutes/seconds to signed decimal degrees.

use super::outcome::Degradation;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Hemisphere {
    North,
    South,
    East,
    West,
}

impl Hemisphere {
    /// Reads a hemisphere reference given as text (`"N"`, `"s"`) or as the
    /// raw ASCII bytes EXIF stores (`b"W\0"`). Only the first meaningful
    /// byte counts.
    pub fn parse(raw: impl AsRef<[u8]>) -> Option<Self> {
        let letter = raw
            .as_ref()
            .iter()
            .copied()
            .find(|b| *b != 0 && !b.is_ascii_whitespace())?;

        match letter.to_ascii_uppercase() {
            b'N' => Some(Hemisphere::North),
            b'S' => Some(Hemisphere::South),
            b'E' => Some(Hemisphere::East),
            b'W' => Some(Hemisphere::West),
            _ => None,
        }
    }

    pub fn is_latitude(self) -> bool {
        matches!(self, Hemisphere::North | Hemisphere::South)
    }

    fn sign(self) -> f64 {
        match self {
            Hemisphere::South | Hemisphere::West => -1.0,
            Hemisphere::North | Hemisphere::East => 1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Dms {
    pub degrees: f64,
    pub minutes: f64,
    pub seconds: f64,
}

impl Dms {
    pub fn new(degrees: f64, minutes: f64, seconds: f64) -> Self {
        Dms { degrees, minutes, seconds }
    }

    /// Builds a triple from the first three EXIF rationals. A zero
    /// denominator or fewer than three components yields `None`.
    pub fn from_rationals(values: &[exif::Rational]) -> Option<Self> {
        let [d, m, s] = values.get(..3)? else {
            return None;
        };
        let parts = [d, m, s].map(|r| {
            if r.denom == 0 { f64::NAN } else { r.to_f64() }
        });
        if parts.iter().any(|p| !p.is_finite()) {
            return None;
        }
        Some(Dms::new(parts[0], parts[1], parts[2]))
    }

    pub fn to_decimal(&self) -> f64 {
        self.degrees + self.minutes / 60.0 + self.seconds / 3600.0
    }
}

/// Signed decimal degrees, negative south of the equator and west of the
/// prime meridian.
pub fn to_signed_degrees(dms: Dms, reference: Hemisphere) -> f64 {
    dms.to_decimal() * reference.sign()
}

/// A complete GPS position as recorded in the GPSInfo block.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GpsFix {
    pub latitude_ref: Hemisphere,
    pub latitude: Dms,
    pub longitude_ref: Hemisphere,
    pub longitude: Dms,
}

impl GpsFix {
    /// Validates that each reference belongs to its axis.
    pub fn new(
        latitude_ref: Hemisphere,
        latitude: Dms,
        longitude_ref: Hemisphere,
        longitude: Dms,
    ) -> Result<Self, Degradation> {
        if !latitude_ref.is_latitude() {
            return Err(Degradation::GpsMalformed("latitude reference"));
        }
        if longitude_ref.is_latitude() {
            return Err(Degradation::GpsMalformed("longitude reference"));
        }
        Ok(GpsFix { latitude_ref, latitude, longitude_ref, longitude })
    }

    pub fn to_decimal(&self) -> (f64, f64) {
        (
            to_signed_degrees(self.latitude, self.latitude_ref),
            to_signed_degrees(self.longitude, self.longitude_ref),
        )
    }

    /// `"lat, lon"` with four decimals, the form stored as a record location.
    pub fn to_location_string(&self) -> String {
        let (lat, lon) = self.to_decimal();
        format!("{lat:.4}, {lon:.4}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-4
    }

    #[test]
    fn pittsburgh_converts_to_expected_decimal_pair() {
        let fix = GpsFix::new(
            Hemisphere::North,
            Dms::new(40.0, 26.0, 46.0),
            Hemisphere::West,
            Dms::new(79.0, 58.0, 56.0),
        )
        .unwrap();

        let (lat, lon) = fix.to_decimal();
        assert!(approx(lat, 40.4461), "lat was {lat}");
        assert!(approx(lon, -79.9822), "lon was {lon}");
        assert_eq!(fix.to_location_string(), "40.4461, -79.9822");
    }

    #[test]
    fn sign_follows_hemisphere_for_many_triples() {
        for d in [0.0, 1.0, 45.0, 89.0] {
            for m in [0.0, 30.0, 59.0] {
                for s in [0.0, 12.5, 59.99] {
                    let dms = Dms::new(d, m, s);
                    assert!(to_signed_degrees(dms, Hemisphere::North) >= 0.0);
                    assert!(to_signed_degrees(dms, Hemisphere::East) >= 0.0);
                    assert!(to_signed_degrees(dms, Hemisphere::South) <= 0.0);
                    assert!(to_signed_degrees(dms, Hemisphere::West) <= 0.0);
                }
            }
        }
    }

    #[test]
    fn reference_accepts_text_and_bytes() {
        assert_eq!(Hemisphere::parse("S"), Some(Hemisphere::South));
        assert_eq!(Hemisphere::parse("w"), Some(Hemisphere::West));
        assert_eq!(Hemisphere::parse(b"N\0"), Some(Hemisphere::North));
        assert_eq!(Hemisphere::parse(vec![b' ', b'E']), Some(Hemisphere::East));
        assert_eq!(Hemisphere::parse(""), None);
        assert_eq!(Hemisphere::parse("X"), None);
    }

    #[test]
    fn rationals_with_zero_denominator_are_rejected() {
        let values = [
            exif::Rational { num: 40, denom: 1 },
            exif::Rational { num: 26, denom: 0 },
            exif::Rational { num: 46, denom: 1 },
        ];
        assert_eq!(Dms::from_rationals(&values), None);
    }

    #[test]
    fn short_rational_list_is_rejected() {
        let values = [exif::Rational { num: 40, denom: 1 }];
        assert_eq!(Dms::from_rationals(&values), None);
    }

    #[test]
    fn fractional_seconds_are_kept() {
        let values = [
            exif::Rational { num: 37, denom: 1 },
            exif::Rational { num: 46, denom: 1 },
            exif::Rational { num: 2849, denom: 100 },
        ];
        let dms = Dms::from_rationals(&values).unwrap();
        assert!(approx(dms.to_decimal(), 37.774_580_5));
    }

    #[test]
    fn swapped_axis_references_are_malformed() {
        let dms = Dms::new(1.0, 0.0, 0.0);
        let err = GpsFix::new(Hemisphere::East, dms, Hemisphere::North, dms).unwrap_err();
        assert_eq!(err, Degradation::GpsMalformed("latitude reference"));
    }
}

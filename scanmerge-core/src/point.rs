//! Point record types and the per-frame field layouts they encode

use nalgebra::{Point3, Vector3};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{Error, Result};

/// A 3D point with floating point coordinates
pub type Point3f = Point3<f32>;

/// A 3D vector with double precision components
pub type Vector3d = Vector3<f64>;

/// Field layout of a scan record, fixed once per frame by its first data row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PointLayout {
    /// x y z
    Xyz,
    /// x y z intensity
    XyzIntensity,
    /// x y z intensity r g b
    XyzIntensityRgb,
}

impl PointLayout {
    /// Number of whitespace separated values per row
    pub const fn width(self) -> usize {
        match self {
            PointLayout::Xyz => 3,
            PointLayout::XyzIntensity => 4,
            PointLayout::XyzIntensityRgb => 7,
        }
    }

    /// Layout for a row holding `width` values
    pub fn from_width(width: usize) -> Result<Self> {
        match width {
            3 => Ok(PointLayout::Xyz),
            4 => Ok(PointLayout::XyzIntensity),
            7 => Ok(PointLayout::XyzIntensityRgb),
            other => Err(Error::UnsupportedFieldWidth(other)),
        }
    }

    /// Field names in row order
    pub fn field_names(self) -> &'static [&'static str] {
        const NAMES: [&str; 7] = ["x", "y", "z", "i", "r", "g", "b"];
        &NAMES[..self.width()]
    }
}

impl fmt::Display for PointLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.field_names().join(","))
    }
}

/// A point with an intensity return value
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[repr(C)]
pub struct IntensityPoint3f {
    pub position: Point3f,
    pub intensity: f32,
}

/// A point with intensity and color information
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[repr(C)]
pub struct ColoredIntensityPoint3f {
    pub position: Point3f,
    pub intensity: f32,
    pub color: [u8; 3],
}

impl Default for IntensityPoint3f {
    fn default() -> Self {
        Self {
            position: Point3f::origin(),
            intensity: 0.0,
        }
    }
}

impl Default for ColoredIntensityPoint3f {
    fn default() -> Self {
        Self {
            position: Point3f::origin(),
            intensity: 0.0,
            color: [255, 255, 255],
        }
    }
}

/// A fixed-layout scan record.
///
/// Each implementor corresponds to exactly one [`PointLayout`]. Geometry code only
/// touches the position; every other field passes through filters and transforms
/// unchanged.
pub trait ScanRecord: Copy + Send + Sync + PartialEq + fmt::Debug + 'static {
    /// Layout this record encodes
    const LAYOUT: PointLayout;

    /// Values per row
    const WIDTH: usize = Self::LAYOUT.width();

    /// Position of the record
    fn position(&self) -> Point3f;

    /// Mutable access to the position
    fn position_mut(&mut self) -> &mut Point3f;

    /// Decode one text row that has already been split on whitespace.
    ///
    /// The caller guarantees `tokens.len() == Self::WIDTH`.
    fn parse_tokens(tokens: &[&str]) -> std::result::Result<Self, String>;

    /// Encode as space separated text, floats with 6 decimals
    fn write_tokens<W: fmt::Write>(&self, out: &mut W) -> fmt::Result;

    /// Build from dense `f32` fields (colors as integer valued floats)
    fn from_fields(fields: &[f32]) -> Self;

    /// Append the record as dense `f32` fields
    fn extend_fields(&self, out: &mut Vec<f32>);
}

fn parse_f32(token: &str, name: &str) -> std::result::Result<f32, String> {
    token
        .parse::<f32>()
        .map_err(|_| format!("invalid {} value '{}'", name, token))
}

fn parse_u8(token: &str, name: &str) -> std::result::Result<u8, String> {
    token
        .parse::<u8>()
        .map_err(|_| format!("invalid {} value '{}'", name, token))
}

fn parse_position(tokens: &[&str]) -> std::result::Result<Point3f, String> {
    Ok(Point3f::new(
        parse_f32(tokens[0], "x")?,
        parse_f32(tokens[1], "y")?,
        parse_f32(tokens[2], "z")?,
    ))
}

fn write_position<W: fmt::Write>(p: &Point3f, out: &mut W) -> fmt::Result {
    write!(out, "{:.6} {:.6} {:.6}", p.x, p.y, p.z)
}

impl ScanRecord for Point3f {
    const LAYOUT: PointLayout = PointLayout::Xyz;

    fn position(&self) -> Point3f {
        *self
    }

    fn position_mut(&mut self) -> &mut Point3f {
        self
    }

    fn parse_tokens(tokens: &[&str]) -> std::result::Result<Self, String> {
        parse_position(tokens)
    }

    fn write_tokens<W: fmt::Write>(&self, out: &mut W) -> fmt::Result {
        write_position(self, out)
    }

    fn from_fields(fields: &[f32]) -> Self {
        Point3f::new(fields[0], fields[1], fields[2])
    }

    fn extend_fields(&self, out: &mut Vec<f32>) {
        out.extend_from_slice(&[self.x, self.y, self.z]);
    }
}

impl ScanRecord for IntensityPoint3f {
    const LAYOUT: PointLayout = PointLayout::XyzIntensity;

    fn position(&self) -> Point3f {
        self.position
    }

    fn position_mut(&mut self) -> &mut Point3f {
        &mut self.position
    }

    fn parse_tokens(tokens: &[&str]) -> std::result::Result<Self, String> {
        Ok(Self {
            position: parse_position(tokens)?,
            intensity: parse_f32(tokens[3], "intensity")?,
        })
    }

    fn write_tokens<W: fmt::Write>(&self, out: &mut W) -> fmt::Result {
        write_position(&self.position, out)?;
        write!(out, " {:.6}", self.intensity)
    }

    fn from_fields(fields: &[f32]) -> Self {
        Self {
            position: Point3f::new(fields[0], fields[1], fields[2]),
            intensity: fields[3],
        }
    }

    fn extend_fields(&self, out: &mut Vec<f32>) {
        self.position.extend_fields(out);
        out.push(self.intensity);
    }
}

impl ScanRecord for ColoredIntensityPoint3f {
    const LAYOUT: PointLayout = PointLayout::XyzIntensityRgb;

    fn position(&self) -> Point3f {
        self.position
    }

    fn position_mut(&mut self) -> &mut Point3f {
        &mut self.position
    }

    fn parse_tokens(tokens: &[&str]) -> std::result::Result<Self, String> {
        Ok(Self {
            position: parse_position(tokens)?,
            intensity: parse_f32(tokens[3], "intensity")?,
            color: [
                parse_u8(tokens[4], "r")?,
                parse_u8(tokens[5], "g")?,
                parse_u8(tokens[6], "b")?,
            ],
        })
    }

    fn write_tokens<W: fmt::Write>(&self, out: &mut W) -> fmt::Result {
        write_position(&self.position, out)?;
        write!(
            out,
            " {:.6} {} {} {}",
            self.intensity, self.color[0], self.color[1], self.color[2]
        )
    }

    fn from_fields(fields: &[f32]) -> Self {
        // `as` saturates, out-of-range channels clamp to 0..=255
        Self {
            position: Point3f::new(fields[0], fields[1], fields[2]),
            intensity: fields[3],
            color: [
                fields[4].round() as u8,
                fields[5].round() as u8,
                fields[6].round() as u8,
            ],
        }
    }

    fn extend_fields(&self, out: &mut Vec<f32>) {
        self.position.extend_fields(out);
        out.push(self.intensity);
        out.extend(self.color.iter().map(|&c| c as f32));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_widths() {
        assert_eq!(PointLayout::from_width(3).unwrap(), PointLayout::Xyz);
        assert_eq!(PointLayout::from_width(4).unwrap(), PointLayout::XyzIntensity);
        assert_eq!(PointLayout::from_width(7).unwrap(), PointLayout::XyzIntensityRgb);
        assert!(matches!(
            PointLayout::from_width(5),
            Err(Error::UnsupportedFieldWidth(5))
        ));
        assert_eq!(ColoredIntensityPoint3f::WIDTH, 7);
        assert_eq!(PointLayout::XyzIntensity.to_string(), "x,y,z,i");
    }

    #[test]
    fn test_parse_colored_tokens() {
        let tokens = ["1.5", "-2", "3e1", "0.25", "255", "0", "17"];
        let p = ColoredIntensityPoint3f::parse_tokens(&tokens).unwrap();
        assert_eq!(p.position, Point3f::new(1.5, -2.0, 30.0));
        assert_eq!(p.intensity, 0.25);
        assert_eq!(p.color, [255, 0, 17]);
    }

    #[test]
    fn test_parse_rejects_bad_tokens() {
        assert!(Point3f::parse_tokens(&["1.0", "abc", "3.0"]).is_err());
        // color channels are integers, not floats
        let fractional = ["0", "0", "0", "0", "1.5", "0", "0"];
        assert!(ColoredIntensityPoint3f::parse_tokens(&fractional).is_err());
        let overflow = ["0", "0", "0", "0", "256", "0", "0"];
        assert!(ColoredIntensityPoint3f::parse_tokens(&overflow).is_err());
    }

    #[test]
    fn test_write_tokens_formatting() {
        let p = ColoredIntensityPoint3f {
            position: Point3f::new(1.0, 2.5, -3.0),
            intensity: 0.5,
            color: [1, 2, 3],
        };
        let mut line = String::new();
        p.write_tokens(&mut line).unwrap();
        assert_eq!(line, "1.000000 2.500000 -3.000000 0.500000 1 2 3");
    }

    #[test]
    fn test_fields_roundtrip() {
        let p = IntensityPoint3f {
            position: Point3f::new(1.0, 2.0, 3.0),
            intensity: 0.75,
        };
        let mut fields = Vec::new();
        p.extend_fields(&mut fields);
        assert_eq!(fields, vec![1.0, 2.0, 3.0, 0.75]);
        assert_eq!(IntensityPoint3f::from_fields(&fields), p);
    }
}

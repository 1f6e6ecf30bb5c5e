//! Per-face shading from a material class.
//!
//! Shading is a stack of paint layers (first layer on top) plus the few
//! effects the presentation layer applies to a face: border, glows,
//! backface visibility and blur.

use crate::color::{self, Rgba};
use crate::document::MaterialClass;
use crate::geometry::{FaceRole, Num};

use nalgebra::Vector2;
use serde::{Serialize, Serializer};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColorStop {
    pub color: Rgba,
    /// Percent along the gradient; `None` lets stops spread evenly
    pub at: Option<f64>,
}

impl ColorStop {
    fn at(color: Rgba, percent: f64) -> Self {
        Self {
            color,
            at: Some(percent),
        }
    }

    fn even(color: Rgba) -> Self {
        Self { color, at: None }
    }
}

impl fmt::Display for ColorStop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.at {
            Some(at) => write!(f, "{} {}%", self.color, Num(at)),
            None => write!(f, "{}", self.color),
        }
    }
}

/// One background layer.
#[derive(Debug, Clone, PartialEq)]
pub enum Paint {
    Solid(Rgba),
    Linear { angle_deg: f64, stops: Vec<ColorStop> },
    /// Circle centered at a percentage of the face box
    Radial { center: Vector2<f64>, stops: Vec<ColorStop> },
}

impl fmt::Display for Paint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Paint::Solid(color) => write!(f, "{}", color),
            Paint::Linear { angle_deg, stops } => {
                write!(f, "linear-gradient({}deg", Num(*angle_deg))?;
                write_stops(f, stops)
            }
            Paint::Radial { center, stops } => {
                write!(
                    f,
                    "radial-gradient(circle at {}% {}%",
                    Num(center.x),
                    Num(center.y)
                )?;
                write_stops(f, stops)
            }
        }
    }
}

fn write_stops(f: &mut fmt::Formatter<'_>, stops: &[ColorStop]) -> fmt::Result {
    for stop in stops {
        write!(f, ", {}", stop)?;
    }
    f.write_str(")")
}

impl Serialize for Paint {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Glow {
    pub color: Rgba,
    pub radius_px: f64,
}

/// Resolved look of one face.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FaceShading {
    pub layers: Vec<Paint>,
    pub border: Rgba,
    pub inner_glow: Option<Glow>,
    pub outer_glow: Option<Glow>,
    pub backface_visible: bool,
    pub blur_px: f64,
}

impl FaceShading {
    fn plain(layer: Paint) -> Self {
        Self {
            layers: vec![layer],
            border: Rgba::rgba(0, 0, 0, 0.1),
            inner_glow: None,
            outer_glow: None,
            backface_visible: false,
            blur_px: 0.0,
        }
    }

    /// Layers as a CSS `background` value.
    pub fn background(&self) -> String {
        self.layers
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ")
    }
}

const WHITE: Rgba = Rgba::WHITE;

fn highlight_center() -> Vector2<f64> {
    Vector2::new(30.0, 30.0)
}

fn face_center() -> Vector2<f64> {
    Vector2::new(50.0, 50.0)
}

/// Shading for a face of the given role with a material class and color.
pub fn shade(class: MaterialClass, role: FaceRole, base: Rgba) -> FaceShading {
    if role == FaceRole::Disc {
        return sphere_shading(base);
    }

    match class {
        MaterialClass::Metal => FaceShading::plain(match role {
            FaceRole::Top | FaceRole::Bottom => Paint::Radial {
                center: highlight_center(),
                stops: vec![
                    ColorStop::at(WHITE.with_alpha(0.9), 0.0),
                    ColorStop::at(base, 50.0),
                    ColorStop::at(color::SLATE_700, 90.0),
                ],
            },
            _ => Paint::Linear {
                angle_deg: 135.0,
                stops: vec![
                    ColorStop::at(base, 0.0),
                    ColorStop::at(WHITE, 40.0),
                    ColorStop::at(base, 60.0),
                    ColorStop::at(color::SLATE_600, 100.0),
                ],
            },
        }),
        MaterialClass::Glass => FaceShading {
            layers: vec![Paint::Solid(Rgba::rgba(56, 189, 248, 0.2))],
            border: Rgba::rgba(14, 165, 233, 0.3),
            inner_glow: Some(Glow {
                color: WHITE.with_alpha(0.8),
                radius_px: 20.0,
            }),
            outer_glow: None,
            backface_visible: true,
            blur_px: 1.0,
        },
        MaterialClass::GlowingLava => {
            let layer = if role == FaceRole::Top {
                Paint::Radial {
                    center: face_center(),
                    stops: vec![
                        ColorStop::even(WHITE),
                        ColorStop::even(base),
                        ColorStop::even(color::RED_800),
                    ],
                }
            } else {
                Paint::Linear {
                    angle_deg: 180.0,
                    stops: vec![
                        ColorStop::even(base),
                        ColorStop::even(color::ORANGE_600),
                        ColorStop::even(color::RED_900),
                    ],
                }
            };
            FaceShading {
                outer_glow: Some(Glow {
                    color: base,
                    radius_px: 30.0,
                }),
                ..FaceShading::plain(layer)
            }
        }
        MaterialClass::Liquid | MaterialClass::Plastic | MaterialClass::Rock => {
            FaceShading::plain(if role == FaceRole::Top {
                Paint::Radial {
                    center: highlight_center(),
                    stops: vec![
                        ColorStop::even(WHITE.with_alpha(0.8)),
                        ColorStop::at(base, 60.0),
                        ColorStop::even(color::SLATE_700),
                    ],
                }
            } else {
                Paint::Linear {
                    angle_deg: 90.0,
                    stops: vec![
                        ColorStop::even(color::SLATE_700),
                        ColorStop::at(base, 20.0),
                        ColorStop::at(base, 80.0),
                        ColorStop::even(color::SLATE_700),
                    ],
                }
            })
        }
    }
}

/// Spheres ignore the material class: base color under a fixed light/shadow overlay.
fn sphere_shading(base: Rgba) -> FaceShading {
    FaceShading {
        layers: vec![
            Paint::Radial {
                center: highlight_center(),
                stops: vec![
                    ColorStop::even(WHITE.with_alpha(0.4)),
                    ColorStop::at(Rgba::rgba(0, 0, 0, 0.05), 50.0),
                    ColorStop::at(Rgba::rgba(0, 0, 0, 0.4), 100.0),
                ],
            },
            Paint::Solid(base),
        ],
        ..FaceShading::plain(Paint::Solid(base))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ORANGE: Rgba = Rgba::rgb(0xff, 0xaa, 0x00);

    #[test]
    fn test_metal_caps_and_sides() {
        let cap = shade(MaterialClass::Metal, FaceRole::Bottom, ORANGE);
        assert_eq!(
            cap.background(),
            "radial-gradient(circle at 30% 30%, rgba(255, 255, 255, 0.9) 0%, #ffaa00 50%, #334155 90%)"
        );
        let side = shade(MaterialClass::Metal, FaceRole::Side, ORANGE);
        assert_eq!(
            side.background(),
            "linear-gradient(135deg, #ffaa00 0%, #ffffff 40%, #ffaa00 60%, #475569 100%)"
        );
        assert!(!side.backface_visible);
    }

    #[test]
    fn test_glass_is_translucent() {
        let face = shade(MaterialClass::Glass, FaceRole::Side, ORANGE);
        assert!(face.backface_visible);
        assert_eq!(face.blur_px, 1.0);
        assert_eq!(face.inner_glow.unwrap().radius_px, 20.0);
        assert_eq!(face.background(), "rgba(56, 189, 248, 0.2)");
    }

    #[test]
    fn test_lava_glows_with_base_color() {
        let top = shade(MaterialClass::GlowingLava, FaceRole::Top, ORANGE);
        assert_eq!(
            top.background(),
            "radial-gradient(circle at 50% 50%, #ffffff, #ffaa00, #991b1b)"
        );
        let bottom = shade(MaterialClass::GlowingLava, FaceRole::Bottom, ORANGE);
        assert!(bottom.background().starts_with("linear-gradient(180deg"));
        assert_eq!(bottom.outer_glow.unwrap().color, ORANGE);
    }

    #[test]
    fn test_matte_fallback() {
        let rock = shade(MaterialClass::Rock, FaceRole::Side, ORANGE);
        let plastic = shade(MaterialClass::Plastic, FaceRole::Side, ORANGE);
        assert_eq!(rock, plastic);
        assert_eq!(
            rock.background(),
            "linear-gradient(90deg, #334155, #ffaa00 20%, #ffaa00 80%, #334155)"
        );
    }

    #[test]
    fn test_sphere_overlay() {
        let disc = shade(MaterialClass::Metal, FaceRole::Disc, ORANGE);
        assert_eq!(disc.layers.len(), 2);
        assert_eq!(disc.layers[1], Paint::Solid(ORANGE));
    }
}

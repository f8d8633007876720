//! Colors used by the figure: the UI theme, the categorical series palette,
//! the rainbow gradient and the spectrogram colormaps.
//!
//! Colors in the figure model are plain unmultiplied sRGB [`Rgba`] so the
//! selection recolor math stays exact; they are converted to egui colors only
//! when drawing.

use std::collections::HashMap;
use std::f32::consts::PI;
use std::fmt;

use eframe::egui::{Color32, Context, Visuals};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

/// Unmultiplied sRGB color with components in `[0, 1]`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Rgba {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Rgba {
    pub const fn new(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    pub const fn from_hex(hex: u32) -> Self {
        Self {
            r: ((hex >> 16) & 0xff) as f32 / 255.0,
            g: ((hex >> 8) & 0xff) as f32 / 255.0,
            b: (hex & 0xff) as f32 / 255.0,
            a: 1.0,
        }
    }

    /// Blend the color channels toward white by `factor`; alpha is kept.
    pub fn lighten(self, factor: f32) -> Self {
        let f = |c: f32| factor * (1.0 - c) + c;
        Self::new(f(self.r), f(self.g), f(self.b), self.a)
    }

    pub fn with_alpha(self, a: f32) -> Self {
        Self { a, ..self }
    }

    fn lerp(self, other: Rgba, t: f32) -> Rgba {
        let m = |a: f32, b: f32| a + (b - a) * t;
        Rgba::new(m(self.r, other.r), m(self.g, other.g), m(self.b, other.b), m(self.a, other.a))
    }

    pub fn to_color32(self) -> Color32 {
        let q = |c: f32| (c.clamp(0.0, 1.0) * 255.0).round() as u8;
        Color32::from_rgba_unmultiplied(q(self.r), q(self.g), q(self.b), q(self.a))
    }
}

/// Neutral gray for values without a label color.
pub const UNMAPPED_GRAY: Rgba = Rgba::new(0.8, 0.8, 0.8, 1.0);

/// Color of the "None" class in label bars.
pub const NONE_CLASS_GRAY: Rgba = Rgba::new(0.5, 0.5, 0.5, 0.3);

/// The 10-color categorical palette.
pub const TAB10: [Rgba; 10] = [
    Rgba::from_hex(0x1f77b4),
    Rgba::from_hex(0xff7f0e),
    Rgba::from_hex(0x2ca02c),
    Rgba::from_hex(0xd62728),
    Rgba::from_hex(0x9467bd),
    Rgba::from_hex(0x8c564b),
    Rgba::from_hex(0xe377c2),
    Rgba::from_hex(0x7f7f7f),
    Rgba::from_hex(0xbcbd22),
    Rgba::from_hex(0x17becf),
];

/// Rainbow gradient at `t` in `[0, 1]`.
pub fn rainbow(t: f32) -> Rgba {
    let t = t.clamp(0.0, 1.0);
    Rgba::new(
        (2.0 * t - 0.5).abs().min(1.0),
        (PI * t).sin(),
        (PI / 2.0 * t).cos(),
        1.0,
    )
}

/// `n` colors evenly spaced along the rainbow gradient.
pub fn rainbow_colors(n: usize) -> Vec<Rgba> {
    match n {
        0 => Vec::new(),
        1 => vec![rainbow(0.0)],
        _ => (0..n).map(|i| rainbow(i as f32 / (n - 1) as f32)).collect(),
    }
}

/// `n` distinct series colors: the categorical palette for up to ten,
/// the rainbow gradient beyond.
pub fn series_colors(n: usize) -> Vec<Rgba> {
    if n <= TAB10.len() {
        TAB10[..n].to_vec()
    } else {
        rainbow_colors(n)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Spectrogram colormaps
// ─────────────────────────────────────────────────────────────────────────────

/// Colormaps available for the spectrogram.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Colormap {
    #[default]
    Viridis,
    BlueYellowRed,
    Inferno,
    Magma,
    Plasma,
    Cividis,
    Gnuplot,
}

const LUT_SIZE: usize = 256;

static LUTS: Lazy<HashMap<Colormap, Vec<Rgba>>> = Lazy::new(|| {
    Colormap::ALL
        .iter()
        .map(|cm| {
            let lut = (0..LUT_SIZE)
                .map(|i| cm.evaluate(i as f32 / (LUT_SIZE - 1) as f32))
                .collect();
            (*cm, lut)
        })
        .collect()
});

fn stops(hexes: &[u32], t: f32) -> Rgba {
    let n = hexes.len() - 1;
    let x = t.clamp(0.0, 1.0) * n as f32;
    let i = (x.floor() as usize).min(n - 1);
    Rgba::from_hex(hexes[i]).lerp(Rgba::from_hex(hexes[i + 1]), x - i as f32)
}

impl Colormap {
    pub const ALL: [Colormap; 7] = [
        Colormap::Viridis,
        Colormap::BlueYellowRed,
        Colormap::Inferno,
        Colormap::Magma,
        Colormap::Plasma,
        Colormap::Cividis,
        Colormap::Gnuplot,
    ];

    fn evaluate(self, t: f32) -> Rgba {
        match self {
            Colormap::Viridis => stops(
                &[0x440154, 0x472c7a, 0x3b518b, 0x2c718e, 0x21908d, 0x27ad81, 0x5cc863, 0xaadc32, 0xfde725],
                t,
            ),
            Colormap::BlueYellowRed => stops(&[0x0000ff, 0xffff00, 0xff0000], t),
            Colormap::Inferno => stops(
                &[0x000004, 0x1f0c48, 0x550f6d, 0x88226a, 0xba3655, 0xe35933, 0xf98c0a, 0xf9c932, 0xfcffa4],
                t,
            ),
            Colormap::Magma => stops(
                &[0x000004, 0x1c1044, 0x4f127b, 0x812581, 0xb5367a, 0xe55064, 0xfb8761, 0xfec287, 0xfcfdbf],
                t,
            ),
            Colormap::Plasma => stops(
                &[0x0d0887, 0x4c02a1, 0x7e03a8, 0xa92395, 0xcc4778, 0xe56b5d, 0xf89441, 0xfdc328, 0xf0f921],
                t,
            ),
            Colormap::Cividis => stops(
                &[0x00224e, 0x123570, 0x3b496c, 0x575d6d, 0x707173, 0x8a8779, 0xa69d75, 0xc4b56c, 0xfee838],
                t,
            ),
            Colormap::Gnuplot => {
                let t = t.clamp(0.0, 1.0);
                Rgba::new(t.sqrt(), t.powi(3), (2.0 * PI * t).sin().max(0.0), 1.0)
            }
        }
    }

    /// Color at `t` in `[0, 1]` (clamped, NaN maps to the low end).
    pub fn sample(self, t: f32) -> Rgba {
        let t = if t.is_nan() { 0.0 } else { t.clamp(0.0, 1.0) };
        let idx = (t * (LUT_SIZE - 1) as f32).round() as usize;
        LUTS.get(&self)
            .and_then(|lut| lut.get(idx).copied())
            .unwrap_or_else(|| self.evaluate(t))
    }

    pub fn label(self) -> &'static str {
        match self {
            Colormap::Viridis => "viridis",
            Colormap::BlueYellowRed => "BlueYellowRed",
            Colormap::Inferno => "inferno",
            Colormap::Magma => "magma",
            Colormap::Plasma => "plasma",
            Colormap::Cividis => "cividis",
            Colormap::Gnuplot => "gnuplot",
        }
    }
}

impl fmt::Display for Colormap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// UI theme
// ─────────────────────────────────────────────────────────────────────────────

/// Visual theme for the application window.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

impl Theme {
    pub fn from_dark_mode(dark: bool) -> Self {
        if dark {
            Theme::Dark
        } else {
            Theme::Light
        }
    }

    pub fn apply(&self, ctx: &Context) {
        match self {
            Theme::Dark => ctx.set_visuals(Visuals::dark()),
            Theme::Light => ctx.set_visuals(Visuals::light()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lighten_moves_toward_white() {
        let c = Rgba::new(0.0, 0.5, 1.0, 0.4).lighten(0.75);
        assert!((c.r - 0.75).abs() < 1e-6);
        assert!((c.g - 0.875).abs() < 1e-6);
        assert!((c.b - 1.0).abs() < 1e-6);
        assert_eq!(c.a, 0.4);
    }

    #[test]
    fn palette_switches_to_rainbow_beyond_ten() {
        assert_eq!(series_colors(3), TAB10[..3].to_vec());
        let many = series_colors(12);
        assert_eq!(many.len(), 12);
        assert_eq!(many[0], rainbow(0.0));
    }

    #[test]
    fn colormap_endpoints() {
        let lo = Colormap::Viridis.sample(0.0);
        assert_eq!(lo.to_color32(), Color32::from_rgb(0x44, 0x01, 0x54));
        let hi = Colormap::Viridis.sample(1.0);
        assert_eq!(hi.to_color32(), Color32::from_rgb(0xfd, 0xe7, 0x25));
        assert_eq!(Colormap::Magma.sample(f32::NAN), Colormap::Magma.sample(0.0));
    }
}

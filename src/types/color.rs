//! Linear RGB colours and their packed integer form.

use serde::{Deserialize, Serialize};

/// Linear RGB colour with components in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Color(pub [f32; 3]);

impl Color {
    pub const BLACK: Color = Color([0.0, 0.0, 0.0]);
    pub const WHITE: Color = Color([1.0, 1.0, 1.0]);

    pub fn new(r: f32, g: f32, b: f32) -> Self {
        Self([r, g, b])
    }

    /// Multiply every component by `factor`.
    pub fn scale(self, factor: f32) -> Self {
        Self(self.0.map(|c| c * factor))
    }

    pub fn is_black(&self) -> bool {
        *self == Self::BLACK
    }

    /// Apply the sRGB transfer curve to every component.
    pub fn to_srgb(self) -> Self {
        Self(self.0.map(linear_to_srgb))
    }

    /// Pack into a 24-bit `0xRRGGBB` integer, optionally sRGB encoded first.
    pub fn to_hex(self, srgb: bool) -> u32 {
        let c = if srgb { self.to_srgb() } else { self };
        let channel = |v: f32| (v * 255.0) as i64 as u32 & 0xFF;
        channel(c.0[0]) << 16 ^ channel(c.0[1]) << 8 ^ channel(c.0[2])
    }
}

impl Default for Color {
    fn default() -> Self {
        Self::WHITE
    }
}

fn linear_to_srgb(v: f32) -> f32 {
    const A: f32 = 0.055;
    if v <= 0.003_130_8 {
        v * 12.92
    } else {
        (1.0 + A) * v.powf(1.0 / 2.4) - A
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_hex_linear() {
        assert_eq!(Color::WHITE.to_hex(false), 0xFFFFFF);
        assert_eq!(Color::BLACK.to_hex(false), 0);
        assert_eq!(Color::new(1.0, 0.0, 0.0).to_hex(false), 0xFF0000);
        assert_eq!(Color::new(0.0, 0.5, 0.0).to_hex(false), 0x007F00);
    }

    #[test]
    fn test_to_hex_srgb() {
        assert_eq!(Color::WHITE.to_hex(true), 0xFFFFFF);
        // Linear 0.5 is roughly 0.735 in sRGB.
        assert_eq!(Color::new(0.5, 0.5, 0.5).to_hex(true), 0xBBBBBB);
    }

    #[test]
    fn test_scale() {
        assert_eq!(Color::new(1.0, 0.5, 0.2).scale(0.5), Color::new(0.5, 0.25, 0.1));
    }
}

// Table-driven sRGB <-> linear conversion for compositing the HUD over video.
// Blending in linear light keeps anti-aliased glyph edges from darkening.

use fpv_hud::Color;

pub struct GammaLut {
    // sRGB(0..255) -> linear (0..1)
    srgb_to_linear: [f32; 256],
    // linear(0..1) -> sRGB(0..255), index = (linear * 4095).round()
    linear_to_srgb: [u8; 4096],
}

impl GammaLut {
    /// Build both tables once at startup.
    pub fn new() -> Self {
        let mut s2l = [0.0f32; 256];
        for (v, slot) in s2l.iter_mut().enumerate() {
            let c = v as f32 / 255.0;
            *slot = if c <= 0.04045 { c / 12.92 } else { ((c + 0.055) / 1.055).powf(2.4) };
        }

        let mut l2s = [0u8; 4096];
        for (i, slot) in l2s.iter_mut().enumerate() {
            let l = i as f32 / 4095.0;
            let s = if l <= 0.003_130_8 { 12.92 * l } else { 1.055 * l.powf(1.0 / 2.4) - 0.055 };
            *slot = (s * 255.0).round().clamp(0.0, 255.0) as u8;
        }

        Self { srgb_to_linear: s2l, linear_to_srgb: l2s }
    }

    #[inline]
    pub fn srgb_u8_to_linear(&self, v: u8) -> f32 {
        self.srgb_to_linear[v as usize]
    }

    #[inline]
    pub fn linear_to_srgb_u8(&self, l: f32) -> u8 {
        let idx = (l.clamp(0.0, 1.0) * 4095.0).round() as usize;
        self.linear_to_srgb[idx]
    }

    /// Composite one overlay pixel over a 0x00RRGGBB screen pixel.
    #[inline]
    pub fn blend_over(&self, dst: u32, src: Color) -> u32 {
        let [r, g, b, a] = src.0;
        match a {
            0 => dst,
            255 => pack(r, g, b),
            _ => {
                let a = a as f32 / 255.0;
                let mix = |s: u8, d: u8| {
                    let lin = self.srgb_u8_to_linear(s) * a + self.srgb_u8_to_linear(d) * (1.0 - a);
                    self.linear_to_srgb_u8(lin)
                };
                pack(
                    mix(r, (dst >> 16) as u8),
                    mix(g, (dst >> 8) as u8),
                    mix(b, dst as u8),
                )
            }
        }
    }
}

#[inline]
pub fn pack(r: u8, g: u8, b: u8) -> u32 {
    ((r as u32) << 16) | ((g as u32) << 8) | b as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;
    use pretty_assertions::assert_eq;

    #[test]
    fn tables_round_trip_endpoints() {
        let lut = GammaLut::new();
        assert_eq!(lut.linear_to_srgb_u8(lut.srgb_u8_to_linear(0)), 0);
        assert_eq!(lut.linear_to_srgb_u8(lut.srgb_u8_to_linear(255)), 255);
        assert_eq!(lut.linear_to_srgb_u8(2.0), 255);
    }

    #[test]
    fn blend_over_respects_alpha_extremes() {
        let lut = GammaLut::new();
        let dst = pack(10, 20, 30);
        assert_eq!(lut.blend_over(dst, Rgba([255, 0, 0, 0])), dst);
        assert_eq!(lut.blend_over(dst, Rgba([255, 0, 0, 255])), pack(255, 0, 0));
    }

    #[test]
    fn half_alpha_is_brighter_than_srgb_average() {
        let lut = GammaLut::new();
        let out = lut.blend_over(pack(0, 0, 0), Rgba([255, 255, 255, 128]));
        let r = (out >> 16) as u8;
        assert!(r > 128, "linear-light blend of white over black gave {r}");
    }
}

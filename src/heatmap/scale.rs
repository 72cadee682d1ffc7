use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb(pub u8, pub u8, pub u8);

impl Rgb {
    const fn from_hex(hex: u32) -> Self {
        Self((hex >> 16) as u8, (hex >> 8) as u8, hex as u8)
    }

    fn lerp(self, other: Self, t: f64) -> Self {
        let mix = |a: u8, b: u8| (f64::from(a) + (f64::from(b) - f64::from(a)) * t).round() as u8;
        Self(mix(self.0, other.0), mix(self.1, other.1), mix(self.2, other.2))
    }
}

impl std::fmt::Display for Rgb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.0, self.1, self.2)
    }
}

/// Sequential color schemes, from low to high.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Palette {
    #[default]
    Viridis,
    Blues,
}

const VIRIDIS: [Rgb; 10] = [
    Rgb::from_hex(0x44_01_54),
    Rgb::from_hex(0x48_28_78),
    Rgb::from_hex(0x3e_49_89),
    Rgb::from_hex(0x31_68_8e),
    Rgb::from_hex(0x26_82_8e),
    Rgb::from_hex(0x1f_9e_89),
    Rgb::from_hex(0x35_b7_79),
    Rgb::from_hex(0x6e_ce_58),
    Rgb::from_hex(0xb5_de_2b),
    Rgb::from_hex(0xfd_e7_25),
];

const BLUES: [Rgb; 9] = [
    Rgb::from_hex(0xf7_fb_ff),
    Rgb::from_hex(0xde_eb_f7),
    Rgb::from_hex(0xc6_db_ef),
    Rgb::from_hex(0x9e_ca_e1),
    Rgb::from_hex(0x6b_ae_d6),
    Rgb::from_hex(0x42_92_c6),
    Rgb::from_hex(0x21_71_b5),
    Rgb::from_hex(0x08_51_9c),
    Rgb::from_hex(0x08_30_6b),
];

impl Palette {
    const fn stops(self) -> &'static [Rgb] {
        match self {
            Self::Viridis => &VIRIDIS,
            Self::Blues => &BLUES,
        }
    }

    /// Color at `t` in `[0, 1]`.
    pub fn at(self, t: f64) -> Rgb {
        let stops = self.stops();
        let position = t.clamp(0.0, 1.0) * (stops.len() - 1) as f64;
        let lower = position.floor() as usize;
        let upper = (lower + 1).min(stops.len() - 1);

        stops[lower].lerp(stops[upper], position - lower as f64)
    }
}

/// Linear volume → color mapping over a fixed domain.
///
/// Volumes outside the domain take the color of the nearest end.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
#[serde(default)]
pub struct ColorScale {
    pub min: f64,
    pub max: f64,
    pub palette: Palette,
}

impl Default for ColorScale {
    fn default() -> Self {
        Self {
            min: 0.0,
            max: 2500.0,
            palette: Palette::default(),
        }
    }
}

impl ColorScale {
    /// Position of `volume` in the domain, clamped to `[0, 1]`.
    pub fn normalize(&self, volume: f64) -> f64 {
        let span = self.max - self.min;
        if !volume.is_finite() || span <= 0.0 {
            return 0.0;
        }
        ((volume - self.min) / span).clamp(0.0, 1.0)
    }

    pub fn color(&self, volume: f64) -> Rgb {
        self.palette.at(self.normalize(volume))
    }
}

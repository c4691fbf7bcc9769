mod stats;

pub use stats::Stats;

use crate::geometry::Channel;

/// Linear RGB color, also used as the per-channel energy carried by rays.
pub type Rgb = rgb::RGB<f32>;

pub const BLACK: Rgb = Rgb {
    r: 0.0,
    g: 0.0,
    b: 0.0,
};
pub const WHITE: Rgb = Rgb {
    r: 1.0,
    g: 1.0,
    b: 1.0,
};

/// Componentwise operations the light transport needs on top of what the
/// rgb crate provides.
pub trait ColorExt: Sized {
    fn mul_each(self, other: Self) -> Self;
    fn norm_squared(&self) -> f32;
    fn channel(&self, channel: Channel) -> f32;
    /// Zero everywhere except the given channel.
    fn only_channel(self, channel: Channel) -> Self;
    fn max_component(&self) -> f32;
    /// All three channels carry the same value.
    fn is_uniform(&self) -> bool;

    fn is_nearly_black(&self) -> bool {
        self.max_component() <= 1e-6
    }
}

impl ColorExt for Rgb {
    fn mul_each(self, other: Rgb) -> Rgb {
        Rgb {
            r: self.r * other.r,
            g: self.g * other.g,
            b: self.b * other.b,
        }
    }

    fn norm_squared(&self) -> f32 {
        self.r * self.r + self.g * self.g + self.b * self.b
    }

    fn channel(&self, channel: Channel) -> f32 {
        match channel {
            Channel::R => self.r,
            Channel::G => self.g,
            Channel::B => self.b,
        }
    }

    fn only_channel(self, channel: Channel) -> Rgb {
        let mut out = BLACK;
        match channel {
            Channel::R => out.r = self.r,
            Channel::G => out.g = self.g,
            Channel::B => out.b = self.b,
        }
        out
    }

    fn max_component(&self) -> f32 {
        self.r.max(self.g).max(self.b)
    }

    fn is_uniform(&self) -> bool {
        self.r == self.g && self.g == self.b
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert2::assert;

    #[test]
    fn mul_each_is_componentwise() {
        let a = Rgb {
            r: 0.5,
            g: 1.0,
            b: 2.0,
        };
        let b = Rgb {
            r: 2.0,
            g: 0.25,
            b: 0.5,
        };
        let c = a.mul_each(b);
        assert!(c == Rgb {
            r: 1.0,
            g: 0.25,
            b: 1.0
        });
    }

    #[test]
    fn only_channel_zeroes_the_rest() {
        let c = WHITE.only_channel(Channel::B);
        assert!(c.r == 0.0);
        assert!(c.g == 0.0);
        assert!(c.b == 1.0);
    }

    #[test]
    fn uniform_needs_all_three_channels_equal() {
        assert!(WHITE.is_uniform());
        assert!(!(Rgb {
            r: 1.0,
            g: 1.0,
            b: 0.9
        })
        .is_uniform());
    }

    #[test]
    fn black_is_nearly_black() {
        assert!(BLACK.is_nearly_black());
        assert!(!WHITE.is_nearly_black());
    }
}

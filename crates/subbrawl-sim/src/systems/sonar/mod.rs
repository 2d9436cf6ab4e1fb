//! Sonar model: passive listening and active pinging.

pub mod active;
pub mod passive;

use subbrawl_core::types::angle_diff;

/// Check if a bearing (radians) lies within `half_width` of `center`.
pub fn in_arc(bearing: f64, center: f64, half_width: f64) -> bool {
    angle_diff(center, bearing).abs() <= half_width
}

/// Uniform jitter in `[-half_width, half_width]`.
pub(crate) fn jitter(rng: &mut rand_chacha::ChaCha8Rng, half_width: f64) -> f64 {
    use rand::Rng;

    if half_width > 0.0 {
        rng.gen_range(-half_width..=half_width)
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_arc_wraps_through_north() {
        let center = 350f64.to_radians();
        let half = 15f64.to_radians();
        assert!(in_arc(5f64.to_radians(), center, half));
        assert!(in_arc(336f64.to_radians(), center, half));
        assert!(!in_arc(10f64.to_radians(), center, half));
        assert!(!in_arc(180f64.to_radians(), center, half));
    }
}

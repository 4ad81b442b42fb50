//! Trajectory easing
//!
//! Progress is first square-rooted (front-loading the motion) and then passed
//! through a cubic smoothstep, so the servo starts briskly and settles
//! gently into the target.

/// Map linear progress `p` in `[0, 1]` to eased progress in `[0, 1]`
pub fn ease(p: f32) -> f32 {
    let p = if p > 1.0 {
        1.0
    } else if p > 0.0 {
        p
    } else {
        0.0
    };
    let t = libm::sqrtf(p);
    t * t * (3.0 - 2.0 * t)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoints() {
        assert_eq!(ease(0.0), 0.0);
        assert_eq!(ease(1.0), 1.0);
    }

    #[test]
    fn test_quarter_progress() {
        // sqrt(0.25) = 0.5, smoothstep(0.5) = 0.5
        assert!((ease(0.25) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_front_loaded() {
        // Plain smoothstep(0.5) would be 0.5
        assert!(ease(0.5) > 0.75);
    }

    #[test]
    fn test_monotonic() {
        let mut last = 0.0;
        for i in 1..=100 {
            let e = ease(i as f32 / 100.0);
            assert!(e >= last);
            last = e;
        }
    }

    #[test]
    fn test_out_of_range_input_clamped() {
        assert_eq!(ease(-0.5), 0.0);
        assert_eq!(ease(2.0), 1.0);
        assert_eq!(ease(f32::NAN), 0.0);
    }
}

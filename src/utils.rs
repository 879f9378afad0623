//! Small shared DSP helpers.

pub mod dsp;

// -------------------------------------------------------------------------------------------------

/// Decibel value that is treated as -INF, when converting dB values to linear volume factors.
pub const MINUS_INF_IN_DB: f32 = -200.0;

/// Convert a dB value to a linear volume factor.
pub fn db_to_linear(value: f32) -> f32 {
    const DB_TO_LIN_FACTOR: f32 = 0.115_129_255; // ln(10.0) / 20.0
    if value <= MINUS_INF_IN_DB {
        0.0
    } else {
        (value * DB_TO_LIN_FACTOR).exp()
    }
}

// -------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_near(a: f32, b: f32) {
        assert!((a - b).abs() < 1e-4, "{} != {}", a, b);
    }

    #[test]
    fn db_conversion() {
        assert_near(db_to_linear(0.0), 1.0);
        assert_near(db_to_linear(-6.0206), 0.5);
        assert_near(db_to_linear(-20.0), 0.1);
        assert_eq!(db_to_linear(MINUS_INF_IN_DB), 0.0);
        assert_eq!(db_to_linear(-300.0), 0.0);
    }
}

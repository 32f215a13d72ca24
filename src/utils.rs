/// Default tolerance below which a flow counts as zero
pub const EPSILON: f64 = 1e-5;

/// Whether `a` and `b` differ by at most `tolerance`
pub fn approx_eq(a: f64, b: f64, tolerance: f64) -> bool {
    (a - b).abs() <= tolerance
}

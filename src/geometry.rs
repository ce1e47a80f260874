//! Scalar features derived from landmark coordinates.

/// Euclidean distance between two 2-D points.
pub fn distance(a: [f32; 2], b: [f32; 2]) -> f32 {
    let dx = a[0] - b[0];
    let dy = a[1] - b[1];
    (dx * dx + dy * dy).sqrt()
}

/// Proximity score in percent, rounded to two decimals.
///
/// `scale` is the distance at which the score bottoms out: 100 when the
/// points coincide, 0 at `distance >= scale`.
pub fn accuracy(a: [f32; 2], b: [f32; 2], scale: f32) -> f32 {
    let normalized = (distance(a, b) / scale).clamp(0.0, 1.0);
    round2((1.0 - normalized) * 100.0)
}

fn round2(value: f32) -> f32 {
    (value * 100.0).round() / 100.0
}

/// Direction from `origin` to `target` in degrees, `atan2(dy, dx)`.
pub fn angle_deg(origin: [f32; 2], target: [f32; 2]) -> f32 {
    let dx = target[0] - origin[0];
    let dy = target[1] - origin[1];
    dy.atan2(dx).to_degrees()
}

/// Signed shortest rotation from `prev` to `current`, in (-180, 180].
///
/// Inputs are `atan2` outputs, so a single wrap is enough.
pub fn angle_delta(prev: f32, current: f32) -> f32 {
    let mut diff = current - prev;
    if diff > 180.0 {
        diff -= 360.0;
    }
    if diff <= -180.0 {
        diff += 360.0;
    }
    diff
}

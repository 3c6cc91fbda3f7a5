/// Whether a segment of `candidate` seconds still fits once `current`
/// seconds are on the timeline. Reaching the ceiling exactly is allowed.
pub fn admit(current: f64, candidate: f64, ceiling: f64) -> bool {
    current + candidate <= ceiling
}

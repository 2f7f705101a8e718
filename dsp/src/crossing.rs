/// Phase difference of two sampled periodic signals from their first rising
/// zero crossings.
///
/// A rising crossing is a sample above zero preceded by one at or below
/// zero. The sample offset between the two crossings is converted to degrees
/// assuming the records span exactly one signal period.
///
/// # Args
/// * `a` - First signal.
/// * `b` - Second signal, same length as `a`.
///
/// # Returns
/// Phase of `b` relative to `a` in degrees within `[-180, 180]`, or zero if
/// either signal has no rising crossing.
pub fn zero_crossing_phase<A, B>(a: A, b: B) -> f32
where
    A: IntoIterator<Item = f32>,
    B: IntoIterator<Item = f32>,
{
    let mut crossing: [Option<usize>; 2] = [None; 2];
    let mut previous = [0.0f32; 2];
    let mut len = 0;
    for (i, (x, y)) in a.into_iter().zip(b).enumerate() {
        for (k, v) in [x, y].into_iter().enumerate() {
            if i > 0 && crossing[k].is_none() && v > 0.0 && previous[k] <= 0.0
            {
                crossing[k] = Some(i);
            }
            previous[k] = v;
        }
        len = i + 1;
    }
    let [Some(ca), Some(cb)] = crossing else {
        return 0.0;
    };
    let phase = (cb as f32 - ca as f32) / len as f32 * 360.0;
    if phase > 180.0 {
        phase - 360.0
    } else if phase < -180.0 {
        phase + 360.0
    } else {
        phase
    }
}

use serde::Deserialize;

/// A scalar set point that may change over the course of a simulation.
///
/// Temperatures and pressures are always normalized into a `Variant` before they reach a
/// stepper, so a constant value and a ramp are accepted interchangeably. Anything that
/// converts into `Variant` (a bare `f64`, or a list of `(timestep, value)` points) can be
/// passed where a schedule is expected.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged, from = "RawVariant")]
pub enum Variant {
    /// The same value at every timestep.
    Constant(f64),
    /// Piecewise-linear interpolation between `(timestep, value)` points. Evaluation orders
    /// the points by timestep, whatever order they were built in.
    LinearInterp(Vec<(u64, f64)>),
}

impl Variant {
    pub fn constant(value: f64) -> Self {
        Self::Constant(value)
    }

    /// Builds an interpolated schedule. Points are sorted by timestep; the order they are
    /// given in does not matter.
    pub fn linear_interp(points: impl IntoIterator<Item = (u64, f64)>) -> Self {
        let mut points: Vec<_> = points.into_iter().collect();
        points.sort_by_key(|&(timestep, _)| timestep);
        Self::LinearInterp(points)
    }

    /// Evaluates the schedule at `timestep`.
    ///
    /// Outside the range of an interpolated schedule the value is clamped to the nearest end
    /// point. An interpolated schedule without any points evaluates to `0.0`.
    pub fn value_at(&self, timestep: u64) -> f64 {
        match self {
            Self::Constant(value) => *value,
            Self::LinearInterp(points) => interpolate(points, timestep),
        }
    }

    pub fn is_constant(&self) -> bool {
        matches!(self, Self::Constant(_))
    }
}

fn interpolate(points: &[(u64, f64)], timestep: u64) -> f64 {
    if !points.is_sorted_by_key(|&(t, _)| t) {
        let mut sorted = points.to_vec();
        sorted.sort_by_key(|&(t, _)| t);
        return interpolate(&sorted, timestep);
    }
    let (Some(&(first_t, first_v)), Some(&(last_t, last_v))) = (points.first(), points.last())
    else {
        return 0.0;
    };

    if timestep <= first_t {
        return first_v;
    }
    if timestep >= last_t {
        return last_v;
    }

    // first_t < timestep < last_t, so a bracketing segment always exists.
    let upper = points.partition_point(|&(t, _)| t <= timestep);
    let (t0, v0) = points[upper - 1];
    let (t1, v1) = points[upper];
    let fraction = (timestep - t0) as f64 / (t1 - t0) as f64;
    v0 + fraction * (v1 - v0)
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawVariant {
    Constant(f64),
    Points(Vec<(u64, f64)>),
}

impl From<RawVariant> for Variant {
    fn from(raw: RawVariant) -> Self {
        match raw {
            RawVariant::Constant(value) => Self::Constant(value),
            RawVariant::Points(points) => Self::linear_interp(points),
        }
    }
}

impl From<f64> for Variant {
    fn from(value: f64) -> Self {
        Self::Constant(value)
    }
}

impl From<Vec<(u64, f64)>> for Variant {
    fn from(points: Vec<(u64, f64)>) -> Self {
        Self::linear_interp(points)
    }
}

impl<const N: usize> From<[(u64, f64); N]> for Variant {
    fn from(points: [(u64, f64); N]) -> Self {
        Self::linear_interp(points)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constant_is_the_same_at_every_timestep() {
        let t = Variant::from(1.2);
        assert_eq!(t.value_at(0), 1.2);
        assert_eq!(t.value_at(1_000_000), 1.2);
        assert!(t.is_constant());
    }

    #[test]
    fn linear_interp_interpolates_between_points() {
        let ramp = Variant::from([(0, 4.0), (1000, 1.0)]);
        assert_eq!(ramp.value_at(0), 4.0);
        assert!((ramp.value_at(500) - 2.5).abs() < 1e-12);
        assert_eq!(ramp.value_at(1000), 1.0);
    }

    #[test]
    fn linear_interp_clamps_outside_its_range() {
        let ramp = Variant::linear_interp([(100, 2.0), (200, 3.0)]);
        assert_eq!(ramp.value_at(0), 2.0);
        assert_eq!(ramp.value_at(10_000), 3.0);
    }

    #[test]
    fn linear_interp_sorts_its_points() {
        let ramp = Variant::linear_interp([(200, 3.0), (0, 1.0), (100, 2.0)]);
        assert_eq!(
            ramp,
            Variant::LinearInterp(vec![(0, 1.0), (100, 2.0), (200, 3.0)])
        );
        assert!((ramp.value_at(150) - 2.5).abs() < 1e-12);
    }

    #[test]
    fn directly_built_unsorted_points_still_interpolate_in_timestep_order() {
        let ramp = Variant::LinearInterp(vec![(0, 1.0), (300, 2.0), (100, 3.0), (400, 4.0)]);
        assert_eq!(ramp.value_at(150), 2.75);
        assert_eq!(ramp.value_at(50), 2.0);
        assert_eq!(ramp.value_at(500), 4.0);
    }

    #[test]
    fn empty_schedule_evaluates_to_zero() {
        assert_eq!(Variant::LinearInterp(vec![]).value_at(42), 0.0);
    }

    #[test]
    fn deserializes_from_a_number_or_a_point_list() {
        #[derive(Deserialize)]
        struct Holder {
            t: Variant,
            p: Variant,
        }

        let holder: Holder = toml::from_str("t = 1.5\np = [[1000, 1.0], [0, 4.0]]").unwrap();
        assert_eq!(holder.t, Variant::Constant(1.5));
        assert_eq!(holder.p, Variant::LinearInterp(vec![(0, 4.0), (1000, 1.0)]));
    }
}

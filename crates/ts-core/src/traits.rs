//! Core traits for TorusSpec

/// Parametric model description consumed by the fitting layer.
pub trait Model: Send + Sync {
    /// Number of free parameters
    fn n_parameters(&self) -> usize {
        self.parameter_names().len()
    }

    /// Parameter names
    fn parameter_names(&self) -> Vec<String>;

    /// Parameter bounds (min, max); unbounded parameters use infinities.
    fn parameter_bounds(&self) -> Vec<(f64, f64)>;
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Line;

    impl Model for Line {
        fn parameter_names(&self) -> Vec<String> {
            vec!["slope".into(), "intercept".into()]
        }

        fn parameter_bounds(&self) -> Vec<(f64, f64)> {
            vec![(f64::NEG_INFINITY, f64::INFINITY); 2]
        }
    }

    #[test]
    fn test_default_parameter_count() {
        assert_eq!(Line.n_parameters(), 2);
        assert_eq!(Line.parameter_bounds().len(), Line.n_parameters());
    }
}

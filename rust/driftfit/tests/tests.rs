use driftfit::{
    lowess,
    savitzky_golay,
    FitError,
    InterpolatedCurve,
    Point,
    LOWESS_ROBUSTNESS_ITERATIONS,
};

#[test]
fn test_lowess_then_interpolate_linear_drift() {
    // Test: references with perfect linear drift, projected to an intermediate run order
    let run_order = vec![1.0, 2.0, 3.0, 4.0, 5.0];
    let intensity = vec![2.0, 4.0, 6.0, 8.0, 10.0];
    let fit = lowess(&run_order, &intensity, 1.0, LOWESS_ROBUSTNESS_ITERATIONS).unwrap();
    let curve = InterpolatedCurve::from_xy(&run_order, &fit).unwrap();

    assert!((curve.predict(3.0).unwrap() - 6.0).abs() < 1e-9);
    assert!((curve.predict(2.5).unwrap() - 5.0).abs() < 1e-9);
}

#[test]
fn test_predict_outside_range_extrapolates() {
    let curve = InterpolatedCurve::new(vec![
        Point { x: 0.0, y: 0.0 },
        Point { x: 10.0, y: 20.0 },
    ])
    .unwrap();

    match curve.predict(-5.0) {
        Err(FitError::OutOfBounds(v)) => assert!((v + 10.0).abs() < 1e-9),
        other => panic!("Expected out of bounds, got {:?}", other),
    }
    assert!((curve.predict_extrapolated(15.0) - 30.0).abs() < 1e-9);
}

#[test]
fn test_empty_curve() {
    // Test: Empty input should return error
    let result = InterpolatedCurve::new(vec![]);
    assert_eq!(result.err(), Some(FitError::NoPoints));

    // NaN-only points are dropped before building the curve
    let result = InterpolatedCurve::from_xy(&[1.0, 2.0], &[f64::NAN, f64::NAN]);
    assert_eq!(result.err(), Some(FitError::NoPoints));
}

#[test]
fn test_savgol_then_interpolate_matches_smooth_signal() {
    let x: Vec<f64> = (0..30).map(|i| i as f64 * 2.0).collect();
    let y: Vec<f64> = x.iter().map(|v| 100.0 + 0.01 * v * v).collect();
    let smoothed = savitzky_golay(&y, 11, 3).unwrap();
    let curve = InterpolatedCurve::from_xy(&x, &smoothed).unwrap();

    // Quadratic input survives a third order filter; midpoints interpolate linearly.
    let mid = curve.predict(11.0).unwrap();
    let expected = (100.0 + 0.01 * 100.0 + 100.0 + 0.01 * 144.0) / 2.0;
    assert!((mid - expected).abs() < 1e-6);
}

use crate::FitError;

/// Savitzky-Golay smoothing filter.
///
/// Fits a polynomial of order `polyorder` by least squares to every window of
/// `window` consecutive values and replaces the centre value by the polynomial's
/// value. The first and last `window / 2` values are taken from the polynomial
/// fitted to the first and last full windows respectively.
///
/// The window is shrunk to the largest odd length that fits the data and the
/// polynomial order is capped at `window - 1`, so short inputs degrade towards
/// the identity instead of failing.
///
/// # Example
/// ```
/// use driftfit::savitzky_golay;
///
/// // A cubic is reproduced exactly by a third order filter.
/// let y: Vec<f64> = (0..9).map(|i| (i as f64).powi(3)).collect();
/// let smoothed = savitzky_golay(&y, 5, 3).unwrap();
/// assert!((smoothed[4] - 64.0).abs() < 1e-6);
/// ```
pub fn savitzky_golay(y: &[f64], window: usize, polyorder: usize) -> Result<Vec<f64>, FitError> {
    if y.is_empty() {
        return Err(FitError::NoPoints);
    }
    if window == 0 {
        return Err(FitError::InvalidWindow(window));
    }

    let n = y.len();
    let mut window = window.min(n);
    if window % 2 == 0 {
        window -= 1;
    }
    let polyorder = polyorder.min(window - 1);
    if window == 1 {
        return Ok(y.to_vec());
    }

    let half = window / 2;
    let weights = projection_weights(window, polyorder);

    let out = (0..n)
        .map(|i| {
            let (start, eval_pos) = if i < half {
                (0, i)
            } else if i + half >= n {
                (n - window, i - (n - window))
            } else {
                (i - half, half)
            };
            weights[eval_pos]
                .iter()
                .zip(&y[start..start + window])
                .map(|(w, v)| w * v)
                .sum()
        })
        .collect();

    Ok(out)
}

/// Rows of the least-squares hat matrix `A (AᵀA)⁻¹ Aᵀ` for a polynomial basis
/// over a window. Row `e` holds the weights that evaluate the fitted polynomial
/// at window position `e`.
fn projection_weights(window: usize, polyorder: usize) -> Vec<Vec<f64>> {
    let half = (window / 2) as f64;
    let ncoef = polyorder + 1;

    // Positions scaled to [-1, 1] for conditioning.
    let basis: Vec<Vec<f64>> = (0..window)
        .map(|j| {
            let t = (j as f64 - half) / half;
            (0..ncoef).map(|k| t.powi(k as i32)).collect()
        })
        .collect();

    let mut normal = vec![vec![0.0; ncoef]; ncoef];
    for row in basis.iter() {
        for a in 0..ncoef {
            for b in 0..ncoef {
                normal[a][b] += row[a] * row[b];
            }
        }
    }
    let inverse = invert(normal);

    // B = (AᵀA)⁻¹ Aᵀ, (ncoef x window)
    let mut b_mat = vec![vec![0.0; window]; ncoef];
    for a in 0..ncoef {
        for j in 0..window {
            b_mat[a][j] = (0..ncoef).map(|c| inverse[a][c] * basis[j][c]).sum();
        }
    }

    (0..window)
        .map(|e| {
            (0..window)
                .map(|j| (0..ncoef).map(|a| basis[e][a] * b_mat[a][j]).sum())
                .collect()
        })
        .collect()
}

/// Gauss-Jordan inversion with partial pivoting of a small symmetric positive
/// definite matrix.
fn invert(mut m: Vec<Vec<f64>>) -> Vec<Vec<f64>> {
    let n = m.len();
    let mut inv: Vec<Vec<f64>> = (0..n)
        .map(|i| (0..n).map(|j| if i == j { 1.0 } else { 0.0 }).collect())
        .collect();

    for col in 0..n {
        let pivot = (col..n)
            .max_by(|&a, &b| m[a][col].abs().total_cmp(&m[b][col].abs()))
            .unwrap_or(col);
        m.swap(col, pivot);
        inv.swap(col, pivot);

        let p = m[col][col];
        for j in 0..n {
            m[col][j] /= p;
            inv[col][j] /= p;
        }
        for row in 0..n {
            if row != col {
                let factor = m[row][col];
                if factor != 0.0 {
                    for j in 0..n {
                        m[row][j] -= factor * m[col][j];
                        inv[row][j] -= factor * inv[col][j];
                    }
                }
            }
        }
    }
    inv
}

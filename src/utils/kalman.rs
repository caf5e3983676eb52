use nalgebra::{SMatrix, SVector};

/// Kalman filter for a 3D point with the Singer (decaying acceleration) motion model
pub mod kalman_3d_singer;

macro_rules! pretty_print {
    ($arr:expr) => {{
        let indent = 4;
        let prefix = " ".repeat(indent);
        let mut result_els = vec!["".to_string()];
        for i in 0..$arr.nrows() {
            let mut row_els = vec![];
            for j in 0..$arr.ncols() {
                row_els.push(format!("{:12.3}", $arr[(i, j)]));
            }
            let row_str = row_els.into_iter().collect::<Vec<_>>().join(" ");
            let row_str = format!("{}{}", prefix, row_str);
            result_els.push(row_str);
        }
        result_els.into_iter().collect::<Vec<_>>().join("\n")
    }};
}

/// Kalman state: mean and covariance
///
#[derive(Copy, Clone, Debug)]
pub struct KalmanState<const X: usize> {
    pub(crate) mean: SVector<f32, X>,
    pub(crate) covariance: SMatrix<f32, X, X>,
}

impl<const X: usize> KalmanState<X> {
    pub fn mean(&self) -> &SVector<f32, X> {
        &self.mean
    }

    pub fn covariance(&self) -> &SMatrix<f32, X, X> {
        &self.covariance
    }

    /// Writes the state to the `trace` log
    ///
    pub fn dump(&self) {
        log::trace!("Mean={}", pretty_print!(self.mean.transpose()));
        log::trace!("Covariance={}", pretty_print!(self.covariance));
    }
}

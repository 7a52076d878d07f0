/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

/// Controls how aggressively we scale up after being throttled
pub(crate) const SCALE_CONSTANT: f64 = 0.4;
/// How much to scale back after receiving a throttling response
pub(crate) const BETA: f64 = 0.7;

/// A snapshot of the cubic curve's parameters.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CubicParams {
    /// The rate measured at the last throttle.
    pub w_max: f64,
    /// The time window the curve takes to climb back to `w_max`.
    pub k: f64,
    /// The time of the last throttle, in seconds since the Unix epoch.
    pub last_fail: f64,
}

/// Computes send rates along a cubic curve anchored at the last throttle.
#[derive(Clone, Debug)]
pub struct CubicCalculator {
    w_max: f64,
    last_fail: f64,
    scale_constant: f64,
    beta: f64,
    k: f64,
}

impl CubicCalculator {
    /// Creates a calculator as if the client had been throttled at `start_time` while
    /// sending at `starting_max_rate`.
    pub fn new(starting_max_rate: f64, start_time: f64) -> Self {
        Self::with_constants(starting_max_rate, start_time, SCALE_CONSTANT, BETA)
    }

    /// Like [`CubicCalculator::new`] with explicit curve constants.
    pub fn with_constants(
        starting_max_rate: f64,
        start_time: f64,
        scale_constant: f64,
        beta: f64,
    ) -> Self {
        let mut calculator = Self {
            w_max: starting_max_rate,
            last_fail: start_time,
            scale_constant,
            beta,
            k: 0.0,
        };
        calculator.k = calculator.calculate_time_window();
        calculator
    }

    fn calculate_time_window(&self) -> f64 {
        let base = (self.w_max * (1.0 - self.beta)) / self.scale_constant;
        base.cbrt()
    }

    /// The rate allowed at `timestamp` after a successful response.
    pub fn success_received(&self, timestamp: f64) -> f64 {
        let dt = timestamp - self.last_fail - self.k;
        self.scale_constant * dt.powi(3) + self.w_max
    }

    /// Records a throttle at `timestamp` while sending at `current_rate` and returns the
    /// reduced rate.
    pub fn error_received(&mut self, current_rate: f64, timestamp: f64) -> f64 {
        self.w_max = current_rate;
        self.k = self.calculate_time_window();
        self.last_fail = timestamp;
        current_rate * self.beta
    }

    /// The current curve parameters.
    pub fn params(&self) -> CubicParams {
        CubicParams {
            w_max: self.w_max,
            k: self.k,
            last_fail: self.last_fail,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn throttle_scales_back_by_beta() {
        let mut cubic = CubicCalculator::new(10.0, 0.0);
        let rate = cubic.error_received(10.0, 1.0);
        assert_relative_eq!(rate, 7.0);
        let params = cubic.params();
        assert_relative_eq!(params.w_max, 10.0);
        assert_relative_eq!(params.last_fail, 1.0);
        assert_relative_eq!(params.k, (10.0_f64 * 0.3 / 0.4).cbrt());
    }

    #[test]
    fn success_climbs_back_to_the_saturation_point() {
        let mut cubic = CubicCalculator::new(10.0, 0.0);
        cubic.error_received(10.0, 5.0);
        let k = cubic.params().k;
        // Right after the throttle the curve starts at beta * w_max.
        assert_relative_eq!(cubic.success_received(5.0), 7.0, epsilon = 1e-9);
        // After K seconds it is back at w_max.
        assert_relative_eq!(cubic.success_received(5.0 + k), 10.0, epsilon = 1e-9);
        // And then keeps growing.
        assert!(cubic.success_received(5.0 + k + 1.0) > 10.0);
    }

    #[test]
    fn zero_starting_rate() {
        let cubic = CubicCalculator::new(0.0, 0.0);
        assert_relative_eq!(cubic.params().k, 0.0);
        assert_relative_eq!(cubic.success_received(1.0), 0.4);
    }
}

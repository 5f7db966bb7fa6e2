/// Gaussian bell mapping a convolution value to a growth rate in `(0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GrowthFunction {
    center: f32,
    sigma: f32,
    steepness: f32,
}

impl GrowthFunction {
    #[must_use]
    pub const fn new(center: f32, sigma: f32, steepness: f32) -> Self {
        Self {
            center,
            sigma,
            steepness,
        }
    }

    #[must_use]
    pub const fn center(&self) -> f32 {
        self.center
    }

    /// `exp(-steepness * (x - center)^2 / (2 * sigma^2))`.
    ///
    /// Underflow is floored at the smallest positive `f32` so the result
    /// never reaches zero.
    #[inline]
    #[must_use]
    pub fn eval(&self, x: f32) -> f32 {
        let d = x - self.center;
        let exponent = -(self.steepness * d * d) / (2.0 * self.sigma * self.sigma);
        exponent.exp().max(f32::MIN_POSITIVE)
    }
}

#[inline]
#[must_use]
pub fn clamp01(value: f32) -> f32 {
    value.clamp(0.0, 1.0)
}

/// One explicit Euler step of `v' = 2 * growth - 1`, clamped to `[0, 1]`.
#[inline]
#[must_use]
pub fn integrate(current: f32, growth: f32, delta_t: f32) -> f32 {
    clamp01(current + delta_t * (2.0 * growth - 1.0))
}

//! Scalar operations attached to computed nodes.
//!
//! Each [`Operation`] knows how to evaluate itself from operand values and how
//! to produce the local partial derivative with respect to each operand at
//! those same values. Operations carry no references to nodes.

use crate::error::OperationError;

/// Which side of a binary operation a constant occupies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConstantSide {
    /// `c op x`
    Left,
    /// `x op c`
    #[default]
    Right,
}

/// Number of operands an operation accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    /// Exactly this many operands.
    Exactly(usize),
    /// At least this many operands.
    AtLeast(usize),
}

impl Arity {
    /// Whether `count` operands are acceptable.
    pub fn accepts(self, count: usize) -> bool {
        match self {
            Arity::Exactly(n) => count == n,
            Arity::AtLeast(n) => count >= n,
        }
    }

    fn describe(self) -> &'static str {
        match self {
            Arity::Exactly(1) => "exactly 1",
            Arity::Exactly(2) => "exactly 2",
            Arity::AtLeast(1) => "at least 1",
            Arity::Exactly(_) | Arity::AtLeast(_) => "a different number of",
        }
    }
}

/// A mathematical transform of one or more scalar operands.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Operation {
    /// Pass the single operand through unchanged.
    Inherit,
    /// `constant + Σ xᵢ`
    Add { constant: f64 },
    /// `x₀ - x₁`
    Subtract,
    /// `x₀ - c` or `c - x₀`
    SubtractConstant { constant: f64, side: ConstantSide },
    /// `constant · Π xᵢ`
    Multiply { constant: f64 },
    /// `x₀ / x₁`
    Divide,
    /// `x₀ / c` or `c / x₀`
    DivideConstant { constant: f64, side: ConstantSide },
    /// Natural logarithm when `base` is `None`, otherwise `log_base`.
    Log { base: Option<f64> },
    /// `e^x₀`
    Exp,
    /// `x₀ ^ x₁`
    Power,
    /// `x₀ ^ exponent`
    PowerConstant { exponent: f64 },
    /// `base ^ x₀`
    ExpConstantBase { base: f64 },
    /// `√x₀`
    Sqrt,
    /// `sin x₀`
    Sin,
    /// `cos x₀`
    Cos,
}

impl Operation {
    /// `c + x₀ + x₁ + ...`
    pub fn add(constant: f64) -> Self {
        Operation::Add { constant }
    }

    /// `x - c` (side `Right`) or `c - x` (side `Left`).
    pub fn subtract_constant(constant: f64, side: ConstantSide) -> Self {
        Operation::SubtractConstant { constant, side }
    }

    /// `c · x₀ · x₁ · ...`
    pub fn multiply(constant: f64) -> Self {
        Operation::Multiply { constant }
    }

    /// `x / c` (side `Right`) or `c / x` (side `Left`).
    ///
    /// Fails with [`OperationError::DivisionByZero`] when the constant is the
    /// denominator and equals zero.
    pub fn divide_constant(constant: f64, side: ConstantSide) -> Result<Self, OperationError> {
        if side == ConstantSide::Right && constant == 0.0 {
            return Err(OperationError::DivisionByZero);
        }
        Ok(Operation::DivideConstant { constant, side })
    }

    /// Natural logarithm.
    pub fn ln() -> Self {
        Operation::Log { base: None }
    }

    /// Logarithm in the given base.
    pub fn log(base: f64) -> Result<Self, OperationError> {
        if base.is_nan() || base <= 0.0 || base == 1.0 {
            return Err(OperationError::InvalidLogBase { base });
        }
        Ok(Operation::Log { base: Some(base) })
    }

    /// `x ^ exponent`
    pub fn power_constant(exponent: f64) -> Self {
        Operation::PowerConstant { exponent }
    }

    /// `base ^ x`; the base must be positive.
    pub fn exp_constant_base(base: f64) -> Result<Self, OperationError> {
        if base.is_nan() || base <= 0.0 {
            return Err(OperationError::InvalidPowerBase { base });
        }
        Ok(Operation::ExpConstantBase { base })
    }

    /// Short name used in diagnostics.
    pub fn name(&self) -> &'static str {
        match self {
            Operation::Inherit => "Inherit",
            Operation::Add { .. } => "Add",
            Operation::Subtract | Operation::SubtractConstant { .. } => "Subtract",
            Operation::Multiply { .. } => "Multiply",
            Operation::Divide | Operation::DivideConstant { .. } => "Divide",
            Operation::Log { .. } => "Log",
            Operation::Exp => "Exp",
            Operation::Power | Operation::PowerConstant { .. } => "Power",
            Operation::ExpConstantBase { .. } => "ExpConstantBase",
            Operation::Sqrt => "Sqrt",
            Operation::Sin => "Sin",
            Operation::Cos => "Cos",
        }
    }

    /// Number of operands this operation accepts.
    pub fn arity(&self) -> Arity {
        match self {
            Operation::Add { .. } | Operation::Multiply { .. } => Arity::AtLeast(1),
            Operation::Subtract | Operation::Divide | Operation::Power => Arity::Exactly(2),
            _ => Arity::Exactly(1),
        }
    }

    /// Check an operand count against [`arity`](Self::arity).
    pub fn check_operands(&self, count: usize) -> Result<(), OperationError> {
        let arity = self.arity();
        if arity.accepts(count) {
            Ok(())
        } else {
            Err(OperationError::OperandCount {
                operation: self.name(),
                expected: arity.describe(),
                actual: count,
            })
        }
    }

    /// Evaluate the operation at the given operand values.
    pub fn evaluate(&self, x: &[f64]) -> Result<f64, OperationError> {
        self.check_operands(x.len())?;
        let value = match *self {
            Operation::Inherit => x[0],
            Operation::Add { constant } => constant + x.iter().sum::<f64>(),
            Operation::Subtract => x[0] - x[1],
            Operation::SubtractConstant { constant, side } => match side {
                ConstantSide::Left => constant - x[0],
                ConstantSide::Right => x[0] - constant,
            },
            Operation::Multiply { constant } => constant * x.iter().product::<f64>(),
            Operation::Divide => {
                if x[1] == 0.0 {
                    return Err(OperationError::DivisionByZero);
                }
                x[0] / x[1]
            }
            Operation::DivideConstant { constant, side } => match side {
                ConstantSide::Left => {
                    if x[0] == 0.0 {
                        return Err(OperationError::DivisionByZero);
                    }
                    constant / x[0]
                }
                ConstantSide::Right => x[0] / constant,
            },
            Operation::Log { base } => {
                if x[0] <= 0.0 {
                    return Err(OperationError::LogOfNonPositive { value: x[0] });
                }
                match base {
                    None => x[0].ln(),
                    Some(b) => x[0].ln() / b.ln(),
                }
            }
            Operation::Exp => x[0].exp(),
            Operation::Power => x[0].powf(x[1]),
            Operation::PowerConstant { exponent } => x[0].powf(exponent),
            Operation::ExpConstantBase { base } => base.powf(x[0]),
            Operation::Sqrt => {
                if x[0] < 0.0 {
                    return Err(OperationError::SqrtOfNegative { value: x[0] });
                }
                x[0].sqrt()
            }
            Operation::Sin => x[0].sin(),
            Operation::Cos => x[0].cos(),
        };
        Ok(value)
    }

    /// Partial derivatives with respect to each operand, in operand order.
    pub fn differentiate(&self, x: &[f64]) -> Result<Vec<f64>, OperationError> {
        self.check_operands(x.len())?;
        let partials = match *self {
            Operation::Inherit => vec![1.0],
            Operation::Add { .. } => vec![1.0; x.len()],
            Operation::Subtract => vec![1.0, -1.0],
            Operation::SubtractConstant { side, .. } => match side {
                ConstantSide::Left => vec![-1.0],
                ConstantSide::Right => vec![1.0],
            },
            Operation::Multiply { constant } => (0..x.len())
                .map(|i| {
                    x.iter()
                        .enumerate()
                        .filter(|&(j, _)| j != i)
                        .fold(constant, |acc, (_, &xj)| acc * xj)
                })
                .collect(),
            Operation::Divide => {
                if x[1] == 0.0 {
                    return Err(OperationError::DivisionByZero);
                }
                vec![1.0 / x[1], -x[0] / (x[1] * x[1])]
            }
            Operation::DivideConstant { constant, side } => match side {
                ConstantSide::Left => {
                    if x[0] == 0.0 {
                        return Err(OperationError::DivisionByZero);
                    }
                    vec![-constant / (x[0] * x[0])]
                }
                ConstantSide::Right => vec![1.0 / constant],
            },
            Operation::Log { base } => {
                if x[0] <= 0.0 {
                    return Err(OperationError::LogOfNonPositive { value: x[0] });
                }
                match base {
                    None => vec![1.0 / x[0]],
                    Some(b) => vec![1.0 / (b.ln() * x[0])],
                }
            }
            Operation::Exp => vec![x[0].exp()],
            Operation::Power => {
                if x[0] <= 0.0 {
                    return Err(OperationError::PowerOfNonPositive { value: x[0] });
                }
                let value = x[0].powf(x[1]);
                vec![x[1] * x[0].powf(x[1] - 1.0), x[0].ln() * value]
            }
            Operation::PowerConstant { exponent } => vec![exponent * x[0].powf(exponent - 1.0)],
            Operation::ExpConstantBase { base } => vec![base.ln() * base.powf(x[0])],
            Operation::Sqrt => {
                if x[0] < 0.0 {
                    return Err(OperationError::SqrtOfNegative { value: x[0] });
                }
                if x[0] == 0.0 {
                    return Err(OperationError::NotDifferentiable {
                        operation: self.name(),
                        value: x[0],
                    });
                }
                vec![0.5 / x[0].sqrt()]
            }
            Operation::Sin => vec![x[0].cos()],
            Operation::Cos => vec![-x[0].sin()],
        };
        Ok(partials)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_inherit() {
        let op = Operation::Inherit;
        assert_eq!(op.evaluate(&[3.5]).unwrap(), 3.5);
        assert_eq!(op.differentiate(&[3.5]).unwrap(), vec![1.0]);
        assert!(matches!(
            op.evaluate(&[1.0, 2.0]),
            Err(OperationError::OperandCount { actual: 2, .. })
        ));
    }

    #[test]
    fn test_add_n_operands() {
        let op = Operation::add(4.0);
        assert_eq!(op.evaluate(&[1.0, 2.0, 3.0]).unwrap(), 10.0);
        assert_eq!(op.differentiate(&[1.0, 2.0, 3.0]).unwrap(), vec![1.0; 3]);
        assert!(op.evaluate(&[]).is_err());
    }

    #[test]
    fn test_subtract_variants() {
        assert_eq!(Operation::Subtract.evaluate(&[5.0, 2.0]).unwrap(), 3.0);
        assert_eq!(
            Operation::Subtract.differentiate(&[5.0, 2.0]).unwrap(),
            vec![1.0, -1.0]
        );

        let right = Operation::subtract_constant(2.0, ConstantSide::Right);
        assert_eq!(right.evaluate(&[5.0]).unwrap(), 3.0);
        assert_eq!(right.differentiate(&[5.0]).unwrap(), vec![1.0]);

        let left = Operation::subtract_constant(2.0, ConstantSide::Left);
        assert_eq!(left.evaluate(&[5.0]).unwrap(), -3.0);
        assert_eq!(left.differentiate(&[5.0]).unwrap(), vec![-1.0]);

        assert!(Operation::Subtract.evaluate(&[1.0]).is_err());
        assert!(left.evaluate(&[1.0, 2.0]).is_err());
    }

    #[test]
    fn test_multiply_partials() {
        let op = Operation::multiply(2.0);
        assert_eq!(op.evaluate(&[2.0, 3.0, 4.0]).unwrap(), 48.0);
        assert_eq!(
            op.differentiate(&[2.0, 3.0, 4.0]).unwrap(),
            vec![24.0, 16.0, 12.0]
        );
        // A zero operand only zeroes the other partials.
        assert_eq!(
            op.differentiate(&[0.0, 3.0]).unwrap(),
            vec![6.0, 0.0]
        );
    }

    #[test]
    fn test_divide() {
        let op = Operation::Divide;
        assert_eq!(op.evaluate(&[6.0, 3.0]).unwrap(), 2.0);
        let d = op.differentiate(&[6.0, 3.0]).unwrap();
        assert_relative_eq!(d[0], 1.0 / 3.0);
        assert_relative_eq!(d[1], -6.0 / 9.0);
        assert_eq!(
            op.evaluate(&[1.0, 0.0]),
            Err(OperationError::DivisionByZero)
        );
        assert_eq!(
            op.differentiate(&[1.0, 0.0]),
            Err(OperationError::DivisionByZero)
        );
    }

    #[test]
    fn test_divide_constant() {
        assert_eq!(
            Operation::divide_constant(0.0, ConstantSide::Right),
            Err(OperationError::DivisionByZero)
        );
        // A zero numerator constant is fine.
        assert!(Operation::divide_constant(0.0, ConstantSide::Left).is_ok());

        let right = Operation::divide_constant(4.0, ConstantSide::Right).unwrap();
        assert_eq!(right.evaluate(&[2.0]).unwrap(), 0.5);
        assert_eq!(right.differentiate(&[2.0]).unwrap(), vec![0.25]);

        let left = Operation::divide_constant(4.0, ConstantSide::Left).unwrap();
        assert_eq!(left.evaluate(&[2.0]).unwrap(), 2.0);
        assert_eq!(left.differentiate(&[2.0]).unwrap(), vec![-1.0]);
        assert_eq!(left.evaluate(&[0.0]), Err(OperationError::DivisionByZero));
    }

    #[test]
    fn test_log() {
        let ln = Operation::ln();
        assert_relative_eq!(ln.evaluate(&[std::f64::consts::E]).unwrap(), 1.0);
        assert_relative_eq!(ln.differentiate(&[4.0]).unwrap()[0], 0.25);

        let log2 = Operation::log(2.0).unwrap();
        assert_relative_eq!(log2.evaluate(&[8.0]).unwrap(), 3.0, epsilon = 1e-12);
        assert_relative_eq!(
            log2.differentiate(&[8.0]).unwrap()[0],
            1.0 / (8.0 * 2f64.ln())
        );

        assert!(matches!(
            ln.evaluate(&[0.0]),
            Err(OperationError::LogOfNonPositive { .. })
        ));
        assert!(matches!(
            ln.differentiate(&[-1.0]),
            Err(OperationError::LogOfNonPositive { .. })
        ));
    }

    #[test]
    fn test_log_invalid_base() {
        for base in [0.0, -2.0, 1.0, f64::NAN] {
            assert!(matches!(
                Operation::log(base),
                Err(OperationError::InvalidLogBase { .. })
            ));
        }
    }

    #[test]
    fn test_exp() {
        let op = Operation::Exp;
        assert_relative_eq!(op.evaluate(&[1.0]).unwrap(), std::f64::consts::E);
        assert_relative_eq!(op.differentiate(&[2.0]).unwrap()[0], 2f64.exp());
    }

    #[test]
    fn test_power_variants() {
        let op = Operation::Power;
        assert_relative_eq!(op.evaluate(&[2.0, 3.0]).unwrap(), 8.0);
        let d = op.differentiate(&[2.0, 3.0]).unwrap();
        assert_relative_eq!(d[0], 12.0);
        assert_relative_eq!(d[1], 8.0 * 2f64.ln());
        assert!(matches!(
            op.differentiate(&[-2.0, 2.0]),
            Err(OperationError::PowerOfNonPositive { .. })
        ));

        let cube = Operation::power_constant(3.0);
        assert_relative_eq!(cube.evaluate(&[2.0]).unwrap(), 8.0);
        assert_relative_eq!(cube.differentiate(&[2.0]).unwrap()[0], 12.0);

        let two_to = Operation::exp_constant_base(2.0).unwrap();
        assert_relative_eq!(two_to.evaluate(&[3.0]).unwrap(), 8.0);
        assert_relative_eq!(two_to.differentiate(&[3.0]).unwrap()[0], 8.0 * 2f64.ln());
        assert!(Operation::exp_constant_base(0.0).is_err());
    }

    #[test]
    fn test_sqrt_and_trig() {
        assert_relative_eq!(Operation::Sqrt.evaluate(&[9.0]).unwrap(), 3.0);
        assert_relative_eq!(Operation::Sqrt.differentiate(&[9.0]).unwrap()[0], 1.0 / 6.0);
        assert!(Operation::Sqrt.evaluate(&[-1.0]).is_err());
        assert_eq!(
            Operation::Sqrt.differentiate(&[0.0]),
            Err(OperationError::NotDifferentiable {
                operation: "Sqrt",
                value: 0.0
            })
        );
        assert!(matches!(
            Operation::Sqrt.differentiate(&[-4.0]),
            Err(OperationError::SqrtOfNegative { .. })
        ));

        let x = 0.7;
        assert_relative_eq!(Operation::Sin.evaluate(&[x]).unwrap(), x.sin());
        assert_relative_eq!(Operation::Sin.differentiate(&[x]).unwrap()[0], x.cos());
        assert_relative_eq!(Operation::Cos.evaluate(&[x]).unwrap(), x.cos());
        assert_relative_eq!(Operation::Cos.differentiate(&[x]).unwrap()[0], -x.sin());
    }

    #[test]
    fn test_arity() {
        assert_eq!(Operation::Exp.arity(), Arity::Exactly(1));
        assert_eq!(Operation::Divide.arity(), Arity::Exactly(2));
        assert_eq!(Operation::add(0.0).arity(), Arity::AtLeast(1));
        assert!(Arity::AtLeast(1).accepts(5));
        assert!(!Arity::Exactly(2).accepts(1));

        let err = Operation::Exp.check_operands(2).unwrap_err();
        assert_eq!(err.to_string(), "Exp expects exactly 1 operand(s), got 2");
    }
}

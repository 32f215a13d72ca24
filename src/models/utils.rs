use microlp::{Solution, Variable};

pub trait AddVars {
    type Out;

    /// Create a variable with a closure
    fn vars_with<F: FnMut(Self) -> Variable>(&self, func: F) -> Self::Out
    where
        Self: Sized;
}

impl AddVars for usize {
    type Out = Vec<Variable>;

    fn vars_with<F: FnMut(Self) -> Variable>(&self, mut func: F) -> Self::Out
    where
        Self: Sized,
    {
        let mut vec = Vec::with_capacity(*self);
        for i in 0..*self {
            vec.push(func(i));
        }

        vec
    }
}

/// Trait that converts solver variables to f64
pub trait ConvertVars {
    type Out;
    fn convert(&self, solution: &Solution) -> Self::Out;
}

impl<T: ConvertVars> ConvertVars for Vec<T> {
    type Out = Vec<T::Out>;

    fn convert(&self, solution: &Solution) -> Self::Out {
        self.iter().map(|e| e.convert(solution)).collect()
    }
}

impl ConvertVars for Variable {
    type Out = f64;

    fn convert(&self, solution: &Solution) -> Self::Out {
        solution[*self]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use microlp::{ComparisonOp, OptimizationDirection, Problem};

    #[test]
    fn converts_solution_values() {
        let mut problem = Problem::new(OptimizationDirection::Minimize);
        let x = 2usize.vars_with(|i| problem.add_var(1.0 + i as f64, (0.0, f64::INFINITY)));
        problem.add_constraint(&[(x[0], 1.0), (x[1], 1.0)], ComparisonOp::Ge, 4.0);

        let solution = problem.solve().unwrap();
        let values = x.convert(&solution);
        assert!((values[0] - 4.0).abs() < 1e-9);
        assert!(values[1].abs() < 1e-9);
    }
}

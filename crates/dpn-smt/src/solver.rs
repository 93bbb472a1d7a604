use crate::sorts::SmtSort;
use crate::terms::SmtTerm;

/// Result of a satisfiability check.
#[derive(Debug, Clone, PartialEq)]
pub enum SatResult {
    Sat,
    Unsat,
    Unknown(String),
}

/// Abstract SMT solver interface.
pub trait SmtSolver {
    type Error: std::error::Error;

    /// Declare a new variable.
    fn declare_var(&mut self, name: &str, sort: &SmtSort) -> Result<(), Self::Error>;

    /// Assert a constraint.
    fn assert(&mut self, term: &SmtTerm) -> Result<(), Self::Error>;

    /// Push a new scope.
    fn push(&mut self) -> Result<(), Self::Error>;

    /// Pop a scope.
    fn pop(&mut self) -> Result<(), Self::Error>;

    /// Check satisfiability.
    fn check_sat(&mut self) -> Result<SatResult, Self::Error>;

    /// Reset the solver state, forgetting declarations.
    fn reset(&mut self) -> Result<(), Self::Error>;

    /// Checks `term` in a fresh scope and leaves the assertion stack as it
    /// was.
    fn check_scoped(&mut self, term: &SmtTerm) -> Result<SatResult, Self::Error> {
        self.push()?;
        let result = self.assert(term).and_then(|_| self.check_sat());
        self.pop()?;
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    struct MockSolver {
        sat_result: SatResult,
        depth: usize,
        asserted: Vec<SmtTerm>,
        check_sat_calls: usize,
    }

    impl MockSolver {
        fn new(sat_result: SatResult) -> Self {
            Self {
                sat_result,
                depth: 0,
                asserted: Vec::new(),
                check_sat_calls: 0,
            }
        }
    }

    impl SmtSolver for MockSolver {
        type Error = io::Error;

        fn declare_var(&mut self, _name: &str, _sort: &SmtSort) -> Result<(), Self::Error> {
            Ok(())
        }

        fn assert(&mut self, term: &SmtTerm) -> Result<(), Self::Error> {
            if matches!(term, SmtTerm::Var(name) if name == "broken") {
                return Err(io::Error::other("cannot assert"));
            }
            self.asserted.push(term.clone());
            Ok(())
        }

        fn push(&mut self) -> Result<(), Self::Error> {
            self.depth += 1;
            Ok(())
        }

        fn pop(&mut self) -> Result<(), Self::Error> {
            self.depth -= 1;
            Ok(())
        }

        fn check_sat(&mut self) -> Result<SatResult, Self::Error> {
            self.check_sat_calls += 1;
            Ok(self.sat_result.clone())
        }

        fn reset(&mut self) -> Result<(), Self::Error> {
            self.asserted.clear();
            Ok(())
        }
    }

    #[test]
    fn scoped_check_restores_depth() {
        let mut solver = MockSolver::new(SatResult::Unsat);
        let result = solver.check_scoped(&SmtTerm::bool(true)).unwrap();
        assert_eq!(result, SatResult::Unsat);
        assert_eq!(solver.depth, 0);
        assert_eq!(solver.check_sat_calls, 1);
        assert_eq!(solver.asserted.len(), 1);
    }

    #[test]
    fn scoped_check_pops_even_when_assert_fails() {
        let mut solver = MockSolver::new(SatResult::Sat);
        let result = solver.check_scoped(&SmtTerm::var("broken"));
        assert!(result.is_err());
        assert_eq!(solver.depth, 0);
        assert_eq!(solver.check_sat_calls, 0);
    }

    #[test]
    fn unknown_result_carries_reason() {
        let mut solver = MockSolver::new(SatResult::Unknown("timeout".into()));
        let result = solver.check_scoped(&SmtTerm::bool(true)).unwrap();
        assert_eq!(result, SatResult::Unknown("timeout".into()));
        solver.reset().unwrap();
        assert!(solver.asserted.is_empty());
    }
}

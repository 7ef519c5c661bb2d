use anyhow::Error;

/// Result of a collaborator call, carrying the recovery policy with it.
///
/// Collaborator-facing functions return this instead of a bare `Result` so
/// each caller applies a uniform policy: `Success` is used as-is, `Degraded`
/// carries a documented default the collaborator could not improve on, and
/// `Failed` is the only variant a caller may escalate.
#[derive(Debug)]
pub enum Outcome<T> {
    Success(T),
    Degraded { value: T, reason: String },
    Failed(Error),
}

impl<T> Outcome<T> {
    pub fn degraded(value: T, reason: impl Into<String>) -> Self {
        Outcome::Degraded {
            value,
            reason: reason.into(),
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, Outcome::Degraded { .. })
    }

    /// Converts into a `Result`, keeping degraded values as successes.
    pub fn into_result(self) -> Result<T, Error> {
        match self {
            Outcome::Success(value) => Ok(value),
            Outcome::Degraded { value, .. } => Ok(value),
            Outcome::Failed(err) => Err(err),
        }
    }

    /// Fail-open recovery: a hard failure collapses to the supplied default.
    pub fn recover_with(self, default: T) -> T {
        match self {
            Outcome::Success(value) => value,
            Outcome::Degraded { value, .. } => value,
            Outcome::Failed(_) => default,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Outcome<U> {
        match self {
            Outcome::Success(value) => Outcome::Success(f(value)),
            Outcome::Degraded { value, reason } => Outcome::Degraded {
                value: f(value),
                reason,
            },
            Outcome::Failed(err) => Outcome::Failed(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;

    #[test]
    fn into_result_keeps_degraded_values() {
        let outcome: Outcome<i32> = Outcome::degraded(7, "collaborator timeout");
        assert_eq!(outcome.into_result().unwrap(), 7);
    }

    #[test]
    fn recover_with_collapses_failures() {
        let outcome: Outcome<Vec<String>> = Outcome::Failed(anyhow!("quota exhausted"));
        assert!(outcome.recover_with(Vec::new()).is_empty());
    }

    #[test]
    fn map_preserves_variant() {
        let outcome = Outcome::degraded(2, "partial").map(|v| v * 10);
        assert!(outcome.is_degraded());
        assert_eq!(outcome.into_result().unwrap(), 20);
    }
}

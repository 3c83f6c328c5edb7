use std::collections::{HashMap, HashSet};
use std::fmt;
use std::future::Future;
use std::pin::Pin;

use crate::error::HarnessError;

pub type StepFuture<'a> = Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + 'a>>;

/// A step is a plain function over the suite context
pub type StepFn<Ctx> = for<'a> fn(&'a mut Ctx) -> StepFuture<'a>;

struct Step<Ctx> {
    name: &'static str,
    requires: Vec<&'static str>,
    run: StepFn<Ctx>,
    finalizer: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StepOutcome {
    Passed,
    Failed(String),
    Skipped { blocked_by: String },
}

impl StepOutcome {
    pub fn is_passed(&self) -> bool {
        matches!(self, StepOutcome::Passed)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SuiteReport {
    pub suite: String,
    /// In execution order
    pub outcomes: Vec<(String, StepOutcome)>,
}

impl SuiteReport {
    pub fn outcome(&self, step: &str) -> Option<&StepOutcome> {
        self.outcomes
            .iter()
            .find(|(name, _)| name == step)
            .map(|(_, outcome)| outcome)
    }

    pub fn failures(&self) -> Vec<(&str, &str)> {
        self.outcomes
            .iter()
            .filter_map(|(name, outcome)| match outcome {
                StepOutcome::Failed(message) => Some((name.as_str(), message.as_str())),
                _ => None,
            })
            .collect()
    }

    pub fn passed_count(&self) -> usize {
        self.outcomes.iter().filter(|(_, o)| o.is_passed()).count()
    }

    /// Every step passed; a skipped step counts against the suite
    pub fn is_success(&self) -> bool {
        self.outcomes.iter().all(|(_, o)| o.is_passed())
    }
}

impl fmt::Display for SuiteReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{}: {}/{} steps passed",
            self.suite,
            self.passed_count(),
            self.outcomes.len()
        )?;
        for (name, outcome) in &self.outcomes {
            match outcome {
                StepOutcome::Passed => writeln!(f, "  ok    {}", name)?,
                StepOutcome::Failed(message) => writeln!(f, "  FAIL  {}: {}", name, message)?,
                StepOutcome::Skipped { blocked_by } => {
                    writeln!(f, "  skip  {} (blocked by {})", name, blocked_by)?
                }
            }
        }
        Ok(())
    }
}

/// Named steps with prerequisites, run in dependency order over one context.
///
/// Finalizers run after every regular step whatever the outcome upstream.
pub struct Suite<Ctx> {
    name: String,
    steps: Vec<Step<Ctx>>,
}

impl<Ctx: Send> Suite<Ctx> {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            steps: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn step(mut self, name: &'static str, requires: &[&'static str], run: StepFn<Ctx>) -> Self {
        self.steps.push(Step {
            name,
            requires: requires.to_vec(),
            run,
            finalizer: false,
        });
        self
    }

    pub fn finalizer(
        mut self,
        name: &'static str,
        requires: &[&'static str],
        run: StepFn<Ctx>,
    ) -> Self {
        self.steps.push(Step {
            name,
            requires: requires.to_vec(),
            run,
            finalizer: true,
        });
        self
    }

    /// Validated execution order: regular steps first, then finalizers, each topologically
    /// sorted with ties broken by declaration order
    pub fn plan(&self) -> Result<Vec<&'static str>, HarnessError> {
        let mut by_name: HashMap<&str, &Step<Ctx>> = HashMap::new();
        for step in &self.steps {
            if by_name.insert(step.name, step).is_some() {
                return Err(HarnessError::DuplicateStep(step.name.to_string()));
            }
        }

        for step in &self.steps {
            for dependency in &step.requires {
                let Some(target) = by_name.get(dependency) else {
                    return Err(HarnessError::UnknownDependency {
                        step: step.name.to_string(),
                        dependency: dependency.to_string(),
                    });
                };
                if target.finalizer && !step.finalizer {
                    return Err(HarnessError::FinalizerDependency {
                        step: step.name.to_string(),
                        finalizer: dependency.to_string(),
                    });
                }
            }
        }

        let mut placed: HashSet<&str> = HashSet::new();
        let mut order: Vec<&'static str> = Vec::with_capacity(self.steps.len());
        while order.len() < self.steps.len() {
            let next = self
                .steps
                .iter()
                .filter(|step| !placed.contains(step.name))
                .filter(|step| step.requires.iter().all(|d| placed.contains(d)))
                .min_by_key(|step| step.finalizer);
            match next {
                Some(step) => {
                    placed.insert(step.name);
                    order.push(step.name);
                }
                None => {
                    let stuck = self
                        .steps
                        .iter()
                        .filter(|step| !placed.contains(step.name))
                        .map(|step| step.name.to_string())
                        .collect();
                    return Err(HarnessError::DependencyCycle(stuck));
                }
            }
        }
        Ok(order)
    }

    pub async fn run(&self, ctx: &mut Ctx) -> Result<SuiteReport, HarnessError> {
        let order = self.plan()?;
        let steps: HashMap<&str, &Step<Ctx>> = self.steps.iter().map(|s| (s.name, s)).collect();
        let mut outcomes: Vec<(String, StepOutcome)> = Vec::with_capacity(order.len());

        log::info!("[{}] running {} steps", self.name, order.len());

        for name in order {
            let Some(step) = steps.get(name) else {
                continue;
            };

            if !step.finalizer {
                let blocked_by = step.requires.iter().find(|dependency| {
                    !outcomes
                        .iter()
                        .any(|(done, outcome)| done.as_str() == **dependency && outcome.is_passed())
                });
                if let Some(blocked_by) = blocked_by {
                    log::warn!("[{}] {} skipped, {} did not pass", self.name, name, blocked_by);
                    outcomes.push((
                        name.to_string(),
                        StepOutcome::Skipped {
                            blocked_by: blocked_by.to_string(),
                        },
                    ));
                    continue;
                }
            }

            log::info!("[{}] {} started", self.name, name);
            let outcome = match (step.run)(&mut *ctx).await {
                Ok(()) => {
                    log::info!("[{}] {} passed", self.name, name);
                    StepOutcome::Passed
                }
                Err(error) => {
                    log::error!("[{}] {} failed: {:#}", self.name, name, error);
                    StepOutcome::Failed(format!("{:#}", error))
                }
            };
            outcomes.push((name.to_string(), outcome));
        }

        Ok(SuiteReport {
            suite: self.name.clone(),
            outcomes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type Log = Vec<&'static str>;

    fn first(log: &mut Log) -> StepFuture<'_> {
        Box::pin(async move {
            log.push("first");
            Ok(())
        })
    }

    fn broken(log: &mut Log) -> StepFuture<'_> {
        Box::pin(async move {
            log.push("broken");
            anyhow::bail!("catalog rejected the write")
        })
    }

    fn after_broken(log: &mut Log) -> StepFuture<'_> {
        Box::pin(async move {
            log.push("after_broken");
            Ok(())
        })
    }

    fn independent(log: &mut Log) -> StepFuture<'_> {
        Box::pin(async move {
            log.push("independent");
            Ok(())
        })
    }

    fn cleanup(log: &mut Log) -> StepFuture<'_> {
        Box::pin(async move {
            log.push("cleanup");
            Ok(())
        })
    }

    #[tokio::test]
    async fn test_dependents_of_failures_skip_and_finalizers_run() {
        let suite = Suite::new("sample")
            .finalizer("cleanup", &["after_broken"], cleanup)
            .step("first", &[], first)
            .step("broken", &["first"], broken)
            .step("after_broken", &["broken"], after_broken)
            .step("independent", &["first"], independent);

        let mut log = Log::new();
        let report = suite.run(&mut log).await.unwrap();

        assert_eq!(log, vec!["first", "broken", "independent", "cleanup"]);
        assert_eq!(report.outcome("first"), Some(&StepOutcome::Passed));
        assert!(matches!(report.outcome("broken"), Some(StepOutcome::Failed(_))));
        assert_eq!(
            report.outcome("after_broken"),
            Some(&StepOutcome::Skipped {
                blocked_by: "broken".to_string()
            })
        );
        assert_eq!(report.outcome("cleanup"), Some(&StepOutcome::Passed));
        assert!(!report.is_success());
        assert_eq!(report.failures().len(), 1);
    }

    #[test]
    fn test_plan_orders_by_dependencies_then_declaration() {
        let suite: Suite<Log> = Suite::new("order")
            .step("b", &["a"], first)
            .step("a", &[], first)
            .step("c", &[], first)
            .finalizer("z", &[], cleanup);
        assert_eq!(suite.plan().unwrap(), vec!["a", "b", "c", "z"]);
    }

    #[test]
    fn test_plan_rejects_invalid_graphs() {
        let unknown: Suite<Log> = Suite::new("s").step("a", &["missing"], first);
        assert!(matches!(
            unknown.plan(),
            Err(HarnessError::UnknownDependency { .. })
        ));

        let duplicate: Suite<Log> = Suite::new("s").step("a", &[], first).step("a", &[], first);
        assert!(matches!(duplicate.plan(), Err(HarnessError::DuplicateStep(_))));

        let cycle: Suite<Log> = Suite::new("s")
            .step("a", &["b"], first)
            .step("b", &["a"], first);
        assert!(matches!(cycle.plan(), Err(HarnessError::DependencyCycle(_))));

        let on_finalizer: Suite<Log> = Suite::new("s")
            .finalizer("z", &[], cleanup)
            .step("a", &["z"], first);
        assert!(matches!(
            on_finalizer.plan(),
            Err(HarnessError::FinalizerDependency { .. })
        ));
    }
}

//! Exception classification.

use std::future::Future;

use anyhow::Result;
use tracing::{error, info, warn};

use super::Abort;
use crate::config::WorkerConfig;
use crate::runtime::{ErrorName, Thrown};

/// An `ignoredErrors` entry that makes every exception benign.
pub const IGNORE_ALL: &str = "SHAPEFUZZ_IGNORE_ALL";

/// Messages the host raises while validating builtin arguments.
const HOST_VALIDATION_MESSAGES: [&str; 4] = [
    "Invalid typed array length",
    "Invalid array buffer length",
    "Invalid flags supplied to RegExp constructor",
    "Invalid regular expression",
];

/// Outcome of one plan execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Every call completed.
    Pass,
    /// The library threw an expected exception.
    Benign,
    /// The library threw an exception that indicates a defect.
    Defect,
    /// The library reached code it declares unreachable.
    Abort,
}

impl Verdict {
    pub fn passed(self) -> bool {
        matches!(self, Verdict::Pass | Verdict::Benign)
    }
}

/// Decides whether an exception thrown by the library is expected.
pub trait Oracle {
    /// Never returns [`Verdict::Pass`].
    fn classify(&self, thrown: &Thrown) -> Verdict;
}

/// Plain predicates: `true` means expected.
impl<F> Oracle for F
where
    F: Fn(&Thrown) -> bool,
{
    fn classify(&self, thrown: &Thrown) -> Verdict {
        if self(thrown) {
            Verdict::Benign
        } else {
            Verdict::Defect
        }
    }
}

/// Input-validation errors are expected; everything else is a defect.
#[derive(Debug, Clone, Default)]
pub struct DefaultOracle {
    ignored: Vec<String>,
}

impl DefaultOracle {
    pub fn new(ignored: Vec<String>) -> Self {
        Self { ignored }
    }

    pub fn from_config(config: &WorkerConfig) -> Self {
        Self::new(config.ignored_errors.clone())
    }
}

impl Oracle for DefaultOracle {
    fn classify(&self, thrown: &Thrown) -> Verdict {
        if matches!(
            thrown.error_name(),
            Some(ErrorName::TypeError | ErrorName::RangeError)
        ) {
            return Verdict::Benign;
        }

        let message = thrown.message();
        let ignored = self
            .ignored
            .iter()
            .any(|entry| entry == IGNORE_ALL || message.contains(entry.as_str()));
        if ignored
            || HOST_VALIDATION_MESSAGES
                .iter()
                .any(|m| message.contains(m))
        {
            return Verdict::Benign;
        }

        if message.contains("unreachable") {
            Verdict::Abort
        } else {
            Verdict::Defect
        }
    }
}

/// Run one plan and classify how it ended.
///
/// Contract violations are returned as errors and never reach the oracle.
pub async fn with_oracle<F>(oracle: &dyn Oracle, log_errors: bool, run: F) -> Result<Verdict>
where
    F: Future<Output = Result<(), Abort>>,
{
    match run.await {
        Ok(()) => Ok(Verdict::Pass),
        Err(Abort::Thrown(thrown)) => {
            let verdict = oracle.classify(&thrown);
            match verdict {
                Verdict::Defect | Verdict::Abort => error!(?verdict, "{}", thrown),
                _ if log_errors => info!(?verdict, "{}", thrown),
                _ => {}
            }
            Ok(verdict)
        }
        Err(Abort::Violation(err)) => {
            warn!("call plan rejected: {:#}", err);
            Err(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn oracle() -> DefaultOracle {
        DefaultOracle::new(vec!["incorrect header check".to_string()])
    }

    #[test]
    fn test_validation_errors_are_benign() {
        assert_eq!(
            oracle().classify(&Thrown::type_error("x is not a function")),
            Verdict::Benign
        );
        assert_eq!(
            oracle().classify(&Thrown::range_error("Maximum call stack size exceeded")),
            Verdict::Benign
        );
        let regexp = Thrown::syntax_error("Invalid flags supplied to RegExp constructor 'zz'");
        assert_eq!(oracle().classify(&regexp), Verdict::Benign);
    }

    #[test]
    fn test_ignored_messages() {
        let header = Thrown::error(ErrorName::Error, "incorrect header check");
        assert_eq!(oracle().classify(&header), Verdict::Benign);

        let other = Thrown::error(ErrorName::Error, "invalid distance too far back");
        assert_eq!(oracle().classify(&other), Verdict::Defect);

        let all = DefaultOracle::new(vec![IGNORE_ALL.to_string()]);
        assert_eq!(all.classify(&other), Verdict::Benign);
    }

    #[test]
    fn test_unreachable_is_abort() {
        let thrown = Thrown::error(ErrorName::Error, "entered unreachable code");
        let verdict = oracle().classify(&thrown);
        assert_eq!(verdict, Verdict::Abort);
        assert!(!verdict.passed());
    }

    #[test]
    fn test_thrown_strings_use_their_text() {
        let thrown = Thrown::new(crate::runtime::Value::string("incorrect header check"));
        assert_eq!(oracle().classify(&thrown), Verdict::Benign);
    }

    #[tokio::test]
    async fn test_with_oracle() {
        let predicate = |_: &Thrown| false;
        let pass = with_oracle(&predicate, false, async { Ok(()) }).await.unwrap();
        assert_eq!(pass, Verdict::Pass);
        assert!(pass.passed());

        let thrown = async { Err(Abort::Thrown(Thrown::type_error("bad"))) };
        assert_eq!(
            with_oracle(&predicate, true, thrown).await.unwrap(),
            Verdict::Defect
        );

        let violation = async { Err(Abort::violation("duplicate call id 3")) };
        let err = with_oracle(&oracle(), false, violation).await.unwrap_err();
        assert!(err.to_string().contains("duplicate call id"));
    }
}

//! Environment variable parsing with type safety, in the same shape the rest
//! of this toolchain uses: a parser that accumulates errors across several
//! reads so they can all be reported at startup instead of one at a time.

use thiserror::Error;

/// Errors that can occur while parsing `ADR_*` environment variables.
#[derive(Debug, Error)]
pub enum EnvError {
    /// A numeric variable held a value that did not parse.
    #[error("invalid value for {var}: expected {expected}, got '{value}'")]
    InvalidValue {
        var: String,
        expected: String,
        value: String,
    },
}

/// Type-safe environment variable parser scoped to a prefix (e.g. `ADR`).
///
/// Collects errors during parsing so all issues can be reported together
/// rather than aborting on the first bad variable.
pub struct EnvParser {
    prefix: String,
    errors: Vec<EnvError>,
}

impl EnvParser {
    #[must_use]
    pub fn new(prefix: &str) -> Self {
        Self {
            prefix: prefix.to_string(),
            errors: Vec::new(),
        }
    }

    fn var_name(&self, name: &str) -> String {
        format!("{}_{}", self.prefix, name)
    }

    /// Reads a string variable; returns `None` if unset.
    pub fn string(&mut self, name: &str) -> Option<String> {
        std::env::var(self.var_name(name)).ok()
    }

    /// Reads a `u64` variable; returns `Ok(None)` if unset, collects an
    /// [`EnvError`] (and returns `Ok(None)`) if set but unparseable.
    pub fn u64(&mut self, name: &str) -> Result<Option<u64>, EnvError> {
        let var = self.var_name(name);
        let Some(raw) = std::env::var(&var).ok() else {
            return Ok(None);
        };
        match raw.parse::<u64>() {
            Ok(v) => Ok(Some(v)),
            Err(_) => {
                let err = EnvError::InvalidValue {
                    var,
                    expected: "u64".to_string(),
                    value: raw,
                };
                self.errors.push(err);
                Ok(None)
            }
        }
    }

    /// Consumes the parser, returning `Err` with the first collected error
    /// (if any), or `Ok(())`.
    pub fn into_result(self) -> Result<(), EnvError> {
        self.errors.into_iter().next().map_or(Ok(()), Err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn reads_string_override() {
        // SAFETY: test-local env mutation under `serial_test`.
        unsafe { std::env::set_var("ADR_TEST_STRING_FIELD", "hello") };
        let mut parser = EnvParser::new("ADR");
        assert_eq!(parser.string("TEST_STRING_FIELD"), Some("hello".to_string()));
        unsafe { std::env::remove_var("ADR_TEST_STRING_FIELD") };
    }

    #[test]
    #[serial]
    fn collects_invalid_u64() {
        unsafe { std::env::set_var("ADR_TEST_U64_FIELD", "not-a-number") };
        let mut parser = EnvParser::new("ADR");
        assert_eq!(parser.u64("TEST_U64_FIELD").unwrap(), None);
        assert!(parser.into_result().is_err());
        unsafe { std::env::remove_var("ADR_TEST_U64_FIELD") };
    }
}

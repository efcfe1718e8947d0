//! The policy-rule parser collaborator injected into `sdcaccountpolicy`
//! transforms (§4.3.4). Parsing Aperture-style policy rule grammar is out of
//! scope (non-goal); this trait is the boundary, with a pass-through fake
//! for tests and a structural-validation default for production use.

use crate::errors::{Error, ErrorCode};
use serde_json::Value;

/// Parses one policy rule's raw text into the structured form stored
/// alongside it as `(raw, parsed)`.
pub trait RuleParser: Send + Sync {
    fn parse(&self, raw: &str) -> Result<Value, Error>;
}

/// Wraps the raw string as the parsed value verbatim. Used when no real
/// grammar is configured, and throughout the test suite.
#[derive(Debug, Default, Clone, Copy)]
pub struct PassthroughRuleParser;

impl RuleParser for PassthroughRuleParser {
    fn parse(&self, raw: &str) -> Result<Value, Error> {
        Ok(Value::String(raw.to_string()))
    }
}

/// Rejects empty or whitespace-only rule text; otherwise passes the raw text
/// through unchanged. A minimal guard against obviously malformed rules
/// reaching the store, without implementing the full grammar.
#[derive(Debug, Default, Clone, Copy)]
pub struct ValidatingRuleParser;

impl RuleParser for ValidatingRuleParser {
    fn parse(&self, raw: &str) -> Result<Value, Error> {
        if raw.trim().is_empty() {
            return Err(Error::ChangelogShape(
                ErrorCode::TransformRuleParseFailed,
                "rule text is empty".to_string(),
            ));
        }
        Ok(Value::String(raw.to_string()))
    }
}

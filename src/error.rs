use failure::Fail;

/// Machine-readable error codes surfaced by the ELBv2 control plane that the
/// reconcilers act on. Everything else is propagated verbatim.
pub mod codes {
    pub const TOO_MANY_RULES: &str = "TooManyRules";
    pub const LISTENER_NOT_FOUND: &str = "ListenerNotFound";
    pub const LISTENER_NOT_FOUND_EXCEPTION: &str = "ListenerNotFoundException";
    pub const RESOURCE_IN_USE: &str = "ResourceInUse";
    pub const OPERATION_NOT_PERMITTED: &str = "OperationNotPermitted";
}

#[derive(Debug, Fail)]
pub enum SyncError {
    #[fail(display = "elbv2 api failure: {} - {}", code, message)]
    Api { code: String, message: String },
    #[fail(display = "resource-id tag {} missing on {}", tag_key, arn)]
    MissingResourceIdTag { tag_key: String, arn: String },
    #[fail(display = "too many rules attached to listener {}", listener_arn)]
    TooManyRules { listener_arn: String },
    #[fail(display = "unresolved reference to resource {}", resource_id)]
    UnresolvedReference { resource_id: String },
    #[fail(display = "synthesis cancelled")]
    Cancelled,
    #[fail(display = "validation failure: {}", _0)]
    Validation(String),
    #[fail(display = "{} failed for {}: {}", component, context, msg)]
    Component {
        component: &'static str,
        context: String,
        msg: String,
    },
}

impl SyncError {
    pub fn api<C: Into<String>, M: Into<String>>(code: C, message: M) -> Self {
        SyncError::Api {
            code: code.into(),
            message: message.into(),
        }
    }

    /// The control-plane error code, when this is an API failure.
    pub fn code(&self) -> Option<&str> {
        match self {
            SyncError::Api { code, .. } => Some(code.as_str()),
            _ => None,
        }
    }

    pub fn is_code(&self, code: &str) -> bool {
        self.code() == Some(code)
    }

    /// True for the create-time visibility gap after a listener was created
    /// in the same synthesis cycle.
    pub fn is_listener_not_found(&self) -> bool {
        self.is_code(codes::LISTENER_NOT_FOUND) || self.is_code(codes::LISTENER_NOT_FOUND_EXCEPTION)
    }

    /// Attach the failing component and its subject to an error crossing a
    /// synthesizer boundary. Cancellation passes through untouched so the
    /// caller can still recognize it.
    pub fn wrap<C: Into<String>>(self, component: &'static str, context: C) -> Self {
        match self {
            SyncError::Cancelled => SyncError::Cancelled,
            other => SyncError::Component {
                component,
                context: context.into(),
                msg: format!("{}", other),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_code_matches() {
        let err = SyncError::api(codes::TOO_MANY_RULES, "limit reached");
        assert!(err.is_code("TooManyRules"));
        assert!(!err.is_code("ResourceInUse"));
    }

    #[test]
    fn listener_not_found_matches_both_codes() {
        assert!(SyncError::api("ListenerNotFound", "gone").is_listener_not_found());
        assert!(SyncError::api("ListenerNotFoundException", "gone").is_listener_not_found());
        assert!(!SyncError::api("RuleNotFound", "gone").is_listener_not_found());
    }

    #[test]
    fn wrap_preserves_cancellation() {
        let wrapped = SyncError::Cancelled.wrap("listener-synthesizer", "arn-1");
        match wrapped {
            SyncError::Cancelled => {}
            other => panic!("expected Cancelled, got {}", other),
        }
    }

    #[test]
    fn wrap_flattens_message() {
        let wrapped = SyncError::api("AccessDenied", "not authorized")
            .wrap("load-balancer-synthesizer", "my-stack");
        let rendered = format!("{}", wrapped);
        assert!(rendered.contains("load-balancer-synthesizer"));
        assert!(rendered.contains("not authorized"));
    }
}

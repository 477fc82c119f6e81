// Audit emission used both by the authentication service (explicit events:
// login_success, login_failure, logout, session_created) and by the
// authorization interceptor's post-handler stage.

use std::sync::Arc;

use crate::repositories::traits::AuditRepository;

#[derive(Clone)]
pub struct AuditService {
    repository: Arc<dyn AuditRepository>,
}

impl AuditService {
    pub fn new(repository: Arc<dyn AuditRepository>) -> Self {
        Self { repository }
    }

    pub async fn emit(
        &self,
        org_id: &str,
        user_id: &str,
        action: &str,
        resource: &str,
        ip: &str,
        metadata: Option<serde_json::Value>,
    ) {
        self.repository
            .log_event(org_id, user_id, action, resource, ip, metadata)
            .await;
    }
}

/// Derives the audit `action` verb from an operation's method name, per the
/// fixed mapping the interceptor applies to every protected call.
pub fn action_for_method(method: &str) -> String {
    let overrides: &[(&str, &str)] = &[
        ("AddMember", "user_added"),
        ("RemoveMember", "user_removed"),
        ("ChangeRole", "role_changed"),
    ];
    if let Some((_, action)) = overrides.iter().find(|(name, _)| *name == method) {
        return action.to_string();
    }

    let verbs = [
        "Get", "List", "Create", "Update", "Delete", "Add", "Remove", "Register", "Revoke",
        "Suspend",
    ];
    for verb in verbs {
        if method.starts_with(verb) {
            return verb.to_lowercase();
        }
    }
    method.to_lowercase()
}

/// Derives the audit `resource` from the owning service name, stripped of a
/// trailing `Service` suffix and lowercased.
pub fn resource_for_service(service_name: &str) -> String {
    service_name.strip_suffix("Service").unwrap_or(service_name).to_lowercase()
}

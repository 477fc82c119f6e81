// Declarative policy evaluator, package `auth.device_trust`.
//
// An organization's enabled rule modules are a hand-rolled declarative
// language rather than a general scripting one: each module ANDs a list of
// field conditions, and modules are combined by disjunction. There is no
// Rego/OPA crate in this dependency stack, so the evaluator is a small
// interpreter over `serde_json::Value` rule bodies, validated at write time
// by `validate_rule_module`.
//
// When an organization has no enabled modules, or compiling/evaluating them
// fails, the evaluator falls back to the embedded default result rather than
// attempting the org's granular settings: `mfa_required` becomes exactly
// `platform.mfa_required_always`, `register_trust_after_mfa` is `true`, and
// `trust_ttl_days` follows the org/platform/30-day fallback chain. This
// matches the documented property "no enabled rules => {false, true, ttl}
// regardless of device/org inputs, except mfa_required_always".

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::models::settings::{OrgMfaSettings, OrgPolicyRule, PlatformSettings};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionOp {
    Eq,
    Ne,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Condition {
    pub field: String,
    pub op: ConditionOp,
    pub value: Value,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct RuleModule {
    #[serde(default)]
    pub mfa_required_when: Vec<Condition>,
}

#[derive(Debug, Clone)]
pub struct PlatformInput {
    pub mfa_required_always: bool,
    pub default_trust_ttl_days: i64,
}

#[derive(Debug, Clone)]
pub struct OrgInput {
    pub mfa_required_for_new_device: bool,
    pub mfa_required_for_untrusted: bool,
    pub mfa_required_always: bool,
    pub register_trust_after_mfa: bool,
    pub trust_ttl_days: i64,
}

#[derive(Debug, Clone)]
pub struct DeviceInput {
    pub is_new: bool,
    pub is_effectively_trusted: bool,
}

#[derive(Debug, Clone)]
pub struct UserInput {
    pub has_phone: bool,
}

#[derive(Debug, Clone)]
pub struct PolicyInput {
    pub platform: PlatformInput,
    pub org: OrgInput,
    pub device: DeviceInput,
    pub user: UserInput,
}

impl PolicyInput {
    pub fn from_settings(
        platform: &PlatformSettings,
        org: &OrgMfaSettings,
        device_is_new: bool,
        device_is_effectively_trusted: bool,
        user_has_phone: bool,
    ) -> Self {
        Self {
            platform: PlatformInput {
                mfa_required_always: platform.mfa_required_always,
                default_trust_ttl_days: platform.default_trust_ttl_days,
            },
            org: OrgInput {
                mfa_required_for_new_device: org.mfa_required_for_new_device,
                mfa_required_for_untrusted: org.mfa_required_for_untrusted,
                mfa_required_always: org.mfa_required_always,
                register_trust_after_mfa: org.register_trust_after_mfa,
                trust_ttl_days: org.trust_ttl_days,
            },
            device: DeviceInput {
                is_new: device_is_new,
                is_effectively_trusted: device_is_effectively_trusted,
            },
            user: UserInput {
                has_phone: user_has_phone,
            },
        }
    }

    fn field(&self, name: &str) -> Option<Value> {
        Some(match name {
            "platform.mfa_required_always" => Value::Bool(self.platform.mfa_required_always),
            "org.mfa_required_for_new_device" => Value::Bool(self.org.mfa_required_for_new_device),
            "org.mfa_required_for_untrusted" => Value::Bool(self.org.mfa_required_for_untrusted),
            "org.mfa_required_always" => Value::Bool(self.org.mfa_required_always),
            "device.is_new" => Value::Bool(self.device.is_new),
            "device.is_effectively_trusted" => Value::Bool(self.device.is_effectively_trusted),
            "user.has_phone" => Value::Bool(self.user.has_phone),
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyOutput {
    pub mfa_required: bool,
    pub register_trust_after_mfa: bool,
    pub trust_ttl_days: i64,
}

/// The rule body an org *should* write to reproduce the reference formula
/// in full (device-new and device-untrusted clauses included). This is
/// offered as the starting template for org-defined rulesets; it is not
/// itself the fallback path (see module docs).
pub fn default_ruleset_template() -> Vec<RuleModule> {
    vec![
        RuleModule {
            mfa_required_when: vec![Condition {
                field: "platform.mfa_required_always".to_string(),
                op: ConditionOp::Eq,
                value: Value::Bool(true),
            }],
        },
        RuleModule {
            mfa_required_when: vec![
                Condition {
                    field: "device.is_new".to_string(),
                    op: ConditionOp::Eq,
                    value: Value::Bool(true),
                },
                Condition {
                    field: "org.mfa_required_for_new_device".to_string(),
                    op: ConditionOp::Eq,
                    value: Value::Bool(true),
                },
            ],
        },
        RuleModule {
            mfa_required_when: vec![
                Condition {
                    field: "device.is_effectively_trusted".to_string(),
                    op: ConditionOp::Eq,
                    value: Value::Bool(false),
                },
                Condition {
                    field: "org.mfa_required_for_untrusted".to_string(),
                    op: ConditionOp::Eq,
                    value: Value::Bool(true),
                },
            ],
        },
    ]
}

/// Validated at write time: every field name must be one this evaluator
/// understands, and the condition list must not be empty (an empty AND is
/// vacuously true and would make the module always fire).
pub fn validate_rule_module(module: &RuleModule) -> Result<(), String> {
    if module.mfa_required_when.is_empty() {
        return Err("rule module must declare at least one condition".to_string());
    }
    let known_fields = [
        "platform.mfa_required_always",
        "org.mfa_required_for_new_device",
        "org.mfa_required_for_untrusted",
        "org.mfa_required_always",
        "device.is_new",
        "device.is_effectively_trusted",
        "user.has_phone",
    ];
    for condition in &module.mfa_required_when {
        if !known_fields.contains(&condition.field.as_str()) {
            return Err(format!("unknown policy field: {}", condition.field));
        }
    }
    Ok(())
}

fn evaluate_condition(input: &PolicyInput, condition: &Condition) -> bool {
    match input.field(&condition.field) {
        Some(actual) => match condition.op {
            ConditionOp::Eq => actual == condition.value,
            ConditionOp::Ne => actual != condition.value,
        },
        None => false,
    }
}

fn evaluate_module(input: &PolicyInput, module: &RuleModule) -> bool {
    if module.mfa_required_when.is_empty() {
        return false;
    }
    module
        .mfa_required_when
        .iter()
        .all(|condition| evaluate_condition(input, condition))
}

fn trust_ttl_days(input: &PolicyInput) -> i64 {
    if input.org.trust_ttl_days > 0 {
        input.org.trust_ttl_days
    } else if input.platform.default_trust_ttl_days > 0 {
        input.platform.default_trust_ttl_days
    } else {
        30
    }
}

fn default_result(input: &PolicyInput) -> PolicyOutput {
    PolicyOutput {
        mfa_required: input.platform.mfa_required_always,
        register_trust_after_mfa: true,
        trust_ttl_days: trust_ttl_days(input),
    }
}

pub struct PolicyEvaluator;

impl PolicyEvaluator {
    pub fn new() -> Self {
        Self
    }

    /// `org_rules` should already be filtered to enabled rows.
    pub fn evaluate(&self, input: &PolicyInput, org_rules: &[OrgPolicyRule]) -> PolicyOutput {
        if org_rules.is_empty() {
            return default_result(input);
        }

        let modules: Result<Vec<RuleModule>, _> = org_rules
            .iter()
            .map(|rule| serde_json::from_value::<RuleModule>(rule.rule_json.clone()))
            .collect();

        match modules {
            Ok(modules) if modules.iter().all(|m| validate_rule_module(m).is_ok()) => {
                let mfa_required = modules.iter().any(|module| evaluate_module(input, module));
                PolicyOutput {
                    mfa_required,
                    register_trust_after_mfa: input.org.register_trust_after_mfa,
                    trust_ttl_days: trust_ttl_days(input),
                }
            }
            _ => {
                tracing::warn!("policy rule compilation/evaluation failed, using default result");
                default_result(input)
            }
        }
    }

    /// Synchronous self-check compiling and evaluating the reference
    /// template against a minimal input. Failure signals the process
    /// not-ready.
    pub fn health_check(&self) -> Result<(), String> {
        let modules = default_ruleset_template();
        for module in &modules {
            validate_rule_module(module)?;
        }
        let input = PolicyInput {
            platform: PlatformInput {
                mfa_required_always: false,
                default_trust_ttl_days: 30,
            },
            org: OrgInput {
                mfa_required_for_new_device: false,
                mfa_required_for_untrusted: false,
                mfa_required_always: false,
                register_trust_after_mfa: true,
                trust_ttl_days: 0,
            },
            device: DeviceInput {
                is_new: false,
                is_effectively_trusted: true,
            },
            user: UserInput { has_phone: true },
        };
        let _ = modules.iter().any(|module| evaluate_module(&input, module));
        Ok(())
    }
}

impl Default for PolicyEvaluator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_input() -> PolicyInput {
        PolicyInput {
            platform: PlatformInput {
                mfa_required_always: false,
                default_trust_ttl_days: 30,
            },
            org: OrgInput {
                mfa_required_for_new_device: false,
                mfa_required_for_untrusted: false,
                mfa_required_always: false,
                register_trust_after_mfa: true,
                trust_ttl_days: 0,
            },
            device: DeviceInput {
                is_new: false,
                is_effectively_trusted: true,
            },
            user: UserInput { has_phone: true },
        }
    }

    #[test]
    fn no_enabled_rules_ignores_device_and_org_inputs() {
        let evaluator = PolicyEvaluator::new();
        let mut input = base_input();
        input.device.is_new = true;
        input.org.mfa_required_for_new_device = true;
        let output = evaluator.evaluate(&input, &[]);
        assert!(!output.mfa_required);
        assert!(output.register_trust_after_mfa);
        assert_eq!(output.trust_ttl_days, 30);
    }

    #[test]
    fn no_enabled_rules_still_honors_platform_always() {
        let evaluator = PolicyEvaluator::new();
        let mut input = base_input();
        input.platform.mfa_required_always = true;
        let output = evaluator.evaluate(&input, &[]);
        assert!(output.mfa_required);
    }

    #[test]
    fn org_rule_requiring_new_device_mfa_fires() {
        let evaluator = PolicyEvaluator::new();
        let mut input = base_input();
        input.device.is_new = true;
        input.org.mfa_required_for_new_device = true;

        let rule = OrgPolicyRule {
            id: "rule-1".to_string(),
            org_id: "org-1".to_string(),
            name: "new-device".to_string(),
            enabled: true,
            rule_json: serde_json::to_value(default_ruleset_template()[1].clone()).unwrap(),
            created_at: chrono::Utc::now(),
            updated_at: chrono::Utc::now(),
        };

        let output = evaluator.evaluate(&input, std::slice::from_ref(&rule));
        assert!(output.mfa_required);
    }

    #[test]
    fn health_check_passes() {
        assert!(PolicyEvaluator::new().health_check().is_ok());
    }
}

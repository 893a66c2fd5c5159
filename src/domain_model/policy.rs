use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub const POLICY_VERSION: &str = "2012-10-17";
pub const INVOKE_ACTION: &str = "execute-api:Invoke";

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorizerRequest {
    pub authorization_header: String,
    pub method_arn: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Effect {
    Allow,
    Deny,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Statement {
    pub effect: Effect,
    pub action: Vec<String>,
    pub resource: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PolicyDocument {
    pub version: String,
    pub statement: Vec<Statement>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorizerResponse {
    pub principal_id: String,
    pub policy_document: PolicyDocument,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<HashMap<String, String>>,
}

impl AuthorizerResponse {
    pub fn allow(principal_id: impl Into<String>, resource: impl Into<String>) -> Self {
        Self::single(principal_id.into(), Effect::Allow, resource.into(), None)
    }

    pub fn deny(
        principal_id: impl Into<String>,
        resource: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        let context = HashMap::from([("reason".to_string(), reason.into())]);
        Self::single(principal_id.into(), Effect::Deny, resource.into(), Some(context))
    }

    fn single(
        principal_id: String,
        effect: Effect,
        resource: String,
        context: Option<HashMap<String, String>>,
    ) -> Self {
        AuthorizerResponse {
            principal_id,
            policy_document: PolicyDocument {
                version: POLICY_VERSION.to_string(),
                statement: vec![Statement {
                    effect,
                    action: vec![INVOKE_ACTION.to_string()],
                    resource: vec![resource],
                }],
            },
            context,
        }
    }

    pub fn effect(&self) -> Option<Effect> {
        self.policy_document.statement.first().map(|s| s.effect)
    }

    pub fn reason(&self) -> Option<&str> {
        self.context
            .as_ref()
            .and_then(|c| c.get("reason"))
            .map(String::as_str)
    }
}

/// `arn:aws:execute-api:{region}:{account}:{api}/{stage}/{verb}/{path..}`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodArn {
    pub prefix: String, // everything before the first '/'
    pub stage: String,
    pub verb: String,
    pub path: Vec<String>,
}

impl MethodArn {
    pub fn parse(raw: &str) -> Option<Self> {
        let (prefix, rest) = raw.split_once('/')?;
        if prefix.split(':').count() != 6 || !prefix.starts_with("arn:") {
            return None;
        }
        let mut parts = rest.split('/');
        let stage = parts.next().filter(|s| !s.is_empty())?.to_string();
        let verb = parts.next().filter(|s| !s.is_empty())?.to_string();
        let path = parts
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();
        Some(MethodArn {
            prefix: prefix.to_string(),
            stage,
            verb,
            path,
        })
    }

    /// Every verb and path under the same API stage.
    pub fn stage_wildcard(&self) -> String {
        format!("{}/{}/*/*", self.prefix, self.stage)
    }

    /// The id following a `users` segment, if the path has one.
    pub fn path_user(&self, segment: &str) -> Option<&str> {
        self.path
            .iter()
            .position(|p| p == segment)
            .and_then(|i| self.path.get(i + 1))
            .map(String::as_str)
    }
}

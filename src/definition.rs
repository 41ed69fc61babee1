use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::assertion::Assertion;
use crate::http::{Auth, Method, Request};
use crate::store::Record;
use crate::variable::{VariableContext, VariableResolver};

/// 已保存的请求。除 `name` 外的字符串字段都是模板，
/// 可包含 `{{variable}}` 占位符
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestDefinition {
    pub name: String,
    pub method: Method,
    pub url: String,

    #[serde(default)]
    pub headers: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,

    #[serde(default)]
    pub params: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth: Option<Auth>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub assertions: Vec<Assertion>,
}

impl RequestDefinition {
    pub fn new(name: impl Into<String>, method: Method, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            method,
            url: url.into(),
            headers: BTreeMap::new(),
            body: None,
            params: BTreeMap::new(),
            description: None,
            auth: None,
            assertions: Vec::new(),
        }
    }

    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_auth(mut self, auth: Auth) -> Self {
        self.auth = Some(auth);
        self
    }

    pub fn with_assertion(mut self, assertion: Assertion) -> Self {
        self.assertions.push(assertion);
        self
    }

    fn templates(&self) -> Vec<&str> {
        let mut templates = vec![self.url.as_str()];
        templates.extend(self.headers.values().map(String::as_str));
        templates.extend(self.body.as_deref());
        templates.extend(self.params.values().map(String::as_str));
        match &self.auth {
            Some(Auth::Bearer { token }) => templates.push(token),
            Some(Auth::Basic { username, password }) => {
                templates.push(username);
                templates.push(password);
            }
            Some(Auth::ApiKey { header, value }) => {
                templates.push(header);
                templates.push(value);
            }
            None => {}
        }
        templates
    }

    /// `variables` 无法填充的占位符名（去重、排序）
    pub fn unresolved_variables(&self, variables: &VariableContext) -> Vec<String> {
        let mut names: Vec<String> = self
            .templates()
            .into_iter()
            .flat_map(|t| VariableResolver::unresolved(t, variables))
            .collect();
        names.sort();
        names.dedup();
        names
    }

    /// 将变量替换进 url、headers、body、params 和 auth
    pub fn resolve(&self, variables: &VariableContext) -> Request {
        let sub = |text: &str| VariableResolver::substitute(text, variables);
        let sub_map = |map: &BTreeMap<String, String>| {
            map.iter()
                .map(|(k, v)| (k.clone(), sub(v)))
                .collect::<BTreeMap<_, _>>()
        };

        let auth = self.auth.as_ref().map(|auth| match auth {
            Auth::Bearer { token } => Auth::Bearer { token: sub(token) },
            Auth::Basic { username, password } => Auth::Basic {
                username: sub(username),
                password: sub(password),
            },
            Auth::ApiKey { header, value } => Auth::ApiKey {
                header: sub(header),
                value: sub(value),
            },
        });

        Request {
            method: self.method,
            url: sub(&self.url),
            headers: sub_map(&self.headers),
            body: self.body.as_deref().map(sub),
            query_params: sub_map(&self.params),
            auth,
        }
    }
}

impl Record for RequestDefinition {
    fn key(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn vars(pairs: &[(&str, &str)]) -> VariableContext {
        pairs.iter().copied().collect()
    }

    #[test]
    fn test_resolve_substitutes_every_field() {
        let definition = RequestDefinition::new("get-item", Method::Put, "{{base}}/items/{{uid}}")
            .with_header("Authorization", "Bearer {{token}}")
            .with_param("expand", "{{expand}}")
            .with_body(r#"{"owner": "{{uid}}"}"#);

        let request = definition.resolve(&vars(&[
            ("base", "https://api.example.com"),
            ("uid", "7"),
            ("token", "t0k"),
            ("expand", "all"),
        ]));

        assert_eq!(request.method, Method::Put);
        assert_eq!(request.url, "https://api.example.com/items/7");
        assert_eq!(request.headers["Authorization"], "Bearer t0k");
        assert_eq!(request.query_params["expand"], "all");
        assert_eq!(request.body.as_deref(), Some(r#"{"owner": "7"}"#));
    }

    #[test]
    fn test_resolve_leaves_unknown_placeholders() {
        let definition = RequestDefinition::new("r", Method::Get, "https://api.example.com/items/{{uid}}");
        let request = definition.resolve(&VariableContext::new());
        assert_eq!(request.url, "https://api.example.com/items/{{uid}}");
        assert_eq!(
            definition.unresolved_variables(&VariableContext::new()),
            vec!["uid"]
        );
    }

    #[test]
    fn test_resolve_auth_templates() {
        let definition = RequestDefinition::new("r", Method::Get, "http://localhost")
            .with_auth(Auth::Bearer { token: "{{token}}".to_string() });
        let request = definition.resolve(&vars(&[("token", "abc")]));
        assert_eq!(request.auth, Some(Auth::Bearer { token: "abc".to_string() }));
    }

    #[test]
    fn test_unresolved_variables_sorted_and_distinct() {
        let definition = RequestDefinition::new("r", Method::Post, "{{host}}/{{b}}")
            .with_header("X-A", "{{a}}")
            .with_body("{{b}} {{a}}");
        assert_eq!(
            definition.unresolved_variables(&vars(&[("host", "h")])),
            vec!["a", "b"]
        );
    }

    #[test]
    fn test_json_shape() {
        let definition: RequestDefinition = serde_json::from_value(json!({
            "name": "login",
            "method": "POST",
            "url": "https://api.example.com/login",
            "body": "{\"user\": \"me\"}"
        }))
        .unwrap();
        assert!(definition.headers.is_empty());
        assert!(definition.params.is_empty());
        assert!(definition.assertions.is_empty());

        let value = serde_json::to_value(&definition).unwrap();
        assert_eq!(value["method"], "POST");
        assert!(value.get("auth").is_none());
        assert!(value.get("description").is_none());
    }
}

//! IAM policy documents
//!
//! Statements are built as values so that resource ARNs can point at other
//! resources in the topology.

use crate::resource::Value;

pub const POLICY_VERSION: &str = "2012-10-17";

/// Condition attached to a statement
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    /// Operator (e.g., "StringEquals")
    pub operator: String,
    /// Condition key (e.g., "elasticfilesystem:AccessPointArn")
    pub key: String,
    pub value: Value,
}

/// A single `Allow` statement
#[derive(Debug, Clone, PartialEq)]
pub struct PolicyStatement {
    pub actions: Vec<String>,
    pub resources: Vec<Value>,
    pub conditions: Vec<Condition>,
}

impl PolicyStatement {
    pub fn allow<I, S>(actions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            actions: actions.into_iter().map(Into::into).collect(),
            resources: Vec::new(),
            conditions: Vec::new(),
        }
    }

    pub fn on(mut self, resource: impl Into<Value>) -> Self {
        self.resources.push(resource.into());
        self
    }

    pub fn when(
        mut self,
        operator: impl Into<String>,
        key: impl Into<String>,
        value: impl Into<Value>,
    ) -> Self {
        self.conditions.push(Condition {
            operator: operator.into(),
            key: key.into(),
            value: value.into(),
        });
        self
    }

    pub fn to_value(&self) -> Value {
        let mut entries = vec![
            ("Effect", Value::string("Allow")),
            ("Action", Value::strings(self.actions.iter().cloned())),
            ("Resource", Value::List(self.resources.clone())),
        ];

        if !self.conditions.is_empty() {
            let mut by_operator: std::collections::HashMap<String, Value> =
                std::collections::HashMap::new();
            for condition in &self.conditions {
                let entry = by_operator
                    .entry(condition.operator.clone())
                    .or_insert_with(|| Value::Map(Default::default()));
                if let Value::Map(keys) = entry {
                    keys.insert(condition.key.clone(), condition.value.clone());
                }
            }
            entries.push(("Condition", Value::Map(by_operator)));
        }

        Value::map(entries)
    }
}

/// A policy document made of `Allow` statements
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PolicyDocument {
    pub statements: Vec<PolicyStatement>,
}

impl PolicyDocument {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_statement(mut self, statement: PolicyStatement) -> Self {
        self.statements.push(statement);
        self
    }

    pub fn to_value(&self) -> Value {
        Value::map([
            ("Version", Value::string(POLICY_VERSION)),
            (
                "Statement",
                Value::List(self.statements.iter().map(PolicyStatement::to_value).collect()),
            ),
        ])
    }
}

//! 查询构造器
//!
//! 生成 BaaS 的 `where` JSON，由 REST 实现直接发送、由内存实现直接求值。

use crate::lounge::types::Pointer;
use serde_json::{Map, Value};

/// 排序方向
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SortKey {
    Asc(String),
    Desc(String),
}

impl SortKey {
    pub fn field(&self) -> &str {
        match self {
            SortKey::Asc(f) | SortKey::Desc(f) => f,
        }
    }

    fn to_wire(&self) -> String {
        match self {
            SortKey::Asc(f) => f.clone(),
            SortKey::Desc(f) => format!("-{f}"),
        }
    }
}

/// 针对单个类的查询
#[derive(Debug, Clone)]
pub struct Query {
    class_name: String,
    conditions: Map<String, Value>,
    or_clauses: Vec<Map<String, Value>>,
    order: Vec<SortKey>,
    limit: Option<usize>,
    skip: Option<usize>,
    include: Vec<String>,
    keys: Vec<String>,
}

impl Query {
    pub fn new(class_name: impl Into<String>) -> Self {
        Self {
            class_name: class_name.into(),
            conditions: Map::new(),
            or_clauses: Vec::new(),
            order: Vec::new(),
            limit: None,
            skip: None,
            include: Vec::new(),
            keys: Vec::new(),
        }
    }

    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    pub fn equal_to(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.conditions.insert(key.to_string(), value.into());
        self
    }

    pub fn equal_to_pointer(self, key: &str, pointer: &Pointer) -> Self {
        self.equal_to(key, pointer.to_value())
    }

    pub fn not_equal_to(self, key: &str, value: impl Into<Value>) -> Self {
        self.add_operator(key, "$ne", value.into())
    }

    pub fn contained_in<I, V>(self, key: &str, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let values: Vec<Value> = values.into_iter().map(Into::into).collect();
        self.add_operator(key, "$in", Value::Array(values))
    }

    pub fn exists(self, key: &str) -> Self {
        self.add_operator(key, "$exists", Value::Bool(true))
    }

    pub fn does_not_exist(self, key: &str) -> Self {
        self.add_operator(key, "$exists", Value::Bool(false))
    }

    /// 正则匹配，`modifiers` 例如 `"i"`
    pub fn matches(self, key: &str, pattern: &str, modifiers: &str) -> Self {
        let query = self.add_operator(key, "$regex", Value::String(pattern.to_string()));
        if modifiers.is_empty() {
            query
        } else {
            query.add_operator(key, "$options", Value::String(modifiers.to_string()))
        }
    }

    /// 前缀匹配（字面量，已转义）
    pub fn starts_with(self, key: &str, prefix: &str) -> Self {
        let pattern = format!("^{}", regex::escape(prefix));
        self.matches(key, &pattern, "")
    }

    /// 大小写不敏感的包含匹配（字面量，已转义）
    pub fn contains_ignore_case(self, key: &str, needle: &str) -> Self {
        self.matches(key, &regex::escape(needle), "i")
    }

    /// 追加一个 `$or` 分支，分支内条件取自另一个查询
    pub fn or(mut self, branch: Query) -> Self {
        self.or_clauses.push(branch.conditions);
        self
    }

    pub fn ascending(mut self, key: &str) -> Self {
        self.order.push(SortKey::Asc(key.to_string()));
        self
    }

    pub fn descending(mut self, key: &str) -> Self {
        self.order.push(SortKey::Desc(key.to_string()));
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn skip(mut self, skip: usize) -> Self {
        self.skip = Some(skip);
        self
    }

    /// 展开指针字段（返回完整对象）
    pub fn include(mut self, key: &str) -> Self {
        self.include.push(key.to_string());
        self
    }

    /// 仅返回指定字段
    pub fn select_keys(mut self, keys: &[&str]) -> Self {
        self.keys = keys.iter().map(|k| k.to_string()).collect();
        self
    }

    fn add_operator(mut self, key: &str, op: &str, value: Value) -> Self {
        let entry = self
            .conditions
            .entry(key.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        // 已有等值条件时被操作符条件覆盖
        if !is_operator_object(entry) {
            *entry = Value::Object(Map::new());
        }
        if let Value::Object(ops) = entry {
            ops.insert(op.to_string(), value);
        }
        self
    }

    /// `where` JSON
    pub fn where_clause(&self) -> Value {
        let mut clause = self.conditions.clone();
        if !self.or_clauses.is_empty() {
            let branches = self
                .or_clauses
                .iter()
                .cloned()
                .map(Value::Object)
                .collect();
            clause.insert("$or".to_string(), Value::Array(branches));
        }
        Value::Object(clause)
    }

    pub fn order(&self) -> &[SortKey] {
        &self.order
    }

    /// `order` 参数，例如 `-createdAt,likes`
    pub fn order_param(&self) -> Option<String> {
        if self.order.is_empty() {
            None
        } else {
            Some(
                self.order
                    .iter()
                    .map(SortKey::to_wire)
                    .collect::<Vec<_>>()
                    .join(","),
            )
        }
    }

    pub fn limit_value(&self) -> Option<usize> {
        self.limit
    }

    pub fn skip_value(&self) -> Option<usize> {
        self.skip
    }

    pub fn includes(&self) -> &[String] {
        &self.include
    }

    pub fn keys(&self) -> &[String] {
        &self.keys
    }
}

/// 所有键都以 `$` 开头的对象视为操作符条件
pub(crate) fn is_operator_object(value: &Value) -> bool {
    match value {
        Value::Object(map) => !map.is_empty() && map.keys().all(|k| k.starts_with('$')),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn operators_on_same_key_are_merged() {
        let q = Query::new("_User")
            .starts_with("username", "bo.b")
            .exists("username")
            .not_equal_to("objectId", "me")
            .limit(10);
        assert_eq!(
            q.where_clause(),
            json!({
                "username": {"$regex": "^bo\\.b", "$exists": true},
                "objectId": {"$ne": "me"}
            })
        );
        assert_eq!(q.limit_value(), Some(10));
    }

    #[test]
    fn order_param_joins_keys() {
        let q = Query::new("Review").descending("likes").ascending("createdAt");
        assert_eq!(q.order_param().as_deref(), Some("-likes,createdAt"));
        assert_eq!(Query::new("Review").order_param(), None);
    }

    #[test]
    fn or_branches_and_pointers() {
        let q = Query::new("Book")
            .equal_to_pointer("user", &Pointer::user("u1"))
            .or(Query::new("Book").contains_ignore_case("title", "dune"))
            .or(Query::new("Book").contains_ignore_case("author", "herbert"));
        let clause = q.where_clause();
        assert_eq!(clause["user"]["objectId"], "u1");
        assert_eq!(clause["$or"].as_array().map(Vec::len), Some(2));
        assert_eq!(clause["$or"][0]["title"], json!({"$regex": "dune", "$options": "i"}));
    }
}

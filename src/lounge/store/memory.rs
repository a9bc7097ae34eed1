//! 进程内对象存储
//!
//! 与 REST 实现相同的查询语义（点号路径、指针相等、数组包含、`$or`、正则、
//! 排序、include、计数、`Increment`），用于单元测试和 CLI 的离线模式。
//! 不做 ACL 校验。

use crate::lounge::error::LoungeError;
use crate::lounge::store::query::{is_operator_object, SortKey};
use crate::lounge::store::{BatchOp, BatchResult, ObjectStore, Query};
use crate::lounge::types::{record_str, Record, USER_CLASS};
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Duration, SecondsFormat, Utc};
use serde_json::{Map, Value};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Mutex;
use tracing::debug;
use uuid::Uuid;

#[derive(Default)]
struct MemoryState {
    classes: HashMap<String, Vec<Record>>,
    /// 会话令牌 -> 用户 ID
    sessions: HashMap<String, String>,
    /// 用户 ID -> 密码
    passwords: HashMap<String, String>,
    last_timestamp: Option<DateTime<Utc>>,
    writes: u64,
}

impl MemoryState {
    /// 单调递增的时间戳，保证同一毫秒内创建的对象仍有确定的先后顺序
    fn next_timestamp(&mut self) -> String {
        let now = Utc::now();
        let ts = match self.last_timestamp {
            Some(last) if now <= last => last + Duration::milliseconds(1),
            _ => now,
        };
        self.last_timestamp = Some(ts);
        ts.to_rfc3339_opts(SecondsFormat::Millis, true)
    }

    fn insert(&mut self, class_name: &str, mut fields: Record) -> Record {
        let object_id = new_object_id();
        let now = self.next_timestamp();
        apply_operations(&mut fields, &Record::new());
        fields.insert("objectId".into(), Value::String(object_id));
        fields.insert("createdAt".into(), Value::String(now.clone()));
        fields.insert("updatedAt".into(), Value::String(now));
        self.classes
            .entry(class_name.to_string())
            .or_default()
            .push(fields.clone());
        self.writes += 1;
        fields
    }

    fn find_index(&self, class_name: &str, object_id: &str) -> Option<usize> {
        self.classes.get(class_name).and_then(|rows| {
            rows.iter()
                .position(|r| record_str(r, "objectId") == Some(object_id))
        })
    }

    fn update(&mut self, class_name: &str, object_id: &str, fields: Record) -> Result<Record> {
        let index = self
            .find_index(class_name, object_id)
            .ok_or_else(|| LoungeError::NotFound(format!("{class_name} {object_id}")))?;
        let now = self.next_timestamp();
        let rows = self.classes.entry(class_name.to_string()).or_default();
        let row = &mut rows[index];

        let mut changed = Record::new();
        for (key, value) in fields {
            let resolved = resolve_operation(row.get(&key), value);
            row.insert(key.clone(), resolved.clone());
            changed.insert(key, resolved);
        }
        row.insert("updatedAt".into(), Value::String(now.clone()));
        changed.insert("updatedAt".into(), Value::String(now));
        self.writes += 1;
        Ok(changed)
    }

    fn destroy(&mut self, class_name: &str, object_id: &str) -> Result<()> {
        let index = self
            .find_index(class_name, object_id)
            .ok_or_else(|| LoungeError::NotFound(format!("{class_name} {object_id}")))?;
        if let Some(rows) = self.classes.get_mut(class_name) {
            rows.remove(index);
        }
        self.writes += 1;
        Ok(())
    }

    fn lookup(&self, class_name: &str, object_id: &str) -> Option<Record> {
        self.find_index(class_name, object_id)
            .and_then(|i| self.classes.get(class_name).map(|rows| rows[i].clone()))
    }

    fn run_query(&self, query: &Query) -> Result<Vec<Record>> {
        let clause = query.where_clause();
        let clause = clause.as_object().cloned().unwrap_or_default();

        let mut rows = Vec::new();
        for row in self.classes.get(query.class_name()).into_iter().flatten() {
            if matches_clause(row, &clause)? {
                rows.push(row.clone());
            }
        }
        sort_rows(&mut rows, query.order());
        Ok(rows)
    }

    fn expand_includes(&self, class_name: &str, mut row: Record, include: &[String]) -> Record {
        for key in include {
            let Some(Value::Object(pointer)) = row.get(key) else {
                continue;
            };
            let (Some(target_class), Some(target_id)) = (
                pointer.get("className").and_then(Value::as_str),
                pointer.get("objectId").and_then(Value::as_str),
            ) else {
                continue;
            };
            if let Some(mut target) = self.lookup(target_class, target_id) {
                target.insert("__type".into(), Value::String("Object".into()));
                target.insert("className".into(), Value::String(target_class.to_string()));
                row.insert(key.clone(), Value::Object(target));
            }
        }
        row.insert("className".into(), Value::String(class_name.to_string()));
        row
    }
}

/// 进程内对象存储
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 已执行的写操作次数（创建、更新、删除）
    pub fn write_count(&self) -> u64 {
        self.with_state(|s| s.writes)
    }

    /// 某个类当前的全部记录
    pub fn records(&self, class_name: &str) -> Vec<Record> {
        self.with_state(|s| s.classes.get(class_name).cloned().unwrap_or_default())
    }

    /// 直接写入一条记录（用于预置数据）
    pub fn seed(&self, class_name: &str, fields: Record) -> Record {
        self.with_state(|s| s.insert(class_name, fields))
    }

    fn with_state<T>(&self, f: impl FnOnce(&mut MemoryState) -> T) -> T {
        let mut guard = match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        f(&mut guard)
    }

    fn user_for_token(state: &MemoryState, session_token: &str) -> Result<Record> {
        let user_id = state.sessions.get(session_token).ok_or(LoungeError::Store {
            code: 209,
            message: "Invalid session token".into(),
        })?;
        state
            .lookup(USER_CLASS, user_id)
            .ok_or_else(|| LoungeError::NotFound(format!("_User {user_id}")).into())
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn find(&self, query: &Query, _session_token: Option<&str>) -> Result<Vec<Record>> {
        self.with_state(|s| {
            let rows = s.run_query(query)?;
            let skip = query.skip_value().unwrap_or(0);
            let limit = query.limit_value().unwrap_or(100);
            debug!("[MemoryStore] 查询 {} 命中 {} 条", query.class_name(), rows.len());
            Ok(rows
                .into_iter()
                .skip(skip)
                .take(limit)
                .map(|row| s.expand_includes(query.class_name(), row, query.includes()))
                .collect())
        })
    }

    async fn count(&self, query: &Query, _session_token: Option<&str>) -> Result<u64> {
        self.with_state(|s| Ok(s.run_query(query)?.len() as u64))
    }

    async fn get(
        &self,
        class_name: &str,
        object_id: &str,
        include: &[&str],
        _session_token: Option<&str>,
    ) -> Result<Record> {
        self.with_state(|s| {
            let row = s
                .lookup(class_name, object_id)
                .ok_or_else(|| LoungeError::NotFound(format!("{class_name} {object_id}")))?;
            let include: Vec<String> = include.iter().map(|k| k.to_string()).collect();
            Ok(s.expand_includes(class_name, row, &include))
        })
    }

    async fn create(
        &self,
        class_name: &str,
        fields: Record,
        _session_token: Option<&str>,
    ) -> Result<Record> {
        Ok(self.with_state(|s| {
            let row = s.insert(class_name, fields);
            s.expand_includes(class_name, row, &[])
        }))
    }

    async fn update(
        &self,
        class_name: &str,
        object_id: &str,
        fields: Record,
        _session_token: Option<&str>,
    ) -> Result<Record> {
        self.with_state(|s| s.update(class_name, object_id, fields))
    }

    async fn destroy(
        &self,
        class_name: &str,
        object_id: &str,
        _session_token: Option<&str>,
    ) -> Result<()> {
        self.with_state(|s| s.destroy(class_name, object_id))
    }

    async fn batch(
        &self,
        ops: Vec<BatchOp>,
        _session_token: Option<&str>,
    ) -> Result<Vec<BatchResult>> {
        Ok(self.with_state(|s| {
            ops.into_iter()
                .map(|op| {
                    let outcome = match op {
                        BatchOp::Create { class_name, fields } => Ok(s.insert(&class_name, fields)),
                        BatchOp::Update {
                            class_name,
                            object_id,
                            fields,
                        } => s.update(&class_name, &object_id, fields),
                        BatchOp::Destroy {
                            class_name,
                            object_id,
                        } => s.destroy(&class_name, &object_id).map(|_| Record::new()),
                    };
                    match outcome {
                        Ok(record) => BatchResult::Success(record),
                        Err(e) => BatchResult::Failure {
                            code: 101,
                            message: e.to_string(),
                        },
                    }
                })
                .collect()
        }))
    }

    async fn sign_up(&self, mut fields: Record) -> Result<Record> {
        self.with_state(|s| {
            let username = record_str(&fields, "username").unwrap_or_default().to_string();
            let taken = s
                .classes
                .get(USER_CLASS)
                .into_iter()
                .flatten()
                .any(|u| record_str(u, "username") == Some(username.as_str()));
            if taken {
                return Err(LoungeError::Store {
                    code: 202,
                    message: "Account already exists for this username.".into(),
                }
                .into());
            }
            let password = match fields.remove("password") {
                Some(Value::String(p)) => p,
                _ => String::new(),
            };
            fields.remove("ACL");
            let mut user = s.insert(USER_CLASS, fields);
            let user_id = record_str(&user, "objectId").unwrap_or_default().to_string();
            let token = format!("r:{}", Uuid::new_v4().simple());
            s.passwords.insert(user_id.clone(), password);
            s.sessions.insert(token.clone(), user_id);
            user.insert("sessionToken".into(), Value::String(token));
            Ok(user)
        })
    }

    async fn log_in(&self, identifier: &str, password: &str) -> Result<Record> {
        self.with_state(|s| {
            let field = if identifier.contains('@') { "email" } else { "username" };
            let user = s
                .classes
                .get(USER_CLASS)
                .into_iter()
                .flatten()
                .find(|u| record_str(u, field) == Some(identifier))
                .cloned();
            let Some(mut user) = user else {
                return Err(invalid_credentials());
            };
            let user_id = record_str(&user, "objectId").unwrap_or_default().to_string();
            if s.passwords.get(&user_id).map(String::as_str) != Some(password) {
                return Err(invalid_credentials());
            }
            let token = format!("r:{}", Uuid::new_v4().simple());
            s.sessions.insert(token.clone(), user_id);
            user.insert("sessionToken".into(), Value::String(token));
            Ok(user)
        })
    }

    async fn current_user(&self, session_token: &str) -> Result<Record> {
        self.with_state(|s| Self::user_for_token(s, session_token))
    }

    async fn log_out(&self, session_token: &str) -> Result<()> {
        self.with_state(|s| {
            s.sessions.remove(session_token);
        });
        Ok(())
    }
}

fn invalid_credentials() -> anyhow::Error {
    LoungeError::Store {
        code: 101,
        message: "Invalid username/password.".into(),
    }
    .into()
}

fn new_object_id() -> String {
    Uuid::new_v4().simple().to_string()[..10].to_string()
}

/// 创建时也允许 `Increment` 操作
fn apply_operations(fields: &mut Record, existing: &Record) {
    let keys: Vec<String> = fields.keys().cloned().collect();
    for key in keys {
        if let Some(value) = fields.remove(&key) {
            let resolved = resolve_operation(existing.get(&key), value);
            fields.insert(key, resolved);
        }
    }
}

fn resolve_operation(current: Option<&Value>, value: Value) -> Value {
    let Value::Object(ref op) = value else {
        return value;
    };
    match op.get("__op").and_then(Value::as_str) {
        Some("Increment") => {
            let amount = op.get("amount").and_then(Value::as_i64).unwrap_or(1);
            let base = current.and_then(Value::as_i64).unwrap_or(0);
            Value::from(base + amount)
        }
        Some("Delete") => Value::Null,
        _ => value,
    }
}

/// 点号路径取值，例如 `book.bookId`
fn lookup_path<'a>(record: &'a Record, path: &str) -> Option<&'a Value> {
    let mut parts = path.split('.');
    let mut current = record.get(parts.next()?)?;
    for part in parts {
        current = current.as_object()?.get(part)?;
    }
    Some(current)
}

fn pointer_key(value: &Value) -> Option<(&str, &str)> {
    let map = value.as_object()?;
    match map.get("__type").and_then(Value::as_str) {
        Some("Pointer") | Some("Object") => Some((
            map.get("className")?.as_str()?,
            map.get("objectId")?.as_str()?,
        )),
        _ => None,
    }
}

fn values_equal(actual: Option<&Value>, expected: &Value) -> bool {
    let Some(actual) = actual else {
        return expected.is_null();
    };
    if let (Some(a), Some(b)) = (pointer_key(actual), pointer_key(expected)) {
        return a == b;
    }
    // 数组字段：包含即匹配
    if let (Value::Array(items), false) = (actual, expected.is_array()) {
        return items.iter().any(|item| item == expected);
    }
    actual == expected
}

fn matches_clause(record: &Record, clause: &Map<String, Value>) -> Result<bool> {
    for (key, expected) in clause {
        if key == "$or" {
            let branches = expected.as_array().cloned().unwrap_or_default();
            let mut any = false;
            for branch in branches {
                if matches_clause(record, &branch.as_object().cloned().unwrap_or_default())? {
                    any = true;
                    break;
                }
            }
            if !any {
                return Ok(false);
            }
            continue;
        }

        let actual = lookup_path(record, key);
        let ok = if is_operator_object(expected) {
            matches_operators(actual, expected.as_object().cloned().unwrap_or_default())?
        } else {
            values_equal(actual, expected)
        };
        if !ok {
            return Ok(false);
        }
    }
    Ok(true)
}

fn matches_operators(actual: Option<&Value>, ops: Map<String, Value>) -> Result<bool> {
    let options = ops.get("$options").and_then(Value::as_str).unwrap_or("");
    for (op, operand) in &ops {
        let ok = match op.as_str() {
            "$ne" => !values_equal(actual, operand),
            "$in" => operand
                .as_array()
                .map(|items| items.iter().any(|item| values_equal(actual, item)))
                .unwrap_or(false),
            "$nin" => operand
                .as_array()
                .map(|items| !items.iter().any(|item| values_equal(actual, item)))
                .unwrap_or(true),
            "$exists" => {
                let present = actual.map(|v| !v.is_null()).unwrap_or(false);
                present == operand.as_bool().unwrap_or(true)
            }
            "$regex" => {
                let pattern = operand.as_str().unwrap_or_default();
                let re = regex::RegexBuilder::new(pattern)
                    .case_insensitive(options.contains('i'))
                    .build()
                    .map_err(|e| LoungeError::Store {
                        code: 102,
                        message: format!("Invalid regular expression: {e}"),
                    })?;
                actual
                    .and_then(Value::as_str)
                    .map(|s| re.is_match(s))
                    .unwrap_or(false)
            }
            "$options" => true,
            "$gt" | "$gte" | "$lt" | "$lte" => {
                let Some(actual) = actual else {
                    return Ok(false);
                };
                let ord = compare_values(Some(actual), Some(operand));
                match op.as_str() {
                    "$gt" => ord == Ordering::Greater,
                    "$gte" => ord != Ordering::Less,
                    "$lt" => ord == Ordering::Less,
                    _ => ord != Ordering::Greater,
                }
            }
            other => {
                return Err(LoungeError::Store {
                    code: 102,
                    message: format!("Unsupported query operator {other}"),
                }
                .into())
            }
        };
        if !ok {
            return Ok(false);
        }
    }
    Ok(true)
}

fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(Value::Number(x)), Some(Value::Number(y))) => {
            let (x, y) = (x.as_f64().unwrap_or(0.0), y.as_f64().unwrap_or(0.0));
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
        (Some(Value::Null), Some(Value::Null)) => Ordering::Equal,
        (Some(Value::Null), Some(_)) => Ordering::Less,
        (Some(_), Some(Value::Null)) => Ordering::Greater,
        _ => Ordering::Equal,
    }
}

fn sort_rows(rows: &mut [Record], order: &[SortKey]) {
    if order.is_empty() {
        return;
    }
    rows.sort_by(|a, b| {
        for key in order {
            let ord = compare_values(lookup_path(a, key.field()), lookup_path(b, key.field()));
            let ord = match key {
                SortKey::Asc(_) => ord,
                SortKey::Desc(_) => ord.reverse(),
            };
            if ord != Ordering::Equal {
                return ord;
            }
        }
        Ordering::Equal
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lounge::types::Pointer;
    use serde_json::json;

    fn record(value: Value) -> Record {
        value.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn dotted_keys_and_pointer_equality() {
        let store = MemoryStore::new();
        store.seed(
            "Review",
            record(json!({"book": {"bookId": "b1"}, "user": Pointer::user("u1").to_value(), "rating": 5})),
        );
        store.seed(
            "Review",
            record(json!({"book": {"bookId": "b2"}, "user": Pointer::user("u2").to_value(), "rating": 3})),
        );

        let by_book = Query::new("Review").equal_to("book.bookId", "b1");
        assert_eq!(store.count(&by_book, None).await.unwrap(), 1);

        let by_user = Query::new("Review").equal_to_pointer("user", &Pointer::user("u2"));
        let rows = store.find(&by_user, None).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["rating"], 3);
    }

    #[tokio::test]
    async fn ordering_limit_and_regex() {
        let store = MemoryStore::new();
        for (name, likes) in [("alice", 2), ("Albert", 9), ("bob", 5)] {
            store.seed("Item", record(json!({"name": name, "likes": likes})));
        }

        let q = Query::new("Item").descending("likes").limit(2);
        let names: Vec<String> = store
            .find(&q, None)
            .await
            .unwrap()
            .iter()
            .map(|r| record_str(r, "name").unwrap().to_string())
            .collect();
        assert_eq!(names, vec!["Albert", "bob"]);

        let prefix = Query::new("Item").starts_with("name", "al");
        assert_eq!(store.count(&prefix, None).await.unwrap(), 1);

        let insensitive = Query::new("Item").contains_ignore_case("name", "AL");
        assert_eq!(store.count(&insensitive, None).await.unwrap(), 2);

        let either = Query::new("Item")
            .or(Query::new("Item").equal_to("name", "bob"))
            .or(Query::new("Item").equal_to("likes", 2));
        assert_eq!(store.count(&either, None).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn increment_and_include() {
        let store = MemoryStore::new();
        let user = store.seed(USER_CLASS, record(json!({"username": "ada", "firstName": "Ada"})));
        let user_id = record_str(&user, "objectId").unwrap().to_string();
        let review = store.seed(
            "Review",
            record(json!({"user": Pointer::user(&user_id).to_value(), "likes": 0})),
        );
        let review_id = record_str(&review, "objectId").unwrap().to_string();

        let changed = store
            .update("Review", &review_id, record(json!({"likes": crate::lounge::types::increment(1)})), None)
            .await
            .unwrap();
        assert_eq!(changed["likes"], 1);

        let fetched = store.get("Review", &review_id, &["user"], None).await.unwrap();
        assert_eq!(fetched["likes"], 1);
        assert_eq!(fetched["user"]["firstName"], "Ada");
    }

    #[tokio::test]
    async fn created_timestamps_are_strictly_increasing() {
        let store = MemoryStore::new();
        let a = store.seed("Message", Record::new());
        let b = store.seed("Message", Record::new());
        assert!(record_str(&a, "createdAt").unwrap() < record_str(&b, "createdAt").unwrap());
    }

    #[tokio::test]
    async fn sign_up_and_log_in() {
        let store = MemoryStore::new();
        let user = store
            .sign_up(record(json!({"username": "ada", "email": "ada@example.com", "password": "pw"})))
            .await
            .unwrap();
        assert!(record_str(&user, "sessionToken").is_some());
        assert!(!user.contains_key("password"));

        let duplicate = store
            .sign_up(record(json!({"username": "ada", "password": "pw2"})))
            .await;
        assert!(duplicate.is_err());

        let by_email = store.log_in("ada@example.com", "pw").await.unwrap();
        let token = record_str(&by_email, "sessionToken").unwrap().to_string();
        let me = store.current_user(&token).await.unwrap();
        assert_eq!(record_str(&me, "username"), Some("ada"));

        assert!(store.log_in("ada", "wrong").await.is_err());
        store.log_out(&token).await.unwrap();
        assert!(store.current_user(&token).await.is_err());
    }
}

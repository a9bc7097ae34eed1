use crate::lounge::error::{LoungeError, OBJECT_NOT_FOUND};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, error};

/// 存储对象的原始 JSON 表示（字段名与 BaaS 一致）
pub type Record = Map<String, Value>;

/// 用户类名
pub const USER_CLASS: &str = "_User";

/// 反序列化数组字段，处理 null 值
pub(crate) fn deserialize_vec_or_null<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    let opt = Option::<Vec<T>>::deserialize(deserializer)?;
    Ok(opt.unwrap_or_default())
}

/// 反序列化字符串字段，null 视为空字符串
pub(crate) fn deserialize_string_or_null<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let opt = Option::<String>::deserialize(deserializer)?;
    Ok(opt.unwrap_or_default())
}

/// 对象指针
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pointer {
    #[serde(rename = "__type")]
    pub kind: String,
    #[serde(rename = "className")]
    pub class_name: String,
    #[serde(rename = "objectId")]
    pub object_id: String,
}

impl Pointer {
    pub fn new(class_name: &str, object_id: &str) -> Self {
        Self {
            kind: "Pointer".to_string(),
            class_name: class_name.to_string(),
            object_id: object_id.to_string(),
        }
    }

    pub fn user(object_id: &str) -> Self {
        Self::new(USER_CLASS, object_id)
    }

    pub fn to_value(&self) -> Value {
        serde_json::json!({
            "__type": "Pointer",
            "className": self.class_name,
            "objectId": self.object_id,
        })
    }
}

/// 原子自增操作
pub fn increment(amount: i64) -> Value {
    serde_json::json!({ "__op": "Increment", "amount": amount })
}

/// 查询响应 `{"results": [...], "count": n}`
#[derive(Debug, Deserialize)]
pub struct QueryResponse {
    #[serde(default, deserialize_with = "deserialize_vec_or_null")]
    pub results: Vec<Record>,
    #[serde(default)]
    pub count: Option<u64>,
}

/// BaaS 错误响应 `{"code": 101, "error": "..."}`
#[derive(Debug, Deserialize)]
pub struct ParseErrorBody {
    pub code: i64,
    #[serde(default)]
    pub error: String,
}

impl ParseErrorBody {
    pub fn into_error(self) -> LoungeError {
        if self.code == OBJECT_NOT_FOUND {
            LoungeError::NotFound(self.error)
        } else {
            LoungeError::Store {
                code: self.code,
                message: self.error,
            }
        }
    }
}

/// 批量操作中单个请求的结果
#[derive(Debug, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BatchItemResponse {
    Success(Record),
    Error(ParseErrorBody),
}

/// 通用 HTTP 响应处理：检查状态码并把 JSON body 反序列化为 `T`
///
/// 非 2xx 时优先解析 BaaS 错误体，否则返回原始 body。
pub async fn handle_http_response<T: DeserializeOwned>(
    response: reqwest::Response,
    operation_name: &str,
) -> anyhow::Result<T> {
    use anyhow::Context;

    let status = response.status();

    // 读取 body bytes（只能读取一次）
    let body_bytes = response.bytes().await.context("读取响应 body 失败")?;
    let body_str = String::from_utf8_lossy(&body_bytes);
    debug!("[HTTP] {}响应 Body: {}", operation_name, body_str);

    if !status.is_success() {
        error!(
            "[HTTP] {}请求失败，HTTP状态: {}, 响应: {}",
            operation_name, status, body_str
        );
        if let Ok(body) = serde_json::from_slice::<ParseErrorBody>(&body_bytes) {
            return Err(body.into_error().into());
        }
        return Err(LoungeError::Http {
            status: status.as_u16(),
            body: body_str.into_owned(),
        }
        .into());
    }
    debug!("[HTTP] {}请求成功，HTTP状态: {}", operation_name, status);

    serde_json::from_slice(&body_bytes).map_err(|e| {
        error!(
            "[HTTP] {}反序列化失败: {:?}\n原始响应: {}",
            operation_name, e, body_str
        );
        anyhow::anyhow!("反序列化响应失败: {:?}", e)
    })
}

/// 把存储对象投影为业务模型
pub fn decode<T: DeserializeOwned>(record: Record) -> anyhow::Result<T> {
    let class = record
        .get("className")
        .and_then(Value::as_str)
        .unwrap_or("object")
        .to_string();
    serde_json::from_value(Value::Object(record))
        .map_err(|e| anyhow::anyhow!("解析 {} 记录失败: {}", class, e))
}

pub fn decode_all<T: DeserializeOwned>(records: Vec<Record>) -> anyhow::Result<Vec<T>> {
    records.into_iter().map(decode).collect()
}

/// `json!` 对象转为记录，非对象时为空记录
pub fn to_record(value: Value) -> Record {
    match value {
        Value::Object(map) => map,
        _ => Record::new(),
    }
}

/// 读取记录中的字符串字段
pub fn record_str<'a>(record: &'a Record, key: &str) -> Option<&'a str> {
    record.get(key).and_then(Value::as_str)
}

/// 读取记录的 objectId
pub fn object_id(record: &Record) -> anyhow::Result<String> {
    record_str(record, "objectId")
        .map(str::to_string)
        .ok_or_else(|| anyhow::anyhow!("响应中缺少 objectId 字段"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pointer_serializes_as_wire_pointer() {
        let value = Pointer::user("u1").to_value();
        assert_eq!(
            value,
            serde_json::json!({"__type": "Pointer", "className": "_User", "objectId": "u1"})
        );
        let back: Pointer = serde_json::from_value(value).unwrap();
        assert_eq!(back, Pointer::user("u1"));
    }

    #[test]
    fn not_found_code_maps_to_not_found() {
        let body: ParseErrorBody =
            serde_json::from_str(r#"{"code":101,"error":"Object not found."}"#).unwrap();
        assert!(matches!(body.into_error(), LoungeError::NotFound(_)));

        let body: ParseErrorBody =
            serde_json::from_str(r#"{"code":202,"error":"Account already exists"}"#).unwrap();
        assert!(matches!(body.into_error(), LoungeError::Store { code: 202, .. }));
    }

    #[test]
    fn batch_items_distinguish_success_and_error() {
        let items: Vec<BatchItemResponse> = serde_json::from_str(
            r#"[{"success":{"objectId":"a1","createdAt":"2024-01-01T00:00:00.000Z"}},
                {"error":{"code":101,"error":"Object not found."}}]"#,
        )
        .unwrap();
        assert!(matches!(&items[0], BatchItemResponse::Success(r) if record_str(r, "objectId") == Some("a1")));
        assert!(matches!(&items[1], BatchItemResponse::Error(e) if e.code == 101));
    }
}

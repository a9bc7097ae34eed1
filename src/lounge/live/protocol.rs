//! LiveQuery 线上消息格式（JSON 文本帧，`op` 字段区分类型）

use crate::lounge::types::Record;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// 订阅的查询条件
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionQuery {
    pub class_name: String,
    #[serde(rename = "where")]
    pub where_clause: Value,
}

/// 客户端发送的消息
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum ClientOp {
    #[serde(rename_all = "camelCase")]
    Connect {
        application_id: String,
        client_key: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        session_token: Option<String>,
        installation_id: String,
    },
    #[serde(rename_all = "camelCase")]
    Subscribe {
        request_id: u64,
        query: SubscriptionQuery,
        #[serde(skip_serializing_if = "Option::is_none")]
        session_token: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    Unsubscribe { request_id: u64 },
}

/// 对象事件的负载
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectEvent {
    pub request_id: u64,
    pub object: Record,
    #[serde(default)]
    pub original: Option<Record>,
}

/// 服务端推送的消息
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum ServerOp {
    #[serde(rename_all = "camelCase")]
    Connected {
        #[serde(default)]
        client_id: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    Subscribed { request_id: u64 },
    #[serde(rename_all = "camelCase")]
    Unsubscribed { request_id: u64 },
    Create(ObjectEvent),
    Update(ObjectEvent),
    Delete(ObjectEvent),
    Enter(ObjectEvent),
    Leave(ObjectEvent),
    Error {
        #[serde(default)]
        code: Option<i64>,
        #[serde(default)]
        error: String,
        #[serde(default)]
        reconnect: bool,
    },
    #[serde(other)]
    Unknown,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn client_ops_use_camel_case_fields() {
        let op = ClientOp::Subscribe {
            request_id: 1,
            query: SubscriptionQuery {
                class_name: "Message".into(),
                where_clause: json!({"clubId": "club123"}),
            },
            session_token: None,
        };
        assert_eq!(
            serde_json::to_value(&op).unwrap(),
            json!({"op": "subscribe", "requestId": 1,
                   "query": {"className": "Message", "where": {"clubId": "club123"}}})
        );

        let connect = ClientOp::Connect {
            application_id: "app".into(),
            client_key: "key".into(),
            session_token: Some("r:1".into()),
            installation_id: "inst".into(),
        };
        let value = serde_json::to_value(&connect).unwrap();
        assert_eq!(value["op"], "connect");
        assert_eq!(value["applicationId"], "app");
        assert_eq!(value["sessionToken"], "r:1");
    }

    #[test]
    fn server_ops_parse() {
        let op: ServerOp = serde_json::from_str(
            r#"{"op":"create","clientId":"c1","requestId":1,"object":{"objectId":"m1","text":"hi"}}"#,
        )
        .unwrap();
        assert!(matches!(op, ServerOp::Create(ref e) if e.object["objectId"] == "m1"));

        let op: ServerOp =
            serde_json::from_str(r#"{"op":"error","code":1,"error":"Invalid key","reconnect":false}"#).unwrap();
        assert!(matches!(op, ServerOp::Error { code: Some(1), .. }));

        let op: ServerOp = serde_json::from_str(r#"{"op":"somethingNew"}"#).unwrap();
        assert_eq!(op, ServerOp::Unknown);
    }
}

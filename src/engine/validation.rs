// ==========================================
// 报名与事项审批核心 - 事项载荷校验
// ==========================================
// 按事项类型校验必填字段；priority / notes 从载荷中剥离为独立字段
// 编辑时对合并后的载荷整体重新校验
// ==========================================

use crate::domain::types::{Priority, ProcedureKind};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

/// 单个字段的校验问题
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldViolation {
    pub field: String,
    pub reason: String,
}

impl FieldViolation {
    fn new(field: &str, reason: &str) -> Self {
        Self {
            field: field.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// 校验通过的提交内容
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedSubmission {
    /// 去掉 priority / notes 后的业务载荷
    pub payload: Map<String, JsonValue>,
    /// 载荷中给出的优先级（未给出为 None）
    pub priority: Option<Priority>,
    pub notes: Option<String>,
    pub origin_region: Option<String>,
}

const PRIORITY_KEY: &str = "priority";
const NOTES_KEY: &str = "notes";
const ORIGIN_REGION_KEY: &str = "origin_region";

/// 各类型的必填文本字段
fn required_text_fields(kind: ProcedureKind) -> &'static [&'static str] {
    match kind {
        ProcedureKind::SuppliesRequest => &["item_type", ORIGIN_REGION_KEY],
        ProcedureKind::TechnicalRequest => &["subject", "description", ORIGIN_REGION_KEY],
        ProcedureKind::ProgramEnrollment => &["pool_id", "motivation"],
        ProcedureKind::CertificateRequest => &["certificate_type", "pool_id"],
    }
}

/// 校验并规整提交载荷
///
/// # 返回
/// - Ok(NormalizedSubmission)
/// - Err(violations): 全部问题一次性返回（按字段名排序）
pub fn normalize_submission(
    kind: ProcedureKind,
    raw: &Map<String, JsonValue>,
) -> Result<NormalizedSubmission, Vec<FieldViolation>> {
    let mut violations = Vec::new();
    let mut payload = raw.clone();

    for field in required_text_fields(kind) {
        match payload.get(*field) {
            Some(JsonValue::String(s)) if !s.trim().is_empty() => {}
            Some(JsonValue::String(_)) | None | Some(JsonValue::Null) => {
                violations.push(FieldViolation::new(field, "必填字段缺失或为空"))
            }
            Some(_) => violations.push(FieldViolation::new(field, "必须为字符串")),
        }
    }

    if kind == ProcedureKind::SuppliesRequest {
        match payload.get("quantity").map(positive_integer) {
            Some(Some(_)) => {}
            Some(None) => violations.push(FieldViolation::new("quantity", "必须为正整数")),
            None => violations.push(FieldViolation::new("quantity", "必填字段缺失或为空")),
        }
    }

    let priority = match payload.remove(PRIORITY_KEY) {
        None | Some(JsonValue::Null) => None,
        Some(JsonValue::String(s)) => match Priority::parse(&s) {
            Some(p) => Some(p),
            None => {
                violations.push(FieldViolation::new(PRIORITY_KEY, "取值必须为 low / medium / high"));
                None
            }
        },
        Some(_) => {
            violations.push(FieldViolation::new(PRIORITY_KEY, "必须为字符串"));
            None
        }
    };

    let notes = match payload.remove(NOTES_KEY) {
        None | Some(JsonValue::Null) => None,
        Some(JsonValue::String(s)) => Some(s),
        Some(_) => {
            violations.push(FieldViolation::new(NOTES_KEY, "必须为字符串"));
            None
        }
    };

    let origin_region = payload
        .get(ORIGIN_REGION_KEY)
        .and_then(JsonValue::as_str)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty());

    if !violations.is_empty() {
        violations.sort_by(|a, b| a.field.cmp(&b.field));
        return Err(violations);
    }

    Ok(NormalizedSubmission {
        payload,
        priority,
        notes,
        origin_region,
    })
}

/// 浅合并：patch 中的键覆盖 base，值为 null 的键被删除
pub fn merge_payload(
    base: &Map<String, JsonValue>,
    patch: &Map<String, JsonValue>,
) -> Map<String, JsonValue> {
    let mut merged = base.clone();
    for (key, value) in patch {
        if value.is_null() {
            merged.remove(key);
        } else {
            merged.insert(key.clone(), value.clone());
        }
    }
    merged
}

/// 校验问题拼成一行文本（用于错误消息）
pub fn describe_violations(violations: &[FieldViolation]) -> String {
    violations
        .iter()
        .map(|v| format!("{}: {}", v.field, v.reason))
        .collect::<Vec<_>>()
        .join("; ")
}

fn positive_integer(value: &JsonValue) -> Option<u64> {
    match value {
        JsonValue::Number(n) => n.as_u64().filter(|v| *v > 0),
        JsonValue::String(s) => s.trim().parse::<u64>().ok().filter(|v| *v > 0),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn as_map(value: JsonValue) -> Map<String, JsonValue> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_supplies_request_ok_and_strips_meta_fields() {
        let raw = as_map(json!({
            "item_type": "seeds",
            "quantity": 10,
            "origin_region": " north ",
            "priority": "high",
            "notes": "urgent"
        }));

        let normalized = normalize_submission(ProcedureKind::SuppliesRequest, &raw).unwrap();
        assert_eq!(normalized.priority, Some(Priority::High));
        assert_eq!(normalized.notes.as_deref(), Some("urgent"));
        assert_eq!(normalized.origin_region.as_deref(), Some("north"));
        assert!(!normalized.payload.contains_key("priority"));
        assert!(!normalized.payload.contains_key("notes"));
    }

    #[test]
    fn test_supplies_request_rejects_bad_quantity() {
        for quantity in [json!(0), json!(-3), json!(1.5), json!("abc")] {
            let raw = as_map(json!({
                "item_type": "seeds",
                "quantity": quantity,
                "origin_region": "north"
            }));
            let violations = normalize_submission(ProcedureKind::SuppliesRequest, &raw).unwrap_err();
            assert_eq!(violations.len(), 1);
            assert_eq!(violations[0].field, "quantity");
        }
    }

    #[test]
    fn test_missing_fields_are_all_reported() {
        let raw = as_map(json!({ "subject": "  ", "priority": "urgent" }));
        let violations = normalize_submission(ProcedureKind::TechnicalRequest, &raw).unwrap_err();
        let fields: Vec<_> = violations.iter().map(|v| v.field.as_str()).collect();
        assert_eq!(fields, vec!["description", "origin_region", "priority", "subject"]);
    }

    #[test]
    fn test_certificate_request_needs_pool() {
        let raw = as_map(json!({ "certificate_type": "welding" }));
        let violations = normalize_submission(ProcedureKind::CertificateRequest, &raw).unwrap_err();
        assert_eq!(violations[0].field, "pool_id");
        assert!(describe_violations(&violations).contains("pool_id"));
    }

    #[test]
    fn test_merge_payload_overrides_and_removes() {
        let base = as_map(json!({ "a": 1, "b": 2 }));
        let patch = as_map(json!({ "b": 3, "a": null, "c": "x" }));
        let merged = merge_payload(&base, &patch);
        assert_eq!(JsonValue::Object(merged), json!({ "b": 3, "c": "x" }));
    }
}

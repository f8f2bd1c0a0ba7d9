use super::types::Request;

/// String param: trimmed; absent, null or blank all come back None, so
/// the same accessor serves required and optional fields.
pub fn str_param(req: &Request, key: &str) -> Option<String> {
    let v = req.params.get(key)?.as_str()?.trim().to_string();
    if v.is_empty() {
        None
    } else {
        Some(v)
    }
}

pub fn f64_param(req: &Request, key: &str) -> Option<f64> {
    req.params.get(key)?.as_f64()
}

pub fn i64_param(req: &Request, key: &str) -> Option<i64> {
    req.params.get(key)?.as_i64()
}

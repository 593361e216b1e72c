use serde_json::Value;

/// Key under which the model is asked to return its plan.
pub const PLAN_KEY: &str = "actionPlan";

pub fn extract_json_object(raw: &str) -> Option<String> {
    extract_balanced(raw, '{', '}')
}

pub fn extract_json_array(raw: &str) -> Option<String> {
    extract_balanced(raw, '[', ']')
}

/// Plan array from model output: `{"actionPlan": [...]}` first, a bare array second.
pub fn extract_plan_payload(raw: &str) -> Option<Value> {
    if let Some(object) = extract_json_object(raw) {
        if let Ok(Value::Object(mut map)) = serde_json::from_str::<Value>(&object) {
            if let Some(plan @ Value::Array(_)) = map.remove(PLAN_KEY) {
                return Some(plan);
            }
        }
    }
    extract_json_array(raw)
        .and_then(|array| serde_json::from_str::<Value>(&array).ok())
        .filter(Value::is_array)
}

fn extract_balanced(raw: &str, open: char, close: char) -> Option<String> {
    if raw.trim_start().starts_with(open) {
        return Some(trim_symmetric(raw));
    }

    let fence = "```";
    if let Some(start) = raw.find(fence) {
        let after_fence = &raw[start + fence.len()..];
        let after_lang = after_fence.trim_start_matches(|c: char| c.is_alphanumeric() || c == '_');
        if let Some(end) = after_lang.find(fence) {
            let block = after_lang[..end].trim();
            if block.starts_with(open) {
                return Some(trim_symmetric(block));
            }
        }
    }

    let start = raw.find(open)?;
    let rest = &raw[start + open.len_utf8()..];
    let mut depth = 1i32;
    let mut in_string = false;
    let mut escaped = false;
    for (idx, ch) in rest.char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            c if c == open => depth += 1,
            c if c == close => {
                depth -= 1;
                if depth == 0 {
                    let mut candidate = String::from(open);
                    candidate.push_str(&rest[..=idx]);
                    return Some(trim_symmetric(&candidate));
                }
            }
            _ => {}
        }
    }
    None
}

fn trim_symmetric(value: &str) -> String {
    value.trim().trim_matches('`').trim().to_string()
}

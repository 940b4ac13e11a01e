use serde_json::Value;

/// Masks donor details, card tokens and credentials in JSON payloads for logging
pub fn sanitize_json(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut sanitized = serde_json::Map::new();
            for (key, val) in map {
                let sanitized_val = if is_sensitive_field(key) {
                    mask_value(val)
                } else {
                    sanitize_json(val)
                };
                sanitized.insert(key.clone(), sanitized_val);
            }
            Value::Object(sanitized)
        }
        Value::Array(arr) => Value::Array(arr.iter().map(sanitize_json).collect()),
        _ => value.clone(),
    }
}

fn is_sensitive_field(key: &str) -> bool {
    matches!(
        key.to_lowercase().as_str(),
        "token"
            | "transient_token_jwt"
            | "transienttokenjwt"
            | "microform_container"
            | "name"
            | "first"
            | "last"
            | "address"
            | "address_2"
            | "email"
            | "phone"
            | "phone_number"
            | "expiration_month"
            | "expiration_year"
            | "shared_secret"
            | "secret"
            | "authorization"
            | "signature"
    )
}

fn mask_value(value: &Value) -> Value {
    match value {
        Value::String(s) if s.chars().count() > 8 => {
            let chars: Vec<char> = s.chars().collect();
            let visible: String = chars[..4].iter().collect();
            let end: String = chars[chars.len() - 4..].iter().collect();
            Value::String(format!("{}****{}", visible, end))
        }
        _ => Value::String("****".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_sanitize_donation_payload() {
        let input = json!({
            "amount": "25.00",
            "email": "ada.lovelace@example.com",
            "phone": "555-0100",
            "name": {"first": "Ada", "last": "Lovelace"},
            "microform_container": {"token": "eyJraWQiOiJ6dSIsImFsZyI6IlJTMjU2In0"}
        });

        let sanitized = sanitize_json(&input);

        assert_eq!(sanitized["amount"], "25.00");
        assert_eq!(sanitized["email"], "ada.****.com");
        assert_eq!(sanitized["phone"], "****");
        assert_eq!(sanitized["name"], "****");
        assert_eq!(sanitized["microform_container"], "****");
    }

    #[test]
    fn test_sanitize_nested() {
        let input = json!({
            "data": {
                "token": "tok_1234567890",
                "direction": "General fund"
            }
        });

        let sanitized = sanitize_json(&input);
        assert_eq!(sanitized["data"]["token"], "tok_****7890");
        assert_eq!(sanitized["data"]["direction"], "General fund");
    }

    #[test]
    fn test_mask_handles_multibyte_text() {
        let masked = mask_value(&json!("Zoë Ångström-Økland"));
        assert_eq!(masked, "Zoë ****land");
    }
}

//! Lenient readers for option objects supplied as `serde_json::Value`.
//!
//! Each helper takes a JSON value, a key name, and a default. If the key is
//! missing or the value is not the expected type, the default is returned.
//! These never fail, so a demo can hand over a partial or sloppy options
//! object and still get a usable configuration.

use serde_json::Value;

/// Extracts a `usize` from `params[name]`, returning `default` if missing or wrong type.
///
/// Only succeeds if the JSON value is a non-negative integer that fits in
/// `usize`.
pub fn param_usize(params: &Value, name: &str, default: usize) -> usize {
    params
        .get(name)
        .and_then(Value::as_u64)
        .and_then(|v| usize::try_from(v).ok())
        .unwrap_or(default)
}

/// Extracts a `u32` from `params[name]`. Integers too large for `u32` yield
/// `default` rather than wrapping.
pub fn param_u32(params: &Value, name: &str, default: u32) -> u32 {
    params
        .get(name)
        .and_then(Value::as_u64)
        .and_then(|v| u32::try_from(v).ok())
        .unwrap_or(default)
}

/// Extracts a `bool` from `params[name]`, returning `default` if missing or wrong type.
pub fn param_bool(params: &Value, name: &str, default: bool) -> bool {
    params.get(name).and_then(Value::as_bool).unwrap_or(default)
}

/// Extracts a fixed-size `f32` array from `params[name]`.
///
/// The value must be a JSON array of exactly `N` numbers; anything else
/// yields `default`.
pub fn param_f32_array<const N: usize>(params: &Value, name: &str, default: [f32; N]) -> [f32; N] {
    let Some(items) = params.get(name).and_then(Value::as_array) else {
        return default;
    };
    if items.len() != N {
        return default;
    }
    let mut out = [0.0; N];
    for (slot, item) in out.iter_mut().zip(items) {
        match item.as_f64() {
            Some(v) => *slot = v as f32,
            None => return default,
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    // -- param_usize --

    #[test]
    fn param_usize_extracts_existing_integer() {
        let params = json!({"numChannels": 3});
        assert_eq!(param_usize(&params, "numChannels", 4), 3);
    }

    #[test]
    fn param_usize_returns_default_when_key_missing() {
        let params = json!({});
        assert_eq!(param_usize(&params, "numChannels", 4), 4);
    }

    #[test]
    fn param_usize_returns_default_for_float_value() {
        let params = json!({"width": 2.5});
        assert_eq!(param_usize(&params, "width", 99), 99);
    }

    #[test]
    fn param_usize_returns_default_for_negative_integer() {
        let params = json!({"width": -1});
        assert_eq!(param_usize(&params, "width", 5), 5);
    }

    #[test]
    fn param_usize_returns_default_for_null_value() {
        let params = json!({"numChannels": null});
        assert_eq!(param_usize(&params, "numChannels", 4), 4);
    }

    // -- param_u32 --

    #[test]
    fn param_u32_extracts_existing_integer() {
        let params = json!({"width": 640});
        assert_eq!(param_u32(&params, "width", 300), 640);
    }

    #[test]
    fn param_u32_returns_default_when_too_large() {
        let params = json!({"width": 4_294_967_297u64});
        assert_eq!(param_u32(&params, "width", 300), 300);
    }

    // -- param_bool --

    #[test]
    fn param_bool_extracts_true() {
        let params = json!({"isFloat": true});
        assert!(param_bool(&params, "isFloat", false));
    }

    #[test]
    fn param_bool_extracts_false() {
        let params = json!({"smooth": false});
        assert!(!param_bool(&params, "smooth", true));
    }

    #[test]
    fn param_bool_returns_default_when_key_missing() {
        let params = json!({});
        assert!(param_bool(&params, "smooth", true));
    }

    #[test]
    fn param_bool_returns_default_for_wrong_type() {
        let params = json!({"repeat": 1});
        assert!(!param_bool(&params, "repeat", false));
    }

    #[test]
    fn param_bool_returns_default_for_non_object() {
        let params = json!("not an object");
        assert!(param_bool(&params, "smooth", true));
    }

    // -- param_f32_array --

    #[test]
    fn param_f32_array_extracts_matching_length() {
        let params = json!({"clearColor": [0.1, 0.2, 0.3, 1]});
        assert_eq!(
            param_f32_array(&params, "clearColor", [0.0; 4]),
            [0.1, 0.2, 0.3, 1.0]
        );
    }

    #[test]
    fn param_f32_array_rejects_wrong_length() {
        let params = json!({"clearColor": [0.1, 0.2, 0.3]});
        assert_eq!(
            param_f32_array(&params, "clearColor", [0.0, 0.0, 0.0, 1.0]),
            [0.0, 0.0, 0.0, 1.0]
        );
    }

    #[test]
    fn param_f32_array_rejects_non_numeric_element() {
        let params = json!({"clearColor": [0.1, "red", 0.3, 1.0]});
        assert_eq!(param_f32_array(&params, "clearColor", [1.0; 4]), [1.0; 4]);
    }

    #[test]
    fn param_f32_array_returns_default_when_missing() {
        assert_eq!(param_f32_array(&json!({}), "clearColor", [0.5; 4]), [0.5; 4]);
    }
}

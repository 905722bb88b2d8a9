//! Key casing between the engine's camelCase wire keys and snake_case.
//!
//! # Design
//! The transforms are single-level: only the keys of the mapping handed in
//! are rewritten, nested mappings keep their keys. Each function consumes
//! the mapping and returns a new one, values are moved across untouched.

use serde_json::{Map, Value};

/// `symbol_key` becomes `symbolKey`. Leading, doubled and trailing
/// underscores are kept as they are.
pub fn camelize(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    let mut out = String::with_capacity(key.len());
    let mut upper_next = false;

    for (i, &c) in chars.iter().enumerate() {
        if c == '_' {
            let after_word = out.chars().last().is_some_and(|prev| prev != '_');
            let before_word = chars.get(i + 1).is_some_and(|next| next.is_ascii_alphanumeric());
            if after_word && before_word {
                upper_next = true;
                continue;
            }
        }
        if upper_next {
            out.extend(c.to_uppercase());
            upper_next = false;
        } else {
            out.push(c);
        }
    }
    out
}

/// `keyName` becomes `key_name`; `HostConfig` becomes `host_config`.
pub fn snakeify(key: &str) -> String {
    let mut out = String::with_capacity(key.len() + 4);
    for (i, c) in key.chars().enumerate() {
        if c.is_uppercase() {
            if i > 0 && !out.ends_with('_') {
                out.push('_');
            }
            out.extend(c.to_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

pub fn camelize_keys(map: Map<String, Value>) -> Map<String, Value> {
    map.into_iter().map(|(key, value)| (camelize(&key), value)).collect()
}

pub fn snakeify_keys(map: Map<String, Value>) -> Map<String, Value> {
    map.into_iter().map(|(key, value)| (snakeify(&key), value)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    #[test]
    fn camelize_rewrites_word_boundaries() {
        assert_eq!(camelize("symbol_key"), "symbolKey");
        assert_eq!(camelize("dns_search_domains"), "dnsSearchDomains");
        assert_eq!(camelize("port_80"), "port80");
        assert_eq!(camelize("Image"), "Image");
        assert_eq!(camelize("alreadyCamel"), "alreadyCamel");
    }

    #[test]
    fn camelize_keeps_stray_underscores() {
        assert_eq!(camelize("_private"), "_private");
        assert_eq!(camelize("a__b"), "a__b");
        assert_eq!(camelize("trailing_"), "trailing_");
    }

    #[test]
    fn snakeify_rewrites_capitals() {
        assert_eq!(snakeify("keyName"), "key_name");
        assert_eq!(snakeify("HostConfig"), "host_config");
        assert_eq!(snakeify("Id"), "id");
        assert_eq!(snakeify("already_snake"), "already_snake");
    }

    #[test]
    fn transforms_are_single_level() {
        let map = json!({"host_config": {"port_bindings": {}}, "count": 3});
        let Value::Object(map) = map else { unreachable!() };

        let camel = camelize_keys(map);
        assert_eq!(Value::Object(camel.clone()), json!({"hostConfig": {"port_bindings": {}}, "count": 3}));

        let snake = snakeify_keys(camel);
        assert_eq!(Value::Object(snake), json!({"host_config": {"port_bindings": {}}, "count": 3}));
    }

    fn snake_key() -> impl Strategy<Value = String> {
        "[a-z][a-z0-9]{0,6}(_[a-z0-9]{1,6}){0,3}"
    }

    proptest! {
        #[test]
        fn camelize_is_stable_after_round_trip(
            keys in prop::collection::btree_map(snake_key(), 0i64..100, 0..8)
        ) {
            let map: Map<String, Value> =
                keys.into_iter().map(|(k, v)| (k, Value::from(v))).collect();
            let once = camelize_keys(map);
            let again = camelize_keys(snakeify_keys(once.clone()));
            prop_assert_eq!(once, again);
        }

        #[test]
        fn single_boundary_keys_round_trip_exactly(
            head in "[a-z]{1,8}",
            tail in "[a-z]{1,8}",
        ) {
            let key = format!("{head}_{tail}");
            prop_assert_eq!(snakeify(&camelize(&key)), key.clone());
            let camel = camelize(&key);
            prop_assert_eq!(camelize(&snakeify(&camel)), camel);
        }
    }
}

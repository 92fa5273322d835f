//! Key casing translation between the internal and wire representations.
//!
//! Dictionary keys live in `camelCase` inside a [`Wrapper`](crate::wrapper::Wrapper)
//! and travel in `snake_case` on the wire.
//!
//! ```
//! use composable_request_core::case::{camel_cased, snake_cased};
//!
//! assert_eq!(snake_cased("userId"), "user_id");
//! assert_eq!(camel_cased("user_id"), "userId");
//! ```

/// Translate a `camelCase` key into its `snake_case` wire form.
#[must_use]
pub fn snake_cased(key: &str) -> String {
    let mut result = String::with_capacity(key.len() + 4);
    for (index, character) in key.chars().enumerate() {
        if character.is_ascii_uppercase() {
            if index > 0 {
                result.push('_');
            }
            result.push(character.to_ascii_lowercase());
        } else {
            result.push(character);
        }
    }
    result
}

/// Translate a `snake_case` wire key into its internal `camelCase` form.
///
/// Leading underscores are kept, inner runs of underscores collapse into
/// a single capitalization boundary. The first letter is always lowercase.
#[must_use]
pub fn camel_cased(key: &str) -> String {
    let mut result = String::with_capacity(key.len());
    let mut started = false;
    let mut uppercase_next = false;
    for character in key.chars() {
        if character == '_' {
            if started {
                uppercase_next = true;
            } else {
                result.push(character);
            }
            continue;
        }
        if !started {
            result.push(character.to_ascii_lowercase());
            started = true;
        } else if uppercase_next {
            result.push(character.to_ascii_uppercase());
        } else {
            result.push(character);
        }
        uppercase_next = false;
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_snake_cased() {
        assert_eq!(snake_cased("userId"), "user_id");
        assert_eq!(snake_cased("maxIdSeen"), "max_id_seen");
        assert_eq!(snake_cased("plain"), "plain");
        assert_eq!(snake_cased("Leading"), "leading");
    }

    #[test]
    fn test_camel_cased() {
        assert_eq!(camel_cased("user_id"), "userId");
        assert_eq!(camel_cased("max_id_seen"), "maxIdSeen");
        assert_eq!(camel_cased("_private_key"), "_privateKey");
        assert_eq!(camel_cased("double__gap"), "doubleGap");
        assert_eq!(camel_cased("already"), "already");
        assert_eq!(camel_cased("Name"), "name");
        assert_eq!(camel_cased("__Private_key"), "__privateKey");
    }

    proptest! {
        #[test]
        fn camel_keys_survive_the_wire(key in "_{0,2}[a-zA-Z][a-zA-Z0-9]{0,12}") {
            let internal = camel_cased(&key);
            let first = internal.trim_start_matches('_').chars().next();
            prop_assert!(first.is_some_and(|c| !c.is_ascii_uppercase()));
            prop_assert_eq!(camel_cased(&snake_cased(&internal)), internal);
        }

        #[test]
        fn snake_form_is_lowercase(key in "[a-zA-Z0-9_]{0,16}") {
            let snake = snake_cased(&key);
            prop_assert!(!snake.chars().any(|c| c.is_ascii_uppercase()));
        }
    }
}

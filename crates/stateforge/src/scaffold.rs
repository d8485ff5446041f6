//! Generates the source of a new [`StoreDefinition`](crate::store::StoreDefinition).
//!
//! `make-store shopping-cart` writes `shopping_cart.rs` declaring a
//! `ShoppingCart` store with an empty initial state.

use crate::error::{Result, StateForgeError};
use std::fs;
use std::path::{Path, PathBuf};

const STORE_TEMPLATE: &str = include_str!("templates/store.rs.tmp");

/// `shopping-cart`, `shopping_cart` and `shopping cart` all become `ShoppingCart`.
pub fn studly(name: &str) -> String {
    name.split(|c: char| !c.is_alphanumeric())
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect()
}

/// `ShoppingCart` becomes `shopping_cart`.
pub fn snake(studly_name: &str) -> String {
    let mut out = String::with_capacity(studly_name.len() + 4);
    for (i, c) in studly_name.chars().enumerate() {
        if c.is_uppercase() {
            if i > 0 {
                out.push('_');
            }
            out.extend(c.to_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

pub fn render_store(name: &str) -> String {
    STORE_TEMPLATE.replace("{{name}}", &studly(name))
}

/// Writes the store source into `dir`, creating it if needed. Never overwrites.
pub fn write_store(dir: &Path, name: &str) -> Result<PathBuf> {
    let class = studly(name);
    if class.is_empty() {
        return Err(StateForgeError::StoreClassInvalid(format!(
            "'{name}' is not a usable store name"
        )));
    }

    let path = dir.join(format!("{}.rs", snake(&class)));
    if path.exists() {
        return Err(StateForgeError::Store(format!("Store {class} already exists")));
    }

    fs::create_dir_all(dir)?;
    fs::write(&path, render_store(name))?;
    tracing::info!(path = %path.display(), store = %class, "store scaffolded");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn studly_cases_names() {
        assert_eq!(studly("shopping-cart"), "ShoppingCart");
        assert_eq!(studly("user_prefs"), "UserPrefs");
        assert_eq!(studly("counter"), "Counter");
        assert_eq!(studly("  "), "");
    }

    #[test]
    fn snake_cases_names() {
        assert_eq!(snake("ShoppingCart"), "shopping_cart");
        assert_eq!(snake("Counter"), "counter");
    }

    #[test]
    fn render_fills_in_name() {
        let source = render_store("cart");
        assert!(source.contains("pub struct Cart;"));
        assert!(source.contains("\"Cart\""));
        assert!(!source.contains("{{name}}"));
    }

    #[test]
    fn write_refuses_to_overwrite() {
        let dir = tempdir().unwrap();
        let stores = dir.path().join("stores");

        let path = write_store(&stores, "shopping-cart").unwrap();
        assert_eq!(path, stores.join("shopping_cart.rs"));

        let err = write_store(&stores, "ShoppingCart").unwrap_err();
        assert_eq!(err.to_string(), "Store error: Store ShoppingCart already exists");
    }

    #[test]
    fn write_rejects_empty_name() {
        let dir = tempdir().unwrap();
        assert!(matches!(
            write_store(dir.path(), "--"),
            Err(StateForgeError::StoreClassInvalid(_))
        ));
    }
}

//! Source of the `virtual:pwa-register` module the host app imports.

use pwa_common::Result;

use crate::assets::normalize_base;
use crate::config::RegisterType;
use crate::synth::{literal, render, WORKER_FILE};

/// Import specifier the host app uses.
pub const VIRTUAL_MODULE_ID: &str = "virtual:pwa-register";

/// File name when the module is written out instead of served virtually.
pub const REGISTER_MODULE_FILE: &str = "registerSW.js";

const REGISTER_TEMPLATE: &str = include_str!("../templates/register.js");

/// Generate `registerSW(options)` for a base path.
///
/// The worker is registered at `<base>sw.js`. `immediate` defaults to true
/// in auto-update mode.
pub fn build_register_module(base: &str, register_type: RegisterType) -> Result<String> {
    let script_url = format!("{}{WORKER_FILE}", normalize_base(base));
    Ok(render(
        REGISTER_TEMPLATE,
        &[
            ("SW_URL", literal(&script_url)?),
            ("IMMEDIATE", literal(&register_type.is_auto_update())?),
        ],
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_script_url_under_base() {
        let source = build_register_module("/app", RegisterType::Prompt).unwrap();
        assert!(source.contains("navigator.serviceWorker.register(\"/app/sw.js\")"));
        assert!(!source.contains("__"));
    }

    #[test]
    fn test_immediate_default_follows_register_type() {
        let prompt = build_register_module("/", RegisterType::Prompt).unwrap();
        let auto = build_register_module("/", RegisterType::AutoUpdate).unwrap();

        assert!(prompt.contains("immediate = false,"));
        assert!(auto.contains("immediate = true,"));
    }

    #[test]
    fn test_exports_register_function() {
        let source = build_register_module("", RegisterType::Prompt).unwrap();
        assert!(source.starts_with("export function registerSW(options = {})"));
        assert!(source.contains("onRegisterError?.(error)"));
    }
}

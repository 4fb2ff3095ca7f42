use std::collections::HashMap;
use std::env;
use std::sync::Mutex;

use once_cell::sync::Lazy;
use sysinfo::{Product, System};

use crate::error::StrataError;
use crate::value::{Value, decode_primitive};

/// A resolver callable from interpolation expressions as `${name:args}`.
///
/// Resolvers are plain function pointers: pure, fast and comparable, which
/// lets re-registration of the identical function stay a no-op. A failing
/// resolver returns a message; the interpolation engine wraps it with the
/// resolver name and the expression's tree path.
pub type ResolverFn = fn(&[String]) -> Result<Value, String>;

/// Process-wide resolver table, seeded with the built-in `env` and `sys`
/// resolvers. Registrations live for the whole process; there is no
/// unregistration, so tests should pick unique resolver names.
static REGISTRY: Lazy<Mutex<HashMap<String, ResolverFn>>> = Lazy::new(|| {
    let mut table: HashMap<String, ResolverFn> = HashMap::new();
    table.insert("env".into(), resolve_env);
    table.insert("sys".into(), resolve_sys);
    Mutex::new(table)
});

/// Register a resolver under `name`.
///
/// Fails with [`StrataError::DuplicateResolver`] if the name is already
/// bound to a different function, so a later registration can never
/// silently shadow an earlier one.
///
/// # Examples
/// ```
/// use strata_cfg::{Value, register_resolver};
///
/// fn shout(args: &[String]) -> Result<Value, String> {
///     Ok(Value::String(args.join("").to_uppercase()))
/// }
///
/// register_resolver("shout", shout).unwrap();
/// register_resolver("shout", shout).unwrap(); // identical fn: no-op
/// ```
pub fn register_resolver(name: &str, func: ResolverFn) -> Result<(), StrataError> {
    let mut table = REGISTRY.lock().expect("resolver registry poisoned");
    if let Some(existing) = table.get(name) {
        if *existing != func {
            return Err(StrataError::DuplicateResolver {
                name: name.to_string(),
                hint: Some("Pick a different name; resolvers cannot be replaced".into()),
                code: Some(206),
            });
        }
        return Ok(());
    }
    table.insert(name.to_string(), func);
    Ok(())
}

pub(crate) fn lookup_resolver(name: &str) -> Option<ResolverFn> {
    let table = REGISTRY.lock().expect("resolver registry poisoned");
    table.get(name).copied()
}

/// Built-in `${env:VAR}` resolver. An optional second argument is the
/// fallback when the variable is unset. Results are decoded to the most
/// specific primitive, so `${env:PORT}` with `PORT=8080` reads as an int.
fn resolve_env(args: &[String]) -> Result<Value, String> {
    let var = args
        .first()
        .ok_or_else(|| "expected a variable name, e.g. ${env:HOME}".to_string())?;
    match env::var(var) {
        Ok(val) => Ok(decode_primitive(&val)),
        Err(_) => match args.get(1) {
            Some(default) => Ok(decode_primitive(default)),
            None => Err(format!("environment variable '{}' not set", var)),
        },
    }
}

/// Built-in `${sys:key}` resolver backed by the sysinfo crate.
fn resolve_sys(args: &[String]) -> Result<Value, String> {
    let key = args
        .first()
        .ok_or_else(|| "expected a key, e.g. ${sys:hostname}".to_string())?;

    let mut sys = System::new_all();
    sys.refresh_all();

    // Hyphen and underscore spellings are equivalent.
    let value = match key.replace('-', "_").as_str() {
        "os" => System::name().map(Value::String),
        "kernel_version" => System::kernel_version().map(Value::String),
        "os_version" => System::os_version().map(Value::String),
        "hostname" => System::host_name().map(Value::String),
        "product_name" => Product::name().map(Value::String),
        "cpu_arch" => Some(Value::String(System::cpu_arch())),
        "cpu_count" => Some(Value::Int(sys.cpus().len() as i64)),
        "memory_total" => Some(Value::String(format_bytes(sys.total_memory()))),
        "memory_free" => Some(Value::String(format_bytes(sys.free_memory()))),
        "memory_used" => Some(Value::String(format_bytes(sys.used_memory()))),
        "uptime" => Some(Value::String(format_uptime(System::uptime()))),
        other => {
            return Err(format!(
                "unknown sys key '{}'; available: os, kernel_version, os_version, hostname, \
                 product_name, cpu_arch, cpu_count, memory_total, memory_free, memory_used, uptime",
                other
            ));
        }
    };

    value.ok_or_else(|| format!("unable to resolve sys key '{}'", key))
}

fn format_uptime(seconds: u64) -> String {
    let days = seconds / 86_400;
    let hours = (seconds % 86_400) / 3600;
    let minutes = (seconds % 3600) / 60;
    match (days, hours, minutes) {
        (0, 0, 0) => format!("{}s", seconds),
        (0, 0, m) => format!("{}m", m),
        (0, h, m) => format!("{}h {}m", h, m),
        (d, h, _) => format!("{}d {}h", d, h),
    }
}

fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];
    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} B", bytes)
    } else {
        format!("{:.1} {}", size, UNITS[unit])
    }
}

// -- Tests --

#[cfg(test)]
mod tests {
    use super::*;

    fn upper(args: &[String]) -> Result<Value, String> {
        Ok(Value::String(args.join("").to_uppercase()))
    }

    fn lower(args: &[String]) -> Result<Value, String> {
        Ok(Value::String(args.join("").to_lowercase()))
    }

    #[test]
    fn test_register_and_lookup() {
        register_resolver("registry_upper", upper).expect("first registration");
        let f = lookup_resolver("registry_upper").expect("registered resolver");
        assert_eq!(f(&["hi".into()]), Ok(Value::String("HI".into())));
    }

    #[test]
    fn test_reregistration_identical_fn_is_noop() {
        register_resolver("registry_idem", upper).expect("first registration");
        register_resolver("registry_idem", upper).expect("identical re-registration");
    }

    #[test]
    fn test_reregistration_different_fn_fails() {
        register_resolver("registry_clash", upper).expect("first registration");
        let err = register_resolver("registry_clash", lower).unwrap_err();
        match err {
            StrataError::DuplicateResolver { name, .. } => assert_eq!(name, "registry_clash"),
            other => panic!("expected DuplicateResolver, got {:?}", other),
        }
    }

    #[test]
    fn test_env_resolver() {
        unsafe {
            env::set_var("STRATA_TEST_ENV", "8080");
        }
        let result = resolve_env(&["STRATA_TEST_ENV".into()]).expect("env resolution");
        assert_eq!(result, Value::Int(8080));
    }

    #[test]
    fn test_env_resolver_default() {
        let result = resolve_env(&["STRATA_TEST_UNSET_VAR".into(), "fallback".into()])
            .expect("default applies");
        assert_eq!(result, Value::String("fallback".into()));

        let err = resolve_env(&["STRATA_TEST_UNSET_VAR".into()]).unwrap_err();
        assert!(err.contains("not set"));
    }

    #[test]
    fn test_sys_resolver_hostname() {
        let result = resolve_sys(&["hostname".into()]).expect("hostname resolution");
        match result {
            Value::String(s) => assert!(!s.is_empty()),
            other => panic!("expected string hostname, got {:?}", other),
        }
    }

    #[test]
    fn test_sys_resolver_unknown_key() {
        let err = resolve_sys(&["unknown_key".into()]).unwrap_err();
        assert!(err.contains("unknown sys key"));
    }

    #[test]
    fn test_sys_resolver_hyphen_spelling() {
        let result = resolve_sys(&["cpu-count".into()]).expect("hyphen spelling resolves");
        assert!(matches!(result, Value::Int(n) if n > 0));
    }

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(2048), "2.0 KB");
        assert_eq!(format_bytes(5 * 1024 * 1024), "5.0 MB");
        assert_eq!(format_bytes(3 * 1024 * 1024 * 1024), "3.0 GB");
    }

    #[test]
    fn test_format_uptime() {
        assert_eq!(format_uptime(42), "42s");
        assert_eq!(format_uptime(300), "5m");
        assert_eq!(format_uptime(3900), "1h 5m");
        assert_eq!(format_uptime(90_061), "1d 1h");
    }
}

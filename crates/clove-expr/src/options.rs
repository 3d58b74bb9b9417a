use std::env;

pub const DEFAULT_NAMESPACE: &str = "user";

fn env_flag(name: &str) -> bool {
    let Ok(value) = env::var(name) else {
        return false;
    };
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

pub fn use_vm_from_env() -> bool {
    env_flag("CLOVE_USE_VM")
}

pub fn earmuff_warnings_from_env() -> bool {
    !env_flag("CLOVE_NO_EARMUFF_WARN")
}

#[derive(Clone, Debug)]
pub struct CompileOptions {
    /// Compile each top-level form to bytecode and run it instead of
    /// evaluating the analyzed nodes directly.
    pub use_vm: bool,
    pub warn_on_earmuffs: bool,
    pub source_name: Option<String>,
    pub namespace: String,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            use_vm: use_vm_from_env(),
            warn_on_earmuffs: earmuff_warnings_from_env(),
            source_name: None,
            namespace: DEFAULT_NAMESPACE.to_string(),
        }
    }
}

impl CompileOptions {
    pub fn with_vm(mut self, use_vm: bool) -> Self {
        self.use_vm = use_vm;
        self
    }

    pub fn with_source_name(mut self, name: impl Into<String>) -> Self {
        self.source_name = Some(name.into());
        self
    }

    pub fn with_namespace(mut self, ns: impl Into<String>) -> Self {
        self.namespace = ns.into();
        self
    }
}

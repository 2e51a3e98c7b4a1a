//! Managed method and assembly naming
//!
//! Maintains the module -> assembly -> short-name lookup and builds display
//! names for compiled methods. Naming metadata can arrive after the code it
//! describes has already been sampled, which is why attribution runs as a
//! second phase.

use fnv::FnvHashMap;

/// Lookup tables populated from assembly/module lifecycle events
#[derive(Debug, Default)]
pub struct NamingContext {
    /// assembly id -> short assembly name
    assemblies: FnvHashMap<u64, String>,
    /// module id -> assembly id
    modules: FnvHashMap<u64, u64>,
}

impl NamingContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an assembly. The short name is the qualified name truncated at
    /// the first comma ("Lib.Core, Version=1.0, ..." -> "Lib.Core").
    pub fn add_assembly(&mut self, assembly_id: u64, qualified_name: &str) {
        let short = qualified_name
            .split(',')
            .next()
            .unwrap_or(qualified_name)
            .trim();
        self.assemblies.insert(assembly_id, short.to_string());
    }

    pub fn add_module(&mut self, module_id: u64, assembly_id: u64) {
        self.modules.insert(module_id, assembly_id);
    }

    /// Short assembly name that owns `module_id`, when both links are known
    pub fn assembly_for_module(&self, module_id: u64) -> Option<&str> {
        let assembly_id = self.modules.get(&module_id)?;
        self.assemblies.get(assembly_id).map(String::as_str)
    }

    /// Display name for a compiled method: `Assembly!Class.Method(args)`.
    ///
    /// The signature keeps only its argument list (from the first paren);
    /// the class name keeps only its last dot-segment unless a generic
    /// bracket appears before that dot. Falls back to the bare method name
    /// when the module was never bound to an assembly.
    pub fn method_display_name(
        &self,
        module_id: u64,
        class_name: &str,
        method_name: &str,
        signature: &str,
    ) -> String {
        let args = signature
            .find('(')
            .map(|idx| &signature[idx..])
            .unwrap_or("");

        let last_dot = class_name.rfind('.');
        let first_box = class_name.find('[');
        let class = match last_dot {
            Some(dot) if first_box.map_or(true, |boxed| dot < boxed) => &class_name[dot + 1..],
            _ => class_name,
        };
        let sep = if class.is_empty() { "" } else { "." };

        match self.assembly_for_module(module_id) {
            Some(assembly) => format!("{}!{}{}{}{}", assembly, class, sep, method_name, args),
            None => format!("{}{}{}{}", class, sep, method_name, args),
        }
    }
}

//! Functions the host supplies to a module's imports
//!
//! Host functions work on doubles only: a fixed number of `f64` arguments
//! in, one `f64` out. `Host::math` is the table a VM gets by default.

use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use super::compiler::IMPORT_MODULE;

#[derive(Clone)]
pub struct HostFunction {
    pub arity: usize,
    func: Rc<dyn Fn(&[f64]) -> f64>,
}

impl HostFunction {
    /// `args` always holds exactly `arity` values when the VM calls this
    pub fn call(&self, args: &[f64]) -> f64 {
        (self.func)(args)
    }
}

impl fmt::Debug for HostFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HostFunction(arity {})", self.arity)
    }
}

/// Host functions keyed by (module, name)
#[derive(Debug, Clone, Default)]
pub struct Host {
    functions: HashMap<(String, String), HostFunction>,
}

impl Host {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn define(
        &mut self,
        module: &str,
        name: &str,
        arity: usize,
        func: impl Fn(&[f64]) -> f64 + 'static,
    ) -> &mut Self {
        self.functions.insert(
            (module.to_string(), name.to_string()),
            HostFunction {
                arity,
                func: Rc::new(func),
            },
        );
        self
    }

    pub fn resolve(&self, module: &str, name: &str) -> Option<&HostFunction> {
        self.functions.get(&(module.to_string(), name.to_string()))
    }

    /// The C math library under the `imports` module
    pub fn math() -> Self {
        let unary: [(&str, fn(f64) -> f64); 16] = [
            ("sin", f64::sin),
            ("cos", f64::cos),
            ("tan", f64::tan),
            ("asin", f64::asin),
            ("acos", f64::acos),
            ("atan", f64::atan),
            ("sinh", f64::sinh),
            ("cosh", f64::cosh),
            ("tanh", f64::tanh),
            ("asinh", f64::asinh),
            ("acosh", f64::acosh),
            ("atanh", f64::atanh),
            ("log", f64::ln),
            ("log10", f64::log10),
            ("exp", f64::exp),
            ("sqrt", f64::sqrt),
        ];

        let mut host = Host::new();
        for (name, f) in unary {
            host.define(IMPORT_MODULE, name, 1, move |args| f(args[0]));
        }
        host.define(IMPORT_MODULE, "atan2", 2, |args| args[0].atan2(args[1]));
        host.define(IMPORT_MODULE, "pow", 2, |args| args[0].powf(args[1]));
        host
    }
}

//! SQL function definitions and the registry the code generator resolves
//! function calls against.

use crate::catalog::CollSeq;
use crate::types::Value;
use anyhow::{bail, Result};
use bitflags::bitflags;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct FuncFlags: u16 {
        /// Same arguments always give the same result
        const CONSTANT = 0x0001;
        /// COALESCE or IFNULL: expanded inline
        const COALESCE = 0x0002;
        /// UNLIKELY, LIKELY or LIKELIHOOD: coded as the first argument
        const UNLIKELY = 0x0004;
        /// The body needs the collating sequence of its arguments
        const NEEDCOLL = 0x0008;
        /// Aggregate function, only valid inside an aggregate query
        const AGGREGATE = 0x0010;
    }
}

/// Body of a scalar function. The collating sequence is supplied when the
/// definition carries [`FuncFlags::NEEDCOLL`].
pub type ScalarFn = fn(&[Value], Option<&CollSeq>) -> Result<Value>;

#[derive(Debug, Clone)]
pub struct FuncDef {
    pub name: String,
    /// Number of arguments, or -1 for any number
    pub n_arg: i32,
    pub flags: FuncFlags,
    pub body: Option<ScalarFn>,
}

impl FuncDef {
    pub fn scalar(name: &str, n_arg: i32, flags: FuncFlags, body: ScalarFn) -> Self {
        Self {
            name: name.to_string(),
            n_arg,
            flags,
            body: Some(body),
        }
    }

    pub fn aggregate(name: &str, n_arg: i32) -> Self {
        Self {
            name: name.to_string(),
            n_arg,
            flags: FuncFlags::AGGREGATE | FuncFlags::CONSTANT,
            body: None,
        }
    }

    pub fn is_aggregate(&self) -> bool {
        self.flags.contains(FuncFlags::AGGREGATE)
    }

    pub fn is_constant(&self) -> bool {
        self.flags.contains(FuncFlags::CONSTANT)
    }

    pub fn needs_collation(&self) -> bool {
        self.flags.contains(FuncFlags::NEEDCOLL)
    }

    pub fn invoke(&self, args: &[Value], coll: Option<&CollSeq>) -> Result<Value> {
        match self.body {
            Some(body) => body(args, coll),
            None => bail!("misuse of aggregate function {}()", self.name),
        }
    }
}

/// Function definitions keyed by lower-cased name. One name may carry
/// several definitions that differ in arity.
#[derive(Debug, Default)]
pub struct FunctionRegistry {
    functions: HashMap<String, Vec<Arc<FuncDef>>>,
}

impl FunctionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        let c = FuncFlags::CONSTANT;
        registry.register(FuncDef::scalar("abs", 1, c, func_abs));
        registry.register(FuncDef::scalar("coalesce", -1, c | FuncFlags::COALESCE, func_coalesce));
        registry.register(FuncDef::scalar("ifnull", 2, c | FuncFlags::COALESCE, func_coalesce));
        registry.register(FuncDef::scalar("unlikely", 1, c | FuncFlags::UNLIKELY, func_first));
        registry.register(FuncDef::scalar("likely", 1, c | FuncFlags::UNLIKELY, func_first));
        registry.register(FuncDef::scalar("likelihood", 2, c | FuncFlags::UNLIKELY, func_first));
        registry.register(FuncDef::scalar("lower", 1, c, func_lower));
        registry.register(FuncDef::scalar("upper", 1, c, func_upper));
        registry.register(FuncDef::scalar("length", 1, c, func_length));
        registry.register(FuncDef::scalar("typeof", 1, c, func_typeof));
        registry.register(FuncDef::scalar("substr", 2, c, func_substr));
        registry.register(FuncDef::scalar("substr", 3, c, func_substr));
        registry.register(FuncDef::scalar("nullif", 2, c | FuncFlags::NEEDCOLL, func_nullif));
        registry.register(FuncDef::scalar("min", -1, c | FuncFlags::NEEDCOLL, func_min));
        registry.register(FuncDef::scalar("max", -1, c | FuncFlags::NEEDCOLL, func_max));
        registry.register(FuncDef::scalar("random", 0, FuncFlags::empty(), func_random));
        registry.register(FuncDef::aggregate("count", 0));
        registry.register(FuncDef::aggregate("count", 1));
        registry.register(FuncDef::aggregate("sum", 1));
        registry.register(FuncDef::aggregate("total", 1));
        registry.register(FuncDef::aggregate("avg", 1));
        registry.register(FuncDef::aggregate("min", 1));
        registry.register(FuncDef::aggregate("max", 1));
        registry.register(FuncDef::aggregate("group_concat", 1));
        registry.register(FuncDef::aggregate("group_concat", 2));
        registry
    }

    pub fn register(&mut self, def: FuncDef) {
        let entry = self.functions.entry(def.name.to_ascii_lowercase()).or_default();
        entry.retain(|d| d.n_arg != def.n_arg);
        entry.push(Arc::new(def));
    }

    /// Find the definition for a call with `n_args` arguments. An exact
    /// arity match wins over a variadic definition.
    pub fn find(&self, name: &str, n_args: usize) -> Option<Arc<FuncDef>> {
        let defs = self.functions.get(&name.to_ascii_lowercase())?;
        defs.iter()
            .find(|d| d.n_arg >= 0 && d.n_arg as usize == n_args)
            .or_else(|| defs.iter().find(|d| d.n_arg < 0))
            .cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.functions.contains_key(&name.to_ascii_lowercase())
    }
}

fn func_abs(args: &[Value], _: Option<&CollSeq>) -> Result<Value> {
    match args[0].to_numeric() {
        Value::Null => Ok(Value::Null),
        Value::Integer(i) => match i.checked_abs() {
            Some(v) => Ok(Value::Integer(v)),
            None => bail!("integer overflow"),
        },
        Value::Real(r) => Ok(Value::Real(r.abs())),
        other => Ok(other),
    }
}

fn func_coalesce(args: &[Value], _: Option<&CollSeq>) -> Result<Value> {
    Ok(args
        .iter()
        .find(|v| !v.is_null())
        .cloned()
        .unwrap_or(Value::Null))
}

fn func_first(args: &[Value], _: Option<&CollSeq>) -> Result<Value> {
    Ok(args[0].clone())
}

fn func_lower(args: &[Value], _: Option<&CollSeq>) -> Result<Value> {
    Ok(match args[0].to_text() {
        Some(s) => Value::Text(s.to_ascii_lowercase()),
        None => Value::Null,
    })
}

fn func_upper(args: &[Value], _: Option<&CollSeq>) -> Result<Value> {
    Ok(match args[0].to_text() {
        Some(s) => Value::Text(s.to_ascii_uppercase()),
        None => Value::Null,
    })
}

fn func_length(args: &[Value], _: Option<&CollSeq>) -> Result<Value> {
    Ok(match &args[0] {
        Value::Null => Value::Null,
        Value::Blob(b) => Value::Integer(b.len() as i64),
        other => Value::Integer(other.to_text().unwrap_or_default().chars().count() as i64),
    })
}

fn func_typeof(args: &[Value], _: Option<&CollSeq>) -> Result<Value> {
    Ok(Value::Text(args[0].storage_class().name().to_string()))
}

fn func_substr(args: &[Value], _: Option<&CollSeq>) -> Result<Value> {
    if args.iter().any(Value::is_null) {
        return Ok(Value::Null);
    }
    let text: Vec<char> = args[0].to_text().unwrap_or_default().chars().collect();
    let len = text.len() as i64;
    let mut start = args[1].as_integer();
    let mut count = args.get(2).map(Value::as_integer).unwrap_or(len.max(0) + 1);
    if start < 0 {
        start += len;
        if start < 0 {
            count += start;
            start = 0;
        }
    } else if start > 0 {
        start -= 1;
    } else {
        count -= 1;
    }
    if count < 0 {
        start += count;
        count = -count;
        if start < 0 {
            count += start;
            start = 0;
        }
    }
    let from = start.clamp(0, len) as usize;
    let to = (start + count).clamp(0, len) as usize;
    Ok(Value::Text(text[from..to.max(from)].iter().collect()))
}

fn compare_with_collation(a: &Value, b: &Value, coll: Option<&CollSeq>) -> Ordering {
    match coll {
        Some(coll) => a.compare_with(b, |x, y| coll.compare(x, y)),
        None => a.compare(b),
    }
}

fn func_nullif(args: &[Value], coll: Option<&CollSeq>) -> Result<Value> {
    if compare_with_collation(&args[0], &args[1], coll) == Ordering::Equal {
        Ok(Value::Null)
    } else {
        Ok(args[0].clone())
    }
}

fn min_max(args: &[Value], coll: Option<&CollSeq>, want: Ordering) -> Result<Value> {
    let mut best: Option<&Value> = None;
    for arg in args {
        if arg.is_null() {
            return Ok(Value::Null);
        }
        best = match best {
            Some(b) if compare_with_collation(arg, b, coll) != want => Some(b),
            _ => Some(arg),
        };
    }
    Ok(best.cloned().unwrap_or(Value::Null))
}

fn func_min(args: &[Value], coll: Option<&CollSeq>) -> Result<Value> {
    min_max(args, coll, Ordering::Less)
}

fn func_max(args: &[Value], coll: Option<&CollSeq>) -> Result<Value> {
    min_max(args, coll, Ordering::Greater)
}

fn func_random(_: &[Value], _: Option<&CollSeq>) -> Result<Value> {
    Ok(Value::Integer(rand::random::<i64>()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::CollationRegistry;
    use crate::catalog::TextEncoding;

    #[test]
    fn test_find_prefers_exact_arity() {
        let registry = FunctionRegistry::with_builtins();
        let min1 = registry.find("MIN", 1).unwrap();
        assert!(min1.is_aggregate());
        let min2 = registry.find("min", 2).unwrap();
        assert!(!min2.is_aggregate());
        assert!(min2.needs_collation());
        assert!(registry.find("abs", 2).is_none());
        assert!(registry.contains("abs"));
        assert!(registry.find("frobnicate", 1).is_none());
        assert!(!registry.find("random", 0).unwrap().is_constant());
    }

    #[test]
    fn test_scalar_bodies() -> Result<()> {
        let registry = FunctionRegistry::with_builtins();
        let call = |name: &str, args: &[Value]| -> Result<Value> {
            registry.find(name, args.len()).unwrap().invoke(args, None)
        };
        assert_eq!(call("abs", &[Value::Integer(-3)])?, Value::Integer(3));
        assert!(call("abs", &[Value::Integer(i64::MIN)]).is_err());
        assert_eq!(
            call("coalesce", &[Value::Null, Value::Integer(2), Value::Integer(3)])?,
            Value::Integer(2)
        );
        assert_eq!(call("length", &[Value::Text("héllo".into())])?, Value::Integer(5));
        assert_eq!(call("typeof", &[Value::Real(1.0)])?, Value::Text("real".into()));
        assert_eq!(
            call("substr", &[Value::Text("abcdef".into()), Value::Integer(2), Value::Integer(3)])?,
            Value::Text("bcd".into())
        );
        assert_eq!(
            call("substr", &[Value::Text("abcdef".into()), Value::Integer(-2)])?,
            Value::Text("ef".into())
        );
        assert_eq!(
            call("max", &[Value::Integer(1), Value::Integer(5), Value::Integer(3)])?,
            Value::Integer(5)
        );
        assert_eq!(call("min", &[Value::Integer(1), Value::Null])?, Value::Null);
        assert!(call("count", &[]).is_err());
        Ok(())
    }

    #[test]
    fn test_nullif_uses_collation() -> Result<()> {
        let registry = FunctionRegistry::with_builtins();
        let collations = CollationRegistry::new();
        let nocase = collations.resolve("NOCASE", TextEncoding::Utf8).unwrap();
        let nullif = registry.find("nullif", 2).unwrap();
        let args = [Value::Text("A".into()), Value::Text("a".into())];
        assert_eq!(nullif.invoke(&args, Some(&nocase))?, Value::Null);
        assert_eq!(nullif.invoke(&args, None)?, Value::Text("A".into()));
        Ok(())
    }
}
